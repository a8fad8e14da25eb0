//! Dependency graph between tasks of a chain.
//!
//! - Forward edges: task -> tasks it waits for
//! - Reverse edges: task -> tasks waiting for it
//! - Invariant: edges and reverse_edges are kept in sync

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::domain::TaskId;

#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: HashMap<TaskId, HashSet<TaskId>>,
    reverse_edges: HashMap<TaskId, HashSet<TaskId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// `task` waits for `depends_on`.
    ///
    /// add_dependency(b, a) means "B waits for A":
    /// - edges: B -> {A}
    /// - reverse_edges: A -> {B}
    pub fn add_dependency(&mut self, task: TaskId, depends_on: TaskId) {
        self.edges.entry(task).or_default().insert(depends_on);
        self.reverse_edges
            .entry(depends_on)
            .or_default()
            .insert(task);
    }

    /// Drop one edge (the depended task succeeded).
    pub fn remove_dependency(&mut self, task: TaskId, depends_on: TaskId) {
        if let Entry::Occupied(mut e) = self.edges.entry(task) {
            e.get_mut().remove(&depends_on);
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
        if let Entry::Occupied(mut e) = self.reverse_edges.entry(depends_on) {
            e.get_mut().remove(&task);
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
    }

    /// Release everything `completed` was holding back.
    ///
    /// Returns the tasks that no longer have any dependency.
    pub fn release(&mut self, completed: TaskId) -> Vec<TaskId> {
        let mut unblocked = Vec::new();
        for waiting in self.waiting_on(completed) {
            self.remove_dependency(waiting, completed);
            if !self.has_dependencies(waiting) {
                unblocked.push(waiting);
            }
        }
        unblocked
    }

    /// Tasks directly waiting for `task`.
    pub fn waiting_on(&self, task: TaskId) -> Vec<TaskId> {
        self.reverse_edges
            .get(&task)
            .map(|waiting| waiting.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every task that transitively waits for `task`, nearest first.
    pub fn downstream_of(&self, task: TaskId) -> Vec<TaskId> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut frontier = VecDeque::from(self.waiting_on(task));
        while let Some(next) = frontier.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            order.push(next);
            frontier.extend(self.waiting_on(next));
        }
        order
    }

    pub fn has_dependencies(&self, task: TaskId) -> bool {
        self.edges
            .get(&task)
            .map(|deps| !deps.is_empty())
            .unwrap_or(false)
    }

    pub fn dependencies(&self, task: TaskId) -> Vec<TaskId> {
        self.edges
            .get(&task)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Remove `task` and every edge touching it.
    pub fn remove_task(&mut self, task: TaskId) {
        for dep in self.dependencies(task) {
            self.remove_dependency(task, dep);
        }
        for waiting in self.waiting_on(task) {
            self.remove_dependency(waiting, task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_of(n: usize) -> (DependencyGraph, Vec<TaskId>) {
        let ids: Vec<TaskId> = (0..n).map(|_| TaskId::generate()).collect();
        let mut graph = DependencyGraph::new();
        for pair in ids.windows(2) {
            graph.add_dependency(pair[1], pair[0]);
        }
        (graph, ids)
    }

    #[test]
    fn new_graph_is_empty() {
        let graph = DependencyGraph::new();
        assert!(!graph.has_dependencies(TaskId::generate()));
    }

    #[test]
    fn add_dependency_creates_both_edges() {
        let (graph, ids) = chain_of(2);
        let (a, b) = (ids[0], ids[1]);

        assert!(graph.has_dependencies(b));
        assert!(!graph.has_dependencies(a));
        assert_eq!(graph.dependencies(b), vec![a]);
        assert_eq!(graph.waiting_on(a), vec![b]);
    }

    #[test]
    fn remove_dependency_removes_both_edges() {
        let (mut graph, ids) = chain_of(2);
        graph.remove_dependency(ids[1], ids[0]);

        assert!(!graph.has_dependencies(ids[1]));
        assert!(graph.waiting_on(ids[0]).is_empty());
    }

    #[test]
    fn release_unblocks_only_the_direct_successor() {
        let (mut graph, ids) = chain_of(3);

        assert_eq!(graph.release(ids[0]), vec![ids[1]]);
        assert!(!graph.has_dependencies(ids[1]));
        assert!(graph.has_dependencies(ids[2]));
    }

    #[test]
    fn release_keeps_tasks_with_other_dependencies_blocked() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        let c = TaskId::generate();
        let mut graph = DependencyGraph::new();
        // C waits for both A and B
        graph.add_dependency(c, a);
        graph.add_dependency(c, b);

        assert!(graph.release(a).is_empty());
        assert_eq!(graph.release(b), vec![c]);
    }

    #[test]
    fn downstream_follows_the_whole_chain_in_order() {
        let (graph, ids) = chain_of(4);
        assert_eq!(graph.downstream_of(ids[0]), ids[1..].to_vec());
        assert_eq!(graph.downstream_of(ids[2]), vec![ids[3]]);
        assert!(graph.downstream_of(ids[3]).is_empty());
    }

    #[test]
    fn remove_task_drops_incoming_and_outgoing_edges() {
        let (mut graph, ids) = chain_of(3);
        graph.remove_task(ids[1]);

        assert!(!graph.has_dependencies(ids[1]));
        assert!(!graph.has_dependencies(ids[2]));
        assert!(graph.waiting_on(ids[0]).is_empty());
    }
}
