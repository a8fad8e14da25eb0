//! ConditionGate port - タスク実行の前提条件
//!
//! The scheduler asks the gate every time it considers admitting a task.
//! An unsatisfied gate keeps the task Enqueued; it is never a failure.

use tokio::sync::watch;

pub trait ConditionGate: Send + Sync {
    /// Short name used in logs ("network").
    fn name(&self) -> &str;

    fn is_satisfied(&self) -> bool;
}

/// A gate that is always open.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOpen;

impl ConditionGate for AlwaysOpen {
    fn name(&self) -> &str {
        "always-open"
    }

    fn is_satisfied(&self) -> bool {
        true
    }
}

/// Host-side connectivity switch.
///
/// The host flips it with `set_connected`; every `NetworkGate` handed out by
/// `gate()` sees the new value on its next check.
#[derive(Debug)]
pub struct Connectivity {
    tx: watch::Sender<bool>,
}

impl Connectivity {
    pub fn new(connected: bool) -> Self {
        let (tx, _rx) = watch::channel(connected);
        Self { tx }
    }

    pub fn set_connected(&self, connected: bool) {
        self.tx.send_replace(connected);
    }

    pub fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn gate(&self) -> NetworkGate {
        NetworkGate {
            rx: self.tx.subscribe(),
        }
    }
}

/// Requires network connectivity.
#[derive(Debug, Clone)]
pub struct NetworkGate {
    rx: watch::Receiver<bool>,
}

impl ConditionGate for NetworkGate {
    fn name(&self) -> &str {
        "network"
    }

    fn is_satisfied(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_gate_follows_connectivity() {
        let connectivity = Connectivity::new(false);
        let gate = connectivity.gate();
        assert!(!gate.is_satisfied());

        connectivity.set_connected(true);
        assert!(gate.is_satisfied());
        assert!(connectivity.is_connected());

        connectivity.set_connected(false);
        assert!(!gate.is_satisfied());
    }

    #[test]
    fn gates_handed_out_later_see_the_current_value() {
        let connectivity = Connectivity::new(true);
        connectivity.set_connected(false);
        assert!(!connectivity.gate().is_satisfied());
    }
}
