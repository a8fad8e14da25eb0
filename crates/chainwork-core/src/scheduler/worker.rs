use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::PipelineScheduler;

/// Worker group handle.
/// - `request_shutdown` でワーカー全体が新しい lease を取らなくなる
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers on the current tokio runtime.
    pub fn spawn(n: usize, scheduler: Arc<PipelineScheduler>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let scheduler = Arc::clone(&scheduler);
            let mut rx = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, scheduler, &mut rx).await;
            });
            joins.push(join);
        }

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Stop taking new leases.
    /// A task that is already running is not interrupted.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    scheduler: Arc<PipelineScheduler>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        // lease は待つので shutdown と競合させる
        let lease = tokio::select! {
            changed = shutdown_rx.changed() => {
                // group dropped without shutdown: the sender is gone
                if changed.is_err() {
                    break;
                }
                continue;
            }
            lease = scheduler.lease() => lease,
        };

        debug!(
            worker = worker_id,
            task = %lease.name(),
            input = lease.input().value(),
            "leased"
        );

        // スケジューラのロックは lease() の中で完結している (ロック跨ぎ await しない)
        // handler の panic は execute() が TaskFailed に変換する
        let result = lease.execute().await;

        let reported = match result {
            Ok(()) => lease.ack().await,
            Err(err) => lease.fail(err.to_string()).await,
        };
        if let Err(e) = reported {
            error!(worker = worker_id, error = %e, "could not record task outcome");
        }
    }
    debug!(worker = worker_id, "worker stopped");
}
