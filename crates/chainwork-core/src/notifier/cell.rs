//! CompletionCell - 通知プロセスの完了値を保持する
//!
//! One cell per notifier service. The running instance writes its channel id
//! once when it finishes; any number of readers can wait for it.

use std::time::Duration;

use tokio::sync::watch;

use crate::domain::ChannelId;
use crate::error::{ChainError, Result};

#[derive(Debug)]
pub struct CompletionCell {
    name: String,
    tx: watch::Sender<Option<ChannelId>>,
}

impl CompletionCell {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            name: name.into(),
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store `value` and wake every subscriber. The previous value is replaced.
    pub fn publish(&self, value: ChannelId) {
        self.tx.send_replace(Some(value));
    }

    /// Last published value, if any.
    pub fn latest(&self) -> Option<ChannelId> {
        self.tx.borrow().clone()
    }

    /// A new subscription. Its first `recv` returns the last published value
    /// right away when there is one.
    pub fn subscribe(&self) -> CompletionSubscription {
        CompletionSubscription {
            name: self.name.clone(),
            rx: self.tx.subscribe(),
            replay: true,
        }
    }

    /// A subscription that ignores whatever is already stored and only sees
    /// later publishes.
    pub fn subscribe_next(&self) -> CompletionSubscription {
        CompletionSubscription {
            name: self.name.clone(),
            rx: self.tx.subscribe(),
            replay: false,
        }
    }
}

pub struct CompletionSubscription {
    name: String,
    rx: watch::Receiver<Option<ChannelId>>,
    replay: bool,
}

impl CompletionSubscription {
    /// Wait for the next published value.
    pub async fn recv(&mut self) -> Result<ChannelId> {
        let name = &self.name;
        if std::mem::take(&mut self.replay) {
            let value = self
                .rx
                .wait_for(Option::is_some)
                .await
                .map_err(|_| closed(name))?;
            return value.clone().ok_or_else(|| closed(name));
        }

        loop {
            self.rx.changed().await.map_err(|_| closed(name))?;
            if let Some(value) = self.rx.borrow_and_update().clone() {
                return Ok(value);
            }
        }
    }

    /// A value published since the last `recv`, without waiting.
    pub fn try_recv(&mut self) -> Option<ChannelId> {
        let replay = std::mem::take(&mut self.replay);
        if replay || self.rx.has_changed().unwrap_or(false) {
            return self.rx.borrow_and_update().clone();
        }
        None
    }

    pub async fn recv_timeout(&mut self, waited: Duration) -> Result<ChannelId> {
        match tokio::time::timeout(waited, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(ChainError::Timeout {
                waited,
                what: format!("completion of {}", self.name),
            }),
        }
    }
}

fn closed(name: &str) -> ChainError {
    ChainError::Closed(format!("completion cell {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_value() {
        let cell = CompletionCell::new("first");
        let mut sub = cell.subscribe();

        let waiter = tokio::spawn(async move { sub.recv().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        cell.publish(ChannelId::new("001"));

        assert_eq!(waiter.await.unwrap().unwrap(), ChannelId::new("001"));
        assert_eq!(cell.latest(), Some(ChannelId::new("001")));
    }

    #[tokio::test]
    async fn late_subscriber_gets_last_value_once() {
        let cell = CompletionCell::new("first");
        cell.publish(ChannelId::new("001"));

        let mut sub = cell.subscribe();
        assert_eq!(sub.recv().await.unwrap(), ChannelId::new("001"));

        // the replay is consumed: the next recv waits for a new publish
        let err = sub.recv_timeout(Duration::from_millis(30)).await.unwrap_err();
        assert!(matches!(err, ChainError::Timeout { .. }));
    }

    #[tokio::test]
    async fn subscribe_next_skips_the_stored_value() {
        let cell = CompletionCell::new("first");
        cell.publish(ChannelId::new("stale"));

        let mut sub = cell.subscribe_next();
        assert!(sub.recv_timeout(Duration::from_millis(20)).await.is_err());

        cell.publish(ChannelId::new("001"));
        assert_eq!(sub.recv().await.unwrap(), ChannelId::new("001"));
    }

    #[tokio::test]
    async fn try_recv_sees_a_publish_that_missed_the_timeout() {
        let cell = CompletionCell::new("first");
        let mut sub = cell.subscribe_next();
        assert_eq!(sub.try_recv(), None);
        assert!(sub.recv_timeout(Duration::from_millis(10)).await.is_err());

        cell.publish(ChannelId::new("001"));
        assert_eq!(sub.try_recv(), Some(ChannelId::new("001")));
        // consumed
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn unwritten_cell_times_out() {
        let cell = CompletionCell::new("second");
        let mut sub = cell.subscribe();
        let err = sub.recv_timeout(Duration::from_millis(20)).await.unwrap_err();
        match err {
            ChainError::Timeout { what, .. } => assert!(what.contains("second")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cell.latest(), None);
    }

    #[tokio::test]
    async fn dropped_cell_closes_subscription() {
        let cell = CompletionCell::new("first");
        let mut sub = cell.subscribe();
        drop(cell);
        assert!(matches!(sub.recv().await, Err(ChainError::Closed(_))));
    }
}
