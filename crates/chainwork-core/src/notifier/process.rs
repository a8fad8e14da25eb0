//! NotifierProcess - 前面表示つきのカウントダウン処理
//!
//! Lifecycle of one instance:
//! - Created: display channel registered, ongoing display posted,
//!   foreground marker raised. `launch` returns the handle in this state.
//! - CountingDown: set by the control task once it runs. A dedicated OS
//!   thread sleeps one tick, then re-posts the display, `N + 1` times (N..=0).
//! - Publishing: the control task writes the channel id into the cell.
//! - Terminated: display removed, marker dropped, service free for a new
//!   instance.
//!
//! A torn-down instance (or one whose countdown thread panicked) skips
//! Publishing: the cell is left untouched.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::cell::{CompletionCell, CompletionSubscription};
use super::keepalive::{ForegroundGuard, ForegroundRegistry};
use super::profile::{NotifierProfile, countdown_body};
use crate::domain::ChannelId;
use crate::error::{ChainError, Result};
use crate::ports::DisplaySink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProcessState {
    Created,
    CountingDown,
    Publishing,
    Terminated,
}

/// Launch request for a notifier. The channel id is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationRequest {
    pub channel_id: Option<ChannelId>,
}

impl ActivationRequest {
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            channel_id: Some(channel_id),
        }
    }
}

/// One notifier service: a profile, its completion cell and at most one live
/// instance at a time.
pub struct NotifierService {
    profile: Arc<NotifierProfile>,
    display: Arc<dyn DisplaySink>,
    foreground: ForegroundRegistry,
    cell: Arc<CompletionCell>,
    active: Arc<AtomicBool>,
}

impl NotifierService {
    pub fn new(
        profile: NotifierProfile,
        display: Arc<dyn DisplaySink>,
        foreground: ForegroundRegistry,
    ) -> Self {
        let cell = Arc::new(CompletionCell::new(profile.name.clone()));
        Self {
            profile: Arc::new(profile),
            display,
            foreground,
            cell,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn profile(&self) -> &NotifierProfile {
        &self.profile
    }

    pub fn completion(&self) -> &CompletionCell {
        &self.cell
    }

    pub fn subscribe(&self) -> CompletionSubscription {
        self.cell.subscribe()
    }

    /// Only completions published after this call.
    pub fn subscribe_next(&self) -> CompletionSubscription {
        self.cell.subscribe_next()
    }

    /// Is an instance of this service still live?
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Start a new instance.
    ///
    /// Must be called from inside a tokio runtime; the control task is
    /// spawned on it.
    ///
    /// # Errors
    ///
    /// - `ContractViolation` when the request carries no (or an empty)
    ///   channel id. Nothing is displayed and the cell is not touched.
    /// - `AlreadyActive` when the previous instance has not terminated yet.
    pub fn launch(&self, request: ActivationRequest) -> Result<NotifierHandle> {
        let name = self.profile.name.clone();
        let channel_id = request
            .channel_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ChainError::ContractViolation(format!(
                    "notifier '{name}' launched without a channel id"
                ))
            })?;

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            ChainError::ContractViolation(format!("notifier '{name}' needs a tokio runtime: {e}"))
        })?;

        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ChainError::AlreadyActive(name));
        }
        let active = ActiveFlag(Arc::clone(&self.active));

        // Created
        let profile = Arc::clone(&self.profile);
        let (state_tx, state_rx) = watch::channel(ProcessState::Created);
        self.display
            .register_channel(&profile.channel, &profile.channel_name);
        self.display.post(profile.key, &profile.display());
        let foreground = self.foreground.acquire(profile.key);
        info!(notifier = %name, channel = %channel_id, key = %profile.key, "notifier started");

        // CountingDown
        let abort = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = oneshot::channel::<()>();
        let spawned = {
            let profile = Arc::clone(&profile);
            let display = Arc::clone(&self.display);
            let abort = Arc::clone(&abort);
            std::thread::Builder::new()
                .name(profile.thread_name.clone())
                .spawn(move || {
                    if count_down(&profile, display.as_ref(), &abort) {
                        let _ = done_tx.send(());
                    }
                })
        };
        if let Err(e) = spawned {
            self.display.remove(profile.key);
            return Err(e.into());
        }

        let control = runtime.spawn(control_task(Instance {
            profile,
            display: Arc::clone(&self.display),
            cell: Arc::clone(&self.cell),
            channel_id: channel_id.clone(),
            state: state_tx,
            foreground,
            active,
            done: done_rx,
        }));

        Ok(NotifierHandle {
            name,
            channel_id,
            state: state_rx,
            abort,
            control,
        })
    }
}

/// Resets the service's active flag when the instance goes away.
struct ActiveFlag(Arc<AtomicBool>);

impl Drop for ActiveFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// What the control task owns for the lifetime of one instance.
struct Instance {
    profile: Arc<NotifierProfile>,
    display: Arc<dyn DisplaySink>,
    cell: Arc<CompletionCell>,
    channel_id: ChannelId,
    state: watch::Sender<ProcessState>,
    foreground: ForegroundGuard,
    active: ActiveFlag,
    done: oneshot::Receiver<()>,
}

async fn control_task(instance: Instance) {
    let Instance {
        profile,
        display,
        cell,
        channel_id,
        state,
        foreground,
        active,
        done,
    } = instance;

    state.send_replace(ProcessState::CountingDown);

    // Err: torn down, or the countdown thread panicked
    if done.await.is_ok() {
        state.send_replace(ProcessState::Publishing);
        cell.publish(channel_id.clone());
        info!(notifier = %profile.name, channel = %channel_id, "completion published");
    } else {
        warn!(notifier = %profile.name, "countdown did not finish; nothing published");
    }

    display.remove(profile.key);
    drop(foreground);
    drop(active);
    state.send_replace(ProcessState::Terminated);
    debug!(notifier = %profile.name, "notifier terminated");
}

/// Blocking countdown, run on the instance's own thread.
///
/// Returns `false` when interrupted by a teardown.
fn count_down(profile: &NotifierProfile, display: &dyn DisplaySink, abort: &AtomicBool) -> bool {
    let base = profile.display();
    for remaining in (0..=profile.countdown_seconds).rev() {
        std::thread::sleep(profile.tick);
        if abort.load(Ordering::Acquire) {
            return false;
        }
        display.post(profile.key, &base.silent_update(countdown_body(remaining)));
        debug!(notifier = %profile.name, remaining, "countdown tick");
    }
    true
}

/// Handle to one running notifier instance.
pub struct NotifierHandle {
    name: String,
    channel_id: ChannelId,
    state: watch::Receiver<ProcessState>,
    abort: Arc<AtomicBool>,
    control: JoinHandle<()>,
}

impl NotifierHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    /// Lifecycle states, as a watch receiver.
    pub fn state(&self) -> watch::Receiver<ProcessState> {
        self.state.clone()
    }

    pub fn current_state(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// Host-forced teardown: the countdown stops at its next tick and the
    /// completion cell is not written.
    pub fn teardown(&self) {
        if !self.abort.swap(true, Ordering::AcqRel) {
            warn!(notifier = %self.name, "teardown requested");
        }
    }

    /// Wait until the instance has terminated.
    pub async fn join(self) -> Result<()> {
        self.control
            .await
            .map_err(|e| ChainError::Closed(format!("notifier '{}' control task: {e}", self.name)))
    }
}
