mod cell;
mod keepalive;
mod process;
mod profile;

pub use cell::{CompletionCell, CompletionSubscription};
pub use keepalive::{ForegroundGuard, ForegroundRegistry};
pub use process::{ActivationRequest, NotifierHandle, NotifierService, ProcessState};
pub use profile::{NotifierProfile, countdown_body};
