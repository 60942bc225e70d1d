//! Process-wide channel state.
//!
//! - [`channel`] - channel status machine and attempt handles
//! - [`table`] - the lock-owning [`OrchestrationState`]
//! - [`snapshot`] - serializable views returned to callers

mod channel;
mod snapshot;
mod table;

pub use channel::{Attempt, AttemptOutcome, ChannelStatus};
pub use snapshot::{ChannelSnapshot, ConfigSnapshot, StatusSnapshot};
pub use table::{OrchestrationState, ScanGuard};
