//! Data model shared between the warden control plane and its tooling.
//!
//! Everything in this crate is a plain serde document; all I/O lives in
//! `warden-core`. Persisted documents tolerate missing fields so records
//! written by older builds keep loading.

mod agent;
mod approval;
mod consensus;
mod state;

pub use agent::AgentName;
pub use approval::ApprovalRequest;
pub use approval::ApprovalStatus;
pub use consensus::ConsensusRecord;
pub use consensus::ConsensusVote;
pub use state::ControlState;
pub use state::PollCursor;
pub use state::WatchdogState;
