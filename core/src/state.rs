//! On-disk state store.
//!
//! Every document lives at a well-known path under the state directory and
//! is written as a whole-file replacement, so readers either observe a
//! complete document or fall through to the default. No locking: the
//! single-writer update loop owns the directory.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;

use warden_protocol::ConsensusRecord;
use warden_protocol::ControlState;
use warden_protocol::PollCursor;
use warden_protocol::WatchdogState;

use crate::error::Result;
use crate::util::now_utc;

const OFFSET_FILE: &str = "telegram-offset.json";
const CONTROL_FILE: &str = "emergency-stop.json";
const WATCHDOG_FILE: &str = "telegram-watchdog.json";
const APPROVALS_DIR: &str = "telegram-approvals";
const CONSENSUS_DIR: &str = "consensus";

pub struct StateStore {
    offset_file: PathBuf,
    control_file: PathBuf,
    watchdog_file: PathBuf,
    approvals_dir: PathBuf,
    consensus_dir: PathBuf,
}

impl StateStore {
    /// Creates the state directory tree if absent.
    pub fn new(state_dir: PathBuf) -> Result<Self> {
        let approvals_dir = state_dir.join(APPROVALS_DIR);
        let consensus_dir = state_dir.join(CONSENSUS_DIR);
        fs::create_dir_all(&approvals_dir)?;
        fs::create_dir_all(&consensus_dir)?;
        Ok(Self {
            offset_file: state_dir.join(OFFSET_FILE),
            control_file: state_dir.join(CONTROL_FILE),
            watchdog_file: state_dir.join(WATCHDOG_FILE),
            approvals_dir,
            consensus_dir,
        })
    }

    pub fn approvals_dir(&self) -> &Path {
        &self.approvals_dir
    }

    pub fn load_cursor(&self) -> PollCursor {
        read_or_default(&self.offset_file)
    }

    pub fn save_cursor(&self, cursor: PollCursor) -> Result<()> {
        write_json(&self.offset_file, &cursor)
    }

    pub fn load_control(&self) -> ControlState {
        read_or_default(&self.control_file)
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.load_control().emergency_stop
    }

    /// Flip the latch. An empty reason gets the conventional manual tag;
    /// the previous activation reason is kept on resume so the document
    /// stays a full audit trail.
    pub fn set_emergency_stop(
        &self,
        active: bool,
        chat_id: &str,
        reason: &str,
    ) -> Result<ControlState> {
        let mut state = self.load_control();
        state.emergency_stop = active;
        state.updated_at = Some(now_utc());
        state.updated_by_chat_id = Some(chat_id.to_string());
        let reason = reason.trim();
        if active {
            state.reason = Some(if reason.is_empty() {
                "manual_emergency_stop".to_string()
            } else {
                reason.to_string()
            });
        } else {
            state.resume_reason = Some(if reason.is_empty() {
                "manual_resume".to_string()
            } else {
                reason.to_string()
            });
        }
        write_json(&self.control_file, &state)?;
        Ok(state)
    }

    pub fn load_watchdog(&self) -> WatchdogState {
        read_or_default(&self.watchdog_file)
    }

    pub fn save_watchdog(&self, state: &WatchdogState) -> Result<()> {
        write_json(&self.watchdog_file, state)
    }

    /// Persist a consensus transcript and return the artifact path.
    pub fn write_consensus(&self, record: &ConsensusRecord) -> Result<PathBuf> {
        let path = self.consensus_dir.join(format!("{}.json", record.run_id));
        write_json(&path, record)?;
        Ok(path)
    }
}

/// Absent or malformed documents read as their default; state files are
/// never allowed to wedge the control plane.
fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let Ok(raw) = fs::read_to_string(path) else {
        return T::default();
    };
    serde_json::from_str(&raw).unwrap_or_default()
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}
