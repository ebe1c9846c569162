//! Approval ledger: one JSON document per operator decision.

use std::fs;
use std::path::PathBuf;

use warden_protocol::ApprovalRequest;
use warden_protocol::ApprovalStatus;

use crate::error::Result;
use crate::error::WardenErr;
use crate::state::write_json;
use crate::util::epoch_seconds;
use crate::util::now_utc;
use crate::util::short_hex;

/// Reasons stamped by the watchdog start with this prefix; a pending
/// request carrying it suppresses further watchdog alerts.
pub const WATCHDOG_REASON_PREFIX: &str = "watchdog_";

const REQUEST_ID_PREFIX: &str = "req_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    Reject,
}

/// Outcome of a resolution attempt. Anything but `Resolved` leaves the
/// record untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    NotFound,
    NotOwned,
    AlreadyResolved(ApprovalStatus),
    Resolved(ApprovalRequest),
}

pub struct ApprovalLedger {
    dir: PathBuf,
}

impl ApprovalLedger {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Persist a fresh pending record and return it.
    pub fn create(&self, chat_id: &str, command_text: &str) -> Result<ApprovalRequest> {
        let id = format!("{REQUEST_ID_PREFIX}{}_{}", epoch_seconds(), short_hex());
        let req = ApprovalRequest::new(
            id,
            chat_id.to_string(),
            command_text.to_string(),
            now_utc(),
        );
        self.save(&req)?;
        Ok(req)
    }

    /// `None` for unknown, malformed, or invalidly named ids.
    pub fn load(&self, id: &str) -> Option<ApprovalRequest> {
        let path = self.path_for(id)?;
        let raw = fs::read_to_string(path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Whole-document replacement.
    pub fn save(&self, req: &ApprovalRequest) -> Result<()> {
        let path = self
            .path_for(&req.id)
            .ok_or_else(|| WardenErr::InvalidRequestId(req.id.clone()))?;
        write_json(&path, req)
    }

    /// Pending records owned by `chat_id`, ascending by filename (and
    /// therefore by creation time). Malformed entries are skipped.
    pub fn list_pending(&self, chat_id: &str) -> Vec<ApprovalRequest> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(REQUEST_ID_PREFIX) && name.ends_with(".json"))
            .collect();
        names.sort();

        names
            .into_iter()
            .filter_map(|name| {
                let raw = fs::read_to_string(self.dir.join(name)).ok()?;
                serde_json::from_str::<ApprovalRequest>(&raw).ok()
            })
            .filter(|req| req.is_pending() && req.chat_id == chat_id)
            .collect()
    }

    /// Single-resolution state machine: only a pending record owned by the
    /// caller flips, and only once.
    pub fn resolve(&self, id: &str, chat_id: &str, verdict: Verdict) -> Result<ResolveOutcome> {
        let Some(mut req) = self.load(id) else {
            return Ok(ResolveOutcome::NotFound);
        };
        if req.chat_id != chat_id {
            return Ok(ResolveOutcome::NotOwned);
        }
        if !req.is_pending() {
            return Ok(ResolveOutcome::AlreadyResolved(req.status));
        }
        req.status = match verdict {
            Verdict::Approve => ApprovalStatus::Approved,
            Verdict::Reject => ApprovalStatus::Rejected,
        };
        req.resolved_at = Some(now_utc());
        req.resolved_by_chat_id = Some(chat_id.to_string());
        self.save(&req)?;
        Ok(ResolveOutcome::Resolved(req))
    }

    /// True when a pending request already covers the same reason and the
    /// same (case-insensitively trimmed) detail. Suppresses duplicate
    /// auto-generated requests.
    pub fn has_pending_similar(&self, chat_id: &str, reason: &str, detail: &str) -> bool {
        let detail_norm = detail.trim().to_lowercase();
        let reason_norm = reason.trim().to_lowercase();
        for req in self.list_pending(chat_id) {
            let req_reason = req.reason.as_deref().unwrap_or("").trim().to_lowercase();
            if req_reason != reason_norm {
                continue;
            }
            let req_detail = req
                .agent_request_reason
                .as_deref()
                .unwrap_or("")
                .trim()
                .to_lowercase();
            if !req_detail.is_empty() && req_detail == detail_norm {
                return true;
            }
            if req_detail.is_empty() && detail_norm.is_empty() {
                return true;
            }
        }
        false
    }

    pub fn has_pending_watchdog(&self, chat_id: &str) -> bool {
        self.list_pending(chat_id).iter().any(|req| {
            req.reason
                .as_deref()
                .is_some_and(|reason| reason.starts_with(WATCHDOG_REASON_PREFIX))
        })
    }

    /// Ids flow in from operator input; only a conservative charset may be
    /// joined to the ledger directory.
    fn path_for(&self, id: &str) -> Option<PathBuf> {
        if id.is_empty()
            || !id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return None;
        }
        Some(self.dir.join(format!("{id}.json")))
    }
}
