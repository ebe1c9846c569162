use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;

/// Lifecycle of an approval record. Only `Pending` may transition; a
/// resolved record is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// One persisted operator decision.
///
/// Records are written as whole documents, one file per request. Every
/// field beyond the identity/ownership core is optional enrichment added
/// by whichever component created or resolved the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: String,
    #[serde(default)]
    pub status: ApprovalStatus,
    pub created_at: String,
    pub chat_id: String,
    /// Verbatim message that produced this request; replayed on approve.
    pub command_text: String,
    #[serde(default)]
    pub plan_review_triggered: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_request_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by_chat_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_yes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus_artifact: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_agents: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchdog_failure_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watchdog_excerpt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_review_triggered_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_review_exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_review_output_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_review_reason: Option<String>,
}

impl ApprovalRequest {
    /// Fresh pending record with no enrichment.
    pub fn new(id: String, chat_id: String, command_text: String, created_at: String) -> Self {
        Self {
            id,
            status: ApprovalStatus::Pending,
            created_at,
            chat_id,
            command_text,
            plan_review_triggered: false,
            reason: None,
            agent_request_reason: None,
            note: None,
            resolved_at: None,
            resolved_by_chat_id: None,
            consensus_required: None,
            consensus_min: None,
            consensus_yes: None,
            consensus_run_id: None,
            consensus_artifact: None,
            error_agents: Vec::new(),
            watchdog_failure_hash: None,
            watchdog_excerpt: None,
            plan_review_triggered_at: None,
            plan_review_exit_code: None,
            plan_review_output_preview: None,
            plan_review_reason: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }
}
