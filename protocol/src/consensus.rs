use serde::Deserialize;
use serde::Serialize;

/// One agent's reply in a human-intervention vote.
///
/// `decision`/`requires_human`/`confidence`/`reason` mirror the JSON the
/// agent was asked to produce; `raw` keeps a capped copy of the reply for
/// audit. An agent that exited non-zero or produced no JSON is recorded
/// with `decision = "error"` and counts as neither yes nor no.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusVote {
    pub agent: String,
    pub ok: bool,
    pub raw: String,
    pub decision: String,
    pub requires_human: bool,
    pub confidence: i64,
    pub reason: String,
    #[serde(default)]
    pub yes: bool,
}

/// Full transcript of one consensus run, persisted append-only for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRecord {
    pub run_id: String,
    pub created_at: String,
    pub reason_detail: String,
    pub command_text: String,
    pub consensus_min: u32,
    pub yes_count: u32,
    pub passed: bool,
    pub error_agents: Vec<String>,
    pub votes: Vec<ConsensusVote>,
}
