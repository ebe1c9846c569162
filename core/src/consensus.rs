//! Consensus voter: broadcast a structured vote to the whole fleet and
//! decide by threshold whether a human-intervention request stands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use warden_protocol::AgentName;
use warden_protocol::ConsensusRecord;
use warden_protocol::ConsensusVote;

use crate::error::Result;
use crate::exec::ToolRunner;
use crate::state::StateStore;
use crate::util::epoch_seconds;
use crate::util::now_utc;
use crate::util::short_hex;
use crate::util::truncate_chars;

pub const PROMPT_AGENT_TOOL: &str = "./scripts/prompt-one-agent.sh";

/// Per-agent prompt subprocess budget, shared with `/ask`.
pub const AGENT_PROMPT_TIMEOUT: Duration = Duration::from_secs(240);

const PROMPT_OUTPUT_EXCERPT_CHARS: usize = 900;
const VOTE_RAW_CHARS: usize = 1200;
const VOTE_REASON_CHARS: usize = 300;

/// Result of one consensus run: the persisted transcript plus where it
/// landed on disk.
pub struct ConsensusOutcome {
    pub record: ConsensusRecord,
    pub artifact: PathBuf,
}

impl ConsensusOutcome {
    pub fn passed(&self) -> bool {
        self.record.passed
    }

    pub fn artifact_display(&self) -> String {
        self.artifact.display().to_string()
    }
}

pub struct ConsensusVoter {
    runner: Arc<dyn ToolRunner>,
    leader: AgentName,
    min: u32,
}

impl ConsensusVoter {
    pub fn new(runner: Arc<dyn ToolRunner>, leader: AgentName, min: u32) -> Self {
        Self { runner, leader, min }
    }

    /// Ask every agent, in the fixed fleet order, whether human
    /// intervention is truly required now. The transcript is persisted
    /// before the outcome is returned.
    pub async fn run(
        &self,
        store: &StateStore,
        reason_detail: &str,
        command_text: &str,
        source_output: &str,
    ) -> Result<ConsensusOutcome> {
        let run_id = format!("consensus_{}_{}", epoch_seconds(), short_hex());
        let excerpt = truncate_chars(source_output, PROMPT_OUTPUT_EXCERPT_CHARS);

        let mut votes = Vec::with_capacity(AgentName::ALL.len());
        let mut yes_count = 0u32;
        let mut error_agents = Vec::new();

        for agent in AgentName::ALL {
            let prompt = self.vote_prompt(agent, reason_detail, command_text, excerpt);
            let args = vec![
                PROMPT_AGENT_TOOL.to_string(),
                agent.service_name().to_string(),
                prompt,
            ];
            let out = self.runner.run(&args, AGENT_PROMPT_TIMEOUT).await;
            let raw = truncate_chars(&out.output, VOTE_RAW_CHARS).to_string();

            let parsed = if out.success() {
                find_json_object(&out.output)
            } else {
                None
            };
            let Some(reply) = parsed else {
                error_agents.push(agent.to_string());
                votes.push(ConsensusVote {
                    agent: agent.to_string(),
                    ok: out.success(),
                    raw,
                    decision: "error".to_string(),
                    requires_human: false,
                    confidence: 0,
                    reason: "vote_failed".to_string(),
                    yes: false,
                });
                continue;
            };

            let decision = reply
                .get("decision")
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim()
                .to_lowercase();
            let requires_human = reply
                .get("requires_human")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let yes =
                requires_human || matches!(decision.as_str(), "approve" | "yes" | "request_human");
            if yes {
                yes_count += 1;
            }
            let reason = reply
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim();
            votes.push(ConsensusVote {
                agent: agent.to_string(),
                ok: true,
                raw,
                decision: if decision.is_empty() {
                    "unknown".to_string()
                } else {
                    decision
                },
                requires_human,
                confidence: confidence_of(reply.get("confidence")),
                reason: truncate_chars(reason, VOTE_REASON_CHARS).to_string(),
                yes,
            });
        }

        let record = ConsensusRecord {
            run_id,
            created_at: now_utc(),
            reason_detail: reason_detail.to_string(),
            command_text: command_text.to_string(),
            consensus_min: self.min,
            yes_count,
            passed: yes_count >= self.min,
            error_agents,
            votes,
        };
        let artifact = store.write_consensus(&record)?;
        Ok(ConsensusOutcome { record, artifact })
    }

    fn vote_prompt(
        &self,
        agent: AgentName,
        reason_detail: &str,
        command_text: &str,
        output_excerpt: &str,
    ) -> String {
        format!(
            "You are '{agent}' participating in a human-intervention vote.\n\
             Leader agent: {leader}\n\
             Goal: decide whether human intervention is truly required NOW.\n\
             Respond with ONLY JSON:\n\
             {{\n  \
             \"agent\":\"<agent>\",\n  \
             \"decision\":\"approve|reject\",\n  \
             \"requires_human\": true|false,\n  \
             \"confidence\": 0-100,\n  \
             \"reason\":\"one sentence\"\n\
             }}\n\n\
             Trigger detail: {reason_detail}\n\
             Original command: {command_text}\n\
             Observed output excerpt:\n{output_excerpt}\n",
            leader = self.leader,
        )
    }
}

/// First well-formed JSON object in `text`: either the whole (trimmed)
/// reply, or the span from the first `{` to the last `}`.
pub fn find_json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    let raw = text.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(Value::Object(map)) = serde_json::from_str(raw) {
        return Some(map);
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str(&raw[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Agents are told to send a number, but replies wander; accept numeric
/// strings too.
fn confidence_of(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(number)) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(text)) => text.trim().parse().unwrap_or(0),
        _ => 0,
    }
}
