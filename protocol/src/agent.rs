use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;
use strum_macros::EnumString;

/// One of the four cooperating fleet agents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AgentName {
    Gpt,
    Claude,
    Gemini,
    Grok,
}

impl AgentName {
    /// Fixed broadcast order used by the consensus voter.
    pub const ALL: [AgentName; 4] = [
        AgentName::Gpt,
        AgentName::Claude,
        AgentName::Gemini,
        AgentName::Grok,
    ];

    /// Service identifier handed to the per-agent prompt tool.
    pub fn service_name(self) -> &'static str {
        match self {
            AgentName::Gpt => "fleet-gpt",
            AgentName::Claude => "fleet-claude",
            AgentName::Gemini => "fleet-gemini",
            AgentName::Grok => "fleet-grok",
        }
    }
}
