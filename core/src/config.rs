//! Environment-driven configuration.
//!
//! Every tunable is read once at startup into a [`Config`] value that the
//! controller carries for the life of the process. The parsing helpers are
//! deliberately forgiving: a malformed integer falls back to its default, a
//! boolean accepts `1|true|yes|on` case-insensitively, and CSV sets drop
//! empty entries. Only the chat token and the chat allowlist are hard
//! requirements.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;
use warden_protocol::AgentName;

use crate::error::Result;
use crate::error::WardenErr;

pub const DEFAULT_QUARANTINE_ALLOWED_HOSTS: &str =
    "github.com,raw.githubusercontent.com,api.github.com,docs.rs,crates.io";

const DEFAULT_WATCHDOG_PROMPT: &str = "Say hello in one sentence.";
const DEFAULT_LEADER: AgentName = AgentName::Gemini;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory the tool scripts are spawned from.
    pub root_dir: PathBuf,
    /// `<root>/autonomy/state`; every persisted document lives below it.
    pub state_dir: PathBuf,

    pub bot_token: String,
    /// Sorted so the smallest entry is the deterministic primary chat.
    pub allowed_chat_ids: BTreeSet<String>,

    pub poll_timeout_seconds: u64,
    pub command_timeout_seconds: u64,
    pub max_output_chars: usize,

    pub leader_only_mode: bool,
    pub minimal_command_mode: bool,
    pub require_approval_commands: HashSet<String>,
    pub auto_request_on_blocker: bool,
    pub pause_dev_when_pending: bool,
    pub auto_plan_review_on_pending: bool,

    pub consensus_required: bool,
    pub consensus_min: u32,

    pub watchdog_enabled: bool,
    pub watchdog_interval_seconds: u64,
    pub watchdog_timeout_seconds: u64,
    pub watchdog_cooldown_seconds: u64,
    pub watchdog_prompt: String,
    pub watchdog_check_moltbook: bool,

    pub quarantine_enabled: bool,
    pub quarantine_allowed_hosts: BTreeSet<String>,

    pub leader_agent: AgentName,
}

impl Config {
    pub fn from_env(root_dir: PathBuf) -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_lookup(root_dir, &vars)
    }

    /// Build from an explicit key/value view. Tests go through this so they
    /// never mutate process-global environment state.
    pub fn from_lookup(root_dir: PathBuf, vars: &HashMap<String, String>) -> Result<Self> {
        let get = |name: &str| vars.get(name).map(String::as_str);

        let bot_token = get("TELEGRAM_BOT_TOKEN").unwrap_or("").trim().to_string();
        if bot_token.is_empty() {
            return Err(WardenErr::MissingConfig("TELEGRAM_BOT_TOKEN"));
        }

        let allowed_chat_ids = parse_csv_set(get("TELEGRAM_ALLOWED_CHAT_IDS").unwrap_or(""));
        if allowed_chat_ids.is_empty() {
            return Err(WardenErr::MissingConfig("TELEGRAM_ALLOWED_CHAT_IDS"));
        }

        let leader_raw = get("AGENT_LEADER").unwrap_or("").trim().to_lowercase();
        let leader_agent = if leader_raw.is_empty() {
            DEFAULT_LEADER
        } else {
            AgentName::from_str(&leader_raw).unwrap_or_else(|_| {
                warn!("AGENT_LEADER '{leader_raw}' is not a known agent, using {DEFAULT_LEADER}");
                DEFAULT_LEADER
            })
        };

        let state_dir = root_dir.join("autonomy").join("state");

        Ok(Self {
            root_dir,
            state_dir,
            bot_token,
            allowed_chat_ids,
            poll_timeout_seconds: parse_u64(get("TELEGRAM_POLL_TIMEOUT_SECONDS"), 30),
            command_timeout_seconds: parse_u64(get("TELEGRAM_COMMAND_TIMEOUT_SECONDS"), 900),
            max_output_chars: parse_u64(get("TELEGRAM_MAX_OUTPUT_CHARS"), 3500) as usize,
            leader_only_mode: parse_bool(get("TELEGRAM_LEADER_ONLY_MODE"), true),
            minimal_command_mode: parse_bool(get("TELEGRAM_MINIMAL_COMMAND_MODE"), true),
            require_approval_commands: parse_csv_set(
                get("TELEGRAM_REQUIRE_APPROVAL_COMMANDS").unwrap_or(""),
            )
            .into_iter()
            .map(|key| key.to_lowercase())
            .collect(),
            auto_request_on_blocker: parse_bool(get("TELEGRAM_AUTO_REQUEST_ON_BLOCKER"), true),
            pause_dev_when_pending: parse_bool(get("TELEGRAM_PAUSE_DEV_WHEN_PENDING"), true),
            auto_plan_review_on_pending: parse_bool(
                get("TELEGRAM_AUTO_PLAN_REVIEW_ON_PENDING"),
                true,
            ),
            consensus_required: parse_bool(get("TELEGRAM_AGENT_CONSENSUS_REQUIRED"), true),
            consensus_min: (parse_u64(get("TELEGRAM_AGENT_CONSENSUS_MIN"), 3) as u32).clamp(1, 4),
            watchdog_enabled: parse_bool(get("TELEGRAM_WATCHDOG_ENABLED"), true),
            watchdog_interval_seconds: parse_u64(get("TELEGRAM_WATCHDOG_INTERVAL_SECONDS"), 300)
                .max(30),
            watchdog_timeout_seconds: parse_u64(get("TELEGRAM_WATCHDOG_TIMEOUT_SECONDS"), 240)
                .max(60),
            watchdog_cooldown_seconds: parse_u64(
                get("TELEGRAM_WATCHDOG_ALERT_COOLDOWN_SECONDS"),
                600,
            )
            .max(60),
            watchdog_prompt: get("TELEGRAM_WATCHDOG_PROMPT")
                .unwrap_or(DEFAULT_WATCHDOG_PROMPT)
                .to_string(),
            watchdog_check_moltbook: parse_bool(get("TELEGRAM_WATCHDOG_CHECK_MOLTBOOK"), true),
            quarantine_enabled: parse_bool(get("EXTERNAL_CONTENT_QUARANTINE"), true),
            quarantine_allowed_hosts: parse_csv_set(
                get("QUARANTINE_ALLOWED_HOSTS").unwrap_or(DEFAULT_QUARANTINE_ALLOWED_HOSTS),
            ),
            leader_agent,
        })
    }

    /// Deterministic target for watchdog-originated traffic: the
    /// lexicographically smallest allowed chat id.
    pub fn primary_chat_id(&self) -> &str {
        self.allowed_chat_ids
            .iter()
            .next()
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn is_allowed_chat(&self, chat_id: &str) -> bool {
        self.allowed_chat_ids.contains(chat_id)
    }

    pub fn requires_approval(&self, command_key: &str) -> bool {
        self.require_approval_commands.contains(command_key)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_secs(self.watchdog_timeout_seconds)
    }
}

fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw {
        None => default,
        Some(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
    }
}

fn parse_u64(raw: Option<&str>, default: u64) -> u64 {
    match raw {
        None => default,
        Some(value) if value.trim().is_empty() => default,
        Some(value) => value.trim().parse().unwrap_or(default),
    }
}

fn parse_csv_set(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
