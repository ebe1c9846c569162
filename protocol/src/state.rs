use serde::Deserialize;
use serde::Serialize;

/// Emergency-stop latch singleton. The latest written document is
/// authoritative; readers treat a missing or malformed file as "off".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ControlState {
    #[serde(default)]
    pub emergency_stop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by_chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_reason: Option<String>,
}

/// Watchdog singleton. While `alert_active` holds, a new alert is
/// suppressed unless the failure fingerprint changes or the cooldown
/// elapses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WatchdogState {
    #[serde(default)]
    pub alert_active: bool,
    /// Epoch seconds of the last alert that reached the operator.
    #[serde(default)]
    pub last_alert_at: i64,
    #[serde(default)]
    pub last_failure_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ok_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reason: Option<String>,
}

/// Poll cursor singleton, persisted after every processed update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PollCursor {
    #[serde(default)]
    pub offset: i64,
}
