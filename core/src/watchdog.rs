//! Periodic fleet health watchdog.
//!
//! One tick probes the whole fleet and, on failure, raises at most one
//! approval per distinct failure fingerprint: repeats of the same
//! normalized output are debounced for the cooldown window, and an
//! already-pending watchdog request suppresses new ones entirely.

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex_lite::Regex;
use sha1::Digest;
use sha1::Sha1;

use crate::approvals::WATCHDOG_REASON_PREFIX;
use crate::blockers::classify_blocker;
use crate::controller::Controller;
use crate::controller::HEALTH_CHECK_TOOL;
use crate::error::Result;
use crate::util::compile_regex;
use crate::util::epoch_seconds;
use crate::util::now_utc;
use crate::util::truncate_chars;

const FALLBACK_REASON: &str = "agent_watchdog_failed";
const NORMALIZED_OUTPUT_CHARS: usize = 1500;
const RECORD_EXCERPT_CHARS: usize = 1200;
const MESSAGE_EXCERPT_CHARS: usize = 1000;

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| compile_regex(r"\s+"));

/// SHA-1 over the normalized (collapsed, lowercased, capped) output.
/// Transient noise like timestamps still changes the hash, which errs on
/// the side of a fresh alert rather than a missed one.
pub fn failure_fingerprint(output: &str) -> String {
    let collapsed = WHITESPACE_RE
        .replace_all(output.trim(), " ")
        .to_lowercase();
    let normalized = truncate_chars(&collapsed, NORMALIZED_OUTPUT_CHARS);
    let digest = Sha1::digest(normalized.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

impl Controller {
    /// One watchdog cycle. Quiet while the latch is on; otherwise probes
    /// the fleet and walks the alert state machine.
    pub async fn watchdog_tick(&self) -> Result<()> {
        if !self.config.watchdog_enabled {
            return Ok(());
        }
        if self.store.is_emergency_stopped() {
            return Ok(());
        }

        let chat_id = self.config.primary_chat_id().to_string();
        let mut probe = vec![
            HEALTH_CHECK_TOOL.to_string(),
            "--prompt".to_string(),
            self.config.watchdog_prompt.clone(),
        ];
        if !self.config.watchdog_check_moltbook {
            probe.push("--skip-moltbook".to_string());
        }

        let out = self.runner.run(&probe, self.config.watchdog_timeout()).await;
        let mut state = self.store.load_watchdog();
        let now_ts = epoch_seconds();

        if out.success() {
            if state.alert_active {
                self.reply(&chat_id, "[watchdog] RECOVERED\nAll agents are healthy again.")
                    .await?;
            }
            state.alert_active = false;
            state.last_ok_at = Some(now_utc());
            state.last_failure_hash.clear();
            return self.store.save_watchdog(&state);
        }

        let failure_hash = failure_fingerprint(&out.output);
        let reason = classify_blocker(&out.output)
            .map(|kind| kind.to_string())
            .unwrap_or_else(|| FALLBACK_REASON.to_string());
        let req_reason = format!("{WATCHDOG_REASON_PREFIX}{reason}");

        // Same failure inside the cooldown window: remember we saw it,
        // say nothing.
        if state.alert_active
            && state.last_failure_hash == failure_hash
            && now_ts - state.last_alert_at < self.config.watchdog_cooldown_seconds as i64
        {
            state.last_seen_at = Some(now_utc());
            return self.store.save_watchdog(&state);
        }

        // The operator already has a watchdog request to act on; refresh
        // the state record only.
        if self.ledger.has_pending_watchdog(&chat_id) {
            state.alert_active = true;
            state.last_alert_at = now_ts;
            state.last_failure_hash = failure_hash;
            state.last_reason = Some(req_reason);
            state.last_seen_at = Some(now_utc());
            return self.store.save_watchdog(&state);
        }

        let mut req = self.ledger.create(&chat_id, "/status")?;
        req.reason = Some(req_reason.clone());
        req.note = Some("Auto-created by watchdog due to agent health failure.".to_string());
        req.watchdog_failure_hash = Some(failure_hash.clone());
        req.watchdog_excerpt =
            Some(truncate_chars(&out.output, RECORD_EXCERPT_CHARS).to_string());
        self.ledger.save(&req)?;

        self.reply(
            &chat_id,
            &format!(
                "[watchdog] Human intervention required.\nrequest_id: {id}\nreason: {req_reason}\n\nApprove: /approve {id}\nReject: /reject {id}\n\nexcerpt:\n{excerpt}",
                id = req.id,
                excerpt = truncate_chars(&out.output, MESSAGE_EXCERPT_CHARS),
            ),
        )
        .await?;
        self.trigger_plan_review(&chat_id, &mut req, &req_reason)
            .await?;

        state.alert_active = true;
        state.last_alert_at = now_ts;
        state.last_failure_hash = failure_hash;
        state.last_reason = Some(req_reason);
        state.last_seen_at = Some(now_utc());
        self.store.save_watchdog(&state)
    }
}
