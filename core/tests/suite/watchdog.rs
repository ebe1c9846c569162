use pretty_assertions::assert_eq;

use crate::common::OPERATOR;
use crate::common::harness;

#[tokio::test]
async fn healthy_fleet_leaves_no_trace() {
    let h = harness();
    h.runner.push_output(0, "all agents healthy");

    h.controller.watchdog_tick().await.unwrap();

    assert!(h.transport.messages().is_empty());
    assert!(h.controller.ledger().list_pending(OPERATOR).is_empty());
    let state = h.controller.store().load_watchdog();
    assert!(!state.alert_active);
    assert!(state.last_ok_at.is_some());
}

#[tokio::test]
async fn probe_passes_the_configured_prompt() {
    let h = harness();
    h.controller.watchdog_tick().await.unwrap();

    let calls = h.runner.calls();
    assert_eq!(calls[0][0], "./scripts/autonomy/test-all-agents.sh");
    assert_eq!(calls[0][1], "--prompt");
    assert_eq!(calls[0][2], "Say hello in one sentence.");
}

#[tokio::test]
async fn failure_raises_one_classified_approval_on_the_primary_chat() {
    let h = harness();
    h.runner.push_output(1, "agent gpt: Invalid API key");

    h.controller.watchdog_tick().await.unwrap();

    let pending = h.controller.ledger().list_pending(OPERATOR);
    assert_eq!(pending.len(), 1);
    let req = &pending[0];
    assert_eq!(
        req.reason.as_deref(),
        Some("watchdog_credentials_invalid")
    );
    assert_eq!(req.command_text, "/status");
    assert!(req.watchdog_failure_hash.is_some());
    assert!(
        req.watchdog_excerpt
            .as_deref()
            .unwrap()
            .contains("Invalid API key")
    );

    let alert = &h.transport.messages_for(OPERATOR)[0];
    assert!(alert.starts_with("[watchdog] Human intervention required."));
    assert!(alert.contains("reason: watchdog_credentials_invalid"));
    assert!(alert.contains("excerpt:\nagent gpt: Invalid API key"));

    let state = h.controller.store().load_watchdog();
    assert!(state.alert_active);
    assert_eq!(
        state.last_failure_hash,
        req.watchdog_failure_hash.clone().unwrap()
    );
}

#[tokio::test]
async fn unclassified_failure_falls_back_to_the_generic_reason() {
    let h = harness();
    h.runner.push_output(1, "something inexplicable broke");

    h.controller.watchdog_tick().await.unwrap();

    let pending = h.controller.ledger().list_pending(OPERATOR);
    assert_eq!(
        pending[0].reason.as_deref(),
        Some("watchdog_agent_watchdog_failed")
    );
}

#[tokio::test]
async fn identical_failure_within_cooldown_is_debounced() {
    let h = harness();
    h.runner.push_output(1, "agent gpt: Invalid API key");
    h.runner.push_output(1, "agent  gpt:  INVALID API KEY");

    h.controller.watchdog_tick().await.unwrap();
    let messages_after_first = h.transport.messages().len();

    // Same normalized output, cooldown not elapsed: silence.
    h.controller.watchdog_tick().await.unwrap();

    assert_eq!(h.controller.ledger().list_pending(OPERATOR).len(), 1);
    assert_eq!(h.transport.messages().len(), messages_after_first);
    assert!(h.controller.store().load_watchdog().last_seen_at.is_some());
}

#[tokio::test]
async fn pending_watchdog_request_suppresses_new_alerts() {
    let h = harness();
    h.runner.push_output(1, "agent gpt: Invalid API key");
    h.controller.watchdog_tick().await.unwrap();

    // A different failure while the first request is still pending: the
    // state refreshes but the operator is not pinged again.
    h.runner.push_output(1, "HTTP 429 rate limit exceeded");
    let messages_before = h.transport.messages().len();
    h.controller.watchdog_tick().await.unwrap();

    assert_eq!(h.controller.ledger().list_pending(OPERATOR).len(), 1);
    assert_eq!(h.transport.messages().len(), messages_before);
    let state = h.controller.store().load_watchdog();
    assert_eq!(state.last_reason.as_deref(), Some("watchdog_rate_limited"));
}

#[tokio::test]
async fn resolved_request_plus_new_failure_raises_a_second_approval() {
    let h = harness();
    h.runner.push_output(1, "agent gpt: Invalid API key");
    h.controller.watchdog_tick().await.unwrap();

    let first = h.controller.ledger().list_pending(OPERATOR)[0].clone();
    h.controller
        .handle_command(OPERATOR, &format!("/reject {}", first.id), false)
        .await
        .unwrap();

    // Different fingerprint, nothing pending: a fresh approval.
    h.runner.push_output(1, "HTTP 429 rate limit exceeded");
    h.controller.watchdog_tick().await.unwrap();

    let pending = h.controller.ledger().list_pending(OPERATOR);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].reason.as_deref(), Some("watchdog_rate_limited"));
    assert_ne!(
        pending[0].watchdog_failure_hash,
        first.watchdog_failure_hash
    );
}

#[tokio::test]
async fn recovery_clears_the_alert_and_tells_the_operator() {
    let h = harness();
    h.runner.push_output(1, "agent gpt: Invalid API key");
    h.controller.watchdog_tick().await.unwrap();
    assert!(h.controller.store().load_watchdog().alert_active);

    h.runner.push_output(0, "all agents healthy");
    h.controller.watchdog_tick().await.unwrap();

    let messages = h.transport.messages_for(OPERATOR);
    assert_eq!(
        messages.last().unwrap(),
        "[watchdog] RECOVERED\nAll agents are healthy again."
    );
    let state = h.controller.store().load_watchdog();
    assert!(!state.alert_active);
    assert_eq!(state.last_failure_hash, "");
    assert!(state.last_ok_at.is_some());
}

#[tokio::test]
async fn latch_suspends_the_watchdog() {
    let h = harness();
    h.controller
        .store()
        .set_emergency_stop(true, OPERATOR, "maintenance")
        .unwrap();

    h.controller.watchdog_tick().await.unwrap();

    assert_eq!(h.runner.call_count(), 0);
    assert!(h.transport.messages().is_empty());
}
