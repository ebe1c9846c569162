use std::fs;

use pretty_assertions::assert_eq;

use warden_protocol::ConsensusRecord;

use crate::common::OPERATOR;
use crate::common::harness;
use crate::common::vote_json;

const TRIGGER_OUTPUT: &str = "deploy log\n[HUMAN_REQUEST]: merge requires review\n";

#[tokio::test]
async fn passed_vote_creates_a_consensus_approval() {
    let h = harness();
    h.runner.push_output(0, TRIGGER_OUTPUT);
    h.runner.push_output(0, &vote_json("gpt", true));
    h.runner.push_output(0, &vote_json("claude", true));
    h.runner.push_output(0, &vote_json("gemini", true));
    h.runner.push_output(0, &vote_json("grok", false));

    h.controller
        .handle_command(OPERATOR, "/status", false)
        .await
        .unwrap();

    // One status probe plus four votes, in fleet order.
    let calls = h.runner.calls();
    assert_eq!(calls.len(), 5);
    assert_eq!(calls[1][1], "fleet-gpt");
    assert_eq!(calls[2][1], "fleet-claude");
    assert_eq!(calls[3][1], "fleet-gemini");
    assert_eq!(calls[4][1], "fleet-grok");
    // The vote prompt names the agent and embeds the trigger detail.
    assert!(calls[1][2].contains("You are 'gpt'"));
    assert!(calls[1][2].contains("Trigger detail: merge requires review"));

    // Order: probe notice, PASS report, vote notice, approval notice.
    let messages = h.transport.messages();
    assert!(messages[2].starts_with("Agent-level human request detected."));
    assert!(messages[2].contains("(3/4 required)"));
    assert!(messages[3].starts_with("Human intervention requested by agent consensus."));

    let pending = h.controller.ledger().list_pending(OPERATOR);
    assert_eq!(pending.len(), 1);
    let req = &pending[0];
    assert_eq!(req.reason.as_deref(), Some("agent_consensus_request"));
    assert_eq!(
        req.agent_request_reason.as_deref(),
        Some("merge requires review")
    );
    assert_eq!(req.consensus_yes, Some(3));
    assert_eq!(req.consensus_min, Some(3));

    // The transcript artifact is on disk and records the same outcome.
    let artifact = req.consensus_artifact.as_deref().unwrap();
    let record: ConsensusRecord =
        serde_json::from_str(&fs::read_to_string(artifact).unwrap()).unwrap();
    assert!(record.passed);
    assert_eq!(record.yes_count, 3);
    assert_eq!(record.votes.len(), 4);
    assert!(record.error_agents.is_empty());
}

#[tokio::test]
async fn rejected_vote_sends_a_note_and_no_approval() {
    let h = harness();
    h.runner.push_output(0, TRIGGER_OUTPUT);
    h.runner.push_output(0, &vote_json("gpt", true));
    h.runner.push_output(0, &vote_json("claude", false));
    h.runner.push_output(0, &vote_json("gemini", false));
    h.runner.push_output(0, &vote_json("grok", false));

    h.controller
        .handle_command(OPERATOR, "/status", false)
        .await
        .unwrap();

    let messages = h.transport.messages();
    assert!(
        messages[3].starts_with("Consensus rejected human intervention request.")
    );
    assert!(messages[3].contains("votes: 1/4 (required: 3)"));
    assert!(h.controller.ledger().list_pending(OPERATOR).is_empty());
}

#[tokio::test]
async fn erroring_agent_escalates_when_the_vote_fails() {
    let h = harness();
    h.runner.push_output(0, TRIGGER_OUTPUT);
    h.runner.push_output(0, &vote_json("gpt", true));
    h.runner.push_output(0, &vote_json("claude", true));
    h.runner.push_output(1, "connection refused");
    h.runner.push_output(0, &vote_json("grok", false));

    h.controller
        .handle_command(OPERATOR, "/status", false)
        .await
        .unwrap();

    let pending = h.controller.ledger().list_pending(OPERATOR);
    assert_eq!(pending.len(), 1);
    let req = &pending[0];
    assert_eq!(
        req.reason.as_deref(),
        Some("agent_unavailable_during_consensus")
    );
    assert_eq!(req.error_agents, vec!["gemini".to_string()]);

    let escalation = &h.transport.messages()[3];
    assert!(escalation.starts_with(
        "Human intervention required (agent unavailable during consensus)."
    ));
    assert!(escalation.contains("error_agents: gemini"));
    assert!(escalation.contains("consensus_yes: 2/4"));
}

#[tokio::test]
async fn erroring_agent_does_not_block_a_passed_vote() {
    let h = harness();
    h.runner.push_output(0, TRIGGER_OUTPUT);
    h.runner.push_output(0, &vote_json("gpt", true));
    h.runner.push_output(0, &vote_json("claude", true));
    h.runner.push_output(0, &vote_json("gemini", true));
    h.runner.push_output(1, "connection refused");

    h.controller
        .handle_command(OPERATOR, "/status", false)
        .await
        .unwrap();

    let pending = h.controller.ledger().list_pending(OPERATOR);
    assert_eq!(pending.len(), 1);
    assert_eq!(
        pending[0].reason.as_deref(),
        Some("agent_consensus_request")
    );
}

#[tokio::test]
async fn duplicate_agent_requests_are_suppressed() {
    let h = harness();
    h.runner.push_output(0, TRIGGER_OUTPUT);
    h.runner.push_output(0, &vote_json("gpt", true));
    h.runner.push_output(0, &vote_json("claude", true));
    h.runner.push_output(0, &vote_json("gemini", true));
    h.runner.push_output(0, &vote_json("grok", true));

    h.controller
        .handle_command(OPERATOR, "/status", false)
        .await
        .unwrap();
    assert_eq!(h.controller.ledger().list_pending(OPERATOR).len(), 1);
    let calls_after_first = h.runner.call_count();

    // Same marker again: no second vote, no second approval.
    h.runner.push_output(0, TRIGGER_OUTPUT);
    h.controller
        .handle_command(OPERATOR, "/status", false)
        .await
        .unwrap();

    assert_eq!(h.controller.ledger().list_pending(OPERATOR).len(), 1);
    assert_eq!(h.runner.call_count(), calls_after_first + 1);
}

#[tokio::test]
async fn consensus_can_be_disabled_entirely() {
    let mut vars = crate::common::base_env();
    vars.insert(
        "TELEGRAM_AGENT_CONSENSUS_REQUIRED".to_string(),
        "0".to_string(),
    );
    let h = crate::common::harness_with(vars);
    h.runner.push_output(0, TRIGGER_OUTPUT);

    h.controller
        .handle_command(OPERATOR, "/status", false)
        .await
        .unwrap();

    // Straight to an approval, no votes at all.
    assert_eq!(h.runner.call_count(), 1);
    let pending = h.controller.ledger().list_pending(OPERATOR);
    assert_eq!(pending.len(), 1);
    assert_eq!(
        pending[0].reason.as_deref(),
        Some("agent_consensus_request")
    );
    assert_eq!(pending[0].consensus_required, None);
}
