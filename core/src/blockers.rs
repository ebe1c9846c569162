//! Failure triage: map raw tool output to operator-actionable tags.
//!
//! Two classifiers live here. [`classify_blocker`] matches the output of a
//! failed command against a closed taxonomy of failure kinds the operator
//! can act on; [`extract_human_request_detail`] finds explicit
//! human-intervention markers that agents embed in their output.

use std::sync::LazyLock;

use regex_lite::Regex;
use strum_macros::Display;

use crate::util::compile_regex;
use crate::util::truncate_chars;

/// Closed taxonomy of operator-actionable failure kinds. The `Display`
/// form is the `reason` stored on auto-created approvals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum BlockerKind {
    CredentialsInvalid,
    PermissionDenied,
    RateLimited,
    QuarantineViolation,
    ProviderQuotaExhausted,
    ProviderTokenLimit,
    ProviderUnavailable,
    MergePermissionMissing,
    OwnershipVerificationRequired,
    MissingRequiredConfig,
}

/// Ordered: first match wins, so the more specific credential and
/// permission shapes sit ahead of the catch-all config patterns.
static BLOCKER_PATTERNS: LazyLock<Vec<(Regex, BlockerKind)>> = LazyLock::new(|| {
    [
        (
            r"invalid username or token|authentication failed|incorrect api key|invalid api key|invalid x-api-key",
            BlockerKind::CredentialsInvalid,
        ),
        (
            r"permission denied|forbidden|insufficient permission|requires .* permission|permissions\.push=false",
            BlockerKind::PermissionDenied,
        ),
        (
            r"rate limit|too many requests|retry_after|429",
            BlockerKind::RateLimited,
        ),
        (
            r"quarantine blocked content|host_not_allowlisted|insecure_http_url",
            BlockerKind::QuarantineViolation,
        ),
        (
            r"insufficient_quota|quota exceeded|exceeded your current quota|billing hard limit|out of credits|credit balance is too low|payment required|402",
            BlockerKind::ProviderQuotaExhausted,
        ),
        (
            r"context length|maximum context length|token limit exceeded",
            BlockerKind::ProviderTokenLimit,
        ),
        (
            r"model overloaded|server is overloaded|service unavailable|503",
            BlockerKind::ProviderUnavailable,
        ),
        (
            r"not found \(likely token lacks merge permission",
            BlockerKind::MergePermissionMissing,
        ),
        (
            r"must register|claim|verify-email|owner.*email|pending_claim",
            BlockerKind::OwnershipVerificationRequired,
        ),
        (
            r"bot_token is required|allowed_chat_ids is required|missing .* required",
            BlockerKind::MissingRequiredConfig,
        ),
    ]
    .into_iter()
    .map(|(pattern, kind)| (compile_regex(pattern), kind))
    .collect()
});

/// First matching taxonomy tag for `text`, or `None` when the failure is
/// not operator-actionable. Substring search over the lowercased input.
pub fn classify_blocker(text: &str) -> Option<BlockerKind> {
    let lowered = text.to_lowercase();
    BLOCKER_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&lowered))
        .map(|(_, kind)| *kind)
}

/// Detail reported when an agent emits a marker with no trailing text.
pub const DEFAULT_HUMAN_REQUEST_DETAIL: &str = "agent_consensus_requested_human_input";

const MAX_DETAIL_CHARS: usize = 280;

static HUMAN_REQUEST_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\[HUMAN_REQUEST\]\s*[:\-]?\s*(.+)",
        r"(?i)\[HUMAN_APPROVAL\]\s*[:\-]?\s*(.+)",
        r"(?i)HUMAN_REQUEST\s*[:\-]\s*(.+)",
        r"(?i)HUMAN_APPROVAL\s*[:\-]\s*(.+)",
    ]
    .iter()
    .map(|pattern| compile_regex(pattern))
    .collect()
});

/// Detail of the first human-intervention marker in `text`, line by line.
pub fn extract_human_request_detail(text: &str) -> Option<String> {
    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        for pattern in HUMAN_REQUEST_PATTERNS.iter() {
            let Some(captures) = pattern.captures(line) else {
                continue;
            };
            let detail = captures
                .get(1)
                .map(|group| group.as_str().trim())
                .unwrap_or("");
            let detail = if detail.is_empty() {
                DEFAULT_HUMAN_REQUEST_DETAIL
            } else {
                detail
            };
            return Some(truncate_chars(detail, MAX_DETAIL_CHARS).to_string());
        }
    }
    None
}
