//! Content quarantine for operator-supplied free text.
//!
//! Prompts forwarded to an agent may carry links or instructions that the
//! agent will treat as trusted. Everything is screened before it leaves the
//! control plane: URLs against a host allowlist, the whole text against a
//! fixed set of injection-shaped patterns.

use std::sync::LazyLock;

use regex_lite::Regex;
use url::Url;

use crate::config::Config;
use crate::util::compile_regex;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_regex(r#"https?://[^\s<>()"']+"#));

const INJECTION_PATTERNS: [&str; 5] = [
    r"ignore\s+(all|previous)\s+instructions",
    r"do\s+not\s+follow\s+system",
    r"curl\s+.+\|\s*(sh|bash)",
    r"wget\s+.+\|\s*(sh|bash)",
    r"reveal\s+.+(api[_-]?key|private[_-]?key|seed|mnemonic|token|password|secret)",
];

static INJECTION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    INJECTION_PATTERNS
        .iter()
        .map(|pattern| compile_regex(pattern))
        .collect()
});

pub struct Quarantine {
    enabled: bool,
    allowed_hosts: Vec<String>,
}

impl Quarantine {
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.quarantine_enabled,
            allowed_hosts: config
                .quarantine_allowed_hosts
                .iter()
                .map(|host| host.trim().to_lowercase())
                .filter(|host| !host.is_empty())
                .collect(),
        }
    }

    /// Violation tags for `text`; empty means accept. Disabled quarantine
    /// accepts everything.
    pub fn violations(&self, text: &str) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }

        let mut violations = Vec::new();

        for found in URL_RE.find_iter(text) {
            let cleaned = found
                .as_str()
                .trim_end_matches([')', ',', '.', ';', ':', '!', '?']);
            match Url::parse(cleaned) {
                Err(url::ParseError::EmptyHost) => {
                    violations.push(format!("missing_host:{cleaned}"));
                }
                Err(_) => violations.push(format!("invalid_url:{cleaned}")),
                Ok(parsed) => {
                    let host = parsed.host_str().unwrap_or("").to_lowercase();
                    if host.is_empty() {
                        violations.push(format!("missing_host:{cleaned}"));
                        continue;
                    }
                    if parsed.scheme() == "http" && host != "localhost" && host != "127.0.0.1" {
                        violations.push(format!("insecure_http_url:{cleaned}"));
                        continue;
                    }
                    if !self.host_allowlisted(&host) {
                        violations.push(format!("host_not_allowlisted:{host}"));
                    }
                }
            }
        }

        let lowered = text.to_lowercase();
        for pattern in INJECTION_RES.iter() {
            if pattern.is_match(&lowered) {
                violations.push(format!("blocked_pattern:{}", pattern.as_str()));
            }
        }

        violations
    }

    /// Exact match or subdomain of an allowlisted host.
    fn host_allowlisted(&self, host: &str) -> bool {
        self.allowed_hosts
            .iter()
            .any(|allowed| host == allowed || host.ends_with(&format!(".{allowed}")))
    }
}
