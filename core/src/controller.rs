//! Command dispatcher.
//!
//! [`Controller`] is built once at startup and owns every collaborator:
//! config, state store, approval ledger, quarantine, consensus voter, the
//! chat transport and the tool runner. Dispatch is a linear checklist of
//! gates over the incoming `(chat_id, text)` pair; the `/approve` replay
//! re-enters the same function with `bypass_approval` set.

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use warden_protocol::AgentName;
use warden_protocol::ApprovalRequest;

use crate::approvals::ApprovalLedger;
use crate::approvals::ResolveOutcome;
use crate::approvals::Verdict;
use crate::blockers::classify_blocker;
use crate::blockers::extract_human_request_detail;
use crate::config::Config;
use crate::consensus::AGENT_PROMPT_TIMEOUT;
use crate::consensus::ConsensusOutcome;
use crate::consensus::ConsensusVoter;
use crate::consensus::PROMPT_AGENT_TOOL;
use crate::error::Result;
use crate::exec::ExecOutput;
use crate::exec::ToolRunner;
use crate::quarantine::Quarantine;
use crate::state::StateStore;
use crate::telegram::ChatTransport;
use crate::util::after_tokens;

pub const HEALTH_CHECK_TOOL: &str = "./scripts/autonomy/test-all-agents.sh";
pub const RUN_CYCLE_TOOL: &str = "./scripts/autonomy/run-cycle.sh";

const RUN_CYCLE_TIMEOUT: Duration = Duration::from_secs(1800);
const HEALTH_CHECK_PROMPT: &str = "Say hello in one sentence.";

/// Reason tags for approvals created by the dispatcher itself (the blocker
/// taxonomy supplies the rest).
pub const REASON_PRE_EXECUTION: &str = "pre_execution_approval_required";
pub const REASON_AGENT_CONSENSUS: &str = "agent_consensus_request";
pub const REASON_AGENT_UNAVAILABLE: &str = "agent_unavailable_during_consensus";
pub const REASON_PENDING_DEFAULT: &str = "pending_human_intervention";

const STOP_COMMANDS: [&str; 3] = ["/stop", "/emergency_stop", "/panic"];
const RESUME_COMMANDS: [&str; 2] = ["/resume", "/continue"];

const MINIMAL_ALLOWED_COMMANDS: [&str; 12] = [
    "/help",
    "/start",
    "/pending",
    "/approve",
    "/reject",
    "/status",
    "/cycle",
    "/stop",
    "/emergency_stop",
    "/panic",
    "/resume",
    "/continue",
];

/// Informational and de-escalation commands only; notably no `/approve`
/// and no execution commands.
const ALLOWED_WHEN_STOPPED: [&str; 10] = [
    "/help",
    "/start",
    "/pending",
    "/reject",
    "/status",
    "/stop",
    "/emergency_stop",
    "/panic",
    "/resume",
    "/continue",
];

/// Command keys paused while an approval is pending.
const DEV_BLOCK_COMMAND_KEYS: [&str; 1] = ["cycle"];

const MAX_PENDING_ROWS: usize = 20;
const MAX_VIOLATIONS_SHOWN: usize = 5;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub struct Controller {
    pub(crate) config: Config,
    pub(crate) store: StateStore,
    pub(crate) ledger: ApprovalLedger,
    pub(crate) quarantine: Quarantine,
    pub(crate) voter: ConsensusVoter,
    pub(crate) transport: Arc<dyn ChatTransport>,
    pub(crate) runner: Arc<dyn ToolRunner>,
}

impl Controller {
    pub fn new(
        config: Config,
        transport: Arc<dyn ChatTransport>,
        runner: Arc<dyn ToolRunner>,
    ) -> Result<Self> {
        let store = StateStore::new(config.state_dir.clone())?;
        let ledger = ApprovalLedger::new(store.approvals_dir().to_path_buf());
        let quarantine = Quarantine::from_config(&config);
        let voter = ConsensusVoter::new(
            Arc::clone(&runner),
            config.leader_agent,
            config.consensus_min,
        );
        Ok(Self {
            config,
            store,
            ledger,
            quarantine,
            voter,
            transport,
            runner,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn ledger(&self) -> &ApprovalLedger {
        &self.ledger
    }

    pub(crate) async fn reply(&self, chat_id: &str, text: &str) -> Result<()> {
        self.transport.send_message(chat_id, text).await
    }

    /// Dispatch one operator message. `bypass_approval` is only set by the
    /// `/approve` replay and skips the pre-execution and dev-block gates.
    pub async fn handle_command(
        &self,
        chat_id: &str,
        text: &str,
        bypass_approval: bool,
    ) -> Result<()> {
        self.dispatch(chat_id, text, bypass_approval).await
    }

    // Boxed because the /approve arm replays the stored command through the
    // same dispatch path.
    fn dispatch<'a>(
        &'a self,
        chat_id: &'a str,
        text: &'a str,
        bypass_approval: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let Some((cmd, args)) = parse_command(text) else {
                return Ok(());
            };
            let cmd_key = command_key(&cmd);

            // Universal commands run regardless of mode or latch.
            if cmd == "/start" || cmd == "/help" {
                return self.reply(chat_id, &self.help_text()).await;
            }

            if STOP_COMMANDS.contains(&cmd.as_str()) {
                let reason = args.join(" ");
                let state = self.store.set_emergency_stop(true, chat_id, &reason)?;
                let message = format!(
                    "Emergency stop ACTIVATED.\nreason: {}\nupdated_at: {}\nUse /resume [reason] to continue.",
                    state.reason.as_deref().unwrap_or(""),
                    state.updated_at.as_deref().unwrap_or(""),
                );
                return self.reply(chat_id, &message).await;
            }

            if RESUME_COMMANDS.contains(&cmd.as_str()) {
                let reason = args.join(" ");
                let state = self.store.set_emergency_stop(false, chat_id, &reason)?;
                let message = format!(
                    "Emergency stop CLEARED.\nresume_reason: {}\nupdated_at: {}",
                    state.resume_reason.as_deref().unwrap_or(""),
                    state.updated_at.as_deref().unwrap_or(""),
                );
                return self.reply(chat_id, &message).await;
            }

            if self.config.minimal_command_mode && !MINIMAL_ALLOWED_COMMANDS.contains(&cmd.as_str())
            {
                return self
                    .reply(
                        chat_id,
                        "This command is disabled in minimal mode.\nAllowed: /help, /pending, /approve, /reject, /status, /cycle, /emergency_stop, /resume",
                    )
                    .await;
            }

            if self.store.is_emergency_stopped() && !ALLOWED_WHEN_STOPPED.contains(&cmd.as_str()) {
                return self
                    .reply(
                        chat_id,
                        "Emergency stop is active. Allowed now: /help, /pending, /reject, /status, /resume",
                    )
                    .await;
            }

            if cmd == "/pending" {
                return self.handle_pending(chat_id).await;
            }
            if cmd == "/reject" {
                return self.handle_reject(chat_id, &args).await;
            }
            if cmd == "/approve" {
                return self.handle_approve(chat_id, &args).await;
            }

            if self.config.requires_approval(&cmd_key) && !bypass_approval {
                let mut req = self.ledger.create(chat_id, text)?;
                req.reason = Some(REASON_PRE_EXECUTION.to_string());
                self.ledger.save(&req)?;
                self.reply(
                    chat_id,
                    &format!(
                        "Approval required for this command.\nrequest_id: {id}\ncommand: {text}\n\nApprove: /approve {id}\nReject: /reject {id}",
                        id = req.id,
                    ),
                )
                .await?;
                self.trigger_plan_review(chat_id, &mut req, REASON_PRE_EXECUTION)
                    .await?;
                return Ok(());
            }

            if self.config.pause_dev_when_pending
                && DEV_BLOCK_COMMAND_KEYS.contains(&cmd_key.as_str())
                && !bypass_approval
            {
                let pending = self.ledger.list_pending(chat_id);
                if let Some(first) = pending.first() {
                    let mut req = first.clone();
                    let reason = req
                        .reason
                        .clone()
                        .unwrap_or_else(|| REASON_PENDING_DEFAULT.to_string());
                    self.reply(
                        chat_id,
                        &format!(
                            "Development commands are paused while approval is pending.\npending request: {}\nreason: {reason}\nUse /approve or /reject first.",
                            req.id,
                        ),
                    )
                    .await?;
                    self.trigger_plan_review(chat_id, &mut req, &reason).await?;
                    return Ok(());
                }
            }

            if cmd == "/status" {
                self.reply(chat_id, "Running health check...").await?;
                let probe = vec![
                    HEALTH_CHECK_TOOL.to_string(),
                    "--prompt".to_string(),
                    HEALTH_CHECK_PROMPT.to_string(),
                ];
                let out = self.runner.run(&probe, self.config.command_timeout()).await;
                return self.report_result(chat_id, "status", &out, text).await;
            }

            if cmd == "/cycle" {
                return self.handle_cycle(chat_id, text, &args).await;
            }

            if cmd == "/ask" {
                return self.handle_ask(chat_id, text, &args).await;
            }

            self.reply(chat_id, "Unknown command. Use /help").await
        })
    }

    async fn handle_pending(&self, chat_id: &str) -> Result<()> {
        let rows = self.ledger.list_pending(chat_id);
        if rows.is_empty() {
            return self.reply(chat_id, "No pending approvals.").await;
        }
        let mut lines = vec!["Pending approvals:".to_string()];
        for row in rows.iter().take(MAX_PENDING_ROWS) {
            lines.push(format!(
                "- {} | created={} | cmd={}",
                row.id, row.created_at, row.command_text
            ));
        }
        self.reply(chat_id, &lines.join("\n")).await
    }

    async fn handle_reject(&self, chat_id: &str, args: &[String]) -> Result<()> {
        let [req_id] = args else {
            return self.reply(chat_id, "Usage: /reject <request_id>").await;
        };
        match self.ledger.resolve(req_id, chat_id, Verdict::Reject)? {
            ResolveOutcome::NotFound => {
                self.reply(chat_id, &format!("Request not found: {req_id}"))
                    .await
            }
            ResolveOutcome::NotOwned => self.reply(chat_id, "Unauthorized for this request.").await,
            ResolveOutcome::AlreadyResolved(status) => {
                self.reply(chat_id, &format!("Request already {status}: {req_id}"))
                    .await
            }
            ResolveOutcome::Resolved(_) => {
                self.reply(chat_id, &format!("Rejected: {req_id}")).await
            }
        }
    }

    async fn handle_approve(&self, chat_id: &str, args: &[String]) -> Result<()> {
        let [req_id] = args else {
            return self.reply(chat_id, "Usage: /approve <request_id>").await;
        };
        // The latch gate already screens /approve, but the rule matters
        // enough to enforce at the point of resolution too: a replayed
        // command must never run while stopped.
        if self.store.is_emergency_stopped() {
            return self
                .reply(
                    chat_id,
                    "Emergency stop is active. Run /resume first, then /approve.",
                )
                .await;
        }
        match self.ledger.resolve(req_id, chat_id, Verdict::Approve)? {
            ResolveOutcome::NotFound => {
                self.reply(chat_id, &format!("Request not found: {req_id}"))
                    .await
            }
            ResolveOutcome::NotOwned => self.reply(chat_id, "Unauthorized for this request.").await,
            ResolveOutcome::AlreadyResolved(status) => {
                self.reply(chat_id, &format!("Request already {status}: {req_id}"))
                    .await
            }
            ResolveOutcome::Resolved(req) => {
                let original = req.command_text.trim().to_string();
                self.reply(chat_id, &format!("Approved: {req_id}\nExecuting: {original}"))
                    .await?;
                self.dispatch(chat_id, &original, true).await
            }
        }
    }

    async fn handle_cycle(&self, chat_id: &str, text: &str, args: &[String]) -> Result<()> {
        if args.len() > 1 {
            return self
                .reply(chat_id, "Usage: /cycle [execution|kickoff|auto]")
                .await;
        }
        let mode = args
            .first()
            .map(|arg| arg.to_lowercase())
            .unwrap_or_else(|| "execution".to_string());
        if !matches!(mode.as_str(), "execution" | "kickoff" | "auto") {
            return self
                .reply(chat_id, "Usage: /cycle [execution|kickoff|auto]")
                .await;
        }

        let mut cycle_args = vec![RUN_CYCLE_TOOL.to_string()];
        match mode.as_str() {
            "execution" => cycle_args.push("--execution".to_string()),
            "kickoff" => cycle_args.push("--kickoff".to_string()),
            _ => {}
        }

        self.reply(chat_id, &format!("Running cycle ({mode})..."))
            .await?;
        let out = self.runner.run(&cycle_args, RUN_CYCLE_TIMEOUT).await;
        self.report_result(chat_id, &format!("cycle:{mode}"), &out, text)
            .await
    }

    async fn handle_ask(&self, chat_id: &str, text: &str, args: &[String]) -> Result<()> {
        let Some((agent, prompt)) = self.resolve_ask_target(chat_id, text, args).await? else {
            return Ok(());
        };

        let violations = self.quarantine.violations(&prompt);
        if !violations.is_empty() {
            let preview = violations
                .iter()
                .take(MAX_VIOLATIONS_SHOWN)
                .map(|violation| format!("- {violation}"))
                .collect::<Vec<_>>()
                .join("\n");
            return self
                .reply(
                    chat_id,
                    &format!(
                        "Quarantine blocked /ask prompt.\nThe prompt contains untrusted links or injection-like instructions.\n{preview}\n\nUse allowlisted reference URLs only and avoid executable instructions.",
                    ),
                )
                .await;
        }

        self.reply(chat_id, &format!("Querying {agent}...")).await?;
        let ask_args = vec![
            PROMPT_AGENT_TOOL.to_string(),
            agent.service_name().to_string(),
            prompt,
        ];
        let out = self.runner.run(&ask_args, AGENT_PROMPT_TIMEOUT).await;
        self.report_result(chat_id, &format!("ask:{agent}"), &out, text)
            .await
    }

    /// Which agent a `/ask` goes to, and with what prompt. Replies with
    /// usage/refusal and returns `None` when the command is malformed.
    async fn resolve_ask_target(
        &self,
        chat_id: &str,
        text: &str,
        args: &[String],
    ) -> Result<Option<(AgentName, String)>> {
        let leader = self.config.leader_agent;

        if self.config.leader_only_mode {
            let Some(first) = args.first() else {
                self.reply(chat_id, &format!("Usage: /ask <prompt>  (leader: {leader})"))
                    .await?;
                return Ok(None);
            };
            if let Ok(agent) = AgentName::from_str(&first.to_lowercase()) {
                if agent != leader {
                    self.reply(
                        chat_id,
                        &format!("Leader-only mode: only {leader} is allowed for /ask."),
                    )
                    .await?;
                    return Ok(None);
                }
                if args.len() < 2 {
                    self.reply(chat_id, &format!("Usage: /ask <prompt>  (leader: {leader})"))
                        .await?;
                    return Ok(None);
                }
                return Ok(Some((leader, after_tokens(text, 2).to_string())));
            }
            return Ok(Some((leader, after_tokens(text, 1).to_string())));
        }

        if args.len() < 2 {
            self.reply(chat_id, "Usage: /ask <agent> <prompt>").await?;
            return Ok(None);
        }
        let candidate = args[0].to_lowercase();
        match AgentName::from_str(&candidate) {
            Ok(agent) => Ok(Some((agent, after_tokens(text, 2).to_string()))),
            Err(_) => {
                self.reply(chat_id, &format!("Unknown agent: {candidate}"))
                    .await?;
                Ok(None)
            }
        }
    }

    /// One `[label] PASS|FAIL` reply per invocation, then the two
    /// post-execution inspectors.
    pub(crate) async fn report_result(
        &self,
        chat_id: &str,
        label: &str,
        out: &ExecOutput,
        original_command_text: &str,
    ) -> Result<()> {
        let prefix = if out.success() { "PASS" } else { "FAIL" };
        let body = if out.output.is_empty() {
            "(no output)"
        } else {
            out.output.as_str()
        };
        self.reply(chat_id, &format!("[{label}] {prefix}\n\n{body}"))
            .await?;

        let req_id = self
            .inspect_agent_signal(chat_id, original_command_text, &out.output)
            .await?;
        if !out.success() && req_id.is_none() {
            self.inspect_blocker(chat_id, original_command_text, &out.output)
                .await?;
        }
        Ok(())
    }

    /// Agent-signal inspector: an explicit human-request marker in the
    /// output, validated by peer vote before the operator is disturbed.
    async fn inspect_agent_signal(
        &self,
        chat_id: &str,
        original_command_text: &str,
        output: &str,
    ) -> Result<Option<String>> {
        let Some(detail) = extract_human_request_detail(output) else {
            return Ok(None);
        };
        if self
            .ledger
            .has_pending_similar(chat_id, REASON_AGENT_CONSENSUS, &detail)
        {
            return Ok(None);
        }

        let mut consensus: Option<ConsensusOutcome> = None;
        if self.config.consensus_required {
            self.reply(
                chat_id,
                &format!(
                    "Agent-level human request detected.\nRunning consensus vote ({}/4 required)...",
                    self.config.consensus_min
                ),
            )
            .await?;
            let outcome = self
                .voter
                .run(&self.store, &detail, original_command_text, output)
                .await?;

            // An unobservable fleet is itself a reason to involve the
            // operator: escalate when any agent failed to vote and the
            // remaining votes did not carry the decision.
            if !outcome.record.error_agents.is_empty() && !outcome.passed() {
                let mut req = self.ledger.create(chat_id, original_command_text)?;
                req.reason = Some(REASON_AGENT_UNAVAILABLE.to_string());
                req.agent_request_reason = Some(detail.clone());
                req.consensus_run_id = Some(outcome.record.run_id.clone());
                req.consensus_artifact = Some(outcome.artifact_display());
                req.error_agents = outcome.record.error_agents.clone();
                req.note = Some(
                    "Immediate escalation: one or more agents failed during consensus."
                        .to_string(),
                );
                self.ledger.save(&req)?;
                self.reply(
                    chat_id,
                    &format!(
                        "Human intervention required (agent unavailable during consensus).\nrequest_id: {id}\ndetail: {detail}\nerror_agents: {agents}\nconsensus_yes: {yes}/4\nartifact: {artifact}\n\nApprove: /approve {id}\nReject: /reject {id}",
                        id = req.id,
                        agents = outcome.record.error_agents.join(", "),
                        yes = outcome.record.yes_count,
                        artifact = outcome.artifact_display(),
                    ),
                )
                .await?;
                self.trigger_plan_review(chat_id, &mut req, REASON_AGENT_UNAVAILABLE)
                    .await?;
                return Ok(Some(req.id.clone()));
            }

            if !outcome.passed() {
                self.reply(
                    chat_id,
                    &format!(
                        "Consensus rejected human intervention request.\ndetail: {detail}\nvotes: {yes}/4 (required: {min})\nartifact: {artifact}",
                        yes = outcome.record.yes_count,
                        min = self.config.consensus_min,
                        artifact = outcome.artifact_display(),
                    ),
                )
                .await?;
                return Ok(None);
            }
            consensus = Some(outcome);
        }

        let mut req = self.ledger.create(chat_id, original_command_text)?;
        req.reason = Some(REASON_AGENT_CONSENSUS.to_string());
        req.agent_request_reason = Some(detail.clone());
        if let Some(outcome) = &consensus {
            req.consensus_required = Some(true);
            req.consensus_min = Some(self.config.consensus_min);
            req.consensus_yes = Some(outcome.record.yes_count);
            req.consensus_run_id = Some(outcome.record.run_id.clone());
            req.consensus_artifact = Some(outcome.artifact_display());
        }
        req.note =
            Some("Auto-created from explicit [HUMAN_REQUEST] marker in agent output.".to_string());
        self.ledger.save(&req)?;
        self.reply(
            chat_id,
            &format!(
                "Human intervention requested by agent consensus.\nrequest_id: {id}\ndetail: {detail}\ncommand: {original_command_text}\n\nApprove: /approve {id}\nReject: /reject {id}",
                id = req.id,
            ),
        )
        .await?;
        self.trigger_plan_review(chat_id, &mut req, REASON_AGENT_CONSENSUS)
            .await?;
        Ok(Some(req.id))
    }

    /// Blocker inspector: recognized failure shapes in failed-command
    /// output become approvals without any agent involvement.
    async fn inspect_blocker(
        &self,
        chat_id: &str,
        original_command_text: &str,
        output: &str,
    ) -> Result<Option<String>> {
        if !self.config.auto_request_on_blocker {
            return Ok(None);
        }
        let Some(kind) = classify_blocker(output) else {
            return Ok(None);
        };
        let reason = kind.to_string();

        let mut req = self.ledger.create(chat_id, original_command_text)?;
        req.reason = Some(reason.clone());
        req.note = Some("Auto-created due to blocker detection on failed command.".to_string());
        self.ledger.save(&req)?;
        self.reply(
            chat_id,
            &format!(
                "Human intervention required.\nrequest_id: {id}\nreason: {reason}\ncommand: {original_command_text}\n\nAfter fixing, run: /approve {id}\nOr reject: /reject {id}",
                id = req.id,
            ),
        )
        .await?;
        self.trigger_plan_review(chat_id, &mut req, &reason).await?;
        Ok(Some(req.id))
    }

    /// Plan-review pass, fired at most once per record. The review command
    /// itself is disabled in the current minimal runtime profile, so this
    /// only annotates the record and tells the operator it was skipped.
    pub(crate) async fn trigger_plan_review(
        &self,
        chat_id: &str,
        req: &mut ApprovalRequest,
        reason: &str,
    ) -> Result<()> {
        if !self.config.auto_plan_review_on_pending {
            return Ok(());
        }
        if req.plan_review_triggered || req.id.trim().is_empty() {
            return Ok(());
        }

        req.plan_review_triggered = true;
        req.plan_review_triggered_at = Some(crate::util::now_utc());
        req.plan_review_exit_code = Some(0);
        req.plan_review_output_preview = Some(
            "skipped: plan-review command is disabled in current minimal runtime profile."
                .to_string(),
        );
        req.plan_review_reason = Some(reason.to_string());
        self.ledger.save(req)?;
        self.reply(
            chat_id,
            &format!(
                "[plan_review:{}] SKIP\n\nPlan-review automation is disabled in current minimal runtime.",
                req.id
            ),
        )
        .await
    }

    fn config_summary(&self) -> String {
        let mut approval_cmds: Vec<&str> = self
            .config
            .require_approval_commands
            .iter()
            .map(String::as_str)
            .collect();
        approval_cmds.sort_unstable();
        let approval_cmds = if approval_cmds.is_empty() {
            "(none)".to_string()
        } else {
            approval_cmds.join(", ")
        };

        format!(
            "approval-required: {approval_cmds}\n\
             auto-request-on-blocker: {}\n\
             pause-dev-when-pending: {}\n\
             auto-plan-review-on-pending: {}\n\
             leader-agent: {}\n\
             leader-only-mode: {}\n\
             minimal-command-mode: {}\n\
             emergency-stop-active: {}\n\
             agent-consensus: {} (min={}/4)\n\
             watchdog: {} (interval={}s)",
            self.config.auto_request_on_blocker,
            self.config.pause_dev_when_pending,
            self.config.auto_plan_review_on_pending,
            self.config.leader_agent,
            self.config.leader_only_mode,
            self.config.minimal_command_mode,
            self.store.is_emergency_stopped(),
            self.config.consensus_required,
            self.config.consensus_min,
            self.config.watchdog_enabled,
            self.config.watchdog_interval_seconds,
        )
    }

    pub fn help_text(&self) -> String {
        const MARKER_DOC: &str =
            "agent-consensus-trigger marker:\n- [HUMAN_REQUEST]: <reason>\n- [HUMAN_APPROVAL]: <reason>";
        let summary = self.config_summary();

        if self.config.minimal_command_mode {
            return format!(
                "Commands (minimal mode):\n\
                 /help\n\
                 /pending\n\
                 /approve <request_id>\n\
                 /reject <request_id>\n\
                 /status\n\
                 /cycle [execution|kickoff|auto]\n\
                 /emergency_stop [reason]\n\
                 /resume [reason]\n\
                 \n\
                 Only /cycle is allowed as a manual execution command in minimal mode.\n\
                 All other dev commands are disabled.\n\
                 Agents should request human intervention via [HUMAN_REQUEST] marker.\n\
                 \n\
                 {summary}\n\
                 \n\
                 {MARKER_DOC}"
            );
        }

        if self.config.leader_only_mode {
            return format!(
                "Commands:\n\
                 /help\n\
                 /pending\n\
                 /approve <request_id>\n\
                 /reject <request_id>\n\
                 /status\n\
                 /cycle [execution|kickoff|auto]\n\
                 /ask <prompt>  (leader: {leader})\n\
                 /emergency_stop [reason]\n\
                 /resume [reason]\n\
                 \n\
                 {summary}\n\
                 \n\
                 {MARKER_DOC}",
                leader = self.config.leader_agent,
            );
        }

        format!(
            "Commands:\n\
             /help\n\
             /pending\n\
             /approve <request_id>\n\
             /reject <request_id>\n\
             /status\n\
             /cycle [execution|kickoff|auto]\n\
             /ask <agent> <prompt>\n\
             /emergency_stop [reason]\n\
             /resume [reason]\n\
             \n\
             {summary}\n\
             \n\
             {MARKER_DOC}\n\
             \n\
             agents: gpt, claude, gemini, grok"
        )
    }
}

/// First whitespace token (anything after `@` stripped, lowercased) plus
/// the remaining tokens.
fn parse_command(text: &str) -> Option<(String, Vec<String>)> {
    let mut parts = text.split_whitespace();
    let first = parts.next()?;
    let cmd = first.split('@').next().unwrap_or(first).to_lowercase();
    Some((cmd, parts.map(str::to_string).collect()))
}

fn command_key(cmd: &str) -> String {
    cmd.trim_start_matches('/').trim().to_lowercase()
}
