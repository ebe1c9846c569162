use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use warden_core::config::Config;
use warden_core::controller::Controller;
use warden_core::error::WardenErr;
use warden_core::exec::ProcessRunner;
use warden_core::telegram::TelegramClient;
use warden_core::update_loop;

/// Human-in-the-loop control plane for the agent fleet.
///
/// Bridges the operator chat and the local tool scripts, mediating every
/// command through the approval ledger, the consensus vote, the
/// emergency-stop latch and the health watchdog. Configuration comes from
/// the environment; see the repository README for the variable list.
#[derive(Debug, Parser)]
#[clap(name = "warden", version)]
struct Cli {
    /// Repository root the tool scripts are invoked from; state lives
    /// under <ROOT>/autonomy/state.
    #[arg(long, value_name = "DIR", default_value = ".")]
    root: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let config = match Config::from_env(cli.root) {
        Ok(config) => config,
        Err(err @ WardenErr::MissingConfig(_)) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let transport = Arc::new(TelegramClient::new(
        &config.bot_token,
        config.poll_timeout_seconds,
        config.max_output_chars,
    )?);
    let runner = Arc::new(ProcessRunner::new(config.root_dir.clone()));
    let controller = Controller::new(config, transport, runner)?;

    let config = controller.config();
    info!("warden started");
    info!("allowed chats: {:?}", config.allowed_chat_ids);
    info!("leader-agent: {}", config.leader_agent);
    info!("leader-only-mode: {}", config.leader_only_mode);
    info!("minimal-command-mode: {}", config.minimal_command_mode);
    info!(
        "emergency-stop-active: {}",
        controller.store().is_emergency_stopped()
    );
    info!(
        "agent-consensus-required: {} (min={}/4)",
        config.consensus_required, config.consensus_min
    );
    info!(
        "watchdog-enabled: {} (interval={}s, timeout={}s)",
        config.watchdog_enabled, config.watchdog_interval_seconds, config.watchdog_timeout_seconds
    );

    tokio::select! {
        result = update_loop::run(&controller) => result.map_err(Into::into),
        _ = tokio::signal::ctrl_c() => {
            info!("stopped");
            Ok(())
        }
    }
}
