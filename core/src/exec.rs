//! Tool invocation: spawn, wait with a hard wall-clock timeout, capture.
//!
//! A tool failure is data for the dispatcher and the classifiers, never an
//! `Err` — every outcome is an [`ExecOutput`] with a conventional exit code.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::util::truncate_chars;

/// Captured combined output is capped well above any chat chunk size so the
/// classifiers still see enough context.
pub const MAX_CAPTURED_OUTPUT_CHARS: usize = 15_000;
const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Conventional `timeout(1)` exit code.
pub const EXEC_TIMEOUT_EXIT_CODE: i32 = 124;
const SPAWN_FAILURE_EXIT_CODE: i32 = 127;
#[cfg(unix)]
const EXIT_CODE_SIGNAL_BASE: i32 = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub output: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// The seam between the control plane and the external tool surface. The
/// controller contracts on exit code + combined text output and nothing
/// else, so tests swap in scripted runners.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, args: &[String], timeout: Duration) -> ExecOutput;
}

/// Production runner: spawns the tool with the repository root as working
/// directory and the parent environment.
pub struct ProcessRunner {
    root_dir: PathBuf,
}

impl ProcessRunner {
    pub fn new(root_dir: PathBuf) -> Self {
        Self { root_dir }
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, args: &[String], timeout: Duration) -> ExecOutput {
        let Some((program, rest)) = args.split_first() else {
            return ExecOutput {
                exit_code: SPAWN_FAILURE_EXIT_CODE,
                output: "empty command".to_string(),
            };
        };
        debug!("running tool: {args:?}");

        let mut command = Command::new(program);
        command
            .args(rest)
            .current_dir(&self.root_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                return ExecOutput {
                    exit_code: SPAWN_FAILURE_EXIT_CODE,
                    output: format!("failed to spawn {program}: {err}"),
                };
            }
        };

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                ExecOutput {
                    exit_code: exit_code_of(&output.status),
                    output: cap_output(combined.trim()),
                }
            }
            Ok(Err(err)) => ExecOutput {
                exit_code: SPAWN_FAILURE_EXIT_CODE,
                output: format!("failed to collect output from {program}: {err}"),
            },
            // The dropped future kills the child (kill_on_drop).
            Err(_) => ExecOutput {
                exit_code: EXEC_TIMEOUT_EXIT_CODE,
                output: format!("command timed out after {}s: {program}", timeout.as_secs()),
            },
        }
    }
}

#[cfg(unix)]
fn exit_code_of(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    match status.code() {
        Some(code) => code,
        // Conventional shell mapping for signal deaths.
        None => EXIT_CODE_SIGNAL_BASE + status.signal().unwrap_or(0),
    }
}

#[cfg(not(unix))]
fn exit_code_of(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

fn cap_output(combined: &str) -> String {
    let capped = truncate_chars(combined, MAX_CAPTURED_OUTPUT_CHARS);
    if capped.len() < combined.len() {
        format!("{capped}{TRUNCATION_MARKER}")
    } else {
        combined.to_string()
    }
}
