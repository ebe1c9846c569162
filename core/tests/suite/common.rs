use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use warden_core::config::Config;
use warden_core::controller::Controller;
use warden_core::error::Result;
use warden_core::exec::ExecOutput;
use warden_core::exec::ToolRunner;
use warden_core::telegram::Chat;
use warden_core::telegram::ChatTransport;
use warden_core::telegram::Message;
use warden_core::telegram::Update;

pub const OPERATOR: &str = "100";
pub const SECOND_OPERATOR: &str = "200";

/// Chat transport fake: records every outbound message and serves queued
/// update batches.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, String)>>,
    updates: Mutex<VecDeque<Vec<Update>>>,
}

impl RecordingTransport {
    pub fn queue_batch(&self, batch: Vec<Update>) {
        self.updates.lock().unwrap().push_back(batch);
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn messages_for(&self, chat_id: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(chat, _)| chat == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn fetch_updates(&self, _offset: i64) -> Result<Vec<Update>> {
        Ok(self.updates.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Tool runner fake: hands out scripted outputs in order and logs every
/// invocation. Unscripted calls succeed with a generic "ok".
#[derive(Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<Vec<String>>>,
    outputs: Mutex<VecDeque<ExecOutput>>,
}

impl ScriptedRunner {
    pub fn push_output(&self, exit_code: i32, output: &str) {
        self.outputs.lock().unwrap().push_back(ExecOutput {
            exit_code,
            output: output.to_string(),
        });
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ToolRunner for ScriptedRunner {
    async fn run(&self, args: &[String], _timeout: Duration) -> ExecOutput {
        self.calls.lock().unwrap().push(args.to_vec());
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ExecOutput {
                exit_code: 0,
                output: "ok".to_string(),
            })
    }
}

pub struct Harness {
    pub controller: Controller,
    pub transport: Arc<RecordingTransport>,
    pub runner: Arc<ScriptedRunner>,
    // Keeps the state root alive for the duration of the test.
    _state_root: TempDir,
}

pub fn base_env() -> HashMap<String, String> {
    HashMap::from([
        ("TELEGRAM_BOT_TOKEN".to_string(), "test-token".to_string()),
        (
            "TELEGRAM_ALLOWED_CHAT_IDS".to_string(),
            format!("{OPERATOR},{SECOND_OPERATOR}"),
        ),
    ])
}

pub fn harness_with(vars: HashMap<String, String>) -> Harness {
    let state_root = TempDir::new().unwrap();
    let config = Config::from_lookup(state_root.path().to_path_buf(), &vars).unwrap();
    let transport = Arc::new(RecordingTransport::default());
    let runner = Arc::new(ScriptedRunner::default());
    let controller = Controller::new(
        config,
        Arc::clone(&transport) as Arc<dyn ChatTransport>,
        Arc::clone(&runner) as Arc<dyn ToolRunner>,
    )
    .unwrap();
    Harness {
        controller,
        transport,
        runner,
        _state_root: state_root,
    }
}

pub fn harness() -> Harness {
    harness_with(base_env())
}

pub fn text_update(update_id: i64, chat_id: i64, text: &str) -> Update {
    Update {
        update_id,
        message: Some(Message {
            chat: Some(Chat { id: chat_id }),
            text: Some(text.to_string()),
        }),
    }
}

/// A well-formed yes/no vote reply, as the prompt tool would print it.
pub fn vote_json(agent: &str, requires_human: bool) -> String {
    format!(
        "{{\"agent\":\"{agent}\",\"decision\":\"{}\",\"requires_human\":{requires_human},\"confidence\":80,\"reason\":\"because\"}}",
        if requires_human { "approve" } else { "reject" },
    )
}
