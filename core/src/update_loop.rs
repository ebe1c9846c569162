//! Long-poll update loop.
//!
//! Single logical thread of control: updates are processed strictly in the
//! order the server returns them, the poll cursor is persisted before each
//! dispatch, and the watchdog only runs at batch boundaries so it never
//! interleaves with dispatcher work.

use std::time::Duration;
use std::time::Instant;

use tracing::error;
use tracing::info;
use tracing::warn;

use crate::controller::Controller;
use crate::error::Result;
use crate::telegram::Update;

const TRANSPORT_ERROR_PAUSE: Duration = Duration::from_secs(3);
const UNEXPECTED_ERROR_PAUSE: Duration = Duration::from_secs(2);

impl Controller {
    /// Handle one update: advance and persist the cursor, then dispatch if
    /// the message is addressable and the chat is allowlisted.
    pub async fn process_update(&self, update: Update) -> Result<()> {
        let mut cursor = self.store.load_cursor();
        cursor.offset = cursor.offset.max(update.update_id + 1);
        self.store.save_cursor(cursor)?;

        let Some(message) = update.message else {
            return Ok(());
        };
        let Some(text) = message.text else {
            return Ok(());
        };
        if text.is_empty() {
            return Ok(());
        }
        let Some(chat) = message.chat else {
            return Ok(());
        };

        let chat_id = chat.id.to_string();
        if !self.config.is_allowed_chat(&chat_id) {
            info!("dropping update from unauthorized chat {chat_id}");
            if let Err(err) = self.transport.send_message(&chat_id, "Unauthorized chat.").await {
                warn!("courtesy reply to unauthorized chat failed: {err}");
            }
            return Ok(());
        }

        self.handle_command(&chat_id, &text, false).await
    }

    /// One long-poll cycle: fetch from the persisted cursor and process
    /// the batch in order.
    pub async fn poll_once(&self) -> Result<()> {
        let offset = self.store.load_cursor().offset;
        let updates = self.transport.fetch_updates(offset).await?;
        for update in updates {
            self.process_update(update).await?;
        }
        Ok(())
    }
}

/// Drive the controller until the process is terminated. Transport errors
/// pause briefly and retry; anything else is logged and the loop carries
/// on — only SIGINT (handled by the binary) ends it.
pub async fn run(controller: &Controller) -> Result<()> {
    let watchdog_interval = Duration::from_secs(controller.config().watchdog_interval_seconds);
    let mut last_watchdog_tick: Option<Instant> = None;

    loop {
        let cycle: Result<()> = async {
            controller.poll_once().await?;

            if controller.config().watchdog_enabled
                && last_watchdog_tick
                    .is_none_or(|tick| tick.elapsed() >= watchdog_interval)
            {
                controller.watchdog_tick().await?;
                last_watchdog_tick = Some(Instant::now());
            }
            Ok(())
        }
        .await;

        if let Err(err) = cycle {
            if err.is_transport() {
                warn!("transport error, retrying: {err}");
                tokio::time::sleep(TRANSPORT_ERROR_PAUSE).await;
            } else {
                error!("update cycle failed: {err}");
                tokio::time::sleep(UNEXPECTED_ERROR_PAUSE).await;
            }
        }
    }
}
