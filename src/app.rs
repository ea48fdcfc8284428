// Message handling and the main dispatch loop.
//
// Each incoming message is handled to completion (parse, store, reply)
// before the next one; the ledger store serializes writes internally, so no
// further coordination is needed here.

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::entry::NewEntry;
use crate::ledger::Ledger;
use crate::parser;
use crate::replies;
use crate::telegram::{IncomingMessage, Outbound};

/// Keyword that triggers the daily totals report.
const TOTALS_KEYWORD: &str = "总计";

/// Keyword that clears today's entries for the chat.
const CLEAR_KEYWORD: &str = "清空账单";

/// Everything the message handler needs: configuration plus the injected
/// ledger store (constructed once at startup, no global state).
pub struct AppState {
    pub config: Config,
    pub ledger: Ledger,
}

impl AppState {
    pub fn new(config: Config, ledger: Ledger) -> Self {
        AppState { config, ledger }
    }
}

/// Consume incoming messages until the channel closes, sending each reply
/// through `outbound`. Delivery failures are logged and skipped; they never
/// stop the loop.
pub async fn run<O: Outbound>(
    mut rx: mpsc::Receiver<IncomingMessage>,
    outbound: O,
    state: AppState,
) -> anyhow::Result<()> {
    while let Some(msg) = rx.recv().await {
        let chat_id = msg.chat_id;
        if let Some(reply) = handle_message(&state, &msg) {
            if let Err(e) = outbound.send_text(chat_id, &reply).await {
                warn!(chat_id, "failed to deliver reply: {e:#}");
            }
        }
    }
    Ok(())
}

/// Dispatch one message and produce the reply text, if any.
///
/// Messages that are neither a command, a transaction, nor a query keyword
/// are ignored (no reply), matching how a group bot should behave amid
/// ordinary conversation.
pub fn handle_message(state: &AppState, msg: &IncomingMessage) -> Option<String> {
    let text = msg.text.trim();

    if text == "/start" || text.starts_with("/start@") {
        return Some(replies::HELP.to_string());
    }

    if text.starts_with('+') || text.starts_with('-') {
        return Some(handle_transaction(state, msg, text));
    }

    match text {
        TOTALS_KEYWORD => Some(handle_totals(state, msg.chat_id)),
        CLEAR_KEYWORD => Some(handle_clear(state, msg.chat_id)),
        _ => None,
    }
}

/// Parse and append one transaction; nothing is stored on a grammar
/// mismatch.
fn handle_transaction(state: &AppState, msg: &IncomingMessage, text: &str) -> String {
    let draft = match parser::parse_entry(text) {
        Ok(draft) => draft,
        Err(_) => return replies::FORMAT_ERROR.to_string(),
    };

    let new = NewEntry {
        chat_id: msg.chat_id,
        user_id: msg.user_id,
        user_name: msg.user_name.clone(),
        draft,
    };

    match state.ledger.append(&new) {
        Ok(entry) => {
            info!(
                chat_id = entry.chat_id,
                kind = entry.kind.as_db_str(),
                amount = entry.amount,
                "entry recorded"
            );
            replies::confirmation(&entry)
        }
        Err(e) => {
            error!(chat_id = msg.chat_id, "failed to append entry: {e:#}");
            replies::STORAGE_FAILURE.to_string()
        }
    }
}

fn handle_totals(state: &AppState, chat_id: i64) -> String {
    match state.ledger.summarize_today(chat_id) {
        Ok(summary) if summary.is_empty() => replies::NO_RECORDS_TODAY.to_string(),
        Ok(summary) => replies::daily_report(&summary),
        Err(e) => {
            error!(chat_id, "failed to summarize today: {e:#}");
            replies::STORAGE_FAILURE.to_string()
        }
    }
}

fn handle_clear(state: &AppState, chat_id: i64) -> String {
    match state.ledger.clear_today(chat_id) {
        Ok(deleted) => {
            info!(chat_id, deleted, "cleared today's entries");
            replies::CLEARED.to_string()
        }
        Err(e) => {
            error!(chat_id, "failed to clear today: {e:#}");
            replies::STORAGE_FAILURE.to_string()
        }
    }
}
