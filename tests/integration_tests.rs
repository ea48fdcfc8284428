// Integration tests for the group ledger bot.
//
// These tests exercise the full pipeline end-to-end using the library
// crate's public API: incoming messages flow through the dispatch loop, the
// parser, and the SQLite store, and the replies come back through the
// Outbound seam exactly as they would over the Bot API.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use tallybot::app::{self, AppState};
use tallybot::config::{Config, TelegramConfig};
use tallybot::ledger::Ledger;
use tallybot::replies;
use tallybot::telegram::{IncomingMessage, Outbound};

// ===========================================================================
// Test helpers
// ===========================================================================

const GROUP_CHAT: i64 = -100123;
const OTHER_CHAT: i64 = -100456;

/// Outbound implementation that records every reply instead of hitting the
/// network.
#[derive(Clone, Default)]
struct RecordingOutbound {
    sent: Arc<Mutex<Vec<(i64, String)>>>,
}

#[async_trait]
impl Outbound for RecordingOutbound {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id, text.to_string()));
        Ok(())
    }
}

impl RecordingOutbound {
    fn replies(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

/// Build a test-ready AppState over an in-memory ledger.
fn inline_state() -> AppState {
    let config = Config {
        telegram: TelegramConfig {
            token: "integration-test-token".to_string(),
            poll_timeout_secs: 30,
        },
        db_path: ":memory:".to_string(),
    };
    let ledger = Ledger::open(":memory:").expect("in-memory ledger should open");
    AppState::new(config, ledger)
}

fn from_user(chat_id: i64, user_id: i64, user_name: &str, text: &str) -> IncomingMessage {
    IncomingMessage {
        chat_id,
        user_id,
        user_name: user_name.to_string(),
        text: text.to_string(),
    }
}

// ===========================================================================
// Full conversation through the dispatch loop
// ===========================================================================

#[tokio::test]
async fn full_conversation_round_trip() {
    let state = inline_state();
    let outbound = RecordingOutbound::default();
    let (tx, rx) = mpsc::channel(64);

    let loop_handle = tokio::spawn(app::run(rx, outbound.clone(), state));

    let script = [
        "/start",
        "+10个苹果（18）180",
        "-3螺丝(0.5)1.5",
        "这条闲聊不应该有回复",
        "总计",
        "清空账单",
        "总计",
    ];
    for text in script {
        tx.send(from_user(GROUP_CHAT, 42, "张三", text))
            .await
            .unwrap();
    }
    drop(tx);
    loop_handle.await.unwrap().unwrap();

    let replies_sent = outbound.replies();
    // The chatter line produces no reply, so 7 messages yield 6 replies.
    assert_eq!(replies_sent.len(), 6);
    assert!(replies_sent.iter().all(|(chat, _)| *chat == GROUP_CHAT));

    assert_eq!(replies_sent[0].1, replies::HELP);
    assert!(replies_sent[1]
        .1
        .contains("已记录：收入 10×18.00 元 [个苹果] = 180.00 元"));
    assert!(replies_sent[2]
        .1
        .contains("已记录：支出 3×0.50 元 [螺丝] = 1.50 元"));

    let report = &replies_sent[3].1;
    assert!(report.contains("今日明细"));
    assert!(report.contains("（张三）"));
    assert!(report.contains("收入合计：180.00 元"));
    assert!(report.contains("支出合计：1.50 元"));
    assert!(report.contains("结余：178.50 元"));

    assert_eq!(replies_sent[4].1, replies::CLEARED);
    assert_eq!(replies_sent[5].1, replies::NO_RECORDS_TODAY);
}

#[tokio::test]
async fn malformed_messages_reject_without_storing() {
    let state = inline_state();
    let outbound = RecordingOutbound::default();
    let (tx, rx) = mpsc::channel(64);

    let loop_handle = tokio::spawn(app::run(rx, outbound.clone(), state));

    for text in ["+个苹果（18）180", "-10个苹果 18 180", "+10个苹果（18）", "总计"] {
        tx.send(from_user(GROUP_CHAT, 42, "张三", text))
            .await
            .unwrap();
    }
    drop(tx);
    loop_handle.await.unwrap().unwrap();

    let replies_sent = outbound.replies();
    assert_eq!(replies_sent.len(), 4);
    for (_, reply) in &replies_sent[..3] {
        assert_eq!(reply, replies::FORMAT_ERROR);
    }
    // Nothing was stored, so the totals query reports the explicit empty day.
    assert_eq!(replies_sent[3].1, replies::NO_RECORDS_TODAY);
}

#[tokio::test]
async fn chats_are_isolated_end_to_end() {
    let state = inline_state();
    let outbound = RecordingOutbound::default();
    let (tx, rx) = mpsc::channel(64);

    let loop_handle = tokio::spawn(app::run(rx, outbound.clone(), state));

    tx.send(from_user(GROUP_CHAT, 1, "张三", "+10个苹果（18）180"))
        .await
        .unwrap();
    tx.send(from_user(OTHER_CHAT, 2, "李四", "-3螺丝(0.5)1.5"))
        .await
        .unwrap();
    // Clearing GROUP_CHAT must not touch OTHER_CHAT.
    tx.send(from_user(GROUP_CHAT, 1, "张三", "清空账单"))
        .await
        .unwrap();
    tx.send(from_user(GROUP_CHAT, 1, "张三", "总计")).await.unwrap();
    tx.send(from_user(OTHER_CHAT, 2, "李四", "总计")).await.unwrap();
    drop(tx);
    loop_handle.await.unwrap().unwrap();

    let replies_sent = outbound.replies();
    assert_eq!(replies_sent.len(), 5);

    let group_totals = &replies_sent[3];
    assert_eq!(group_totals.0, GROUP_CHAT);
    assert_eq!(group_totals.1, replies::NO_RECORDS_TODAY);

    let other_totals = &replies_sent[4];
    assert_eq!(other_totals.0, OTHER_CHAT);
    assert!(other_totals.1.contains("螺丝"));
    assert!(other_totals.1.contains("（李四）"));
    assert!(other_totals.1.contains("支出合计：1.50 元"));
}

// ===========================================================================
// Store-level behavior through the public API
// ===========================================================================

#[test]
fn report_lines_carry_entry_times_and_users() {
    let state = inline_state();

    let msg = from_user(GROUP_CHAT, 7, "王五", "+2鸡蛋（3）6");
    app::handle_message(&state, &msg).unwrap();

    let summary = state.ledger.summarize_today(GROUP_CHAT).unwrap();
    assert_eq!(summary.entries.len(), 1);

    let report = replies::daily_report(&summary);
    // One line per entry: [time] kind — qty×price [name] = amount （user）.
    let entry_line = report
        .lines()
        .find(|l| l.contains("鸡蛋"))
        .expect("report should contain the entry line");
    assert!(entry_line.starts_with('['));
    assert!(entry_line.contains("收入 — 2×3.00 元 [鸡蛋] = 6.00 元 （王五）"));
}

#[test]
fn amounts_are_stored_exactly_as_sent() {
    let state = inline_state();

    // 4 × 7 ≠ 30: the inconsistent total is preserved, not corrected.
    app::handle_message(&state, &from_user(GROUP_CHAT, 7, "王五", "+4笔记本(7)30")).unwrap();

    let summary = state.ledger.summarize_today(GROUP_CHAT).unwrap();
    let entry = &summary.entries[0];
    assert_eq!(entry.quantity, 4.0);
    assert_eq!(entry.unit_price, 7.0);
    assert_eq!(entry.amount, 30.0);
    assert_eq!(summary.income_total, 30.0);
}
