// User-facing reply text.
//
// All strings the bot ever sends live here so the handler logic stays free
// of formatting concerns. The wording follows the original group-accounting
// bot: Chinese labels, two-decimal money, `数量×单价 元 [商品] = 总价 元`.

use chrono::Local;

use crate::entry::LedgerEntry;
use crate::ledger::DaySummary;

/// Usage text sent in response to `/start`.
pub const HELP: &str = "欢迎使用群组记账机器人！\n\
    • 发送 +数量商品名称（单价）总价 记录收入；\n\
    \u{3000}例如：+10个苹果（18）180\n\
    • 发送 -数量商品名称（单价）总价 记录支出；\n\
    • 发送“总计”查看当日明细与汇总；\n\
    • 发送“清空账单”清除今日所有记录。";

/// Grammar-mismatch reply, with one worked example of the correct shape.
pub const FORMAT_ERROR: &str =
    "❌ 格式错误，请按 +数量商品名称（单价）总价 重试，例如：+10个苹果（18）180";

/// Totals query when the chat has no entries today.
pub const NO_RECORDS_TODAY: &str = "今日暂无记录。";

/// Fixed success reply for a clear-day command.
pub const CLEARED: &str = "🗑️ 已清空今日所有记录。";

/// Generic reply when the store fails; the underlying error is logged, not
/// shown to the group.
pub const STORAGE_FAILURE: &str = "⚠️ 记账服务暂时不可用，请稍后再试。";

/// Confirmation line echoed after a successful append.
pub fn confirmation(entry: &LedgerEntry) -> String {
    format!(
        "✅ 已记录：{} {}×{:.2} 元 [{}] = {:.2} 元",
        entry.kind.label(),
        format_quantity(entry.quantity),
        entry.unit_price,
        entry.product_name,
        entry.amount,
    )
}

/// Multi-line report for a totals query: one line per entry, then income
/// total, expense total and balance. Callers handle the empty case with
/// [`NO_RECORDS_TODAY`] before rendering.
pub fn daily_report(summary: &DaySummary) -> String {
    let mut lines = vec!["📋 今日明细：".to_string()];

    for entry in &summary.entries {
        let time = entry.created_at.with_timezone(&Local).format("%H:%M:%S");
        lines.push(format!(
            "[{}] {} — {}×{:.2} 元 [{}] = {:.2} 元 （{}）",
            time,
            entry.kind.label(),
            format_quantity(entry.quantity),
            entry.unit_price,
            entry.product_name,
            entry.amount,
            entry.user_name,
        ));
    }

    lines.push(format!("\n💰 收入合计：{:.2} 元", summary.income_total));
    lines.push(format!("💸 支出合计：{:.2} 元", summary.expense_total));
    lines.push(format!("🧮 结余：{:.2} 元", summary.balance()));

    lines.join("\n")
}

/// Render a quantity without a spurious `.0` suffix: `10` stays `10`,
/// `1.5` stays `1.5`.
fn format_quantity(quantity: f64) -> String {
    if quantity.fract() == 0.0 {
        format!("{quantity:.0}")
    } else {
        quantity.to_string()
    }
}
