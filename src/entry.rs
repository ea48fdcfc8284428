// Ledger entry data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether an entry records money coming in or going out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    /// Map the leading sign character of a message to a kind.
    pub fn from_sign(sign: char) -> Option<Self> {
        match sign {
            '+' => Some(EntryKind::Income),
            '-' => Some(EntryKind::Expense),
            _ => None,
        }
    }

    /// User-facing label used in confirmations and reports.
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Income => "收入",
            EntryKind::Expense => "支出",
        }
    }

    /// Stable identifier stored in the database.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            EntryKind::Income => "income",
            EntryKind::Expense => "expense",
        }
    }

    /// Parse the stored database identifier back into a kind.
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "income" => Some(EntryKind::Income),
            "expense" => Some(EntryKind::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The fields the parser extracts from a transaction message.
///
/// No invariant ties `quantity * unit_price` to `amount`; all three are
/// stored exactly as the sender typed them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub kind: EntryKind,
    pub quantity: f64,
    pub product_name: String,
    pub unit_price: f64,
    pub amount: f64,
}

/// A draft plus the chat/user provenance needed to append it.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub chat_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub draft: EntryDraft,
}

/// One stored ledger entry. Immutable once written; only bulk deletion by
/// (chat, local day) is supported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub kind: EntryKind,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
    pub product_name: String,
    pub created_at: DateTime<Utc>,
}
