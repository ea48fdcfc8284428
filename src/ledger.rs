// SQLite persistence layer for ledger entries.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use rusqlite::{params, Connection};
use thiserror::Error;

use crate::entry::{EntryKind, LedgerEntry, NewEntry};

/// Totals and the ordered entry list for one chat's local calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    /// The local calendar date the summary covers.
    pub date: NaiveDate,
    /// Entries in creation order.
    pub entries: Vec<LedgerEntry>,
    /// Sum of amounts where kind = Income.
    pub income_total: f64,
    /// Sum of amounts where kind = Expense.
    pub expense_total: f64,
}

impl DaySummary {
    /// Income total minus expense total.
    pub fn balance(&self) -> f64 {
        self.income_total - self.expense_total
    }

    /// True when the day has no entries. This is the explicit "no records
    /// today" result, distinct from a storage error.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Error)]
#[error("unknown entry kind stored in database: {0}")]
struct UnknownKind(String);

/// SQLite-backed append-only store of ledger entries, scoped by chat.
///
/// The connection sits behind a `Mutex`, which serializes writers; reads and
/// writes for different chats need no further coordination.
pub struct Ledger {
    conn: Mutex<Connection>,
}

impl Ledger {
    /// Open (or create) the ledger database at `path` and ensure the schema
    /// exists. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS entries (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id      INTEGER NOT NULL,
                user_id      INTEGER NOT NULL,
                user_name    TEXT NOT NULL,
                kind         TEXT NOT NULL CHECK (kind IN ('income', 'expense')),
                quantity     REAL NOT NULL,
                unit_price   REAL NOT NULL,
                amount       REAL NOT NULL,
                product_name TEXT NOT NULL,
                created_at   TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entries_chat_created
                ON entries(chat_id, created_at);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("ledger mutex poisoned")
    }

    /// Append one entry with a server-assigned timestamp. Returns the stored
    /// row, including its id and creation time.
    pub fn append(&self, new: &NewEntry) -> Result<LedgerEntry> {
        self.append_at(new, Utc::now())
    }

    /// Append with an explicit creation time. Only `append` and the tests
    /// call this; production timestamps are always `Utc::now()`.
    fn append_at(&self, new: &NewEntry, created_at: DateTime<Utc>) -> Result<LedgerEntry> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO entries
                (chat_id, user_id, user_name, kind, quantity, unit_price, amount, product_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                new.chat_id,
                new.user_id,
                new.user_name,
                new.draft.kind.as_db_str(),
                new.draft.quantity,
                new.draft.unit_price,
                new.draft.amount,
                new.draft.product_name,
                format_timestamp(created_at),
            ],
        )
        .context("failed to append ledger entry")?;

        Ok(LedgerEntry {
            id: conn.last_insert_rowid(),
            chat_id: new.chat_id,
            user_id: new.user_id,
            user_name: new.user_name.clone(),
            kind: new.draft.kind,
            quantity: new.draft.quantity,
            unit_price: new.draft.unit_price,
            amount: new.draft.amount,
            product_name: new.draft.product_name.clone(),
            created_at,
        })
    }

    /// Summarize the current local calendar day for one chat: the ordered
    /// entries plus income/expense totals. An empty summary is a normal
    /// result, not an error.
    pub fn summarize_today(&self, chat_id: i64) -> Result<DaySummary> {
        self.summarize_day(chat_id, Local::now().date_naive())
    }

    /// Summarize an arbitrary local calendar day for one chat.
    pub fn summarize_day(&self, chat_id: i64, date: NaiveDate) -> Result<DaySummary> {
        let (start, end) = utc_range_for_local_day(date);

        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, chat_id, user_id, user_name, kind, quantity, unit_price, amount, product_name, created_at
                 FROM entries
                 WHERE chat_id = ?1 AND created_at >= ?2 AND created_at < ?3
                 ORDER BY created_at, id",
            )
            .context("failed to prepare day summary query")?;

        let entries = stmt
            .query_map(
                params![chat_id, format_timestamp(start), format_timestamp(end)],
                entry_from_row,
            )
            .context("failed to query ledger entries")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map ledger entry rows")?;

        let mut income_total = 0.0;
        let mut expense_total = 0.0;
        for entry in &entries {
            match entry.kind {
                EntryKind::Income => income_total += entry.amount,
                EntryKind::Expense => expense_total += entry.amount,
            }
        }

        Ok(DaySummary {
            date,
            entries,
            income_total,
            expense_total,
        })
    }

    /// Delete all of one chat's entries for the current local calendar day.
    /// Returns the number of rows deleted (zero when there was nothing to
    /// delete); calling it again is a no-op.
    pub fn clear_today(&self, chat_id: i64) -> Result<usize> {
        let (start, end) = utc_range_for_local_day(Local::now().date_naive());

        let conn = self.conn();
        let deleted = conn
            .execute(
                "DELETE FROM entries
                 WHERE chat_id = ?1 AND created_at >= ?2 AND created_at < ?3",
                params![chat_id, format_timestamp(start), format_timestamp(end)],
            )
            .context("failed to clear today's entries")?;
        Ok(deleted)
    }
}

/// Fixed-width RFC 3339 UTC representation (millisecond precision). The
/// fixed width keeps lexicographic comparison in SQL equivalent to
/// chronological comparison.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The UTC half-open range `[start, end)` covering one local calendar day.
///
/// The day boundary is re-derived from the stored timestamps on every query
/// rather than frozen into the rows at insertion time.
fn utc_range_for_local_day(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = date.succ_opt().unwrap_or(NaiveDate::MAX);
    (local_midnight_utc(date), local_midnight_utc(next))
}

/// Local midnight of `date` converted to UTC. Around DST transitions an
/// ambiguous midnight resolves to the earlier instant, and a skipped
/// midnight falls back to interpreting the naive time as UTC.
fn local_midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match naive.and_local_timezone(Local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
        LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}

/// Map one `entries` row to a [`LedgerEntry`].
fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let kind_str: String = row.get(4)?;
    let kind = EntryKind::from_db_str(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            Box::new(UnknownKind(kind_str.clone())),
        )
    })?;

    let created_str: String = row.get(9)?;
    let created_at = DateTime::parse_from_rfc3339(&created_str)
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                9,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?
        .with_timezone(&Utc);

    Ok(LedgerEntry {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        user_id: row.get(2)?,
        user_name: row.get(3)?,
        kind,
        quantity: row.get(5)?,
        unit_price: row.get(6)?,
        amount: row.get(7)?,
        product_name: row.get(8)?,
        created_at,
    })
}
