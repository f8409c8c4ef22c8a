//! SQLite-backed period ledger — the sole source of truth for "this
//! period's report was already delivered".
//!
//! One table per cadence, each keyed by (subscriber, year, week|month)
//! with a UNIQUE constraint, so `mark_sent` is an atomic
//! insert-if-absent rather than a racy check-then-write. Entries are
//! immutable once written.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use sitepulse_core::error::{PulseError, Result};
use sitepulse_core::types::Period;

/// Durable record of fulfilled report periods.
pub struct ReportLedger {
    conn: Mutex<Connection>,
}

impl ReportLedger {
    /// Open or create the ledger database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| PulseError::Ledger(format!("DB open: {e}")))?;
        let ledger = Self { conn: Mutex::new(conn) };
        ledger.migrate()?;
        Ok(ledger)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS weekly_reports (
                subscriber_id INTEGER NOT NULL,
                year INTEGER NOT NULL,           -- ISO week-numbering year
                week INTEGER NOT NULL,           -- ISO week, 1..53
                sent_at TEXT NOT NULL,
                UNIQUE (subscriber_id, year, week)
            );

            CREATE TABLE IF NOT EXISTS monthly_reports (
                subscriber_id INTEGER NOT NULL,
                year INTEGER NOT NULL,
                month INTEGER NOT NULL,          -- 1..12
                sent_at TEXT NOT NULL,
                UNIQUE (subscriber_id, year, month)
            );
         ",
            )
            .map_err(|e| PulseError::Ledger(format!("Migration: {e}")))?;
        Ok(())
    }

    /// True iff a report for this (subscriber, period) was already sent.
    pub fn has_sent(&self, subscriber_id: i64, period: Period) -> Result<bool> {
        let (table, column, year, unit) = decompose(period);
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM {table} WHERE subscriber_id = ?1 AND year = ?2 AND {column} = ?3"
                ),
                rusqlite::params![subscriber_id, year, unit],
                |row| row.get(0),
            )
            .map_err(|e| PulseError::Ledger(format!("Query: {e}")))?;
        Ok(count > 0)
    }

    /// Record a fulfilled period. Insert-if-absent: returns `true` when
    /// a new entry was written, `false` when the key already existed
    /// (a concurrent or retried run got there first).
    pub fn mark_sent(&self, subscriber_id: i64, period: Period, at: DateTime<Utc>) -> Result<bool> {
        let (table, column, year, unit) = decompose(period);
        let conn = self.conn.lock().unwrap();
        let inserted = conn
            .execute(
                &format!(
                    "INSERT OR IGNORE INTO {table} (subscriber_id, year, {column}, sent_at)
                     VALUES (?1, ?2, ?3, ?4)"
                ),
                rusqlite::params![subscriber_id, year, unit, at.to_rfc3339()],
            )
            .map_err(|e| PulseError::Ledger(format!("Insert: {e}")))?;
        Ok(inserted > 0)
    }

    /// Bulk "already sent" lookup for a candidate batch: one query per
    /// distinct period in the batch (a run sees at most a handful of
    /// periods across all timezones), never one per subscriber.
    pub fn sent_in_periods(&self, periods: &[Period]) -> Result<HashSet<(i64, Period)>> {
        let distinct: HashSet<Period> = periods.iter().copied().collect();
        let conn = self.conn.lock().unwrap();
        let mut sent = HashSet::new();
        for period in distinct {
            let (table, column, year, unit) = decompose(period);
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT subscriber_id FROM {table} WHERE year = ?1 AND {column} = ?2"
                ))
                .map_err(|e| PulseError::Ledger(format!("Prepare: {e}")))?;
            let rows = stmt
                .query_map(rusqlite::params![year, unit], |row| row.get::<_, i64>(0))
                .map_err(|e| PulseError::Ledger(format!("Query: {e}")))?;
            for row in rows {
                let id = row.map_err(|e| PulseError::Ledger(format!("Row: {e}")))?;
                sent.insert((id, period));
            }
        }
        Ok(sent)
    }
}

fn decompose(period: Period) -> (&'static str, &'static str, i32, u32) {
    match period {
        Period::Weekly { iso_year, iso_week } => ("weekly_reports", "week", iso_year, iso_week),
        Period::Monthly { year, month } => ("monthly_reports", "month", year, month),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp(name: &str) -> (ReportLedger, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).ok();
        (ReportLedger::open(&dir.join("ledger.db")).unwrap(), dir)
    }

    #[test]
    fn test_mark_and_query() {
        let (ledger, dir) = open_temp("sitepulse-ledger-mark");
        let period = Period::Weekly { iso_year: 2026, iso_week: 2 };
        assert!(!ledger.has_sent(7, period).unwrap());
        assert!(ledger.mark_sent(7, period, Utc::now()).unwrap());
        assert!(ledger.has_sent(7, period).unwrap());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_mark_sent_is_insert_if_absent() {
        let (ledger, dir) = open_temp("sitepulse-ledger-dup");
        let period = Period::Monthly { year: 2026, month: 9 };
        assert!(ledger.mark_sent(3, period, Utc::now()).unwrap());
        // Second write for the same key is a no-op, not an error.
        assert!(!ledger.mark_sent(3, period, Utc::now()).unwrap());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_cadences_do_not_collide() {
        let (ledger, dir) = open_temp("sitepulse-ledger-cadence");
        // Same numeric key in both tables stays independent.
        ledger.mark_sent(5, Period::Weekly { iso_year: 2026, iso_week: 9 }, Utc::now()).unwrap();
        assert!(!ledger.has_sent(5, Period::Monthly { year: 2026, month: 9 }).unwrap());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_bulk_sent_in_periods() {
        let (ledger, dir) = open_temp("sitepulse-ledger-bulk");
        let w2 = Period::Weekly { iso_year: 2026, iso_week: 2 };
        let w3 = Period::Weekly { iso_year: 2026, iso_week: 3 };
        ledger.mark_sent(1, w2, Utc::now()).unwrap();
        ledger.mark_sent(2, w2, Utc::now()).unwrap();
        ledger.mark_sent(1, w3, Utc::now()).unwrap();

        let sent = ledger.sent_in_periods(&[w2, w2, w3]).unwrap();
        assert!(sent.contains(&(1, w2)));
        assert!(sent.contains(&(2, w2)));
        assert!(sent.contains(&(1, w3)));
        assert!(!sent.contains(&(2, w3)));
        std::fs::remove_dir_all(&dir).ok();
    }
}
