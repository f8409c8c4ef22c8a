//! Subscriber and subscription store.
//!
//! The dispatcher only ever reads this data; rows are created and
//! edited by the account-management surface. At most one enabled
//! subscription exists per (subscriber, cadence), enforced with a
//! UNIQUE constraint.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::Connection;

use sitepulse_core::error::{PulseError, Result};
use sitepulse_core::types::{Cadence, ReportSubscription};

/// Read interface the dispatcher enumerates candidates from.
pub trait SubscriberSource: Send + Sync {
    /// All enabled subscriptions for `cadence`, with a non-empty
    /// recipient list.
    fn active_subscriptions(&self, cadence: Cadence) -> Result<Vec<ReportSubscription>>;
}

/// SQLite-backed subscriber store.
pub struct SqliteSubscribers {
    conn: Mutex<Connection>,
}

impl SqliteSubscribers {
    /// Open or create the subscriber database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| PulseError::Subscribers(format!("DB open: {e}")))?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS subscribers (
                id INTEGER PRIMARY KEY,
                public_id TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                timezone TEXT NOT NULL DEFAULT 'UTC'
            );

            CREATE TABLE IF NOT EXISTS report_subscriptions (
                subscriber_id INTEGER NOT NULL,
                cadence TEXT NOT NULL,           -- 'weekly' or 'monthly'
                recipients TEXT NOT NULL DEFAULT '[]',  -- JSON array of addresses
                enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                UNIQUE (subscriber_id, cadence),
                FOREIGN KEY (subscriber_id) REFERENCES subscribers(id) ON DELETE CASCADE
            );
         ",
            )
            .map_err(|e| PulseError::Subscribers(format!("Migration: {e}")))?;
        Ok(())
    }

    /// Insert or update a subscriber record.
    pub fn upsert_subscriber(
        &self,
        id: i64,
        public_id: &str,
        display_name: &str,
        timezone: &str,
    ) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT OR REPLACE INTO subscribers (id, public_id, display_name, timezone)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id, public_id, display_name, timezone],
            )
            .map_err(|e| PulseError::Subscribers(format!("Upsert subscriber: {e}")))?;
        Ok(())
    }

    /// Create or replace the subscription for (subscriber, cadence).
    pub fn set_subscription(
        &self,
        subscriber_id: i64,
        cadence: Cadence,
        recipients: &[String],
        enabled: bool,
    ) -> Result<()> {
        let recipients_json = serde_json::to_string(recipients)
            .map_err(|e| PulseError::Subscribers(format!("Encode recipients: {e}")))?;
        self.conn
            .lock()
            .unwrap()
            .execute(
                "INSERT OR REPLACE INTO report_subscriptions
                 (subscriber_id, cadence, recipients, enabled, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    subscriber_id,
                    cadence.as_str(),
                    recipients_json,
                    enabled as i32,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| PulseError::Subscribers(format!("Set subscription: {e}")))?;
        Ok(())
    }
}

impl SubscriberSource for SqliteSubscribers {
    fn active_subscriptions(&self, cadence: Cadence) -> Result<Vec<ReportSubscription>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT s.id, s.public_id, s.display_name, s.timezone, r.recipients
                 FROM subscribers s
                 JOIN report_subscriptions r ON r.subscriber_id = s.id
                 WHERE r.cadence = ?1 AND r.enabled = 1
                 ORDER BY s.id",
            )
            .map_err(|e| PulseError::Subscribers(format!("Prepare: {e}")))?;

        let rows = stmt
            .query_map([cadence.as_str()], |row| {
                let subscriber_id: i64 = row.get(0)?;
                let public_id: String = row.get(1)?;
                let display_name: String = row.get(2)?;
                let timezone: String = row.get(3)?;
                let recipients_json: String = row.get(4)?;
                Ok((subscriber_id, public_id, display_name, timezone, recipients_json))
            })
            .map_err(|e| PulseError::Subscribers(format!("Query: {e}")))?;

        let mut subscriptions = Vec::new();
        for row in rows {
            let (subscriber_id, public_id, display_name, timezone, recipients_json) =
                row.map_err(|e| PulseError::Subscribers(format!("Row: {e}")))?;
            let recipients: Vec<String> =
                serde_json::from_str(&recipients_json).unwrap_or_default();
            if recipients.is_empty() {
                // Subscriptions without recipients are inert, not errors.
                continue;
            }
            subscriptions.push(ReportSubscription {
                subscriber_id,
                public_id,
                display_name,
                timezone,
                cadence,
                recipients,
            });
        }
        Ok(subscriptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp(name: &str) -> (SqliteSubscribers, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(name);
        std::fs::create_dir_all(&dir).ok();
        (SqliteSubscribers::open(&dir.join("subscribers.db")).unwrap(), dir)
    }

    #[test]
    fn test_active_subscriptions_per_cadence() {
        let (store, dir) = open_temp("sitepulse-subs-cadence");
        store.upsert_subscriber(1, "site-a", "a.example.com", "America/New_York").unwrap();
        store.upsert_subscriber(2, "site-b", "b.example.com", "Asia/Tokyo").unwrap();
        store.set_subscription(1, Cadence::Weekly, &["owner@a.example.com".into()], true).unwrap();
        store.set_subscription(2, Cadence::Monthly, &["owner@b.example.com".into()], true).unwrap();

        let weekly = store.active_subscriptions(Cadence::Weekly).unwrap();
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].public_id, "site-a");
        assert_eq!(weekly[0].timezone, "America/New_York");

        let monthly = store.active_subscriptions(Cadence::Monthly).unwrap();
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].subscriber_id, 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_disabled_and_empty_subscriptions_excluded() {
        let (store, dir) = open_temp("sitepulse-subs-disabled");
        store.upsert_subscriber(1, "site-a", "a.example.com", "UTC").unwrap();
        store.upsert_subscriber(2, "site-b", "b.example.com", "UTC").unwrap();
        store.set_subscription(1, Cadence::Weekly, &["x@a.example.com".into()], false).unwrap();
        store.set_subscription(2, Cadence::Weekly, &[], true).unwrap();

        assert!(store.active_subscriptions(Cadence::Weekly).unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_one_subscription_per_cadence() {
        let (store, dir) = open_temp("sitepulse-subs-unique");
        store.upsert_subscriber(1, "site-a", "a.example.com", "UTC").unwrap();
        store.set_subscription(1, Cadence::Weekly, &["old@a.example.com".into()], true).unwrap();
        store.set_subscription(1, Cadence::Weekly, &["new@a.example.com".into()], true).unwrap();

        let weekly = store.active_subscriptions(Cadence::Weekly).unwrap();
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].recipients, vec!["new@a.example.com".to_string()]);
        std::fs::remove_dir_all(&dir).ok();
    }
}
