//! Data model for periodic report dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recurrence class of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Weekly,
    Monthly,
}

impl Cadence {
    /// Stable name used in storage, URLs, and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Weekly => "weekly",
            Cadence::Monthly => "monthly",
        }
    }

    /// Both cadences, in dispatch order.
    pub fn all() -> [Cadence; 2] {
        [Cadence::Weekly, Cadence::Monthly]
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar key naming one occurrence of a cadence.
///
/// Weekly periods use the ISO week calendar of the subscriber's local
/// timezone; monthly periods use the local civil calendar. Keys are
/// monotonically non-decreasing in wall-clock time for a fixed
/// subscriber and cadence, and unique within that scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    Weekly { iso_year: i32, iso_week: u32 },
    Monthly { year: i32, month: u32 },
}

impl Period {
    pub fn cadence(&self) -> Cadence {
        match self {
            Period::Weekly { .. } => Cadence::Weekly,
            Period::Monthly { .. } => Cadence::Monthly,
        }
    }

    /// Human-readable label used in email subjects ("Week 34, 2026",
    /// "August 2026").
    pub fn label(&self) -> String {
        match *self {
            Period::Weekly { iso_year, iso_week } => format!("Week {iso_week}, {iso_year}"),
            Period::Monthly { year, month } => {
                format!("{} {year}", month_name(month))
            }
        }
    }
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}

/// Half-open UTC interval `[start, end)` that a report covers.
///
/// Always derived from local calendar boundaries in the subscriber's
/// timezone, then converted to UTC for querying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// One active subscription as read from the subscriber store: who to
/// report on, in which timezone, and where to deliver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSubscription {
    /// Internal subscriber id (ledger key).
    pub subscriber_id: i64,
    /// Public identifier embedded in unsubscribe links.
    pub public_id: String,
    /// Display name used in the email body ("yoursite.com").
    pub display_name: String,
    /// IANA timezone name, e.g. "America/New_York".
    pub timezone: String,
    pub cadence: Cadence,
    /// Non-empty set of recipient addresses.
    pub recipients: Vec<String>,
}

/// A labeled count (referrer hostname, page path, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCount {
    pub label: String,
    pub count: u64,
}

/// Aggregated metrics for one report period, with comparisons against
/// the immediately preceding equivalent period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsPayload {
    pub pageviews: u64,
    /// Signed change vs. the prior period.
    pub pageviews_delta: i64,
    pub visitors: u64,
    pub visitors_delta: i64,
    /// Fraction in `0.0..=1.0`.
    pub bounce_rate: f64,
    pub bounce_rate_delta: f64,
    #[serde(default)]
    pub top_referrers: Vec<EntryCount>,
    #[serde(default)]
    pub top_pages: Vec<EntryCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_labels() {
        let w = Period::Weekly { iso_year: 2026, iso_week: 34 };
        assert_eq!(w.label(), "Week 34, 2026");
        let m = Period::Monthly { year: 2026, month: 8 };
        assert_eq!(m.label(), "August 2026");
    }

    #[test]
    fn test_cadence_names() {
        assert_eq!(Cadence::Weekly.as_str(), "weekly");
        assert_eq!(Cadence::Monthly.to_string(), "monthly");
    }
}
