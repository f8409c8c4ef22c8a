//! Cadence window evaluation — pure local-calendar arithmetic.
//!
//! Everything here is deterministic and free of I/O: the reference
//! instant is passed in explicitly, converted to the subscriber's
//! timezone, and the *local* wall-clock fields govern every decision
//! (never UTC offsets, so DST transitions fall out naturally).
//!
//! The window opens on the first local calendar day of a period
//! (Monday for weekly, day 1 for monthly) once the local hour reaches
//! the configured send hour, and closes at local midnight. There is no
//! catch-up on later days.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use sitepulse_core::types::{Cadence, Period, ReportRange};

/// Outcome of evaluating one (instant, timezone, cadence) triple.
///
/// The period key is always computed, eligible or not, so callers can
/// reason about "which period would this be" without a second call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub eligible: bool,
    pub period: Period,
}

/// Decide whether `at` falls inside the delivery window for `cadence`
/// in `tz`, and name the period it belongs to.
pub fn evaluate(at: DateTime<Utc>, tz: Tz, cadence: Cadence, send_hour: u32) -> Window {
    let local = at.with_timezone(&tz);
    match cadence {
        Cadence::Weekly => {
            let iso = local.iso_week();
            Window {
                eligible: local.weekday() == Weekday::Mon && local.hour() >= send_hour,
                period: Period::Weekly { iso_year: iso.year(), iso_week: iso.week() },
            }
        }
        Cadence::Monthly => Window {
            eligible: local.day() == 1 && local.hour() >= send_hour,
            period: Period::Monthly { year: local.year(), month: local.month() },
        },
    }
}

/// Reporting query range for the previous completed period, plus the
/// equivalent range before it for delta comparison.
///
/// Weekly reports cover the trailing 7 local days ending at the run
/// date's local midnight; monthly reports cover the local calendar
/// month immediately preceding the run date's month. Boundaries are
/// local midnights converted to UTC.
pub fn report_range(at: DateTime<Utc>, tz: Tz, cadence: Cadence) -> (ReportRange, ReportRange) {
    let local = at.with_timezone(&tz);
    match cadence {
        Cadence::Weekly => {
            let end = local.date_naive();
            let start = end - Duration::days(7);
            let prior_start = start - Duration::days(7);
            (day_range(tz, start, end), day_range(tz, prior_start, start))
        }
        Cadence::Monthly => {
            let (prev_y, prev_m) = previous_month(local.year(), local.month());
            let (prior_y, prior_m) = previous_month(prev_y, prev_m);
            let current_start = month_start(local.year(), local.month());
            let prev_start = month_start(prev_y, prev_m);
            let prior_start = month_start(prior_y, prior_m);
            (
                day_range(tz, prev_start, current_start),
                day_range(tz, prior_start, prev_start),
            )
        }
    }
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 { (year - 1, 12) } else { (year, month - 1) }
}

fn month_start(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn day_range(tz: Tz, start: NaiveDate, end: NaiveDate) -> ReportRange {
    ReportRange {
        start: local_midnight(tz, start),
        end: local_midnight(tz, end),
    }
}

/// UTC instant of local midnight on `date` in `tz`.
fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        // Fall-back transition: two valid midnights, take the first.
        LocalResult::Ambiguous(first, _) => first.with_timezone(&Utc),
        // Spring-forward skipped midnight: the day starts at the first
        // valid wall-clock instant after the gap.
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tz(name: &str) -> Tz {
        name.parse().unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    // 2026-01-05 is a Monday; 09:15 America/New_York is 14:15 UTC (EST).
    #[test]
    fn test_weekly_monday_morning_eligible() {
        let w = evaluate(utc("2026-01-05T14:15:00Z"), tz("America/New_York"), Cadence::Weekly, 9);
        assert!(w.eligible);
        assert_eq!(w.period, Period::Weekly { iso_year: 2026, iso_week: 2 });
    }

    #[test]
    fn test_weekly_before_send_hour_not_eligible() {
        // 08:00 local, same Monday — window not yet open, same period key.
        let w = evaluate(utc("2026-01-05T13:00:00Z"), tz("America/New_York"), Cadence::Weekly, 9);
        assert!(!w.eligible);
        assert_eq!(w.period, Period::Weekly { iso_year: 2026, iso_week: 2 });
    }

    #[test]
    fn test_weekly_window_open_all_afternoon() {
        // 23:30 local Monday is still inside the window.
        let w = evaluate(utc("2026-01-06T04:30:00Z"), tz("America/New_York"), Cadence::Weekly, 9);
        assert!(w.eligible);
        assert_eq!(w.period, Period::Weekly { iso_year: 2026, iso_week: 2 });
    }

    #[test]
    fn test_weekly_window_closed_after_local_midnight() {
        // 05:05 UTC Tuesday = 00:05 local Tuesday — window has closed,
        // and the period key stays the same: the week is never revisited.
        let w = evaluate(utc("2026-01-06T05:05:00Z"), tz("America/New_York"), Cadence::Weekly, 9);
        assert!(!w.eligible);
        assert_eq!(w.period, Period::Weekly { iso_year: 2026, iso_week: 2 });
    }

    #[test]
    fn test_weekly_sunday_not_eligible() {
        let w = evaluate(utc("2026-01-04T15:00:00Z"), tz("America/New_York"), Cadence::Weekly, 9);
        assert!(!w.eligible);
    }

    #[test]
    fn test_weekly_local_monday_vs_utc_sunday() {
        // 22:00 UTC Sunday is already 11:00 Monday in Auckland (+13 in
        // January): the local calendar decides, not the UTC one.
        let w = evaluate(utc("2026-01-04T22:00:00Z"), tz("Pacific/Auckland"), Cadence::Weekly, 9);
        assert!(w.eligible);
        assert_eq!(w.period, Period::Weekly { iso_year: 2026, iso_week: 2 });
    }

    #[test]
    fn test_weekly_iso_year_rollover() {
        // Monday 2025-12-29 belongs to ISO week 1 of 2026.
        let w = evaluate(utc("2025-12-29T10:00:00Z"), tz("Europe/London"), Cadence::Weekly, 9);
        assert!(w.eligible);
        assert_eq!(w.period, Period::Weekly { iso_year: 2026, iso_week: 1 });
    }

    #[test]
    fn test_weekly_dst_spring_forward_monday() {
        // US DST starts Sunday 2026-03-08; Monday 09:30 EDT is 13:30 UTC.
        // Under the winter offset this would read as 08:30 and fail.
        let w = evaluate(utc("2026-03-09T13:30:00Z"), tz("America/New_York"), Cadence::Weekly, 9);
        assert!(w.eligible);
    }

    #[test]
    fn test_weekly_same_week_same_period() {
        let zone = tz("Asia/Tokyo");
        let a = evaluate(utc("2026-01-05T02:00:00Z"), zone, Cadence::Weekly, 9);
        let b = evaluate(utc("2026-01-08T02:00:00Z"), zone, Cadence::Weekly, 9);
        let c = evaluate(utc("2026-01-12T02:00:00Z"), zone, Cadence::Weekly, 9);
        assert_eq!(a.period, b.period);
        assert_ne!(b.period, c.period);
    }

    #[test]
    fn test_monthly_first_day_eligible() {
        // 10:00 Asia/Tokyo on September 1st.
        let w = evaluate(utc("2026-09-01T01:00:00Z"), tz("Asia/Tokyo"), Cadence::Monthly, 9);
        assert!(w.eligible);
        assert_eq!(w.period, Period::Monthly { year: 2026, month: 9 });
    }

    #[test]
    fn test_monthly_local_day_one_while_utc_previous_month() {
        // 16:00 UTC Aug 31 is 01:00 JST Sep 1 — day 1 locally, but
        // before the send hour.
        let w = evaluate(utc("2026-08-31T16:00:00Z"), tz("Asia/Tokyo"), Cadence::Monthly, 9);
        assert!(!w.eligible);
        assert_eq!(w.period, Period::Monthly { year: 2026, month: 9 });
    }

    #[test]
    fn test_monthly_second_day_not_eligible() {
        let w = evaluate(utc("2026-09-02T01:00:00Z"), tz("Asia/Tokyo"), Cadence::Monthly, 9);
        assert!(!w.eligible);
    }

    #[test]
    fn test_weekly_report_range_trailing_seven_days() {
        // Monday 2026-01-05 09:15 ET: trailing week is Dec 29 .. Jan 5,
        // local midnights at UTC-5.
        let (range, prior) =
            report_range(utc("2026-01-05T14:15:00Z"), tz("America/New_York"), Cadence::Weekly);
        assert_eq!(range.start, utc("2025-12-29T05:00:00Z"));
        assert_eq!(range.end, utc("2026-01-05T05:00:00Z"));
        assert_eq!(prior.start, utc("2025-12-22T05:00:00Z"));
        assert_eq!(prior.end, range.start);
    }

    #[test]
    fn test_weekly_report_range_spans_dst_change() {
        // Monday 2026-03-09: the trailing week starts in EST (UTC-5)
        // and ends in EDT (UTC-4), so the interval is 167 hours long.
        let (range, _) =
            report_range(utc("2026-03-09T13:30:00Z"), tz("America/New_York"), Cadence::Weekly);
        assert_eq!(range.start, utc("2026-03-02T05:00:00Z"));
        assert_eq!(range.end, utc("2026-03-09T04:00:00Z"));
    }

    #[test]
    fn test_monthly_report_range_previous_calendar_month() {
        // Sept 1st in Tokyo: report covers August, compared against July.
        let (range, prior) =
            report_range(utc("2026-09-01T01:00:00Z"), tz("Asia/Tokyo"), Cadence::Monthly);
        assert_eq!(range.start, utc("2026-07-31T15:00:00Z"));
        assert_eq!(range.end, utc("2026-08-31T15:00:00Z"));
        assert_eq!(prior.start, utc("2026-06-30T15:00:00Z"));
        assert_eq!(prior.end, range.start);
    }

    #[test]
    fn test_monthly_report_range_january() {
        // January rolls the year back: December vs November.
        let (range, prior) =
            report_range(utc("2026-01-01T15:00:00Z"), tz("Europe/London"), Cadence::Monthly);
        assert_eq!(range.start, utc("2025-12-01T00:00:00Z"));
        assert_eq!(range.end, utc("2026-01-01T00:00:00Z"));
        assert_eq!(prior.start, utc("2025-11-01T00:00:00Z"));
    }
}
