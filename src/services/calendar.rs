//! Calendar arithmetic for support-window reporting.
//!
//! Everything here is UTC. Month math uses whole-month anchoring rather
//! than day division: variable month lengths (28-31 days) make naive
//! `days / 30` answers drift across month boundaries.

use chrono::{DateTime, Datelike, Months, NaiveDateTime, TimeZone, Utc};

/// Elapsed calendar time as a years/months/days triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub years: u32,
    pub months: u32,
    pub days: u32,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}y {}m {}d", self.years, self.months, self.days)
    }
}

/// Epoch instant of the last second of the given calendar month, or 0 when
/// the input does not name a valid month.
pub fn month_end_instant(year: i32, month: u32) -> i64 {
    let first_of_next = match next_month_start(year, month) {
        Some(dt) => dt,
        None => return 0,
    };
    Utc.from_utc_datetime(&first_of_next).timestamp() - 1
}

fn next_month_start(year: i32, month: u32) -> Option<NaiveDateTime> {
    // Validates (year, month) as a side effect.
    chrono::NaiveDate::from_ymd_opt(year, month, 1)?;
    let (y, m) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    chrono::NaiveDate::from_ymd_opt(y, m, 1)?.and_hms_opt(0, 0, 0)
}

/// Calendar distance from `start` to `end`, clamped to zero when
/// `end <= start`.
///
/// Anchor-and-correct: take the integer month distance between the two
/// calendar dates, anchor `start` forward by that many months, and when the
/// anchor overshoots `end`, back off one month. The remainder below one
/// month is counted in whole days.
pub fn calendar_diff(start: i64, end: i64) -> Span {
    if end <= start {
        return Span::default();
    }
    let (s, e) = match (to_utc(start), to_utc(end)) {
        (Some(s), Some(e)) => (s, e),
        _ => return Span::default(),
    };

    let mut months =
        i64::from(e.year() - s.year()) * 12 + i64::from(e.month()) - i64::from(s.month());
    if months < 0 {
        months = 0;
    }
    let mut anchor = add_months(s, months);
    if anchor > e && months > 0 {
        months -= 1;
        anchor = add_months(s, months);
    }
    let days = ((e - anchor).num_seconds() / 86_400).max(0);

    Span {
        years: (months / 12) as u32,
        months: (months % 12) as u32,
        days: days as u32,
    }
}

/// Human description of how long ago `then` was, or "unknown" for the
/// 0 sentinel.
pub fn describe_age(now: i64, then: i64) -> String {
    if then <= 0 {
        return "unknown".to_string();
    }
    let span = calendar_diff(then, now);
    let lead = if span.years > 0 {
        plural(span.years, "year")
    } else if span.months > 0 {
        plural(span.months, "month")
    } else if span.days > 0 {
        plural(span.days, "day")
    } else {
        return "today".to_string();
    };
    format!("{} ago", lead)
}

fn plural(n: u32, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

fn to_utc(epoch: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(epoch, 0).single()
}

fn add_months(dt: DateTime<Utc>, n: i64) -> DateTime<Utc> {
    u32::try_from(n)
        .ok()
        .and_then(|n| dt.checked_add_months(Months::new(n)))
        .unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::{calendar_diff, describe_age, month_end_instant, Span};
    use chrono::{TimeZone, Utc};

    fn epoch(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap().timestamp()
    }

    #[test]
    fn month_end_is_last_second_in_utc() {
        assert_eq!(month_end_instant(2033, 8), epoch(2033, 8, 31, 23, 59, 59));
        assert_eq!(month_end_instant(2027, 1), epoch(2027, 1, 31, 23, 59, 59));
        assert_eq!(month_end_instant(2026, 12), epoch(2026, 12, 31, 23, 59, 59));
    }

    #[test]
    fn month_end_handles_leap_february() {
        assert_eq!(month_end_instant(2024, 2), epoch(2024, 2, 29, 23, 59, 59));
        assert_eq!(month_end_instant(2023, 2), epoch(2023, 2, 28, 23, 59, 59));
    }

    #[test]
    fn month_end_rejects_invalid_input() {
        assert_eq!(month_end_instant(2024, 0), 0);
        assert_eq!(month_end_instant(2024, 13), 0);
    }

    #[test]
    fn diff_of_equal_instants_is_zero() {
        let t = epoch(2025, 6, 15, 12, 0, 0);
        assert_eq!(calendar_diff(t, t), Span::default());
    }

    #[test]
    fn diff_clamps_reversed_ranges() {
        let a = epoch(2025, 6, 15, 0, 0, 0);
        let b = epoch(2024, 6, 15, 0, 0, 0);
        assert_eq!(calendar_diff(a, b), Span::default());
    }

    #[test]
    fn diff_counts_whole_months_with_anchor_correction() {
        // Jan 31 -> Mar 1: Feb has no 31st, so the anchor overshoots and
        // the month count must fall back to one.
        let start = epoch(2025, 1, 31, 0, 0, 0);
        let end = epoch(2025, 3, 1, 0, 0, 0);
        let span = calendar_diff(start, end);
        assert_eq!((span.years, span.months), (0, 1));
        assert!(span.days <= 1);
    }

    #[test]
    fn diff_spans_years_and_remainder_days() {
        let start = epoch(2023, 7, 14, 0, 0, 0);
        let end = epoch(2033, 8, 31, 23, 59, 59);
        let span = calendar_diff(start, end);
        assert_eq!(span.years, 10);
        assert_eq!(span.months, 1);
        assert_eq!(span.days, 17);
    }

    #[test]
    fn diff_round_trips_within_a_day() {
        let cases = [
            (epoch(2024, 2, 29, 6, 0, 0), epoch(2025, 2, 28, 6, 0, 0)),
            (epoch(2025, 3, 31, 0, 0, 0), epoch(2025, 4, 30, 0, 0, 0)),
            (epoch(2020, 1, 1, 0, 0, 0), epoch(2030, 12, 31, 23, 59, 59)),
        ];
        for (start, end) in cases {
            let span = calendar_diff(start, end);
            let months = span.years * 12 + span.months;
            let anchor = Utc
                .timestamp_opt(start, 0)
                .unwrap()
                .checked_add_months(chrono::Months::new(months))
                .unwrap();
            let rebuilt = anchor.timestamp() + i64::from(span.days) * 86_400;
            assert!(
                (end - rebuilt).abs() < 86_400,
                "start {} end {} span {:?}",
                start,
                end,
                span
            );
        }
    }

    #[test]
    fn age_description_picks_leading_unit() {
        let now = epoch(2026, 8, 29, 12, 0, 0);
        assert_eq!(describe_age(now, epoch(2026, 8, 12, 12, 0, 0)), "17 days ago");
        assert_eq!(describe_age(now, epoch(2026, 6, 2, 12, 0, 0)), "2 months ago");
        assert_eq!(describe_age(now, epoch(2025, 8, 1, 12, 0, 0)), "1 year ago");
        assert_eq!(describe_age(now, now), "today");
        assert_eq!(describe_age(now, 0), "unknown");
    }
}
