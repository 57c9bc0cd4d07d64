use chrono::{DateTime, NaiveDateTime, Utc};

use crate::config::DATE_INPUT_FORMAT;

const MS_PER_DAY: i64 = 86_400_000;

/// Human relative time such as "an hour ago" or "Yesterday".
///
/// The difference is split into whole days (floored) and the remaining
/// seconds of the day; every bucket uses truncating integer division, so
/// 13 days is "1 weeks ago" and 400 days is "1 years ago". Times in the
/// future give an empty string and `None` reads as `now`.
pub fn pretty_date(time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let diff_ms = time.map(|t| (now - t).num_milliseconds()).unwrap_or(0);
    let day_diff = diff_ms.div_euclid(MS_PER_DAY);
    let second_diff = diff_ms.rem_euclid(MS_PER_DAY) / 1000;

    if day_diff < 0 {
        return String::new();
    }

    if day_diff == 0 {
        return match second_diff {
            s if s < 10 => "just now".to_string(),
            s if s < 60 => format!("{} seconds ago", s),
            s if s < 120 => "a minute ago".to_string(),
            s if s < 3600 => format!("{} minutes ago", s / 60),
            s if s < 7200 => "an hour ago".to_string(),
            s => format!("{} hours ago", s / 3600),
        };
    }

    match day_diff {
        1 => "Yesterday".to_string(),
        d if d < 7 => format!("{} days ago", d),
        d if d < 31 => format!("{} weeks ago", d / 7),
        d if d < 365 => format!("{} months ago", d / 30),
        d => format!("{} years ago", d / 365),
    }
}

/// Parses a `YYYY-MM-DD HH:MM` form value as UTC.
pub fn parse_input_datetime(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), DATE_INPUT_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_input_datetime(time: DateTime<Utc>) -> String {
    time.format(DATE_INPUT_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn ago(d: Duration) -> String {
        pretty_date(Some(now() - d), now())
    }

    #[test]
    fn within_a_day() {
        assert_eq!(ago(Duration::seconds(0)), "just now");
        assert_eq!(ago(Duration::seconds(9)), "just now");
        assert_eq!(ago(Duration::seconds(10)), "10 seconds ago");
        assert_eq!(ago(Duration::seconds(59)), "59 seconds ago");
        assert_eq!(ago(Duration::seconds(90)), "a minute ago");
        assert_eq!(ago(Duration::seconds(120)), "2 minutes ago");
        assert_eq!(ago(Duration::seconds(3599)), "59 minutes ago");
        assert_eq!(ago(Duration::seconds(3600)), "an hour ago");
        assert_eq!(ago(Duration::seconds(7200)), "2 hours ago");
        assert_eq!(ago(Duration::seconds(86_399)), "23 hours ago");
    }

    #[test]
    fn days_weeks_months_years() {
        assert_eq!(ago(Duration::days(1)), "Yesterday");
        assert_eq!(ago(Duration::days(1) + Duration::hours(23)), "Yesterday");
        assert_eq!(ago(Duration::days(2)), "2 days ago");
        assert_eq!(ago(Duration::days(6)), "6 days ago");
        assert_eq!(ago(Duration::days(7)), "1 weeks ago");
        assert_eq!(ago(Duration::days(13)), "1 weeks ago");
        assert_eq!(ago(Duration::days(14)), "2 weeks ago");
        assert_eq!(ago(Duration::days(30)), "4 weeks ago");
        assert_eq!(ago(Duration::days(31)), "1 months ago");
        assert_eq!(ago(Duration::days(364)), "12 months ago");
        assert_eq!(ago(Duration::days(365)), "1 years ago");
        assert_eq!(ago(Duration::days(400)), "1 years ago");
        assert_eq!(ago(Duration::days(800)), "2 years ago");
    }

    #[test]
    fn future_and_missing() {
        assert_eq!(pretty_date(Some(now() + Duration::seconds(5)), now()), "");
        assert_eq!(pretty_date(Some(now() + Duration::days(3)), now()), "");
        assert_eq!(pretty_date(None, now()), "just now");
    }

    #[test]
    fn input_format() {
        let parsed = parse_input_datetime("2024-01-02 10:30").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 2, 10, 30, 0).unwrap());
        assert_eq!(format_input_datetime(parsed), "2024-01-02 10:30");
        assert!(parse_input_datetime("tomorrow").is_none());
        assert!(parse_input_datetime("2024-01-02").is_none());
    }
}
