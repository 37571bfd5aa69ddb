use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::models::DateParts;

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parses an application date and drops any time-of-day component.
/// Returns `None` for blank or unrecognised values.
pub fn parse_application_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Some(datetime.date());
        }
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|datetime| datetime.date_naive())
}

pub fn date_parts(date: NaiveDate) -> DateParts {
    DateParts {
        full_date: date,
        year: date.year(),
        month: date.month(),
        day: date.day(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn truncates_time_of_day() {
        assert_eq!(
            parse_application_date("2021-03-04 23:59:59"),
            Some(ymd(2021, 3, 4))
        );
        assert_eq!(
            parse_application_date("2021-03-04T08:15"),
            Some(ymd(2021, 3, 4))
        );
        assert_eq!(
            parse_application_date("2021-03-04 08:15:00.250"),
            Some(ymd(2021, 3, 4))
        );
    }

    #[test]
    fn accepts_plain_and_slashed_dates() {
        assert_eq!(
            parse_application_date(" 2019-12-31 "),
            Some(ymd(2019, 12, 31))
        );
        assert_eq!(
            parse_application_date("2019/12/31"),
            Some(ymd(2019, 12, 31))
        );
    }

    #[test]
    fn rfc3339_keeps_the_written_date() {
        assert_eq!(
            parse_application_date("2020-06-30T23:30:00-05:00"),
            Some(ymd(2020, 6, 30))
        );
    }

    #[test]
    fn rejects_blank_and_garbage() {
        assert_eq!(parse_application_date(""), None);
        assert_eq!(parse_application_date("   "), None);
        assert_eq!(parse_application_date("yesterday"), None);
        assert_eq!(parse_application_date("2021-02-30"), None);
    }

    #[test]
    fn parts_follow_the_calendar_date() {
        let parts = date_parts(ymd(2022, 1, 9));
        assert_eq!((parts.year, parts.month, parts.day), (2022, 1, 9));
    }
}
