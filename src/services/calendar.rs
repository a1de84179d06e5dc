use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};

/// Monday..=Sunday of the week free evenings are collected for
///
/// On a Monday that is the current week, on any other day the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpcomingWeekRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl UpcomingWeekRange {
    pub fn starting_after(today: NaiveDate) -> Self {
        let days_until_monday = match today.weekday() {
            Weekday::Mon => 0,
            Weekday::Sun => 1,
            other => 8 - other.num_days_from_sunday() as i64,
        };
        let start = today + Duration::days(days_until_monday);
        Self {
            start,
            end: start + Duration::days(6),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take(7)
    }

    /// Half-open instant range covering the whole week
    pub fn instants(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (start_of_day(self.start), start_of_day(self.end + Duration::days(1)))
    }
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp; the time part is dropped
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

/// Accepts RFC 3339, or a bare date meaning midnight UTC
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
                .ok()
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(start_of_day)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_upcoming_week_from_each_weekday() {
        // 2025-03-10 is a Monday
        let monday = day(2025, 3, 10);
        let next_monday = day(2025, 3, 17);

        assert_eq!(UpcomingWeekRange::starting_after(monday).start, monday);
        for offset in 1..=5 {
            let today = monday + Duration::days(offset);
            assert_eq!(
                UpcomingWeekRange::starting_after(today).start,
                next_monday,
                "from {}",
                today
            );
        }
        let sunday = day(2025, 3, 16);
        assert_eq!(UpcomingWeekRange::starting_after(sunday).start, next_monday);
    }

    #[test]
    fn test_week_spans_seven_days() {
        let week = UpcomingWeekRange::starting_after(day(2025, 3, 12));
        assert_eq!(week.end, day(2025, 3, 23));
        let days: Vec<_> = week.days().collect();
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].weekday(), Weekday::Mon);
        assert_eq!(days[6].weekday(), Weekday::Sun);
        assert!(week.contains(day(2025, 3, 23)));
        assert!(!week.contains(day(2025, 3, 24)));
    }

    #[test]
    fn test_instants_cover_whole_days() {
        let week = UpcomingWeekRange::starting_after(day(2025, 3, 10));
        let (start, end) = week.instants();
        assert_eq!(start.to_rfc3339(), "2025-03-10T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-03-17T00:00:00+00:00");
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(parse_day("2025-03-12"), Some(day(2025, 3, 12)));
        assert_eq!(parse_day("2025-03-12T19:30:00.000Z"), Some(day(2025, 3, 12)));
        assert_eq!(parse_day("next tuesday"), None);
    }

    #[test]
    fn test_parse_instant() {
        let parsed = parse_instant("2025-03-12T19:30:00Z").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-03-12T19:30:00+00:00");
        assert_eq!(
            parse_instant("2025-03-12").unwrap().to_rfc3339(),
            "2025-03-12T00:00:00+00:00"
        );
        assert!(parse_instant("").is_none());
    }
}
