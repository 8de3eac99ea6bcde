//! Reminder dates: 08:00 on the Nth business day before a deadline.

use chrono::{
    DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Utc, Weekday,
};

/// Hour of day at which every reminder fires.
pub const REMINDER_HOUR: u32 = 8;

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Walks back from `due` one calendar day at a time, counting only business
/// days, and anchors the result at 08:00. A lead of zero schedules nothing.
pub fn reminder_date(due: NaiveDate, lead_days: u32) -> Option<NaiveDateTime> {
    if lead_days == 0 {
        return None;
    }
    let mut day = due;
    let mut remaining = lead_days;
    while remaining > 0 {
        day = day.pred_opt()?;
        if is_business_day(day) {
            remaining -= 1;
        }
    }
    Some(day.and_time(NaiveTime::from_hms_opt(REMINDER_HOUR, 0, 0)?))
}

pub fn reminder_timestamp(due: NaiveDate, lead_days: Option<u32>) -> Option<DateTime<Utc>> {
    reminder_timestamp_in(&Local, due, lead_days)
}

/// Same as [`reminder_timestamp`] with an explicit zone for the 08:00 anchor.
pub fn reminder_timestamp_in<Tz: TimeZone>(
    tz: &Tz,
    due: NaiveDate,
    lead_days: Option<u32>,
) -> Option<DateTime<Utc>> {
    let naive = reminder_date(due, lead_days?)?;
    let local = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        // 08:00 swallowed by a DST gap: take the first valid instant after it.
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()?,
    };
    Some(local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at_eight(date: NaiveDate) -> NaiveDateTime {
        date.and_hms_opt(8, 0, 0).unwrap()
    }

    #[test]
    fn monday_one_day_before_lands_on_friday() {
        assert_eq!(
            reminder_date(ymd(2024, 6, 10), 1),
            Some(at_eight(ymd(2024, 6, 7)))
        );
    }

    #[test]
    fn tuesday_three_days_before_skips_the_weekend() {
        assert_eq!(
            reminder_date(ymd(2024, 6, 11), 3),
            Some(at_eight(ymd(2024, 6, 6)))
        );
    }

    #[test]
    fn zero_or_missing_lead_schedules_nothing() {
        assert_eq!(reminder_date(ymd(2024, 6, 10), 0), None);
        assert_eq!(reminder_timestamp(ymd(2024, 6, 10), None), None);
        assert_eq!(reminder_timestamp(ymd(2024, 6, 10), Some(0)), None);
    }

    #[test]
    fn weekend_due_date_counts_back_from_friday() {
        // Sunday 2024-06-09: Sat skipped, Fri counts as the first business day.
        assert_eq!(
            reminder_date(ymd(2024, 6, 9), 1),
            Some(at_eight(ymd(2024, 6, 7)))
        );
    }

    #[test]
    fn large_leads_keep_walking_back() {
        // 260 business days is 52 full weeks.
        assert_eq!(
            reminder_date(ymd(2024, 6, 10), 260),
            Some(at_eight(ymd(2023, 6, 12)))
        );
    }

    #[test]
    fn never_lands_on_a_weekend_and_always_at_eight() {
        let start = ymd(2023, 12, 1);
        for offset in 0..120 {
            let due = start + Duration::days(offset);
            for lead in 1..=15 {
                let at = reminder_date(due, lead).unwrap();
                assert!(is_business_day(at.date()), "{} lead {} -> {}", due, lead, at);
                assert_eq!(at.time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
                assert!(at.date() < due);
            }
        }
    }

    #[test]
    fn business_days_between_reminder_and_due_match_lead() {
        let due = ymd(2024, 3, 4);
        for lead in 1..=20u32 {
            let at = reminder_date(due, lead).unwrap().date();
            let counted = at
                .iter_days()
                .skip(1)
                .take_while(|d| *d < due)
                .filter(|d| is_business_day(*d))
                .count() as u32;
            assert_eq!(counted + 1, lead);
        }
    }

    #[test]
    fn timestamp_is_eight_o_clock_in_the_given_zone() {
        let paris_summer = FixedOffset::east_opt(2 * 3600).unwrap();
        let at = reminder_timestamp_in(&paris_summer, ymd(2024, 6, 10), Some(1)).unwrap();
        assert_eq!(at.to_rfc3339(), "2024-06-07T06:00:00+00:00");
        let local = at.with_timezone(&paris_summer);
        assert_eq!(local.hour(), 8);
        assert_eq!(local.weekday(), Weekday::Fri);
    }
}
