//! Business-day boundaries in the shop's local time.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// Local calendar date of `at` for a shop running at `offset`.
pub fn business_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// Half-open UTC interval `[start, end)` covering `date` in the shop's time.
pub fn day_bounds(date: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_midnight = date.and_time(NaiveTime::default());
    let start = match offset.from_local_datetime(&local_midnight).single() {
        Some(t) => t.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&local_midnight),
    };
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_evening_utc_is_next_day_east_of_greenwich() {
        let dhaka = FixedOffset::east_opt(6 * 3600).unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 19, 30, 0).unwrap();
        assert_eq!(
            business_date(at, dhaka),
            NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
        );
    }

    #[test]
    fn bounds_cover_exactly_one_local_day() {
        let dhaka = FixedOffset::east_opt(6 * 3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let (start, end) = day_bounds(date, dhaka);

        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap());
        assert_eq!(end - start, Duration::days(1));
        assert_eq!(business_date(start, dhaka), date);
        assert_eq!(business_date(end - Duration::seconds(1), dhaka), date);
    }
}
