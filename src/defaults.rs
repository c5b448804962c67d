use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};

/// Hour of day (UTC) a trip starts when the request gives no start time
pub const DEFAULT_TRIP_START_HOUR: i64 = 6;

pub fn default_trip_start_time() -> NaiveTime {
    NaiveTime::MIN + Duration::hours(DEFAULT_TRIP_START_HOUR)
}

/// 06:00 UTC on the date of `now`
pub fn default_trip_start(now: DateTime<Utc>) -> DateTime<FixedOffset> {
    now.date_naive()
        .and_time(default_trip_start_time())
        .and_utc()
        .fixed_offset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_trip_start_is_six_utc_same_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 22, 15, 0).unwrap();
        let start = default_trip_start(now);
        assert_eq!(start.to_rfc3339(), "2026-03-02T06:00:00+00:00");
    }
}
