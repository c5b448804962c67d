//! Daily log sheet rendering
//!
//! Turns the scheduler's stop sequence into the driver's daily logs:
//!
//! 1. Flatten stops into a continuous trip timeline. Each stop occupies
//!    `[arrival, departure]` in its own duty status, the gap up to the next
//!    stop's arrival is driving.
//! 2. Split the timeline at local midnight (`clip`).
//! 3. Pad every day with off-duty time so each sheet covers 00:00-24:00,
//!    merge adjacent intervals of the same status and total the hours.
//!
//! Like the scheduler this is pure: no I/O, no wall clock.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone};

use crate::types::{DutyInterval, DutyStatus, DutyTotals, LogRemark, LogSheet, Stop};

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Continuous trip timeline from the first stop's arrival to the last stop's
/// departure. Driving intervals carry the miles covered between the stops.
pub fn build_timeline(stops: &[Stop]) -> Vec<DutyInterval> {
    let mut timeline = Vec::with_capacity(stops.len() * 2);

    for (index, stop) in stops.iter().enumerate() {
        push_merged(
            &mut timeline,
            DutyInterval {
                status: stop.duty_status,
                start: stop.arrival_time,
                end: stop.departure_time,
                miles: 0.0,
            },
        );

        if let Some(next) = stops.get(index + 1) {
            push_merged(
                &mut timeline,
                DutyInterval {
                    status: DutyStatus::Driving,
                    start: stop.departure_time,
                    end: next.arrival_time,
                    miles: (next.cumulative_miles - stop.cumulative_miles).max(0.0),
                },
            );
        }
    }

    timeline
}

/// Append, extending the last interval when it has the same status and ends
/// where this one starts. Empty intervals are dropped.
fn push_merged(intervals: &mut Vec<DutyInterval>, interval: DutyInterval) {
    if interval.end <= interval.start {
        return;
    }

    if let Some(last) = intervals.last_mut() {
        if last.status == interval.status && last.end == interval.start {
            last.end = interval.end;
            last.miles += interval.miles;
            return;
        }
    }

    intervals.push(interval);
}

/// Portion of `interval` inside `[window_start, window_end)`. Miles are
/// apportioned by time, since speed is constant between stops.
pub fn clip(
    interval: &DutyInterval,
    window_start: DateTime<FixedOffset>,
    window_end: DateTime<FixedOffset>,
) -> Option<DutyInterval> {
    let start = interval.start.max(window_start);
    let end = interval.end.min(window_end);
    if end <= start {
        return None;
    }

    let full = (interval.end - interval.start).num_milliseconds();
    let miles = if full > 0 {
        interval.miles * (end - start).num_milliseconds() as f64 / full as f64
    } else {
        0.0
    };

    Some(DutyInterval {
        status: interval.status,
        start,
        end,
        miles,
    })
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> DateTime<FixedOffset> {
    let local = date.and_time(NaiveTime::MIN);
    let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
    offset.from_utc_datetime(&utc)
}

// ---------------------------------------------------------------------------
// Sheets
// ---------------------------------------------------------------------------

/// One log sheet per calendar day the trip touches, in the first stop's
/// UTC offset. Returns no sheets for an empty stop list.
pub fn render_log_sheets(stops: &[Stop]) -> Vec<LogSheet> {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return Vec::new();
    };

    let offset = *first.arrival_time.offset();
    let trip_start = first.arrival_time;
    let trip_end = last.departure_time.max(trip_start);

    let first_date = trip_start.date_naive();
    // A trip ending exactly at midnight does not open another sheet
    let last_date = if trip_end > trip_start {
        (trip_end - Duration::milliseconds(1))
            .with_timezone(&offset)
            .date_naive()
    } else {
        first_date
    };

    let timeline = build_timeline(stops);
    let mut sheets = Vec::new();
    let mut date = first_date;

    while date <= last_date {
        let day_start = local_midnight(date, offset);
        let day_end = day_start + Duration::hours(24);

        let intervals = day_intervals(&timeline, day_start, day_end);

        let mut totals = DutyTotals::default();
        for interval in &intervals {
            totals.add(interval.status, interval.hours());
        }
        debug_assert!((totals.total() - 24.0).abs() < 1e-6, "sheet for {} is not 24h", date);
        let total_miles: f64 = intervals.iter().map(|interval| interval.miles).sum();

        let remarks = stops
            .iter()
            .filter(|stop| stop.arrival_time >= day_start && stop.arrival_time < day_end)
            .map(remark_for)
            .collect();

        let day = u32::try_from((date - first_date).num_days() + 1).unwrap_or(u32::MAX);
        tracing::debug!(day, on_duty = totals.on_duty(), miles = total_miles, "Log sheet {}", date);
        sheets.push(LogSheet {
            day,
            date,
            intervals,
            totals,
            total_miles,
            remarks,
        });

        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }

    tracing::debug!("Rendered {} log sheet(s) for {} stops", sheets.len(), stops.len());
    sheets
}

/// Timeline clipped to one day, gaps filled with off duty
fn day_intervals(
    timeline: &[DutyInterval],
    day_start: DateTime<FixedOffset>,
    day_end: DateTime<FixedOffset>,
) -> Vec<DutyInterval> {
    let mut intervals = Vec::new();
    let mut cursor = day_start;

    for clipped in timeline
        .iter()
        .filter_map(|interval| clip(interval, day_start, day_end))
    {
        push_merged(&mut intervals, off_duty(cursor, clipped.start));
        cursor = clipped.end;
        push_merged(&mut intervals, clipped);
    }
    push_merged(&mut intervals, off_duty(cursor, day_end));

    intervals
}

fn off_duty(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> DutyInterval {
    DutyInterval {
        status: DutyStatus::OffDuty,
        start,
        end,
        miles: 0.0,
    }
}

fn remark_for(stop: &Stop) -> LogRemark {
    let activity = if stop.notes.is_empty() {
        stop.stop_type.as_str().to_string()
    } else {
        stop.notes.clone()
    };

    LogRemark {
        time: stop.arrival_time.format("%H:%M").to_string(),
        location: stop.location.clone(),
        activity,
    }
}
