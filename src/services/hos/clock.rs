//! Regulatory clocks for a single scheduling run.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};

use crate::error::PlanResult;
use crate::types::DutyStatus;

use super::rules::HosSettings;

/// Tolerance for comparing hour clocks against their limits (~3.6 ms)
pub const HOURS_EPSILON: f64 = 1e-6;

/// Tolerance for comparing mile markers
pub const MILES_EPSILON: f64 = 1e-6;

pub fn hours_of(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 3_600_000.0
}

/// Time needed to cover `miles` at `speed_mph`, floored to whole milliseconds
pub fn driving_duration(miles: f64, speed_mph: f64) -> Duration {
    Duration::milliseconds((miles / speed_mph * 3_600_000.0).floor() as i64)
}

/// The four HOS clocks plus the position of the truck on the timeline.
///
/// Owned by exactly one scheduling run and dropped once the stop sequence
/// has been produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockState {
    /// 11-hour driving limit
    pub driving_hours_today: f64,
    /// 14-hour on-duty window
    pub window_hours_today: f64,
    /// 30-minute break after 8 hours of driving
    pub driving_since_break: f64,
    /// 70-hour/8-day cycle
    pub cycle_hours_8day: f64,
    pub current_time: DateTime<FixedOffset>,
    pub current_day: u32,
    pub cumulative_miles: f64,
    /// Mile marker of the next fuel stop
    pub next_fuel_at_miles: f64,
    pub duty_status: DutyStatus,
    trip_start_date: NaiveDate,
}

impl ClockState {
    /// Seed the clocks for a trip. Cycle hours outside `0..=max_cycle_hours` are
    /// rejected rather than clamped.
    pub fn new(
        start_time: DateTime<FixedOffset>,
        current_cycle_hours: f64,
        settings: &HosSettings,
    ) -> PlanResult<Self> {
        settings.check_cycle_hours(current_cycle_hours)?;

        Ok(Self {
            driving_hours_today: 0.0,
            window_hours_today: 0.0,
            driving_since_break: 0.0,
            cycle_hours_8day: current_cycle_hours,
            current_time: start_time,
            current_day: 1,
            cumulative_miles: 0.0,
            next_fuel_at_miles: settings.fuel_interval_miles,
            duty_status: DutyStatus::OffDuty,
            trip_start_date: start_time.date_naive(),
        })
    }

    /// 1-based trip day of `time`, counted in local calendar days of the start offset
    pub fn day_of(&self, time: DateTime<FixedOffset>) -> u32 {
        let days = (time.date_naive() - self.trip_start_date).num_days();
        u32::try_from(days.max(0)).unwrap_or(u32::MAX).saturating_add(1)
    }

    fn advance(&mut self, duration: Duration) {
        self.current_time += duration;
        self.current_day = self.day_of(self.current_time);
    }

    /// Hours of driving left before any of the four limits is reached
    pub fn driving_headroom_hours(&self, settings: &HosSettings) -> f64 {
        (settings.break_required_after_hours - self.driving_since_break)
            .min(settings.max_driving_hours - self.driving_hours_today)
            .min(settings.max_window_hours - self.window_hours_today)
            .min(settings.max_cycle_hours - self.cycle_hours_8day)
            .max(0.0)
    }

    pub fn miles_to_fuel(&self) -> f64 {
        (self.next_fuel_at_miles - self.cumulative_miles).max(0.0)
    }

    /// All limits hold, i.e. driving may resume
    pub fn within_limits(&self, settings: &HosSettings) -> bool {
        self.driving_hours_today <= settings.max_driving_hours + HOURS_EPSILON
            && self.window_hours_today <= settings.max_window_hours + HOURS_EPSILON
            && self.driving_since_break <= settings.break_required_after_hours + HOURS_EPSILON
            && self.cycle_hours_8day <= settings.max_cycle_hours + HOURS_EPSILON
    }

    pub fn drive(&mut self, duration: Duration, miles: f64) {
        let hours = hours_of(duration);
        self.duty_status = DutyStatus::Driving;
        self.driving_hours_today += hours;
        self.window_hours_today += hours;
        self.driving_since_break += hours;
        self.cycle_hours_8day += hours;
        self.cumulative_miles += miles;
        self.advance(duration);
    }

    /// On-duty work that is not driving (inspections, loading, fueling)
    pub fn on_duty(&mut self, duration: Duration) {
        let hours = hours_of(duration);
        self.duty_status = DutyStatus::OnDutyNotDriving;
        self.window_hours_today += hours;
        self.cycle_hours_8day += hours;
        self.advance(duration);
    }

    /// Off-duty time that does not reset the daily clocks. The 14-hour window
    /// keeps running; a break of at least 30 minutes clears `driving_since_break`.
    pub fn off_duty(&mut self, duration: Duration, settings: &HosSettings) {
        self.duty_status = DutyStatus::OffDuty;
        self.window_hours_today += hours_of(duration);
        if duration >= Duration::minutes(i64::from(settings.break_minutes)) {
            self.driving_since_break = 0.0;
        }
        self.advance(duration);
    }

    /// 10 consecutive hours off duty
    pub fn qualifying_reset(&mut self, duration: Duration) {
        self.duty_status = DutyStatus::OffDuty;
        self.driving_hours_today = 0.0;
        self.window_hours_today = 0.0;
        self.driving_since_break = 0.0;
        self.advance(duration);
    }

    /// 34 consecutive hours off duty, also restarting the 70-hour cycle
    pub fn full_restart(&mut self, duration: Duration) {
        self.qualifying_reset(duration);
        self.cycle_hours_8day = 0.0;
    }
}
