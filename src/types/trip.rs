//! Trip plan types: stops, duty statuses and daily log sheets

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use super::Coordinates;

/// ELD duty status. Exactly one is active at any instant of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DutyStatus {
    OffDuty,
    SleeperBerth,
    Driving,
    OnDutyNotDriving,
}

impl DutyStatus {
    /// Grid rows in the order they are printed on a paper log
    pub const ALL: [DutyStatus; 4] = [
        DutyStatus::OffDuty,
        DutyStatus::SleeperBerth,
        DutyStatus::Driving,
        DutyStatus::OnDutyNotDriving,
    ];

    /// Whether time in this status counts toward the 70-hour cycle
    pub const fn is_on_duty(self) -> bool {
        matches!(self, DutyStatus::Driving | DutyStatus::OnDutyNotDriving)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopType {
    Start,
    Pickup,
    Dropoff,
    Fuel,
    RestBreak,
    RestStop,
    FuelAndRest,
    End,
}

impl StopType {
    pub const fn as_str(self) -> &'static str {
        match self {
            StopType::Start => "start",
            StopType::Pickup => "pickup",
            StopType::Dropoff => "dropoff",
            StopType::Fuel => "fuel",
            StopType::RestBreak => "rest_break",
            StopType::RestStop => "rest_stop",
            StopType::FuelAndRest => "fuel_and_rest",
            StopType::End => "end",
        }
    }

    /// Stops inserted between waypoints rather than at a named location
    pub const fn is_en_route(self) -> bool {
        matches!(
            self,
            StopType::Fuel | StopType::RestBreak | StopType::RestStop | StopType::FuelAndRest
        )
    }
}

/// A planned stop. Produced by the duty scheduler and never edited afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    /// 1-based position in the stop sequence
    pub id: u32,
    #[serde(rename = "type")]
    pub stop_type: StopType,
    pub location: String,
    pub coordinates: Coordinates,
    pub arrival_time: DateTime<FixedOffset>,
    pub departure_time: DateTime<FixedOffset>,
    pub duration_minutes: u32,
    pub cumulative_miles: f64,
    /// Driving hours since the last qualifying reset, at arrival
    pub cumulative_driving_hours: f64,
    /// 1-based calendar day of the trip
    pub day: u32,
    pub duty_status: DutyStatus,
    pub notes: String,
}

impl Stop {
    /// Copy of this stop carrying a different location label
    pub fn relabeled(self, location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..self
        }
    }
}

/// One continuous stretch of a single duty status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DutyInterval {
    pub status: DutyStatus,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    /// Miles driven within this interval (zero unless driving)
    #[serde(default)]
    pub miles: f64,
}

impl DutyInterval {
    pub fn hours(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 3_600_000.0
    }
}

/// Hours spent in each duty status
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DutyTotals {
    pub off_duty: f64,
    pub sleeper_berth: f64,
    pub driving: f64,
    pub on_duty_not_driving: f64,
}

impl DutyTotals {
    pub fn add(&mut self, status: DutyStatus, hours: f64) {
        match status {
            DutyStatus::OffDuty => self.off_duty += hours,
            DutyStatus::SleeperBerth => self.sleeper_berth += hours,
            DutyStatus::Driving => self.driving += hours,
            DutyStatus::OnDutyNotDriving => self.on_duty_not_driving += hours,
        }
    }

    pub fn get(&self, status: DutyStatus) -> f64 {
        match status {
            DutyStatus::OffDuty => self.off_duty,
            DutyStatus::SleeperBerth => self.sleeper_berth,
            DutyStatus::Driving => self.driving,
            DutyStatus::OnDutyNotDriving => self.on_duty_not_driving,
        }
    }

    /// Hours that count toward the cycle (lines 3 and 4)
    pub fn on_duty(&self) -> f64 {
        DutyStatus::ALL
            .iter()
            .filter(|status| status.is_on_duty())
            .map(|status| self.get(*status))
            .sum()
    }

    pub fn total(&self) -> f64 {
        self.off_duty + self.sleeper_berth + self.driving + self.on_duty_not_driving
    }
}

/// Entry in the remarks section of a daily log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRemark {
    /// Local time of arrival, HH:MM
    pub time: String,
    pub location: String,
    pub activity: String,
}

/// One driver's daily log (midnight to midnight in the trip's start offset)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSheet {
    pub day: u32,
    pub date: NaiveDate,
    pub intervals: Vec<DutyInterval>,
    pub totals: DutyTotals,
    pub total_miles: f64,
    pub remarks: Vec<LogRemark>,
}

/// Aggregate figures for a planned trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub total_distance_miles: f64,
    pub total_duration_hours: f64,
    pub total_days: u32,
    pub fuel_stops: u32,
    /// 30-minute breaks
    pub rest_breaks: u32,
    /// 10-hour resets and 34-hour restarts
    pub rest_stops: u32,
    pub cycle_hours_after: f64,
}

/// Request to plan a trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripPlanRequest {
    pub current_location: String,
    pub pickup_location: String,
    pub dropoff_location: String,
    /// Hours already used in the 70-hour/8-day cycle
    pub current_cycle_hours: f64,
    /// Trip start; the transport layer fills in a default when absent
    #[serde(default)]
    pub start_time: Option<DateTime<FixedOffset>>,
}

/// Complete trip plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripPlan {
    /// Route polyline as GeoJSON [lng, lat] pairs
    pub route_geometry: Vec<[f64; 2]>,
    pub stops: Vec<Stop>,
    pub log_sheets: Vec<LogSheet>,
    pub summary: TripSummary,
}
