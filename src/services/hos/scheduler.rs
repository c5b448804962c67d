//! Duty scheduler: walks the route once, inserting every mandated break,
//! reset, restart and fuel stop in front of the driving that would otherwise
//! violate a limit.
//!
//! The scheduler is pure. It performs no I/O and never reads the wall clock,
//! so identical inputs always yield an identical stop sequence.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset};
use tracing::debug;

use crate::error::{PlanError, PlanResult};
use crate::services::geo;
use crate::types::{Coordinates, DutyStatus, Stop, StopType, Waypoint};

use super::clock::{driving_duration, hours_of, ClockState, HOURS_EPSILON, MILES_EPSILON};
use super::rules::{
    decide, default_rules, fuel_due, CycleRollout, Decision, HosRule, HosSettings, NoRollout,
    RestKind,
};

/// Why a leg is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegPurpose {
    /// Ends at the pickup location
    ToPickup,
    /// Ends at the dropoff location
    ToDropoff,
    /// Ends at an intermediate waypoint with no stop
    Transit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteLeg {
    pub distance_miles: f64,
    pub purpose: LegPurpose,
    pub destination: Waypoint,
}

/// Scheduler input: where the truck starts and the routed legs in order
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSummary {
    pub origin: Waypoint,
    pub legs: Vec<RouteLeg>,
    /// Full route polyline, used to place en-route stops. May be empty.
    pub geometry: Vec<Coordinates>,
}

impl RouteSummary {
    pub fn total_distance_miles(&self) -> f64 {
        self.legs.iter().map(|leg| leg.distance_miles).sum()
    }

    fn validate(&self) -> PlanResult<()> {
        if self.legs.is_empty() {
            return Err(PlanError::InvalidRoute("route has no legs".to_string()));
        }

        for (index, leg) in self.legs.iter().enumerate() {
            if !leg.distance_miles.is_finite() || leg.distance_miles < 0.0 {
                return Err(PlanError::InvalidRoute(format!(
                    "leg {} has invalid distance {}",
                    index + 1,
                    leg.distance_miles
                )));
            }
            if leg.distance_miles == 0.0 && leg.purpose != LegPurpose::Transit {
                return Err(PlanError::InvalidRoute(format!(
                    "leg {} to {} has zero length",
                    index + 1,
                    leg.destination.label
                )));
            }
        }

        Ok(())
    }
}

/// Output of one scheduling run
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub stops: Vec<Stop>,
    pub cycle_hours_after: f64,
    /// Hours of driving across the whole trip
    pub driving_hours: f64,
}

pub struct DutyScheduler {
    settings: HosSettings,
    rules: Vec<HosRule>,
    rollout: Arc<dyn CycleRollout>,
}

impl DutyScheduler {
    pub fn new(settings: HosSettings) -> Self {
        Self {
            settings,
            rules: default_rules(),
            rollout: Arc::new(NoRollout),
        }
    }

    /// Replace the default `NoRollout` policy
    pub fn with_rollout(mut self, rollout: Arc<dyn CycleRollout>) -> Self {
        self.rollout = rollout;
        self
    }

    /// Plan every stop of the trip.
    pub fn schedule(
        &self,
        route: &RouteSummary,
        start_time: DateTime<FixedOffset>,
        current_cycle_hours: f64,
    ) -> PlanResult<Schedule> {
        route.validate()?;
        let clocks = ClockState::new(start_time, current_cycle_hours, &self.settings)?;

        let mut run = ScheduleRun {
            settings: &self.settings,
            rules: &self.rules,
            rollout: self.rollout.as_ref(),
            route,
            route_miles: route.total_distance_miles(),
            geometry_miles: geo::polyline_length_miles(&route.geometry),
            last_day: clocks.current_day,
            clocks,
            stops: Vec::new(),
            driving_hours: 0.0,
            leg_from: route.origin.coordinates,
            leg_to: route.origin.coordinates,
            leg_start_miles: 0.0,
            leg_miles: 0.0,
        };

        run.push_stop(
            StopType::Start,
            &route.origin,
            self.settings.pre_trip_minutes,
            DutyStatus::OnDutyNotDriving,
            "Pre-trip inspection",
        );
        run.clocks.on_duty(minutes(self.settings.pre_trip_minutes));
        run.roll_days();

        for leg in &route.legs {
            run.drive_leg(leg);

            match leg.purpose {
                LegPurpose::ToPickup => {
                    run.push_stop(
                        StopType::Pickup,
                        &leg.destination,
                        self.settings.pickup_minutes,
                        DutyStatus::OnDutyNotDriving,
                        "Loading cargo",
                    );
                    run.clocks.on_duty(minutes(self.settings.pickup_minutes));
                }
                LegPurpose::ToDropoff => {
                    run.push_stop(
                        StopType::Dropoff,
                        &leg.destination,
                        self.settings.dropoff_minutes,
                        DutyStatus::OnDutyNotDriving,
                        "Unloading cargo",
                    );
                    run.clocks.on_duty(minutes(self.settings.dropoff_minutes));
                }
                LegPurpose::Transit => {}
            }
            run.roll_days();
        }

        let last = route
            .legs
            .last()
            .map_or(&route.origin, |leg| &leg.destination);
        run.push_stop(
            StopType::End,
            last,
            self.settings.post_trip_minutes,
            DutyStatus::OnDutyNotDriving,
            "Post-trip inspection",
        );
        run.clocks.on_duty(minutes(self.settings.post_trip_minutes));
        run.roll_days();

        debug!(
            "Scheduled {} stops over {} day(s), {:.1} driving hours",
            run.stops.len(),
            run.clocks.current_day,
            run.driving_hours
        );

        Ok(Schedule {
            cycle_hours_after: run.clocks.cycle_hours_8day,
            driving_hours: run.driving_hours,
            stops: run.stops,
        })
    }
}

fn minutes(value: u32) -> Duration {
    Duration::minutes(i64::from(value))
}

/// Mutable state of a single `schedule` call
struct ScheduleRun<'a> {
    settings: &'a HosSettings,
    rules: &'a [HosRule],
    rollout: &'a dyn CycleRollout,
    route: &'a RouteSummary,
    route_miles: f64,
    geometry_miles: f64,
    clocks: ClockState,
    last_day: u32,
    stops: Vec<Stop>,
    driving_hours: f64,
    leg_from: Coordinates,
    leg_to: Coordinates,
    leg_start_miles: f64,
    leg_miles: f64,
}

impl ScheduleRun<'_> {
    fn drive_leg(&mut self, leg: &RouteLeg) {
        self.leg_from = self.leg_to;
        self.leg_to = leg.destination.coordinates;
        self.leg_start_miles = self.clocks.cumulative_miles;
        self.leg_miles = leg.distance_miles;
        let leg_end = self.leg_start_miles + leg.distance_miles;

        loop {
            let remaining = leg_end - self.clocks.cumulative_miles;
            if remaining <= MILES_EPSILON {
                break;
            }

            if let Some(decision) = decide(self.rules, &self.clocks, self.settings) {
                self.insert(decision);
                continue;
            }

            debug_assert!(self.clocks.within_limits(self.settings));
            let headroom_miles =
                self.clocks.driving_headroom_hours(self.settings) * self.settings.average_speed_mph;
            let to_fuel = self.clocks.miles_to_fuel();
            let miles = remaining.min(headroom_miles).min(to_fuel);

            let duration = driving_duration(miles, self.settings.average_speed_mph);
            self.clocks.drive(duration, miles);
            self.driving_hours += hours_of(duration);

            // Land exactly on the marker that bounded this increment
            if miles >= remaining {
                self.clocks.cumulative_miles = leg_end;
            } else if miles >= to_fuel {
                self.clocks.cumulative_miles = self.clocks.next_fuel_at_miles;
            }
            self.roll_days();
        }

        self.clocks.cumulative_miles = leg_end;

        // Arriving exactly on a fuel boundary
        if fuel_due(&self.clocks, self.settings) {
            self.insert(Decision { rest: None, fuel: true });
        }
    }

    fn insert(&mut self, decision: Decision) {
        let waypoint = self.en_route_waypoint();

        match (decision.rest, decision.fuel) {
            (None, true) => {
                let note = self.fuel_note();
                self.push_stop(
                    StopType::Fuel,
                    &waypoint,
                    self.settings.fuel_minutes,
                    DutyStatus::OnDutyNotDriving,
                    &note,
                );
                self.clocks.on_duty(minutes(self.settings.fuel_minutes));
            }
            (Some(rest), fuel) => {
                let rest_minutes = rest.minutes(self.settings);
                let mut note = self.rest_note(rest);
                let stop_type = if fuel {
                    note = format!("{}; {}", self.fuel_note(), note);
                    StopType::FuelAndRest
                } else if rest == RestKind::Break {
                    StopType::RestBreak
                } else {
                    StopType::RestStop
                };

                self.push_stop(stop_type, &waypoint, rest_minutes, DutyStatus::OffDuty, &note);
                let duration = minutes(rest_minutes);
                match rest {
                    RestKind::Break => self.clocks.off_duty(duration, self.settings),
                    RestKind::Reset => self.clocks.qualifying_reset(duration),
                    RestKind::Restart => self.clocks.full_restart(duration),
                }
            }
            (None, false) => return,
        }

        if decision.fuel {
            self.clocks.next_fuel_at_miles += self.settings.fuel_interval_miles;
        }
        self.roll_days();
    }

    fn rest_note(&self, rest: RestKind) -> String {
        match rest {
            RestKind::Break => format!(
                "30-minute break ({} hours driving)",
                self.settings.break_required_after_hours
            ),
            RestKind::Reset => {
                let limit = if self.clocks.driving_hours_today
                    >= self.settings.max_driving_hours - HOURS_EPSILON
                {
                    format!("{}-hour driving limit", self.settings.max_driving_hours)
                } else {
                    format!("{}-hour window", self.settings.max_window_hours)
                };
                format!("10-hour rest ({limit})")
            }
            RestKind::Restart => format!(
                "34-hour restart ({}-hour cycle limit)",
                self.settings.max_cycle_hours
            ),
        }
    }

    fn fuel_note(&self) -> String {
        format!("Fuel stop ({:.0} miles)", self.clocks.next_fuel_at_miles)
    }

    /// Where the truck currently is, for stops not tied to a named waypoint
    fn en_route_waypoint(&self) -> Waypoint {
        let miles = self.clocks.cumulative_miles;

        let coordinates = if self.geometry_miles > 0.0 && self.route_miles > 0.0 {
            let along = miles * self.geometry_miles / self.route_miles;
            geo::point_along_route(&self.route.geometry, along).unwrap_or(self.leg_to)
        } else if self.leg_miles > 0.0 {
            let fraction = (miles - self.leg_start_miles) / self.leg_miles;
            geo::interpolate(&self.leg_from, &self.leg_to, fraction)
        } else {
            self.leg_to
        };

        Waypoint::new(format!("En route, mile {miles:.0}"), coordinates)
    }

    fn push_stop(
        &mut self,
        stop_type: StopType,
        waypoint: &Waypoint,
        duration_minutes: u32,
        duty_status: DutyStatus,
        notes: &str,
    ) {
        let arrival_time = self.clocks.current_time;
        let stop = Stop {
            id: u32::try_from(self.stops.len() + 1).unwrap_or(u32::MAX),
            stop_type,
            location: waypoint.label.clone(),
            coordinates: waypoint.coordinates,
            arrival_time,
            departure_time: arrival_time + minutes(duration_minutes),
            duration_minutes,
            cumulative_miles: self.clocks.cumulative_miles,
            cumulative_driving_hours: self.clocks.driving_hours_today,
            day: self.clocks.day_of(arrival_time),
            duty_status,
            notes: notes.to_string(),
        };

        debug!(
            "Stop {} {} at mile {:.1} ({})",
            stop.id,
            stop_type.as_str(),
            stop.cumulative_miles,
            stop.arrival_time
        );
        self.stops.push(stop);
    }

    /// Give the rollout hook a chance on every calendar day entered
    fn roll_days(&mut self) {
        while self.last_day < self.clocks.current_day {
            self.last_day += 1;
            self.clocks.cycle_hours_8day = self
                .rollout
                .on_new_day(self.last_day, self.clocks.cycle_hours_8day);
        }
    }
}
