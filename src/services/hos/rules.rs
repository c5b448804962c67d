//! HOS limits and the ordered decision table evaluated before every driving
//! increment.

use crate::error::{PlanError, PlanResult};

use super::clock::{ClockState, HOURS_EPSILON, MILES_EPSILON};

/// FMCSA property-carrying limits and the trip assumptions used for planning
#[derive(Debug, Clone, PartialEq)]
pub struct HosSettings {
    pub max_driving_hours: f64,
    pub max_window_hours: f64,
    pub break_required_after_hours: f64,
    pub max_cycle_hours: f64,

    pub break_minutes: u32,
    pub reset_minutes: u32,
    pub restart_minutes: u32,

    pub average_speed_mph: f64,
    pub fuel_interval_miles: f64,
    pub fuel_minutes: u32,
    pub pre_trip_minutes: u32,
    pub pickup_minutes: u32,
    pub dropoff_minutes: u32,
    pub post_trip_minutes: u32,
}

impl Default for HosSettings {
    fn default() -> Self {
        Self {
            max_driving_hours: 11.0,
            max_window_hours: 14.0,
            break_required_after_hours: 8.0,
            max_cycle_hours: 70.0,
            break_minutes: 30,
            reset_minutes: 10 * 60,
            restart_minutes: 34 * 60,
            average_speed_mph: 55.0,
            fuel_interval_miles: 1000.0,
            fuel_minutes: 30,
            pre_trip_minutes: 30,
            pickup_minutes: 60,
            dropoff_minutes: 60,
            post_trip_minutes: 15,
        }
    }
}

impl HosSettings {
    /// Starting cycle hours must lie in `0..=max_cycle_hours`; nothing is clamped.
    pub fn check_cycle_hours(&self, hours: f64) -> PlanResult<()> {
        if hours.is_finite() && (0.0..=self.max_cycle_hours).contains(&hours) {
            Ok(())
        } else {
            Err(PlanError::ClockOverflow {
                hours,
                limit: self.max_cycle_hours,
            })
        }
    }
}

/// Mandated rest, ordered from shortest to longest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RestKind {
    /// 30 minutes off duty after 8 hours of driving
    Break,
    /// 10 consecutive hours off duty
    Reset,
    /// 34 consecutive hours off duty
    Restart,
}

impl RestKind {
    pub fn minutes(self, settings: &HosSettings) -> u32 {
        match self {
            RestKind::Break => settings.break_minutes,
            RestKind::Reset => settings.reset_minutes,
            RestKind::Restart => settings.restart_minutes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Rest(RestKind),
    Fuel,
}

/// One row of the decision table
#[derive(Clone, Copy)]
pub struct HosRule {
    pub name: &'static str,
    pub kind: RuleKind,
    pub applies: fn(&ClockState, &HosSettings) -> bool,
}

impl std::fmt::Debug for HosRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HosRule")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// What to insert before driving may resume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub rest: Option<RestKind>,
    pub fuel: bool,
}

impl Decision {
    fn from_kind(kind: RuleKind) -> Self {
        match kind {
            RuleKind::Rest(rest) => Self { rest: Some(rest), fuel: false },
            RuleKind::Fuel => Self { rest: None, fuel: true },
        }
    }

    /// Fold another matching rule in. The longest rest wins since it also
    /// satisfies the shorter ones; fuel merges with whatever rest is taken.
    fn absorb(self, kind: RuleKind) -> Self {
        match kind {
            RuleKind::Rest(rest) => Self {
                rest: Some(self.rest.map_or(rest, |current| current.max(rest))),
                ..self
            },
            RuleKind::Fuel => Self { fuel: true, ..self },
        }
    }
}

fn break_due(clocks: &ClockState, settings: &HosSettings) -> bool {
    clocks.driving_since_break >= settings.break_required_after_hours - HOURS_EPSILON
}

fn reset_due(clocks: &ClockState, settings: &HosSettings) -> bool {
    clocks.driving_hours_today >= settings.max_driving_hours - HOURS_EPSILON
        || clocks.window_hours_today >= settings.max_window_hours - HOURS_EPSILON
}

fn restart_due(clocks: &ClockState, settings: &HosSettings) -> bool {
    clocks.cycle_hours_8day >= settings.max_cycle_hours - HOURS_EPSILON
}

pub(crate) fn fuel_due(clocks: &ClockState, _settings: &HosSettings) -> bool {
    clocks.cumulative_miles >= clocks.next_fuel_at_miles - MILES_EPSILON
}

/// The standard table, in evaluation order
pub fn default_rules() -> Vec<HosRule> {
    vec![
        HosRule { name: "8-hour break", kind: RuleKind::Rest(RestKind::Break), applies: break_due },
        HosRule { name: "11/14-hour reset", kind: RuleKind::Rest(RestKind::Reset), applies: reset_due },
        HosRule { name: "70-hour restart", kind: RuleKind::Rest(RestKind::Restart), applies: restart_due },
        HosRule { name: "fuel", kind: RuleKind::Fuel, applies: fuel_due },
    ]
}

/// Evaluate the table top to bottom. Returns `None` when driving may continue.
pub fn decide(rules: &[HosRule], clocks: &ClockState, settings: &HosSettings) -> Option<Decision> {
    let mut matched = rules
        .iter()
        .filter(|rule| (rule.applies)(clocks, settings))
        .map(|rule| rule.kind);

    let first = Decision::from_kind(matched.next()?);
    Some(matched.fold(first, Decision::absorb))
}

/// Hook for recomputing the rolling 8-day cycle when the trip enters a new
/// calendar day. Without one configured, cycle hours only ever grow during a
/// trip.
pub trait CycleRollout: Send + Sync {
    /// Return the cycle hours to carry into `day` (1-based trip day)
    fn on_new_day(&self, day: u32, cycle_hours: f64) -> f64;
}

/// Default policy: no hours fall off the window during a trip
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRollout;

impl CycleRollout for NoRollout {
    fn on_new_day(&self, _day: u32, cycle_hours: f64) -> f64 {
        cycle_hours
    }
}
