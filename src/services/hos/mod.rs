//! Hours-of-service planning: the regulatory clocks, the rule table and the
//! scheduler that turns a route into a stop sequence.

pub mod clock;
pub mod rules;
pub mod scheduler;

pub use rules::{CycleRollout, HosSettings};
pub use scheduler::{DutyScheduler, LegPurpose, RouteLeg, RouteSummary};
