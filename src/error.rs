//! Trip planning errors
//!
//! Every variant is terminal for the request: there are no partial plans.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid route: {0}")]
    InvalidRoute(String),

    #[error("starting cycle hours {hours} outside the 0-{limit} hour cycle")]
    ClockOverflow { hours: f64, limit: f64 },

    #[error("could not geocode '{address}': {reason}")]
    Geocode { address: String, reason: String },

    #[error("routing failed: {0}")]
    Routing(String),
}

impl PlanError {
    /// Error code used in transport replies
    pub const fn code(&self) -> &'static str {
        match self {
            PlanError::InvalidRoute(_) => "INVALID_ROUTE",
            PlanError::ClockOverflow { .. } => "CLOCK_OVERFLOW",
            PlanError::Geocode { .. } => "GEOCODE_ERROR",
            PlanError::Routing(_) => "ROUTING_ERROR",
        }
    }
}

pub type PlanResult<T> = Result<T, PlanError>;
