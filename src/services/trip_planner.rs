//! Trip planning: geocode, route, schedule, render.
//!
//! The planner is the only async part of the pipeline. It resolves the three
//! addresses, asks the router for distances and geometry, then hands a
//! `RouteSummary` to the pure scheduler and log renderer.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing::{debug, info, warn};

use crate::error::{PlanError, PlanResult};
use crate::services::geocoding::Geocoder;
use crate::services::hos::{
    CycleRollout, DutyScheduler, HosSettings, LegPurpose, RouteLeg, RouteSummary,
};
use crate::services::log_sheet::render_log_sheets;
use crate::services::routing::RoutingService;
use crate::types::{LogSheet, Stop, StopType, TripPlan, TripPlanRequest, TripSummary, Waypoint};

pub struct TripPlanner {
    geocoder: Arc<dyn Geocoder>,
    router: Arc<dyn RoutingService>,
    settings: HosSettings,
    scheduler: DutyScheduler,
}

impl TripPlanner {
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        router: Arc<dyn RoutingService>,
        settings: HosSettings,
    ) -> Self {
        Self {
            geocoder,
            router,
            scheduler: DutyScheduler::new(settings.clone()),
            settings,
        }
    }

    /// Plan with a custom 8-day rollout policy instead of `NoRollout`.
    ///
    /// The worker binary has no duty history to feed one, so only embedders
    /// that track prior days install a rollout.
    pub fn with_rollout(mut self, rollout: Arc<dyn CycleRollout>) -> Self {
        self.scheduler = self.scheduler.with_rollout(rollout);
        self
    }

    /// Plan a trip. `default_start` is used when the request has no start time.
    pub async fn plan(
        &self,
        request: &TripPlanRequest,
        default_start: DateTime<FixedOffset>,
    ) -> PlanResult<TripPlan> {
        // Reject before spending any geocoding quota
        self.settings.check_cycle_hours(request.current_cycle_hours)?;
        let start_time = request.start_time.unwrap_or(default_start);

        let origin = self.resolve(&request.current_location).await?;
        let pickup = self.resolve(&request.pickup_location).await?;
        let dropoff = self.resolve(&request.dropoff_location).await?;

        let route = self
            .router
            .route(&[origin.coordinates, pickup.coordinates, dropoff.coordinates])
            .await
            .map_err(|e| PlanError::Routing(format!("{:#}", e)))?;

        if route.legs.len() != 2 {
            return Err(PlanError::Routing(format!(
                "expected 2 legs from {}, got {}",
                self.router.name(),
                route.legs.len()
            )));
        }

        debug!(
            "Routed {:.1} mi via {} ({} geometry points)",
            route.total_distance_miles,
            self.router.name(),
            route.geometry.coordinates.len()
        );

        let summary = RouteSummary {
            origin,
            legs: vec![
                RouteLeg {
                    distance_miles: route.legs[0].distance_miles,
                    purpose: LegPurpose::ToPickup,
                    destination: pickup,
                },
                RouteLeg {
                    distance_miles: route.legs[1].distance_miles,
                    purpose: LegPurpose::ToDropoff,
                    destination: dropoff,
                },
            ],
            geometry: route.geometry.to_coordinates(),
        };

        let schedule = self
            .scheduler
            .schedule(&summary, start_time, request.current_cycle_hours)?;

        let stops = self.name_en_route_stops(schedule.stops).await;
        let log_sheets = render_log_sheets(&stops);
        let summary = summarize(
            &stops,
            &log_sheets,
            summary.total_distance_miles(),
            schedule.cycle_hours_after,
            &self.settings,
        );

        info!(
            "Planned trip {} -> {} -> {}: {:.0} mi, {} stops, {} day(s)",
            request.current_location,
            request.pickup_location,
            request.dropoff_location,
            summary.total_distance_miles,
            stops.len(),
            summary.total_days
        );

        Ok(TripPlan {
            route_geometry: route.geometry.coordinates,
            stops,
            log_sheets,
            summary,
        })
    }

    async fn resolve(&self, address: &str) -> PlanResult<Waypoint> {
        let found = self
            .geocoder
            .geocode(address)
            .await
            .map_err(|e| PlanError::Geocode {
                address: address.to_string(),
                reason: format!("{:#}", e),
            })?;

        match found {
            Some(result) => {
                debug!(
                    "Geocoded '{}' to '{}' ({:.4}, {:.4}, confidence {:.2}) via {}",
                    address,
                    result.display_name,
                    result.coordinates.lat,
                    result.coordinates.lng,
                    result.confidence,
                    self.geocoder.name()
                );
                Ok(Waypoint::new(address.trim(), result.coordinates))
            }
            None => Err(PlanError::Geocode {
                address: address.to_string(),
                reason: "no match found".to_string(),
            }),
        }
    }

    /// Replace "En route, mile N" labels with a place name where the geocoder
    /// knows one. Lookup failures keep the mile-marker label.
    async fn name_en_route_stops(&self, stops: Vec<Stop>) -> Vec<Stop> {
        let mut named = Vec::with_capacity(stops.len());

        for stop in stops {
            if !stop.stop_type.is_en_route() {
                named.push(stop);
                continue;
            }

            match self.geocoder.reverse_geocode(&stop.coordinates).await {
                Ok(Some(label)) => {
                    let location = format!("{} (mile {:.0})", label, stop.cumulative_miles);
                    named.push(stop.relabeled(location));
                }
                Ok(None) => named.push(stop),
                Err(e) => {
                    warn!("Reverse geocoding stop {} failed: {:#}", stop.id, e);
                    named.push(stop);
                }
            }
        }

        named
    }
}

/// Aggregate figures for the plan
pub fn summarize(
    stops: &[Stop],
    log_sheets: &[LogSheet],
    total_distance_miles: f64,
    cycle_hours_after: f64,
    settings: &HosSettings,
) -> TripSummary {
    let total_duration_hours = match (stops.first(), stops.last()) {
        (Some(first), Some(last)) => {
            (last.departure_time - first.arrival_time).num_milliseconds() as f64 / 3_600_000.0
        }
        _ => 0.0,
    };

    TripSummary {
        total_distance_miles,
        total_duration_hours,
        total_days: u32::try_from(log_sheets.len()).unwrap_or(u32::MAX),
        fuel_stops: count_stops(stops, |stop| {
            matches!(stop.stop_type, StopType::Fuel | StopType::FuelAndRest)
        }),
        rest_breaks: count_stops(stops, |stop| match stop.stop_type {
            StopType::RestBreak => true,
            StopType::FuelAndRest => stop.duration_minutes < settings.reset_minutes,
            _ => false,
        }),
        rest_stops: count_stops(stops, |stop| match stop.stop_type {
            StopType::RestStop => true,
            StopType::FuelAndRest => stop.duration_minutes >= settings.reset_minutes,
            _ => false,
        }),
        cycle_hours_after,
    }
}

fn count_stops(stops: &[Stop], pred: impl Fn(&Stop) -> bool) -> u32 {
    u32::try_from(stops.iter().filter(|stop| pred(stop)).count()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::geocoding::{GeocodingResult, MockGeocoder};
    use crate::services::routing::{MockRoutingService, RouteResult};
    use crate::types::Coordinates;
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn start() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 2, 6, 0, 0)
            .unwrap()
    }

    fn request(cycle: f64) -> TripPlanRequest {
        TripPlanRequest {
            current_location: "Chicago, IL".into(),
            pickup_location: "St. Louis, MO".into(),
            dropoff_location: "Los Angeles, CA".into(),
            current_cycle_hours: cycle,
            start_time: None,
        }
    }

    /// Knows a handful of real cities and names every en-route point
    struct AtlasGeocoder;

    #[async_trait]
    impl Geocoder for AtlasGeocoder {
        async fn geocode(&self, address: &str) -> anyhow::Result<Option<GeocodingResult>> {
            let coordinates = match address {
                "Chicago, IL" => Coordinates { lat: 41.8781, lng: -87.6298 },
                "St. Louis, MO" => Coordinates { lat: 38.6270, lng: -90.1994 },
                "Los Angeles, CA" => Coordinates { lat: 34.0522, lng: -118.2437 },
                "Down, DN" => anyhow::bail!("connection refused"),
                _ => return Ok(None),
            };
            Ok(Some(GeocodingResult {
                coordinates,
                confidence: 1.0,
                display_name: address.to_string(),
            }))
        }

        async fn reverse_geocode(&self, _coordinates: &Coordinates) -> anyhow::Result<Option<String>> {
            Ok(Some("Somewhere, US".to_string()))
        }

        fn name(&self) -> &'static str {
            "atlas"
        }
    }

    struct BrokenRouter;

    #[async_trait]
    impl RoutingService for BrokenRouter {
        async fn route(&self, _waypoints: &[Coordinates]) -> anyhow::Result<RouteResult> {
            anyhow::bail!("no route between points")
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    fn planner() -> TripPlanner {
        TripPlanner::new(
            Arc::new(AtlasGeocoder),
            Arc::new(MockRoutingService::new()),
            HosSettings::default(),
        )
    }

    #[test]
    fn test_plan_cross_country_trip() {
        let plan = tokio_test::block_on(planner().plan(&request(10.0), start())).unwrap();

        let types: Vec<StopType> = plan.stops.iter().map(|s| s.stop_type).collect();
        assert_eq!(types.first(), Some(&StopType::Start));
        assert_eq!(types.last(), Some(&StopType::End));
        assert!(types.contains(&StopType::Pickup));
        assert!(types.contains(&StopType::Dropoff));

        assert_eq!(plan.stops[0].arrival_time, start());
        assert_eq!(plan.stops[0].location, "Chicago, IL");
        assert_eq!(plan.summary.total_days as usize, plan.log_sheets.len());
        assert!(plan.summary.total_days >= 3);
        assert!(plan.summary.fuel_stops >= 1);
        assert!(plan.summary.rest_stops >= 1);
        assert!(!plan.route_geometry.is_empty());

        let last = plan.stops.last().unwrap();
        assert!((last.cumulative_miles - plan.summary.total_distance_miles).abs() < 1e-6);
    }

    #[test]
    fn test_en_route_stops_are_named() {
        let plan = tokio_test::block_on(planner().plan(&request(0.0), start())).unwrap();

        let en_route: Vec<&Stop> = plan.stops.iter().filter(|s| s.stop_type.is_en_route()).collect();
        assert!(!en_route.is_empty());
        for stop in en_route {
            assert!(stop.location.starts_with("Somewhere, US (mile "), "{}", stop.location);
        }
    }

    #[test]
    fn test_request_start_time_wins_over_default() {
        let mut req = request(0.0);
        let explicit = start() + chrono::Duration::hours(3);
        req.start_time = Some(explicit);

        let plan = tokio_test::block_on(planner().plan(&req, start())).unwrap();
        assert_eq!(plan.stops[0].arrival_time, explicit);
    }

    #[test]
    fn test_mock_collaborators_plan_any_addresses() {
        let planner = TripPlanner::new(
            Arc::new(MockGeocoder::new()),
            Arc::new(MockRoutingService::new()),
            HosSettings::default(),
        );
        let req = TripPlanRequest {
            current_location: "Denver, CO".into(),
            pickup_location: "Omaha, NE".into(),
            dropoff_location: "Memphis, TN".into(),
            current_cycle_hours: 0.0,
            start_time: None,
        };

        let plan = tokio_test::block_on(planner.plan(&req, start())).unwrap();
        assert_eq!(plan.stops.first().unwrap().stop_type, StopType::Start);
        assert_eq!(plan.stops.last().unwrap().stop_type, StopType::End);
    }

    #[test]
    fn test_unknown_address_is_geocode_error() {
        let mut req = request(0.0);
        req.pickup_location = "Atlantis".into();

        let err = tokio_test::block_on(planner().plan(&req, start())).unwrap_err();
        match err {
            PlanError::Geocode { address, .. } => assert_eq!(address, "Atlantis"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_geocoder_failure_is_geocode_error() {
        let mut req = request(0.0);
        req.dropoff_location = "Down, DN".into();

        let err = tokio_test::block_on(planner().plan(&req, start())).unwrap_err();
        assert_eq!(err.code(), "GEOCODE_ERROR");
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_router_failure_is_routing_error() {
        let planner = TripPlanner::new(
            Arc::new(AtlasGeocoder),
            Arc::new(BrokenRouter),
            HosSettings::default(),
        );

        let err = tokio_test::block_on(planner.plan(&request(0.0), start())).unwrap_err();
        assert!(matches!(err, PlanError::Routing(_)));
    }

    #[test]
    fn test_cycle_overflow_rejected() {
        let err = tokio_test::block_on(planner().plan(&request(75.0), start())).unwrap_err();
        assert_eq!(err.code(), "CLOCK_OVERFLOW");
    }

    #[test]
    fn test_same_pickup_as_origin_is_invalid_route() {
        let mut req = request(0.0);
        req.pickup_location = "Chicago, IL".into();

        let err = tokio_test::block_on(planner().plan(&req, start())).unwrap_err();
        assert!(matches!(err, PlanError::InvalidRoute(_)));
    }

    struct DropEverything;

    impl CycleRollout for DropEverything {
        fn on_new_day(&self, _day: u32, _cycle_hours: f64) -> f64 {
            0.0
        }
    }

    fn has_restart(plan: &TripPlan) -> bool {
        plan.stops.iter().any(|s| s.duration_minutes == 34 * 60)
    }

    #[test]
    fn test_planner_applies_configured_rollout() {
        // 50h lasts through the first overnight reset, then runs out on day 2
        let plain = tokio_test::block_on(planner().plan(&request(50.0), start())).unwrap();
        assert!(has_restart(&plain));

        let rolling = planner().with_rollout(Arc::new(DropEverything));
        let plan = tokio_test::block_on(rolling.plan(&request(50.0), start())).unwrap();
        assert!(!has_restart(&plan));
    }

    #[test]
    fn test_summarize_counts_merged_stops() {
        let plan = tokio_test::block_on(planner().plan(&request(0.0), start())).unwrap();
        let mut stops = plan.stops.clone();
        let template = stops[1].clone();
        stops.push(Stop {
            stop_type: StopType::FuelAndRest,
            duration_minutes: 30,
            ..template.clone()
        });
        stops.push(Stop {
            stop_type: StopType::FuelAndRest,
            duration_minutes: 600,
            ..template
        });

        let before = summarize(&plan.stops, &plan.log_sheets, 0.0, 0.0, &HosSettings::default());
        let after = summarize(&stops, &plan.log_sheets, 0.0, 0.0, &HosSettings::default());

        assert_eq!(after.fuel_stops, before.fuel_stops + 2);
        assert_eq!(after.rest_breaks, before.rest_breaks + 1);
        assert_eq!(after.rest_stops, before.rest_stops + 1);
    }
}
