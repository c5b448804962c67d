//! NATS message handlers

pub mod ping;
pub mod trip;

use std::sync::Arc;
use anyhow::Result;
use async_nats::Client;
use tracing::{info, error};
use tokio::select;

use crate::config::Config;
use crate::services::geocoding::{create_geocoder, Geocoder};
use crate::services::routing::{RoutingService, create_routing_service_with_fallback};
use crate::services::trip_planner::TripPlanner;

pub const PING_SUBJECT: &str = "eld.ping";
pub const TRIP_PLAN_SUBJECT: &str = "eld.trip.plan";

/// Start all message handlers
pub async fn start_handlers(client: Client, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let geocoder: Arc<dyn Geocoder> =
        Arc::from(create_geocoder(&config.geocoder_backend, &config.nominatim_url));
    info!("Geocoder initialized: {}", geocoder.name());

    // Create routing service with automatic Valhalla detection
    let routing_service: Arc<dyn RoutingService> = Arc::from(
        create_routing_service_with_fallback(config.valhalla_url.clone()).await
    );
    info!("Routing service initialized: {}", routing_service.name());

    let planner = Arc::new(TripPlanner::new(
        geocoder,
        routing_service,
        config.hos_settings(),
    ));

    let ping_sub = client.subscribe(PING_SUBJECT).await?;
    let trip_plan_sub = client.subscribe(TRIP_PLAN_SUBJECT).await?;

    info!("Subscribed to {}, {}", PING_SUBJECT, TRIP_PLAN_SUBJECT);

    let client_ping = client.clone();
    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub).await
    });

    let client_plan = client.clone();
    let trip_plan_handle = tokio::spawn(async move {
        trip::handle_plan(client_plan, trip_plan_sub, planner).await
    });

    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = trip_plan_handle => {
            error!("Trip plan handler finished: {:?}", result);
        }
    }

    Ok(())
}
