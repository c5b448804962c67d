//! ELD Planner Worker - HOS-compliant trip planning service
//!
//! This worker connects to NATS and answers trip planning requests. The
//! `plan` subcommand runs a single plan locally and prints it as JSON.

mod cli;
mod config;
mod defaults;
mod error;
mod handlers;
mod services;
mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use clap::Parser;
use tracing::{info, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::services::geocoding::{create_geocoder, Geocoder};
use crate::services::routing::{create_routing_service_with_fallback, RoutingService};
use crate::services::trip_planner::TripPlanner;
use crate::types::TripPlanRequest;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR")
        .unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &logs_dir,
        "eld-planner.log",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // stdout carries the plan JSON in `plan` mode, so console logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,eld_planner_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    let config = Config::from_env()?;
    info!("Configuration loaded");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&config).await,
        Command::Plan { from, pickup, dropoff, cycle_hours, start, pretty } => {
            let request = TripPlanRequest {
                current_location: from,
                pickup_location: pickup,
                dropoff_location: dropoff,
                current_cycle_hours: cycle_hours,
                start_time: start,
            };
            plan_once(&config, request, pretty).await
        }
    }
}

async fn serve(config: &Config) -> Result<()> {
    info!("Starting ELD Planner Worker...");

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (std::env::var("NATS_USER"), std::env::var("NATS_PASSWORD")) {
        (Ok(user), Ok(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user, password)
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    let handler_result = handlers::start_handlers(nats_client, config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

async fn plan_once(config: &Config, request: TripPlanRequest, pretty: bool) -> Result<()> {
    let geocoder: Arc<dyn Geocoder> =
        Arc::from(create_geocoder(&config.geocoder_backend, &config.nominatim_url));
    let router: Arc<dyn RoutingService> =
        Arc::from(create_routing_service_with_fallback(config.valhalla_url.clone()).await);
    let planner = TripPlanner::new(geocoder, router, config.hos_settings());

    let default_start: DateTime<FixedOffset> = defaults::default_trip_start(chrono::Utc::now());
    let plan = planner
        .plan(&request, default_start)
        .await
        .with_context(|| {
            format!(
                "Failed to plan trip {} -> {} -> {}",
                request.current_location, request.pickup_location, request.dropoff_location
            )
        })?;

    let json = if pretty {
        serde_json::to_string_pretty(&plan)?
    } else {
        serde_json::to_string(&plan)?
    };
    println!("{}", json);

    Ok(())
}
