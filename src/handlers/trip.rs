//! Trip planning handler

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use chrono::{DateTime, FixedOffset};
use futures::StreamExt;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::defaults::default_trip_start;
use crate::services::trip_planner::TripPlanner;
use crate::types::{ErrorResponse, Request, SuccessResponse, TripPlanRequest};

/// Handle eld.trip.plan requests
pub async fn handle_plan(
    client: Client,
    mut subscriber: Subscriber,
    planner: Arc<TripPlanner>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received trip.plan message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("trip.plan message without reply subject");
                continue;
            }
        };

        let default_start = default_trip_start(chrono::Utc::now());
        let response = plan_reply(&planner, &msg.payload, default_start).await?;
        let _ = client.publish(reply, response.into()).await;
    }

    Ok(())
}

/// Build the serialized reply for one request payload
pub(crate) async fn plan_reply(
    planner: &TripPlanner,
    payload: &[u8],
    default_start: DateTime<FixedOffset>,
) -> Result<Vec<u8>> {
    let request: Request<TripPlanRequest> = match serde_json::from_slice(payload) {
        Ok(req) => req,
        Err(e) => {
            error!("Failed to parse trip.plan request: {}", e);
            let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
            return Ok(serde_json::to_vec(&error)?);
        }
    };

    match planner.plan(&request.payload, default_start).await {
        Ok(plan) => {
            let success = SuccessResponse::new(request.id, plan);
            Ok(serde_json::to_vec(&success)?)
        }
        Err(e) => {
            warn!("Trip planning failed: {}", e);
            let error = ErrorResponse::new(request.id, e.code(), e.to_string());
            Ok(serde_json::to_vec(&error)?)
        }
    }
}
