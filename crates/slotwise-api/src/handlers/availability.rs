//! Availability endpoint.

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use slotwise_core::StylistId;
use tracing::instrument;
use uuid::Uuid;

use super::error_response;
use crate::state::AppState;

/// Query parameters for `GET /availability`.
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    /// Stylist to check.
    pub stylist_id: Uuid,
    /// Gregorian date, `YYYY-MM-DD`.
    pub date: chrono::NaiveDate,
}

/// Working window as exposed to clients.
#[derive(Debug, Serialize)]
pub struct WorkingHoursDto {
    /// Window start, `HH:MM`.
    pub start: String,
    /// Window end, `HH:MM`.
    pub end: String,
}

/// Response body for `GET /availability`.
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    /// Stylist the slots belong to.
    pub stylist_id: Uuid,
    /// Date the slots are for.
    pub date: chrono::NaiveDate,
    /// Open slot starting times, ascending, `HH:MM`.
    pub slots: Vec<String>,
    /// Working window, absent when none is configured for the weekday.
    pub working_hours: Option<WorkingHoursDto>,
}

/// Lists open slots for a stylist on a date.
#[instrument(name = "get_availability", skip(state))]
pub async fn get_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Response {
    match state.availability.available_slots(StylistId(query.stylist_id), query.date).await {
        Ok(availability) => Json(AvailabilityResponse {
            stylist_id: query.stylist_id,
            date: query.date,
            slots: availability
                .slots
                .iter()
                .map(|slot| slot.format("%H:%M").to_string())
                .collect(),
            working_hours: availability.working_hours.map(|(start, end)| WorkingHoursDto {
                start: start.format("%H:%M").to_string(),
                end: end.format("%H:%M").to_string(),
            }),
        })
        .into_response(),
        Err(error) => error_response(&error),
    }
}
