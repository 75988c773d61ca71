//! HTTP request handlers.

pub mod appointments;
pub mod availability;
pub mod booking;
pub mod health;

pub use appointments::{cancel_appointment, confirm_appointment};
pub use availability::get_availability;
pub use booking::book_appointment;
pub use health::health_check;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use slotwise_core::{calendar, Actor, ActorRole, Appointment, CoreError, CustomerId};
use uuid::Uuid;

/// Error envelope returned to API callers.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Short machine-mappable error description.
    pub error: String,
}

/// Maps a core error onto its HTTP representation.
pub(crate) fn error_response(error: &CoreError) -> Response {
    let (status, message) = match error {
        CoreError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
        CoreError::Conflict(message) => (StatusCode::CONFLICT, message.clone()),
        CoreError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
        CoreError::Permission(message) => (StatusCode::FORBIDDEN, message.clone()),
        CoreError::Database(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
        },
    };

    (status, Json(ErrorBody { error: message })).into_response()
}

/// Appointment representation returned by the API.
#[derive(Debug, Serialize)]
pub struct AppointmentDto {
    /// Appointment ID.
    pub id: Uuid,
    /// Customer ID.
    pub customer_id: Uuid,
    /// Stylist ID.
    pub stylist_id: Uuid,
    /// Service ID.
    pub service_id: Uuid,
    /// Gregorian date.
    pub date: String,
    /// Starting time, `HH:MM`.
    pub time: String,
    /// Persian calendar date, `YYYY/MM/DD`.
    pub persian_date: String,
    /// Lifecycle status.
    pub status: String,
    /// Customer note.
    pub customer_notes: String,
}

impl From<&Appointment> for AppointmentDto {
    fn from(appointment: &Appointment) -> Self {
        Self {
            id: appointment.id.0,
            customer_id: appointment.customer_id.0,
            stylist_id: appointment.stylist_id.0,
            service_id: appointment.service_id.0,
            date: appointment.date.to_string(),
            time: appointment.time.format("%H:%M").to_string(),
            persian_date: calendar::persian_date_string(appointment.date),
            status: appointment.status.to_string(),
            customer_notes: appointment.customer_notes.clone(),
        }
    }
}

/// Identity headers are stamped by the upstream auth layer; this surface
/// only reads them.
pub(crate) fn customer_from_headers(headers: &HeaderMap) -> Result<CustomerId, Response> {
    let id = headers
        .get("x-customer-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok());

    match id {
        Some(id) => Ok(CustomerId(id)),
        None => Err((
            StatusCode::FORBIDDEN,
            Json(ErrorBody { error: "missing or invalid X-Customer-Id".to_string() }),
        )
            .into_response()),
    }
}

/// Extracts the acting user from the identity headers.
pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok());
    let role = headers
        .get("x-actor-role")
        .and_then(|v| v.to_str().ok())
        .and_then(ActorRole::parse);

    match (id, role) {
        (Some(id), Some(role)) => Ok(Actor { id, role }),
        _ => Err((
            StatusCode::FORBIDDEN,
            Json(ErrorBody { error: "missing or invalid actor headers".to_string() }),
        )
            .into_response()),
    }
}

/// Parses `HH:MM` (or `HH:MM:SS`) times as the booking API accepts them.
pub(crate) fn parse_time_slot(value: &str) -> Option<chrono::NaiveTime> {
    chrono::NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| chrono::NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}
