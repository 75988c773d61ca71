//! Appointment lifecycle endpoints: cancel and confirm.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use slotwise_core::AppointmentId;
use tracing::instrument;
use uuid::Uuid;

use super::{actor_from_headers, error_response, AppointmentDto};
use crate::state::AppState;

/// Request body for `POST /appointments/{id}/cancel`.
#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    /// Cancellation reason. Mandatory for manager-initiated cancellations.
    #[serde(default)]
    pub reason: Option<String>,
}

/// Cancels an appointment.
///
/// Returns 200 with the cancelled appointment, 403 when the actor may not
/// cancel it, and 400 when a manager omits the reason.
#[instrument(name = "cancel_appointment", skip(state, headers, body))]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Option<Json<CancelBody>>,
) -> Response {
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let reason = body.and_then(|Json(body)| body.reason);

    match state.lifecycle.cancel(AppointmentId(id), actor, reason).await {
        Ok(appointment) => Json(AppointmentDto::from(&appointment)).into_response(),
        Err(error) => error_response(&error),
    }
}

/// Confirms a pending appointment. Manager only.
#[instrument(name = "confirm_appointment", skip(state, headers))]
pub async fn confirm_appointment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Response {
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    match state.lifecycle.confirm(AppointmentId(id), actor).await {
        Ok(appointment) => Json(AppointmentDto::from(&appointment)).into_response(),
        Err(error) => error_response(&error),
    }
}
