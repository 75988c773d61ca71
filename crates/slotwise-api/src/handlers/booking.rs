//! Booking endpoint.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use slotwise_booking::BookingRequest;
use slotwise_core::{ServiceId, StylistId};
use tracing::instrument;
use uuid::Uuid;

use super::{customer_from_headers, error_response, parse_time_slot, AppointmentDto, ErrorBody};
use crate::state::AppState;

/// Request body for `POST /book`.
#[derive(Debug, Deserialize)]
pub struct BookBody {
    /// Stylist to book with.
    pub stylist_id: Uuid,
    /// Service to book.
    pub service_id: Uuid,
    /// Gregorian date, `YYYY-MM-DD`.
    pub date: chrono::NaiveDate,
    /// Slot starting time, `HH:MM`.
    pub time_slot: String,
    /// Optional customer note.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Response body for a successful booking.
#[derive(Debug, Serialize)]
pub struct BookResponse {
    /// Confirmation message.
    pub message: String,
    /// The booked appointment.
    pub appointment: AppointmentDto,
}

/// Books an appointment.
///
/// Returns 201 with the appointment, 409 `slot_taken` when another active
/// appointment holds the slot, 400 for validation problems, and 404 for
/// unknown references.
#[instrument(name = "book_appointment", skip(state, headers, body))]
pub async fn book_appointment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BookBody>,
) -> Response {
    let customer_id = match customer_from_headers(&headers) {
        Ok(customer_id) => customer_id,
        Err(response) => return response,
    };

    let Some(time) = parse_time_slot(&body.time_slot) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody { error: "time_slot must be HH:MM".to_string() }),
        )
            .into_response();
    };

    let request = BookingRequest {
        customer_id,
        stylist_id: StylistId(body.stylist_id),
        service_id: ServiceId(body.service_id),
        date: body.date,
        time,
        notes: body.notes,
    };

    match state.booking.book(request).await {
        Ok(appointment) => (
            StatusCode::CREATED,
            Json(BookResponse {
                message: "appointment booked".to_string(),
                appointment: AppointmentDto::from(&appointment),
            }),
        )
            .into_response(),
        Err(error) => error_response(&error),
    }
}
