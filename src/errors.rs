use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::services::bookings::BookingError;

/// HTTP boundary wrapper for domain errors. Conflict and availability
/// failures surface their specific reason so clients can offer another
/// slot; internals are logged and masked.
#[derive(Debug)]
pub struct ApiError(pub BookingError);

impl From<BookingError> for ApiError {
    fn from(e: BookingError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BookingError::Time(_)
            | BookingError::PastDate
            | BookingError::DurationTooShort
            | BookingError::InvalidDate(_)
            | BookingError::UnsupportedPaymentMethod(_)
            | BookingError::Availability(_)
            | BookingError::CourtFacilityMismatch
            | BookingError::CourtInactive
            | BookingError::InvalidTransition { .. }
            | BookingError::CancellationWindowClosed
            | BookingError::ConcurrentModification
            | BookingError::PaymentFailed(_)
            | BookingError::RefundFailed(_) => StatusCode::BAD_REQUEST,

            BookingError::FacilityNotFound
            | BookingError::CourtNotFound
            | BookingError::BookingNotFound => StatusCode::NOT_FOUND,

            BookingError::ServiceUnavailable(_) => StatusCode::BAD_GATEWAY,

            BookingError::Internal(e) => {
                tracing::error!("internal error: {e:#}");
                let body = serde_json::json!({ "error": "internal server error" });
                return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response();
            }
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
