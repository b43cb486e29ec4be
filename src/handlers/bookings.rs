use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::errors::ApiError;
use crate::models::{Booking, BookingStatus, PaymentMethod};
use crate::services::bookings::{self, BookingError, CreateBookingRequest};
use crate::services::payments::PaymentProof;
use crate::state::AppState;

// POST /bookings
#[derive(Deserialize)]
pub struct CreateBookingBody {
    pub user_id: String,
    pub facility_id: String,
    pub court_id: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub payment_method: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingBody>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let payment_method = match body.payment_method.as_deref() {
        None => PaymentMethod::Razorpay,
        Some(s) => PaymentMethod::parse(s)
            .ok_or_else(|| BookingError::UnsupportedPaymentMethod(s.to_string()))?,
    };

    let request = CreateBookingRequest {
        user_id: body.user_id,
        facility_id: body.facility_id,
        court_id: body.court_id,
        date: body.date,
        start_time: body.start_time,
        end_time: body.end_time,
        payment_method,
    };

    let booking = bookings::create_booking(
        &state.db,
        state.payments.as_ref(),
        request,
        Utc::now().naive_utc(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /bookings/available-slots/:court_id?date=YYYY-MM-DD
#[derive(Deserialize)]
pub struct SlotsQuery {
    pub date: Option<String>,
}

pub async fn get_available_slots(
    State(state): State<Arc<AppState>>,
    Path(court_id): Path<String>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let date_str = query
        .date
        .ok_or_else(|| BookingError::InvalidDate("date query parameter is required".to_string()))?;
    let date: NaiveDate = date_str
        .parse()
        .map_err(|_| BookingError::InvalidDate(date_str.clone()))?;

    let slots = bookings::list_available_slots(&state.db, &court_id, date)?;
    Ok(Json(serde_json::json!({ "available_slots": slots })))
}

// GET /bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    let booking = bookings::get_booking(&state.db, &id)?;
    Ok(Json(booking))
}

// PUT /bookings/:id/status
#[derive(Deserialize)]
pub struct UpdateStatusBody {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<Booking>, ApiError> {
    let current = bookings::get_booking(&state.db, &id)?;
    let target = BookingStatus::parse(&body.status).ok_or_else(|| {
        BookingError::InvalidTransition {
            from: current.status.as_str().to_string(),
            to: body.status.clone(),
        }
    })?;
    let now = Utc::now().naive_utc();

    let booking = match target {
        BookingStatus::Cancelled => {
            let cancelled_by = body.user_id.unwrap_or_else(|| "user".to_string());
            bookings::cancel_booking(
                &state.db,
                state.payments.as_ref(),
                state.notifier.as_ref(),
                &id,
                &cancelled_by,
                body.reason,
                now,
            )
            .await?
        }
        BookingStatus::NoShow => bookings::mark_no_show(&state.db, &id)?,
        // Confirmation goes through payment; completion through the sweep.
        // Neither is settable directly.
        other => {
            return Err(BookingError::InvalidTransition {
                from: current.status.as_str().to_string(),
                to: other.as_str().to_string(),
            }
            .into());
        }
    };

    Ok(Json(booking))
}

// POST /bookings/:id/confirm-payment
#[derive(Deserialize)]
pub struct ConfirmPaymentBody {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ConfirmPaymentBody>,
) -> Result<Json<Booking>, ApiError> {
    let proof = match (body.order_id, body.payment_id, body.signature) {
        (Some(order_id), Some(payment_id), Some(signature)) => Some(PaymentProof {
            order_id,
            payment_id,
            signature,
        }),
        _ => None,
    };

    let booking = bookings::confirm_payment(
        &state.db,
        state.payments.as_ref(),
        state.notifier.as_ref(),
        &id,
        proof,
        Utc::now().naive_utc(),
    )
    .await?;

    Ok(Json(booking))
}
