//! Booking lifecycle: creation against the availability resolver with the
//! price frozen at that moment, payment confirmation, cancellation with
//! tiered refunds, the completion sweep and no-show marking. All state
//! transitions are persisted through the version-guarded update so
//! concurrent writers cannot double-apply them.

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries::{self, InsertOutcome};
use crate::models::{
    Booking, BookingPricing, BookingStatus, Cancellation, Court, Facility, PaymentInfo,
    PaymentMethod, PaymentStatus, TimeSlot,
};
use crate::services::availability::{self, AvailabilityError, Slot};
use crate::services::notify::{NotificationProvider, TemplateKind};
use crate::services::payments::{PaymentProof, PaymentProvider};
use crate::services::timeutil::{TimeError, TimeInterval};
use crate::services::pricing;

const MIN_DURATION_MINUTES: u16 = 30;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error(transparent)]
    Time(#[from] TimeError),

    #[error("booking date cannot be in the past")]
    PastDate,

    #[error("minimum booking duration is 30 minutes")]
    DurationTooShort,

    #[error("invalid or missing date: {0}")]
    InvalidDate(String),

    #[error("unsupported payment method: {0}")]
    UnsupportedPaymentMethod(String),

    #[error(transparent)]
    Availability(#[from] AvailabilityError),

    #[error("facility not found")]
    FacilityNotFound,

    #[error("court not found")]
    CourtNotFound,

    #[error("court does not belong to the specified facility")]
    CourtFacilityMismatch,

    #[error("court is not active")]
    CourtInactive,

    #[error("booking not found")]
    BookingNotFound,

    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("bookings can only be cancelled more than 2 hours before the start time")]
    CancellationWindowClosed,

    #[error("booking was modified concurrently, please retry")]
    ConcurrentModification,

    #[error("payment failed: {0}")]
    PaymentFailed(String),

    #[error("refund failed: {0}")]
    RefundFailed(String),

    #[error("external service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct CreateBookingRequest {
    pub user_id: String,
    pub facility_id: String,
    pub court_id: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub payment_method: PaymentMethod,
}

type Db = Arc<Mutex<Connection>>;

fn load_court_and_facility(
    conn: &Connection,
    facility_id: &str,
    court_id: &str,
) -> Result<(Court, Facility), BookingError> {
    let court = queries::get_court(conn, court_id)?.ok_or(BookingError::CourtNotFound)?;
    if court.facility_id != facility_id {
        return Err(BookingError::CourtFacilityMismatch);
    }
    if !court.is_active {
        return Err(BookingError::CourtInactive);
    }
    let facility =
        queries::get_facility(conn, facility_id)?.ok_or(BookingError::FacilityNotFound)?;
    Ok((court, facility))
}

/// Enumerate bookable slots for a court and date.
pub fn list_available_slots(
    db: &Db,
    court_id: &str,
    date: NaiveDate,
) -> Result<Vec<Slot>, BookingError> {
    let conn = db.lock().unwrap();
    let court = queries::get_court(&conn, court_id)?.ok_or(BookingError::CourtNotFound)?;
    let facility = queries::get_facility(&conn, &court.facility_id)?
        .ok_or(BookingError::FacilityNotFound)?;
    let existing = queries::bookings_for_court_date(
        &conn,
        court_id,
        date,
        &[BookingStatus::Pending, BookingStatus::Confirmed],
    )?;
    Ok(availability::available_slots(&court, &facility, date, &existing).collect())
}

/// Create a booking: validate the slot, freeze the price, open a gateway
/// order for gateway methods, then insert behind the conflict guard. A
/// gateway failure persists nothing.
pub async fn create_booking(
    db: &Db,
    payments: &dyn PaymentProvider,
    request: CreateBookingRequest,
    now: NaiveDateTime,
) -> Result<Booking, BookingError> {
    let window = TimeInterval::from_strings(&request.start_time, &request.end_time)?;
    if window.duration_minutes() < MIN_DURATION_MINUTES {
        return Err(BookingError::DurationTooShort);
    }
    if request.date < now.date() {
        return Err(BookingError::PastDate);
    }

    // Advisory pre-check plus the frozen quote. The insert below re-checks
    // under the transaction, which is what actually upholds the invariant.
    let quote = {
        let conn = db.lock().unwrap();
        let (court, facility) =
            load_court_and_facility(&conn, &request.facility_id, &request.court_id)?;
        let existing = queries::bookings_for_court_date(
            &conn,
            &request.court_id,
            request.date,
            &[BookingStatus::Pending, BookingStatus::Confirmed],
        )?;
        availability::validate_requested_slot(&court, &facility, request.date, &window, &existing)?;
        pricing::quote(&court, &facility, &window)
    };

    let booking_id = Uuid::new_v4().to_string();
    let order_id = if request.payment_method.uses_gateway() {
        let receipt = format!("booking_{booking_id}");
        let order = payments
            .charge(quote.total_minor, &quote.currency, &receipt)
            .await
            .map_err(|e| BookingError::PaymentFailed(e.to_string()))?;
        Some(order.order_id)
    } else {
        None
    };

    let booking = Booking {
        id: booking_id,
        user_id: request.user_id,
        facility_id: request.facility_id,
        court_id: request.court_id,
        date: request.date,
        time_slot: TimeSlot::new(window),
        pricing: BookingPricing {
            base_rate_minor: quote.base_rate_minor,
            peak_multiplier_applied: quote.multiplier_applied,
            total_minor: quote.total_minor,
            currency: quote.currency,
        },
        payment: PaymentInfo::new(request.payment_method, order_id),
        status: BookingStatus::Pending,
        cancellation: None,
        version: 0,
        created_at: now,
        updated_at: now,
    };

    let mut conn = db.lock().unwrap();
    match queries::insert_booking_if_no_conflict(&mut conn, &booking)? {
        InsertOutcome::Inserted => Ok(booking),
        InsertOutcome::Conflict { booking_id } => {
            Err(AvailabilityError::BookingConflict { booking_id }.into())
        }
    }
}

/// Confirm payment on a pending booking. Gateway methods require proof; on
/// a captured payment the booking is confirmed, counters bump and the
/// confirmation notification fires. Cash and wallet confirm immediately
/// with payment still owed at the venue.
pub async fn confirm_payment(
    db: &Db,
    payments: &dyn PaymentProvider,
    notifier: &dyn NotificationProvider,
    booking_id: &str,
    proof: Option<PaymentProof>,
    now: NaiveDateTime,
) -> Result<Booking, BookingError> {
    let mut booking = {
        let conn = db.lock().unwrap();
        queries::get_booking(&conn, booking_id)?.ok_or(BookingError::BookingNotFound)?
    };

    if booking.status != BookingStatus::Pending {
        return Err(BookingError::InvalidTransition {
            from: booking.status.as_str().to_string(),
            to: BookingStatus::Confirmed.as_str().to_string(),
        });
    }

    if booking.payment.method.uses_gateway() {
        let proof = proof
            .ok_or_else(|| BookingError::PaymentFailed("missing payment proof".to_string()))?;
        let captured = payments
            .verify(&proof)
            .await
            .map_err(|e| BookingError::ServiceUnavailable(e.to_string()))?;

        if !captured {
            booking.payment.status = PaymentStatus::Failed;
            let conn = db.lock().unwrap();
            if !queries::update_booking_guarded(&conn, &booking)? {
                return Err(BookingError::ConcurrentModification);
            }
            return Err(BookingError::PaymentFailed(
                "payment not captured or signature invalid".to_string(),
            ));
        }

        booking.payment.status = PaymentStatus::Completed;
        booking.payment.transaction_id = Some(proof.payment_id);
        booking.payment.paid_minor = booking.pricing.total_minor;
        booking.payment.paid_at = Some(now);
    }

    booking.status = BookingStatus::Confirmed;

    {
        let conn = db.lock().unwrap();
        if !queries::update_booking_guarded(&conn, &booking)? {
            return Err(BookingError::ConcurrentModification);
        }
        queries::increment_total_bookings(&conn, &booking.facility_id, &booking.court_id)?;
        booking.version += 1;
    }

    send_notification(notifier, &booking, TemplateKind::BookingConfirmation).await;

    Ok(booking)
}

/// Cancel a pending or confirmed booking more than 2 hours before start.
/// Completed gateway payments are refunded per the tier schedule; completed
/// cash/wallet payments are flagged for manual reconciliation instead.
pub async fn cancel_booking(
    db: &Db,
    payments: &dyn PaymentProvider,
    notifier: &dyn NotificationProvider,
    booking_id: &str,
    cancelled_by: &str,
    reason: Option<String>,
    now: NaiveDateTime,
) -> Result<Booking, BookingError> {
    let mut booking = {
        let conn = db.lock().unwrap();
        queries::get_booking(&conn, booking_id)?.ok_or(BookingError::BookingNotFound)?
    };

    if booking.status.is_terminal() {
        return Err(BookingError::InvalidTransition {
            from: booking.status.as_str().to_string(),
            to: BookingStatus::Cancelled.as_str().to_string(),
        });
    }
    if !booking.can_cancel(now) {
        return Err(BookingError::CancellationWindowClosed);
    }

    let owed_minor = booking.refund_amount_minor(now);
    let mut refunded_minor = 0;
    let mut manual_refund_required = false;

    if booking.payment.status == PaymentStatus::Completed && owed_minor > 0 {
        if booking.payment.method.uses_gateway() {
            let transaction_id = booking
                .payment
                .transaction_id
                .clone()
                .ok_or_else(|| BookingError::RefundFailed("no transaction on record".to_string()))?;
            // The booking stays untouched if the gateway refuses; the caller
            // sees the failure rather than a cancelled-but-unrefunded record.
            payments
                .refund(&transaction_id, owed_minor)
                .await
                .map_err(|e| BookingError::RefundFailed(e.to_string()))?;
            booking.payment.status = PaymentStatus::Refunded;
            booking.payment.refund_minor = owed_minor;
            booking.payment.refunded_at = Some(now);
            refunded_minor = owed_minor;
        } else {
            manual_refund_required = true;
            refunded_minor = owed_minor;
        }
    }

    booking.status = BookingStatus::Cancelled;
    booking.cancellation = Some(Cancellation {
        cancelled_at: now,
        cancelled_by: cancelled_by.to_string(),
        reason: reason.unwrap_or_else(|| "user requested cancellation".to_string()),
        refund_minor: refunded_minor,
        manual_refund_required,
    });

    {
        let conn = db.lock().unwrap();
        if !queries::update_booking_guarded(&conn, &booking)? {
            return Err(BookingError::ConcurrentModification);
        }
        booking.version += 1;
    }

    send_notification(notifier, &booking, TemplateKind::BookingCancellation).await;

    Ok(booking)
}

/// Mark a confirmed booking as a no-show. No refund applies.
pub fn mark_no_show(db: &Db, booking_id: &str) -> Result<Booking, BookingError> {
    let conn = db.lock().unwrap();
    let mut booking =
        queries::get_booking(&conn, booking_id)?.ok_or(BookingError::BookingNotFound)?;

    if booking.status != BookingStatus::Confirmed {
        return Err(BookingError::InvalidTransition {
            from: booking.status.as_str().to_string(),
            to: BookingStatus::NoShow.as_str().to_string(),
        });
    }

    booking.status = BookingStatus::NoShow;
    if !queries::update_booking_guarded(&conn, &booking)? {
        return Err(BookingError::ConcurrentModification);
    }
    booking.version += 1;
    Ok(booking)
}

/// Sweep confirmed bookings whose end instant has passed into `completed`.
pub fn complete_finished(db: &Db, now: NaiveDateTime) -> Result<usize, BookingError> {
    let conn = db.lock().unwrap();
    Ok(queries::complete_finished_bookings(&conn, now)?)
}

pub fn get_booking(db: &Db, booking_id: &str) -> Result<Booking, BookingError> {
    let conn = db.lock().unwrap();
    queries::get_booking(&conn, booking_id)?.ok_or(BookingError::BookingNotFound)
}

async fn send_notification(
    notifier: &dyn NotificationProvider,
    booking: &Booking,
    kind: TemplateKind,
) {
    let context = serde_json::json!({
        "booking_id": booking.id,
        "facility_id": booking.facility_id,
        "court_id": booking.court_id,
        "date": booking.date.to_string(),
        "time": format!(
            "{} - {}",
            booking.time_slot.window.start_string(),
            booking.time_slot.window.end_string()
        ),
        "amount_minor": booking.pricing.total_minor,
        "currency": booking.pricing.currency,
    });

    if let Err(e) = notifier.notify(&booking.user_id, kind, &context).await {
        tracing::warn!("failed to send {} notification: {e:#}", kind.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::services::payments::OrderHandle;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct MockPayments {
        verify_result: bool,
        fail_charge: bool,
        fail_refund: bool,
        refunds: Mutex<Vec<(String, i64)>>,
    }

    impl MockPayments {
        fn new() -> Self {
            Self {
                verify_result: true,
                fail_charge: false,
                fail_refund: false,
                refunds: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl PaymentProvider for MockPayments {
        async fn charge(
            &self,
            _amount_minor: i64,
            _currency: &str,
            receipt: &str,
        ) -> anyhow::Result<OrderHandle> {
            if self.fail_charge {
                anyhow::bail!("gateway down");
            }
            Ok(OrderHandle {
                order_id: format!("order_{receipt}"),
            })
        }

        async fn verify(&self, _proof: &PaymentProof) -> anyhow::Result<bool> {
            Ok(self.verify_result)
        }

        async fn refund(&self, transaction_id: &str, amount_minor: i64) -> anyhow::Result<String> {
            if self.fail_refund {
                anyhow::bail!("refund rejected");
            }
            self.refunds
                .lock()
                .unwrap()
                .push((transaction_id.to_string(), amount_minor));
            Ok("rfnd_1".to_string())
        }
    }

    struct MockNotifier {
        notified: AtomicBool,
    }

    #[async_trait]
    impl NotificationProvider for MockNotifier {
        async fn notify(
            &self,
            _user_id: &str,
            _kind: TemplateKind,
            _context: &serde_json::Value,
        ) -> anyhow::Result<()> {
            self.notified.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn setup() -> Db {
        let conn = db::init_db(":memory:").unwrap();
        let facility = Facility::from_parts(
            "f1".into(),
            "Arena".into(),
            "{}",
            r#"{"peak_start": "18:00", "peak_end": "21:00", "peak_multiplier": 1.5}"#,
            0,
        )
        .unwrap();
        queries::insert_facility(&conn, &facility).unwrap();
        let court = Court::from_parts(
            "c1".into(),
            "f1".into(),
            "Court 1".into(),
            "Badminton".into(),
            50_000,
            "INR".into(),
            true,
            "{}",
            "[]",
            0,
        )
        .unwrap();
        queries::insert_court(&conn, &court).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn request(start: &str, end: &str, method: PaymentMethod) -> CreateBookingRequest {
        CreateBookingRequest {
            user_id: "u1".to_string(),
            facility_id: "f1".to_string(),
            court_id: "c1".to_string(),
            date: "2026-09-11".parse().unwrap(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            payment_method: method,
        }
    }

    fn notifier() -> MockNotifier {
        MockNotifier {
            notified: AtomicBool::new(false),
        }
    }

    #[tokio::test]
    async fn test_create_freezes_peak_price() {
        let db = setup();
        let payments = MockPayments::new();
        let booking = create_booking(
            &db,
            &payments,
            request("18:00", "19:00", PaymentMethod::Razorpay),
            at("2026-09-10 08:00"),
        )
        .await
        .unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.pricing.total_minor, 75_000);
        assert!((booking.pricing.peak_multiplier_applied - 1.5).abs() < f64::EPSILON);
        assert!(booking.payment.order_id.is_some());
        // Persisted too, not just returned.
        assert_eq!(
            get_booking(&db, &booking.id).unwrap().pricing.total_minor,
            75_000
        );
    }

    #[tokio::test]
    async fn test_create_rejects_overlap_and_accepts_abutting() {
        let db = setup();
        let payments = MockPayments::new();
        let now = at("2026-09-10 08:00");

        create_booking(&db, &payments, request("18:00", "19:00", PaymentMethod::Cash), now)
            .await
            .unwrap();

        let overlap =
            create_booking(&db, &payments, request("18:30", "19:30", PaymentMethod::Cash), now)
                .await;
        assert!(matches!(
            overlap.unwrap_err(),
            BookingError::Availability(AvailabilityError::BookingConflict { .. })
        ));

        let abutting =
            create_booking(&db, &payments, request("19:00", "20:00", PaymentMethod::Cash), now)
                .await;
        assert!(abutting.is_ok());
    }

    #[tokio::test]
    async fn test_create_rejects_past_date_and_short_duration() {
        let db = setup();
        let payments = MockPayments::new();
        let now = at("2026-09-12 08:00");

        let past = create_booking(
            &db,
            &payments,
            request("10:00", "11:00", PaymentMethod::Cash),
            now,
        )
        .await;
        assert!(matches!(past.unwrap_err(), BookingError::PastDate));

        let short = create_booking(
            &db,
            &payments,
            request("10:00", "10:15", PaymentMethod::Cash),
            at("2026-09-10 08:00"),
        )
        .await;
        assert!(matches!(short.unwrap_err(), BookingError::DurationTooShort));
    }

    #[tokio::test]
    async fn test_create_gateway_failure_persists_nothing() {
        let db = setup();
        let mut payments = MockPayments::new();
        payments.fail_charge = true;

        let result = create_booking(
            &db,
            &payments,
            request("10:00", "11:00", PaymentMethod::Razorpay),
            at("2026-09-10 08:00"),
        )
        .await;
        assert!(matches!(result.unwrap_err(), BookingError::PaymentFailed(_)));

        let conn = db.lock().unwrap();
        let existing = queries::bookings_for_court_date(
            &conn,
            "c1",
            "2026-09-11".parse().unwrap(),
            &[BookingStatus::Pending, BookingStatus::Confirmed],
        )
        .unwrap();
        assert!(existing.is_empty());
    }

    #[tokio::test]
    async fn test_confirm_payment_happy_path() {
        let db = setup();
        let payments = MockPayments::new();
        let notify = notifier();
        let now = at("2026-09-10 08:00");

        let booking = create_booking(
            &db,
            &payments,
            request("18:00", "19:00", PaymentMethod::Razorpay),
            now,
        )
        .await
        .unwrap();

        let proof = PaymentProof {
            order_id: booking.payment.order_id.clone().unwrap(),
            payment_id: "pay_1".to_string(),
            signature: "sig".to_string(),
        };
        let confirmed = confirm_payment(&db, &payments, &notify, &booking.id, Some(proof), now)
            .await
            .unwrap();

        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.payment.status, PaymentStatus::Completed);
        assert_eq!(confirmed.payment.paid_minor, 75_000);
        assert!(notify.notified.load(Ordering::SeqCst));

        let conn = db.lock().unwrap();
        assert_eq!(
            queries::get_facility(&conn, "f1").unwrap().unwrap().total_bookings,
            1
        );
        assert_eq!(
            queries::get_court(&conn, "c1").unwrap().unwrap().total_bookings,
            1
        );
    }

    #[tokio::test]
    async fn test_confirm_payment_bad_proof_marks_failed() {
        let db = setup();
        let mut payments = MockPayments::new();
        payments.verify_result = false;
        let notify = notifier();
        let now = at("2026-09-10 08:00");

        let booking = create_booking(
            &db,
            &payments,
            request("18:00", "19:00", PaymentMethod::Razorpay),
            now,
        )
        .await
        .unwrap();

        let proof = PaymentProof {
            order_id: booking.payment.order_id.clone().unwrap(),
            payment_id: "pay_1".to_string(),
            signature: "bad".to_string(),
        };
        let result = confirm_payment(&db, &payments, &notify, &booking.id, Some(proof), now).await;
        assert!(matches!(result.unwrap_err(), BookingError::PaymentFailed(_)));

        let reloaded = get_booking(&db, &booking.id).unwrap();
        assert_eq!(reloaded.status, BookingStatus::Pending);
        assert_eq!(reloaded.payment.status, PaymentStatus::Failed);
        assert!(!notify.notified.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_with_full_refund_through_gateway() {
        let db = setup();
        let payments = MockPayments::new();
        let notify = notifier();
        let now = at("2026-09-10 08:00");

        let booking = create_booking(
            &db,
            &payments,
            request("18:00", "19:00", PaymentMethod::Razorpay),
            now,
        )
        .await
        .unwrap();
        let proof = PaymentProof {
            order_id: booking.payment.order_id.clone().unwrap(),
            payment_id: "pay_1".to_string(),
            signature: "sig".to_string(),
        };
        confirm_payment(&db, &payments, &notify, &booking.id, Some(proof), now)
            .await
            .unwrap();

        // More than 24h before the 2026-09-11 18:00 start: 100% tier.
        let cancelled = cancel_booking(
            &db,
            &payments,
            &notify,
            &booking.id,
            "u1",
            Some("rain".to_string()),
            at("2026-09-10 12:00"),
        )
        .await
        .unwrap();

        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.payment.status, PaymentStatus::Refunded);
        let cancellation = cancelled.cancellation.unwrap();
        assert_eq!(cancellation.refund_minor, 75_000);
        assert!(!cancellation.manual_refund_required);
        assert_eq!(
            payments.refunds.lock().unwrap().as_slice(),
            &[("pay_1".to_string(), 75_000)]
        );
    }

    #[tokio::test]
    async fn test_cancel_partial_refund_tier() {
        let db = setup();
        let payments = MockPayments::new();
        let notify = notifier();
        let now = at("2026-09-10 08:00");

        let booking = create_booking(
            &db,
            &payments,
            request("18:00", "19:00", PaymentMethod::Razorpay),
            now,
        )
        .await
        .unwrap();
        let proof = PaymentProof {
            order_id: booking.payment.order_id.clone().unwrap(),
            payment_id: "pay_1".to_string(),
            signature: "sig".to_string(),
        };
        confirm_payment(&db, &payments, &notify, &booking.id, Some(proof), now)
            .await
            .unwrap();

        // 10 hours before start: 50% tier.
        let cancelled = cancel_booking(
            &db,
            &payments,
            &notify,
            &booking.id,
            "u1",
            None,
            at("2026-09-11 08:00"),
        )
        .await
        .unwrap();
        assert_eq!(cancelled.cancellation.unwrap().refund_minor, 37_500);
    }

    #[tokio::test]
    async fn test_cancel_inside_cutoff_rejected() {
        let db = setup();
        let payments = MockPayments::new();
        let notify = notifier();
        let now = at("2026-09-10 08:00");

        let booking = create_booking(
            &db,
            &payments,
            request("18:00", "19:00", PaymentMethod::Cash),
            now,
        )
        .await
        .unwrap();

        // One hour before start.
        let result = cancel_booking(
            &db,
            &payments,
            &notify,
            &booking.id,
            "u1",
            None,
            at("2026-09-11 17:00"),
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            BookingError::CancellationWindowClosed
        ));
        assert_eq!(get_booking(&db, &booking.id).unwrap().status, BookingStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_unpaid_booking_moves_no_money() {
        let db = setup();
        let payments = MockPayments::new();
        let notify = notifier();
        let now = at("2026-09-10 08:00");

        let booking = create_booking(
            &db,
            &payments,
            request("18:00", "19:00", PaymentMethod::Razorpay),
            now,
        )
        .await
        .unwrap();

        let cancelled =
            cancel_booking(&db, &payments, &notify, &booking.id, "u1", None, now)
                .await
                .unwrap();
        let cancellation = cancelled.cancellation.unwrap();
        assert_eq!(cancellation.refund_minor, 0);
        assert!(payments.refunds.lock().unwrap().is_empty());
        assert_eq!(cancelled.payment.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_cancel_completed_cash_payment_flags_manual_refund() {
        let db = setup();
        let payments = MockPayments::new();
        let notify = notifier();
        let now = at("2026-09-10 08:00");

        let booking = create_booking(
            &db,
            &payments,
            request("18:00", "19:00", PaymentMethod::Cash),
            now,
        )
        .await
        .unwrap();
        // Venue recorded the cash as paid.
        {
            let conn = db.lock().unwrap();
            let mut paid = queries::get_booking(&conn, &booking.id).unwrap().unwrap();
            paid.payment.status = PaymentStatus::Completed;
            paid.payment.paid_minor = paid.pricing.total_minor;
            assert!(queries::update_booking_guarded(&conn, &paid).unwrap());
        }

        let cancelled =
            cancel_booking(&db, &payments, &notify, &booking.id, "owner", None, now)
                .await
                .unwrap();
        let cancellation = cancelled.cancellation.unwrap();
        assert!(cancellation.manual_refund_required);
        assert_eq!(cancellation.refund_minor, 75_000);
        // No gateway call for cash.
        assert!(payments.refunds.lock().unwrap().is_empty());
        assert_eq!(cancelled.payment.status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_refund_leaves_booking_untouched() {
        let db = setup();
        let mut payments = MockPayments::new();
        let notify = notifier();
        let now = at("2026-09-10 08:00");

        let booking = create_booking(
            &db,
            &payments,
            request("18:00", "19:00", PaymentMethod::Razorpay),
            now,
        )
        .await
        .unwrap();
        let proof = PaymentProof {
            order_id: booking.payment.order_id.clone().unwrap(),
            payment_id: "pay_1".to_string(),
            signature: "sig".to_string(),
        };
        confirm_payment(&db, &payments, &notify, &booking.id, Some(proof), now)
            .await
            .unwrap();

        payments.fail_refund = true;
        let result =
            cancel_booking(&db, &payments, &notify, &booking.id, "u1", None, now).await;
        assert!(matches!(result.unwrap_err(), BookingError::RefundFailed(_)));

        let reloaded = get_booking(&db, &booking.id).unwrap();
        assert_eq!(reloaded.status, BookingStatus::Confirmed);
        assert_eq!(reloaded.payment.status, PaymentStatus::Completed);
        assert!(reloaded.cancellation.is_none());
    }

    #[tokio::test]
    async fn test_terminal_states_reject_all_transitions() {
        let db = setup();
        let payments = MockPayments::new();
        let notify = notifier();
        let now = at("2026-09-10 08:00");

        let booking = create_booking(
            &db,
            &payments,
            request("18:00", "19:00", PaymentMethod::Cash),
            now,
        )
        .await
        .unwrap();
        let cancelled = cancel_booking(&db, &payments, &notify, &booking.id, "u1", None, now)
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let confirm =
            confirm_payment(&db, &payments, &notify, &booking.id, None, now).await;
        assert!(matches!(
            confirm.unwrap_err(),
            BookingError::InvalidTransition { .. }
        ));

        let cancel_again =
            cancel_booking(&db, &payments, &notify, &booking.id, "u1", None, now).await;
        assert!(matches!(
            cancel_again.unwrap_err(),
            BookingError::InvalidTransition { .. }
        ));

        let no_show = mark_no_show(&db, &booking.id);
        assert!(matches!(
            no_show.unwrap_err(),
            BookingError::InvalidTransition { .. }
        ));

        // Nothing changed under the failed attempts.
        let reloaded = get_booking(&db, &booking.id).unwrap();
        assert_eq!(reloaded.status, BookingStatus::Cancelled);
        assert_eq!(reloaded.version, cancelled.version);
    }

    #[tokio::test]
    async fn test_no_show_from_confirmed() {
        let db = setup();
        let payments = MockPayments::new();
        let notify = notifier();
        let now = at("2026-09-10 08:00");

        let booking = create_booking(
            &db,
            &payments,
            request("18:00", "19:00", PaymentMethod::Cash),
            now,
        )
        .await
        .unwrap();
        confirm_payment(&db, &payments, &notify, &booking.id, None, now)
            .await
            .unwrap();

        let marked = mark_no_show(&db, &booking.id).unwrap();
        assert_eq!(marked.status, BookingStatus::NoShow);
        assert!(marked.cancellation.is_none());
    }

    #[tokio::test]
    async fn test_completion_sweep() {
        let db = setup();
        let payments = MockPayments::new();
        let notify = notifier();
        let now = at("2026-09-10 08:00");

        let booking = create_booking(
            &db,
            &payments,
            request("10:00", "11:00", PaymentMethod::Cash),
            now,
        )
        .await
        .unwrap();
        confirm_payment(&db, &payments, &notify, &booking.id, None, now)
            .await
            .unwrap();

        assert_eq!(complete_finished(&db, at("2026-09-11 10:30")).unwrap(), 0);
        assert_eq!(complete_finished(&db, at("2026-09-11 11:00")).unwrap(), 1);
        assert_eq!(
            get_booking(&db, &booking.id).unwrap().status,
            BookingStatus::Completed
        );
        // Sweep is idempotent.
        assert_eq!(complete_finished(&db, at("2026-09-11 12:00")).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_slots_reflect_existing_bookings() {
        let db = setup();
        let payments = MockPayments::new();
        let now = at("2026-09-10 08:00");

        create_booking(&db, &payments, request("10:00", "12:00", PaymentMethod::Cash), now)
            .await
            .unwrap();

        let slots = list_available_slots(&db, "c1", "2026-09-11".parse().unwrap()).unwrap();
        assert!(slots.iter().all(|s| s.window.start_string() != "10:00"));
        assert!(slots.iter().all(|s| s.window.start_string() != "11:00"));
        assert!(slots.iter().any(|s| s.window.start_string() == "09:00"));
    }
}
