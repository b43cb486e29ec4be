use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, TransactionBehavior};

use crate::models::{
    Booking, BookingPricing, BookingStatus, Cancellation, Court, Facility, PaymentInfo,
    PaymentMethod, PaymentStatus, TimeSlot,
};
use crate::services::timeutil::TimeInterval;

const DATE_FMT: &str = "%Y-%m-%d";
const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ── Facilities ──

pub fn insert_facility(conn: &Connection, facility: &Facility) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO facilities (id, name, operating_hours, pricing, total_bookings)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            facility.id,
            facility.name,
            serde_json::to_string(&facility.operating_hours)?,
            serde_json::to_string(&facility.pricing)?,
            facility.total_bookings,
        ],
    )?;
    Ok(())
}

pub fn get_facility(conn: &Connection, id: &str) -> anyhow::Result<Option<Facility>> {
    let result = conn.query_row(
        "SELECT id, name, operating_hours, pricing, total_bookings
         FROM facilities WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        },
    );

    match result {
        Ok((id, name, hours_json, pricing_json, total_bookings)) => Ok(Some(
            Facility::from_parts(id, name, &hours_json, &pricing_json, total_bookings)?,
        )),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// ── Courts ──

pub fn insert_court(conn: &Connection, court: &Court) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO courts (id, facility_id, name, sport, hourly_rate_minor, currency,
                             is_active, availability, maintenance, total_bookings)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            court.id,
            court.facility_id,
            court.name,
            court.sport,
            court.hourly_rate_minor,
            court.currency,
            court.is_active as i32,
            serde_json::to_string(&court.availability)?,
            serde_json::to_string(&court.maintenance)?,
            court.total_bookings,
        ],
    )?;
    Ok(())
}

pub fn get_court(conn: &Connection, id: &str) -> anyhow::Result<Option<Court>> {
    let result = conn.query_row(
        "SELECT id, facility_id, name, sport, hourly_rate_minor, currency, is_active,
                availability, maintenance, total_bookings
         FROM courts WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, i32>(6)? != 0,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
                row.get::<_, i64>(9)?,
            ))
        },
    );

    match result {
        Ok((
            id,
            facility_id,
            name,
            sport,
            hourly_rate_minor,
            currency,
            is_active,
            availability_json,
            maintenance_json,
            total_bookings,
        )) => Ok(Some(Court::from_parts(
            id,
            facility_id,
            name,
            sport,
            hourly_rate_minor,
            currency,
            is_active,
            &availability_json,
            &maintenance_json,
            total_bookings,
        )?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Bump the denormalized booking counters kept on the facility and court.
pub fn increment_total_bookings(
    conn: &Connection,
    facility_id: &str,
    court_id: &str,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE facilities SET total_bookings = total_bookings + 1 WHERE id = ?1",
        params![facility_id],
    )?;
    conn.execute(
        "UPDATE courts SET total_bookings = total_bookings + 1 WHERE id = ?1",
        params![court_id],
    )?;
    Ok(())
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, user_id, facility_id, court_id, date, start_time, end_time,
    base_rate_minor, peak_multiplier, total_minor, currency,
    pay_method, pay_status, order_id, transaction_id, paid_minor, paid_at,
    refund_minor, refunded_at,
    status, cancelled_at, cancelled_by, cancel_reason, cancel_refund_minor, manual_refund,
    version, created_at, updated_at";

/// Outcome of the conflict-guarded insert.
#[derive(Debug)]
pub enum InsertOutcome {
    Inserted,
    Conflict { booking_id: String },
}

/// Insert a booking unless a pending/confirmed booking for the same court
/// and date overlaps its slot. The re-check and the insert run inside one
/// IMMEDIATE transaction, so two concurrent requests for overlapping slots
/// cannot both pass the check before either commits.
pub fn insert_booking_if_no_conflict(
    conn: &mut Connection,
    booking: &Booking,
) -> anyhow::Result<InsertOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let date = booking.date.format(DATE_FMT).to_string();
    let start = booking.time_slot.window.start_string();
    let end = booking.time_slot.window.end_string();

    // HH:MM strings are fixed-width, so lexicographic comparison is minute
    // comparison; the predicate is the same half-open overlap as
    // TimeInterval::overlaps.
    let conflict: Option<String> = tx
        .query_row(
            "SELECT id FROM bookings
             WHERE court_id = ?1 AND date = ?2
               AND status IN ('pending', 'confirmed')
               AND start_time < ?3 AND end_time > ?4
             LIMIT 1",
            params![booking.court_id, date, end, start],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    if let Some(booking_id) = conflict {
        tx.rollback()?;
        return Ok(InsertOutcome::Conflict { booking_id });
    }

    tx.execute(
        &format!("INSERT INTO bookings ({BOOKING_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28)"),
        params![
            booking.id,
            booking.user_id,
            booking.facility_id,
            booking.court_id,
            date,
            start,
            end,
            booking.pricing.base_rate_minor,
            booking.pricing.peak_multiplier_applied,
            booking.pricing.total_minor,
            booking.pricing.currency,
            booking.payment.method.as_str(),
            booking.payment.status.as_str(),
            booking.payment.order_id,
            booking.payment.transaction_id,
            booking.payment.paid_minor,
            booking.payment.paid_at.map(|t| t.format(TIMESTAMP_FMT).to_string()),
            booking.payment.refund_minor,
            booking.payment.refunded_at.map(|t| t.format(TIMESTAMP_FMT).to_string()),
            booking.status.as_str(),
            booking.cancellation.as_ref().map(|c| c.cancelled_at.format(TIMESTAMP_FMT).to_string()),
            booking.cancellation.as_ref().map(|c| c.cancelled_by.clone()),
            booking.cancellation.as_ref().map(|c| c.reason.clone()),
            booking.cancellation.as_ref().map(|c| c.refund_minor).unwrap_or(0),
            booking.cancellation.as_ref().map(|c| c.manual_refund_required as i32).unwrap_or(0),
            booking.version,
            booking.created_at.format(TIMESTAMP_FMT).to_string(),
            booking.updated_at.format(TIMESTAMP_FMT).to_string(),
        ],
    )?;

    tx.commit()?;
    Ok(InsertOutcome::Inserted)
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Bookings for one court and calendar date, filtered to the given
/// statuses, ordered by start time.
pub fn bookings_for_court_date(
    conn: &Connection,
    court_id: &str,
    date: NaiveDate,
    statuses: &[BookingStatus],
) -> anyhow::Result<Vec<Booking>> {
    let placeholders = statuses
        .iter()
        .enumerate()
        .map(|(i, _)| format!("?{}", i + 3))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE court_id = ?1 AND date = ?2 AND status IN ({placeholders})
         ORDER BY start_time ASC"
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![
        Box::new(court_id.to_string()),
        Box::new(date.format(DATE_FMT).to_string()),
    ];
    for status in statuses {
        params_vec.push(Box::new(status.as_str().to_string()));
    }
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Persist a mutated booking guarded by its optimistic version. Returns
/// false (and writes nothing) when another writer got there first.
pub fn update_booking_guarded(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let now = Utc::now().naive_utc().format(TIMESTAMP_FMT).to_string();
    let count = conn.execute(
        "UPDATE bookings SET
            pay_status = ?1, order_id = ?2, transaction_id = ?3, paid_minor = ?4,
            paid_at = ?5, refund_minor = ?6, refunded_at = ?7,
            status = ?8, cancelled_at = ?9, cancelled_by = ?10, cancel_reason = ?11,
            cancel_refund_minor = ?12, manual_refund = ?13,
            version = version + 1, updated_at = ?14
         WHERE id = ?15 AND version = ?16",
        params![
            booking.payment.status.as_str(),
            booking.payment.order_id,
            booking.payment.transaction_id,
            booking.payment.paid_minor,
            booking.payment.paid_at.map(|t| t.format(TIMESTAMP_FMT).to_string()),
            booking.payment.refund_minor,
            booking.payment.refunded_at.map(|t| t.format(TIMESTAMP_FMT).to_string()),
            booking.status.as_str(),
            booking.cancellation.as_ref().map(|c| c.cancelled_at.format(TIMESTAMP_FMT).to_string()),
            booking.cancellation.as_ref().map(|c| c.cancelled_by.clone()),
            booking.cancellation.as_ref().map(|c| c.reason.clone()),
            booking.cancellation.as_ref().map(|c| c.refund_minor).unwrap_or(0),
            booking.cancellation.as_ref().map(|c| c.manual_refund_required as i32).unwrap_or(0),
            now,
            booking.id,
            booking.version,
        ],
    )?;
    Ok(count > 0)
}

/// Flip confirmed bookings whose end instant has passed to completed.
/// Returns the number of bookings swept.
pub fn complete_finished_bookings(conn: &Connection, now: NaiveDateTime) -> anyhow::Result<usize> {
    let cutoff = now.format("%Y-%m-%d %H:%M").to_string();
    let stamp = now.format(TIMESTAMP_FMT).to_string();
    // date || ' ' || end_time compares as "YYYY-MM-DD HH:MM".
    let count = conn.execute(
        "UPDATE bookings
         SET status = 'completed', version = version + 1, updated_at = ?1
         WHERE status = 'confirmed' AND (date || ' ' || end_time) <= ?2",
        params![stamp, cutoff],
    )?;
    Ok(count)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let facility_id: String = row.get(2)?;
    let court_id: String = row.get(3)?;
    let date_str: String = row.get(4)?;
    let start_time: String = row.get(5)?;
    let end_time: String = row.get(6)?;
    let base_rate_minor: i64 = row.get(7)?;
    let peak_multiplier: f64 = row.get(8)?;
    let total_minor: i64 = row.get(9)?;
    let currency: String = row.get(10)?;
    let pay_method: String = row.get(11)?;
    let pay_status: String = row.get(12)?;
    let order_id: Option<String> = row.get(13)?;
    let transaction_id: Option<String> = row.get(14)?;
    let paid_minor: i64 = row.get(15)?;
    let paid_at: Option<String> = row.get(16)?;
    let refund_minor: i64 = row.get(17)?;
    let refunded_at: Option<String> = row.get(18)?;
    let status_str: String = row.get(19)?;
    let cancelled_at: Option<String> = row.get(20)?;
    let cancelled_by: Option<String> = row.get(21)?;
    let cancel_reason: Option<String> = row.get(22)?;
    let cancel_refund_minor: i64 = row.get(23)?;
    let manual_refund: bool = row.get::<_, i32>(24)? != 0;
    let version: i64 = row.get(25)?;
    let created_at_str: String = row.get(26)?;
    let updated_at_str: String = row.get(27)?;

    let window = TimeInterval::from_strings(&start_time, &end_time)?;
    let date = NaiveDate::parse_from_str(&date_str, DATE_FMT)?;
    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking status: {status_str}"))?;
    let method = PaymentMethod::parse(&pay_method)
        .ok_or_else(|| anyhow::anyhow!("unknown payment method: {pay_method}"))?;
    let payment_status = PaymentStatus::parse(&pay_status)
        .ok_or_else(|| anyhow::anyhow!("unknown payment status: {pay_status}"))?;

    let cancellation = match cancelled_at {
        Some(at) => Some(Cancellation {
            cancelled_at: NaiveDateTime::parse_from_str(&at, TIMESTAMP_FMT)?,
            cancelled_by: cancelled_by.unwrap_or_default(),
            reason: cancel_reason.unwrap_or_default(),
            refund_minor: cancel_refund_minor,
            manual_refund_required: manual_refund,
        }),
        None => None,
    };

    Ok(Booking {
        id,
        user_id,
        facility_id,
        court_id,
        date,
        time_slot: TimeSlot::new(window),
        pricing: BookingPricing {
            base_rate_minor,
            peak_multiplier_applied: peak_multiplier,
            total_minor,
            currency,
        },
        payment: PaymentInfo {
            method,
            status: payment_status,
            order_id,
            transaction_id,
            paid_minor,
            paid_at: parse_optional_timestamp(paid_at)?,
            refund_minor,
            refunded_at: parse_optional_timestamp(refunded_at)?,
        },
        status,
        cancellation,
        version,
        created_at: NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FMT)?,
        updated_at: NaiveDateTime::parse_from_str(&updated_at_str, TIMESTAMP_FMT)?,
    })
}

fn parse_optional_timestamp(value: Option<String>) -> anyhow::Result<Option<NaiveDateTime>> {
    value
        .map(|s| NaiveDateTime::parse_from_str(&s, TIMESTAMP_FMT).map_err(Into::into))
        .transpose()
}
