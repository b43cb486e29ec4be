//! Availability resolution for one court and date: enumerate bookable
//! slots, or validate a specific requested interval against the operating
//! calendar, maintenance schedule and existing bookings.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Booking, BookingStatus, Court, Facility};
use crate::services::timeutil::TimeInterval;
use crate::services::{calendar, pricing};

const SLOT_STEP_MINUTES: u16 = 60;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AvailabilityError {
    #[error("the facility is closed on the requested date")]
    FacilityClosed,

    #[error("the requested time is outside operating hours ({open}-{close})")]
    OutsideOperatingHours { open: String, close: String },

    #[error("the court is under maintenance at the requested time: {description}")]
    MaintenanceConflict { description: String },

    #[error("this slot overlaps an existing booking")]
    BookingConflict { booking_id: String },
}

/// A candidate bookable interval with its computed price.
#[derive(Debug, Clone, Serialize)]
pub struct Slot {
    #[serde(flatten)]
    pub window: TimeInterval,
    pub duration_hours: f64,
    pub price_minor: i64,
    pub is_peak: bool,
}

fn blocks_slot(booking: &Booking, window: &TimeInterval) -> bool {
    matches!(
        booking.status,
        BookingStatus::Pending | BookingStatus::Confirmed
    ) && booking.time_slot.window.overlaps(window)
}

/// Lazily enumerate open, conflict-free slots at one-hour steps from the
/// facility's open time to its close time on the given date.
pub fn available_slots<'a>(
    court: &'a Court,
    facility: &'a Facility,
    date: NaiveDate,
    existing: &'a [Booking],
) -> impl Iterator<Item = Slot> + 'a {
    let open = calendar::is_open_on(facility, court, date)
        .then(|| calendar::open_window(facility, date))
        .flatten();

    open.into_iter().flat_map(move |open| {
        (open.start()..open.end())
            .step_by(usize::from(SLOT_STEP_MINUTES))
            .filter_map(move |start| {
                let end = start.checked_add(SLOT_STEP_MINUTES)?;
                if end > open.end() {
                    return None;
                }
                let window = TimeInterval::new(start, end).ok()?;
                if calendar::maintenance_conflict(court, date, &window).is_some() {
                    return None;
                }
                if existing.iter().any(|b| blocks_slot(b, &window)) {
                    return None;
                }
                let quote = pricing::quote(court, facility, &window);
                Some(Slot {
                    duration_hours: window.duration_hours(),
                    window,
                    price_minor: quote.total_minor,
                    is_peak: quote.is_peak(),
                })
            })
    })
}

/// Re-validate a specific requested interval at booking-creation time.
/// Degenerate intervals never reach this function; `TimeInterval` already
/// rejects them.
pub fn validate_requested_slot(
    court: &Court,
    facility: &Facility,
    date: NaiveDate,
    interval: &TimeInterval,
    existing: &[Booking],
) -> Result<(), AvailabilityError> {
    if !calendar::is_open_on(facility, court, date) {
        return Err(AvailabilityError::FacilityClosed);
    }
    let open = calendar::open_window(facility, date).ok_or(AvailabilityError::FacilityClosed)?;
    if !interval.within(&open) {
        return Err(AvailabilityError::OutsideOperatingHours {
            open: open.start_string(),
            close: open.end_string(),
        });
    }
    if let Some(block) = calendar::maintenance_conflict(court, date, interval) {
        return Err(AvailabilityError::MaintenanceConflict {
            description: block.description.clone(),
        });
    }
    if let Some(conflict) = existing.iter().find(|b| blocks_slot(b, interval)) {
        return Err(AvailabilityError::BookingConflict {
            booking_id: conflict.id.clone(),
        });
    }
    Ok(())
}
