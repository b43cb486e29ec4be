//! Peak/off-peak pricing. Pure: a quote is a function of the court's rate,
//! the facility's peak config and the interval, so the same inputs always
//! produce the same total.

use crate::models::{Court, Facility};
use crate::services::timeutil::TimeInterval;

/// A priced interval. `total_minor` is in the currency's minor unit,
/// rounded once after summing the peak and off-peak portions.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub base_rate_minor: i64,
    pub multiplier_applied: f64,
    pub total_minor: i64,
    pub peak_minutes: u16,
    pub currency: String,
}

impl Quote {
    pub fn is_peak(&self) -> bool {
        self.peak_minutes > 0
    }
}

/// Price an interval against the court's hourly rate and the facility's
/// peak window. An interval straddling the peak boundary is split there and
/// each portion priced at its own rate, pro-rated by the minute.
pub fn quote(court: &Court, facility: &Facility, interval: &TimeInterval) -> Quote {
    let peak_minutes = facility
        .pricing
        .peak_window()
        .map(|peak| interval.minutes_within(&peak))
        .unwrap_or(0);
    let off_minutes = interval.duration_minutes() - peak_minutes;

    let rate = court.hourly_rate_minor as f64;
    let multiplier = facility.pricing.peak_multiplier;
    let raw = rate * f64::from(off_minutes) / 60.0
        + rate * multiplier * f64::from(peak_minutes) / 60.0;

    Quote {
        base_rate_minor: court.hourly_rate_minor,
        multiplier_applied: if peak_minutes > 0 { multiplier } else { 1.0 },
        total_minor: raw.round() as i64,
        peak_minutes,
        currency: court.currency.clone(),
    }
}
