use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::services::timeutil::{self, hhmm, TimeInterval};

/// Open/close window for one weekday. Defaults mirror a typical facility
/// day: open 06:00-22:00.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatingWindow {
    #[serde(default = "default_true")]
    pub is_open: bool,
    #[serde(with = "hhmm", default = "default_open")]
    pub open_time: u16,
    #[serde(with = "hhmm", default = "default_close")]
    pub close_time: u16,
}

fn default_true() -> bool {
    true
}

fn default_open() -> u16 {
    6 * 60
}

fn default_close() -> u16 {
    22 * 60
}

impl Default for OperatingWindow {
    fn default() -> Self {
        Self {
            is_open: true,
            open_time: default_open(),
            close_time: default_close(),
        }
    }
}

impl OperatingWindow {
    /// The day's open window, or `None` when the day is closed (including a
    /// misconfigured window where close does not follow open).
    pub fn window(&self) -> Option<TimeInterval> {
        if !self.is_open {
            return None;
        }
        TimeInterval::new(self.open_time, self.close_time).ok()
    }
}

/// Weekly operating schedule, one window per weekday.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OperatingHours {
    pub monday: OperatingWindow,
    pub tuesday: OperatingWindow,
    pub wednesday: OperatingWindow,
    pub thursday: OperatingWindow,
    pub friday: OperatingWindow,
    pub saturday: OperatingWindow,
    pub sunday: OperatingWindow,
}

impl OperatingHours {
    pub fn for_weekday(&self, weekday: Weekday) -> &OperatingWindow {
        match weekday {
            Weekday::Mon => &self.monday,
            Weekday::Tue => &self.tuesday,
            Weekday::Wed => &self.wednesday,
            Weekday::Thu => &self.thursday,
            Weekday::Fri => &self.friday,
            Weekday::Sat => &self.saturday,
            Weekday::Sun => &self.sunday,
        }
    }
}

/// Facility-wide pricing config: the peak window and its multiplier apply to
/// every court in the facility; the hourly rate itself lives on the court.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeakPricing {
    #[serde(with = "hhmm", default = "default_peak_start")]
    pub peak_start: u16,
    #[serde(with = "hhmm", default = "default_peak_end")]
    pub peak_end: u16,
    #[serde(default = "default_multiplier")]
    pub peak_multiplier: f64,
}

fn default_peak_start() -> u16 {
    18 * 60
}

fn default_peak_end() -> u16 {
    21 * 60
}

fn default_multiplier() -> f64 {
    1.5
}

impl Default for PeakPricing {
    fn default() -> Self {
        Self {
            peak_start: default_peak_start(),
            peak_end: default_peak_end(),
            peak_multiplier: default_multiplier(),
        }
    }
}

impl PeakPricing {
    pub fn peak_window(&self) -> Option<TimeInterval> {
        TimeInterval::new(self.peak_start, self.peak_end).ok()
    }
}

#[derive(Debug, Clone)]
pub struct Facility {
    pub id: String,
    pub name: String,
    pub operating_hours: OperatingHours,
    pub pricing: PeakPricing,
    pub total_bookings: i64,
}

impl Facility {
    /// Parse the JSON-backed schedule columns, validating times and the
    /// multiplier floor (a multiplier below 1 would make peak cheaper than
    /// off-peak).
    pub fn from_parts(
        id: String,
        name: String,
        operating_hours_json: &str,
        pricing_json: &str,
        total_bookings: i64,
    ) -> anyhow::Result<Self> {
        let operating_hours: OperatingHours = serde_json::from_str(operating_hours_json)?;
        let pricing: PeakPricing = serde_json::from_str(pricing_json)?;
        anyhow::ensure!(
            pricing.peak_multiplier >= 1.0,
            "peak multiplier must be at least 1, got {}",
            pricing.peak_multiplier
        );
        anyhow::ensure!(
            pricing.peak_start < pricing.peak_end,
            "peak window {} must end after it starts {}",
            timeutil::format_time(pricing.peak_end),
            timeutil::format_time(pricing.peak_start),
        );
        Ok(Self {
            id,
            name,
            operating_hours,
            pricing,
            total_bookings,
        })
    }
}
