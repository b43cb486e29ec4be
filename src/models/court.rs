use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::services::timeutil::TimeInterval;

/// Per-weekday availability override on top of the facility's operating
/// hours. A court can be taken out of rotation on specific weekdays without
/// touching the facility schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayAvailability {
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DayAvailability {
    fn default() -> Self {
        Self { is_available: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeeklyAvailability {
    pub monday: DayAvailability,
    pub tuesday: DayAvailability,
    pub wednesday: DayAvailability,
    pub thursday: DayAvailability,
    pub friday: DayAvailability,
    pub saturday: DayAvailability,
    pub sunday: DayAvailability,
}

impl WeeklyAvailability {
    pub fn for_weekday(&self, weekday: Weekday) -> &DayAvailability {
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

/// A scheduled maintenance window that subtracts availability on one
/// calendar date regardless of operating hours. Blocks are single-day; a
/// block crossing midnight must be entered as two blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceBlock {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub window: TimeInterval,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct Court {
    pub id: String,
    pub facility_id: String,
    pub name: String,
    pub sport: String,
    /// Hourly rate in the currency's minor unit (paise for INR).
    pub hourly_rate_minor: i64,
    pub currency: String,
    pub is_active: bool,
    pub availability: WeeklyAvailability,
    pub maintenance: Vec<MaintenanceBlock>,
    pub total_bookings: i64,
}

impl Court {
    pub fn from_parts(
        id: String,
        facility_id: String,
        name: String,
        sport: String,
        hourly_rate_minor: i64,
        currency: String,
        is_active: bool,
        availability_json: &str,
        maintenance_json: &str,
        total_bookings: i64,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            hourly_rate_minor >= 0,
            "hourly rate cannot be negative, got {hourly_rate_minor}"
        );
        let availability: WeeklyAvailability = serde_json::from_str(availability_json)?;
        let maintenance: Vec<MaintenanceBlock> = serde_json::from_str(maintenance_json)?;
        Ok(Self {
            id,
            facility_id,
            name,
            sport,
            hourly_rate_minor,
            currency,
            is_active,
            availability,
            maintenance,
            total_bookings,
        })
    }

    /// Maintenance blocks scheduled for the given calendar date.
    pub fn maintenance_on(&self, date: NaiveDate) -> impl Iterator<Item = &MaintenanceBlock> {
        self.maintenance.iter().filter(move |block| block.date == date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn court_with(availability: &str, maintenance: &str) -> Court {
        Court::from_parts(
            "c1".into(),
            "f1".into(),
            "Court 1".into(),
            "Badminton".into(),
            50_000,
            "INR".into(),
            true,
            availability,
            maintenance,
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_default_availability_all_days() {
        let court = court_with("{}", "[]");
        assert!(court.availability.for_weekday(Weekday::Mon).is_available);
        assert!(court.availability.for_weekday(Weekday::Sun).is_available);
    }

    #[test]
    fn test_weekday_override() {
        let court = court_with(r#"{"tuesday": {"is_available": false}}"#, "[]");
        assert!(!court.availability.for_weekday(Weekday::Tue).is_available);
        assert!(court.availability.for_weekday(Weekday::Wed).is_available);
    }

    #[test]
    fn test_maintenance_parsing_and_date_filter() {
        let maintenance = r#"[
            {"date": "2026-09-01", "start_time": "10:00", "end_time": "12:00", "description": "net repair"},
            {"date": "2026-09-02", "start_time": "06:00", "end_time": "08:00", "description": "resurfacing"}
        ]"#;
        let court = court_with("{}", maintenance);
        let date = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let blocks: Vec<_> = court.maintenance_on(date).collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].description, "net repair");
    }

    #[test]
    fn test_rejects_negative_rate() {
        let result = Court::from_parts(
            "c1".into(),
            "f1".into(),
            "Court 1".into(),
            "Tennis".into(),
            -1,
            "INR".into(),
            true,
            "{}",
            "[]",
            0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_inverted_maintenance_window() {
        let maintenance = r#"[
            {"date": "2026-09-01", "start_time": "12:00", "end_time": "10:00", "description": "bad"}
        ]"#;
        let result: Result<Vec<MaintenanceBlock>, _> = serde_json::from_str(maintenance);
        assert!(result.is_err());
    }
}
