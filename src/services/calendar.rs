//! Operating-calendar checks: weekday open/closed flags, the day's open
//! window, and maintenance blocks. Containment of a requested interval in
//! the open window is the availability resolver's job; this module only
//! answers what the schedule says.

use chrono::{Datelike, NaiveDate};

use crate::models::{Court, Facility, MaintenanceBlock};
use crate::services::timeutil::TimeInterval;

/// Whether the court is theoretically open on this date: the facility's
/// weekday window is open and the court has not opted out of the weekday.
pub fn is_open_on(facility: &Facility, court: &Court, date: NaiveDate) -> bool {
    let weekday = date.weekday();
    facility.operating_hours.for_weekday(weekday).is_open
        && court.availability.for_weekday(weekday).is_available
}

/// The facility's open window for the date, or `None` when closed.
pub fn open_window(facility: &Facility, date: NaiveDate) -> Option<TimeInterval> {
    facility.operating_hours.for_weekday(date.weekday()).window()
}

/// The first maintenance block on this exact date that overlaps the
/// requested interval. Blocks are single-day; one crossing midnight must be
/// entered as two.
pub fn maintenance_conflict<'a>(
    court: &'a Court,
    date: NaiveDate,
    interval: &TimeInterval,
) -> Option<&'a MaintenanceBlock> {
    court
        .maintenance_on(date)
        .find(|block| block.window.overlaps(interval))
}
