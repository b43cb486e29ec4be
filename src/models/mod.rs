pub mod booking;
pub mod court;
pub mod facility;

pub use booking::{
    Booking, BookingPricing, BookingStatus, Cancellation, PaymentInfo, PaymentMethod,
    PaymentStatus, TimeSlot,
};
pub use court::{Court, DayAvailability, MaintenanceBlock, WeeklyAvailability};
pub use facility::{Facility, OperatingHours, OperatingWindow, PeakPricing};
