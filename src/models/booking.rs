use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::services::timeutil::TimeInterval;

/// Hours before the start instant after which cancellation is no longer
/// permitted.
pub const CANCELLATION_CUTOFF_HOURS: i64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSlot {
    #[serde(flatten)]
    pub window: TimeInterval,
    pub duration_hours: f64,
}

impl TimeSlot {
    pub fn new(window: TimeInterval) -> Self {
        Self {
            duration_hours: window.duration_hours(),
            window,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
            BookingStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            "no_show" => Some(BookingStatus::NoShow),
            _ => None,
        }
    }

    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Cancelled | BookingStatus::Completed | BookingStatus::NoShow
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Razorpay,
    Cash,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Razorpay => "razorpay",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Wallet => "wallet",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "razorpay" => Some(PaymentMethod::Razorpay),
            "cash" => Some(PaymentMethod::Cash),
            "wallet" => Some(PaymentMethod::Wallet),
            _ => None,
        }
    }

    /// Whether payment for this method moves through the gateway. Cash and
    /// wallet settle outside it, so their refunds are manual reconciliation.
    pub fn uses_gateway(&self) -> bool {
        matches!(self, PaymentMethod::Razorpay)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            "partially_refunded" => Some(PaymentStatus::PartiallyRefunded),
            _ => None,
        }
    }
}

/// Pricing frozen at creation time. Later rate changes on the court never
/// touch an existing booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingPricing {
    pub base_rate_minor: i64,
    pub peak_multiplier_applied: f64,
    pub total_minor: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub order_id: Option<String>,
    pub transaction_id: Option<String>,
    pub paid_minor: i64,
    pub paid_at: Option<NaiveDateTime>,
    pub refund_minor: i64,
    pub refunded_at: Option<NaiveDateTime>,
}

impl PaymentInfo {
    pub fn new(method: PaymentMethod, order_id: Option<String>) -> Self {
        Self {
            method,
            status: PaymentStatus::Pending,
            order_id,
            transaction_id: None,
            paid_minor: 0,
            paid_at: None,
            refund_minor: 0,
            refunded_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cancellation {
    pub cancelled_at: NaiveDateTime,
    pub cancelled_by: String,
    pub reason: String,
    pub refund_minor: i64,
    /// Set when a completed cash/wallet payment is owed a refund that no
    /// gateway can issue.
    pub manual_refund_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub facility_id: String,
    pub court_id: String,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub pricing: BookingPricing,
    pub payment: PaymentInfo,
    pub status: BookingStatus,
    pub cancellation: Option<Cancellation>,
    /// Optimistic concurrency token; bumped on every persisted mutation.
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn start_instant(&self) -> NaiveDateTime {
        self.date.and_time(minute_offset(self.time_slot.window.start()))
    }

    pub fn end_instant(&self) -> NaiveDateTime {
        self.date.and_time(minute_offset(self.time_slot.window.end()))
    }

    /// Cancellable while non-terminal and strictly more than the cutoff
    /// ahead of the start instant.
    pub fn can_cancel(&self, now: NaiveDateTime) -> bool {
        if !matches!(self.status, BookingStatus::Pending | BookingStatus::Confirmed) {
            return false;
        }
        now < self.start_instant() - Duration::hours(CANCELLATION_CUTOFF_HOURS)
    }

    /// Tiered refund of the frozen total, rounded half-up to the minor unit.
    pub fn refund_amount_minor(&self, now: NaiveDateTime) -> i64 {
        let minutes_until = (self.start_instant() - now).num_minutes();
        let percentage: i64 = if minutes_until >= 24 * 60 {
            100
        } else if minutes_until >= 12 * 60 {
            75
        } else if minutes_until >= 6 * 60 {
            50
        } else if minutes_until >= 2 * 60 {
            25
        } else {
            0
        };
        (self.pricing.total_minor * percentage + 50) / 100
    }
}

fn minute_offset(minutes: u16) -> NaiveTime {
    NaiveTime::from_hms_opt(u32::from(minutes) / 60, u32::from(minutes) % 60, 0)
        .unwrap_or(NaiveTime::MIN)
}
