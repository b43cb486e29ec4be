pub mod email;

use async_trait::async_trait;

/// Notification templates the booking lifecycle can fire. Rendering and
/// delivery are the provider's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    BookingConfirmation,
    BookingCancellation,
    BookingReminder,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::BookingConfirmation => "booking_confirmation",
            TemplateKind::BookingCancellation => "booking_cancellation",
            TemplateKind::BookingReminder => "booking_reminder",
        }
    }
}

/// Fire-and-forget notification contract: the lifecycle manager logs
/// failures and never lets them block a booking transition.
#[async_trait]
pub trait NotificationProvider: Send + Sync {
    async fn notify(
        &self,
        user_id: &str,
        kind: TemplateKind,
        context: &serde_json::Value,
    ) -> anyhow::Result<()>;
}
