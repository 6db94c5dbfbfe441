use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub recipient: String,
    pub template_id: String,
    pub title: String,
    pub summary: String,
    pub remark: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotifyOutcome {
    pub status: i64,
    pub message: String,
}

impl NotifyOutcome {
    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

pub trait Notifier {
    /// Delivery failures are reported through the outcome, never raised.
    fn send(&self, notification: &Notification) -> NotifyOutcome;
}
