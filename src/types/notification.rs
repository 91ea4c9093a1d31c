//! Notification types: Channel, NotificationStatus, NotificationTask

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::NotificationMethod;

/// Concrete delivery channel of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Email,
    Sms,
    Websocket,
    /// In-app operator inbox
    System,
}

impl Channel {
    /// Channels selected by a set of rule methods. Empty selects SYSTEM.
    pub fn from_methods(methods: &[NotificationMethod]) -> Vec<Channel> {
        let mut channels = Vec::new();
        for method in methods {
            let expanded: &[Channel] = match method {
                NotificationMethod::Email => &[Channel::Email],
                NotificationMethod::Sms => &[Channel::Sms],
                NotificationMethod::Websocket => &[Channel::Websocket],
                NotificationMethod::All => &[Channel::Email, Channel::Sms, Channel::Websocket],
            };
            for channel in expanded {
                if !channels.contains(channel) {
                    channels.push(*channel);
                }
            }
        }
        if channels.is_empty() {
            channels.push(Channel::System);
        }
        channels
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Email => write!(f, "EMAIL"),
            Channel::Sms => write!(f, "SMS"),
            Channel::Websocket => write!(f, "WEBSOCKET"),
            Channel::System => write!(f, "SYSTEM"),
        }
    }
}

/// Delivery state of a task.
///
/// `PENDING → SENDING → SUCCESS | FAILED`; `FAILED → RETRY → SENDING` while
/// attempts remain. A FAILED task with no attempts left is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Pending,
    Sending,
    Success,
    Failed,
    Retry,
    Skipped,
}

impl NotificationStatus {
    /// Still owed a delivery attempt or one is underway.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            NotificationStatus::Pending | NotificationStatus::Sending | NotificationStatus::Retry
        )
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationStatus::Pending => write!(f, "PENDING"),
            NotificationStatus::Sending => write!(f, "SENDING"),
            NotificationStatus::Success => write!(f, "SUCCESS"),
            NotificationStatus::Failed => write!(f, "FAILED"),
            NotificationStatus::Retry => write!(f, "RETRY"),
            NotificationStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// One alert delivery to one recipient over one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationTask {
    pub task_id: String,
    pub alert_id: String,
    pub channel: Channel,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub status: NotificationStatus,
    /// Failed attempts so far
    pub retry_count: u32,
    pub next_retry_time: Option<DateTime<Utc>>,
    pub last_retry_time: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NotificationTask {
    /// Eligible for the retry sweep at `now`.
    pub fn is_due(&self, now: DateTime<Utc>, max_attempts: u32) -> bool {
        self.status == NotificationStatus::Failed
            && self.retry_count < max_attempts
            && self.next_retry_time.map_or(true, |t| t <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_expands_without_duplicates() {
        let channels = Channel::from_methods(&[NotificationMethod::Email, NotificationMethod::All]);
        assert_eq!(channels, vec![Channel::Email, Channel::Sms, Channel::Websocket]);
    }

    #[test]
    fn test_no_methods_falls_back_to_system() {
        assert_eq!(Channel::from_methods(&[]), vec![Channel::System]);
    }
}
