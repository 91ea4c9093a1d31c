//! Delivery transport abstraction.
//!
//! The dispatcher hands one `(channel, recipient, subject, body)` message at
//! a time to a [`NotificationTransport`]. Real email/SMS/push backends live
//! outside this crate; [`LogTransport`] writes deliveries to the log.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::types::Channel;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    /// The backend refused this message; retrying may not help.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// The backend could not be reached.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("channel {0} is not supported by this transport")]
    UnsupportedChannel(Channel),
}

/// One outbound message.
#[derive(Debug, Clone, Copy)]
pub struct Message<'a> {
    pub channel: Channel,
    pub recipient: &'a str,
    pub subject: &'a str,
    pub body: &'a str,
}

#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, message: Message<'_>) -> Result<(), TransportError>;

    /// Human-readable name for logging (e.g. "log", "smtp").
    fn transport_name(&self) -> &str;
}

/// Accepts every message and records it at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(&self, message: Message<'_>) -> Result<(), TransportError> {
        info!(
            channel = %message.channel,
            recipient = %message.recipient,
            subject = %message.subject,
            "Notification delivered"
        );
        Ok(())
    }

    fn transport_name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_transport_accepts_every_channel() {
        let transport: Box<dyn NotificationTransport> = Box::new(LogTransport);
        for channel in [Channel::Email, Channel::Sms, Channel::Websocket, Channel::System] {
            let message = Message {
                channel,
                recipient: "SYSTEM",
                subject: "[INFO] P-001 test",
                body: "",
            };
            tokio_test::assert_ok!(tokio_test::block_on(transport.send(message)));
        }
        assert_eq!(transport.transport_name(), "log");
    }
}
