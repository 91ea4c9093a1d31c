//! Alert notification: task fan-out, delivery and retry.

pub mod dispatcher;
pub mod transport;

pub use dispatcher::NotificationDispatcher;
pub use transport::{LogTransport, Message, NotificationTransport, TransportError};
