//! Delivery of accepted contact messages.
//!
//! The limiter only gates dispatch; delivery itself (and any credentials it
//! needs) lives behind the [`Dispatcher`] trait on the server side.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::error::Result;

/// An accepted contact form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub telegram: Option<String>,
    pub project_type: Option<String>,
    pub message: String,
    /// Identity of the sender as seen by the limiter
    pub sender: String,
}

/// Delivers contact messages to their destination.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Deliver one message. An error leaves the sender's quota untouched.
    async fn dispatch(&self, message: &ContactMessage) -> Result<()>;
}

/// Dispatcher that writes messages to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl Dispatcher for LogDispatcher {
    async fn dispatch(&self, message: &ContactMessage) -> Result<()> {
        info!(
            sender = %message.sender,
            name = %message.name,
            email = %message.email,
            telegram = ?message.telegram,
            project_type = ?message.project_type,
            length = message.message.len(),
            "Contact message received"
        );
        Ok(())
    }
}
