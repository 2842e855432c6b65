//! Notifier implementations.

use std::sync::Mutex;

use crate::error::{NotifyError, NotifyResult};
use crate::types::EmailMessage;

/// Delivers composed emails.
///
/// Implementations may block; callers on an async runtime should dispatch
/// off the request path.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &EmailMessage) -> NotifyResult<()>;
}

/// Notifier used when no mail transport is configured: records that a
/// message would have been sent and drops it.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &EmailMessage) -> NotifyResult<()> {
        tracing::warn!(
            subject = %message.subject,
            "No SMTP server is configured, but an email would have been sent"
        );
        Ok(())
    }
}

/// Keeps every message in memory. Useful in development and tests.
#[derive(Debug, Default)]
pub struct OutboxNotifier {
    outbox: Mutex<Vec<EmailMessage>>,
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, oldest first.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

impl Notifier for OutboxNotifier {
    fn notify(&self, message: &EmailMessage) -> NotifyResult<()> {
        let mut outbox = self.outbox.lock().map_err(|_| NotifyError::InternalError)?;
        outbox.push(message.clone());
        tracing::info!(subject = %message.subject, "Notification queued in outbox");
        Ok(())
    }
}
