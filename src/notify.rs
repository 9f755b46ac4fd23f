//! Outbound human-notification channel.
//!
//! Delivery is best-effort: the registry dispatches crash reports on a
//! detached task and only logs failures. Nothing in the crate blocks on, or
//! fails because of, the notifier.

use std::future::Future;

use thiserror::Error;

/// A notification could not be delivered.
///
/// Advisory only; callers log it and move on.
#[derive(Debug, Clone, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers a text message to a human channel (chat, pager, ...).
pub trait Notifier: Send + Sync {
    /// Sends one message. Multi-part reports are sent as an ordered sequence
    /// of calls; implementations should preserve that ordering per caller.
    fn send(&self, text: String) -> impl Future<Output = Result<(), NotifyError>> + Send;
}
