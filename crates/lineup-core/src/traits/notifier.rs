// # Notifier Trait
//
// Defines the interface for delivering change reports to the operator.
//
// ## Implementations
//
// - SMTP: `lineup-notify-smtp` crate (email, and SMS through an email gateway)
//
// ## Failure Semantics
//
// Delivery failures are returned to the engine, which logs them and carries
// on. A failed notification never prevents the snapshot from being updated,
// so a stale diff is not resent on every cycle.

use async_trait::async_trait;

/// Trait for notification sinks
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message
    ///
    /// # Parameters
    ///
    /// - `destination`: Email address, or `<number>@<sms gateway>`
    /// - `subject`: Message subject
    /// - `body`: Plain text body
    async fn send(&self, destination: &str, subject: &str, body: &str)
    -> Result<(), crate::Error>;

    /// Name of the notifier (for logging)
    fn notifier_name(&self) -> &'static str;
}
