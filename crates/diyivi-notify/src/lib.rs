//! DIYivi Notifications
//!
//! Email messages telling an initiator that their exchange got a reply or
//! that their message was signed, and the `Notifier` seam that delivers them.
//!
//! Delivery is fire-and-forget from the protocol's point of view: a failed
//! notification is logged by the caller and never undoes the transition
//! that triggered it.

pub mod dispatcher;
pub mod email;
pub mod error;
pub mod types;

pub use dispatcher::{LogNotifier, Notifier, OutboxNotifier};
pub use email::{
    attribute_label, compose_exchange_reply_email, compose_signature_result_email,
    signature_verify_link,
};
pub use error::{NotifyError, NotifyResult};
pub use types::{check_recipient, EmailMessage, EmailSettings};
