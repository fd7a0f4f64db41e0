//! Mailbox implementations.

pub mod email;
pub mod email_types;

pub use email::{EmailConfig, ImapMailbox};
