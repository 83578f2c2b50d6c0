//! Mailbox I/O: IMAP reading and SMTP sending.

pub mod email;
pub mod email_types;

pub use email::{EmailChannel, EmailConfig};
