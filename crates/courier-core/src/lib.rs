//! # courier-core
//!
//! Mail engine for the courier CMS.
//!
//! This crate provides:
//! - **Sending**: one message per call over SMTP, or through the local
//!   sendmail program when no SMTP host is configured
//! - **Receiving**: the most recent messages over POP3, parsed into
//!   structured [`courier_mime::Message`] values
//! - **Connection tests** for SMTP, POP3 and IMAP
//! - **Settings seams**: [`ConfigProvider`] and [`Cache`] traits the host
//!   application implements
//!
//! Failures never cross the facade as raw protocol errors: sends report a
//! `bool`, receives and tests report a success flag with a message.
//!
//! ```no_run
//! use std::sync::Arc;
//! use courier_core::{Mailer, MapConfig, MemoryCache, SendOptions, keys};
//!
//! # async fn run() {
//! let config = MapConfig::new()
//!     .with(keys::SMTP_HOST, "smtp.example.com")
//!     .with(keys::SMTP_ENCRYPTION, "tls")
//!     .with(keys::SMTP_USERNAME, "site@example.com")
//!     .with(keys::SMTP_PASSWORD, "secret")
//!     .with(keys::FROM_EMAIL, "site@example.com");
//! let mailer = Mailer::new(Arc::new(config), Arc::new(MemoryCache::new()));
//!
//! let sent = mailer
//!     .send_email("user@example.com", "Welcome", "<p>Hello</p>", SendOptions::html())
//!     .await;
//! assert!(sent);
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod mailer;
pub mod service;
pub mod settings;

pub use error::{MailError, Result};
pub use mailer::{ConnectionTestResult, DeliveryStrategy, Mailer, ReceiveResult, SendOptions};
pub use settings::{
    Cache, ConfigProvider, ConnectionConfig, Encryption, MailSettings, MapConfig, MemoryCache,
    Service, keys,
};

pub use courier_mime::{Attachment, Message};
