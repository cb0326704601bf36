//! # courier-smtp
//!
//! SMTP client (RFC 5321) used by the courier mail engine to submit
//! outgoing messages.
//!
//! ## Features
//!
//! - **Type-state connection management**: invalid command orders do not
//!   compile, and a failed step consumes the client and closes the socket
//! - **Protocol**: EHLO, STARTTLS, AUTH LOGIN, MAIL FROM, RCPT TO, DATA, QUIT
//! - **TLS**: implicit TLS (port 465) and in-place STARTTLS upgrade
//! - **Timeouts**: every connect, read and write is bounded
//!
//! ## Quick Start
//!
//! ```no_run
//! use courier_smtp::{Address, Client, DEFAULT_TIMEOUT};
//! use courier_smtp::connection::connect;
//!
//! # async fn run() -> courier_smtp::Result<()> {
//! let stream = connect("smtp.example.com", 587, DEFAULT_TIMEOUT).await?;
//! let client = Client::from_stream(stream).await?;
//! let client = client.ehlo("client.example.com").await?;
//! let client = client.starttls("smtp.example.com").await?;
//! let client = client.auth_login("user@example.com", "password").await?;
//!
//! let client = client.mail_from(Address::new("sender@example.com")?).await?;
//! let client = client.rcpt_to(Address::new("recipient@example.com")?).await?;
//! let client = client.data().await?;
//! let client = client.send_message(b"Subject: Test\r\n\r\nHello, World!").await?;
//!
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── auth_login() ───→ Authenticated
//! └──────────────┘                            │
//!        │                                    │
//!        └──── mail_from() ───→ MailTransaction ───→ RecipientAdded ───→ Data
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP command builders
//! - [`connection`]: Connection management and type-state client
//! - [`parser`]: Reply parser
//! - [`types`]: Core SMTP types (addresses, extensions, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

use std::time::Duration;

pub use connection::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, ServerInfo,
    SmtpConnection,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};

/// Default bound on each SMTP connect, read and write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Well-known SMTP ports.
pub mod ports {
    /// Plain SMTP relay.
    pub const SMTP: u16 = 25;
    /// Message submission, usually with STARTTLS.
    pub const SUBMISSION: u16 = 587;
    /// Submission over implicit TLS.
    pub const SUBMISSIONS: u16 = 465;
}
