//! # courier-pop3
//!
//! POP3 client (RFC 1939) used by the courier mail engine to fetch recent
//! messages from a maildrop.
//!
//! ## Features
//!
//! - **Type-state connection management**: mailbox commands are only
//!   available after USER/PASS succeed
//! - **TLS**: implicit TLS (port 995) and STLS upgrade (RFC 2595)
//! - **Timeouts**: every connect, read and write is bounded
//! - **Framing**: dot-terminated bodies with byte-stuffing removed
//!
//! ## Quick Start
//!
//! ```no_run
//! use courier_pop3::{Client, DEFAULT_TIMEOUT, connect_tls, select_recent};
//!
//! # async fn run() -> courier_pop3::Result<()> {
//! let stream = connect_tls("pop.example.com", 995, DEFAULT_TIMEOUT).await?;
//! let client = Client::from_stream(stream, DEFAULT_TIMEOUT).await?;
//! let mut client = client.login("user@example.com", "password").await?;
//!
//! let handles = client.list().await?;
//! for handle in select_recent(&handles, 10) {
//!     let raw = client.retr(handle.seq).await?;
//!     println!("message {} has {} bytes", handle.seq, raw.len());
//! }
//!
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```

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
    Authorization, Client, Pop3Stream, Transaction, connect_plain, connect_tls,
    create_tls_connector,
};
pub use error::{Error, Result};
pub use types::{MailboxStat, MessageHandle, select_recent};

/// Default bound on each POP3 connect, read and write.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Well-known POP3 ports.
pub mod ports {
    /// Plain POP3, optionally upgraded with STLS.
    pub const POP3: u16 = 110;
    /// POP3 over implicit TLS.
    pub const POP3S: u16 = 995;
}
