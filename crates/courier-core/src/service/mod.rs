//! Protocol services.
//!
//! Each function opens its own connection, runs one sequential exchange and
//! releases the socket before returning, whether it succeeded or not.

pub mod imap;
pub mod local;
pub mod pop3;
pub mod smtp;
