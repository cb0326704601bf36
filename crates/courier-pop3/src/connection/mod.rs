//! Connection management for POP3.

mod client;
mod framed;
mod stream;

pub use client::{Authorization, Client, Transaction};
pub use framed::FramedStream;
pub use stream::{Pop3Stream, connect_plain, connect_tls, create_tls_connector};
