//! Settings input and caching.
//!
//! The host application owns settings storage and caching. The engine sees
//! them only through the [`ConfigProvider`] and [`Cache`] traits, which are
//! injected into [`crate::Mailer`].

mod cache;
mod model;
mod provider;

pub use cache::{Cache, MemoryCache};
pub use model::{ConnectionConfig, Encryption, MailSettings, Service};
pub use provider::{ConfigProvider, MapConfig, keys};
