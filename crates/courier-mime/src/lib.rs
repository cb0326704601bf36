//! # courier-mime
//!
//! MIME codec, received-message parser and outgoing-message builder for the
//! courier mail engine. Everything here is pure and socket-free.
//!
//! ## Features
//!
//! - **Header decoding**: RFC 2047 encoded-words, header folding
//! - **Body decoding**: Base64, Quoted-Printable, charset conversion
//! - **Multipart**: boundary splitting and recursive part classification
//! - **Parsing**: raw bytes to [`Message`] with bodies and attachments
//! - **Building**: [`OutgoingMessage`] to the text sent after SMTP `DATA`
//!
//! ## Quick Start
//!
//! ### Parsing a received message
//!
//! ```
//! use courier_mime::Message;
//!
//! let raw = "From: Sender <sender@example.com>\r\n\
//!            Subject: Test\r\n\
//!            Content-Type: text/plain\r\n\
//!            \r\n\
//!            Hello, World!";
//!
//! let message = Message::parse(raw.as_bytes()).unwrap();
//! assert_eq!(message.subject, "Test");
//! assert_eq!(message.from_address, "sender@example.com");
//! assert_eq!(message.body, "Hello, World!");
//! ```
//!
//! ### Building a message to send
//!
//! ```
//! use courier_mime::MessageBuilder;
//!
//! let message = MessageBuilder::new()
//!     .from("sender@example.com")
//!     .to("recipient@example.com")
//!     .subject("Test Message")
//!     .text_body("Hello, World!")
//!     .build();
//!
//! assert!(message.to_rfc5322().starts_with("From: sender@example.com\r\n"));
//! ```
//!
//! ### Encoding/Decoding
//!
//! ```
//! use courier_mime::encoding::{decode_body, decode_header_value, encode_base64};
//!
//! let word = format!("=?UTF-8?B?{}?=", encode_base64("héllo".as_bytes()));
//! assert_eq!(decode_header_value(&word), "héllo");
//! assert_eq!(decode_body(b"caf=C3=A9", "quoted-printable"), "café".as_bytes());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod builder;
mod content_type;
mod error;
mod header;
mod message;

pub mod charset;
pub mod encoding;
pub mod multipart;
pub mod parser;

pub use builder::{MessageBuilder, OutgoingMessage};
pub use content_type::{ContentDisposition, ContentType};
pub use error::{Error, Result};
pub use header::{Headers, fold_headers};
pub use message::{Attachment, Message, extension_for_mime};
