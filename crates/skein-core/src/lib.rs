//! # Skein Core
//!
//! Protocol-level building blocks shared by every skein crate.
//!
//! - **Grammar**: [`Message`] and [`Prefix`] parsing and serialization,
//!   including the trailing-parameter colon rule ([`format_command`]).
//! - **CTCP**: framing helpers in [`ctcp`].
//! - **Connection state**: [`ConnectionHandle`], the cloneable handle hooks
//!   use to talk back to a server.
//! - **Reconnect policy**: [`ReconnectPolicy`] and its [`Backoff`] state.
//!
//! ```text
//! socket ─▶ skein-transport ─▶ Message::parse ─▶ skein-framework dispatch
//!                                                     │
//! socket ◀─ writer task ◀──── ConnectionHandle ◀──────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use skein_core::{Message, format_command};
//!
//! let msg = Message::parse(":nick!user@host PRIVMSG #chan :.weather london").unwrap();
//! assert_eq!(msg.mask(), "nick!user@host");
//! assert_eq!(msg.last_param(), ".weather london");
//!
//! assert_eq!(
//!     format_command("PRIVMSG", &["#chan", "hello world"]),
//!     "PRIVMSG #chan :hello world",
//! );
//! ```

pub mod connection;
pub mod ctcp;
pub mod error;
pub mod message;
pub mod reconnect;

pub use connection::{ConnectionHandle, ConnectionInfo, NickServ};
pub use error::{ParseError, ParseResult, TransportError, TransportResult};
pub use message::{Message, Prefix, format_command, is_channel_name};
pub use reconnect::{Backoff, ReconnectPolicy};
