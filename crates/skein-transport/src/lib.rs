//! # Skein Transport
//!
//! The byte-stream to line-stream adapter under every skein connection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  skein-runtime      │  (session loop, reconnects)
//! ├─────────────────────┤
//! │  skein-transport    │  <- This crate (lines, codec, TLS)
//! ├─────────────────────┤
//! │  Network (TCP/TLS)  │
//! └─────────────────────┘
//! ```
//!
//! ## Components
//!
//! | Item | Role |
//! |------|------|
//! | [`LineTransport`] | connect, split into [`LineReader`] / [`LineWriter`] |
//! | [`LineCodec`] | CR/LF framing, 500 byte outgoing cap |
//! | [`TextDecoder`] | ordered multi-encoding decode with lossy fallback |
//! | [`tls::connector`] | rustls client config, optional verification bypass |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use skein_transport::{Endpoint, LineTransport, TransportOptions};
//!
//! let mut transport =
//!     LineTransport::connect(&Endpoint::plain("irc.libera.chat", 6667), TransportOptions::default())
//!         .await?;
//! transport.write_line("NICK skein").await?;
//! while let Some(line) = transport.read_line().await {
//!     println!("{line}");
//! }
//! ```

pub mod codec;
pub mod decode;
pub mod stream;
pub mod tls;
pub mod transport;

pub use codec::{LineCodec, MAX_LINE_BYTES, sanitize};
pub use decode::{DEFAULT_ENCODINGS, TextDecoder};
pub use stream::IrcStream;
pub use transport::{Endpoint, LineReader, LineTransport, LineWriter, TransportOptions};
