//! The line transport: socket bytes in, decoded lines out, and back.
//!
//! ```text
//!             ┌──────────── LineTransport ────────────┐
//! socket ───▶ │ LineReader: FramedRead + idle timeout │ ───▶ Option<String>
//! socket ◀─── │ LineWriter: FramedWrite (CRLF, 500B)  │ ◀─── &str
//!             └───────────────────────────────────────┘
//! ```
//!
//! The two halves are independent so a session can read and write from
//! separate tasks. End of stream, I/O errors and the inactivity timeout all
//! surface as `None` from [`LineReader::read_line`]; the caller reconnects.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use skein_core::{TransportError, TransportResult};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use crate::codec::{DEFAULT_MAX_INPUT, LineCodec};
use crate::decode::{DEFAULT_ENCODINGS, TextDecoder};
use crate::stream::IrcStream;
use crate::tls;

// =============================================================================
// Options
// =============================================================================

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Wrap the socket in TLS.
    pub tls: bool,
    /// Skip certificate verification (TLS only).
    pub ignore_cert: bool,
}

impl Endpoint {
    /// Plain TCP endpoint.
    pub fn plain(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            tls: false,
            ignore_cert: false,
        }
    }

    /// `host:port` as dialed.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Tunables of one transport.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Silence longer than this ends the stream.
    pub read_timeout: Duration,
    /// Encoding labels tried in order when decoding input.
    pub encodings: Vec<String>,
    /// Bound for buffered input without a newline.
    pub max_input: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(300),
            encodings: DEFAULT_ENCODINGS.iter().map(|s| (*s).to_owned()).collect(),
            max_input: DEFAULT_MAX_INPUT,
        }
    }
}

impl TransportOptions {
    /// Sets the read inactivity timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

// =============================================================================
// LineTransport
// =============================================================================

/// A line-oriented view of one server socket.
pub struct LineTransport<S = IrcStream> {
    reader: LineReader<S>,
    writer: LineWriter<S>,
}

impl LineTransport<IrcStream> {
    /// Opens a TCP socket, optionally wrapped in TLS.
    pub async fn connect(endpoint: &Endpoint, options: TransportOptions) -> TransportResult<Self> {
        let addr = endpoint.addr();
        debug!(addr = %addr, tls = endpoint.tls, "Connecting");

        let tcp = TcpStream::connect(&addr)
            .await
            .map_err(|e| TransportError::connect(&addr, e))?;
        if let Err(e) = tcp.set_nodelay(true) {
            debug!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }

        let stream = if endpoint.tls {
            let connector = tls::connector(endpoint.ignore_cert)?;
            let name = ServerName::try_from(endpoint.host.clone())
                .map_err(|_| TransportError::InvalidServerName(endpoint.host.clone()))?;
            let tls_stream = connector
                .connect(name, tcp)
                .await
                .map_err(|e| TransportError::Tls(format!("handshake with {addr} failed: {e}")))?;
            IrcStream::Tls(Box::new(tls_stream))
        } else {
            IrcStream::Plain(tcp)
        };

        info!(
            addr = %addr,
            tls = endpoint.tls,
            ignore_cert = endpoint.ignore_cert,
            "Transport connected"
        );
        Self::from_stream(stream, options)
    }
}

impl<S> LineTransport<S>
where
    S: AsyncRead + AsyncWrite,
{
    /// Wraps an already connected stream.
    pub fn from_stream(stream: S, options: TransportOptions) -> TransportResult<Self> {
        let decoder = TextDecoder::new(&options.encodings)?;
        let (read_half, write_half) = tokio::io::split(stream);
        let codec = LineCodec::new(decoder).with_max_input(options.max_input);
        Ok(Self {
            reader: LineReader {
                framed: FramedRead::new(read_half, codec.clone()),
                read_timeout: options.read_timeout,
            },
            writer: LineWriter {
                framed: FramedWrite::new(write_half, codec),
            },
        })
    }

    /// See [`LineReader::read_line`].
    pub async fn read_line(&mut self) -> Option<String> {
        self.reader.read_line().await
    }

    /// See [`LineWriter::write_line`].
    pub async fn write_line(&mut self, text: &str) -> TransportResult<()> {
        self.writer.write_line(text).await
    }

    /// Splits into independently owned halves.
    pub fn into_split(self) -> (LineReader<S>, LineWriter<S>) {
        (self.reader, self.writer)
    }
}

/// Read half of a [`LineTransport`].
pub struct LineReader<S> {
    framed: FramedRead<ReadHalf<S>, LineCodec>,
    read_timeout: Duration,
}

impl<S: AsyncRead> LineReader<S> {
    /// Next decoded line without its terminator.
    ///
    /// Returns `None` on end of stream, on a socket error, or when nothing
    /// arrived within the read timeout.
    pub async fn read_line(&mut self) -> Option<String> {
        match tokio::time::timeout(self.read_timeout, self.framed.next()).await {
            Ok(Some(Ok(line))) => Some(line),
            Ok(Some(Err(e))) => {
                warn!(error = %e, "Read failed, ending stream");
                None
            }
            Ok(None) => {
                info!("Stream closed by peer");
                None
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.read_timeout.as_secs(),
                    "No data within read timeout, ending stream"
                );
                None
            }
        }
    }
}

/// Write half of a [`LineTransport`].
pub struct LineWriter<S> {
    framed: FramedWrite<WriteHalf<S>, LineCodec>,
}

impl<S: AsyncWrite> LineWriter<S> {
    /// Writes the first line of `text`, capped at 500 bytes, plus CRLF, and
    /// flushes until every byte is on the socket.
    pub async fn write_line(&mut self, text: &str) -> TransportResult<()> {
        self.framed.send(text.to_owned()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn options() -> TransportOptions {
        TransportOptions::default().with_read_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_write_line_strips_embedded_newline() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut transport = LineTransport::from_stream(client, options()).unwrap();

        transport.write_line("a\nb").await.unwrap();
        drop(transport);

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"a\r\n");
    }

    #[tokio::test]
    async fn test_write_line_truncates_to_limit() {
        let (client, mut server) = tokio::io::duplex(4096);
        let mut transport = LineTransport::from_stream(client, options()).unwrap();

        transport.write_line(&"x".repeat(700)).await.unwrap();
        drop(transport);

        let mut received = Vec::new();
        server.read_to_end(&mut received).await.unwrap();
        assert_eq!(received.len(), 502);
        assert!(received.ends_with(b"\r\n"));
    }

    #[tokio::test]
    async fn test_read_lines_across_chunks() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut transport = LineTransport::from_stream(client, options()).unwrap();

        server.write_all(b":a!b@c PRIVMSG #x :hel").await.unwrap();
        server.write_all(b"lo\r\nPING :srv\r\n").await.unwrap();

        assert_eq!(
            transport.read_line().await.as_deref(),
            Some(":a!b@c PRIVMSG #x :hello")
        );
        assert_eq!(transport.read_line().await.as_deref(), Some("PING :srv"));
    }

    #[tokio::test]
    async fn test_undecodable_bytes_do_not_block() {
        let (client, mut server) = tokio::io::duplex(1024);
        let options = TransportOptions {
            encodings: vec!["utf-8".to_owned()],
            ..options()
        };
        let mut transport = LineTransport::from_stream(client, options).unwrap();

        server.write_all(b"PRIVMSG #x :\xff\xfe\r\n").await.unwrap();
        let line = transport.read_line().await.unwrap();
        assert!(line.starts_with("PRIVMSG #x :"));
    }

    #[tokio::test]
    async fn test_peer_close_ends_stream() {
        let (client, server) = tokio::io::duplex(1024);
        let mut transport = LineTransport::from_stream(client, options()).unwrap();
        drop(server);
        assert!(transport.read_line().await.is_none());
    }

    #[tokio::test]
    async fn test_inactivity_timeout_ends_stream() {
        let (client, _server) = tokio::io::duplex(1024);
        let options = TransportOptions::default().with_read_timeout(Duration::from_millis(50));
        let mut transport = LineTransport::from_stream(client, options).unwrap();

        let started = std::time::Instant::now();
        assert!(transport.read_line().await.is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_split_halves_work_concurrently() {
        let (client, mut server) = tokio::io::duplex(1024);
        let transport = LineTransport::from_stream(client, options()).unwrap();
        let (mut reader, mut writer) = transport.into_split();

        let write = tokio::spawn(async move {
            writer.write_line("NICK skein").await.unwrap();
        });
        server.write_all(b"PING :x\r\n").await.unwrap();
        assert_eq!(reader.read_line().await.as_deref(), Some("PING :x"));
        write.await.unwrap();

        let mut buf = [0u8; 12];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"NICK skein\r\n");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = LineTransport::connect(&Endpoint::plain("127.0.0.1", port), options()).await;
        assert!(matches!(result, Err(TransportError::ConnectFailed { .. })));
    }
}
