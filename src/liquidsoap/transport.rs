//! Byte-level transport to the engine's control socket.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;

use super::LiquidsoapError;

/// Any duplex byte stream usable as a control connection.
pub trait ControlStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ControlStream for T {}

/// Where the engine's control interface listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Unix domain socket path (`settings.server.socket`).
    Unix(PathBuf),
    /// `host:port` of the telnet server (`settings.server.telnet`).
    Tcp(String),
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::Unix(PathBuf::from("./silent-check.sock"))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

/// One duplex byte stream to the engine.
///
/// The transport keeps only what its read buffer already holds; bytes past a
/// delimiter stay buffered for the next read.
pub struct Transport {
    stream: BufReader<Box<dyn ControlStream>>,
    closed: bool,
}

impl Transport {
    /// Open a connection to `endpoint`, bounded by `connect_timeout`.
    pub async fn connect(
        endpoint: &Endpoint,
        connect_timeout: Duration,
    ) -> Result<Self, LiquidsoapError> {
        tracing::debug!(endpoint = %endpoint, "Opening control connection");

        let connecting = async {
            let stream: Box<dyn ControlStream> = match endpoint {
                #[cfg(unix)]
                Endpoint::Unix(path) => Box::new(tokio::net::UnixStream::connect(path).await?),
                #[cfg(not(unix))]
                Endpoint::Unix(_) => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::Unsupported,
                        "unix sockets are not supported on this platform",
                    ));
                }
                Endpoint::Tcp(addr) => Box::new(tokio::net::TcpStream::connect(addr).await?),
            };
            Ok::<_, std::io::Error>(stream)
        };

        let stream = timeout(connect_timeout, connecting)
            .await
            .map_err(|_| LiquidsoapError::ConnectTimeout {
                endpoint: endpoint.to_string(),
                timeout: connect_timeout,
            })?
            .map_err(|source| LiquidsoapError::Connection {
                endpoint: endpoint.to_string(),
                source,
            })?;

        tracing::info!(endpoint = %endpoint, "Opened control connection");
        Ok(Self::from_stream(stream))
    }

    /// Wrap an already established stream.
    pub fn from_stream(stream: impl ControlStream + 'static) -> Self {
        Self {
            stream: BufReader::new(Box::new(stream)),
            closed: false,
        }
    }

    /// Write all of `bytes` and flush.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<(), LiquidsoapError> {
        if self.closed {
            return Err(LiquidsoapError::Closed);
        }
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read until `delimiter` has been received. The delimiter is included.
    pub async fn read_until(&mut self, delimiter: &[u8]) -> Result<Vec<u8>, LiquidsoapError> {
        let (data, _) = self.read_until_any(&[delimiter]).await?;
        Ok(data)
    }

    /// Read until any of `delimiters` has been received.
    ///
    /// Returns the bytes read (delimiter included) and the index of the
    /// delimiter that ended them. Fails with `UnexpectedEof` if the stream
    /// ends first.
    pub async fn read_until_any(
        &mut self,
        delimiters: &[&[u8]],
    ) -> Result<(Vec<u8>, usize), LiquidsoapError> {
        if self.closed {
            return Err(LiquidsoapError::Closed);
        }
        if delimiters.iter().any(|d| d.is_empty()) {
            return Err(LiquidsoapError::Protocol("empty reply delimiter".into()));
        }

        let mut data = Vec::new();
        loop {
            let (consumed, matched) = {
                let available = self.stream.fill_buf().await?;
                if available.is_empty() {
                    return Err(LiquidsoapError::UnexpectedEof {
                        received: data.len(),
                    });
                }

                let mut consumed = 0;
                let mut matched = None;
                for &byte in available {
                    data.push(byte);
                    consumed += 1;
                    if let Some(index) = delimiters.iter().position(|d| data.ends_with(d)) {
                        matched = Some(index);
                        break;
                    }
                }
                (consumed, matched)
            };
            self.stream.consume(consumed);

            if let Some(index) = matched {
                return Ok((data, index));
            }
        }
    }

    /// Shut down the write side. Calling this more than once is a no-op.
    pub async fn close(&mut self) -> Result<(), LiquidsoapError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.shutdown().await {
            Ok(()) => Ok(()),
            // The engine hangs up after `Bye!`; a dead peer is already closed.
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_read_until_spans_multiple_writes() {
        let (client, mut server) = duplex(64);
        let mut transport = Transport::from_stream(client);

        tokio::spawn(async move {
            server.write_all(b"hello\r\nEN").await.unwrap();
            tokio::task::yield_now().await;
            server.write_all(b"D\r\nnext").await.unwrap();
        });

        let data = transport.read_until(b"END\r\n").await.unwrap();
        assert_eq!(data, b"hello\r\nEND\r\n");
    }

    #[tokio::test]
    async fn test_read_until_keeps_trailing_bytes() {
        let (client, mut server) = duplex(64);
        let mut transport = Transport::from_stream(client);

        server.write_all(b"a\r\nEND\r\nb\r\nEND\r\n").await.unwrap();

        assert_eq!(transport.read_until(b"END\r\n").await.unwrap(), b"a\r\nEND\r\n");
        assert_eq!(transport.read_until(b"END\r\n").await.unwrap(), b"b\r\nEND\r\n");
    }

    #[tokio::test]
    async fn test_read_until_any_reports_matched_delimiter() {
        let (client, mut server) = duplex(64);
        let mut transport = Transport::from_stream(client);

        server.write_all(b"Bye!\r\n").await.unwrap();

        let (data, index) = transport
            .read_until_any(&[b"END\r\n".as_slice(), b"Bye!\r\n".as_slice()])
            .await
            .unwrap();
        assert_eq!(data, b"Bye!\r\n");
        assert_eq!(index, 1);
    }

    #[tokio::test]
    async fn test_read_until_eof() {
        let (client, mut server) = duplex(64);
        let mut transport = Transport::from_stream(client);

        server.write_all(b"partial").await.unwrap();
        drop(server);

        let err = transport.read_until(b"END\r\n").await.unwrap_err();
        assert!(matches!(err, LiquidsoapError::UnexpectedEof { received: 7 }));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (client, _server) = duplex(64);
        let mut transport = Transport::from_stream(client);

        transport.close().await.unwrap();
        transport.close().await.unwrap();
        assert!(transport.is_closed());
        assert!(matches!(
            transport.write(b"help\n").await,
            Err(LiquidsoapError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Endpoint::Unix(dir.path().join("missing.sock"));

        let err = Transport::connect(&endpoint, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LiquidsoapError::Connection { .. }));
        assert!(err.to_string().contains("missing.sock"));
    }

    #[test]
    fn test_endpoint_yaml() {
        let unix: Endpoint = serde_yaml::from_str("unix: /run/liquidsoap.sock").unwrap();
        assert_eq!(unix, Endpoint::Unix(PathBuf::from("/run/liquidsoap.sock")));

        let tcp: Endpoint = serde_yaml::from_str("tcp: 127.0.0.1:1234").unwrap();
        assert_eq!(tcp, Endpoint::Tcp("127.0.0.1:1234".into()));
        assert_eq!(tcp.to_string(), "tcp:127.0.0.1:1234");
    }
}
