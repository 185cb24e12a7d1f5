//! Async stream abstraction for tokio.

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(feature = "tokio-tls")]
use tokio_native_tls::TlsStream;

use crate::error::{CR_SERVER_LOST, Error, Result};
use crate::protocol::packet::{Framer, PacketHeader};
use crate::protocol::response::{ERR_HEADER, parse_err};

pub enum Stream {
    Tcp(BufReader<TcpStream>),
    #[cfg(feature = "tokio-tls")]
    Tls(BufReader<TlsStream<TcpStream>>),
    #[cfg(unix)]
    Unix(BufReader<UnixStream>),
}

impl Stream {
    pub fn tcp(stream: TcpStream) -> Self {
        Self::Tcp(BufReader::new(stream))
    }

    #[cfg(unix)]
    pub fn unix(stream: UnixStream) -> Self {
        Self::Unix(BufReader::new(stream))
    }

    /// Unix sockets never leave the host and count as a secure transport.
    pub fn is_unix(&self) -> bool {
        match self {
            #[cfg(unix)]
            Stream::Unix(_) => true,
            _ => false,
        }
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let result = match self {
            Stream::Tcp(r) => r.read_exact(buf).await,
            #[cfg(feature = "tokio-tls")]
            Stream::Tls(r) => r.read_exact(buf).await,
            #[cfg(unix)]
            Stream::Unix(r) => r.read_exact(buf).await,
        };
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(Error::ConnectionClosed),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Stream::Tcp(r) => r.get_mut().write_all(buf).await,
            #[cfg(feature = "tokio-tls")]
            Stream::Tls(r) => r.get_mut().write_all(buf).await,
            #[cfg(unix)]
            Stream::Unix(r) => r.get_mut().write_all(buf).await,
        }
    }

    async fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Stream::Tcp(r) => r.get_mut().flush().await,
            #[cfg(feature = "tokio-tls")]
            Stream::Tls(r) => r.get_mut().flush().await,
            #[cfg(unix)]
            Stream::Unix(r) => r.get_mut().flush().await,
        }
    }

    /// Read one logical packet into `out`, reassembling split frames.
    ///
    /// A frame with an unexpected sequence id is still read in full: if it is
    /// an ERR packet (an idle-timeout notice, for example) the server message
    /// is reported as a lost connection.
    pub async fn read_packet(&mut self, framer: &mut Framer, out: &mut Vec<u8>) -> Result<()> {
        out.clear();
        loop {
            let mut header_bytes = [0u8; 4];
            self.read_exact(&mut header_bytes).await?;
            let header = PacketHeader::from_bytes(&header_bytes);

            let (len, more) = match framer.accept(&header) {
                Ok(accepted) => accepted,
                Err(err) => return Err(self.out_of_sequence(header, err).await),
            };

            let start = out.len();
            out.resize(start + len, 0);
            self.read_exact(&mut out[start..]).await?;
            tracing::trace!(len, seq = header.sequence_id(), "read frame");
            if !more {
                return Ok(());
            }
        }
    }

    async fn out_of_sequence(&mut self, header: PacketHeader, err: Error) -> Error {
        let mut payload = vec![0u8; header.length()];
        if self.read_exact(&mut payload).await.is_err() || payload.first() != Some(&ERR_HEADER) {
            return err;
        }
        match parse_err(&payload) {
            Ok(server) => {
                tracing::warn!(code = server.code, message = %server.message, "out-of-band error packet");
                Error::Operational {
                    code: CR_SERVER_LOST,
                    message: format!(
                        "Lost connection to MySQL server during query ({}: {})",
                        server.code, server.message
                    ),
                }
            }
            Err(_) => err,
        }
    }

    /// Frame `payload` into `frame_buffer` and write it out.
    pub async fn write_packet(
        &mut self,
        framer: &mut Framer,
        payload: &[u8],
        frame_buffer: &mut Vec<u8>,
    ) -> Result<()> {
        frame_buffer.clear();
        framer.encode(payload, frame_buffer);
        self.write_all(frame_buffer).await?;
        self.flush().await?;
        Ok(())
    }

    #[cfg(feature = "tokio-tls")]
    pub async fn upgrade_to_tls(self, host: &str) -> Result<Self> {
        let tcp = match self {
            Stream::Tcp(r) => r.into_inner(),
            Stream::Tls(_) => {
                return Err(Error::InvalidConnectionState(
                    "TLS is already established".into(),
                ));
            }
            #[cfg(unix)]
            Stream::Unix(_) => {
                return Err(Error::Unsupported(
                    "TLS over Unix sockets is not supported".into(),
                ));
            }
        };

        let connector = native_tls::TlsConnector::new()?;
        let connector = tokio_native_tls::TlsConnector::from(connector);
        let tls_stream = connector.connect(host, tcp).await?;
        tracing::debug!(host, "TLS established");
        Ok(Self::Tls(BufReader::new(tls_stream)))
    }

    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        match self {
            Stream::Tcp(r) => r.get_mut().shutdown().await,
            #[cfg(feature = "tokio-tls")]
            Stream::Tls(r) => r.get_mut().shutdown().await,
            #[cfg(unix)]
            Stream::Unix(r) => r.get_mut().shutdown().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair() -> (Stream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (Stream::tcp(client), server)
    }

    #[tokio::test]
    async fn write_then_read_packet() {
        let (mut client, mut server) = pair().await;
        let mut framer = Framer::new();
        let mut frame_buffer = Vec::new();
        client
            .write_packet(&mut framer, b"\x0e", &mut frame_buffer)
            .await
            .unwrap();

        let mut written = [0u8; 5];
        server.read_exact(&mut written).await.unwrap();
        assert_eq!(written, [1, 0, 0, 0, 0x0e]);

        server.write_all(&[3, 0, 0, 1, 0, 0, 0]).await.unwrap();
        let mut payload = Vec::new();
        client.read_packet(&mut framer, &mut payload).await.unwrap();
        assert_eq!(payload, [0, 0, 0]);
        assert_eq!(framer.sequence_id(), 2);
    }

    #[tokio::test]
    async fn split_packet_reassembly() {
        let (mut client, mut server) = pair().await;
        let mut framer = Framer::with_max_frame_len(4);
        server
            .write_all(&[4, 0, 0, 0, b'a', b'b', b'c', b'd', 1, 0, 0, 1, b'e'])
            .await
            .unwrap();
        let mut payload = Vec::new();
        client.read_packet(&mut framer, &mut payload).await.unwrap();
        assert_eq!(payload, b"abcde");
    }

    #[tokio::test]
    async fn out_of_sequence_error_packet() {
        let (mut client, mut server) = pair().await;
        let mut framer = Framer::new();
        let mut err = vec![0xFF, 0xBF, 0x0F, b'#'];
        err.extend_from_slice(b"HY000The client was disconnected by the server");
        let mut frame = vec![err.len() as u8, 0, 0, 0];
        frame.extend_from_slice(&err);
        // expected sequence 1, server sends 0
        framer.encode(b"\x0e", &mut Vec::new());
        server.write_all(&frame).await.unwrap();

        let mut payload = Vec::new();
        let err = client.read_packet(&mut framer, &mut payload).await.unwrap_err();
        assert_eq!(err.code(), Some(CR_SERVER_LOST));
        assert!(err.to_string().contains("4031"));
    }

    #[tokio::test]
    async fn eof_is_connection_closed() {
        let (mut client, server) = pair().await;
        drop(server);
        let mut payload = Vec::new();
        let err = client
            .read_packet(&mut Framer::new(), &mut payload)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }
}
