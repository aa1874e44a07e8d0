//! Single-shot transport used by the ICAP client.
//!
//! A [`Connection`] carries exactly one exchange: connect, send the whole
//! request, read until the server closes, close. It is never reused.

use crate::error::{Error, IcapResult};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
}

impl Connection {
    /// Open a TCP connection to `host:port`.
    pub async fn connect(host: &str, port: u16) -> IcapResult<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|source| Error::Connection {
                host: host.to_string(),
                port,
                source,
            })?;
        debug!("connected to {}:{}", host, port);
        Ok(Self { stream })
    }

    /// Write all of `bytes` and flush.
    pub async fn send(&mut self, bytes: &[u8]) -> IcapResult<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        trace!("sent {} bytes", bytes.len());
        Ok(())
    }

    /// Read until the peer closes the connection.
    pub async fn receive_all(&mut self) -> IcapResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        trace!("received {} bytes", out.len());
        Ok(out)
    }

    /// Shut the connection down. Failures are logged and otherwise ignored.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!("shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_refused_reports_endpoint() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = Connection::connect("127.0.0.1", port).await.unwrap_err();
        match err {
            Error::Connection { host, port: p, .. } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(p, port);
            }
            other => panic!("expected connection error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_then_receive_until_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            sock.read_exact(&mut buf).await.unwrap();
            sock.write_all(b"echo:").await.unwrap();
            sock.write_all(&buf).await.unwrap();
            sock.shutdown().await.unwrap();
        });

        let mut conn = Connection::connect("127.0.0.1", addr.port()).await.unwrap();
        conn.send(b"hello").await.unwrap();
        let got = conn.receive_all().await.unwrap();
        conn.close().await;
        server.await.unwrap();

        assert_eq!(got, b"echo:hello");
    }
}
