use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, BufStream};
use tokio::net::TcpStream;
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::error::Result;

/// Anything that can stand in for a plain or TLS-wrapped TCP stream.
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

/// A connection's socket, buffered for both directions like the
/// classic `bufio.Reader`/`bufio.Writer` pair, but able to be replaced
/// in place by a TLS-wrapped stream mid-session.
///
/// `BufStream::into_inner` drops any unread bytes still sitting in the
/// read buffer, which is exactly what a `starttls` upgrade needs: a
/// pipelined command sent before the TLS handshake must never survive
/// into the encrypted session.
pub struct Transport {
    io: BufStream<Box<dyn Stream>>,
}

impl Transport {
    pub fn plain(stream: TcpStream) -> Self {
        Transport {
            io: BufStream::new(Box::new(stream)),
        }
    }

    pub fn io(&mut self) -> &mut BufStream<Box<dyn Stream>> {
        &mut self.io
    }

    /// Consumes the plain transport, performs the TLS server handshake,
    /// and returns a transport backed by the encrypted stream.
    pub async fn upgrade_server(self, acceptor: &TlsAcceptor) -> Result<Transport> {
        let inner = self.io.into_inner();
        let tls_stream = acceptor.accept(inner).await?;
        Ok(Transport {
            io: BufStream::new(Box::new(tls_stream)),
        })
    }

    /// Client-side equivalent, used by [`crate::client::Client::start_tls`].
    /// Takes `&mut self` rather than consuming, since callers hold the
    /// transport behind a mutex guard and can't move out of it; a
    /// throwaway zero-capacity duplex stands in as the swapped-out
    /// placeholder just long enough to extract the real inner stream.
    pub async fn upgrade_client_in_place(&mut self, connector: &TlsConnector, domain: rustls::ServerName) -> Result<()> {
        let (placeholder, _unused) = tokio::io::duplex(1);
        let old = std::mem::replace(
            self,
            Transport {
                io: BufStream::new(Box::new(placeholder)),
            },
        );
        let inner = old.io.into_inner();
        let tls_stream = connector.connect(domain, inner).await?;
        *self = Transport {
            io: BufStream::new(Box::new(tls_stream)),
        };
        Ok(())
    }
}

/// Loads a rustls `ServerConfig` from a PEM certificate chain and key
/// pair, per the `ssl.cert`/`ssl.key` configuration entries.
pub fn load_server_config(cert_path: &str, key_path: &str) -> Result<Arc<rustls::ServerConfig>> {
    let cert_file = std::fs::File::open(cert_path)?;
    let mut cert_reader = std::io::BufReader::new(cert_file);
    let certs = rustls_pemfile::certs(&mut cert_reader)?
        .into_iter()
        .map(rustls::Certificate)
        .collect();

    let key_file = std::fs::File::open(key_path)?;
    let mut key_reader = std::io::BufReader::new(key_file);
    let mut keys = rustls_pemfile::pkcs8_private_keys(&mut key_reader)?;
    let key = rustls::PrivateKey(keys.remove(0));

    let config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(Arc::new(config))
}

/// Builds a client TLS config trusting the single pinned certificate
/// at `cert_path`, used by the proxy backend to dial an upstream
/// daemon without relying on a public CA chain.
pub fn load_client_config(cert_path: &str) -> Result<Arc<rustls::ClientConfig>> {
    let cert_file = std::fs::File::open(cert_path)?;
    let mut cert_reader = std::io::BufReader::new(cert_file);
    let certs = rustls_pemfile::certs(&mut cert_reader)?;

    let mut roots = rustls::RootCertStore::empty();
    for cert in certs {
        roots
            .add(&rustls::Certificate(cert))
            .map_err(|e| crate::error::Error::new(e.to_string()))?;
    }

    let config = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Arc::new(config))
}
