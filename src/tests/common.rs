use std::sync::Arc;

use regex::Regex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

use crate::backend::nil::NilBackend;
use crate::backend::sql::SqlBackend;
use crate::backend::Backend;
use crate::config::{AuthRule, Settings};
use crate::server::connection::ConnectionContext;
use crate::server::listener::accept_loop;
use crate::stats::Stats;

/// Builds a `Settings` with sane test defaults: `Default::default()`
/// leaves `daemon.realm` blank (the `serde(default = ...)` fallbacks
/// only kick in for YAML deserialization, not plain `Default`), so the
/// banner has to be set explicitly here to carry `ustack` like a real
/// config would.
pub fn test_settings(rules: Vec<AuthRule>) -> &'static Settings {
    let mut settings = Settings::default();
    settings.daemon.realm = "+ OK ustackd test ready".to_string();
    settings.rules = rules;
    Box::leak(Box::new(settings))
}

pub fn rule(passwd: &str, allow: bool, pattern: &str) -> AuthRule {
    AuthRule {
        passwd: passwd.to_string(),
        allow,
        regex: Regex::new(pattern).unwrap(),
    }
}

/// Spins up a daemon listener backed by an in-process SQLite database
/// (a fresh `:memory:`-equivalent file in a temp dir, so tests never
/// collide with each other or a real deployment) and returns the
/// address clients should connect to plus a handle to shut it down.
pub async fn spawn_sqlite_server(settings: &'static Settings) -> (std::net::SocketAddr, Arc<Notify>, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("test.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.to_string_lossy());
    let backend = SqlBackend::connect(&url).await.expect("sqlite backend connect");
    let addr = spawn_with_backend(settings, Arc::new(backend)).await;
    (addr.0, addr.1, dir)
}

/// Same as [`spawn_sqlite_server`] but backed by [`NilBackend`], for
/// tests that only exercise the protocol/authorization layers.
pub async fn spawn_nil_server(settings: &'static Settings) -> (std::net::SocketAddr, Arc<Notify>) {
    spawn_with_backend(settings, Arc::new(NilBackend::new())).await
}

async fn spawn_with_backend(
    settings: &'static Settings,
    backend: Arc<dyn Backend>,
) -> (std::net::SocketAddr, Arc<Notify>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    let ctx = ConnectionContext {
        settings,
        backend,
        stats: Arc::new(Stats::new()),
        tls_acceptor: None,
    };
    let shutdown = Arc::new(Notify::new());
    let shutdown_task = shutdown.clone();
    tokio::spawn(async move {
        accept_loop(listener, ctx, shutdown_task).await;
    });
    (addr, shutdown)
}

pub async fn connect(addr: std::net::SocketAddr) -> tokio::io::BufStream<TcpStream> {
    let stream = TcpStream::connect(addr).await.expect("connect");
    tokio::io::BufStream::new(stream)
}

/// Sends one line, appending the CRLF terminator the protocol expects.
pub async fn send(io: &mut (impl tokio::io::AsyncWrite + Unpin), line: &str) {
    use tokio::io::AsyncWriteExt;
    io.write_all(line.as_bytes()).await.unwrap();
    io.write_all(b"\r\n").await.unwrap();
    io.flush().await.unwrap();
}

/// Reads one line, stripped of its CRLF/whitespace, panicking on EOF.
pub async fn recv(io: &mut (impl tokio::io::AsyncBufRead + Unpin)) -> String {
    crate::protocol::read_line(io).await.unwrap().expect("connection closed unexpectedly")
}
