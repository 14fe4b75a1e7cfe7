//! Scenario 6: `starttls` mid-session, covering the TLS upgrade path on
//! both `server::transport::Transport` and `client::Client`.

use std::sync::Arc;

use test_env_log::test;
use tokio::net::TcpListener;
use tokio_rustls::TlsConnector;

use crate::backend::nil::NilBackend;
use crate::client::Client;
use crate::server::connection::ConnectionContext;
use crate::server::listener::accept_loop;
use crate::server::transport;
use crate::stats::Stats;
use crate::tests::common::test_settings;

/// Self-signed cert/key pair for `localhost`, written to a temp dir so
/// [`transport::load_server_config`]/[`transport::load_client_config`]
/// (which both read from paths) can load them the same way they would
/// in production from `ssl.cert`/`ssl.key`.
fn self_signed_cert(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).expect("generate cert");
    let cert_path = dir.join("cert.pem");
    let key_path = dir.join("key.pem");
    std::fs::write(&cert_path, cert.serialize_pem().expect("serialize cert")).unwrap();
    std::fs::write(&key_path, cert.serialize_private_key_pem()).unwrap();
    (cert_path, key_path)
}

#[test(tokio::test)]
async fn scenario_6_starttls_upgrade() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (cert_path, key_path) = self_signed_cert(dir.path());

    let server_config = transport::load_server_config(
        cert_path.to_str().unwrap(),
        key_path.to_str().unwrap(),
    )
    .expect("server tls config");
    let acceptor = Arc::new(tokio_rustls::TlsAcceptor::from(server_config));

    let settings = test_settings(vec![]);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ctx = ConnectionContext {
        settings,
        backend: Arc::new(NilBackend::new()),
        stats: Arc::new(Stats::new()),
        tls_acceptor: Some(acceptor),
    };
    let shutdown = Arc::new(tokio::sync::Notify::new());
    tokio::spawn(accept_loop(listener, ctx, shutdown));

    let client = Client::connect(&addr.to_string()).await.expect("connect");

    let client_config = transport::load_client_config(cert_path.to_str().unwrap()).expect("client tls config");
    let connector = TlsConnector::from(client_config);
    let domain = rustls::ServerName::try_from("localhost").unwrap();
    client.start_tls(&connector, domain).await.expect("tls upgrade");

    let uid = client.create_user("d", "p").await.expect("create over tls");
    assert_eq!(uid, 0); // NilBackend always reports uid 0
}

#[test(tokio::test)]
async fn starttls_is_unknown_command_when_tls_disabled() {
    use crate::tests::common::{connect, recv, send, spawn_nil_server};

    let settings = test_settings(vec![]);
    let (addr, _shutdown) = spawn_nil_server(settings).await;
    let mut io = connect(addr).await;
    recv(&mut io).await;

    send(&mut io, "starttls").await;
    assert_eq!(recv(&mut io).await, "- EFAULT");
}
