use std::sync::Arc;

use tokio::net::TcpSocket;
use tokio::sync::Notify;
use tracing::{error, info, info_span};

use crate::backend::nil::NilBackend;
use crate::backend::proxy::ProxyBackend;
use crate::backend::sql::SqlBackend;
use crate::backend::Backend;
use crate::config::{Settings, LISTEN_BACKLOG};
use crate::error::{Error, Result};
use crate::server::connection::ConnectionContext;
use crate::server::listener;
use crate::server::transport;
use crate::stats::Stats;

/// Owns every listener the daemon binds, the shared backend handle and
/// stats, and drives accept loops until asked to shut down.
///
/// Mirrors spec.md §4.7: one listener per `daemon.listen` address, one
/// task per accept loop, a single shutdown signal that tears all of
/// them down together.
pub struct Service {
    settings: &'static Settings,
    ctx: ConnectionContext,
}

impl Service {
    pub async fn new(settings: &'static Settings) -> Result<Self> {
        let backend = build_backend(settings).await?;
        let tls_acceptor = if settings.ssl.enabled {
            let config = transport::load_server_config(&settings.ssl.cert, &settings.ssl.key)?;
            Some(Arc::new(tokio_rustls::TlsAcceptor::from(config)))
        } else {
            None
        };

        Ok(Service {
            settings,
            ctx: ConnectionContext {
                settings,
                backend,
                stats: Arc::new(Stats::new()),
                tls_acceptor,
            },
        })
    }

    /// Binds every configured address and runs until `shutdown` fires,
    /// e.g. triggered by the process receiving Ctrl-C.
    pub async fn run(&self, shutdown: Arc<Notify>) -> Result<()> {
        let _span = info_span!("server").entered();
        let mut handles = Vec::with_capacity(self.settings.daemon.listen.len());
        for addr in &self.settings.daemon.listen {
            let listener = bind_with_backlog(addr)?;
            info!(addr = %addr, "listening");
            let ctx = self.ctx.clone();
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                listener::accept_loop(listener, ctx, shutdown).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "listener task panicked");
            }
        }
        Ok(())
    }
}

/// Binds `addr` with a listen backlog of [`LISTEN_BACKLOG`] instead of
/// the platform default `TcpListener::bind` uses.
fn bind_with_backlog(addr: &str) -> Result<tokio::net::TcpListener> {
    let addr = addr.parse()?;
    let sock = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    sock.bind(addr)?;
    Ok(sock.listen(LISTEN_BACKLOG)?)
}

/// Selects and connects the configured backend by its `daemon.backend`
/// tag. An unknown tag is already rejected at config-load time
/// ([`Settings::load`]); this only has to handle the five valid ones.
async fn build_backend(settings: &'static Settings) -> Result<Arc<dyn Backend>> {
    match settings.daemon.backend.as_str() {
        "sqlite" => Ok(Arc::new(SqlBackend::connect(&settings.sqlite.url).await?)),
        "mysql" => Ok(Arc::new(SqlBackend::connect(&settings.mysql.url).await?)),
        "postgres" => Ok(Arc::new(SqlBackend::connect(&settings.postgres.url).await?)),
        "proxy" => Ok(Arc::new(ProxyBackend::connect(&settings.proxy).await?)),
        "nil" => Ok(Arc::new(NilBackend::new())),
        other => Err(Error::new(format!("unknown daemon.backend '{}'", other))),
    }
}
