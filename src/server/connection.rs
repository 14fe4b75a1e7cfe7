use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info};

use crate::auth::Authorizer;
use crate::backend::Backend;
use crate::config::Settings;
use crate::error::Code;
use crate::interpreter;
use crate::protocol::{self, Command};
use crate::server::transport::Transport;
use crate::stats::Stats;

/// Shared, process-lifetime dependencies every connection task needs.
/// Cheap to clone: everything inside is an `Arc` or a `'static` ref.
#[derive(Clone)]
pub struct ConnectionContext {
    pub settings: &'static Settings,
    pub backend: Arc<dyn Backend>,
    pub stats: Arc<Stats>,
    pub tls_acceptor: Option<Arc<TlsAcceptor>>,
}

/// Drives one accepted socket through its whole lifetime: banner,
/// read-dispatch loop, optional mid-session TLS upgrade, and the
/// final `quit`/EOF/error close.
pub async fn handle(stream: TcpStream, ctx: ConnectionContext) {
    ctx.stats.connect();
    if let Err(e) = run(stream, &ctx).await {
        debug!(error = %e, "connection ended with error");
    }
    ctx.stats.disconnect();
}

async fn run(stream: TcpStream, ctx: &ConnectionContext) -> crate::error::Result<()> {
    let peer = stream.peer_addr().ok();
    let mut transport = Transport::plain(stream);
    protocol::write_banner(transport.io(), &ctx.settings.realm()).await?;

    let authorizer = Authorizer::new(&ctx.settings.rules);
    let mut pinned = None;

    loop {
        let line = match protocol::read_line(transport.io()).await? {
            Some(line) => line,
            None => break,
        };
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("starttls") {
            match &ctx.tls_acceptor {
                Some(acceptor) => {
                    transport = transport.upgrade_server(acceptor).await?;
                    info!(peer = ?peer, "connection upgraded to TLS");
                    continue;
                }
                None => {
                    // TLS disabled: falls through to an unknown command.
                    protocol::write_err(transport.io(), Code::Efault).await?;
                    continue;
                }
            }
        }

        let cmd = match protocol::parse(&line) {
            Ok(cmd) => cmd,
            Err(protocol::ParseError::UnknownFunc) => {
                protocol::write_err(transport.io(), Code::Efault).await?;
                continue;
            }
            Err(protocol::ParseError::MissingArgs) => {
                protocol::write_err(transport.io(), Code::Einval).await?;
                continue;
            }
        };

        match cmd {
            Command::Quit => {
                ctx.stats.unrestricted_command();
                protocol::write_bye(transport.io()).await?;
                break;
            }
            Command::ClientAuth(passwd) => {
                ctx.stats.unrestricted_command();
                match authorizer.client_auth(&passwd) {
                    Some(idx) => {
                        pinned = Some(idx);
                        protocol::write_ok(transport.io()).await?;
                    }
                    None => {
                        protocol::write_err(transport.io(), Code::Eperm).await?;
                    }
                }
            }
            restricted => {
                if !authorizer.authorized(pinned, &line) {
                    ctx.stats.access_denied();
                    protocol::write_err(transport.io(), Code::Eaccess).await?;
                    continue;
                }
                ctx.stats.restricted_command();
                interpreter::dispatch(restricted, ctx.backend.as_ref(), &ctx.stats, transport.io()).await?;
            }
        }
    }

    Ok(())
}
