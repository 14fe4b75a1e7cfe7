use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info};

use crate::server::connection::{self, ConnectionContext};

/// Accepts connections on one bound listener until told to shut down,
/// spawning a task per connection so accept never blocks on an
/// in-flight request.
pub async fn accept_loop(listener: TcpListener, ctx: ConnectionContext, shutdown: Arc<Notify>) {
    let local_addr = listener.local_addr().ok();
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        info!(?peer, listener = ?local_addr, "accepted connection");
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            connection::handle(stream, ctx).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, listener = ?local_addr, "accept failed");
                    }
                }
            }
            _ = shutdown.notified() => {
                info!(listener = ?local_addr, "listener shutting down");
                return;
            }
        }
    }
}
