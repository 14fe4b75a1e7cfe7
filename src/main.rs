use std::sync::Arc;

use tokio::runtime::Builder;
use tokio::sync::Notify;
use tracing::{error, info, info_span};
use tracing_subscriber::FmtSubscriber;

use ustackd::config::load_config;
use ustackd::server::Service;

fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(tracing::Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let _span = info_span!("startup").entered();

    let settings = match load_config("ustackd.yaml") {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "could not load config");
            std::process::exit(1);
        }
    };

    let tokio = Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("could not create tokio runtime");

    tokio.block_on(async move {
        let service = match Service::new(settings).await {
            Ok(service) => service,
            Err(e) => {
                error!(error = %e, "could not start server");
                std::process::exit(1);
            }
        };

        let shutdown = Arc::new(Notify::new());
        let shutdown_signal = shutdown.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
            shutdown_signal.notify_waiters();
        });

        if let Err(e) = service.run(shutdown).await {
            error!(error = %e, "server exited with error");
            std::process::exit(1);
        }
    });
}
