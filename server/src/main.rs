use std::sync::Arc;

use chat_server::{config, room_service::RoomService, tls};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args().nth(1);
    let cfg = match config_path {
        Some(path) => config::load_config_from_path(std::path::Path::new(&path)),
        None => config::load_config(),
    };
    let cfg = match cfg {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("FATAL: failed to load config: {err}");
            std::process::exit(1);
        }
    };

    let tls_acceptor = match tls::build_acceptor(&cfg.certificate_chain_file, &cfg.private_key_file) {
        Ok(acceptor) => acceptor,
        Err(err) => {
            eprintln!("FATAL: failed to build TLS acceptor: {err}");
            std::process::exit(1);
        }
    };

    let addr = format!("0.0.0.0:{}", cfg.listen_port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("FATAL: failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "listening");

    let rooms = Arc::new(RoomService::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let accept_task = tokio::spawn(chat_server::acceptor::run(
        listener,
        tls_acceptor,
        Arc::clone(&rooms),
        cfg.syn_timeout_ms,
        shutdown_rx,
    ));

    shutdown_signal().await;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = accept_task.await;
    rooms.close();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
