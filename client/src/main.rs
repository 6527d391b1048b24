//! Reference chat client: connects over TLS, performs the handshake, then
//! reads lines from stdin and sends each as a `CHAT_MESSAGE` request,
//! printing every `Response` it observes.

use chat_client::{tls, Client};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let host = match args.next() {
        Some(host) => host,
        None => usage_and_exit(),
    };
    let port: u16 = match args.next().and_then(|p| p.parse().ok()) {
        Some(port) => port,
        None => usage_and_exit(),
    };
    let ca_file = match args.next() {
        Some(path) => path,
        None => usage_and_exit(),
    };

    let connector = match tls::build_connector(&ca_file) {
        Ok(connector) => connector,
        Err(err) => {
            eprintln!("FATAL: failed to load CA certificate '{ca_file}': {err}");
            std::process::exit(1);
        }
    };

    let addr = format!("{host}:{port}");
    let handshake_key = format!("cli-{}", std::process::id());
    let mut client = match Client::connect(&addr, &host, connector, &handshake_key).await {
        Ok(client) => client,
        Err(err) => {
            eprintln!("FATAL: failed to connect to {addr}: {err}");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "connected, waiting for handshake ack");
    match client.wait_for_response().await {
        Some(response) => tracing::info!(status = response.status, state = ?client.state(), "handshake complete"),
        None => {
            eprintln!("FATAL: connection closed during handshake");
            std::process::exit(1);
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                eprintln!("stdin read error: {err}");
                break;
            }
        };
        if line.is_empty() {
            continue;
        }
        if client.send_chat_message(&line).is_err() {
            eprintln!("connection closed");
            break;
        }
        match client.wait_for_response().await {
            Some(response) => print_response(&response),
            None => {
                eprintln!("connection closed");
                break;
            }
        }
    }
}

fn print_response(response: &chat_protocol::Response) {
    match &response.body {
        Some(body) => println!("[{}] {}", response.status, body),
        None => println!("[{}]", response.status),
    }
}

fn usage_and_exit() -> ! {
    eprintln!("usage: chat-client <host> <port> <ca-cert-file>");
    std::process::exit(1);
}
