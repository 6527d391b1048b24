use std::sync::Arc;

use chat_server::room_service::RoomService;
use chat_protocol::{drain_frames, encode_request, parse_frame, Frame, QueryKind, Request, Response};
use rcgen::generate_simple_self_signed;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::{rustls, TlsConnector};

pub struct TestServer {
    pub addr: std::net::SocketAddr,
    pub rooms: Arc<RoomService>,
    shutdown_tx: watch::Sender<bool>,
}

impl TestServer {
    pub async fn start() -> (Self, TlsConnector) {
        let certified = generate_simple_self_signed(vec!["localhost".to_owned()]).unwrap();
        let cert_der = certified.cert.der().clone();
        let key_der = certified.key_pair.serialize_der();

        let server_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(
                vec![cert_der.clone()],
                rustls::pki_types::PrivateKeyDer::Pkcs8(key_der.into()),
            )
            .unwrap();
        let tls_acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(server_config));

        let mut roots = rustls::RootCertStore::empty();
        roots.add(cert_der).unwrap();
        let client_config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let tls_connector = TlsConnector::from(Arc::new(client_config));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let rooms = Arc::new(RoomService::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(chat_server::acceptor::run(
            listener,
            tls_acceptor,
            Arc::clone(&rooms),
            200,
            shutdown_rx,
        ));

        (
            TestServer {
                addr,
                rooms,
                shutdown_tx,
            },
            tls_connector,
        )
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

pub struct TestClient {
    stream: tokio_rustls::client::TlsStream<TcpStream>,
    buf: Vec<u8>,
}

impl TestClient {
    pub async fn connect(addr: std::net::SocketAddr, connector: &TlsConnector) -> Self {
        let tcp = TcpStream::connect(addr).await.unwrap();
        let server_name = ServerName::try_from("localhost").unwrap();
        let stream = connector.connect(server_name, tcp).await.unwrap();
        TestClient {
            stream,
            buf: Vec::new(),
        }
    }

    pub async fn send(&mut self, request: &Request) {
        use tokio::io::AsyncWriteExt;
        let encoded = encode_request(request);
        self.stream.write_all(encoded.as_bytes()).await.unwrap();
    }

    pub async fn recv_response(&mut self) -> Response {
        loop {
            if let Some(frame_json) = drain_one(&mut self.buf) {
                match parse_frame(&frame_json).unwrap() {
                    Frame::Response(resp) => return resp,
                    other => panic!("expected Response, got {other:?}"),
                }
            }
            self.read_more().await;
        }
    }

    /// Read directly off the underlying stream, bypassing frame parsing.
    /// Used to observe the connection closing (a `0`-byte read) once the
    /// server has shut it down.
    pub async fn read_raw(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        use tokio::io::AsyncReadExt;
        self.stream.read(buf).await
    }

    async fn read_more(&mut self) {
        use tokio::io::AsyncReadExt;
        let mut chunk = [0u8; 4096];
        let n = tokio::time::timeout(std::time::Duration::from_secs(5), self.stream.read(&mut chunk))
            .await
            .expect("timed out waiting for response")
            .unwrap();
        assert!(n > 0, "connection closed before a full frame arrived");
        self.buf.extend_from_slice(&chunk[..n]);
    }
}

fn drain_one(buf: &mut Vec<u8>) -> Option<String> {
    drain_frames(buf).pop_front()
}

pub fn request(kind: QueryKind, body: Option<serde_json::Value>) -> Request {
    Request {
        kind,
        timestamp: 0,
        timeout_ms: 0,
        body,
    }
}
