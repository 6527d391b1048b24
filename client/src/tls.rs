//! Root-of-trust loading for the client's TLS connector.
//!
//! Mirrors `chat_server::tls`'s certificate loading, the other end of the
//! same PEM-handling idiom.

use std::io::BufReader;
use std::sync::Arc;

use tokio_rustls::rustls;
use tokio_rustls::TlsConnector;

use crate::errors::ClientError;

/// Build a `TlsConnector` that trusts only the certificates in `ca_file`.
pub fn build_connector(ca_file: &str) -> Result<TlsConnector, ClientError> {
    let file = std::fs::File::open(ca_file)?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(ClientError::InvalidCertificate(ca_file.to_owned()));
    }

    let mut roots = rustls::RootCertStore::empty();
    for cert in certs {
        roots
            .add(cert)
            .map_err(|_| ClientError::InvalidCertificate(ca_file.to_owned()))?;
    }

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}
