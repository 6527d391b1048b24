//! Certificate/key loading for the TLS acceptor.

use std::io::BufReader;
use std::sync::Arc;

use tokio_rustls::rustls;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::TlsAcceptor;

#[derive(Debug, thiserror::Error)]
pub enum TlsConfigError {
    #[error("reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificates found in '{0}'")]
    NoCertificates(String),
    #[error("no private key found in '{0}'")]
    NoPrivateKey(String),
    #[error(transparent)]
    Rustls(#[from] rustls::Error),
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, TlsConfigError> {
    let file = std::fs::File::open(path).map_err(|source| TlsConfigError::Io {
        path: path.to_owned(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsConfigError::NoCertificates(path.to_owned()));
    }
    Ok(certs)
}

/// Expects an unencrypted PKCS8/SEC1/PKCS1 private key. `rustls-pemfile`
/// has no decryption support, so a key protected by `ServerConfig`'s
/// `password` (the original's `boost::asio::ssl::context` PEM passphrase)
/// cannot be loaded here; such a key must be decrypted to disk ahead of
/// time.
fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>, TlsConfigError> {
    let file = std::fs::File::open(path).map_err(|source| TlsConfigError::Io {
        path: path.to_owned(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsConfigError::Io {
            path: path.to_owned(),
            source,
        })?
        .ok_or_else(|| TlsConfigError::NoPrivateKey(path.to_owned()))
}

/// Build a `TlsAcceptor` from PEM certificate chain and private key files.
/// `tmp_dh_file` is accepted by configuration for format compatibility but
/// is not consumed here — rustls negotiates its own cipher suites.
pub fn build_acceptor(
    certificate_chain_file: &str,
    private_key_file: &str,
) -> Result<TlsAcceptor, TlsConfigError> {
    let certs = load_certs(certificate_chain_file)?;
    let key = load_private_key(private_key_file)?;

    let config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}
