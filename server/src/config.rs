//! Server configuration loading.
//!
//! TOML is the sole config source; no environment variable overrides.
//! Default config path: `/etc/chat-server/server.toml`.
//!
//! # Required fields
//! - `server.certificate_chain_file`
//! - `server.private_key_file`

use serde::Deserialize;
use std::path::Path;

/// Default SYN/handshake deadline in milliseconds, per the handshake
/// timeout testable property.
pub const DEFAULT_SYN_TIMEOUT_MS: u64 = 128;
pub const DEFAULT_LISTEN_PORT: u16 = 15001;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_port: u16,
    /// The private key's PEM decryption passphrase, empty when the key is
    /// unencrypted. Accepted and carried for config-file compatibility with
    /// the original `boost::asio::ssl::context` password callback; not
    /// applied by `tls::build_acceptor`, since `rustls-pemfile` has no
    /// support for encrypted private keys (same limitation as
    /// `tmp_dh_file` below). It is not a SYN/ACK credential — the handshake
    /// key/accept echo carries no cryptographic meaning (spec.md §9).
    pub password: String,
    pub certificate_chain_file: String,
    pub private_key_file: String,
    /// Accepted and carried for config-format compatibility. Not consumed
    /// by rustls, which has no Diffie-Hellman params file concept.
    pub tmp_dh_file: Option<String>,
    pub syn_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    server: Option<RawServerConfig>,
}

#[derive(Debug, Deserialize)]
struct RawServerConfig {
    listen_port: Option<u16>,
    password: Option<String>,
    certificate_chain_file: Option<String>,
    private_key_file: Option<String>,
    tmp_dh_file: Option<String>,
    syn_timeout_ms: Option<u64>,
}

/// Load server config from a custom path.
pub fn load_config_from_path(path: &Path) -> Result<ServerConfig, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {}", path.display(), e)))?;
    load_config_from_str(&toml_str)
}

/// Load server config from the default path `/etc/chat-server/server.toml`.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
    load_config_from_path(Path::new("/etc/chat-server/server.toml"))
}

/// Load server config from a TOML string.
pub fn load_config_from_str(toml_str: &str) -> Result<ServerConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let raw_server = raw
        .server
        .ok_or_else(|| ConfigError::MissingField("server".to_owned()))?;

    let certificate_chain_file = raw_server
        .certificate_chain_file
        .ok_or_else(|| ConfigError::MissingField("server.certificate_chain_file".to_owned()))?;
    let private_key_file = raw_server
        .private_key_file
        .ok_or_else(|| ConfigError::MissingField("server.private_key_file".to_owned()))?;

    let listen_port = raw_server.listen_port.unwrap_or(DEFAULT_LISTEN_PORT);
    let syn_timeout_ms = raw_server.syn_timeout_ms.unwrap_or(DEFAULT_SYN_TIMEOUT_MS);
    if syn_timeout_ms == 0 {
        return Err(ConfigError::InvalidValue(
            "server.syn_timeout_ms must be non-zero".to_owned(),
        ));
    }

    Ok(ServerConfig {
        listen_port,
        password: raw_server.password.unwrap_or_default(),
        certificate_chain_file,
        private_key_file,
        tmp_dh_file: raw_server.tmp_dh_file,
        syn_timeout_ms,
    })
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    MissingField(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {}", s),
            ConfigError::Parse(s) => write!(f, "Parse error: {}", s),
            ConfigError::MissingField(s) => write!(f, "Missing required field: {}", s),
            ConfigError::InvalidValue(s) => write!(f, "Invalid config value: {}", s),
        }
    }
}

impl std::error::Error for ConfigError {}
