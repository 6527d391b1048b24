pub mod connection;
pub mod errors;
pub mod outbound;
pub mod tls;

pub use connection::{Client, ClientState};
pub use errors::ClientError;
