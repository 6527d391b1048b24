pub mod acceptor;
pub mod chatroom;
pub mod config;
pub mod connection;
pub mod errors;
pub mod executors;
pub mod outbound;
pub mod request_queue;
pub mod room_service;
pub mod session;
pub mod tls;

pub use config::ServerConfig;
pub use room_service::RoomService;
