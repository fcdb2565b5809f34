//! Core of the chess hub: connection registry, matchmaking, sessions and
//! message routing. Transport-agnostic; the server crate plugs WebSockets in
//! through the traits in [`transport`].

pub mod config;
pub mod connection;
pub mod error;
pub mod hub;
pub mod lobby;
pub mod matchmaker;
pub mod outbox;
pub mod protocol;
pub mod router;
pub mod session;
pub mod transport;

pub use config::ConnectionConfig;
pub use error::HubError;
pub use lobby::Lobby;
