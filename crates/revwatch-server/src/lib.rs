//! Process wiring for the revwatch server: configuration and the concrete
//! review connector and notifiers.

pub mod config;
pub mod notify;
pub mod source;

pub use config::ServerConfig;
