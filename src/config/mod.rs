//! # Configuration
//!
//! Environment-driven configuration for the controller and its HTTP server.
//!
//! - `controller`: worker pool, retry, rate limiting and Ingress template settings
//! - `server`: metrics and probe server settings

pub mod controller;
pub mod server;

pub use controller::ControllerConfig;
pub use server::ServerConfig;
