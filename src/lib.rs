pub mod cluster;
pub mod command;
pub mod error;
pub mod protocol;
pub mod server;

pub use cluster::RouteClient;
pub use error::{Result, RouterError};
pub use server::ProxyServer;
