//! Shadow - minimal HTTP/1.1 server
//!
//! A keep-alive HTTP/1.1 server that parses requests straight off the byte
//! stream, plus the tracking beacon application it was built to serve.

pub mod beacon;
pub mod config;
pub mod http;
pub mod server;

/// Name used in protocol error messages.
pub const SERVER_NAME: &str = "shadow";

/// Value of the `server` header on every response.
pub const SERVER_TOKEN: &str = concat!("shadow/", env!("CARGO_PKG_VERSION"));
