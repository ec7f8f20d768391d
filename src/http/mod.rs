//! HTTP protocol implementation.
//!
//! This module implements an HTTP/1.1 server with support for keep-alive
//! connections, parsing requests directly off the byte stream.
//!
//! # Architecture
//!
//! - **`grammar`**: Anchored matchers for request lines and header lines
//! - **`request`**: The request type and the line-by-line `RequestParser`
//! - **`response`**: Response representation with builder pattern
//! - **`writer`**: Serializes and writes responses to the client
//! - **`connection`**: The per-connection request-response state machine
//! - **`handler`**: The contract between the connection and the application
//! - **`error`**: Protocol errors that end a connection
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Lines, then content-length bytes
//!        └──────┬──────┘
//!               │ Request parsed          │ Protocol error
//!               ▼                         │
//!        ┌──────────────────┐             │
//!        │   Processing     │ ← Handler   │
//!        └──────┬───────────┘             │
//!               │ Response ready          │
//!               ▼                         ▼
//!        ┌──────────────────────────────────┐
//!        │    Writing                       │
//!        └──────┬───────────────────────────┘
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close / error → Closed
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use shadow::http::connection::{Connection, Limits};
//! use shadow::http::response::Response;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8000").await?;
//!     let handler = Arc::new(|_req| async { Response::ok("text/plain", "hello") });
//!
//!     loop {
//!         let (socket, peer) = listener.accept().await?;
//!         let handler = handler.clone();
//!         tokio::spawn(async move {
//!             let mut conn = Connection::new(socket, peer, handler, Limits::default());
//!             if let Err(e) = conn.run().await {
//!                 eprintln!("Connection error: {}", e);
//!             }
//!         });
//!     }
//! }
//! ```

pub mod connection;
pub mod error;
pub mod grammar;
pub mod handler;
pub mod request;
pub mod response;
pub mod writer;
