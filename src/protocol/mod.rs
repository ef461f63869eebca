//! docchat Protocol
//!
//! Client-server communication over HTTP.
//!
//! # Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |                     docchat Protocol                        |
//! +-------------------------------------------------------------+
//! |  HTTP Endpoints:                                            |
//! |    - /health: health check                                  |
//! |    - /sessions: session init / removal                      |
//! |    - /sessions/:id/files: list, upload, delete documents    |
//! |    - /sessions/:id/chat: question answering                 |
//! +-------------------------------------------------------------+
//! |  Wire Format: JSON envelope, raw bytes for uploads          |
//! +-------------------------------------------------------------+
//! ```
//!
//! # Module Structure
//!
//! - `handler` - Handler wrapping the chat service with server counters
//! - `rest` - REST API handlers and routing

pub mod handler;
pub mod rest;

pub use handler::Handler;

/// Default HTTP server port
pub const DEFAULT_PORT: u16 = 8080;

/// Default maximum upload size (32 MB)
pub const MAX_UPLOAD_SIZE: usize = 32 * 1024 * 1024;
