//! oystehr-transport: Transport collaborator
//!
//! This crate provides the authenticated HTTP exchange used by the client:
//! - `Transport` trait: one request in, raw response bytes out
//! - `HttpTransport`: reqwest implementation with bearer auth and project header
//! - `TokenProvider` trait with static and client-credentials implementations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             oystehr-transport                │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs - Transport trait definition     │
//! │  http.rs   - reqwest implementation         │
//! │  auth.rs   - Bearer token providers         │
//! └─────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod error;
pub mod http;
pub mod traits;

// Re-export commonly used types
pub use auth::{ClientCredentials, StaticToken, TokenProvider};
pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
pub use traits::Transport;
