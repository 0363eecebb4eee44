//! Shared types for the order hub
//!
//! Types used by the server and its clients: error codes and response
//! structures, the order model and the live push protocol.

pub mod error;
pub mod live;
pub mod order;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
