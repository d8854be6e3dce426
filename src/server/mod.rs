//! HTTP surface: REST API, SSE update stream and the subscriber registry.

pub mod http;
pub mod updates;

pub use http::ApiServer;
pub use updates::{GraphUpdate, UpdateRegistry};
