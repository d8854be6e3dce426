pub mod config;
pub mod error;
pub mod db;
pub mod store;
pub mod sync;
pub mod graph;
pub mod server;

pub use config::Config;
pub use error::{EcographError, Result};
pub use graph::{GraphBuilder, GraphPayload};
