pub mod config;
pub mod error;
pub mod entity;
pub mod source;
pub mod cache;
pub mod graph;
pub mod discovery;
pub mod materialize;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{KgbridgeError, Result};
pub use discovery::{discover, DiscoveryContext, DiscoveryRequest, DiscoveryResult, DiscoverySettings};
pub use materialize::GraphPayload;
pub use source::{HttpRelationshipSource, RelationshipSource};
