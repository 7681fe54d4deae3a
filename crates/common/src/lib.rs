//! Shared types for the mirrorfloor workspace: transforms and reflector configuration.

mod config;
mod types;

pub use config::{BlurConfig, ConfigError, ReflectorConfig};
pub use types::Transform;
