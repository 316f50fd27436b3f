pub mod app;
pub mod bundler;
pub mod cli;
pub mod config;
pub mod error;
pub mod loader;
pub mod security;

pub use error::{ArtError, Result};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
