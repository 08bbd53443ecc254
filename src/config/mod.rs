//! Configuration module for the archiver
//!
//! This module provides the `ArchiveConfig` struct, its type-safe builder and
//! the optional JSON file overlay.

// Sub-modules
pub mod builder;
pub mod file;
pub mod getters;
pub mod types;

// Re-exports for public API
pub use builder::{ArchiveConfigBuilder, Complete, WithLiveOrigin, WithWorkerOrigin};
pub use file::ConfigFile;
pub use types::ArchiveConfig;
