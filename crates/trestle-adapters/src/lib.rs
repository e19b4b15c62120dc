//! Infrastructure adapters for Trestle.
//!
//! This crate implements the ports defined in `trestle-core::application::ports`.
//! It contains all external dependencies and I/O operations.

pub mod blueprint_loader;
pub mod catalog;
pub mod filesystem;
pub mod manifest;
pub mod process;

// Re-export commonly used adapters
pub use blueprint_loader::ManifestLoader;
pub use catalog::InMemoryCatalog;
pub use filesystem::{LocalFilesystem, MemoryFilesystem};
pub use manifest::CargoManifestWriter;
pub use process::{ScriptedProcessRunner, ScriptedResponse, SystemProcessRunner};
