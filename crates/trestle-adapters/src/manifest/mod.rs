//! Manifest writer adapters.

mod cargo;

pub use cargo::CargoManifestWriter;
