//! Application ports (traits) for external dependencies.
//!
//! In hexagonal architecture, ports define interfaces that the application
//! needs from the outside world. Adapters in `trestle-adapters` implement these.
//!
//! ## Port Types
//!
//! - **Driven (Output) Ports**: Called by application, implemented by infrastructure
//!   - `Filesystem`: file and directory operations
//!   - `ProcessRunner`: hook execution
//!   - `ManifestWriter`: dependency manifest updates
//!   - `BlueprintLoader`: blueprint lookup and catalogue listing
//!
//! - **Driving (Input) Ports**: Called by external world, implemented by application
//!   - (Defined in CLI layer, implemented by services)

pub mod output;

pub use output::{
    BlueprintLoader, CommandSpec, Filesystem, ManifestWriter, ProcessOutput, ProcessRunner,
    Termination,
};
