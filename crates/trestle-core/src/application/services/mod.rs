//! Application services - orchestrate use cases.
//!
//! Services coordinate the domain layer and ports to accomplish
//! high-level use cases like "generate a project" or "list the catalogue".

pub mod cached_loader;
pub mod catalog_service;
pub mod generation_service;
pub mod report;

pub use cached_loader::CachedLoader;
pub use catalog_service::{BlueprintInfo, BrokenBlueprint, CatalogListing, CatalogService};
pub use generation_service::{GenerationOptions, GenerationService};
pub use report::{
    GenerationError, GenerationResult, GenerationStatus, HookOutcome, HookStatus, Stage,
    WrittenFile,
};
