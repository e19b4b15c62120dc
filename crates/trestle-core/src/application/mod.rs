//! Application layer for Trestle.
//!
//! This layer contains:
//! - **Services**: Use case orchestration (GenerationService, CatalogService)
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Errors**: Application-specific error types
//!
//! The application layer coordinates the domain layer but contains no
//! business logic itself. All business rules live in `crate::domain`.

pub mod cancellation;
pub mod error;
pub mod ports;
pub mod services;

// Re-export main services
pub use services::{
    BlueprintInfo, // DTO for catalogue listings
    CachedLoader,
    CatalogListing,
    CatalogService,
    GenerationOptions,
    GenerationResult,
    GenerationService,
    GenerationStatus,
};

// Re-export port traits (for adapter implementation)
pub use ports::{BlueprintLoader, Filesystem, ManifestWriter, ProcessRunner};

pub use cancellation::CancellationToken;
pub use error::ApplicationError;
