//! Trestle Core - Hexagonal Architecture Implementation
//!
//! This crate provides the domain and application layers for the Trestle
//! blueprint engine, following hexagonal (ports and adapters) architecture.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           trestle-cli (CLI)             │
//! │     (Implements Driving Ports)          │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Application Services            │
//! │  (GenerationService, CatalogService)    │
//! │         Orchestrates Use Cases          │
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │      Application Ports (Traits)         │
//! │ (Filesystem, ProcessRunner, Manifest,   │
//! │  BlueprintLoader)                       │
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │    trestle-adapters (Infrastructure)    │
//! │ (LocalFilesystem, SystemProcessRunner,  │
//! │  CargoManifestWriter, ManifestLoader)   │
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Domain Layer (Pure Logic)       │
//! │ (Blueprint, Expression, Template,       │
//! │  ResolvedVariables, dependency merge)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use trestle_core::prelude::*;
//!
//! // 1. Load a blueprint through any BlueprintLoader
//! let blueprint = catalog.load("rust-service")?;
//!
//! // 2. Use the application service (with injected adapters)
//! let service = GenerationService::new(filesystem, process_runner)
//!     .with_manifest_writer(manifest_writer);
//!
//! let mut overrides = Overrides::new();
//! overrides.insert("project_name".into(), "my-app".into());
//!
//! let result = service.generate(&blueprint, &overrides, "./my-app", &CancellationToken::new());
//! assert!(result.is_success());
//! ```

pub mod domain;

pub mod application;

pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        BlueprintInfo, CachedLoader, CancellationToken, CatalogService, GenerationOptions,
        GenerationResult, GenerationService, GenerationStatus,
        ports::{BlueprintLoader, Filesystem, ManifestWriter, ProcessRunner},
    };
    pub use crate::domain::{
        Architecture, Blueprint, BlueprintBuilder, BlueprintId, BlueprintMetadata, Expression,
        Overrides, ResolvedVariables, Template, Value, VariableKind, VariableSpec,
    };
    pub use crate::error::{TrestleError, TrestleResult};
}

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
