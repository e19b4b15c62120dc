//! Implementation of the `trestle new` command.
//!
//! Responsibility: turn CLI arguments into overrides and options, wire the
//! local adapters into the engine, and print the report. No generation logic
//! lives here.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use trestle_adapters::{CargoManifestWriter, LocalFilesystem, ManifestLoader, SystemProcessRunner};
use trestle_core::{
    application::{
        CachedLoader, CancellationToken, CatalogService, GenerationOptions, GenerationService,
    },
    domain::{Overrides, Value},
};

use crate::{
    cli::{NewArgs, global::GlobalArgs},
    config::AppConfig,
    error::{CliError, CliResult},
    output::OutputManager,
};

/// Execute `trestle new`.
///
/// The report is always printed; a run that did not complete is then turned
/// into [`CliError::GenerationIncomplete`] so the exit code reflects it.
#[instrument(skip_all, fields(blueprint = %args.blueprint))]
pub fn execute(
    args: NewArgs,
    _global: GlobalArgs,
    config: AppConfig,
    output: OutputManager,
) -> CliResult<()> {
    let catalog = config.catalog_dir(args.catalog.as_deref());
    if !catalog.is_dir() {
        return Err(CliError::CatalogMissing { path: catalog });
    }

    let output_dir = absolute(&args.output)?;
    let overrides = overrides(&args.set);
    let options = options(&args, &config);

    let catalog_service = CatalogService::new(Box::new(CachedLoader::new(ManifestLoader::new(
        &catalog,
    ))));
    let blueprint = catalog_service.load(&args.blueprint)?;

    info!(
        id = %blueprint.id,
        output = %output_dir.display(),
        overrides = overrides.len(),
        "Generating"
    );

    let service = GenerationService::new(
        Box::new(LocalFilesystem::new()),
        Box::new(SystemProcessRunner::new()),
    )
    .with_manifest_writer(Box::new(CargoManifestWriter::new()))
    .with_options(options);

    let result = service.generate(&blueprint, &overrides, &output_dir, &CancellationToken::new());
    output.report(&result)?;

    if result.is_success() {
        Ok(())
    } else {
        Err(CliError::GenerationIncomplete {
            blueprint: result.blueprint.to_string(),
            status: result.status,
        })
    }
}

/// `--set` values arrive as strings; the resolver coerces them to each
/// variable's declared kind. Later duplicates win.
fn overrides(pairs: &[(String, String)]) -> Overrides {
    pairs
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect()
}

/// Config values with CLI flags layered on top.
fn options(args: &NewArgs, config: &AppConfig) -> GenerationOptions {
    let mut options = config.generation_options();
    if let Some(secs) = args.hook_timeout {
        options.hook_timeout = std::time::Duration::from_secs(secs);
    }
    options.run_hooks &= !args.no_hooks;
    options.parallel &= !args.sequential;
    options.overwrite |= args.force;
    options
}

fn absolute(path: &Path) -> CliResult<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(CliError::InvalidInput {
            message: "output directory cannot be empty".into(),
        });
    }
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
