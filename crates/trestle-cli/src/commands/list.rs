//! Implementation of the `trestle list` command.

use tracing::instrument;

use trestle_adapters::ManifestLoader;
use trestle_core::application::{CatalogListing, CatalogService};

use crate::{
    cli::{ListArgs, global::GlobalArgs},
    config::AppConfig,
    error::{CliError, CliResult},
    output::OutputManager,
};

#[instrument(skip_all)]
pub fn execute(
    args: ListArgs,
    _global: GlobalArgs,
    config: AppConfig,
    output: OutputManager,
) -> CliResult<()> {
    let catalog = config.catalog_dir(args.catalog.as_deref());
    if !catalog.is_dir() {
        return Err(CliError::CatalogMissing { path: catalog });
    }

    let service = CatalogService::new(Box::new(ManifestLoader::new(&catalog)));
    let listing = match &args.tag {
        Some(tag) => CatalogListing {
            blueprints: service.find_by_tag(tag)?,
            broken: Vec::new(),
        },
        None => service.list()?,
    };

    output.listing(&listing)
}
