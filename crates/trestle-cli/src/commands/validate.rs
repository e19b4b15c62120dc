//! Implementation of the `trestle validate` command.

use tracing::{debug, instrument};

use trestle_adapters::ManifestLoader;
use trestle_core::application::BlueprintInfo;

use crate::{
    cli::{ValidateArgs, global::GlobalArgs},
    error::{CliError, CliResult},
    output::OutputManager,
};

/// Load one blueprint directory; any structural problem becomes the error.
#[instrument(skip_all, fields(dir = %args.dir.display()))]
pub fn execute(args: ValidateArgs, _global: GlobalArgs, output: OutputManager) -> CliResult<()> {
    if !args.dir.join("blueprint.toml").is_file() {
        return Err(CliError::InvalidInput {
            message: format!("{} does not contain a blueprint.toml", args.dir.display()),
        });
    }

    let blueprint = ManifestLoader::load_dir(&args.dir)?;
    debug!(id = %blueprint.id, "Blueprint is valid");

    output.blueprint_summary(&BlueprintInfo::from(&blueprint))
}
