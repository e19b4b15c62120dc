//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value parsing.  No business logic lives here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub mod global;
pub use global::{GlobalArgs, OutputFormat};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "trestle",
    bin_name = "trestle",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "Generate projects from versioned blueprints",
    long_about = "Trestle renders a blueprint (files, dependencies and \
                  post-generation hooks) into a new project directory.",
    after_help = "EXAMPLES:\n\
        \x20 trestle new rust-service ./my-api --set project_name=my-api\n\
        \x20 trestle list --catalog ./blueprints\n\
        \x20 trestle validate ./blueprints/rust-service",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a project from a blueprint.
    #[command(
        visible_alias = "n",
        after_help = "EXAMPLES:\n\
            \x20 trestle new rust-service ./my-api --set project_name=my-api\n\
            \x20 trestle new rust-service ./my-api --set with_db=true --no-hooks\n\
            \x20 trestle new rust-service ./existing --force --sequential"
    )]
    New(NewArgs),

    /// List the blueprints in a catalogue.
    #[command(visible_alias = "ls")]
    List(ListArgs),

    /// Load a single blueprint directory and report structural errors.
    Validate(ValidateArgs),
}

// ── trestle new ───────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct NewArgs {
    /// Blueprint name inside the catalogue.
    #[arg(value_name = "BLUEPRINT")]
    pub blueprint: String,

    /// Directory to generate into.
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Variable override; repeatable.
    #[arg(
        short = 's',
        long = "set",
        value_name = "KEY=VALUE",
        value_parser = parse_override,
    )]
    pub set: Vec<(String, String)>,

    /// Catalogue directory (overrides `catalog.dir` from config).
    #[arg(long, value_name = "DIR")]
    pub catalog: Option<PathBuf>,

    /// Skip post-generation hooks.
    #[arg(long)]
    pub no_hooks: bool,

    /// Default per-hook timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub hook_timeout: Option<u64>,

    /// Allow writing into an existing output directory.
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Render files on the calling thread instead of the rayon pool.
    #[arg(long)]
    pub sequential: bool,
}

// ── trestle list ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Catalogue directory (overrides `catalog.dir` from config).
    #[arg(long, value_name = "DIR")]
    pub catalog: Option<PathBuf>,

    /// Only show blueprints carrying this tag.
    #[arg(short = 't', long, value_name = "TAG")]
    pub tag: Option<String>,
}

// ── trestle validate ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Blueprint directory containing `blueprint.toml`.
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,
}

/// Split `KEY=VALUE` at the first `=`.
fn parse_override(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing variable name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn override_splits_on_first_equals() {
        assert_eq!(
            parse_override("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_override("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
    }

    #[test]
    fn override_requires_key_and_equals() {
        assert!(parse_override("novalue").is_err());
        assert!(parse_override("=x").is_err());
    }

    #[test]
    fn new_collects_repeated_overrides() {
        let cli = Cli::try_parse_from([
            "trestle",
            "new",
            "svc",
            "out",
            "--set",
            "a=1",
            "-s",
            "b=two",
            "--no-hooks",
            "--hook-timeout",
            "9",
        ])
        .unwrap();

        let Commands::New(args) = cli.command else {
            panic!("expected new");
        };
        assert_eq!(args.blueprint, "svc");
        assert_eq!(args.set.len(), 2);
        assert_eq!(args.set[1], ("b".to_string(), "two".to_string()));
        assert!(args.no_hooks);
        assert_eq!(args.hook_timeout, Some(9));
        assert!(!args.force);
    }
}
