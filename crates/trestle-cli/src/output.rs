//! Output management and formatting.
//!
//! Human output goes through [`console::Term`]; JSON goes to stdout as a
//! single pretty-printed document and is never suppressed by `--quiet`.

use std::io::{self, IsTerminal};

use console::Term;
use owo_colors::OwoColorize;
use serde::Serialize;

use trestle_core::application::{
    BlueprintInfo, CatalogListing, GenerationResult, GenerationStatus,
    services::{HookOutcome, HookStatus},
};
use trestle_core::domain::ResolvedDependency;

use crate::cli::global::{GlobalArgs, OutputFormat};
use crate::config::AppConfig;
use crate::error::CliResult;

/// Manages CLI output based on configuration.
pub struct OutputManager {
    resolved_format: OutputFormat,
    quiet: bool,
    no_color: bool,
    term: Term,
}

impl OutputManager {
    /// Build an `OutputManager` from parsed CLI flags and loaded config.
    pub fn new(args: &GlobalArgs, config: &AppConfig) -> Self {
        // Auto → Human on a TTY, Plain when piped.
        let resolved_format = if args.output_format == OutputFormat::Auto {
            if io::stdout().is_terminal() {
                OutputFormat::Human
            } else {
                OutputFormat::Plain
            }
        } else {
            args.output_format
        };

        let no_color = args.no_color
            || config.output.no_color
            || resolved_format != OutputFormat::Human;

        Self {
            resolved_format,
            quiet: args.quiet,
            no_color,
            term: Term::stdout(),
        }
    }

    // ── Public write methods ───────────────────────────────────────────────

    /// Generic message; suppressed in quiet mode.
    pub fn print(&self, msg: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.term.write_line(msg)
    }

    /// Success indicator: `✓ <msg>`.
    pub fn success(&self, msg: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let line = if self.no_color {
            format!("\u{2713} {msg}")
        } else {
            format!("{} {}", "\u{2713}".green().bold(), msg.green())
        };
        self.term.write_line(&line)
    }

    /// Error indicator: `✗ <msg>`.  Not suppressed in quiet mode.
    pub fn error(&self, msg: &str) -> io::Result<()> {
        let line = if self.no_color {
            format!("\u{2717} {msg}")
        } else {
            format!("{} {}", "\u{2717}".red().bold(), msg.red())
        };
        self.term.write_line(&line)
    }

    /// Warning indicator: `⚠ <msg>`.
    pub fn warning(&self, msg: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let line = if self.no_color {
            format!("\u{26a0} {msg}")
        } else {
            format!("{} {}", "\u{26a0}".yellow().bold(), msg.yellow())
        };
        self.term.write_line(&line)
    }

    /// Bold cyan header line.
    pub fn header(&self, text: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let line = if self.no_color {
            text.to_owned()
        } else {
            text.cyan().bold().to_string()
        };
        self.term.write_line(&line)
    }

    /// Pretty JSON on stdout.
    pub fn json<T: Serialize>(&self, value: &T) -> CliResult<()> {
        let encoded = serde_json::to_string_pretty(value)?;
        self.term.write_line(&encoded)?;
        Ok(())
    }

    // ── Reports ───────────────────────────────────────────────────────────

    /// Print a generation report in the resolved format.
    pub fn report(&self, result: &GenerationResult) -> CliResult<()> {
        if self.is_json() {
            return self.json(result);
        }

        let headline = format!(
            "{} into {} ({})",
            result.blueprint,
            result.output_dir.display(),
            result.status
        );
        match result.status {
            GenerationStatus::Completed => self.success(&format!("Generated {headline}"))?,
            GenerationStatus::PartiallyFailed => self.warning(&format!("Generated {headline}"))?,
            GenerationStatus::Aborted => self.error(&format!("Nothing generated: {headline}"))?,
        }

        for line in report_lines(result) {
            self.print(&line)?;
        }
        for error in &result.errors {
            self.error(&error.to_string())?;
        }
        Ok(())
    }

    /// Print a catalogue listing in the resolved format.
    pub fn listing(&self, listing: &CatalogListing) -> CliResult<()> {
        if self.is_json() {
            return self.json(listing);
        }

        if listing.blueprints.is_empty() && listing.broken.is_empty() {
            self.print("No blueprints found.")?;
            return Ok(());
        }

        self.header("Available blueprints:")?;
        for line in listing_lines(&listing.blueprints) {
            self.print(&line)?;
        }
        for broken in &listing.broken {
            self.warning(&format!("{}: {}", broken.name, broken.reason))?;
        }
        Ok(())
    }

    /// Print the outcome of `trestle validate`.
    pub fn blueprint_summary(&self, info: &BlueprintInfo) -> CliResult<()> {
        if self.is_json() {
            return self.json(info);
        }
        self.success(&format!("{} is valid", info.id))?;
        self.print(&format!(
            "  {} variable(s), {} file(s)",
            info.variables, info.files
        ))?;
        Ok(())
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    /// `true` if ANSI colours are enabled.
    pub fn supports_color(&self) -> bool {
        !self.no_color
    }

    /// The resolved (non-Auto) output format.
    pub fn format(&self) -> OutputFormat {
        self.resolved_format
    }

    fn is_json(&self) -> bool {
        self.resolved_format == OutputFormat::Json
    }
}

// ── Plain-text layout ─────────────────────────────────────────────────────────

fn report_lines(result: &GenerationResult) -> Vec<String> {
    let mut lines = Vec::new();

    if !result.files.is_empty() {
        lines.push(format!("Files ({}):", result.files.len()));
        for file in &result.files {
            let suffix = if file.executable { " (executable)" } else { "" };
            lines.push(format!("  + {}{suffix}", file.path));
        }
    }

    if !result.dependencies.is_empty() {
        lines.push(format!("Dependencies ({}):", result.dependencies.len()));
        lines.extend(result.dependencies.iter().map(dependency_line));
    }

    if !result.hooks.is_empty() {
        lines.push("Hooks:".to_string());
        lines.extend(result.hooks.iter().map(hook_line));
    }

    lines
}

fn dependency_line(dep: &ResolvedDependency) -> String {
    let mut line = format!("  {} {}", dep.module, dep.constraint);
    if !dep.features.is_empty() {
        line.push_str(&format!(" [{}]", dep.features.join(", ")));
    }
    if dep.pinned {
        line.push_str(" (pinned)");
    }
    if dep.kind != trestle_core::domain::DependencyKind::Normal {
        line.push_str(&format!(" ({})", dep.kind));
    }
    line
}

fn hook_line(hook: &HookOutcome) -> String {
    let status = match (hook.status, hook.exit_code) {
        (HookStatus::Succeeded, _) => "ok".to_string(),
        (HookStatus::Failed, Some(code)) => format!("failed (exit {code})"),
        (HookStatus::Failed, None) => "failed".to_string(),
        (HookStatus::TimedOut, _) => "timed out".to_string(),
        (HookStatus::Cancelled, _) => "cancelled".to_string(),
        (HookStatus::Errored, _) => "could not start".to_string(),
        (HookStatus::Skipped, _) => "skipped".to_string(),
    };
    let required = if hook.required { ", required" } else { "" };
    if hook.status == HookStatus::Skipped {
        format!("  {}: {status}{required}", hook.name)
    } else {
        format!(
            "  {}: {status}{required} [{}] {} ms",
            hook.name, hook.command, hook.duration_ms
        )
    }
}

fn listing_lines(blueprints: &[BlueprintInfo]) -> Vec<String> {
    let width = blueprints
        .iter()
        .map(|b| b.id.len())
        .max()
        .unwrap_or(0);
    blueprints
        .iter()
        .map(|b| {
            let architecture = b
                .architecture
                .map(|a| format!(" [{a}]"))
                .unwrap_or_default();
            let description = if b.description.is_empty() {
                b.display_name.as_str()
            } else {
                b.description.as_str()
            };
            format!("  {:<width$}  {description}{architecture}", b.id)
        })
        .collect()
}

// ── tests ─────────────────────────────────────────────────────────────────────
