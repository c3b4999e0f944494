//! Offline tooling for element-courier payloads.
//!
//! Works on the JSON a user saved from a failed paste (or anything else
//! carrying the payload marker): inspect it, sanitize it, migrate it to
//! another builder version, or check two versions against the
//! compatibility matrix.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use courier_core::{ClipboardPayload, RuleSet, Sanitizer, VersionResolver};
use serde::Serialize;
use tracing::{info, warn};

/// Command line interface.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about = "Inspect and migrate element-courier payloads")]
pub struct Cli {
    /// Subcommand.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarize a payload.
    Inspect {
        /// Payload file, `-` for stdin.
        input: PathBuf,
    },

    /// Sanitize a payload and print the result.
    Sanitize {
        /// Payload file, `-` for stdin.
        input: PathBuf,
        /// Write here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Sanitize a payload and migrate it to another builder version.
    Convert {
        /// Payload file, `-` for stdin.
        input: PathBuf,
        /// Target builder version.
        #[arg(short, long, env = "COURIER_TARGET_VERSION")]
        target: String,
        /// Extra migration rules (JSON object keyed by migration path).
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Use only the rules from `--rules`.
        #[arg(long, requires = "rules")]
        no_builtin_rules: bool,
        /// Write here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check whether content from one builder version pastes into another.
    Compat {
        /// Source builder version.
        source: String,
        /// Target builder version.
        target: String,
    },
}

/// Summary printed by `inspect`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Payload schema version.
    pub format_version: String,
    /// Root node kind.
    pub element_kind: String,
    /// Root widget type, for widget payloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget_type: Option<String>,
    /// Nodes in the tree.
    pub node_count: usize,
    /// Tree depth.
    pub depth: usize,
    /// Media references.
    pub media_count: usize,
    /// Nodes with rendered-content scrapes.
    pub rendered_count: usize,
    /// Source page.
    pub source_origin: String,
    /// Source builder version.
    pub source_builder_version: String,
    /// Capture time.
    pub captured_at: String,
    /// Whether sanitizing would change anything.
    pub clean: bool,
}

/// Run a command and return what it prints.
///
/// # Errors
///
/// Returns an error if input cannot be read, is not a payload, or output
/// cannot be written.
pub fn run(cli: &Cli) -> Result<String> {
    match &cli.command {
        Command::Inspect { input } => {
            let payload = load_payload(input)?;
            let summary = summarize(&payload);
            Ok(serde_json::to_string_pretty(&summary)?)
        }
        Command::Sanitize { input, output } => {
            let payload = load_payload(input)?;
            let (clean, report) = Sanitizer::new().sanitize_payload(&payload);
            if report.is_clean() {
                info!("Payload was already clean");
            } else {
                warn!(?report, "Payload sanitized with changes");
            }
            emit(&clean, output.as_deref())
        }
        Command::Convert {
            input,
            target,
            rules,
            no_builtin_rules,
            output,
        } => {
            let payload = load_payload(input)?;
            let resolver = resolver(rules.as_deref(), *no_builtin_rules)?;
            let (clean, report) = Sanitizer::new().sanitize_payload(&payload);
            if !report.is_clean() {
                warn!(?report, "Payload sanitized with changes");
            }
            let source = clean.metadata.source_builder_version.clone();
            let result = resolver.convert(&clean.data, &source, target);
            info!(
                "{} ({} rules applied, {:?} notice)",
                result.compatibility.message,
                result.rules_applied,
                result.notice_level()
            );
            let mut metadata = clean.metadata.clone();
            metadata.source_builder_version.clone_from(target);
            let converted = ClipboardPayload::new(result.tree, clean.media, metadata)
                .with_rendered_content(clean.rendered_content);
            emit(&converted, output.as_deref())
        }
        Command::Compat { source, target } => {
            let compatibility = VersionResolver::new().is_compatible(source, target);
            Ok(serde_json::to_string_pretty(&compatibility)?)
        }
    }
}

/// Summarize a payload.
#[must_use]
pub fn summarize(payload: &ClipboardPayload) -> Summary {
    let (_, report) = Sanitizer::new().sanitize_payload(payload);
    Summary {
        format_version: payload.format_version.clone(),
        element_kind: payload.element_kind.to_string(),
        widget_type: payload.data.widget_type().map(str::to_string),
        node_count: payload.data.node_count(),
        depth: payload.data.depth(),
        media_count: payload.media.len(),
        rendered_count: payload.rendered_content.len(),
        source_origin: payload.metadata.source_origin.clone(),
        source_builder_version: payload.metadata.source_builder_version.clone(),
        captured_at: payload.metadata.captured_at_iso8601.clone(),
        clean: report.is_clean(),
    }
}

fn resolver(rules: Option<&Path>, no_builtin: bool) -> Result<VersionResolver> {
    let Some(path) = rules else {
        return Ok(VersionResolver::new());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading rules from {}", path.display()))?;
    let custom = RuleSet::from_json(&text)
        .with_context(|| format!("parsing rules from {}", path.display()))?;
    let mut set = if no_builtin {
        RuleSet::new()
    } else {
        RuleSet::builtin()
    };
    set.extend(custom);
    info!("Loaded {} migration rules", set.len());
    Ok(VersionResolver::new().with_rules(set))
}

/// Read a payload from a file or stdin.
///
/// # Errors
///
/// Returns an error if the input cannot be read or carries no payload
/// marker.
pub fn load_payload(input: &Path) -> Result<ClipboardPayload> {
    let text = if input.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
        text
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?
    };
    match ClipboardPayload::decode(&text)? {
        Some(payload) => Ok(payload),
        None => bail!("{} is not an element-courier payload", input.display()),
    }
}

fn emit(payload: &ClipboardPayload, output: Option<&Path>) -> Result<String> {
    let json = payload.encode_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
            Ok(format!("wrote {}", path.display()))
        }
        None => Ok(json),
    }
}
