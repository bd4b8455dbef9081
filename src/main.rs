//! hacktools CLI entry point.
//!
//! Provides `verify-pluginconfig` and `materialize-secrets`. Both are one-shot:
//! they read a single input, act on it, and exit.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use hacktools::config::Settings;
use hacktools::pluginconfig::{self, CheckOutcome, CheckRules};
use hacktools::secrets::{self, KeyPolicy, Materializer};

/// hacktools — plugin config version checks and secret materialization.
#[derive(Parser)]
#[command(name = "hacktools", version, about)]
struct Cli {
    /// Settings file (defaults to $HACKTOOLS_CONFIG_PATH or ./hacktools.toml).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Check that trusted image tags match each plugin version's VM image version.
    VerifyPluginconfig {
        /// Plugin configuration YAML.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Registry substring whose images are checked.
        #[arg(long)]
        trusted_registry: Option<String>,
    },
    /// Write each entry of a flat JSON secret document to its own file.
    MaterializeSecrets {
        /// Flat JSON secret document.
        #[arg(long)]
        input: Option<PathBuf>,
        /// Directory the secret files are written under.
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Treatment of keys containing path separators: `nested` or `flat`.
        #[arg(long)]
        key_policy: Option<KeyPolicy>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.settings.as_deref()).context("failed to load settings")?;
    hacktools::logging::init_cli(&settings.logging.level);
    for ignored in &settings.ignored_overrides {
        warn!(
            var = ignored.var,
            value = %ignored.value,
            reason = %ignored.reason,
            "ignoring invalid env override"
        );
    }

    match cli.command {
        Command::VerifyPluginconfig {
            config,
            trusted_registry,
        } => handle_verify(settings, config, trusted_registry),
        Command::MaterializeSecrets {
            input,
            output_dir,
            key_policy,
        } => handle_materialize(settings, input, output_dir, key_policy),
    }
}

/// Run the version consistency check. A mismatch prints one line to stdout
/// and exits with failure.
fn handle_verify(
    settings: Settings,
    config: Option<PathBuf>,
    trusted_registry: Option<String>,
) -> anyhow::Result<ExitCode> {
    let path = config.unwrap_or(settings.pluginconfig.path);
    let rules = CheckRules::with_registry(
        trusted_registry.unwrap_or(settings.pluginconfig.trusted_registry),
    )
    .context("invalid trusted registry")?;
    debug!(
        path = %path.display(),
        registry = rules.trusted_registry(),
        "checking plugin config"
    );

    match pluginconfig::verify_file(&path, &rules)? {
        CheckOutcome::Consistent => {
            info!(path = %path.display(), "plugin config versions consistent");
            Ok(ExitCode::SUCCESS)
        }
        CheckOutcome::Mismatch(mismatch) => {
            println!("{mismatch}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Split the secret document into one file per key.
fn handle_materialize(
    settings: Settings,
    input: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    key_policy: Option<KeyPolicy>,
) -> anyhow::Result<ExitCode> {
    let input = input.unwrap_or(settings.secrets.input);
    let output_dir = output_dir.unwrap_or(settings.secrets.output_dir);
    let policy = key_policy.unwrap_or(settings.secrets.key_policy);

    let document = secrets::load_secret_document(&input)?;
    let report = Materializer::new(&output_dir)
        .with_policy(policy)
        .with_private_files(settings.secrets.private_files)
        .materialize(&document)
        .with_context(|| format!("failed to materialize secrets into {}", output_dir.display()))?;

    debug!(written = report.len(), %policy, "materialize complete");
    Ok(ExitCode::SUCCESS)
}
