//! resmerge - incremental write-back of merged Android resources
//!
//! Main entry point for the command line tool.
//!
//! # Overview
//!
//! The binary replays a YAML merge plan (see [`resmerge::plan`]) against a
//! [`MergedResourceWriter`] targeting an output resource folder. It initializes:
//! - Logging infrastructure (file rotation + optional console output)
//! - Settings from `resmerge.yaml` and `RESMERGE_*` environment variables
//! - Tokio runtime whose workers run the per-item writes and crunch processes
//!
//! # Execution Flow
//!
//! 1. Parse arguments and load settings from the config directory
//! 2. Initialize logging → `<log_dir>/resmerge.<date>`
//! 3. Create the tokio runtime
//! 4. Load and resolve the merge plan
//! 5. Replay it: start, removals, additions, end
//! 6. Ctrl-C interrupts running crunch invocations and fails the pass

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use resmerge::{APP_NAME, ConfigManager, MergePlan, MergedResourceWriter, VERSION};

/// Write merged resources into an output folder.
#[derive(Debug, Parser)]
#[command(name = "resmerge", version, about)]
struct Cli {
    /// Merge plan to replay (YAML)
    plan: Utf8PathBuf,

    /// Output resource folder
    #[arg(short, long)]
    out: Utf8PathBuf,

    /// Directory holding resmerge.yaml
    #[arg(long, env = "RESMERGE_CONFIG_DIR", default_value = ".")]
    config_dir: Utf8PathBuf,

    /// Crunch tool, overriding the settings file
    #[arg(long)]
    crunch_tool: Option<String>,

    /// Copy plain .png files instead of crunching them
    #[arg(long)]
    no_crunch: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Don't log to stderr
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let mut settings = config_manager.load_settings()?;
    if let Some(tool) = cli.crunch_tool {
        settings.crunch_tool = tool;
    }
    settings.no_crunch |= cli.no_crunch;
    settings.debug_mode |= cli.debug;

    // Keep the guard alive until exit so buffered log lines are flushed
    let _log_guard =
        resmerge::logging::setup_logging(&settings.log_dir, "resmerge", settings.debug_mode, !cli.quiet)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("resmerge-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let (plan, base_dir) = MergePlan::load(&cli.plan)?;
    let resolved = plan.resolve(&base_dir)?;
    tracing::info!(
        "Loaded plan {}: {} items, {} removals",
        cli.plan,
        resolved.items.len(),
        resolved.removals.len()
    );

    let mut writer = MergedResourceWriter::from_settings(&cli.out, &settings, runtime.handle().clone());
    let interrupt = writer.interrupt_handle();

    let result = runtime.block_on(async {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.interrupt();
            }
        });
        resolved.replay(&mut writer).await
    });

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));

    match result {
        Ok(summary) => {
            tracing::info!(
                "Done: {} added, {} removed, {} ignored",
                summary.added,
                summary.removed,
                summary.ignored
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Merge failed: {:#}", e);
            Err(e)
        }
    }
}
