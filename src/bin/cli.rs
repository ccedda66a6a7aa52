//! Conserv CLI
//!
//! Local execution entry point for archive exports.

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};
use conserv::{
    config::Config,
    error::Result,
    export::{RecordMode, TranslateMode, WriterRegistry, export},
    models::ArchivalUnit,
    storage::DirectoryUnit,
};

/// Conserv - Archival Content Exporter
#[derive(Parser, Debug)]
#[command(
    name = "conserv",
    version,
    about = "Exports preserved web content to ARC/WARC/ZIP archives"
)]

struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "conserv.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export a directory of content as an archive
    Export {
        /// Directory holding the content to export
        #[arg(long)]
        dir: PathBuf,

        /// URL the content root maps to
        #[arg(long)]
        base_url: String,

        /// Output directory (default: from config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Segment file-name prefix (default: the content directory name)
        #[arg(short, long)]
        prefix: Option<String>,

        /// Container format: arc, warc or zip
        #[arg(short, long)]
        format: Option<String>,

        /// Record framing: response or resource
        #[arg(long)]
        mode: Option<RecordMode>,

        /// Versions exported per URL
        #[arg(long)]
        max_versions: Option<usize>,

        /// Segment size cap in bytes (0 disables rotation)
        #[arg(long)]
        max_size: Option<u64>,

        /// ZIP entry-name translation: none, windows or macos
        #[arg(long)]
        translate: Option<TranslateMode>,

        /// Print the export report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration file
    Validate,

    /// Show the fetch-time export cadence
    Schedule,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Export {
            dir,
            base_url,
            output,
            prefix,
            format,
            mode,
            max_versions,
            max_size,
            translate,
            json,
        } => {
            config.validate()?;

            let unit = DirectoryUnit::new(&dir, &base_url)?;
            let prefix = prefix.unwrap_or_else(|| unit.name().to_string());

            let mut options = config.export.to_options(&prefix);
            if let Some(output) = output {
                options.output_dir = output;
            }
            if let Some(format) = format {
                options.format = format;
            }
            if let Some(mode) = mode {
                options.mode = mode;
            }
            if let Some(max_versions) = max_versions {
                options.max_versions = max_versions;
            }
            if let Some(max_size) = max_size {
                options.max_segment_size = (max_size > 0).then_some(max_size);
            }
            if let Some(translate) = translate {
                options.translate = translate;
            }

            log::info!(
                "Exporting {} as {} to {}",
                dir.display(),
                options.format,
                options.output_dir.display()
            );
            let report = export(&unit, &options, &WriterRegistry::builtin())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                log::info!(
                    "Exported {} versions from {} nodes into {} segment(s)",
                    report.versions_written,
                    report.nodes,
                    report.segments
                );
            }
            for error in &report.errors {
                log::warn!("Export error: {}", error);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK (export and fetch_time sections)");
        }

        Command::Schedule => {
            let options = config.fetch_time.to_options();
            log::info!(
                "Fetch-time export is {}",
                if options.enabled { "enabled" } else { "disabled" }
            );
            log::info!(
                "Cadence {:?}: next run after now is {}",
                options.frequency,
                options.frequency.next_time(Utc::now())
            );
            log::info!("Reports go to {}", options.output_dir.display());
        }
    }

    Ok(())
}
