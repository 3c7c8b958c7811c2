//! # Fixity CLI - checksum inventories from the command line
//!
//! ## Usage
//! ```bash
//! # Inventory a directory, writing inventories next to it
//! fixity --inventory-dir /mnt/inventories scan /mnt/preservation/box1
//!
//! # Only image files, SHA-256
//! fixity scan /mnt/preservation/box1 --include tif --include jp2 --algorithm sha256
//!
//! # Unattended run that retries on its own after network drops
//! fixity scan /mnt/preservation/box1 --unattended --retry-delay 5m
//!
//! # Show what the last finished inventory of a root contains
//! fixity history /mnt/preservation/box1
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::*;
use humantime::format_duration;
use fixity::{
    AutoResume, ChecksumAlgorithm, FilterMode, Inventory, InventoryBuilder, InventoryConfig,
    InventoryReport, ProgressInfo,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Fixity CLI - checksum inventories and fixity audits
#[derive(Parser)]
#[command(name = "fixity")]
#[command(version)]
#[command(about = "Build checksum inventories of a directory and compare them with the last one")]
#[command(long_about = None)]
struct Cli {
    /// Where inventories are written (defaults to the parent of the root)
    #[arg(short, long, global = true)]
    inventory_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inventory a directory
    Scan {
        /// Directory to inventory (ignored with --config)
        root: Option<PathBuf>,

        /// Read the configuration from a JSON file
        #[arg(long, conflicts_with_all = ["include", "exclude"])]
        config: Option<PathBuf>,

        /// Checksum algorithm: MD5, SHA1 or SHA256
        #[arg(short, long, default_value = "MD5")]
        algorithm: String,

        /// Only process files with this extension (repeatable)
        #[arg(long, conflicts_with = "exclude")]
        include: Vec<String>,

        /// Process every file except those with this extension (repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        /// Files between checkpoints
        #[arg(long)]
        checkpoint_interval: Option<usize>,

        /// Skip technical metadata checks for image and audio files
        #[arg(long)]
        no_media_check: bool,

        /// Retry automatically after losing access to storage
        #[arg(long)]
        unattended: bool,

        /// Wait between automatic retries
        #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
        retry_delay: Duration,

        /// Automatic retries before giving up
        #[arg(long, default_value = "30")]
        max_retries: usize,

        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },

    /// Show the latest finished inventory of a directory
    History {
        /// Directory that was inventoried
        root: PathBuf,

        /// List every known path
        #[arg(short, long)]
        detailed: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "fixity=debug" } else { "fixity=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        let message = match e.downcast_ref::<fixity::FixityError>() {
            Some(fixity_error) => fixity_error.user_message(),
            None => format!("{:#}", e),
        };
        eprintln!("{}: {}", "Error".red().bold(), message);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Scan {
            root,
            config,
            algorithm,
            include,
            exclude,
            checkpoint_interval,
            no_media_check,
            unattended,
            retry_delay,
            max_retries,
            quiet,
        } => {
            let mut config = match config {
                Some(path) => InventoryConfig::from_json_file(&path)
                    .with_context(|| format!("reading configuration {}", path.display()))?,
                None => {
                    let Some(root) = root else {
                        bail!("a directory to inventory is required unless --config is given");
                    };
                    let (mode, extensions) = if exclude.is_empty() {
                        (FilterMode::Include, include)
                    } else {
                        (FilterMode::Exclude, exclude)
                    };
                    let inventory_dir = default_inventory_dir(&root, cli.inventory_dir.clone());
                    InventoryBuilder::new()
                        .algorithm_name(algorithm)
                        .filter(mode, extensions)
                        .into_config(root, inventory_dir)
                }
            };
            if let Some(interval) = checkpoint_interval {
                config.checkpoint_interval = interval;
            }
            if no_media_check {
                config.validate_media = false;
            }
            cmd_scan(config, unattended.then(|| AutoResume::new(retry_delay, max_retries)), quiet)
        }
        Commands::History { root, detailed } => {
            let inventory_dir = default_inventory_dir(&root, cli.inventory_dir);
            cmd_history(InventoryConfig::new(root, inventory_dir), detailed)
        }
    }
}

/// Inventories live beside the root unless told otherwise
fn default_inventory_dir(root: &Path, explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| {
        std::fs::canonicalize(root)
            .ok()
            .and_then(|r| r.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

fn cmd_scan(config: InventoryConfig, auto_resume: Option<AutoResume>, quiet: bool) -> anyhow::Result<()> {
    let mut inventory = Inventory::new(config)?;

    println!(
        "{} {}",
        "Inventorying".blue().bold(),
        inventory.config().root_directory.display().to_string().cyan()
    );
    println!("  Algorithm: {}", inventory.algorithm().to_string().cyan());

    let progress = if quiet {
        None
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    };

    if let Some(pb) = progress.clone() {
        inventory = inventory.with_progress(Arc::new(move |info: ProgressInfo| {
            if let Some(total) = info.total {
                pb.set_length(total as u64);
            }
            pb.set_position(info.processed as u64);
            if let Some(item) = info.current_item {
                pb.set_message(item);
            }
        }));
    }
    if let Some(gate) = auto_resume {
        inventory = inventory.with_resume_gate(gate);
    }

    let result = inventory.run();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let report = result?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &InventoryReport) {
    let outcome = &report.outcome;
    let mark = if report.is_clean() { "✓".green().bold() } else { "!".yellow().bold() };

    println!("{} Inventory complete", mark);
    if let Some(path) = &report.inventory_path {
        println!("  Inventory: {}", path.display().to_string().cyan());
    }
    match &report.history_source {
        Some(source) => println!("  Compared with: {}", source.display().to_string().cyan()),
        None => println!("  Compared with: {}", "no earlier inventory".dimmed()),
    }
    if report.resumed {
        println!("  Resumed: {} files carried over", outcome.resumed.to_string().cyan());
    }
    println!("  Files: {}", outcome.processed.to_string().cyan());
    println!("  Not selected: {}", report.not_selected.to_string().cyan());
    println!("  New: {}", outcome.first_seen.to_string().cyan());
    println!("  Unchanged: {}", outcome.consistent.to_string().cyan());
    println!("  Time: {}", format_duration(round_to_seconds(report.duration)).to_string().cyan());

    let flagged = [
        ("Changed checksums", outcome.inconsistent),
        ("Duplicate checksums", outcome.duplicates),
        ("Media check failures", outcome.validation_failures),
        ("Processing errors", outcome.failed),
        ("Missing files", report.missing),
    ];
    for (label, count) in flagged.iter().filter(|(_, count)| *count > 0) {
        println!("  {}: {}", label, count.to_string().yellow().bold());
    }
}

fn round_to_seconds(duration: Duration) -> Duration {
    if duration < Duration::from_secs(1) {
        Duration::from_millis(duration.as_millis() as u64)
    } else {
        Duration::from_secs(duration.as_secs())
    }
}

fn cmd_history(config: InventoryConfig, detailed: bool) -> anyhow::Result<()> {
    let inventory = Inventory::new(config)?;
    let history = inventory.history()?;

    let Some(source) = history.source() else {
        println!("{}", "No finished inventory found for this directory".yellow());
        if inventory.checkpoint_path()?.exists() {
            println!("  An unfinished run can be resumed with {}", "fixity scan".yellow());
        }
        return Ok(());
    };

    println!("{} {}", "Latest inventory:".blue().bold(), source.display().to_string().cyan());
    println!("  Known paths: {}", history.known_paths().len().to_string().cyan());
    println!("  With checksums: {}", history.checksum_count().to_string().cyan());

    if detailed {
        let mut paths: Vec<_> = history.known_paths().iter().collect();
        paths.sort();
        for path in paths {
            match history.checksum_for(path) {
                Some(checksum) => println!("  {} {}", checksum.dimmed(), path),
                None => println!("  {} {}", "-".dimmed(), path),
            }
        }
    }

    let algorithms: BTreeSet<&str> = history
        .rows()
        .iter()
        .filter_map(|row| row.get(6).map(String::as_str))
        .filter(|t| ChecksumAlgorithm::ALL.iter().any(|a| a.as_str() == *t))
        .collect();
    if !algorithms.is_empty() {
        println!(
            "  Algorithms: {}",
            algorithms.into_iter().collect::<Vec<_>>().join(", ").cyan()
        );
    }
    Ok(())
}
