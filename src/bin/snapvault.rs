//! # snapvault CLI
//!
//! Command-line front-end for the snapvault backup library.
//!
//! ## Usage
//! ```bash
//! # Back up two folders into a managed root
//! snapvault backup ~/Documents ~/Pictures --dest /mnt/backups
//!
//! # Same, driven by a saved config file
//! snapvault backup --config backup.json
//!
//! # Inspect the snapshot history
//! snapvault list /mnt/backups --detailed
//!
//! # Garbage-collect redundant physical copies
//! snapvault clean /mnt/backups
//!
//! # Adopt pre-existing folders into the index
//! snapvault rebuild /mnt/backups
//!
//! # Materialize the latest logical snapshot
//! snapvault restore /mnt/backups /tmp/recovered
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use snapvault::{
    BackupConfig, Cleaner, CopyFailurePolicy, ManagedBackup, MetaRecord, Rebuilder, Restorer,
    Task, Update,
};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// snapvault - content-tracked snapshot backups with deduplication
#[derive(Parser)]
#[command(name = "snapvault")]
#[command(version)]
#[command(about = "Snapshot backups that never copy an unchanged file twice")]
struct Cli {
    /// Enable verbose output (per-file detail, debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a managed backup
    #[command(alias = "bk")]
    Backup {
        /// Source directories to back up
        sources: Vec<PathBuf>,

        /// Destination managed root
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Glob exclusion patterns, matched against file names
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Load sources, exclusions and destination from a JSON config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Walk and report, but write nothing
        #[arg(long)]
        dry_run: bool,

        /// Fail the run on the first per-file error instead of skipping
        #[arg(long)]
        abort_on_error: bool,
    },

    /// Delete redundant physical copies across the snapshot chain
    Clean {
        /// Managed root to clean
        root: PathBuf,

        /// Delete without prompting
        #[arg(short = 'y', long)]
        yes: bool,

        /// Analyze and report only; delete nothing
        #[arg(long)]
        analyze: bool,
    },

    /// Index pre-existing snapshot folders into the metarecord
    Rebuild {
        /// Managed (or about-to-be-managed) root
        root: PathBuf,

        /// Folder names to leave unindexed
        #[arg(short, long)]
        skip: Vec<String>,

        /// List discovered candidates without committing
        #[arg(long)]
        list: bool,
    },

    /// Restore the latest logical snapshot into a destination
    #[command(alias = "rs")]
    Restore {
        /// Managed root to restore from
        root: PathBuf,

        /// Destination directory (must exist)
        dest: PathBuf,
    },

    /// List the snapshots of a managed root
    #[command(alias = "ls")]
    List {
        /// Managed root to inspect
        root: PathBuf,

        /// Load each record and show file statistics
        #[arg(short, long)]
        detailed: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "snapvault=debug" } else { "snapvault=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Backup {
            sources,
            dest,
            exclude,
            config,
            dry_run,
            abort_on_error,
        } => cmd_backup(
            sources,
            dest,
            exclude,
            config,
            dry_run,
            abort_on_error,
            cli.verbose,
        ),
        Commands::Clean { root, yes, analyze } => cmd_clean(root, yes, analyze, cli.verbose),
        Commands::Rebuild { root, skip, list } => cmd_rebuild(root, skip, list, cli.verbose),
        Commands::Restore { root, dest } => cmd_restore(root, dest, cli.verbose),
        Commands::List { root, detailed } => cmd_list(root, detailed),
    }
}

fn cmd_backup(
    sources: Vec<PathBuf>,
    dest: Option<PathBuf>,
    exclude: Vec<String>,
    config: Option<PathBuf>,
    dry_run: bool,
    abort_on_error: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let mut backup = ManagedBackup::new();

    if let Some(config_path) = config {
        let config = BackupConfig::load(&config_path)
            .with_context(|| format!("loading config {}", config_path.display()))?;
        for source in config.sources {
            backup.add_source(source);
        }
        for pattern in config.exceptions {
            backup.add_exclusion(pattern);
        }
        backup.set_destination(config.destination);
        backup.set_dry_run(config.dry_run);
    }
    for source in sources {
        backup.add_source(source);
    }
    for pattern in exclude {
        backup.add_exclusion(pattern);
    }
    if let Some(dest) = dest {
        backup.set_destination(dest);
    }
    if dry_run {
        backup.set_dry_run(true);
    }
    if abort_on_error {
        backup.set_failure_policy(CopyFailurePolicy::Abort);
    }

    if dry_run {
        println!("{}", "dry run - nothing will be written".yellow());
    }
    let start = Instant::now();
    let record = drive(backup.execute()?, verbose)?;
    println!(
        "{} {} ({} files, {})",
        "created snapshot".green().bold(),
        record.name.bold(),
        record.files.len(),
        format_elapsed(start)
    );
    let owned = record
        .files
        .iter()
        .filter(|f| f.source == record.name)
        .count();
    println!(
        "  {owned} copied, {} unchanged (deduplicated)",
        record.files.len() - owned
    );
    Ok(())
}

fn cmd_clean(root: PathBuf, yes: bool, analyze: bool, verbose: bool) -> anyhow::Result<()> {
    let meta = load_managed(&root)?;
    let task = snapvault::task::spawn(move |updates| {
        let mut cleaner = Cleaner::new(meta);
        cleaner.generate_diffs(|update| {
            updates.send(update).ok();
        })?;
        Ok::<_, snapvault::VaultError>(cleaner)
    });
    let mut cleaner = drive(task, verbose)?;

    if cleaner.file_count() == 0 {
        println!("{}", "nothing to clean".green());
        return Ok(());
    }
    println!(
        "{} redundant files across {} snapshots:",
        cleaner.file_count().to_string().bold(),
        cleaner.pending().len()
    );
    for (record, files) in cleaner.pending() {
        println!("  {}", record.name.bold());
        for file in files {
            println!("    {}", file.dimmed());
        }
    }
    if analyze {
        return Ok(());
    }
    if !yes && !confirm("Delete these redundant copies?")? {
        println!("aborted");
        return Ok(());
    }

    let start = Instant::now();
    let task = snapvault::task::spawn(move |updates| {
        cleaner.perform_clean(|update| {
            updates.send(update).ok();
        })?;
        Ok::<_, snapvault::VaultError>(())
    });
    drive(task, verbose)?;
    println!("{} ({})", "clean complete".green().bold(), format_elapsed(start));
    Ok(())
}

fn cmd_rebuild(root: PathBuf, skip: Vec<String>, list: bool, verbose: bool) -> anyhow::Result<()> {
    let mut rebuilder = Rebuilder::open(&root)?;
    if rebuilder.candidates().is_empty() {
        println!("{}", "no unindexed folders found".green());
        return Ok(());
    }
    for folder in &skip {
        if !rebuilder.configure_directory(folder, None, None, Some(false)) {
            bail!("--skip {folder}: no such discovered folder");
        }
    }
    if list {
        println!("discovered folders:");
        for candidate in rebuilder.candidates() {
            let mark = if candidate.included { "+".green() } else { "-".red() };
            println!(
                "  {mark} {}  ({}, {})",
                candidate.record.folder.bold(),
                candidate.record.name,
                candidate.record.timestamp.format("%Y-%m-%d %H:%M:%S")
            );
        }
        return Ok(());
    }

    let start = Instant::now();
    let task = snapvault::task::spawn(move |updates| {
        rebuilder.generate_records(|update| {
            updates.send(update).ok();
        })?;
        Ok::<_, snapvault::VaultError>(rebuilder.into_metarecord())
    });
    let meta = drive(task, verbose)?;
    println!(
        "{} - index now holds {} snapshots ({})",
        "rebuild complete".green().bold(),
        meta.records().len(),
        format_elapsed(start)
    );
    Ok(())
}

fn cmd_restore(root: PathBuf, dest: PathBuf, verbose: bool) -> anyhow::Result<()> {
    let meta = load_managed(&root)?;
    let mut restorer = Restorer::new(meta);
    restorer.set_destination(&dest)?;

    let start = Instant::now();
    let stats = drive(restorer.execute()?, verbose)?;
    println!(
        "{} {} restored, {} already present, {} missing ({})",
        "restore complete:".green().bold(),
        stats.files_restored,
        stats.files_skipped,
        stats.files_missing,
        format_elapsed(start)
    );
    if stats.files_missing > 0 {
        println!(
            "{}",
            "some physical files were missing; see the log above".yellow()
        );
    }
    Ok(())
}

fn cmd_list(root: PathBuf, detailed: bool) -> anyhow::Result<()> {
    let meta = load_managed(&root)?;
    if meta.records().is_empty() {
        println!("no snapshots yet");
        return Ok(());
    }
    let latest_name = meta.latest().map(|l| l.name.clone()).unwrap_or_default();
    for record_ref in meta.records() {
        let marker = if record_ref.name == latest_name {
            "*".yellow().bold().to_string()
        } else {
            " ".to_string()
        };
        print!(
            "{marker} {}  {}",
            record_ref.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record_ref.name.bold()
        );
        if detailed {
            let record = snapvault::Record::load_from(&root, &record_ref.name)?;
            let owned = record
                .files
                .iter()
                .filter(|f| f.source == record.name)
                .count();
            print!(
                "  [{} files, {} owned, folder {}]",
                record.files.len(),
                owned,
                record.folder
            );
        }
        println!();
    }
    Ok(())
}

/// Load the index of a root that must already be managed
fn load_managed(root: &PathBuf) -> anyhow::Result<MetaRecord> {
    MetaRecord::load_from(root)?
        .with_context(|| format!("{} is not a managed root (no metarecord)", root.display()))
}

/// Poll a task to completion, rendering its update stream
///
/// Major updates drive the progress bar; minor per-file detail is printed
/// above it when verbose. The loop never blocks on the worker - it drains,
/// sleeps briefly, and checks again, then joins once the worker exits.
fn drive<T>(task: Task<T>, verbose: bool) -> snapvault::Result<T> {
    let bar = ProgressBar::new(1);
    bar.set_style(
        ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {wide_msg}")
            .expect("static template"),
    );
    let render = |update: &Update| {
        if update.is_minor() {
            if verbose {
                bar.println(format!("  {}", update.message.dimmed()));
            }
        } else {
            bar.set_length(update.total.max(1) as u64);
            bar.set_position(update.current as u64);
            bar.set_message(update.message.clone());
            if verbose {
                bar.println(format!("[{:>6.2}%] {}", update.completion(), update.message));
            }
        }
    };

    loop {
        while let Some(update) = task.try_next() {
            render(&update);
        }
        if !task.is_running() {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    let result = task.drain_and_wait(|update| render(&update));
    bar.finish_and_clear();
    result
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn format_elapsed(start: Instant) -> String {
    // Round to whole seconds for readable durations
    let elapsed = Duration::from_secs(start.elapsed().as_secs().max(1));
    humantime::format_duration(elapsed).to_string()
}
