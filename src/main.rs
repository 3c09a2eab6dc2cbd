use clap::{ArgAction, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{warn, Level};
use walkdir::WalkDir;
use zar::volume::{CREATOR_NAME, CREATOR_VERSION};
use zar::{CreateOptions, FileRecord, ZarError};

#[derive(Parser)]
#[command(name = "zar", version, about = "Bundle files into a single .zar container")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Only report errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an archive from files and directories
    #[command(visible_alias = "c")]
    Create {
        archive: PathBuf,
        /// Files to add; directories are walked recursively
        #[arg(required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,
        /// Do not descend into directory inputs
        #[arg(long)]
        no_recursion: bool,
        /// Open inputs relative to this directory and store them by the
        /// names given
        #[arg(short = 'C', long)]
        directory: Option<PathBuf>,
        #[arg(long, default_value = CREATOR_NAME)]
        creator: String,
        #[arg(long, default_value = CREATOR_VERSION)]
        creator_version: String,
    },
    /// List archive members
    #[command(visible_alias = "t")]
    List {
        archive: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Extract every member
    #[command(visible_alias = "x")]
    Extract {
        archive: PathBuf,
        #[arg(short = 'C', long, default_value = ".")]
        directory: PathBuf,
    },
    /// Dump every structural field of an archive
    #[command(visible_alias = "i")]
    Info {
        archive: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn archive(&self) -> &Path {
        match self {
            Commands::Create { archive, .. }
            | Commands::List { archive, .. }
            | Commands::Extract { archive, .. }
            | Commands::Info { archive, .. } => archive.as_path(),
        }
    }
}

/// Logging setup derived from the command line.
struct LogConfig {
    level: Level,
}

impl LogConfig {
    fn from_flags(verbose: u8, quiet: bool) -> Self {
        let level = match (quiet, verbose) {
            (true, _) => Level::ERROR,
            (false, 0) => Level::WARN,
            (false, 1) => Level::INFO,
            (false, 2) => Level::DEBUG,
            (false, _) => Level::TRACE,
        };
        Self { level }
    }

    fn init(&self) -> Result<(), ZarError> {
        tracing_subscriber::fmt()
            .with_max_level(self.level)
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .with_target(false)
            .try_init()
            .map_err(|e| ZarError::Internal(format!("logging setup failed: {e}")))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log = LogConfig::from_flags(cli.verbose, cli.quiet);
    if let Err(e) = log.init() {
        eprintln!("zar: {e}");
        return ExitCode::from(e.exit_code());
    }

    let archive = cli.command.archive().to_owned();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("zar: {}: {e}", archive.display());
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(command: Commands) -> zar::Result<()> {
    match command {

        // ── Create ───────────────────────────────────────────────────────────
        Commands::Create { archive, inputs, no_recursion, directory, creator, creator_version } => {
            let base = directory.clone().unwrap_or_default();
            let files = if no_recursion { inputs } else { expand_inputs(&inputs, &base) };
            let opts = CreateOptions {
                creator_name: creator,
                creator_version,
                base_dir: directory,
            };
            let volume = zar::create(&archive, &files, &opts)?;
            for record in &volume.records {
                println!("  added  {}", record.path);
            }
            println!("Created: {} ({} members)", archive.display(), volume.nrecords());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { archive, json } => {
            let records = zar::list(&archive)?;
            if json {
                println!("{}", to_json(&records)?);
            } else {
                print_listing(&records);
            }
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { archive, directory } => {
            let records = zar::extract(&archive, &directory)?;
            println!("Extracted {} members to: {}", records.len(), directory.display());
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { archive, json } => {
            let info = zar::info::info(&archive)?;
            if json {
                println!("{}", to_json(&info)?);
            } else {
                println!("{info}");
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Flatten directory inputs into the regular files beneath them, sorted by
/// name. Plain paths pass through untouched, missing ones included, so the
/// archive writer can report them. Results stay relative to `base`.
fn expand_inputs(inputs: &[PathBuf], base: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        let on_disk = base.join(input);
        if !on_disk.is_dir() {
            files.push(input.clone());
            continue;
        }
        for entry in WalkDir::new(&on_disk).sort_by_file_name() {
            match entry {
                Ok(e) if e.file_type().is_file() => {
                    let rel = e.path().strip_prefix(base).unwrap_or(e.path());
                    files.push(rel.to_owned());
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "skipping unreadable directory entry"),
            }
        }
    }
    files
}

fn print_listing(records: &[FileRecord]) {
    println!("{:<14} {:>12} {:>8}  Path", "Format", "Length", "CRC-32");
    for r in records {
        println!("{:<14} {:>12} {:08x}  {}", r.format.to_string(), r.length, r.checksum, r.path);
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> zar::Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| ZarError::Internal(e.to_string()))
}
