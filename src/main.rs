use clap::Parser;
use std::path::PathBuf;
use std::process;

use umv::cli::{RunOptions, run};

/// Restructure a directory tree by editing a text listing of its files.
///
/// Scans SOURCE into a listing with one file (or archive member) per line,
/// opens it in your editor, and then renames, moves, deletes, or extracts so
/// the tree under TARGET matches what you wrote.
#[derive(Parser)]
#[command(name = "umv", version, about, long_about = None)]
struct Cli {
    /// The directory to scan
    source: PathBuf,

    /// The directory edited paths are placed under
    target: PathBuf,

    /// The editor command (defaults to $EDITOR, then the configured fallback)
    #[arg(short, long, value_name = "COMMAND")]
    editor: Option<String>,

    /// Show the plan without touching the filesystem
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Path to a configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit the plan or execution report as JSON
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    let options = RunOptions {
        source: cli.source,
        target: cli.target,
        editor: cli.editor,
        config_path: cli.config,
        dry_run: cli.dry_run,
        json: cli.json,
    };

    if let Err(e) = run(&options) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
