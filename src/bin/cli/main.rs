//! CLI tool for zextract.

mod commands;
mod exit_codes;
mod file_selector;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use zextract::SpillPolicy;

/// Solid-block 7z extraction tool
#[derive(Parser)]
#[command(name = "zextract")]
#[command(author, version, about = "Solid-block 7z extraction tool", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value = "human", global = true)]
    format: OutputFormat,

    /// Suppress per-entry output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Decode every block into a temporary file mapping
    #[arg(long, global = true, conflicts_with = "spill_above")]
    spill: bool,

    /// Decode blocks larger than this many bytes into a temporary file mapping
    #[arg(long, value_name = "BYTES", global = true)]
    spill_above: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract files from archive (alias: x)
    #[command(alias = "x")]
    Extract {
        /// Archive file to extract
        archive: PathBuf,

        /// Output directory
        #[arg(short = 'o', long, default_value = ".")]
        output: PathBuf,

        /// File patterns to extract (glob patterns supported)
        #[arg(short = 'i', long)]
        include: Vec<String>,

        /// File patterns to exclude
        #[arg(short = 'e', long)]
        exclude: Vec<String>,

        /// Skip CRC verification of extracted entries
        #[arg(long)]
        no_verify: bool,
    },

    /// List archive contents (alias: l)
    #[command(alias = "l")]
    List {
        /// Archive file to list
        archive: PathBuf,

        /// Show block assignment and CRC of each entry
        #[arg(long, short = 't')]
        technical: bool,
    },
}

/// Output format for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

impl Cli {
    fn spill_policy(&self) -> SpillPolicy {
        match (self.spill, self.spill_above) {
            (true, _) => SpillPolicy::Always,
            (false, Some(bytes)) => SpillPolicy::AboveBytes(bytes),
            (false, None) => SpillPolicy::Never,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let spill = cli.spill_policy();

    let exit_code = match cli.command {
        Commands::Extract {
            archive,
            output,
            include,
            exclude,
            no_verify,
        } => commands::extract(&commands::ExtractConfig {
            archive_path: &archive,
            output_dir: &output,
            include: &include,
            exclude: &exclude,
            verify_crc: !no_verify,
            spill,
            format: cli.format,
            quiet: cli.quiet,
        }),

        Commands::List { archive, technical } => {
            commands::list(&archive, technical, spill, cli.format)
        }
    };

    std::process::exit(exit_code.code());
}
