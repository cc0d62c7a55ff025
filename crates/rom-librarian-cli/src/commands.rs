use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "rom-librarian")]
#[command(about = "Find duplicate ROMs and compare collections", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find duplicate files by content identity
    Scan(ScanArgs),
    /// Compare two collection folders
    Compare(CompareArgs),
    /// Print the CRC32, MD5 and SHA1 of a file
    Identify {
        path: PathBuf,
    },
    /// Display the number of entries in the identity cache
    CacheStats,
    /// Remove every entry from the identity cache
    ClearCache,
    /// Drop cache entries whose files no longer exist
    PruneCache,
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Folder to scan. Ignored with --library.
    pub path: Option<PathBuf>,
    /// Only look at the folder's direct children
    #[arg(long, conflicts_with = "library")]
    pub folder_only: bool,
    /// Scan every configured library root
    #[arg(long)]
    pub library: bool,
    /// Keeper strategy: manual, region, largest, smallest, oldest, newest
    #[arg(short, long, default_value = "manual")]
    pub strategy: String,
    /// Write the duplicate report as CSV
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
    /// Delete every non-keep member after confirmation
    #[arg(long)]
    pub delete: bool,
    /// Skip the confirmation prompt when deleting
    #[arg(short, long, requires = "delete")]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    pub a: PathBuf,
    pub b: PathBuf,
    /// Compare by content identity instead of file name
    #[arg(long)]
    pub deep: bool,
    /// Hash name matches and report the ones whose contents differ
    #[arg(long, conflicts_with = "deep")]
    pub verify: bool,
    /// Write the comparison as CSV
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,
}
