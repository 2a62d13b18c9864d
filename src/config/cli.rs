//! Command-line arguments for the `canlog` binary.

use std::path::PathBuf;

use clap::Parser;

use super::DEFAULT_CONFIG_FILE;

/// CAN Data Acquisition - decode bus traffic and log it to rotating files.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "canlog")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Signal database, overrides `schema.path`.
    #[arg(short, long)]
    pub schema: Option<PathBuf>,

    /// Output directory for log files. Skips the directory picker.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Log file age before rotation, in seconds.
    #[arg(long)]
    pub rotation_secs: Option<u64>,

    /// SocketCAN interface to read from (e.g. `can0`).
    #[arg(long, conflicts_with = "use_virtual_bus")]
    pub channel: Option<String>,

    /// Use generated traffic instead of a real bus.
    #[arg(long = "virtual")]
    pub use_virtual_bus: bool,
}
