//! Command surface (§6). Grounded on `taikoxyz-raiko`/`vhqtvn-revela`'s
//! `clap` (`derive` feature) usage; flag names and defaults follow
//! `original_source/cmd/{run,export,status}/*.go` exactly (`--db ./db`,
//! `--parallel` defaulting to the host's available parallelism,
//! `--compressed` defaulting to true).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "loom", about = "Content-addressed, incremental data-pipeline engine")]
pub struct Cli {
    /// Root directory holding `sqlite/db` and `objects_db/` (§6).
    #[arg(long, global = true, default_value = "./db")]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Loads the manifest and runs the pipeline to a fixed point.
    Run {
        #[arg(long)]
        manifest: PathBuf,

        #[arg(long, default_value_t = default_parallelism())]
        parallel: usize,

        /// Restricts the fixed-point loop to these steps (repeatable).
        #[arg(long = "step")]
        step: Vec<String>,

        /// Restricts the fixed-point loop to these columns (repeatable).
        #[arg(long = "column")]
        column: Vec<String>,
    },

    /// Exports resources or blob content from the catalog.
    Export(ExportArgs),

    /// Prints step/task/resource counts.
    Status,
}

#[derive(Args)]
#[command(group(clap::ArgGroup::new("export_mode").args(["name", "hash", "tar", "csv"]).required(true)))]
pub struct ExportArgs {
    /// Lists resource hash/name/created_at for every resource with this name.
    #[arg(long)]
    pub name: Option<String>,

    /// Writes the raw bytes of the blob with this hash to standard output.
    #[arg(long)]
    pub hash: Option<String>,

    /// Writes a tarball of every blob, one entry per resource, to this path.
    #[arg(long)]
    pub tar: Option<PathBuf>,

    #[arg(long, default_value_t = true)]
    pub compressed: bool,

    /// Writes the resource/column table as CSV. Use `-` for stdout.
    #[arg(long)]
    pub csv: Option<String>,
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}
