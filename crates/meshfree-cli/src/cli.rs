use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "meshfree developers",
    version,
    about = "meshfree CLI - neighbor statistics and contact bookkeeping for meshless particle scenarios.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of worker threads.
    /// Defaults to the scenario's `solver.threads`, then to the number of logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Count the neighbors of every particle through the hash grid.
    Neighbors(NeighborsArgs),
    /// Form, update and retire hysteretic contact pairs.
    Contacts(ContactsArgs),
}

/// Arguments for the `neighbors` subcommand.
#[derive(Args, Debug)]
pub struct NeighborsArgs {
    /// Path to the scenario file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override the neighbor radius from the scenario file.
    #[arg(short, long, value_name = "FLOAT")]
    pub radius: Option<f64>,

    /// Check the grid counts against an all-pairs scan.
    #[arg(long)]
    pub verify: bool,

    /// Write per-particle counts to a CSV file.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Set a specific scenario value, overriding the file.
    /// Can be used multiple times. Example: -S neighbors.radius=0.5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `contacts` subcommand.
#[derive(Args, Debug)]
pub struct ContactsArgs {
    /// Path to the scenario file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Path for the resulting contact pair CSV file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Resume from a contact pair CSV file written by an earlier run.
    #[arg(short, long, value_name = "PATH")]
    pub pairs: Option<PathBuf>,

    /// Reorder particles into grid-cell order before refreshing.
    /// Pair endpoints in the output then refer to the reordered particles.
    #[arg(long)]
    pub reorder: bool,

    /// Set a specific scenario value, overriding the file.
    /// Can be used multiple times. Example: -S contacts.beta=0.02
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
