use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a WAV file through an effect chain
    Render(RenderArgs),
    /// Print the built-in effects and their parameters as JSON
    List,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Input WAV file (integer or float samples)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output WAV file, written as 32-bit float
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Preset JSON describing the chain (defaults to feedback suppression only)
    #[arg(long)]
    pub preset: Option<PathBuf>,

    /// Frames per processing block
    #[arg(long, default_value_t = 128, value_parser = clap::value_parser!(u32).range(1..))]
    pub block_size: u32,

    /// Keep the chain's algorithmic delay at the start of the output
    #[arg(long, default_value_t = false)]
    pub no_latency_compensation: bool,
}
