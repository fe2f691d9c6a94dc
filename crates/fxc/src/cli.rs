use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "fxc",
    author,
    version,
    about = "MagpieFX effect compiler",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

/// Overrides for values otherwise taken from `fxc.toml`.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Configuration file (defaults to `fxc.toml` in the config directory).
    #[arg(long, global = true, value_name = "FILE", env = "FXC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip reading and writing the effect cache.
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Compile worker threads (0 = available parallelism).
    #[arg(long, global = true, value_name = "N")]
    pub workers: Option<usize>,

    /// Directory that `#include` names resolve against.
    #[arg(long, global = true, value_name = "DIR")]
    pub effects_dir: Option<PathBuf>,

    /// Directory holding cached descriptors.
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Compile as an inner effect of a chain: no cursor compositing or
    /// viewport offset in the final pass.
    #[arg(long, global = true)]
    pub not_terminal: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile an effect and report its descriptor.
    Compile(CompileArgs),
    /// Parse and generate an effect without compiling or caching it.
    Check(CheckArgs),
    /// Inspect or clear the effect cache.
    Cache(CacheCommand),
}

#[derive(Args, Debug)]
pub struct CompileArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Print the descriptor as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,

    /// Write the generated source of each pass to `DIR/PassN.hlsl`.
    #[arg(long, value_name = "DIR")]
    pub emit_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print the cache directory.
    Where,
    /// Delete every cached descriptor.
    Clear,
}

pub fn parse() -> Cli {
    Cli::parse()
}
