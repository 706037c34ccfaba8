use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;

pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Take over stdin/stdout and serve the parent until it closes the channel.
    Serve(ServeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Directory for materialized resource files. Default: current directory.
    #[arg(long, value_name = "DIR")]
    pub resource_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
