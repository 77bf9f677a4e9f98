//! Tuning configuration generator executable.

use anyhow::Result;
use clap::Parser;
use gemmtune_synth::cli::{run_cli, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run_cli(cli)
}
