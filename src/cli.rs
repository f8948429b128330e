use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::commands;

#[derive(Debug, Parser)]
#[command(name = "build-id")]
#[command(about = "Print a stable fingerprint of the configured C/C++ toolchain")]
pub struct Cli {
    #[arg(long)]
    pub json: bool,

    /// Report probes that fail or exit non-zero on stderr.
    #[arg(long)]
    pub verbose: bool,

    /// Dotenv file layered under the process environment.
    #[arg(long, value_name = "PATH")]
    pub env_file: Option<PathBuf>,

    /// Salt tokens, joined by single spaces into the fingerprint input.
    ///
    /// Options must come before the first salt token: everything from that
    /// token on is salt, including words such as `--json`. Use `--` to start
    /// the salt with a word that looks like an option.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub salt: Vec<String>,
}

fn print_report(report: &commands::BuildIdReport, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("{}", report.build_id);
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = commands::build_id::run(&commands::build_id::BuildIdOptions {
        salt: cli.salt,
        env_file: cli.env_file,
        verbose: cli.verbose,
    })?;

    print_report(&report, cli.json)
}
