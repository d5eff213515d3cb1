//! turbopopen CLI
//!
//! Runs a command line through the shell and pipes this process's stdout
//! (mode `r`) or stdin (mode `w`) through it, then exits with the
//! command's exit code.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use turbopopen::{Direction, LaunchConfig, Popen};

#[derive(Parser, Debug)]
#[command(name = "turbopopen")]
#[command(author, version, about = "Run a shell command over a pipe", long_about = None)]
struct Cli {
    /// "r" copies the command's output to stdout, "w" feeds stdin to the command
    #[arg(short, long, default_value = "r", value_name = "r|w")]
    mode: Direction,

    /// Shell used to run the command (default: /bin/sh)
    #[arg(long, value_name = "PATH")]
    shell: Option<PathBuf>,

    /// Command line passed to the shell's -c
    #[arg(value_name = "COMMAND")]
    command: String,
}

fn main() -> ExitCode {
    // Logs go to stderr; stdout may be carrying the child's bytes.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("turbopopen: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<u8> {
    let mut config = LaunchConfig::default();
    if let Some(shell) = &cli.shell {
        config = config.with_shell(shell);
    }

    let mut session = Popen::with_config(config);
    let mut stream = session
        .spawn(&cli.command, cli.mode)
        .with_context(|| format!("failed to launch {:?}", cli.command))?;

    let copied = match cli.mode {
        Direction::ReadFromChild => {
            let mut stdout = io::stdout().lock();
            io::copy(&mut stream, &mut stdout).and_then(|n| stdout.flush().map(|_| n))
        }
        Direction::WriteToChild => io::copy(&mut io::stdin().lock(), &mut stream),
    };

    // Collect the child even when copying failed.
    let finished = session.finish(stream);

    let bytes = copied.context("copying data through the pipe failed")?;
    tracing::debug!(bytes, mode = %cli.mode, "copy complete");

    let code = finished.context("failed to collect the command's exit status")?;
    Ok(u8::try_from(code).unwrap_or(u8::MAX))
}
