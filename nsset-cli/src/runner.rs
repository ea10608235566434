//! This module builds the namespace set described by the configuration and
//! executes the requested command inside it.

use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};
use clap::Parser;
use nix::unistd::Pid;
use nsset_core::{enter_on_exec, unshare_with, Set};

use crate::adapter::{adapt_and_validate, Config, Source};
use crate::parser::Cli;

/// Runs the nsrun CLI application with the provided arguments.
pub fn run_clap(args: Vec<String>) -> Result<i32> {
    let cli = Cli::parse_from(args);
    let config = adapt_and_validate(cli)?;
    run(config)
}

fn run(config: Config) -> Result<i32> {
    let set = match &config.source {
        Source::Unshare => {
            unshare_with(config.mask, &config.opts).context("failed to create namespaces")?
        }
        Source::Pid(pid) => Set::from_pid(Pid::from_raw(*pid), config.mask)
            .with_context(|| format!("failed to open namespaces of pid {pid}"))?,
        Source::Dir(dir) => Set::from_dir(dir, config.mask)
            .with_context(|| format!("failed to open namespaces under {}", dir.display()))?,
    };

    if let Some(dir) = &config.persist {
        set.mount(dir)
            .with_context(|| format!("failed to persist namespaces to {}", dir.display()))?;
    }

    if config.command.is_empty() {
        set.close();
        return Ok(0);
    }

    exec_command(set, &config.command)
}

fn exec_command(set: Set, argv: &[String]) -> Result<i32> {
    let mut command = Command::new(&argv[0]);
    command.args(&argv[1..]);

    // The forked child enters the whole set, a user namespace included,
    // before it execs.
    enter_on_exec(&mut command, set);

    let status = command
        .status()
        .with_context(|| format!("failed to run {:?}", argv[0]))?;
    Ok(propagate_exit_status(status))
}

/// Maps an exit status to a shell-style exit code.
fn propagate_exit_status(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        code
    } else if let Some(signal) = status.signal() {
        128 + signal
    } else {
        1
    }
}
