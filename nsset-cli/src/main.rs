use anyhow::Result;
use nsset_cli::runner;
use std::{env, process};

fn main() {
    let args: Vec<String> = env::args().collect();
    let exit_code = match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("nsrun: {e:#}");
            1
        }
    };
    process::exit(exit_code);
}

fn run(args: Vec<String>) -> Result<i32> {
    runner::run_clap(args)
}
