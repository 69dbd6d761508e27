use clap::Parser;
use colored::*;
use pssession_processor::cli::{Args, run, setup_logging};
use std::process;

fn main() {
    let args = Args::parse();
    setup_logging(&args);

    match run(&args) {
        Ok(code) => process::exit(code),
        Err(error) => {
            eprintln!("{} {:#}", "Error:".red().bold(), error);
            process::exit(1);
        }
    }
}
