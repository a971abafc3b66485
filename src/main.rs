#![allow(clippy::print_stdout, clippy::print_stderr)]

//! `memory-bank`: local-first context capture, indexing, and retrieval
//! for AI coding-assistant sessions.

use std::io::{self, Write as _};
use std::process::ExitCode;

use clap::Parser;

use memory_bank::cli::output::{format_error, is_oracle_error, OutputFormat};
use memory_bank::cli::{execute, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.format);

    match execute(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                if let Err(e) = write!(io::stdout(), "{output}")
                    && e.kind() != io::ErrorKind::BrokenPipe
                {
                    eprintln!("Error writing to stdout: {e}");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let error_output = format_error(&e, format);
            match format {
                OutputFormat::Json | OutputFormat::Ndjson => println!("{error_output}"),
                OutputFormat::Text => eprintln!("Error: {error_output}"),
            }
            if is_oracle_error(&e) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
