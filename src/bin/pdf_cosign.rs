//! Inspect and flatten PDF forms from the command line.
//!
//! Usage:
//!   pdf_cosign analyze <input.pdf>
//!   pdf_cosign flatten <input.pdf> <output.pdf>
//!
//! Set `RUST_LOG=debug` for per-field detail.

use pdf_cosign::forms::{extract_fields, flatten_pdf};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

enum Command {
    Analyze { input: PathBuf },
    Flatten { input: PathBuf, output: PathBuf },
}

impl Command {
    fn from_args() -> Option<Self> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        match args.as_slice() {
            [cmd, input] if cmd == "analyze" => Some(Self::Analyze {
                input: PathBuf::from(input),
            }),
            [cmd, input, output] if cmd == "flatten" => Some(Self::Flatten {
                input: PathBuf::from(input),
                output: PathBuf::from(output),
            }),
            _ => None,
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Analyze { input } => {
            let bytes = fs::read(&input)?;
            let fields = extract_fields(&bytes)?;
            log::info!("{}: {} fields", input.display(), fields.len());
            println!("{}", serde_json::to_string_pretty(&fields)?);
        },
        Command::Flatten { input, output } => {
            let bytes = fs::read(&input)?;
            let flat = flatten_pdf(&bytes)?;
            fs::write(&output, &flat)?;
            log::info!("{} -> {} ({} bytes)", input.display(), output.display(), flat.len());
        },
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(command) = Command::from_args() else {
        eprintln!("Usage:");
        eprintln!("  pdf_cosign analyze <input.pdf>");
        eprintln!("  pdf_cosign flatten <input.pdf> <output.pdf>");
        return ExitCode::from(2);
    };

    match run(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
