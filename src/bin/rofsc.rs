use std::{
    fmt,
    io::{self, BufRead, IsTerminal, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressState, ProgressStyle};
use log::info;

use rofs::{fs::create_archive, Error, ErrorKind};

/// Create a ROFS archive from a directory tree
#[derive(Debug, Parser)]
#[clap(name = "rofsc", version)]
struct Args {
    /// The directory to archive
    input: PathBuf,
    /// The archive to create; must not exist yet
    output: PathBuf,
}

/// Percentage of files written, with one decimal.
fn percent(written: u64, total: u64) -> String {
    match total {
        0 => "100.0".into(),
        total => format!("{:.1}", written as f64 * 100.0 / total as f64),
    }
}

fn progress_percent(state: &ProgressState, w: &mut dyn fmt::Write) {
    let _ = w.write_str(&percent(state.pos(), state.len().unwrap_or(0)));
}

fn run(args: &Args) -> Result<()> {
    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::with_template("Creating filesystem... {progress}% ({pos}/{len})")?
            .with_key("progress", progress_percent),
    );

    let summary = create_archive(&args.input, &args.output, &progress)
        .with_context(|| format!("Failed to create {:?}", args.output))?;
    info!(
        "{} directories, {} files, {} bytes",
        summary.directories, summary.files, summary.size
    );

    println!("File written to: {}", args.output.display());
    Ok(())
}

fn wait_for_enter() {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("Press Enter to exit...");
        let _ = io::stderr().flush();
        let _ = stdin.lock().read_line(&mut String::new());
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            wait_for_enter();
            match err.downcast_ref::<Error>().map(Error::kind) {
                Some(ErrorKind::Usage) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 5), "0.0");
        assert_eq!(percent(1, 3), "33.3");
        assert_eq!(percent(2, 3), "66.7");
        assert_eq!(percent(1, 8), "12.5");
        assert_eq!(percent(5, 5), "100.0");
        assert_eq!(percent(0, 0), "100.0");
    }
}
