//! CLI argument handling: `-o/--output <path>` and `-t/--tab-size <0..8>`.
//! The declarative [`Tree`] itself is never parsed from the command
//! line — it is authored directly as Rust values by the calling
//! binary, which hands it to [`run`].

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rtu_ir::Tree;

use crate::{generate, GenerationReport};

/// Generate a Modbus RTU decode/reply state machine from a declarative
/// device tree.
#[derive(Parser, Debug)]
#[command(name = "rtu-codegen", about = "Generate a Modbus RTU state machine")]
pub struct Args {
    /// Write the generated text to this file instead of standard output.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Indentation width, in spaces (0..=8).
    #[arg(short, long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(0..=8))]
    pub tab_size: u8,
}

/// Parses [`Args`] from the process's command line, builds and renders
/// `tree`, and writes the result to `--output` or standard output.
///
/// Exits `0` on success. On any [`crate::BuildError`] or I/O failure,
/// prints `Error: {message}` to standard error and exits `1` — no
/// partial artifact is ever written, matching the original tool's
/// `print("Error: " + str(e))` on its single exception type.
#[must_use]
pub fn run(tree: &Tree) -> ExitCode {
    let args = Args::parse();
    match try_run(&args, tree) {
        Ok(report) => {
            if args.output.is_some() {
                eprintln!(
                    "Generated {} states ({} transitions, {} terminals), buffer size {}, {} bytes written",
                    report.state_count,
                    report.transition_count,
                    report.terminal_count,
                    report.buffer_size,
                    report.bytes_written
                );
            }
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}

/// The testable core of [`run`]: takes already-parsed `args`, returns a
/// [`GenerationReport`] on success or the error message that would be
/// printed on failure, rather than exiting the process.
///
/// # Errors
///
/// Returns the build or I/O error message, already formatted for
/// display — never a partial write.
pub fn try_run(args: &Args, tree: &Tree) -> Result<GenerationReport, String> {
    let tab = " ".repeat(args.tab_size as usize);

    let (text, report) = generate(tree, &tab).map_err(|e| e.to_string())?;

    match &args.output {
        Some(path) => fs::write(path, &text).map_err(|e| e.to_string())?,
        None => std::io::stdout()
            .write_all(text.as_bytes())
            .map_err(|e| e.to_string())?,
    }

    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rtu_ir::{CallbackParam, CallbackProto, Command, Device, DeviceAddress, Matcher, ValueKind};

    fn single_read_tree() -> Tree {
        Tree::new()
            .with_callback(CallbackProto::new(
                "on_read",
                vec![CallbackParam::new(ValueKind::U16)],
            ))
            .with_device(Device::new(
                DeviceAddress::Fixed(1),
                vec![Command::calling(
                    vec![
                        Matcher::exact(ValueKind::U8, 0x03).unwrap(),
                        Matcher::range(ValueKind::U16, 0, 0x100).unwrap(),
                    ],
                    "on_read",
                )],
            ))
    }

    #[test]
    fn writes_to_requested_output_file() {
        let dir = std::env::temp_dir().join(format!(
            "rtu-codegen-cli-test-{:?}",
            std::thread::current().id()
        ));
        fs::create_dir_all(&dir).unwrap();
        let out = dir.join("slave.hpp");

        let args = Args {
            output: Some(out.clone()),
            tab_size: 4,
        };
        let report = try_run(&args, &single_read_tree()).unwrap();
        assert!(report.bytes_written > 0);
        let contents = fs::read_to_string(&out).unwrap();
        assert!(contents.contains("on_read"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn build_error_is_reported() {
        let args = Args {
            output: None,
            tab_size: 4,
        };
        let err = try_run(&args, &Tree::new()).unwrap_err();
        assert!(err.contains("no callbacks"));
    }
}
