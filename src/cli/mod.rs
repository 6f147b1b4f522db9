use std::fs::File;
use std::path::{Path, PathBuf};

use dialoguer::Confirm;
use dialoguer::theme::ColorfulTheme;
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Missing input argument: {0}.")]
    MissingInputArg(String),
    #[error("Invalid value for {0}: {1}.")]
    InvalidArg(String, String),
    #[error("Could not find file \"{0}\".")]
    FileNotFound(String),
    #[error("Provided file \"{0}\" is a directory.")]
    FileIsDirectory(String),
    #[error("File \"{0}\" already exists.")]
    FileExists(String),
    #[error("I/O error for {0}: {1}.")]
    IO(String, #[source] std::io::Error),
}

/// Check an output path, asking before an existing file may be replaced.
/// With `overwrite` set, existing files are accepted without asking. The
/// file itself is left untouched until [`create_output_file`].
pub fn parse_output_path(input: &str, overwrite: bool) -> Result<PathBuf, CliError> {
    let path = PathBuf::from(input);

    if path.is_dir() {
        Err(CliError::FileIsDirectory(input.to_string()))
    } else if path.exists() {
        let confirmed = overwrite || matches!(
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(format!("File \"{}\" exists, overwrite?", input))
                .default(false).wait_for_newline(true).interact_opt(),
            Ok(Some(true))
        );

        if confirmed {
            Ok(path)
        } else {
            Err(CliError::FileExists(input.to_string()))
        }
    } else {
        Ok(path)
    }
}

/// Create or truncate a path accepted by [`parse_output_path`].
pub fn create_output_file(path: &Path) -> Result<File, CliError> {
    File::create(path).map_err(|io_err| CliError::IO(path.display().to_string(), io_err))
}

/// Check that an input path names an existing regular file.
pub fn parse_input_path(input: Option<&str>, arg: &str) -> Result<PathBuf, CliError> {
    let input = input.ok_or_else(|| CliError::MissingInputArg(arg.to_string()))?;
    let path = PathBuf::from(input);

    if !path.exists() {
        Err(CliError::FileNotFound(input.to_string()))
    } else if path.is_dir() {
        Err(CliError::FileIsDirectory(input.to_string()))
    } else {
        Ok(path)
    }
}

/// Accepts a single character, or `tab`.
pub fn parse_delimiter(input: &str) -> Result<u8, CliError> {
    match input {
        "tab" | "\\t" => Ok(b'\t'),
        s if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        s => Err(CliError::InvalidArg("delimiter".to_string(), s.to_string())),
    }
}

pub fn print_output(msg: String, quiet: bool) {
    if !quiet {
        eprint!("{}", msg);
    }
}

pub fn make_progress_bar(len: u64, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new(len);
    pb.set_style(ProgressStyle::default_bar()
        .template("        {bar:40.cyan/blue} {pos:>7}/{len:7} rows [{elapsed_precise}]")
        .progress_chars("##-"));
    Some(pb)
}

/// Log library events to stderr. `RUST_LOG` overrides the default level.
pub fn init_tracing(quiet: bool) {
    let default = if quiet { "quake_alert=error" } else { "quake_alert=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // Ignore a second initialization (e.g. from tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn exit_with_error(e: Box<dyn std::error::Error>) -> ! {
    eprintln!("Error: {}", e);
    std::process::exit(1)
}
