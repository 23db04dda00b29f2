//! Loading the two env files and writing merge results.
//!
//! The diff and merge engines only ever see resolved text. This module is
//! where that text comes from: files on disk, stdin, or the bundled samples.
//!
//! # Examples
//!
//! ```rust,no_run
//! use env_diff::files::{EnvMerge, MergeFileOptions, MergeFormat};
//! use env_diff::merge::MergePolicy;
//! use std::path::PathBuf;
//!
//! let options = MergeFileOptions {
//!   first: PathBuf::from(".env"),
//!   second: PathBuf::from(".env.production"),
//!   output: PathBuf::from(".env.merged"),
//!   policy: MergePolicy::default(),
//!   format: MergeFormat::Env,
//! };
//!
//! EnvMerge::merge_with_options(options).unwrap();
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::{debug, info};

use crate::diff::{DiffRecord, diff_env_files};
use crate::merge::{MergePolicy, MergedLine, merge_env_files};
use crate::parse::parse_env_file;
use crate::render::{Theme, merge_to_json, render_merge};

/// Path that stands for standard input.
pub const STDIN_PATH: &str = "-";

const SAMPLE_FIRST: &str = include_str!("../../samples/first.env");
const SAMPLE_SECOND: &str = include_str!("../../samples/second.env");

/// The raw text of the two files being compared or merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inputs {
  pub first: String,
  pub second: String,
}

impl Inputs {
  /// A bundled pair of env files to try the tool with.
  pub fn sample() -> Self {
    Self {
      first: SAMPLE_FIRST.to_string(),
      second: SAMPLE_SECOND.to_string(),
    }
  }

  /// Reads both inputs. At most one of them may be `-` (stdin).
  pub fn read<P: AsRef<Path>>(first: P, second: P) -> Result<Self, InputError> {
    let (first, second) = (first.as_ref(), second.as_ref());

    if is_stdin(first) && is_stdin(second) {
      return Err(InputError::BothStdin);
    }

    #[cfg(feature = "tracing")]
    debug!(?first, ?second, "Reading inputs");

    Ok(Self {
      first: read_input(first).map_err(|err| err.into_error(InputError::FirstIo))?,
      second: read_input(second).map_err(|err| err.into_error(InputError::SecondIo))?,
    })
  }

  pub fn diff(&self) -> Vec<DiffRecord<'_>> {
    diff_env_files(&self.first, &self.second)
  }

  pub fn merge(&self, policy: &MergePolicy) -> Vec<MergedLine> {
    merge_env_files(&self.first, &self.second, policy)
  }

  /// Keys declared more than once in the first and in the second input.
  ///
  /// Lookups only ever see the first declaration of such a key.
  pub fn duplicate_keys(&self) -> (Vec<String>, Vec<String>) {
    let duplicates = |text: &str| -> Vec<String> {
      parse_env_file(text)
        .duplicate_keys()
        .into_iter()
        .map(str::to_string)
        .collect()
    };
    (duplicates(&self.first), duplicates(&self.second))
  }
}

/// Failure to read one input: either it is missing or reading it failed.
enum ReadFailure {
  NotFound(PathBuf),
  Io(std::io::Error),
}

impl ReadFailure {
  fn into_error(self, io: fn(std::io::Error) -> InputError) -> InputError {
    match self {
      ReadFailure::NotFound(path) => InputError::NotFound(path),
      ReadFailure::Io(err) => io(err),
    }
  }
}

fn is_stdin(path: &Path) -> bool {
  path.as_os_str() == STDIN_PATH
}

fn read_input(path: &Path) -> Result<String, ReadFailure> {
  if is_stdin(path) {
    let mut text = String::new();
    std::io::stdin()
      .read_to_string(&mut text)
      .map_err(ReadFailure::Io)?;
    return Ok(text);
  }

  if !path.exists() {
    return Err(ReadFailure::NotFound(path.to_path_buf()));
  }

  std::fs::read_to_string(path).map_err(ReadFailure::Io)
}

/// Merges two env files on disk into a third one.
pub struct EnvMerge;

impl EnvMerge {
  /// Reads both inputs, merges them under the policy and writes the result.
  ///
  /// The output file is created or overwritten.
  pub fn merge_with_options(options: MergeFileOptions) -> Result<Vec<MergedLine>, InputError> {
    let MergeFileOptions {
      first,
      second,
      output,
      policy,
      format,
    } = options;

    let inputs = Inputs::read(&first, &second)?;
    Self::merge_into(&inputs, output, &policy, format)
  }

  /// Merges already loaded inputs and writes the result to `output`.
  pub fn merge_into<P: AsRef<Path>>(
    inputs: &Inputs,
    output: P,
    policy: &MergePolicy,
    format: MergeFormat,
  ) -> Result<Vec<MergedLine>, InputError> {
    #[cfg(feature = "tracing")]
    info!("Starting env merge");

    let lines = inputs.merge(policy);
    let content = match format {
      MergeFormat::Env => render_merge(&lines, false, &Theme::plain()),
      MergeFormat::Json => merge_to_json(&lines)? + "\n",
    };
    write_output(output, &content)?;

    #[cfg(feature = "tracing")]
    info!("Merge completed successfully");

    Ok(lines)
  }
}

/// Shape of a merge result written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeFormat {
  /// A plain env file.
  #[default]
  Env,
  /// The merged lines with their sources, as JSON.
  Json,
}

/// Writes `content` to `path`, replacing any existing file.
pub fn write_output<P: AsRef<Path>>(path: P, content: &str) -> Result<(), InputError> {
  #[cfg(feature = "tracing")]
  debug!("Writing merged content to {:?}", path.as_ref());

  std::fs::write(path, content).map_err(InputError::Write)
}

/// Errors that can occur while loading inputs or writing output.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
  /// Error reading the first input
  #[error("First file IO error: {0}")]
  FirstIo(std::io::Error),
  /// Error reading the second input
  #[error("Second file IO error: {0}")]
  SecondIo(std::io::Error),
  /// An input file does not exist
  #[error("Input file not found: {0}")]
  NotFound(PathBuf),
  /// Both inputs asked for stdin
  #[error("Only one input can be read from stdin")]
  BothStdin,
  /// Error writing the merged content
  #[error("Write error: {0}")]
  Write(std::io::Error),
  /// Error serializing the merged content
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

/// Configuration for merging two files on disk.
pub struct MergeFileOptions {
  /// Path to the first env file.
  pub first: PathBuf,
  /// Path to the second env file.
  pub second: PathBuf,
  /// Where the merged env file is written.
  pub output: PathBuf,
  pub policy: MergePolicy,
  pub format: MergeFormat,
}
