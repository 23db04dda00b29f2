//! Policy driven merge of two env files.
//!
//! # Merge Logic
//!
//! The merge process:
//! 1. Walks the variables of the first file in order
//! 2. For each variable:
//!    - Emits the comment blocks selected by [`CommentsHandling`]
//!    - Resolves the value against the first matching key of the second file
//!      using [`ConflictResolution`] and [`EmptyValueHandling`]
//!    - Keys missing from the second file are kept or dropped per [`PresenceHandling`]
//! 3. Appends the variables found only in the second file, per [`PresenceHandling`]
//! 4. Appends the trailing comments of both files, per [`CommentsHandling`]
//! 5. Optionally sorts the variable lines by key. Comment lines then follow all
//!    variables in their original relative order.
//!
//! # Examples
//!
//! ```rust
//! use env_diff::merge::{MergePolicy, Source, merge_env_files};
//!
//! let lines = merge_env_files("A=1\nB=\n", "B=2\nC=3\n", &MergePolicy::default());
//! let content: Vec<_> = lines.iter().map(|line| line.content.as_str()).collect();
//!
//! assert_eq!(content, vec!["A=1", "B=2", "C=3"]);
//! assert_eq!(lines[1].source, Source::Second);
//! ```

use std::borrow::Cow;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::parse::{ASSIGNMENT_OPERATOR, EnvFile, EnvVariable, parse_env_file};

/// Which file wins when both define a non-empty, different value.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
  First,
  #[default]
  Second,
}

/// What to do when the winning value is empty but the other one is not.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyValueHandling {
  KeepEmpty,
  #[default]
  UseOther,
}

/// What to do with keys defined in only one of the files.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum PresenceHandling {
  Omit,
  #[default]
  IncludeAll,
  IncludeFirstOnly,
  IncludeSecondOnly,
}

impl PresenceHandling {
  fn includes_first(self) -> bool {
    matches!(self, Self::IncludeAll | Self::IncludeFirstOnly)
  }

  fn includes_second(self) -> bool {
    matches!(self, Self::IncludeAll | Self::IncludeSecondOnly)
  }
}

/// Which comment blocks end up in the output.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CommentsHandling {
  Remove,
  FirstOnly,
  SecondOnly,
  /// Keep both blocks; lines present in both are written once.
  #[default]
  Both,
}

/// Rules governing how two files combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MergePolicy {
  pub conflict_resolution: ConflictResolution,
  pub empty_value_handling: EmptyValueHandling,
  pub presence_handling: PresenceHandling,
  pub comments_handling: CommentsHandling,
  /// Sort variable lines by key; comment lines move after all variables.
  pub sort_alphabetically: bool,
  /// Drop variables whose resolved value is blank.
  pub remove_empty: bool,
}

/// Which input a merged line comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
  First,
  Second,
  Both,
  /// Not attributable to either input.
  None,
}

impl Source {
  pub fn as_str(self) -> &'static str {
    match self {
      Source::First => "first",
      Source::Second => "second",
      Source::Both => "both",
      Source::None => "none",
    }
  }
}

/// One line of merge output: either a `KEY=VALUE` line or a raw comment line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedLine {
  pub content: String,
  pub source: Source,
  pub is_comment: bool,
}

impl MergedLine {
  pub fn variable(key: &str, value: &str, source: Source) -> Self {
    Self {
      content: format!("{key}{ASSIGNMENT_OPERATOR}{value}"),
      source,
      is_comment: false,
    }
  }

  pub fn comment(content: impl Into<String>, source: Source) -> Self {
    Self {
      content: content.into(),
      source,
      is_comment: true,
    }
  }

  /// Key portion of a variable line; `None` for comment lines.
  pub fn key(&self) -> Option<&str> {
    if self.is_comment {
      return None;
    }
    Some(
      self
        .content
        .split_once(ASSIGNMENT_OPERATOR)
        .map_or(self.content.as_str(), |(key, _)| key),
    )
  }
}

/// Parses both texts and merges them under `policy`.
pub fn merge_env_files(
  first_text: &str,
  second_text: &str,
  policy: &MergePolicy,
) -> Vec<MergedLine> {
  let first = parse_env_file(first_text);
  let second = parse_env_file(second_text);
  merge_env(&first, &second, policy)
}

/// Merges two parsed files under `policy`.
///
/// Lookups resolve to the first variable declaring a key. Every variable of
/// either file is visited once, so duplicated keys produce one line each.
pub fn merge_env(
  first: &EnvFile<'_>,
  second: &EnvFile<'_>,
  policy: &MergePolicy,
) -> Vec<MergedLine> {
  #[cfg(feature = "tracing")]
  debug!(
    ?policy,
    "Merging {} first variables with {} second variables",
    first.variables.len(),
    second.variables.len()
  );

  let first_index = first.index();
  let second_index = second.index();
  let mut merger = Merger::new(policy);

  for var in first.variables.iter().filter(|var| !var.is_trailing_comments()) {
    match second_index.get(var.key.as_ref()) {
      Some(other) => {
        merger.push_comments(Some(&var.comments[..]), Some(&other.comments[..]));
        let (value, source) = merger.resolve(var, other);
        merger.push_variable(&var.key, value, source);
      }
      None if policy.presence_handling.includes_first() => {
        merger.push_comments(Some(&var.comments[..]), None);
        merger.push_variable(&var.key, &var.value, Source::First);
      }
      None => {
        #[cfg(feature = "tracing")]
        trace!("Omitting {} found only in the first file", var.key);
      }
    }
  }

  if policy.presence_handling.includes_second() {
    for var in second
      .variables
      .iter()
      .filter(|var| !var.is_trailing_comments() && !first_index.contains_key(var.key.as_ref()))
    {
      merger.push_comments(None, Some(&var.comments[..]));
      merger.push_variable(&var.key, &var.value, Source::Second);
    }
  }

  merger.push_comments(first.trailing_comments(), second.trailing_comments());

  let lines = merger.finish();

  #[cfg(feature = "tracing")]
  debug!("Merged into {} lines", lines.len());

  lines
}

struct Merger<'p> {
  policy: &'p MergePolicy,
  lines: Vec<MergedLine>,
}

impl<'p> Merger<'p> {
  fn new(policy: &'p MergePolicy) -> Self {
    Self {
      policy,
      lines: Vec::new(),
    }
  }

  fn push_comments(&mut self, first: Option<&[Cow<'_, str>]>, second: Option<&[Cow<'_, str>]>) {
    match self.policy.comments_handling {
      CommentsHandling::Remove => {}
      CommentsHandling::FirstOnly => self.push_block(first, Source::First),
      CommentsHandling::SecondOnly => self.push_block(second, Source::Second),
      CommentsHandling::Both => match (first, second) {
        (Some(first), Some(second)) => {
          let mut union: IndexMap<&str, Source> = IndexMap::new();
          for line in first {
            union.entry(line.as_ref()).or_insert(Source::First);
          }
          for line in second {
            union
              .entry(line.as_ref())
              .and_modify(|source| {
                if *source == Source::First {
                  *source = Source::Both;
                }
              })
              .or_insert(Source::Second);
          }
          self
            .lines
            .extend(union.into_iter().map(|(line, source)| MergedLine::comment(line, source)));
        }
        (first, None) => self.push_block(first, Source::First),
        (None, second) => self.push_block(second, Source::Second),
      },
    }
  }

  fn push_block(&mut self, block: Option<&[Cow<'_, str>]>, source: Source) {
    for line in block.unwrap_or_default() {
      self.lines.push(MergedLine::comment(line.to_string(), source));
    }
  }

  /// Picks the value for a key defined in both files.
  fn resolve<'v>(
    &self,
    first: &'v EnvVariable<'_>,
    second: &'v EnvVariable<'_>,
  ) -> (&'v str, Source) {
    if first.value == second.value {
      return (&first.value, Source::Both);
    }

    let (preferred, other) = match self.policy.conflict_resolution {
      ConflictResolution::First => ((first, Source::First), (second, Source::Second)),
      ConflictResolution::Second => ((second, Source::Second), (first, Source::First)),
    };

    let preferred_empty = is_blank(&preferred.0.value);
    let other_empty = is_blank(&other.0.value);

    let (winner, source) = if preferred_empty
      && !other_empty
      && self.policy.empty_value_handling == EmptyValueHandling::UseOther
    {
      other
    } else {
      preferred
    };

    #[cfg(feature = "tracing")]
    trace!("Resolved {} from the {} file", first.key, source.as_str());

    (&winner.value, source)
  }

  fn push_variable(&mut self, key: &str, value: &str, source: Source) {
    if self.policy.remove_empty && is_blank(value) {
      #[cfg(feature = "tracing")]
      trace!("Removing empty variable {}", key);
      return;
    }
    self.lines.push(MergedLine::variable(key, value, source));
  }

  fn finish(self) -> Vec<MergedLine> {
    if !self.policy.sort_alphabetically {
      return self.lines;
    }

    let (comments, mut variables): (Vec<_>, Vec<_>) =
      self.lines.into_iter().partition(|line| line.is_comment);
    variables.sort_by(|a, b| a.key().cmp(&b.key()));
    variables.extend(comments);
    variables
  }
}

fn is_blank(value: &str) -> bool {
  value.trim().is_empty()
}
