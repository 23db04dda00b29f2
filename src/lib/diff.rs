//! Key-aligned diff of two env files.
//!
//! Variables of the old file keep their order. Variables that only exist in
//! the new file are inserted right after the nearest preceding key both files
//! share, so the result reads like a patch.
//!
//! # Examples
//!
//! ```rust
//! use env_diff::diff::{DiffType, diff_env_files};
//!
//! let diff = diff_env_files("A=1\n", "A=1\nB=2\n");
//!
//! assert_eq!(diff.len(), 2);
//! assert_eq!(diff[1].key, "B");
//! assert_eq!(diff[1].diff_type(), DiffType::Added);
//! ```

use std::borrow::Cow;

use serde::Serialize;

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::comment::{CommentFragment, diff_comments};
use crate::parse::{EnvFile, parse_env_file};

/// Comments attached to a diff record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DiffComments<'a> {
  /// The block is the same on both sides, or only one side has the key.
  Raw(Vec<Cow<'a, str>>),
  /// Line diff between the old and new block.
  Diff(Vec<CommentFragment>),
}

/// The state of one key across the old and new file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRecord<'a> {
  pub key: Cow<'a, str>,
  pub old_value: Option<Cow<'a, str>>,
  pub new_value: Option<Cow<'a, str>>,
  pub comments: DiffComments<'a>,
}

impl<'a> DiffRecord<'a> {
  pub fn diff_type(&self) -> DiffType {
    get_diff_type(self)
  }

  /// Record carrying the comments found after the last variable.
  pub fn is_trailing_comments(&self) -> bool {
    self.key.is_empty()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiffType {
  Added,
  Removed,
  Changed,
  Unchanged,
}

/// Classifies a record.
///
/// An empty value counts as absent when deciding between added and removed.
/// Any other difference, including an empty value against a missing one, is
/// a change.
pub fn get_diff_type(record: &DiffRecord<'_>) -> DiffType {
  let old = record.old_value.as_deref().filter(|value| !value.is_empty());
  let new = record.new_value.as_deref().filter(|value| !value.is_empty());

  match (old, new) {
    (None, Some(_)) => DiffType::Added,
    (Some(_), None) => DiffType::Removed,
    _ if record.old_value != record.new_value => DiffType::Changed,
    _ => DiffType::Unchanged,
  }
}

/// Parses both texts and aligns their variables by key.
pub fn diff_env_files<'a>(old_text: &'a str, new_text: &'a str) -> Vec<DiffRecord<'a>> {
  let old = parse_env_file(old_text);
  let new = parse_env_file(new_text);
  diff_env(&old, &new)
}

/// Aligns the variables of two parsed files by key.
///
/// Lookups resolve to the first variable declaring a key.
pub fn diff_env<'a>(old: &EnvFile<'a>, new: &EnvFile<'a>) -> Vec<DiffRecord<'a>> {
  #[cfg(feature = "tracing")]
  debug!(
    "Diffing {} old variables against {} new variables",
    old.variables.len(),
    new.variables.len()
  );

  let old_index = old.index();
  let new_index = new.index();

  let mut diffs: Vec<DiffRecord<'a>> = old
    .variables
    .iter()
    .map(|old_var| {
      let new_var = new_index.get(old_var.key.as_ref()).copied();

      let comments = match new_var {
        Some(new_var) if new_var.comments != old_var.comments => {
          DiffComments::Diff(diff_comments(&old_var.comments, &new_var.comments))
        }
        _ => DiffComments::Raw(old_var.comments.clone()),
      };

      DiffRecord {
        key: old_var.key.clone(),
        old_value: Some(old_var.value.clone()),
        new_value: new_var.map(|var| var.value.clone()),
        comments,
      }
    })
    .collect();

  let mut insert_at = 0;
  for new_var in &new.variables {
    if old_index.contains_key(new_var.key.as_ref()) {
      if let Some(position) = diffs.iter().position(|diff| diff.key == new_var.key) {
        insert_at = position + 1;
      }
      continue;
    }

    #[cfg(feature = "tracing")]
    trace!("Inserting new key {:?} at {}", new_var.key, insert_at);

    diffs.insert(
      insert_at,
      DiffRecord {
        key: new_var.key.clone(),
        old_value: Some(Cow::Borrowed("")),
        new_value: Some(new_var.value.clone()),
        comments: DiffComments::Raw(new_var.comments.clone()),
      },
    );
    insert_at += 1;
  }

  #[cfg(feature = "tracing")]
  debug!("Produced {} diff records", diffs.len());

  diffs
}

/// Stably orders records by key. The trailing comment record stays last.
pub fn sort_by_key(records: &mut [DiffRecord<'_>]) {
  records.sort_by(|a, b| {
    (a.is_trailing_comments(), &a.key).cmp(&(b.is_trailing_comments(), &b.key))
  });
}

/// Number of records per diff type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DiffStats {
  pub added: usize,
  pub removed: usize,
  pub changed: usize,
  pub unchanged: usize,
}

impl DiffStats {
  pub fn from_records(records: &[DiffRecord<'_>]) -> Self {
    let mut stats = Self::default();
    for record in records.iter().filter(|r| !r.is_trailing_comments()) {
      match record.diff_type() {
        DiffType::Added => stats.added += 1,
        DiffType::Removed => stats.removed += 1,
        DiffType::Changed => stats.changed += 1,
        DiffType::Unchanged => stats.unchanged += 1,
      }
    }
    stats
  }

  pub fn has_changes(&self) -> bool {
    self.added + self.removed + self.changed > 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::comment::FragmentTag;

  fn keys<'a>(records: &'a [DiffRecord<'_>]) -> Vec<&'a str> {
    records.iter().map(|r| r.key.as_ref()).collect()
  }

  #[test]
  fn test_changed_value() {
    let diff = diff_env_files("A=1\n", "A=2\n");

    assert_eq!(diff.len(), 1);
    assert_eq!(diff[0].key, "A");
    assert_eq!(diff[0].old_value.as_deref(), Some("1"));
    assert_eq!(diff[0].new_value.as_deref(), Some("2"));
    assert_eq!(diff[0].diff_type(), DiffType::Changed);
  }

  #[test]
  fn test_added_key_follows_its_neighbour() {
    let diff = diff_env_files("A=1\n", "A=1\nB=2\n");

    assert_eq!(keys(&diff), vec!["A", "B"]);
    assert_eq!(diff[0].new_value.as_deref(), Some("1"));
    assert_eq!(diff[1].old_value.as_deref(), Some(""));
    assert_eq!(diff[1].new_value.as_deref(), Some("2"));
    assert_eq!(diff[1].diff_type(), DiffType::Added);
  }

  #[test]
  fn test_interleaved_insertions() {
    let diff = diff_env_files("A=1\nC=3", "B=2\nA=1\nD=4\nC=3\nE=5");

    assert_eq!(keys(&diff), vec!["B", "A", "D", "C", "E"]);
  }

  #[test]
  fn test_removed_key_keeps_old_position() {
    let diff = diff_env_files("A=1\nB=2\nC=3", "A=1\nC=3\nX=9");

    assert_eq!(keys(&diff), vec!["A", "B", "C", "X"]);
    assert_eq!(diff[1].new_value, None);
    assert_eq!(diff[1].diff_type(), DiffType::Removed);
  }

  #[test]
  fn test_identical_files() {
    let text = "# db\nDB=x\n\nPORT=1\n# end";
    let diff = diff_env_files(text, text);

    assert!(diff.iter().all(|r| r.old_value == r.new_value));
    assert!(diff.iter().all(|r| r.diff_type() == DiffType::Unchanged));
    assert!(diff.iter().all(|r| matches!(r.comments, DiffComments::Raw(_))));
  }

  #[test]
  fn test_comment_diff_only_when_blocks_differ() {
    let diff = diff_env_files("# same\nA=1\n# old\nB=2", "# same\nA=1\n# new\nB=2");

    assert_eq!(diff[0].comments, DiffComments::Raw(vec![Cow::Borrowed("# same")]));
    assert_eq!(
      diff[1].comments,
      DiffComments::Diff(vec![
        CommentFragment::new("# old", FragmentTag::Removed),
        CommentFragment::new("# new", FragmentTag::Added),
      ])
    );
  }

  #[test]
  fn test_new_key_keeps_its_own_comments() {
    let diff = diff_env_files("A=1", "A=1\n# brand new\nB=2");

    assert_eq!(diff[1].comments, DiffComments::Raw(vec![Cow::Borrowed("# brand new")]));
  }

  #[test]
  fn test_duplicate_keys_resolve_to_first_occurrence() {
    let diff = diff_env_files("A=1\nA=2", "A=3\nA=4");

    assert_eq!(diff.len(), 2);
    assert!(diff.iter().all(|r| r.new_value.as_deref() == Some("3")));
  }

  #[test]
  fn test_diff_types() {
    let record = |old: Option<&'static str>, new: Option<&'static str>| DiffRecord {
      key: Cow::Borrowed("K"),
      old_value: old.map(Cow::Borrowed),
      new_value: new.map(Cow::Borrowed),
      comments: DiffComments::Raw(Vec::new()),
    };

    assert_eq!(record(Some(""), Some("1")).diff_type(), DiffType::Added);
    assert_eq!(record(Some("1"), None).diff_type(), DiffType::Removed);
    assert_eq!(record(Some("1"), Some("")).diff_type(), DiffType::Removed);
    assert_eq!(record(Some("1"), Some("2")).diff_type(), DiffType::Changed);
    assert_eq!(record(Some("1"), Some("1")).diff_type(), DiffType::Unchanged);
    assert_eq!(record(Some(""), None).diff_type(), DiffType::Changed);
    assert_eq!(record(Some(""), Some("")).diff_type(), DiffType::Unchanged);
  }

  #[test]
  fn test_removed_empty_value_is_a_change() {
    let diff = diff_env_files("A=1\nEMPTY=\n", "A=1\n");

    assert_eq!(diff[1].key, "EMPTY");
    assert_eq!(diff[1].old_value.as_deref(), Some(""));
    assert_eq!(diff[1].new_value, None);
    assert_eq!(diff[1].diff_type(), DiffType::Changed);

    let stats = DiffStats::from_records(&diff);
    assert_eq!(
      stats,
      DiffStats {
        added: 0,
        removed: 0,
        changed: 1,
        unchanged: 1,
      }
    );
    assert!(stats.has_changes());
  }

  #[test]
  fn test_stats_and_sort() {
    let mut diff = diff_env_files("Z=1\nB=1\nC=1\n# end", "Z=2\nB=1\nA=1\n# end");

    let stats = DiffStats::from_records(&diff);
    assert_eq!(
      stats,
      DiffStats {
        added: 1,
        removed: 1,
        changed: 1,
        unchanged: 1,
      }
    );
    assert!(stats.has_changes());

    sort_by_key(&mut diff);
    assert_eq!(keys(&diff), vec!["A", "B", "C", "Z", ""]);
  }
}
