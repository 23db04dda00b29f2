//! Line-level diff of two comment blocks.
//!
//! Uses the `similar` crate (Myers diff algorithm) on the blocks joined into
//! text, then groups consecutive changes of the same kind into runs.

use serde::Serialize;
use similar::{ChangeTag, TextDiff};

#[cfg(feature = "tracing")]
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FragmentTag {
  Unchanged,
  Added,
  Removed,
}

impl From<ChangeTag> for FragmentTag {
  fn from(tag: ChangeTag) -> Self {
    match tag {
      ChangeTag::Equal => FragmentTag::Unchanged,
      ChangeTag::Insert => FragmentTag::Added,
      ChangeTag::Delete => FragmentTag::Removed,
    }
  }
}

/// One line of a comment diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentFragment {
  pub value: String,
  pub tag: FragmentTag,
}

impl CommentFragment {
  pub fn new(value: impl Into<String>, tag: FragmentTag) -> Self {
    Self {
      value: value.into(),
      tag,
    }
  }

  /// Present only in the new block.
  pub fn added(&self) -> bool {
    self.tag == FragmentTag::Added
  }

  /// Present only in the old block.
  pub fn removed(&self) -> bool {
    self.tag == FragmentTag::Removed
  }
}

/// Diffs the `old` comment block against the `new` one.
///
/// A run of a single line yields one fragment, blank or not. Runs spanning
/// several lines yield one fragment per line and skip the blank ones.
pub fn diff_comments<S: AsRef<str>>(old: &[S], new: &[S]) -> Vec<CommentFragment> {
  let old_text = join_lines(old);
  let new_text = join_lines(new);
  let diff = TextDiff::from_lines(old_text.as_str(), new_text.as_str());

  let mut runs: Vec<(ChangeTag, Vec<String>)> = Vec::new();
  for change in diff.iter_all_changes() {
    let line = change.value().strip_suffix('\n').unwrap_or(change.value());
    match runs.last_mut() {
      Some((tag, lines)) if *tag == change.tag() => lines.push(line.to_string()),
      _ => runs.push((change.tag(), vec![line.to_string()])),
    }
  }

  #[cfg(feature = "tracing")]
  trace!("Comment diff produced {} runs", runs.len());

  runs
    .into_iter()
    .flat_map(|(tag, lines)| {
      let tag = FragmentTag::from(tag);
      let keep_blank = lines.len() <= 1;
      lines
        .into_iter()
        .filter(move |line| keep_blank || !line.trim().is_empty())
        .map(move |line| CommentFragment::new(line, tag))
    })
    .collect()
}

fn join_lines<S: AsRef<str>>(lines: &[S]) -> String {
  lines.iter().map(AsRef::as_ref).collect::<Vec<_>>().join("\n")
}
