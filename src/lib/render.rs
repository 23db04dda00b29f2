//! Text and JSON presentation of diff records and merged lines.
//!
//! Rendering never inspects the terminal; colors are controlled by the
//! [`Theme`] handed in by the caller.

use owo_colors::{OwoColorize, Style};
use serde::Serialize;

use crate::comment::CommentFragment;
use crate::diff::{DiffComments, DiffRecord, DiffStats, DiffType};
use crate::merge::{MergedLine, Source};

/// Stands in for empty lines in annotated merge output.
pub const EMPTY_LINE_PLACEHOLDER: &str = "\u{a0}";

const COLUMN_SEPARATOR: &str = " | ";

/// How diff records are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Layout {
  /// Old and new lines one above the other, marked with `-` and `+`.
  #[default]
  Stacked,
  /// Old file on the left, new file on the right.
  SideBySide,
}

/// Presentation state injected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Theme {
  pub color: bool,
}

impl Theme {
  pub fn plain() -> Self {
    Self { color: false }
  }

  pub fn colored() -> Self {
    Self { color: true }
  }

  fn paint(&self, text: &str, kind: Paint) -> String {
    if !self.color {
      return text.to_string();
    }
    text.style(kind.style()).to_string()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paint {
  Plain,
  Inserted,
  Deleted,
  ChangedOld,
  ChangedNew,
  Comment,
  CommentInserted,
  CommentDeleted,
}

impl Paint {
  fn style(self) -> Style {
    match self {
      Paint::Plain => Style::new(),
      Paint::Inserted => Style::new().green(),
      Paint::Deleted => Style::new().red().strikethrough(),
      Paint::ChangedOld => Style::new().blue().strikethrough().dimmed(),
      Paint::ChangedNew => Style::new().blue(),
      Paint::Comment => Style::new().dimmed().italic(),
      Paint::CommentInserted => Style::new().green().italic(),
      Paint::CommentDeleted => Style::new().red().italic().strikethrough(),
    }
  }

  fn marker(self) -> &'static str {
    match self {
      Paint::Inserted | Paint::ChangedNew | Paint::CommentInserted => "+",
      Paint::Deleted | Paint::ChangedOld | Paint::CommentDeleted => "-",
      Paint::Plain | Paint::Comment => " ",
    }
  }
}

/// A rendered piece of text together with the paint applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Cell {
  text: String,
  paint: Paint,
}

impl Cell {
  fn new(text: impl Into<String>, paint: Paint) -> Self {
    Self {
      text: text.into(),
      paint,
    }
  }
}

/// Renders a diff in the requested layout, one line per row.
pub fn render_diff(records: &[DiffRecord<'_>], layout: Layout, theme: &Theme) -> String {
  let mut out = String::new();

  match layout {
    Layout::Stacked => {
      for cell in records.iter().flat_map(stacked_rows) {
        let line = format!("{} {}", cell.paint.marker(), cell.text);
        out.push_str(&theme.paint(line.trim_end(), cell.paint));
        out.push('\n');
      }
    }
    Layout::SideBySide => {
      let rows: Vec<_> = records.iter().flat_map(side_by_side_rows).collect();
      let width = rows
        .iter()
        .filter_map(|(left, _)| left.as_ref().map(|cell| cell.text.chars().count()))
        .max()
        .unwrap_or(0);

      for (left, right) in rows {
        let left_len = left.as_ref().map_or(0, |cell| cell.text.chars().count());
        let left = left.map_or_else(String::new, |cell| theme.paint(&cell.text, cell.paint));
        let right = right.map_or_else(String::new, |cell| theme.paint(&cell.text, cell.paint));

        let line = format!(
          "{}{}{}{}",
          left,
          " ".repeat(width - left_len),
          COLUMN_SEPARATOR,
          right
        );
        out.push_str(line.trim_end());
        out.push('\n');
      }
    }
  }

  out
}

fn stacked_rows(record: &DiffRecord<'_>) -> Vec<Cell> {
  let diff_type = record.diff_type();
  let mut rows = Vec::new();

  match &record.comments {
    DiffComments::Raw(lines) => {
      let paint = match diff_type {
        DiffType::Added => Paint::CommentInserted,
        DiffType::Removed => Paint::CommentDeleted,
        _ => Paint::Comment,
      };
      rows.extend(lines.iter().map(|line| Cell::new(line.to_string(), paint)));
    }
    DiffComments::Diff(fragments) => {
      rows.extend(
        fragments
          .iter()
          .map(|fragment| Cell::new(fragment.value.as_str(), fragment_paint(fragment))),
      );
    }
  }

  if record.is_trailing_comments() {
    return rows;
  }

  let old = assignment(&record.key, record.old_value.as_deref());
  let new = assignment(&record.key, record.new_value.as_deref());
  match diff_type {
    DiffType::Removed => rows.push(Cell::new(old, Paint::Deleted)),
    DiffType::Changed => {
      if record.old_value.is_some() {
        rows.push(Cell::new(old, Paint::ChangedOld));
      }
      if record.new_value.is_some() {
        rows.push(Cell::new(new, Paint::ChangedNew));
      }
    }
    DiffType::Added => rows.push(Cell::new(new, Paint::Inserted)),
    DiffType::Unchanged => {
      let value = record.new_value.as_deref().or(record.old_value.as_deref());
      rows.push(Cell::new(assignment(&record.key, value), Paint::Plain));
    }
  }

  rows
}

fn side_by_side_rows(record: &DiffRecord<'_>) -> Vec<(Option<Cell>, Option<Cell>)> {
  let diff_type = record.diff_type();
  let mut rows = Vec::new();

  match &record.comments {
    DiffComments::Raw(lines) => {
      for line in lines {
        let line: &str = line;
        if line.is_empty() {
          rows.push((None, None));
          continue;
        }
        let row = match diff_type {
          DiffType::Added => (None, Some(Cell::new(line, Paint::CommentInserted))),
          DiffType::Removed => (Some(Cell::new(line, Paint::CommentDeleted)), None),
          _ => (
            Some(Cell::new(line, Paint::Comment)),
            Some(Cell::new(line, Paint::Comment)),
          ),
        };
        rows.push(row);
      }
    }
    DiffComments::Diff(fragments) => {
      for fragment in fragments {
        let left = (!fragment.added()).then(|| {
          let paint = if fragment.removed() {
            Paint::CommentDeleted
          } else {
            Paint::Comment
          };
          Cell::new(fragment.value.as_str(), paint)
        });
        let right = (!fragment.removed()).then(|| {
          let paint = if fragment.added() {
            Paint::CommentInserted
          } else {
            Paint::Comment
          };
          Cell::new(fragment.value.as_str(), paint)
        });
        rows.push((left, right));
      }
    }
  }

  if record.is_trailing_comments() {
    return rows;
  }

  let left = shown(record.old_value.as_deref(), diff_type).map(|value| {
    let paint = match diff_type {
      DiffType::Removed => Paint::Deleted,
      DiffType::Changed => Paint::ChangedOld,
      _ => Paint::Plain,
    };
    Cell::new(assignment(&record.key, Some(value)), paint)
  });
  let right = shown(record.new_value.as_deref(), diff_type).map(|value| {
    let paint = match diff_type {
      DiffType::Added => Paint::Inserted,
      DiffType::Changed => Paint::ChangedNew,
      _ => Paint::Plain,
    };
    Cell::new(assignment(&record.key, Some(value)), paint)
  });
  rows.push((left, right));

  rows
}

fn fragment_paint(fragment: &CommentFragment) -> Paint {
  if fragment.added() {
    Paint::CommentInserted
  } else if fragment.removed() {
    Paint::CommentDeleted
  } else {
    Paint::Comment
  }
}

/// Side of a variable row worth a cell. Empty values are hidden unless they
/// are what changed.
fn shown(value: Option<&str>, diff_type: DiffType) -> Option<&str> {
  value.filter(|value| !value.is_empty() || diff_type == DiffType::Changed)
}

fn assignment(key: &str, value: Option<&str>) -> String {
  format!("{}={}", key, value.unwrap_or_default())
}

/// One-line summary of a diff.
pub fn render_stats(stats: &DiffStats) -> String {
  format!(
    "{} added, {} removed, {} changed, {} unchanged",
    stats.added, stats.removed, stats.changed, stats.unchanged
  )
}

/// Renders merged lines.
///
/// Without annotations the result is a valid env file. With annotations every
/// line is prefixed by its source and empty lines show a placeholder.
pub fn render_merge(lines: &[MergedLine], annotate: bool, theme: &Theme) -> String {
  let mut out = String::new();
  for line in lines {
    if annotate {
      let content = if line.content.is_empty() {
        EMPTY_LINE_PLACEHOLDER
      } else {
        line.content.as_str()
      };
      let paint = match (line.is_comment, line.source) {
        (true, _) => Paint::Comment,
        (false, Source::First) => Paint::ChangedNew,
        (false, Source::Second) => Paint::Inserted,
        (false, Source::Both | Source::None) => Paint::Plain,
      };
      out.push_str(&format!("{:<6} {}", line.source.as_str(), theme.paint(content, paint)));
    } else {
      out.push_str(&line.content);
    }
    out.push('\n');
  }
  out
}

#[derive(Debug, Serialize)]
struct DiffEntry<'r, 'a> {
  #[serde(flatten)]
  record: &'r DiffRecord<'a>,
  diff_type: DiffType,
}

#[derive(Debug, Serialize)]
struct DiffReport<'r, 'a> {
  records: Vec<DiffEntry<'r, 'a>>,
  stats: DiffStats,
}

/// Serializes diff records, each tagged with its diff type, plus the stats.
pub fn diff_to_json(records: &[DiffRecord<'_>]) -> serde_json::Result<String> {
  let report = DiffReport {
    records: records
      .iter()
      .map(|record| DiffEntry {
        record,
        diff_type: record.diff_type(),
      })
      .collect(),
    stats: DiffStats::from_records(records),
  };
  serde_json::to_string_pretty(&report)
}

pub fn merge_to_json(lines: &[MergedLine]) -> serde_json::Result<String> {
  serde_json::to_string_pretty(lines)
}
