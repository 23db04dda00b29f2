use std::{borrow::Cow, collections::HashMap, fmt};

use indexmap::IndexMap;
#[cfg(feature = "tracing")]
use tracing::{debug, trace, warn};

pub(crate) const COMMENT_PREFIX: &str = "#";
pub(crate) const ASSIGNMENT_OPERATOR: &str = "=";

/// An env file as an ordered list of variables, each owning the comment
/// block written above it.
///
/// Comments found after the last variable are kept in a trailing
/// pseudo-variable with an empty key and value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnvFile<'a> {
  pub variables: Vec<EnvVariable<'a>>,
}

impl<'a> fmt::Display for EnvFile<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for var in &self.variables {
      writeln!(f, "{}", var)?;
    }
    Ok(())
  }
}

impl<'a> From<&'a str> for EnvFile<'a> {
  fn from(s: &'a str) -> Self {
    #[cfg(feature = "tracing")]
    debug!("Parsing env file with {} lines", s.lines().count());

    let mut variables = Vec::new();
    let mut pending_comments = Vec::new();

    for line in s.lines() {
      #[cfg(feature = "tracing")]
      trace!("Parsing line: {:?}", line);

      match Line::from(line) {
        Line::Comment(comment) => pending_comments.push(Cow::Borrowed(comment)),
        Line::Variable(mut var) => {
          #[cfg(feature = "tracing")]
          trace!(
            "Found variable: {} with {} pending comments",
            var.key,
            pending_comments.len()
          );

          var.comments = std::mem::take(&mut pending_comments);
          variables.push(var);
        }
        Line::Ignored => {
          #[cfg(feature = "tracing")]
          trace!("Ignoring line with an empty key");
        }
      }
    }

    if !pending_comments.is_empty() {
      #[cfg(feature = "tracing")]
      trace!("Keeping {} trailing comments", pending_comments.len());

      variables.push(EnvVariable {
        key: Cow::Borrowed(""),
        value: Cow::Borrowed(""),
        comments: pending_comments,
      });
    }

    let file = Self { variables };

    #[cfg(feature = "tracing")]
    {
      debug!("Parsed {} variables", file.variables.len());
      let duplicates = file.duplicate_keys();
      if !duplicates.is_empty() {
        warn!(?duplicates, "Duplicate keys found, the first occurrence wins");
      }
    }

    file
  }
}

impl<'a> EnvFile<'a> {
  /// Returns the first variable declared with `key`.
  pub fn get(&self, key: &str) -> Option<&EnvVariable<'a>> {
    self.variables.iter().find(|var| var.key == key)
  }

  /// Builds a key lookup table resolving every key to its first occurrence.
  pub fn index(&self) -> HashMap<&str, &EnvVariable<'a>> {
    let mut index = HashMap::with_capacity(self.variables.len());
    for var in &self.variables {
      index.entry(var.key.as_ref()).or_insert(var);
    }
    index
  }

  /// Keys declared more than once, in order of first appearance.
  pub fn duplicate_keys(&self) -> Vec<&str> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for var in self.variables.iter().filter(|var| !var.is_trailing_comments()) {
      *counts.entry(var.key.as_ref()).or_default() += 1;
    }
    counts
      .into_iter()
      .filter_map(|(key, count)| (count > 1).then_some(key))
      .collect()
  }

  /// Comment block that follows the last variable, if the file has one.
  pub fn trailing_comments(&self) -> Option<&[Cow<'a, str>]> {
    self
      .variables
      .last()
      .filter(|var| var.is_trailing_comments())
      .map(|var| var.comments.as_slice())
  }
}

/// Parses `text` into its variables. Parsing never fails.
pub fn parse_env_file(text: &str) -> EnvFile<'_> {
  EnvFile::from(text)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvVariable<'a> {
  pub key: Cow<'a, str>,
  pub value: Cow<'a, str>,
  /// Raw lines above the variable: comments keep their `#`, blank lines are
  /// empty strings.
  pub comments: Vec<Cow<'a, str>>,
}

impl<'a> EnvVariable<'a> {
  pub fn new(key: impl Into<Cow<'a, str>>, value: impl Into<Cow<'a, str>>) -> Self {
    Self {
      key: key.into(),
      value: value.into(),
      comments: Vec::new(),
    }
  }

  pub fn with_comments<I, S>(mut self, comments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<Cow<'a, str>>,
  {
    self.comments = comments.into_iter().map(Into::into).collect();
    self
  }

  /// The pseudo-variable holding comments found after the last variable.
  pub fn is_trailing_comments(&self) -> bool {
    self.key.is_empty()
  }

  /// The `KEY=VALUE` line of this variable.
  pub fn assignment(&self) -> String {
    format!("{}{}{}", self.key, ASSIGNMENT_OPERATOR, self.value)
  }
}

impl<'a> fmt::Display for EnvVariable<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut lines = self.comments.iter().map(|c| c.to_string()).collect::<Vec<_>>();
    if !self.is_trailing_comments() {
      lines.push(self.assignment());
    }
    write!(f, "{}", lines.join("\n"))
  }
}

/// Classification of a single trimmed input line.
#[derive(Debug, Clone, PartialEq)]
enum Line<'a> {
  Comment(&'a str),
  Variable(EnvVariable<'a>),
  Ignored,
}

impl<'a> From<&'a str> for Line<'a> {
  fn from(s: &'a str) -> Self {
    let trimmed = s.trim();

    if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIX) {
      return Line::Comment(trimmed);
    }

    // A line without `=` becomes a key with an empty value.
    let (key, value) = trimmed
      .split_once(ASSIGNMENT_OPERATOR)
      .map_or((trimmed, ""), |(key, value)| (key.trim(), value.trim()));

    if key.is_empty() {
      Line::Ignored
    } else {
      Line::Variable(EnvVariable::new(key, value))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_simple() {
    let env = parse_env_file("KEY=value\nANOTHER=test");

    assert_eq!(env.variables.len(), 2);
    assert_eq!(env.variables[0], EnvVariable::new("KEY", "value"));
    assert_eq!(env.variables[1], EnvVariable::new("ANOTHER", "test"));
  }

  #[test]
  fn test_parse_with_comments() {
    let input = "# This is a comment\nKEY=value\n# Another comment\n# Multi line\nTEST=123";
    let env = parse_env_file(input);

    let mut iter = env.variables.iter();

    let var = iter.next().unwrap();
    assert_eq!(var.key, "KEY");
    assert_eq!(var.comments, vec!["# This is a comment"]);

    let var = iter.next().unwrap();
    assert_eq!(var.key, "TEST");
    assert_eq!(var.value, "123");
    assert_eq!(var.comments, vec!["# Another comment", "# Multi line"]);

    assert!(iter.next().is_none());
  }

  #[test]
  fn test_blank_lines_are_kept_in_comments() {
    let env = parse_env_file("# hello\n\nA=1");

    assert_eq!(
      env.variables,
      vec![EnvVariable::new("A", "1").with_comments(["# hello", ""])]
    );
  }

  #[test]
  fn test_trailing_comments() {
    let env = parse_env_file("A=1\n# end\n");

    assert_eq!(env.variables.len(), 2);
    let trailing = &env.variables[1];
    assert!(trailing.is_trailing_comments());
    assert_eq!(trailing.value, "");
    assert_eq!(trailing.comments, vec!["# end"]);
    assert_eq!(env.trailing_comments().unwrap(), &["# end"]);
  }

  #[test]
  fn test_empty_input() {
    assert!(parse_env_file("").variables.is_empty());
  }

  #[test]
  fn test_line_without_assignment() {
    let env = parse_env_file("JUST_A_KEY\nB=2");

    assert_eq!(env.variables[0], EnvVariable::new("JUST_A_KEY", ""));
    assert_eq!(env.variables[1], EnvVariable::new("B", "2"));
  }

  #[test]
  fn test_empty_key_is_skipped_and_keeps_comments() {
    let env = parse_env_file("# kept\n=orphan\nA=1");

    assert_eq!(
      env.variables,
      vec![EnvVariable::new("A", "1").with_comments(["# kept"])]
    );
  }

  #[test]
  fn test_split_on_first_assignment() {
    let env = parse_env_file("  URL = postgres://u:p@h/db?x=1  ");

    assert_eq!(env.variables[0].key, "URL");
    assert_eq!(env.variables[0].value, "postgres://u:p@h/db?x=1");
  }

  #[test]
  fn test_key_without_value() {
    let env = parse_env_file("KEY=\nOTHER=   ");

    assert_eq!(env.variables[0].value, "");
    assert_eq!(env.variables[1].value, "");
  }

  #[test]
  fn test_crlf_lines() {
    let env = parse_env_file("# c\r\nA=1\r\n");

    assert_eq!(
      env.variables,
      vec![EnvVariable::new("A", "1").with_comments(["# c"])]
    );
  }

  #[test]
  fn test_first_occurrence_wins() {
    let env = parse_env_file("A=1\nB=2\nA=3\nB=4\nC=5");

    assert_eq!(env.get("A").unwrap().value, "1");
    assert_eq!(env.index()["B"].value, "2");
    assert_eq!(env.duplicate_keys(), vec!["A", "B"]);
    assert_eq!(env.variables.len(), 5);
  }

  #[test]
  fn test_roundtrip() {
    let input = "# Comment\nKEY=value\n\n# Orphan\nTEST=123\n# end";
    let env = parse_env_file(input);
    let output = env.to_string();

    assert_eq!(output, format!("{input}\n"));
    assert_eq!(parse_env_file(&output), env);
  }
}
