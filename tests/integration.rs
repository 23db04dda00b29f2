use env_diff::diff::{DiffType, diff_env_files};
use env_diff::files::{EnvMerge, InputError, Inputs, MergeFileOptions, MergeFormat};
use env_diff::merge::{CommentsHandling, ConflictResolution, MergePolicy, PresenceHandling};
use std::fs;
use tempfile::TempDir;

const LOCAL: &str = "# Database configuration
API_KEY=secret123
DB_HOST=localhost
DB_PORT=

# Local only
DEBUG=true";

const PRODUCTION: &str = "# Database configuration
API_KEY=
DB_HOST=production.example.com
DB_PORT=5432

# New feature
NEW_VAR=default
# end of file";

#[test]
fn test_merge_integration() {
  let temp_dir = TempDir::new().unwrap();

  let first_path = temp_dir.path().join(".env");
  let second_path = temp_dir.path().join(".env.production");
  let output_path = temp_dir.path().join(".env.merged");

  fs::write(&first_path, LOCAL).unwrap();
  fs::write(&second_path, PRODUCTION).unwrap();

  let options = MergeFileOptions {
    first: first_path,
    second: second_path,
    output: output_path.clone(),
    policy: MergePolicy::default(),
    format: MergeFormat::Env,
  };

  EnvMerge::merge_with_options(options).unwrap();

  let merged = fs::read_to_string(&output_path).unwrap();
  let expected = "# Database configuration
API_KEY=secret123
DB_HOST=production.example.com
DB_PORT=5432

# Local only
DEBUG=true

# New feature
NEW_VAR=default
# end of file
";

  assert_eq!(merged, expected);
}

#[test]
fn test_merge_integration_prefers_first_file() {
  let temp_dir = TempDir::new().unwrap();

  let first_path = temp_dir.path().join("first.env");
  let second_path = temp_dir.path().join("second.env");
  let output_path = temp_dir.path().join("merged.env");

  fs::write(&first_path, LOCAL).unwrap();
  fs::write(&second_path, PRODUCTION).unwrap();

  let options = MergeFileOptions {
    first: first_path,
    second: second_path,
    output: output_path.clone(),
    policy: MergePolicy {
      conflict_resolution: ConflictResolution::First,
      presence_handling: PresenceHandling::Omit,
      comments_handling: CommentsHandling::Remove,
      sort_alphabetically: true,
      ..MergePolicy::default()
    },
    format: MergeFormat::Env,
  };

  EnvMerge::merge_with_options(options).unwrap();

  let merged = fs::read_to_string(&output_path).unwrap();
  assert_eq!(
    merged,
    "API_KEY=secret123\nDB_HOST=localhost\nDB_PORT=5432\n"
  );
}

#[test]
fn test_merge_integration_writes_json() {
  let temp_dir = TempDir::new().unwrap();

  let first_path = temp_dir.path().join(".env");
  let second_path = temp_dir.path().join(".env.production");
  let output_path = temp_dir.path().join("merged.json");

  fs::write(&first_path, LOCAL).unwrap();
  fs::write(&second_path, PRODUCTION).unwrap();

  let options = MergeFileOptions {
    first: first_path,
    second: second_path,
    output: output_path.clone(),
    policy: MergePolicy {
      comments_handling: CommentsHandling::Remove,
      ..MergePolicy::default()
    },
    format: MergeFormat::Json,
  };

  EnvMerge::merge_with_options(options).unwrap();

  let merged: serde_json::Value =
    serde_json::from_str(&fs::read_to_string(&output_path).unwrap()).unwrap();
  let keys: Vec<_> = merged
    .as_array()
    .unwrap()
    .iter()
    .map(|line| line["content"].as_str().unwrap())
    .collect();

  assert_eq!(
    keys,
    vec![
      "API_KEY=secret123",
      "DB_HOST=production.example.com",
      "DB_PORT=5432",
      "DEBUG=true",
      "NEW_VAR=default",
    ]
  );
  assert_eq!(merged[0]["source"], "first");
  assert_eq!(merged[1]["source"], "second");
}

#[test]
fn test_diff_from_files() {
  let temp_dir = TempDir::new().unwrap();

  let first_path = temp_dir.path().join("old.env");
  let second_path = temp_dir.path().join("new.env");

  fs::write(&first_path, LOCAL).unwrap();
  fs::write(&second_path, PRODUCTION).unwrap();

  let inputs = Inputs::read(&first_path, &second_path).unwrap();
  let diff = inputs.diff();

  let summary: Vec<_> = diff
    .iter()
    .filter(|record| !record.is_trailing_comments())
    .map(|record| (record.key.as_ref(), record.diff_type()))
    .collect();

  assert_eq!(
    summary,
    vec![
      ("API_KEY", DiffType::Removed),
      ("DB_HOST", DiffType::Changed),
      ("DB_PORT", DiffType::Added),
      ("NEW_VAR", DiffType::Added),
      ("DEBUG", DiffType::Removed),
    ]
  );
  assert_eq!(diff, diff_env_files(LOCAL, PRODUCTION));
}

#[test]
fn test_missing_second_file() {
  let temp_dir = TempDir::new().unwrap();

  let first_path = temp_dir.path().join(".env");
  let second_path = temp_dir.path().join("missing.env");
  fs::write(&first_path, LOCAL).unwrap();

  match Inputs::read(&first_path, &second_path) {
    Err(InputError::NotFound(path)) => assert_eq!(path, second_path),
    other => panic!("Expected NotFound error, got {other:?}"),
  }
}
