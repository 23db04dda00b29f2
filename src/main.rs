use clap::{Args, Parser, Subcommand, ValueEnum};
use env_diff::diff::{DiffStats, sort_by_key};
use env_diff::files::{EnvMerge, Inputs, MergeFormat};
use env_diff::merge::{
  CommentsHandling, ConflictResolution, EmptyValueHandling, MergePolicy, PresenceHandling,
};
use env_diff::render::{
  Layout, Theme, diff_to_json, merge_to_json, render_diff, render_merge, render_stats,
};
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
  name = "env-diff",
  about = "Compare and merge two env files, keeping their comments",
  version,
  author
)]
struct Cli {
  #[command(subcommand)]
  command: Command,

  /// When to color the output
  #[arg(long, value_enum, default_value_t = ColorChoice::Auto, global = true)]
  color: ColorChoice,

  /// Verbose output (-v for verbose, -vv for very verbose)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,
}

#[derive(Subcommand)]
enum Command {
  /// Show how the second file differs from the first
  Diff {
    #[command(flatten)]
    inputs: InputArgs,

    /// How old and new lines are laid out
    #[arg(short, long, value_enum, default_value_t = Layout::Stacked)]
    layout: Layout,

    /// Sort keys alphabetically
    #[arg(short, long)]
    sort: bool,

    /// Print a summary line after the diff
    #[arg(long)]
    stats: bool,

    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,
  },
  /// Merge both files into one
  Merge {
    #[command(flatten)]
    inputs: InputArgs,

    #[command(flatten)]
    policy: PolicyArgs,

    /// Write the merged file here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Prefix every line with the file it came from
    #[arg(short, long, conflicts_with = "output")]
    annotate: bool,

    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    format: Format,
  },
}

#[derive(Args)]
struct InputArgs {
  /// Path to the first (old) env file, `-` for stdin
  #[arg(required_unless_present = "sample")]
  first: Option<PathBuf>,

  /// Path to the second (new) env file, `-` for stdin
  #[arg(required_unless_present = "sample")]
  second: Option<PathBuf>,

  /// Use the bundled sample files instead
  #[arg(long, conflicts_with_all = ["first", "second"])]
  sample: bool,
}

impl InputArgs {
  fn load(self) -> Result<Inputs, Box<dyn std::error::Error>> {
    match (self.sample, self.first, self.second) {
      (true, _, _) => Ok(Inputs::sample()),
      (false, Some(first), Some(second)) => Ok(Inputs::read(first, second)?),
      _ => Err("two input files are required".into()),
    }
  }
}

#[derive(Args)]
struct PolicyArgs {
  /// Which file wins when both have different non-empty values
  #[arg(long, value_enum, default_value_t = ConflictResolution::Second)]
  conflict_resolution: ConflictResolution,

  /// What to do when the winning value is empty
  #[arg(long, value_enum, default_value_t = EmptyValueHandling::UseOther)]
  empty_values: EmptyValueHandling,

  /// What to do with keys found in only one file
  #[arg(long, value_enum, default_value_t = PresenceHandling::IncludeAll)]
  presence: PresenceHandling,

  /// Which comments to keep
  #[arg(long, value_enum, default_value_t = CommentsHandling::Both)]
  comments: CommentsHandling,

  /// Sort variables alphabetically
  #[arg(long)]
  sort: bool,

  /// Drop variables with an empty value
  #[arg(long)]
  remove_empty: bool,
}

impl From<PolicyArgs> for MergePolicy {
  fn from(args: PolicyArgs) -> Self {
    MergePolicy {
      conflict_resolution: args.conflict_resolution,
      empty_value_handling: args.empty_values,
      presence_handling: args.presence,
      comments_handling: args.comments,
      sort_alphabetically: args.sort,
      remove_empty: args.remove_empty,
    }
  }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
  Text,
  Json,
}

impl From<Format> for MergeFormat {
  fn from(format: Format) -> Self {
    match format {
      Format::Text => MergeFormat::Env,
      Format::Json => MergeFormat::Json,
    }
  }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
  Auto,
  Always,
  Never,
}

impl ColorChoice {
  fn theme(self) -> Theme {
    let color = match self {
      ColorChoice::Always => true,
      ColorChoice::Never => false,
      ColorChoice::Auto => {
        std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
      }
    };
    Theme { color }
  }
}

fn setup_tracing(verbose: u8) {
  use tracing_subscriber::fmt;
  use tracing_subscriber::prelude::*;

  let log_level = match verbose {
    1 => "debug",
    2 => "trace",
    _ => "info",
  };

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(tracing_subscriber::EnvFilter::new(
      std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
    ))
    .init();
}

/// Repeated keys only ever resolve to their first declaration, so say so.
fn warn_duplicates(inputs: &Inputs) {
  let (first, second) = inputs.duplicate_keys();
  for (name, keys) in [("first", first), ("second", second)] {
    if !keys.is_empty() {
      eprintln!(
        "warning: duplicate keys in the {name} file, the first declaration is used: {}",
        keys.join(", ")
      );
    }
  }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let cli = Cli::parse();

  setup_tracing(cli.verbose);

  let theme = cli.color.theme();

  match cli.command {
    Command::Diff {
      inputs,
      layout,
      sort,
      stats,
      format,
    } => {
      let inputs = inputs.load()?;
      warn_duplicates(&inputs);
      let mut records = inputs.diff();
      if sort {
        sort_by_key(&mut records);
      }

      match format {
        Format::Json => println!("{}", diff_to_json(&records)?),
        Format::Text => {
          print!("{}", render_diff(&records, layout, &theme));
          if stats {
            println!();
            println!("{}", render_stats(&DiffStats::from_records(&records)));
          }
        }
      }
    }
    Command::Merge {
      inputs,
      policy,
      output,
      annotate,
      format,
    } => {
      let inputs = inputs.load()?;
      warn_duplicates(&inputs);
      let policy: MergePolicy = policy.into();

      if let Some(output) = output {
        EnvMerge::merge_into(&inputs, output, &policy, format.into())?;
        return Ok(());
      }

      let lines = inputs.merge(&policy);
      match format {
        Format::Json => println!("{}", merge_to_json(&lines)?),
        Format::Text => print!("{}", render_merge(&lines, annotate, &theme)),
      }
    }
  }

  Ok(())
}
