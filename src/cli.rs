//! CLI definitions for load-tweets.
//!
//! Uses clap for argument parsing with derive macros.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// load-tweets - load zipped tweet archives into a normalized database
#[derive(Parser, Debug)]
#[command(name = "load-tweets")]
#[command(version)]
#[command(about = "Load zipped, line-delimited tweet archives into a normalized SQLite schema")]
#[command(long_about = r#"
load-tweets reads zip archives of line-delimited tweet JSON and writes every
record into users, tweets, urls, tweet_urls, tweet_mentions, tweet_tags and
tweet_media tables, one transaction per record.

Tweets already in the database are skipped, so an interrupted load can simply
be run again.

Quick start:
  1. load-tweets --db tweets.db load --inputs data/2020-*.zip
  2. load-tweets --db tweets.db stats --check
"#)]
pub struct Cli {
    /// Path to the database file
    #[arg(long, env = "TWEET_LOADER_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Be quiet (suppress progress output)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load one or more archives
    Load(LoadArgs),

    /// Show table row counts and store checks
    Stats(StatsArgs),

    /// Show or manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Zip archives, or directories searched recursively for *.zip
    #[arg(long, short = 'i', required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Print a progress line every N records (0 disables)
    #[arg(long, alias = "print_every")]
    pub print_every: Option<usize>,

    /// Visit archives and entries in ascending name order
    #[arg(long)]
    pub no_reverse: bool,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Also run integrity and foreign key checks
    #[arg(long)]
    pub check: bool,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Show the effective configuration
    #[arg(long)]
    pub show: bool,

    /// Print the config file location
    #[arg(long)]
    pub path: bool,

    /// Write a default config file if none exists
    #[arg(long)]
    pub init: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    JsonPretty,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_load_accepts_many_inputs() {
        let cli = Cli::try_parse_from([
            "load-tweets",
            "--db",
            "t.db",
            "load",
            "--inputs",
            "a.zip",
            "b.zip",
            "--print_every",
            "5",
        ])
        .unwrap();
        match cli.command {
            Commands::Load(args) => {
                assert_eq!(args.inputs.len(), 2);
                assert_eq!(args.print_every, Some(5));
                assert!(!args.no_reverse);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.db, Some(PathBuf::from("t.db")));
    }

    #[test]
    fn test_load_requires_inputs() {
        assert!(Cli::try_parse_from(["load-tweets", "load"]).is_err());
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::try_parse_from(["load-tweets", "-vv", "stats"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
