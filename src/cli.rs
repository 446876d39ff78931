use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::config::Backend;

#[derive(Debug, Parser)]
#[command(
    name = "kite",
    about = "Keyword Insight and Term Extraction: hybrid search over your notes"
)]
pub struct Cli {
    /// Read settings from this JSON file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the ColBERT model ID or local model path
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Embedding and re-ranking backend
    #[arg(long, value_enum, global = true)]
    pub backend: Option<Backend>,

    /// Candidates taken from each retriever per query
    #[arg(short = 'n', long, global = true)]
    pub results: Option<usize>,

    /// Index this source before starting (repeatable)
    #[arg(long = "index", value_name = "SOURCE", global = true)]
    pub index: Vec<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the interactive shell (default)
    Shell,
    /// Run a single query against the --index sources and exit
    Query(QueryArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// The query text
    pub text: String,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "kite",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn no_subcommand_means_shell() {
        let cli = Cli::parse_from(["kite"]);
        assert!(cli.command.is_none());
        assert!(cli.index.is_empty());
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
    }

    #[test]
    fn parse_one_shot_query() {
        let cli = Cli::parse_from([
            "kite",
            "--backend",
            "hash",
            "--index",
            "a.json",
            "--index",
            "notes",
            "query",
            "foo bar",
            "-n",
            "3",
        ]);
        assert_eq!(cli.backend, Some(Backend::Hash));
        assert_eq!(cli.results, Some(3));
        assert_eq!(
            cli.index,
            vec![PathBuf::from("a.json"), PathBuf::from("notes")]
        );
        match cli.command {
            Some(Command::Query(args)) => assert_eq!(args.text, "foo bar"),
            other => panic!("expected query command, got {other:?}"),
        }
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::parse_from(["kite", "-vv", "shell"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Some(Command::Shell)));
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["kite", "-q", "-v"]).is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["kite", "--backend", "bm25"]).is_err());
    }
}
