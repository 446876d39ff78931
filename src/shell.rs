//! Interactive read-eval loop over the engine.
//!
//! The shell reads one command per line, looks the command name up in a
//! fixed table and runs its handler. Handler errors are printed and the loop
//! carries on; only a failure to read input or write output ends it early.

use std::{
    collections::BTreeMap,
    io::{BufRead, Write},
    path::Path,
};

use crate::{
    embedding::Embedder,
    engine::Kite,
    error::Result,
    reranker::Reranker,
    search,
};

pub const INTRO: &str = "Welcome to KITE, the Keyword Insight and Term \
                         Extraction Project\nType help or ? to list commands.";
pub const PROMPT: &str = "(kite): ";
pub const QUERY_PROMPT: &str = "QUERY: ";

/// Whether the loop keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Input and output streams of a session.
pub struct Io<'a> {
    pub input: &'a mut dyn BufRead,
    pub output: &'a mut dyn Write,
}

impl Io<'_> {
    /// Read one line without its terminator; `None` at end of input.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    fn prompt(&mut self, text: &str) -> Result<()> {
        write!(self.output, "{text}")?;
        self.output.flush()?;
        Ok(())
    }
}

type Handler<M> = fn(&mut Shell<M>, &mut Io<'_>, &str) -> Result<Flow>;

struct Command<M> {
    help: &'static str,
    run: Handler<M>,
}

/// Command-name to handler table plus the engine it drives.
pub struct Shell<M> {
    kite: Kite<M>,
    commands: BTreeMap<&'static str, Command<M>>,
}

impl<M: Embedder + Reranker> Shell<M> {
    pub fn new(kite: Kite<M>) -> Self {
        let mut commands: BTreeMap<&'static str, Command<M>> = BTreeMap::new();
        commands.insert(
            "index",
            Command {
                help: "index [SOURCE]  index a directory, text file or JSON \
                       records (default: configured corpus)",
                run: cmd_index::<M>,
            },
        );
        commands.insert(
            "query",
            Command {
                help: "query [TEXT]    search the index (prompts when TEXT \
                       is omitted)",
                run: cmd_query::<M>,
            },
        );
        commands.insert(
            "count",
            Command {
                help: "count           number of indexed documents",
                run: cmd_count::<M>,
            },
        );
        commands.insert(
            "help",
            Command {
                help: "help            list commands (also ?)",
                run: cmd_help::<M>,
            },
        );
        commands.insert(
            "quit",
            Command {
                help: "quit            leave KITE (also exit)",
                run: cmd_quit::<M>,
            },
        );

        Self { kite, commands }
    }

    pub fn kite(&self) -> &Kite<M> {
        &self.kite
    }

    /// Run until `quit`, `exit` or end of input.
    pub fn run(
        &mut self,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<()> {
        let mut io = Io { input, output };
        writeln!(io.output, "{INTRO}")?;

        loop {
            io.prompt(PROMPT)?;
            let Some(line) = io.read_line()? else {
                writeln!(io.output)?;
                break;
            };
            if self.execute(&mut io, &line)? == Flow::Quit {
                break;
            }
        }

        Ok(())
    }

    /// Dispatch one input line.
    ///
    /// Handler failures are reported on the output and never end the
    /// session; the returned error is always an I/O failure on the streams.
    pub fn execute(&mut self, io: &mut Io<'_>, line: &str) -> Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };
        let name = match name {
            "?" => "help",
            "exit" => "quit",
            other => other,
        };

        let Some(run) = self.commands.get(name).map(|command| command.run)
        else {
            writeln!(
                io.output,
                "unknown command: {name}. Type help or ? to list commands."
            )?;
            return Ok(Flow::Continue);
        };

        match run(self, io, arg) {
            Ok(flow) => Ok(flow),
            Err(e) => {
                writeln!(io.output, "error: {e}")?;
                Ok(Flow::Continue)
            }
        }
    }
}

fn cmd_index<M: Embedder + Reranker>(
    shell: &mut Shell<M>,
    io: &mut Io<'_>,
    arg: &str,
) -> Result<Flow> {
    let kite = &mut shell.kite;
    let path = if arg.is_empty() {
        kite.config().corpus.clone()
    } else {
        Path::new(arg).to_path_buf()
    };

    writeln!(io.output, "Indexing {}...", path.display())?;
    let produced = kite.index_path(&path)?;
    writeln!(
        io.output,
        "Indexed {produced} documents ({} in store).",
        kite.count()
    )?;
    Ok(Flow::Continue)
}

fn cmd_query<M: Embedder + Reranker>(
    shell: &mut Shell<M>,
    io: &mut Io<'_>,
    arg: &str,
) -> Result<Flow> {
    let text = if arg.is_empty() {
        io.prompt(QUERY_PROMPT)?;
        io.read_line()?.unwrap_or_default()
    } else {
        arg.to_string()
    };

    let hits = shell.kite.query(&text);
    search::write_human(io.output, &hits)?;
    Ok(Flow::Continue)
}

fn cmd_count<M: Embedder + Reranker>(
    shell: &mut Shell<M>,
    io: &mut Io<'_>,
    _arg: &str,
) -> Result<Flow> {
    writeln!(io.output, "{} documents", shell.kite.count())?;
    Ok(Flow::Continue)
}

fn cmd_help<M>(
    shell: &mut Shell<M>,
    io: &mut Io<'_>,
    _arg: &str,
) -> Result<Flow> {
    writeln!(io.output, "Commands:")?;
    for command in shell.commands.values() {
        writeln!(io.output, "  {}", command.help)?;
    }
    Ok(Flow::Continue)
}

fn cmd_quit<M>(
    _shell: &mut Shell<M>,
    _io: &mut Io<'_>,
    _arg: &str,
) -> Result<Flow> {
    Ok(Flow::Quit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Config, hash_embedder::HashEmbedder};

    fn shell() -> Shell<HashEmbedder> {
        let kite = Kite::new(HashEmbedder::new(64), Config::default()).unwrap();
        Shell::new(kite)
    }

    fn session(shell: &mut Shell<HashEmbedder>, script: &str) -> String {
        let mut input = script.as_bytes();
        let mut output = Vec::new();
        shell.run(&mut input, &mut output).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn intro_and_prompt_are_printed() {
        let out = session(&mut shell(), "quit\n");
        assert!(out.starts_with("Welcome to KITE"));
        assert!(out.contains(PROMPT));
    }

    #[test]
    fn end_of_input_ends_session() {
        let out = session(&mut shell(), "count\n");
        assert!(out.contains("0 documents"));
    }

    #[test]
    fn commands_after_quit_are_not_run() {
        let out = session(&mut shell(), "exit\ncount\n");
        assert!(!out.contains("documents"));
    }

    #[test]
    fn help_lists_every_command() {
        let out = session(&mut shell(), "?\n");
        for name in ["index", "query", "count", "help", "quit"] {
            assert!(out.contains(&format!("  {name}")), "missing {name}");
        }
    }

    #[test]
    fn help_runs_through_the_command_table() {
        let mut shell = shell();
        let mut input: &[u8] = b"";
        let mut output = Vec::new();
        let mut io = Io {
            input: &mut input,
            output: &mut output,
        };
        assert_eq!(shell.execute(&mut io, "help").unwrap(), Flow::Continue);
        let out = String::from_utf8(output).unwrap();
        assert!(out.starts_with("Commands:\n"));
        assert_eq!(out.lines().count(), 1 + shell.commands.len());
    }

    #[test]
    fn unknown_command_prints_hint() {
        let out = session(&mut shell(), "frobnicate\ncount\n");
        assert!(out.contains("unknown command: frobnicate"));
        assert!(out.contains("0 documents"));
    }

    #[test]
    fn blank_lines_are_ignored() {
        let out = session(&mut shell(), "\n   \ncount\n");
        assert!(!out.contains("unknown command"));
        assert!(out.contains("0 documents"));
    }

    #[test]
    fn missing_source_reports_error_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let script = format!("index {}\ncount\n", missing.display());
        let out = session(&mut shell(), &script);
        assert!(out.contains("error: source not found"));
        assert!(out.contains("0 documents"));
    }

    #[test]
    fn bare_query_prompts_for_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "alpha beta\ngamma delta\n").unwrap();

        let script = format!("index {}\nquery\ngamma\n", path.display());
        let out = session(&mut shell(), &script);
        assert!(out.contains(QUERY_PROMPT));
        assert!(out.contains("1. gamma delta (see: "));
    }

    #[test]
    fn query_with_no_matches() {
        let out = session(&mut shell(), "query anything\n");
        assert!(out.contains("No results found."));
    }
}
