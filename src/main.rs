use std::io::{self, Write};

use clap::Parser;
use kite::{
    Backend,
    Config,
    Embedder,
    HashEmbedder,
    Kite,
    ModelManager,
    Reranker,
    Shell,
    cli::{Cli, Command},
    error,
    search,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("KITE_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Some(Command::Completions(args)) = &cli.command {
        args.generate();
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(results) = cli.results {
        config.results = results;
    }

    info!(backend = %config.backend, results = config.results, "starting");

    match config.backend {
        Backend::Hash => {
            let model = HashEmbedder::new(config.dimension);
            run(&cli, Kite::new(model, config)?)
        }
        Backend::Colbert => {
            let model = ModelManager::with_model_id(config.model.clone());
            run(&cli, Kite::new(model, config)?)
        }
    }
}

fn run<M: Embedder + Reranker>(
    cli: &Cli,
    mut kite: Kite<M>,
) -> error::Result<()> {
    for source in &cli.index {
        match kite.index_path(source) {
            Ok(n) => {
                eprintln!("Indexed {n} documents from {}", source.display());
            }
            Err(e) => {
                error!(source = %source.display(), error = %e, "indexing failed");
            }
        }
    }

    match &cli.command {
        Some(Command::Query(args)) => {
            let hits = kite.query(&args.text);
            let mut stdout = io::stdout().lock();
            search::write_human(&mut stdout, &hits)?;
            stdout.flush()?;
        }
        Some(Command::Shell) | None => {
            let mut shell = Shell::new(kite);
            let mut stdin = io::stdin().lock();
            let mut stdout = io::stdout().lock();
            shell.run(&mut stdin, &mut stdout)?;
        }
        Some(Command::Completions(_)) => {}
    }

    Ok(())
}
