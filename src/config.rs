use std::{
    fmt,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use serde::Deserialize;

use crate::{
    error::{Error, Result},
    hash_embedder,
    model_manager::DEFAULT_MODEL_ID,
};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "KITE_CONFIG";
/// Environment override for [`Config::model`].
pub const MODEL_ENV: &str = "KITE_MODEL";
/// Environment override for [`Config::backend`].
pub const BACKEND_ENV: &str = "KITE_BACKEND";

const CONFIG_FILE: &str = "config.json";

/// Which model family provides embeddings and re-ranking.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ColBERT late-interaction model, loaded on first use.
    #[default]
    Colbert,
    /// Deterministic feature hashing; no model download.
    Hash,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Colbert => f.write_str("colbert"),
            Self::Hash => f.write_str("hash"),
        }
    }
}

/// Runtime settings.
///
/// Every field has a default, so a config file only needs the keys it
/// changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Candidates taken from each retriever per query.
    pub results: usize,
    /// Source indexed by a bare `index` command.
    pub corpus: PathBuf,
    /// Glob applied to files when indexing a directory.
    pub pattern: String,
    pub backend: Backend,
    /// ColBERT model id or local path.
    pub model: String,
    /// Vector size of the hash backend.
    pub dimension: usize,
    /// Documents per embedding call.
    pub batch_size: usize,
    /// Typo-tolerant lexical matching.
    pub fuzzy: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            results: 10,
            corpus: PathBuf::from("instance/corpus"),
            pattern: "*.md".to_string(),
            backend: Backend::default(),
            model: DEFAULT_MODEL_ID.to_string(),
            dimension: hash_embedder::DEFAULT_DIMENSION,
            batch_size: 32,
            fuzzy: true,
        }
    }
}

impl Config {
    /// Load the configuration from, in order of priority:
    /// 1. An explicit path (from --config)
    /// 2. The KITE_CONFIG environment variable
    /// 3. The XDG config file (~/.config/kite/config.json), if present
    /// 4. Built-in defaults
    ///
    /// KITE_MODEL and KITE_BACKEND are applied on top.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with(explicit, |key| std::env::var(key).ok())
    }

    /// [`load`](Self::load) with a custom environment lookup.
    pub fn load_with<F>(explicit: Option<&Path>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if let Some(path) = explicit {
            Self::from_file(path)?
        } else if let Some(path) = env(CONFIG_ENV) {
            Self::from_file(Path::new(&path))?
        } else if let Some(path) = xdg::BaseDirectories::with_prefix("kite")
            .find_config_file(CONFIG_FILE)
        {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::from_io_at(e, "config file", path))?;
        serde_json::from_str(&text).map_err(|e| Error::Parse {
            origin: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Apply KITE_MODEL and KITE_BACKEND overrides.
    pub fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = env(MODEL_ENV) {
            self.model = model;
        }
        if let Some(backend) = env(BACKEND_ENV) {
            self.backend = Backend::from_str(&backend, true).map_err(|_| {
                Error::Config(format!(
                    "{BACKEND_ENV}: unknown backend '{backend}'"
                ))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::Config("dimension must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be positive".into()));
        }
        Ok(())
    }
}
