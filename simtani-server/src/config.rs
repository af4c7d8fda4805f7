use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;

/// Which persistence backend the service runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

impl StorageBackend {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => bail!("STORAGE must be 'sqlite' or 'memory', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Directory holding `simtani.db`. Defaults to the current working directory.
    pub state_dir: PathBuf,
    /// Whether an already decided group may be verified again.
    pub allow_reverification: bool,
    pub storage: StorageBackend,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let state_dir = env::var("STATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let allow_reverification = parse_flag(env::var("ALLOW_REVERIFICATION").ok());

        let storage = StorageBackend::parse(
            &env::var("STORAGE").unwrap_or_else(|_| "sqlite".to_string()),
        )
        .context("invalid STORAGE setting")?;

        Ok(Config {
            port,
            state_dir,
            allow_reverification,
            storage,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.state_dir.join("simtani.db")
    }
}

/// Parse a boolean flag. Missing or unparseable values are `false`.
pub fn parse_flag(value: Option<String>) -> bool {
    value
        .and_then(|v| v.trim().to_ascii_lowercase().parse::<bool>().ok())
        .unwrap_or(false)
}
