use std::fs;
use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::strategy::StrategyState;
use crate::Result;

/// Durable home of the strategy record
///
/// `load` returns `Ok(None)` when nothing has been saved yet; a record that
/// exists but cannot be read is an error.
pub trait StateStore {
    fn load(&self) -> Result<Option<StrategyState>>;

    fn save(&mut self, state: &StrategyState) -> Result<()>;
}

/// JSON file store
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write leaves the previous record intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<Option<StrategyState>> {
        if !self.path.exists() {
            tracing::info!("No saved state at {}, starting fresh", self.path.display());
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)?;
        let state: StrategyState = serde_json::from_str(&raw).map_err(|e| {
            EngineError::Config(format!(
                "invalid strategy state in {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::info!(
            "Loaded state from {}: {:?}, peak {:.2}",
            self.path.display(),
            state.status,
            state.peak_value.peak_value()
        );

        Ok(Some(state))
    }

    fn save(&mut self, state: &StrategyState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| EngineError::Persistence(e.to_string()))?;

        let temp = self.temp_path();
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;

        tracing::debug!("Saved state to {}", self.path.display());

        Ok(())
    }
}

/// In-process store for simulations and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Option<StrategyState>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: StrategyState) -> Self {
        Self {
            state: Some(state),
            saves: 0,
        }
    }

    pub fn saved(&self) -> Option<&StrategyState> {
        self.state.as_ref()
    }

    /// Number of `save` calls so far
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<StrategyState>> {
        Ok(self.state.clone())
    }

    fn save(&mut self, state: &StrategyState) -> Result<()> {
        self.state = Some(state.clone());
        self.saves += 1;
        Ok(())
    }
}
