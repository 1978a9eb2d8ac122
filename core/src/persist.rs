use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// In-memory model parameters: weight vector in feature order plus bias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelState {
    pub weights: Vec<f64>,
    pub bias: f64,
}

/// Load/save contract for model weights. Alternate backends (key-value
/// store, object store) can implement this without touching model logic.
pub trait ModelStore: Send + Sync {
    /// `Ok(None)` when no state has ever been persisted; the model then
    /// falls back to its built-in defaults.
    fn load(&self) -> Result<Option<ModelState>>;
    fn save(&self, state: &ModelState) -> Result<()>;
}

/// Single binary file holding `{weight count: u64, weights: f64..., bias:
/// f64}` (bincode's layout for `ModelState`). Saves go through a temp file
/// and rename so a crash mid-write cannot corrupt the previous state.
pub struct FileModelStore {
    path: PathBuf,
}

impl FileModelStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ModelStore for FileModelStore {
    fn load(&self) -> Result<Option<ModelState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)
            .with_context(|| format!("read model file {}", self.path.display()))?;
        let state = bincode::deserialize(&bytes)
            .with_context(|| format!("decode model file {}", self.path.display()))?;
        Ok(Some(state))
    }

    fn save(&self, state: &ModelState) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("create model dir {}", dir.display()))?;
            }
        }
        let bytes = bincode::serialize(state).context("encode model state")?;
        let tmp = self.path.with_extension("bin.tmp");
        fs::write(&tmp, &bytes)
            .with_context(|| format!("write model file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replace model file {}", self.path.display()))?;
        Ok(())
    }
}

/// Volatile store for tests and deployments that do not persist the model.
#[derive(Default)]
pub struct MemoryModelStore {
    state: Mutex<Option<ModelState>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for MemoryModelStore {
    fn load(&self) -> Result<Option<ModelState>> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &ModelState) -> Result<()> {
        *self.state.lock() = Some(state.clone());
        Ok(())
    }
}
