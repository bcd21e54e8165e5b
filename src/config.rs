use std::path::{Path, PathBuf};

use crate::{store::DatasetStore, transform::TransformRegistry};

pub const DEFAULT_BASE_DIR: &str = "datasets";

/// Settings threaded through every entry point instead of process-wide defaults.
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    pub base_dir: PathBuf,
    pub transforms: TransformRegistry,
}

impl ForgeConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            transforms: TransformRegistry::standard(),
        }
    }

    pub fn with_transforms(mut self, transforms: TransformRegistry) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn datasets(&self) -> DatasetStore {
        DatasetStore::new(&self.base_dir)
    }
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DIR)
    }
}
