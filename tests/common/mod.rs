#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use dataforge::{config::ForgeConfig, store::DatasetMeta};
use tempfile::{TempDir, tempdir};

/// Scratch base directory with helpers for building datasets.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Base directory that holds the datasets.
    pub fn base_dir(&self) -> PathBuf {
        self.path().join("datasets")
    }

    pub fn config(&self) -> ForgeConfig {
        ForgeConfig::new(self.base_dir())
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn create_dataset(&self, name: &str) -> PathBuf {
        self.config()
            .datasets()
            .register_dataset(name, &DatasetMeta::new(name, None))
            .expect("register dataset")
    }

    /// Creates `dataset` if needed and attaches `contents` as `<name>.<ext>`.
    pub fn attach(&self, dataset: &str, name: &str, ext: &str, contents: &str) -> PathBuf {
        self.create_dataset(dataset);
        let file = self.write(&format!("incoming/{name}.{ext}"), contents);
        self.config()
            .datasets()
            .attach_file(dataset, &file, name)
            .expect("attach file")
    }

    pub fn import_log(&self, dataset: &str) -> PathBuf {
        self.base_dir().join(dataset).join("imports.log")
    }
}
