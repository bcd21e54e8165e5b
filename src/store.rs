//! Dataset directories and their attachment registry.
//!
//! A dataset is a directory `<base>/<name>` created by
//! [`DatasetStore::register_dataset`], which also writes its `meta.yml`. Attached files are copied into
//! `<base>/<name>/attachments/` and recorded in `registry.yml`:
//!
//! ```yaml
//! attachments:
//!   customers:
//!     path: attachments/customers.csv
//! ```

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::BufReader,
    path::{Component, Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::ImportError;

pub const META_FILE: &str = "meta.yml";
pub const REGISTRY_FILE: &str = "registry.yml";
pub const ATTACHMENTS_DIR: &str = "attachments";

/// Contents of `meta.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl DatasetMeta {
    pub fn new(name: &str, description: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            description,
            created: Some(Utc::now()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Path relative to the dataset directory.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub attachments: BTreeMap<String, Attachment>,
}

#[derive(Debug, Clone)]
pub struct DatasetStore {
    base_dir: PathBuf,
}

impl DatasetStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn dataset_dir(&self, dataset: &str) -> PathBuf {
        self.base_dir.join(dataset)
    }

    /// The dataset directory, or `DatasetNotFound`.
    pub fn existing_dataset_dir(&self, dataset: &str) -> Result<PathBuf, ImportError> {
        let dir = self.dataset_dir(dataset);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(ImportError::DatasetNotFound(dir))
        }
    }

    /// Creates the dataset directory if needed and (re)writes its `meta.yml`.
    pub fn register_dataset(&self, name: &str, meta: &DatasetMeta) -> Result<PathBuf, ImportError> {
        let dir = self.dataset_dir(name);
        let mut components = Path::new(name).components();
        let single_segment = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if name.trim().is_empty() || !single_segment {
            return Err(ImportError::Registry {
                path: dir,
                reason: format!("'{name}' is not a valid dataset name"),
            });
        }
        let meta_path = dir.join(META_FILE);
        let meta_err = |reason: String| ImportError::Registry {
            path: meta_path.clone(),
            reason,
        };
        fs::create_dir_all(&dir).map_err(|err| meta_err(err.to_string()))?;
        let file = File::create(&meta_path).map_err(|err| meta_err(err.to_string()))?;
        serde_yaml::to_writer(file, meta).map_err(|err| meta_err(err.to_string()))?;
        info!("Registered dataset '{name}' at {:?}", dir);
        Ok(dir)
    }

    /// `meta.yml` of `dataset`, if it was registered.
    pub fn meta(&self, dataset: &str) -> Result<Option<DatasetMeta>, ImportError> {
        let path = self.dataset_dir(dataset).join(META_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let meta_err = |reason: String| ImportError::Registry {
            path: path.clone(),
            reason,
        };
        let file = File::open(&path).map_err(|err| meta_err(err.to_string()))?;
        serde_yaml::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(|err| meta_err(err.to_string()))
    }

    pub fn registry(&self, dataset: &str) -> Result<Registry, ImportError> {
        let path = self.dataset_dir(dataset).join(REGISTRY_FILE);
        if !path.exists() {
            return Ok(Registry::default());
        }
        let registry_err = |reason: String| ImportError::Registry {
            path: path.clone(),
            reason,
        };
        let file = File::open(&path).map_err(|err| registry_err(err.to_string()))?;
        let registry: Option<Registry> = serde_yaml::from_reader(BufReader::new(file))
            .map_err(|err| registry_err(err.to_string()))?;
        Ok(registry.unwrap_or_default())
    }

    fn save_registry(&self, dataset: &str, registry: &Registry) -> Result<(), ImportError> {
        let path = self.dataset_dir(dataset).join(REGISTRY_FILE);
        let registry_err = |reason: String| ImportError::Registry {
            path: path.clone(),
            reason,
        };
        let file = File::create(&path).map_err(|err| registry_err(err.to_string()))?;
        serde_yaml::to_writer(file, registry).map_err(|err| registry_err(err.to_string()))
    }

    /// Absolute-or-base-relative path of the attachment registered as `name`.
    pub fn resolve_attachment(&self, dataset: &str, name: &str) -> Result<PathBuf, ImportError> {
        let registry = self.registry(dataset)?;
        let attachment =
            registry
                .attachments
                .get(name)
                .ok_or_else(|| ImportError::AttachmentNotFound {
                    dataset: dataset.to_string(),
                    name: name.to_string(),
                })?;
        let path = self.dataset_dir(dataset).join(&attachment.path);
        debug!("Attachment '{name}' of '{dataset}' resolves to {:?}", path);
        Ok(path)
    }

    /// Copies `file` into the dataset and registers it as `name`, keeping the extension.
    pub fn attach_file(&self, dataset: &str, file: &Path, name: &str) -> Result<PathBuf, ImportError> {
        let dataset_dir = self.existing_dataset_dir(dataset)?;
        let attachments_dir = dataset_dir.join(ATTACHMENTS_DIR);
        let io_err = |path: &Path, err: std::io::Error| ImportError::Registry {
            path: path.to_path_buf(),
            reason: err.to_string(),
        };
        fs::create_dir_all(&attachments_dir).map_err(|err| io_err(&attachments_dir, err))?;

        let mut file_name = name.to_string();
        if let Some(ext) = file.extension().and_then(|ext| ext.to_str()) {
            file_name.push('.');
            file_name.push_str(ext);
        }
        let destination = attachments_dir.join(file_name);
        fs::copy(file, &destination).map_err(|err| io_err(file, err))?;

        let mut registry = self.registry(dataset)?;
        let relative = Path::new(ATTACHMENTS_DIR).join(
            destination
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_default(),
        );
        registry
            .attachments
            .insert(name.to_string(), Attachment { path: relative });
        self.save_registry(dataset, &registry)?;
        info!("Attached {:?} as '{name}' into dataset '{dataset}'", file);
        Ok(destination)
    }

    /// Every dataset directory under the base path with its registry, sorted by name.
    pub fn list(&self) -> Result<Vec<(String, Registry)>, ImportError> {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(ImportError::Registry {
                    path: self.base_dir.clone(),
                    reason: err.to_string(),
                });
            }
        };
        let mut names = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect::<Vec<_>>();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let registry = self.registry(&name)?;
                Ok((name, registry))
            })
            .collect()
    }
}
