//! Analyzer configuration, read from `.modscope.toml`.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! standard Python layout: `.py`/`.pyi` sources, `__init__` package markers and
//! the builtin `staticmethod`/`classmethod`/`property` decorators.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::StructuralMarker;

pub const CONFIG_FILE_NAME: &str = ".modscope.toml";

const ACCESSOR_SUFFIXES: [&str; 3] = ["setter", "getter", "deleter"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// File extensions (without the dot) treated as modules.
    pub extensions: Vec<String>,
    /// File stem that turns a directory into a package.
    pub package_marker: String,
    /// Treat directories without a marker as importable.
    pub namespace_packages: bool,
    /// Directory names never descended into.
    pub skip_dirs: Vec<String>,
    /// Enables the on-disk extraction cache.
    pub cache_dir: Option<PathBuf>,
    pub markers: MarkerConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["py".to_string(), "pyi".to_string()],
            package_marker: "__init__".to_string(),
            namespace_packages: false,
            skip_dirs: [".git", "__pycache__", ".venv", "venv", "node_modules"]
                .iter()
                .map(|dir| dir.to_string())
                .collect(),
            cache_dir: None,
            markers: MarkerConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Load `.modscope.toml` from `root` if present, defaults otherwise.
    pub fn discover(root: &Path) -> Result<Self, ConfigError> {
        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.extensions.iter().any(|ext| ext == extension)
    }
}

/// Decorator names recognized as structural modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub static_method: Vec<String>,
    pub class_method: Vec<String>,
    pub property: Vec<String>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            static_method: vec!["staticmethod".to_string()],
            class_method: vec!["classmethod".to_string()],
            property: vec!["property".to_string(), "cached_property".to_string()],
        }
    }
}

impl MarkerConfig {
    /// Map a decorator name to the marker it stands for, if any.
    ///
    /// Dotted names match on their full text first, then on the last segment.
    /// `<name>.setter`, `<name>.getter` and `<name>.deleter` are property
    /// accessors.
    pub fn recognize(&self, decorator: &str) -> Option<StructuralMarker> {
        if let Some((_, last)) = decorator.rsplit_once('.') {
            if ACCESSOR_SUFFIXES.contains(&last) {
                return Some(StructuralMarker::Property);
            }
        }

        self.lookup(decorator).or_else(|| {
            decorator
                .rsplit_once('.')
                .and_then(|(_, last)| self.lookup(last))
        })
    }

    fn lookup(&self, name: &str) -> Option<StructuralMarker> {
        let listed = |names: &[String]| names.iter().any(|candidate| candidate == name);
        if listed(&self.static_method) {
            Some(StructuralMarker::StaticMethod)
        } else if listed(&self.class_method) {
            Some(StructuralMarker::ClassMethod)
        } else if listed(&self.property) {
            Some(StructuralMarker::Property)
        } else {
            None
        }
    }
}
