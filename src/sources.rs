use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::AnalyzerConfig;
use crate::core::SourceFile;

/// Walks a directory tree and materializes the text of every candidate module.
///
/// This is the only place that touches the file system; the analysis core
/// works on the returned [`SourceFile`] list.
pub struct FileScanner {
    extensions: HashSet<String>,
    skip_dirs: HashSet<String>,
}

impl FileScanner {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            extensions: config.extensions.iter().cloned().collect(),
            skip_dirs: config.skip_dirs.iter().cloned().collect(),
        }
    }

    /// Collect sources under `root`, with paths relative to `root`, sorted by path.
    ///
    /// Unreadable files are kept with `text: None` so the analyzer can report
    /// them instead of silently analyzing a smaller tree.
    pub fn collect(&self, root: &Path) -> Result<Vec<SourceFile>> {
        if !root.is_dir() {
            anyhow::bail!("Input path is not a directory: {}", root.display());
        }

        // Collect all entries first for parallel reading
        let entries: Vec<PathBuf> = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| !self.is_skipped_dir(entry))
            .filter_map(|e| e.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| self.has_supported_extension(path))
            .collect();

        let mut files: Vec<SourceFile> = entries
            .par_iter()
            .map(|path| -> Result<SourceFile> {
                let relative = path
                    .strip_prefix(root)
                    .with_context(|| format!("{} is outside {}", path.display(), root.display()))?
                    .to_path_buf();
                let text = match fs::read_to_string(path) {
                    Ok(text) => Some(text),
                    Err(err) => {
                        tracing::warn!("Failed to read {}: {}", path.display(), err);
                        None
                    }
                };
                Ok(SourceFile {
                    path: relative,
                    text,
                })
            })
            .collect::<Result<_>>()?;

        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!("Collected {} source files under {}", files.len(), root.display());
        Ok(files)
    }

    fn is_skipped_dir(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| self.skip_dirs.contains(name))
                .unwrap_or(false)
    }

    fn has_supported_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(ext))
            .unwrap_or(false)
    }
}
