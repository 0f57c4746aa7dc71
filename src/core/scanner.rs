use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use super::diagnostics::{AnalysisError, Diagnostic, DiagnosticKind};
use super::model::{parent_id, Module, ModuleId, Package, SourceFile};
use crate::config::AnalyzerConfig;

/// Canonical id table produced by [`SourceScanner::scan`].
///
/// Written once, then shared read-only by every later stage.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Importable modules, sorted by id.
    pub modules: Vec<Module>,
    pub packages: BTreeMap<ModuleId, Package>,
    /// Files that live under a non-package directory or whose name is not a
    /// valid module name.
    pub unimportable: Vec<PathBuf>,
    /// Ids dropped because several files claimed them.
    pub excluded: BTreeSet<ModuleId>,
    pub diagnostics: Vec<Diagnostic>,
    ids: BTreeSet<ModuleId>,
    index: HashMap<ModuleId, usize>,
}

impl ScanResult {
    /// Whether `id` names a module or package that imports may resolve to.
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> &BTreeSet<ModuleId> {
        &self.ids
    }

    pub fn module(&self, id: &str) -> Option<&Module> {
        self.index.get(id).map(|&idx| &self.modules[idx])
    }

    pub fn package(&self, id: &str) -> Option<&Package> {
        self.packages.get(id)
    }
}

struct Candidate {
    path: PathBuf,
    dirs: Vec<String>,
    id: ModuleId,
    is_marker: bool,
    source: String,
}

/// Maps source files to canonical module and package ids.
pub struct SourceScanner {
    extensions: Vec<String>,
    package_marker: String,
    namespace_packages: bool,
}

impl SourceScanner {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            package_marker: config.package_marker.clone(),
            namespace_packages: config.namespace_packages,
        }
    }

    pub fn scan(&self, mut sources: Vec<SourceFile>) -> Result<ScanResult, AnalysisError> {
        sources.sort_by(|a, b| a.path.cmp(&b.path));

        let mut result = ScanResult::default();
        let mut candidates = Vec::with_capacity(sources.len());

        for source in sources {
            if !self.has_module_extension(&source.path) {
                tracing::debug!("Skipping non-module file {}", source.path.display());
                continue;
            }
            let Some(text) = source.text else {
                return Err(AnalysisError::MissingSource { path: source.path });
            };
            match self.candidate(&source.path, text) {
                Some(candidate) => candidates.push(candidate),
                None => result.unimportable.push(source.path),
            }
        }

        let visible = self.visible(candidates, &mut result.unimportable);
        let mut groups: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        let mut survivors = Vec::with_capacity(visible.len());
        for candidate in visible {
            groups
                .entry(candidate.id.to_ascii_lowercase())
                .or_default()
                .push(candidate);
        }

        for (_, mut group) in groups {
            if group.len() > 1 {
                group.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.path.cmp(&b.path)));
                let paths: Vec<String> = group.iter().map(|c| display_path(&c.path)).collect();
                tracing::warn!(
                    "Module id `{}` claimed by {}; excluding all of them",
                    group[0].id,
                    paths.join(", ")
                );
                result.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::DuplicateModuleId,
                    group[0].id.clone(),
                    format!("{} map to the same module id", paths.join(", ")),
                ));
                result.excluded.extend(group.into_iter().map(|c| c.id));
                continue;
            }

            survivors.extend(group.pop());
        }

        // An excluded marker leaves its directory unmarked.
        let survivors = self.visible(survivors, &mut result.unimportable);
        let package_dirs: BTreeSet<Vec<String>> = survivors
            .iter()
            .flat_map(|c| (1..=c.dirs.len()).map(move |n| c.dirs[..n].to_vec()))
            .collect();
        result.modules = survivors
            .into_iter()
            .map(|candidate| Module {
                id: candidate.id,
                path: candidate.path,
                is_package: candidate.is_marker,
                source: candidate.source,
            })
            .collect();

        result.modules.sort_by(|a, b| a.id.cmp(&b.id));
        self.build_packages(&mut result, package_dirs);

        result.ids = result
            .modules
            .iter()
            .map(|m| m.id.clone())
            .chain(result.packages.keys().cloned())
            .filter(|id| !result.excluded.contains(id))
            .collect();
        result.index = result
            .modules
            .iter()
            .enumerate()
            .map(|(idx, m)| (m.id.clone(), idx))
            .collect();
        result.unimportable.sort();

        tracing::info!(
            "Scanned {} modules in {} packages ({} unimportable files)",
            result.modules.len(),
            result.packages.len(),
            result.unimportable.len()
        );
        Ok(result)
    }

    fn build_packages(&self, result: &mut ScanResult, package_dirs: BTreeSet<Vec<String>>) {
        for dirs in package_dirs {
            let id = dirs.join(".");
            let marker = result
                .modules
                .iter()
                .find(|m| m.is_package && m.id == id)
                .map(|m| m.id.clone());
            result.packages.insert(id.clone(), Package::new(id, marker));
        }

        let module_children = result
            .modules
            .iter()
            .filter(|m| !m.is_package)
            .map(|m| m.id.clone());
        let package_children = result.packages.keys().cloned().collect::<Vec<_>>();

        for child in module_children.chain(package_children) {
            let parent = parent_id(&child).to_string();
            if let Some(package) = result.packages.get_mut(&parent) {
                package.children.insert(child);
            }
        }
    }

    fn candidate(&self, path: &Path, source: String) -> Option<Candidate> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_str()?.to_string()),
                Component::CurDir => {}
                _ => return None,
            }
        }

        let file_name = segments.pop()?;
        let stem = Path::new(&file_name).file_stem()?.to_str()?.to_string();
        if !segments.iter().all(|s| is_identifier(s)) || !is_identifier(&stem) {
            return None;
        }

        let is_marker = stem == self.package_marker;
        let id = if is_marker {
            // A marker in the analysis root would name the anonymous root package.
            if segments.is_empty() {
                return None;
            }
            segments.join(".")
        } else {
            segments
                .iter()
                .cloned()
                .chain(std::iter::once(stem))
                .collect::<Vec<_>>()
                .join(".")
        };

        Some(Candidate {
            path: path.to_path_buf(),
            dirs: segments,
            id,
            is_marker,
            source,
        })
    }

    /// Candidates importable given the markers among them; the rest are
    /// recorded as unimportable.
    fn visible(&self, candidates: Vec<Candidate>, unimportable: &mut Vec<PathBuf>) -> Vec<Candidate> {
        let marker_dirs: HashSet<Vec<String>> = candidates
            .iter()
            .filter(|c| c.is_marker)
            .map(|c| c.dirs.clone())
            .collect();

        let (visible, hidden): (Vec<Candidate>, Vec<Candidate>) = candidates
            .into_iter()
            .partition(|c| self.is_visible(&c.dirs, &marker_dirs));
        for candidate in hidden {
            tracing::debug!(
                "{} is outside any package and cannot be imported",
                candidate.path.display()
            );
            unimportable.push(candidate.path);
        }
        visible
    }

    fn is_visible(&self, dirs: &[String], marker_dirs: &HashSet<Vec<String>>) -> bool {
        self.namespace_packages
            || (1..=dirs.len()).all(|n| marker_dirs.contains(&dirs[..n]))
    }

    fn has_module_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|accepted| accepted == ext))
            .unwrap_or(false)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

pub(crate) fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
