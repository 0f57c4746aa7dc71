use serde::Serialize;

use super::classifier::Classification;
use super::diagnostics::{Diagnostic, DiagnosticKind};
use super::graph::ImportCycle;
use super::model::{Declaration, DependencyEdge, ModuleId, ResolvedImport};

/// Serializable outcome of one analysis run.
///
/// Every collection has a fixed order (modules and packages by id,
/// declarations and imports in source order, edges by kind then endpoints)
/// so two runs over the same sources serialize identically.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub root: String,
    pub modules: Vec<ModuleReport>,
    pub packages: Vec<PackageReport>,
    pub unimportable: Vec<String>,
    pub edges: Vec<DependencyEdge>,
    pub cycles: Vec<ImportCycle>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleReport {
    pub id: ModuleId,
    pub path: String,
    pub is_package: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exports: Option<Vec<String>>,
    pub declarations: Vec<ClassifiedDeclaration>,
    pub imports: Vec<ResolvedImport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedDeclaration {
    #[serde(flatten)]
    pub declaration: Declaration,
    pub classification: Option<Classification>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageReport {
    pub id: ModuleId,
    pub marker: Option<ModuleId>,
    pub children: Vec<ModuleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exports: Option<Vec<String>>,
    /// Imports of the marker module, i.e. what the package re-exports.
    pub reexports: Vec<ResolvedImport>,
}

impl AnalysisReport {
    pub fn module(&self, id: &str) -> Option<&ModuleReport> {
        self.modules
            .binary_search_by(|module| module.id.as_str().cmp(id))
            .ok()
            .map(|idx| &self.modules[idx])
    }

    pub fn package(&self, id: &str) -> Option<&PackageReport> {
        self.packages.iter().find(|package| package.id == id)
    }

    pub fn declaration(&self, module: &str, qualified_name: &str) -> Option<&ClassifiedDeclaration> {
        self.module(module)?
            .declarations
            .iter()
            .find(|entry| entry.declaration.qualified_name == qualified_name)
    }

    pub fn diagnostics_of_kind(&self, kind: DiagnosticKind) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.kind == kind)
            .collect()
    }

    pub fn import_edges(&self) -> Vec<(&str, &str)> {
        self.edges
            .iter()
            .filter_map(|edge| match edge {
                DependencyEdge::Imports { from, to, .. } => Some((from.as_str(), to.as_str())),
                DependencyEdge::Extends { .. } => None,
            })
            .collect()
    }

    pub fn extends_edge_count(&self) -> usize {
        self.edges.len() - self.import_edges().len()
    }

    pub fn declaration_count(&self) -> usize {
        self.modules
            .iter()
            .map(|module| module.declarations.len())
            .sum()
    }
}
