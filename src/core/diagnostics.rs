use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use super::model::ModuleId;
use crate::config::ConfigError;

/// Errors that abort an analysis run.
///
/// Everything that can go wrong inside a single module is reported as a
/// [`Diagnostic`] instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("no readable source for module path {}", path.display())]
    MissingSource { path: PathBuf },

    #[error("failed to initialize {language} parser: {message}")]
    ParserInit { language: String, message: String },

    #[error("parser produced no syntax tree for module `{module}`")]
    Parse { module: ModuleId },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Why an import reference could not be mapped to a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolveFailure {
    #[error("no module or package named `{path}`")]
    UnresolvedAbsolute { path: String },

    #[error("relative import points at `{path}`, which is not a known module or package")]
    UnresolvedRelative { path: String },

    #[error("{dots} leading dots climb above the analysis root from package `{package}`")]
    RelativeEscapesRoot { dots: usize, package: String },
}

impl ResolveFailure {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            ResolveFailure::UnresolvedAbsolute { .. } => DiagnosticKind::UnresolvedAbsolute,
            ResolveFailure::UnresolvedRelative { .. } => DiagnosticKind::UnresolvedRelative,
            ResolveFailure::RelativeEscapesRoot { .. } => DiagnosticKind::RelativeEscapesRoot,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticKind {
    DuplicateModuleId,
    MalformedImport,
    UnresolvedAbsolute,
    UnresolvedRelative,
    RelativeEscapesRoot,
    InheritanceCycle,
    ConflictingModifiers,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::DuplicateModuleId => "DuplicateModuleId",
            DiagnosticKind::MalformedImport => "MalformedImport",
            DiagnosticKind::UnresolvedAbsolute => "UnresolvedAbsolute",
            DiagnosticKind::UnresolvedRelative => "UnresolvedRelative",
            DiagnosticKind::RelativeEscapesRoot => "RelativeEscapesRoot",
            DiagnosticKind::InheritanceCycle => "InheritanceCycle",
            DiagnosticKind::ConflictingModifiers => "ConflictingModifiers",
        };
        f.write_str(name)
    }
}

/// A recoverable problem attached to one module (and possibly one declaration).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub module: ModuleId,
    /// Qualified name of the offending declaration.
    pub declaration: Option<String>,
    pub line: Option<usize>,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, module: impl Into<ModuleId>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            module: module.into(),
            declaration: None,
            line: None,
            detail: detail.into(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn for_declaration(mut self, qualified_name: impl Into<String>) -> Self {
        self.declaration = Some(qualified_name.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.kind, self.module)?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
        }
        if let Some(declaration) = &self.declaration {
            write!(f, " ({})", declaration)?;
        }
        write!(f, ": {}", self.detail)
    }
}
