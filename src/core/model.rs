use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use super::diagnostics::ResolveFailure;

/// Dot-joined, package-qualified module path (`pkg.sub.mod`).
pub type ModuleId = String;

/// One `(module path, raw text)` pair handed over by the file-system collaborator.
///
/// `text` is `None` when the collaborator found the path but could not read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: Option<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: Some(text.into()),
        }
    }

    pub fn unreadable(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            text: None,
        }
    }
}

/// A single importable source file.
#[derive(Debug, Clone, Serialize)]
pub struct Module {
    pub id: ModuleId,
    pub path: PathBuf,
    /// Set for package marker files; the module id is then the package id.
    pub is_package: bool,
    #[serde(skip)]
    pub source: String,
}

impl Module {
    /// The package this module's relative imports are anchored at.
    ///
    /// A marker module anchors at its own package, every other module at its
    /// parent. Top-level modules anchor at the anonymous root (`""`).
    pub fn package(&self) -> &str {
        if self.is_package {
            &self.id
        } else {
            parent_id(&self.id)
        }
    }
}

/// A directory that is importable as a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub id: ModuleId,
    /// Id of the marker module, `None` for namespace packages.
    pub marker: Option<ModuleId>,
    pub children: BTreeSet<ModuleId>,
}

impl Package {
    pub fn new(id: ModuleId, marker: Option<ModuleId>) -> Self {
        Self {
            id,
            marker,
            children: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    Function,
    Class,
    Method,
}

/// A decorator recognized as changing how a method is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralMarker {
    StaticMethod,
    ClassMethod,
    Property,
}

impl fmt::Display for StructuralMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StructuralMarker::StaticMethod => "static",
            StructuralMarker::ClassMethod => "class",
            StructuralMarker::Property => "property",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// Position in the owning module's declaration list.
    pub index: usize,
    pub name: String,
    pub qualified_name: String,
    pub kind: DeclarationKind,
    /// Decorator names, outermost first.
    pub decorators: Vec<String>,
    /// Structural markers found among `decorators`, in the same order. Only
    /// filled in for methods.
    pub markers: Vec<StructuralMarker>,
    pub is_async: bool,
    /// Index of the enclosing declaration.
    pub enclosing: Option<usize>,
    /// Base class references as written, for classes.
    pub bases: Vec<String>,
    pub line: usize,
    pub docstring: Option<String>,
}

impl Declaration {
    pub fn is_class(&self) -> bool {
        self.kind == DeclarationKind::Class
    }
}

/// Stable key of a declaration across the whole analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeclarationRef {
    pub module: ModuleId,
    pub index: usize,
    pub name: String,
}

impl DeclarationRef {
    pub fn new(module: &str, declaration: &Declaration) -> Self {
        Self {
            module: module.to_string(),
            index: declaration.index,
            name: declaration.qualified_name.clone(),
        }
    }
}

impl fmt::Display for DeclarationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// One imported binding, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReference {
    pub source: ModuleId,
    /// Dotted module path after the leading dots; empty for `from . import x`.
    pub path: String,
    /// Number of leading dots, 0 for absolute imports.
    pub dots: usize,
    pub alias: Option<String>,
    /// Name after `import` in a `from` import (`*` for wildcards).
    pub symbol: Option<String>,
    pub line: usize,
}

impl ImportReference {
    pub fn is_relative(&self) -> bool {
        self.dots > 0
    }

    pub fn is_wildcard(&self) -> bool {
        self.symbol.as_deref() == Some("*")
    }

    /// Name this import binds in the importing module's namespace.
    pub fn binding(&self) -> Option<&str> {
        if let Some(alias) = &self.alias {
            return Some(alias);
        }
        match self.symbol.as_deref() {
            Some("*") => None,
            Some(symbol) => Some(symbol),
            None => self.path.split('.').next(),
        }
    }

    /// The statement as it would be written, one binding only.
    pub fn statement(&self) -> String {
        let module = format!("{}{}", ".".repeat(self.dots), self.path);
        let mut text = match &self.symbol {
            Some(symbol) => format!("from {} import {}", module, symbol),
            None => format!("import {}", module),
        };
        if let Some(alias) = &self.alias {
            text.push_str(" as ");
            text.push_str(alias);
        }
        text
    }
}

/// How a successful import was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpretation {
    /// `import a.b`
    Module,
    /// `from a import b` where `a.b` is a module
    Submodule,
    /// `from a import b` where `b` is a name defined in `a`
    Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    Resolved {
        target: ModuleId,
        interpretation: Interpretation,
        symbols: Vec<String>,
        /// The submodule won over a same-named symbol of the parent module.
        shadows_symbol: bool,
    },
    Failed {
        failure: ResolveFailure,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedImport {
    pub reference: ImportReference,
    pub outcome: ResolutionOutcome,
}

impl ResolvedImport {
    pub fn target(&self) -> Option<&str> {
        match &self.outcome {
            ResolutionOutcome::Resolved { target, .. } => Some(target),
            ResolutionOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&ResolveFailure> {
        match &self.outcome {
            ResolutionOutcome::Resolved { .. } => None,
            ResolutionOutcome::Failed { failure } => Some(failure),
        }
    }

    pub fn interpretation(&self) -> Option<Interpretation> {
        match &self.outcome {
            ResolutionOutcome::Resolved { interpretation, .. } => Some(*interpretation),
            ResolutionOutcome::Failed { .. } => None,
        }
    }
}

/// An edge of the dependency graph, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DependencyEdge {
    Imports {
        from: ModuleId,
        to: ModuleId,
        self_import: bool,
    },
    Extends {
        from: DeclarationRef,
        to: DeclarationRef,
    },
}

pub fn parent_id(id: &str) -> &str {
    id.rsplit_once('.').map_or("", |(parent, _)| parent)
}

pub fn join_id(prefix: &str, suffix: &str) -> String {
    match (prefix.is_empty(), suffix.is_empty()) {
        (true, _) => suffix.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{}.{}", prefix, suffix),
    }
}
