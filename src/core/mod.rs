pub mod analyzer;
pub mod classifier;
pub mod diagnostics;
pub mod graph;
pub mod model;
pub mod report;
pub mod resolver;
pub mod scanner;

pub use analyzer::CodebaseAnalyzer;
pub use classifier::{Classification, ClassifiedModule, SymbolClassifier, SymbolRole};
pub use diagnostics::{AnalysisError, Diagnostic, DiagnosticKind, ResolveFailure};
pub use graph::{BaseLink, BaseResolver, DependencyGraph, EdgeKind, GraphBuilder, ImportCycle};
pub use model::{
    Declaration, DeclarationKind, DeclarationRef, DependencyEdge, ImportReference,
    Interpretation, Module, ModuleId, Package, ResolutionOutcome, ResolvedImport, SourceFile,
    StructuralMarker,
};
pub use report::{AnalysisReport, ClassifiedDeclaration, ModuleReport, PackageReport};
pub use resolver::ImportResolver;
pub use scanner::{ScanResult, SourceScanner};
