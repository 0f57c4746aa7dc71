use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

use super::classifier::{ClassifiedModule, SymbolClassifier};
use super::diagnostics::{AnalysisError, Diagnostic};
use super::graph::{BaseResolver, GraphBuilder};
use super::model::{ModuleId, ResolvedImport, SourceFile};
use super::report::{AnalysisReport, ClassifiedDeclaration, ModuleReport, PackageReport};
use super::resolver::{failure_diagnostics, ImportResolver};
use super::scanner::{display_path, ScanResult, SourceScanner};
use crate::config::AnalyzerConfig;
use crate::parsers::cache::ParseCache;
use crate::parsers::python::PythonParser;
use crate::parsers::{ExtractedModule, LanguageParser};

/// Runs the whole pipeline: scan, extract, resolve, build the graph, classify.
pub struct CodebaseAnalyzer {
    config: AnalyzerConfig,
    parser: PythonParser,
    parse_cache: ParseCache,
}

impl CodebaseAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            parser: PythonParser::new(config.markers.clone()),
            parse_cache: ParseCache::new(config.cache_dir.clone()),
            config,
        }
    }

    /// Analyzer configured from the `.modscope.toml` in `root`, if any.
    pub fn discover(root: &Path) -> Result<Self, AnalysisError> {
        Ok(Self::new(AnalyzerConfig::discover(root)?))
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn parse_cache(&self) -> &ParseCache {
        &self.parse_cache
    }

    /// Analyze the given sources, which live under `root`.
    ///
    /// Fails only on input contract violations; everything else ends up in
    /// the report's diagnostics.
    pub fn analyze(
        &self,
        root: &Path,
        sources: Vec<SourceFile>,
    ) -> Result<AnalysisReport, AnalysisError> {
        let scan = SourceScanner::new(&self.config).scan(sources)?;

        tracing::info!("Extracting declarations from {} modules", scan.modules.len());
        let extracted = self.extract_all(&scan)?;

        tracing::info!("Resolving imports");
        let resolver = ImportResolver::new(&scan, &extracted);
        let resolved = resolver.resolve_all(&extracted);

        tracing::info!("Building dependency graph");
        let bases = BaseResolver::new(&extracted, &resolved).resolve_all();
        let mut builder = GraphBuilder::new();
        for id in scan.ids() {
            builder.add_module(id);
        }
        for (module, imports) in &resolved {
            builder.add_resolved_imports(module, imports);
        }
        for (class, links) in bases {
            builder.add_bases(class, links);
        }
        let graph = builder.build();

        let (cycles, classified) = rayon::join(
            || graph.import_cycles(),
            || SymbolClassifier::new(&graph).classify_all(&extracted),
        );
        if !cycles.is_empty() {
            tracing::info!("Found {} import cycles", cycles.len());
        }

        let mut report = assemble(root, &scan, extracted, resolved, classified);
        report.edges = graph.edges().cloned().collect();
        report.cycles = cycles;

        tracing::info!(
            "Analyzed {} modules: {} edges, {} diagnostics",
            report.modules.len(),
            report.edges.len(),
            report.diagnostics.len()
        );
        Ok(report)
    }

    fn extract_all(
        &self,
        scan: &ScanResult,
    ) -> Result<BTreeMap<ModuleId, ExtractedModule>, AnalysisError> {
        scan.modules
            .par_iter()
            .map(|module| -> Result<(ModuleId, ExtractedModule), AnalysisError> {
                let fingerprint = ParseCache::fingerprint(module, self.parser.markers());
                if let Some(cached) = self.parse_cache.get(fingerprint) {
                    return Ok((module.id.clone(), cached));
                }

                let extracted = self.parser.extract(module)?;
                if let Err(err) = self.parse_cache.store(fingerprint, &extracted) {
                    tracing::warn!("Failed to cache extraction of {}: {}", module.id, err);
                }
                Ok((module.id.clone(), extracted))
            })
            .collect()
    }
}

fn assemble(
    root: &Path,
    scan: &ScanResult,
    mut extracted: BTreeMap<ModuleId, ExtractedModule>,
    mut resolved: BTreeMap<ModuleId, Vec<ResolvedImport>>,
    mut classified: BTreeMap<ModuleId, ClassifiedModule>,
) -> AnalysisReport {
    let mut diagnostics: Vec<Diagnostic> = scan.diagnostics.clone();

    let packages = scan
        .packages
        .values()
        .map(|package| {
            let marker = package.marker.as_deref();
            PackageReport {
                id: package.id.clone(),
                marker: package.marker.clone(),
                children: package.children.iter().cloned().collect(),
                exports: marker
                    .and_then(|id| extracted.get(id))
                    .and_then(|module| module.exports.clone()),
                reexports: marker
                    .and_then(|id| resolved.get(id))
                    .cloned()
                    .unwrap_or_default(),
            }
        })
        .collect();

    let modules = scan
        .modules
        .iter()
        .map(|module| {
            let ExtractedModule {
                declarations,
                imports: _,
                exports,
                diagnostics: extraction_diagnostics,
            } = extracted.remove(&module.id).unwrap_or_default();
            let imports = resolved.remove(&module.id).unwrap_or_default();
            let ClassifiedModule {
                classifications,
                diagnostics: classification_diagnostics,
            } = classified.remove(&module.id).unwrap_or_default();

            diagnostics.extend(extraction_diagnostics);
            diagnostics.extend(failure_diagnostics(&module.id, &imports));
            diagnostics.extend(classification_diagnostics);

            let declarations = declarations
                .into_iter()
                .zip(classifications.into_iter().chain(std::iter::repeat(None)))
                .map(|(declaration, classification)| ClassifiedDeclaration {
                    declaration,
                    classification,
                })
                .collect();

            ModuleReport {
                id: module.id.clone(),
                path: display_path(&module.path),
                is_package: module.is_package,
                exports,
                declarations,
                imports,
            }
        })
        .collect();

    // Stable: stage order is kept within a module.
    diagnostics.sort_by(|a, b| a.module.cmp(&b.module));

    AnalysisReport {
        root: display_path(root),
        modules,
        packages,
        unimportable: scan.unimportable.iter().map(|path| display_path(path)).collect(),
        edges: Vec::new(),
        cycles: Vec::new(),
        diagnostics,
    }
}
