use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::diagnostics::{Diagnostic, ResolveFailure};
use super::model::{
    join_id, parent_id, ImportReference, Interpretation, ModuleId, ResolutionOutcome,
    ResolvedImport,
};
use super::scanner::ScanResult;
use crate::parsers::ExtractedModule;

/// Maps import references onto the canonical id table.
///
/// Built only after every module has been extracted: whether a target exists
/// is a property of the whole scan.
pub struct ImportResolver<'a> {
    scan: &'a ScanResult,
    /// Module-level names per module, for spotting submodule/symbol clashes.
    symbols: HashMap<&'a str, HashSet<&'a str>>,
}

struct Resolution {
    target: ModuleId,
    interpretation: Interpretation,
    symbols: Vec<String>,
    shadows_symbol: bool,
}

impl<'a> ImportResolver<'a> {
    pub fn new(scan: &'a ScanResult, modules: &'a BTreeMap<ModuleId, ExtractedModule>) -> Self {
        let symbols = modules
            .iter()
            .map(|(id, extracted)| (id.as_str(), extracted.module_level_names().collect()))
            .collect();
        Self { scan, symbols }
    }

    /// Resolve every module's imports; modules are independent and run in parallel.
    pub fn resolve_all(
        &self,
        modules: &BTreeMap<ModuleId, ExtractedModule>,
    ) -> BTreeMap<ModuleId, Vec<ResolvedImport>> {
        let resolved: Vec<(ModuleId, Vec<ResolvedImport>)> = modules
            .par_iter()
            .map(|(id, extracted)| (id.clone(), self.resolve_module(&extracted.imports)))
            .collect();
        resolved.into_iter().collect()
    }

    pub fn resolve_module(&self, imports: &[ImportReference]) -> Vec<ResolvedImport> {
        imports.iter().map(|reference| self.resolve(reference)).collect()
    }

    /// Exactly one [`ResolvedImport`] per reference, success or failure.
    pub fn resolve(&self, reference: &ImportReference) -> ResolvedImport {
        let outcome = match self.resolve_target(reference) {
            Ok(resolution) => ResolutionOutcome::Resolved {
                target: resolution.target,
                interpretation: resolution.interpretation,
                symbols: resolution.symbols,
                shadows_symbol: resolution.shadows_symbol,
            },
            Err(failure) => ResolutionOutcome::Failed { failure },
        };
        ResolvedImport {
            reference: reference.clone(),
            outcome,
        }
    }

    fn resolve_target(&self, reference: &ImportReference) -> Result<Resolution, ResolveFailure> {
        let base = if reference.is_relative() {
            let package = self.source_package(&reference.source);
            relative_base(package, reference.dots, &reference.path)?
        } else {
            reference.path.clone()
        };

        let unresolved = |path: String| {
            if reference.is_relative() {
                ResolveFailure::UnresolvedRelative { path }
            } else {
                ResolveFailure::UnresolvedAbsolute { path }
            }
        };

        match reference.symbol.as_deref() {
            None => {
                if self.scan.contains(&base) {
                    Ok(Resolution {
                        target: base,
                        interpretation: Interpretation::Module,
                        symbols: Vec::new(),
                        shadows_symbol: false,
                    })
                } else {
                    Err(unresolved(base))
                }
            }
            Some("*") => {
                if self.scan.contains(&base) {
                    Ok(Resolution {
                        target: base,
                        interpretation: Interpretation::Symbol,
                        symbols: vec!["*".to_string()],
                        shadows_symbol: false,
                    })
                } else {
                    Err(unresolved(base))
                }
            }
            Some(name) => {
                // A submodule named like the imported name wins over a symbol.
                let submodule = join_id(&base, name);
                if self.scan.contains(&submodule) {
                    let shadows_symbol = self.defines(&base, name);
                    if shadows_symbol {
                        tracing::debug!(
                            "`{}` in {}: `{}` is both a submodule and a name in `{}`; using the submodule",
                            reference.statement(),
                            reference.source,
                            name,
                            base
                        );
                    }
                    return Ok(Resolution {
                        target: submodule,
                        interpretation: Interpretation::Submodule,
                        symbols: Vec::new(),
                        shadows_symbol,
                    });
                }
                if self.scan.contains(&base) {
                    return Ok(Resolution {
                        target: base,
                        interpretation: Interpretation::Symbol,
                        symbols: vec![name.to_string()],
                        shadows_symbol: false,
                    });
                }
                Err(unresolved(if base.is_empty() { submodule } else { base }))
            }
        }
    }

    fn source_package<'s>(&'s self, source: &'s str) -> &'s str {
        match self.scan.module(source) {
            Some(module) => module.package(),
            None => parent_id(source),
        }
    }

    fn defines(&self, module: &str, name: &str) -> bool {
        self.symbols
            .get(module)
            .map_or(false, |names| names.contains(name))
    }
}

/// Anchor a relative import: `dots == 1` is `package` itself, each further dot
/// climbs one package level, then `path` is appended.
pub fn relative_base(package: &str, dots: usize, path: &str) -> Result<String, ResolveFailure> {
    let mut current = package;
    for _ in 1..dots {
        if current.is_empty() {
            return Err(ResolveFailure::RelativeEscapesRoot {
                dots,
                package: package.to_string(),
            });
        }
        current = parent_id(current);
    }
    Ok(join_id(current, path))
}

/// Diagnostics for every failed resolution, in import order.
pub fn failure_diagnostics(module: &str, imports: &[ResolvedImport]) -> Vec<Diagnostic> {
    imports
        .iter()
        .filter_map(|resolved| {
            let failure = resolved.failure()?;
            Some(
                Diagnostic::new(
                    failure.kind(),
                    module,
                    format!("`{}`: {}", resolved.reference.statement(), failure),
                )
                .at_line(resolved.reference.line),
            )
        })
        .collect()
}
