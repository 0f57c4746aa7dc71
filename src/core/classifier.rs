use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::diagnostics::{Diagnostic, DiagnosticKind};
use super::graph::DependencyGraph;
use super::model::{Declaration, DeclarationKind, DeclarationRef, ModuleId, StructuralMarker};
use crate::parsers::ExtractedModule;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolRole {
    PlainFunction,
    DecoratedFunction,
    StaticMethod,
    ClassMethod,
    InstanceMethod,
    Property,
    PlainClass,
    DecoratedClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub role: SymbolRole,
    pub is_async: bool,
    pub outermost_decorator: Option<String>,
    /// Decorators in the order they wrap the definition, innermost first.
    pub application_order: Vec<String>,
    /// Resolved ancestors, depth-first and left to right.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub base_chain: Vec<DeclarationRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved_bases: Vec<String>,
}

/// Classifications of one module, parallel to its declaration list.
///
/// `None` marks a declaration that could not be classified; the matching
/// diagnostic says why.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedModule {
    pub classifications: Vec<Option<Classification>>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct SymbolClassifier<'g> {
    graph: &'g DependencyGraph,
}

impl<'g> SymbolClassifier<'g> {
    pub fn new(graph: &'g DependencyGraph) -> Self {
        Self { graph }
    }

    pub fn classify_all(
        &self,
        modules: &BTreeMap<ModuleId, ExtractedModule>,
    ) -> BTreeMap<ModuleId, ClassifiedModule> {
        let classified: Vec<(ModuleId, ClassifiedModule)> = modules
            .par_iter()
            .map(|(id, extracted)| (id.clone(), self.classify_module(id, extracted)))
            .collect();
        classified.into_iter().collect()
    }

    pub fn classify_module(&self, module: &str, extracted: &ExtractedModule) -> ClassifiedModule {
        let mut result = ClassifiedModule::default();
        for declaration in &extracted.declarations {
            match self.classify(module, declaration) {
                Ok(classification) => result.classifications.push(Some(classification)),
                Err(diagnostic) => {
                    result.classifications.push(None);
                    result.diagnostics.push(diagnostic);
                }
            }
        }
        result
    }

    pub fn classify(
        &self,
        module: &str,
        declaration: &Declaration,
    ) -> Result<Classification, Diagnostic> {
        let mut classification = Classification {
            role: SymbolRole::PlainFunction,
            is_async: declaration.is_async,
            outermost_decorator: declaration.decorators.first().cloned(),
            application_order: declaration.decorators.iter().rev().cloned().collect(),
            base_chain: Vec::new(),
            unresolved_bases: Vec::new(),
        };
        let decorated = !declaration.decorators.is_empty();

        classification.role = match declaration.kind {
            DeclarationKind::Function if decorated => SymbolRole::DecoratedFunction,
            DeclarationKind::Function => SymbolRole::PlainFunction,
            DeclarationKind::Method => method_role(module, declaration)?,
            DeclarationKind::Class => {
                let class = DeclarationRef::new(module, declaration);
                classification.base_chain = self.base_chain(&class).map_err(|cycle| {
                    let path: Vec<String> = cycle.iter().map(ToString::to_string).collect();
                    Diagnostic::new(
                        DiagnosticKind::InheritanceCycle,
                        module,
                        format!("base classes form a cycle: {}", path.join(" -> ")),
                    )
                    .for_declaration(&declaration.qualified_name)
                    .at_line(declaration.line)
                })?;
                classification.unresolved_bases = self
                    .graph
                    .bases_of(&class)
                    .iter()
                    .filter(|link| link.target.is_none())
                    .map(|link| link.name.clone())
                    .collect();
                if decorated {
                    SymbolRole::DecoratedClass
                } else {
                    SymbolRole::PlainClass
                }
            }
        };

        Ok(classification)
    }

    /// Ancestors of `class`, or the offending path when the chain loops.
    fn base_chain(&self, class: &DeclarationRef) -> Result<Vec<DeclarationRef>, Vec<DeclarationRef>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut path = vec![class.clone()];
        self.walk_bases(class, &mut path, &mut seen, &mut chain)?;
        Ok(chain)
    }

    fn walk_bases(
        &self,
        class: &DeclarationRef,
        path: &mut Vec<DeclarationRef>,
        seen: &mut HashSet<DeclarationRef>,
        chain: &mut Vec<DeclarationRef>,
    ) -> Result<(), Vec<DeclarationRef>> {
        for base in self.graph.resolved_bases(class) {
            if let Some(start) = path.iter().position(|ancestor| ancestor == base) {
                let mut cycle = path[start..].to_vec();
                cycle.push(base.clone());
                return Err(cycle);
            }
            if seen.insert(base.clone()) {
                chain.push(base.clone());
                path.push(base.clone());
                self.walk_bases(base, path, seen, chain)?;
                path.pop();
            }
        }
        Ok(())
    }
}

fn method_role(module: &str, declaration: &Declaration) -> Result<SymbolRole, Diagnostic> {
    let distinct: BTreeSet<StructuralMarker> = declaration.markers.iter().copied().collect();
    let mut markers = distinct.iter();
    match (markers.next(), markers.next()) {
        (None, _) => Ok(SymbolRole::InstanceMethod),
        (Some(marker), None) => Ok(match marker {
            StructuralMarker::StaticMethod => SymbolRole::StaticMethod,
            StructuralMarker::ClassMethod => SymbolRole::ClassMethod,
            StructuralMarker::Property => SymbolRole::Property,
        }),
        (Some(_), Some(_)) => {
            let names: Vec<String> = distinct.iter().map(ToString::to_string).collect();
            Err(Diagnostic::new(
                DiagnosticKind::ConflictingModifiers,
                module,
                format!(
                    "decorators [{}] combine the {} modifiers",
                    declaration.decorators.join(", "),
                    names.join(" and ")
                ),
            )
            .for_declaration(&declaration.qualified_name)
            .at_line(declaration.line))
        }
    }
}
