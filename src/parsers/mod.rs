pub mod cache;
pub mod common;
pub mod python;

use serde::{Deserialize, Serialize};

use crate::core::{AnalysisError, Declaration, Diagnostic, ImportReference, Module};

/// Everything the extractor pulls out of one module, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedModule {
    pub declarations: Vec<Declaration>,
    pub imports: Vec<ImportReference>,
    /// Names listed in a module-level `__all__`.
    pub exports: Option<Vec<String>>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ExtractedModule {
    /// Last module-level class named `name` ("last definition wins").
    pub fn top_level_class(&self, name: &str) -> Option<&Declaration> {
        self.declarations
            .iter()
            .rev()
            .find(|d| d.is_class() && d.enclosing.is_none() && d.name == name)
    }

    /// Names bound at module level by definitions and imports.
    pub fn module_level_names(&self) -> impl Iterator<Item = &str> {
        let definitions = self
            .declarations
            .iter()
            .filter(|d| d.enclosing.is_none())
            .map(|d| d.name.as_str());
        let bindings = self.imports.iter().filter_map(|i| i.binding());
        definitions.chain(bindings)
    }
}

pub trait LanguageParser {
    fn extract(&self, module: &Module) -> Result<ExtractedModule, AnalysisError>;
    fn language_name(&self) -> &str;
}
