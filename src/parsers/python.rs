use std::borrow::Cow;
use std::collections::BTreeSet;
use tree_sitter::Node as TSNode;

use super::common::{
    extract_docstring, extract_text, find_child_by_kind, line_of, unquote, TreeSitterParser,
};
use super::{ExtractedModule, LanguageParser};
use crate::config::MarkerConfig;
use crate::core::{
    AnalysisError, Declaration, DeclarationKind, Diagnostic, DiagnosticKind, ImportReference,
    Module,
};

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

pub struct PythonParser {
    markers: MarkerConfig,
}

impl PythonParser {
    pub fn new(markers: MarkerConfig) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &MarkerConfig {
        &self.markers
    }
}

impl Default for PythonParser {
    fn default() -> Self {
        Self::new(MarkerConfig::default())
    }
}

impl LanguageParser for PythonParser {
    fn extract(&self, module: &Module) -> Result<ExtractedModule, AnalysisError> {
        let mut parser = TreeSitterParser::new(tree_sitter_python::language(), self.language_name())?;
        let mut source = Cow::Borrowed(module.source.as_str());
        let mut skipped = BTreeSet::new();
        let mut diagnostics = Vec::new();

        // A broken import can swallow the statements after it, so its line is
        // blanked and the module parsed again until every import is well formed.
        let mut extracted = loop {
            let tree = parser
                .parse(&source)
                .ok_or_else(|| AnalysisError::Parse {
                    module: module.id.clone(),
                })?;

            let mut visitor = ModuleVisitor {
                module: &module.id,
                source: source.as_bytes(),
                markers: &self.markers,
                extracted: ExtractedModule::default(),
                malformed_rows: BTreeSet::new(),
            };
            visitor.visit_children(&tree.root_node(), None);
            let ModuleVisitor {
                mut extracted,
                malformed_rows,
                ..
            } = visitor;

            diagnostics.append(&mut extracted.diagnostics);
            if malformed_rows.is_empty() {
                break extracted;
            }
            skipped.extend(malformed_rows);
            source = Cow::Owned(blank_rows(&module.source, &skipped));
        };
        diagnostics.sort_by_key(|diagnostic| diagnostic.line);
        extracted.diagnostics = diagnostics;

        tracing::debug!(
            "Extracted {} declarations and {} imports from {}",
            extracted.declarations.len(),
            extracted.imports.len(),
            module.id
        );
        Ok(extracted)
    }

    fn language_name(&self) -> &str {
        "python"
    }
}

struct ModuleVisitor<'a> {
    module: &'a str,
    source: &'a [u8],
    markers: &'a MarkerConfig,
    extracted: ExtractedModule,
    /// Rows holding an import keyword that starts a malformed import.
    malformed_rows: BTreeSet<usize>,
}

impl<'a> ModuleVisitor<'a> {
    fn visit_children(&mut self, node: &TSNode, enclosing: Option<usize>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(&child, enclosing);
        }
    }

    fn visit(&mut self, node: &TSNode, enclosing: Option<usize>) {
        match node.kind() {
            "decorated_definition" => {
                let decorators = self.decorator_names(node);
                if let Some(definition) = node.child_by_field_name("definition") {
                    self.visit_definition(&definition, decorators, enclosing);
                }
            }
            "function_definition" | "class_definition" => {
                self.visit_definition(node, Vec::new(), enclosing);
            }
            "import_statement" => self.visit_import(node),
            "import_from_statement" => self.visit_import_from(node),
            // `from __future__ import x` is a compiler directive, not a dependency
            "future_import_statement" => {}
            "expression_statement" => {
                if enclosing.is_none() {
                    self.capture_exports(node);
                }
            }
            "ERROR" => {
                self.check_error(node);
                self.visit_children(node, enclosing);
            }
            _ => self.visit_children(node, enclosing),
        }
    }

    fn visit_definition(
        &mut self,
        node: &TSNode,
        decorators: Vec<String>,
        enclosing: Option<usize>,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = extract_text(&name_node, self.source).to_string();

        let parent = enclosing.map(|idx| &self.extracted.declarations[idx]);
        let kind = if node.kind() == "class_definition" {
            DeclarationKind::Class
        } else if parent.map_or(false, |p| p.is_class()) {
            DeclarationKind::Method
        } else {
            DeclarationKind::Function
        };
        let qualified_name = match parent {
            Some(parent) => format!("{}.{}", parent.qualified_name, name),
            None => name.clone(),
        };

        let markers = if kind == DeclarationKind::Method {
            decorators
                .iter()
                .filter_map(|decorator| self.markers.recognize(decorator))
                .collect()
        } else {
            Vec::new()
        };
        let bases = if kind == DeclarationKind::Class {
            self.base_names(node)
        } else {
            Vec::new()
        };

        let body = node.child_by_field_name("body");
        let index = self.extracted.declarations.len();
        self.extracted.declarations.push(Declaration {
            index,
            name,
            qualified_name,
            kind,
            decorators,
            markers,
            is_async: kind != DeclarationKind::Class && is_async_def(node),
            enclosing,
            bases,
            line: line_of(node),
            docstring: body.and_then(|b| extract_docstring(&b, self.source)),
        });

        if let Some(body) = body {
            self.visit_children(&body, Some(index));
        }
    }

    /// Decorator names in source order, i.e. outermost first.
    fn decorator_names(&self, node: &TSNode) -> Vec<String> {
        let mut cursor = node.walk();
        let names = node
            .children(&mut cursor)
            .filter(|child| child.kind() == "decorator")
            .filter_map(|decorator| decorator.named_child(0))
            .map(|expression| {
                // `@wraps(func)` is recorded as `wraps`
                let target = if expression.kind() == "call" {
                    expression
                        .child_by_field_name("function")
                        .unwrap_or(expression)
                } else {
                    expression
                };
                self.compact_text(&target)
            })
            .collect();
        names
    }

    fn base_names(&self, node: &TSNode) -> Vec<String> {
        let Some(arguments) = node
            .child_by_field_name("superclasses")
            .or_else(|| find_child_by_kind(node, "argument_list"))
        else {
            return Vec::new();
        };

        let mut cursor = arguments.walk();
        let bases = arguments
            .named_children(&mut cursor)
            .filter_map(|argument| match argument.kind() {
                "identifier" | "attribute" => Some(self.compact_text(&argument)),
                // Generic[T] -> Generic
                "subscript" => argument
                    .child_by_field_name("value")
                    .map(|value| self.compact_text(&value)),
                // metaclass=..., *bases, **kwargs
                _ => None,
            })
            .collect();
        bases
    }

    fn visit_import(&mut self, node: &TSNode) {
        let Some(names) = self.bindings(node).filter(|names| !names.is_empty()) else {
            self.malformed_import(node);
            return;
        };

        let line = line_of(node);
        for (path, alias) in names {
            self.extracted.imports.push(ImportReference {
                source: self.module.to_string(),
                path,
                dots: 0,
                alias,
                symbol: None,
                line,
            });
        }
    }

    fn visit_import_from(&mut self, node: &TSNode) {
        let module_node = node
            .child_by_field_name("module_name")
            .filter(|module_node| !self.is_dangling(node, module_node));
        let (Some(module_node), Some(mut names)) = (module_node, self.bindings(node)) else {
            self.malformed_import(node);
            return;
        };

        // `relative_import` nodes carry their dots in the text: `..utils.helpers`
        let module_text = self.compact_text(&module_node);
        let dots = module_text.chars().take_while(|&c| c == '.').count();
        let path = module_text[dots..].to_string();

        if find_child_by_kind(node, "wildcard_import").is_some() {
            names.push(("*".to_string(), None));
        }
        if names.is_empty() {
            self.malformed_import(node);
            return;
        }

        let line = line_of(node);
        for (symbol, alias) in names {
            self.extracted.imports.push(ImportReference {
                source: self.module.to_string(),
                path: path.clone(),
                dots,
                alias,
                symbol: Some(symbol),
                line,
            });
        }
    }

    /// Imported names with their aliases, or `None` when the statement is broken.
    fn bindings(&self, statement: &TSNode) -> Option<Vec<(String, Option<String>)>> {
        if statement.has_error() {
            return None;
        }

        let mut cursor = statement.walk();
        let names: Vec<TSNode> = statement
            .children_by_field_name("name", &mut cursor)
            .collect();
        let mut bindings = Vec::with_capacity(names.len());
        for name in names {
            let (path, alias) = match name.kind() {
                "dotted_name" => (name, None),
                "aliased_import" => (
                    name.child_by_field_name("name")?,
                    name.child_by_field_name("alias"),
                ),
                _ => continue,
            };
            if std::iter::once(path)
                .chain(alias)
                .any(|part| self.is_dangling(statement, &part))
            {
                return None;
            }
            bindings.push((
                self.compact_text(&path),
                alias.map(|alias| self.compact_text(&alias)),
            ));
        }
        Some(bindings)
    }

    /// Error recovery completes a bare `import` with whatever comes next, even
    /// a keyword several lines further down.
    fn is_dangling(&self, statement: &TSNode, part: &TSNode) -> bool {
        let gap = &self.source[statement.start_byte()..part.start_byte()];
        let crosses_line = gap.contains(&b'\n') && !gap.contains(&b'(') && !gap.contains(&b'\\');
        crosses_line
            || self
                .compact_text(part)
                .split('.')
                .any(|segment| KEYWORDS.contains(&segment))
    }

    /// Error nodes that start an import are import statements tree-sitter gave up on.
    fn check_error(&mut self, node: &TSNode) {
        let mut cursor = node.walk();
        let mut keyword = None;
        let mut holds_statement = false;
        for child in node.children(&mut cursor) {
            match child.kind() {
                "import" | "from" => keyword = keyword.or(Some(child)),
                "import_statement" | "import_from_statement" => holds_statement = true,
                _ => {}
            }
        }
        if let (Some(keyword), false) = (keyword, holds_statement) {
            self.malformed_import(&keyword);
        }
    }

    fn malformed_import(&mut self, node: &TSNode) {
        let row = node.start_position().row;
        if !self.malformed_rows.insert(row) {
            return;
        }
        let statement = self
            .source
            .split(|&byte| byte == b'\n')
            .nth(row)
            .map(String::from_utf8_lossy)
            .unwrap_or_default()
            .trim()
            .to_string();
        self.extracted.diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::MalformedImport,
                self.module,
                format!("cannot parse import statement `{}`", statement),
            )
            .at_line(row + 1),
        );
    }

    fn capture_exports(&mut self, node: &TSNode) {
        let Some(assignment) = node.named_child(0) else {
            return;
        };
        if assignment.kind() != "assignment" {
            return;
        }
        let is_all = assignment
            .child_by_field_name("left")
            .map_or(false, |left| extract_text(&left, self.source) == "__all__");
        let Some(right) = assignment.child_by_field_name("right") else {
            return;
        };
        if !is_all || !matches!(right.kind(), "list" | "tuple") {
            return;
        }

        let mut cursor = right.walk();
        let names: Vec<String> = right
            .named_children(&mut cursor)
            .filter(|item| item.kind() == "string")
            .map(|item| unquote(extract_text(&item, self.source)))
            .collect();
        self.extracted.exports = Some(names);
    }

    fn compact_text(&self, node: &TSNode) -> String {
        extract_text(node, self.source)
            .split_whitespace()
            .collect()
    }
}

fn is_async_def(node: &TSNode) -> bool {
    let mut cursor = node.walk();
    let is_async = node
        .children(&mut cursor)
        .take_while(|child| child.kind() != "def")
        .any(|child| child.kind() == "async");
    is_async
}

/// `source` with the given rows replaced by blanks, keeping every line break.
fn blank_rows(source: &str, rows: &BTreeSet<usize>) -> String {
    source
        .split_inclusive('\n')
        .enumerate()
        .map(|(row, line)| {
            if rows.contains(&row) {
                line.chars()
                    .map(|c| if c == '\n' || c == '\r' { c } else { ' ' })
                    .collect()
            } else {
                line.to_string()
            }
        })
        .collect()
}
