use tree_sitter::{Language, Node as TSNode, Parser, Tree};

use crate::core::AnalysisError;

pub struct TreeSitterParser {
    parser: Parser,
}

impl TreeSitterParser {
    pub fn new(language: Language, language_name: &str) -> Result<Self, AnalysisError> {
        let mut parser = Parser::new();
        parser
            .set_language(language)
            .map_err(|err| AnalysisError::ParserInit {
                language: language_name.to_string(),
                message: err.to_string(),
            })?;
        Ok(Self { parser })
    }

    pub fn parse(&mut self, source: &str) -> Option<Tree> {
        self.parser.parse(source, None)
    }
}

pub fn extract_text<'a>(node: &TSNode, source: &'a [u8]) -> &'a str {
    std::str::from_utf8(&source[node.byte_range()]).unwrap_or("")
}

pub fn line_of(node: &TSNode) -> usize {
    node.start_position().row + 1
}

/// First string literal of a definition body.
pub fn extract_docstring(body: &TSNode, source: &[u8]) -> Option<String> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string_node = first.named_child(0)?;
    if string_node.kind() != "string" {
        return None;
    }
    Some(unquote(extract_text(&string_node, source)).trim().to_string())
}

pub fn find_child_by_kind<'a>(node: &TSNode<'a>, kind: &str) -> Option<TSNode<'a>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| child.kind() == kind);
    found
}

/// Strip matching quotes from a Python string literal.
pub fn unquote(literal: &str) -> String {
    literal
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string()
}
