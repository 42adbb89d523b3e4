//! Compile step: parsing module sources
//!
//! Modules are parsed with the tree-sitter TSX grammar, so markup embedded in
//! a cell parses together with the script around it. Parsing reports the
//! first syntax problem as a `file:line:col: ERROR: text` diagnostic and
//! rejects TypeScript-only syntax. It also records every place the module
//! reaches another module (`import`, `export ... from`, `require("...")`,
//! `import("...")`) and every name the module exports.

use crate::BundleError;
use std::ops::Range;
use tree_sitter::{Node, Parser, Tree};

/// How a module refers to another module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import x, { a as b } from "m"`, `import * as ns from "m"`, `import "m"`
    Static,
    /// `export { a } from "m"`, `export * from "m"`, `export * as ns from "m"`
    ReExport,
    /// `require("m")`
    Require,
    /// `import("m")` with a literal specifier
    Dynamic,
}

/// One reference to another module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSite {
    pub specifier: String,
    pub kind: ImportKind,
    /// Whole statement for static imports and re-exports, the call otherwise
    pub span: Range<usize>,
}

/// Module-level facts the bundler needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSyntax {
    pub imports: Vec<ImportSite>,
    /// Exported names in source order, `default` included. `export *` adds none.
    pub exports: Vec<String>,
    /// The module has `import` or `export` statements
    pub esm: bool,
}

impl ModuleSyntax {
    /// Distinct specifiers in first-seen order
    pub fn specifiers(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for import in &self.imports {
            if !seen.contains(&import.specifier.as_str()) {
                seen.push(&import.specifier);
            }
        }
        seen
    }

    /// Whether the module uses ES module syntax
    pub fn is_esm(&self) -> bool {
        self.esm
    }
}

/// Node kinds the grammar accepts that plain script-with-markup does not
const TYPESCRIPT_ONLY: &[&str] = &[
    "type_annotation",
    "type_arguments",
    "type_parameters",
    "optional_parameter",
    "interface_declaration",
    "type_alias_declaration",
    "enum_declaration",
    "abstract_class_declaration",
    "ambient_declaration",
    "internal_module",
    "module",
    "import_alias",
    "import_require_clause",
    "as_expression",
    "satisfies_expression",
    "non_null_expression",
    "type_assertion",
    "accessibility_modifier",
    "override_modifier",
    "implements_clause",
    "index_signature",
];

/// A parsed, checked module
pub struct ParsedModule<'src> {
    source: &'src str,
    tree: Tree,
    syntax: ModuleSyntax,
}

impl<'src> ParsedModule<'src> {
    /// Parse `source`, reporting positions against `file`
    pub fn parse(file: &str, source: &'src str) -> Result<Self, BundleError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())
            .map_err(|e| BundleError::compile_at(file, source, 0, e.to_string()))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| BundleError::compile_at(file, source, 0, "Parse was cancelled"))?;

        let root = tree.root_node();
        if let Some(node) = first_error(root) {
            return Err(diagnostic(file, source, node));
        }
        let syntax = Collector {
            file,
            source,
            syntax: ModuleSyntax::default(),
        }
        .run(root)?;

        Ok(Self {
            source,
            tree,
            syntax,
        })
    }

    pub fn source(&self) -> &'src str {
        self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn syntax(&self) -> &ModuleSyntax {
        &self.syntax
    }
}

/// Parse `source` and return its module-level facts
pub fn scan(file: &str, source: &str) -> Result<ModuleSyntax, BundleError> {
    Ok(ParsedModule::parse(file, source)?.syntax)
}

// ========== Diagnostics ==========

/// First error or missing node in document order
fn first_error(root: Node<'_>) -> Option<Node<'_>> {
    if !root.has_error() {
        return None;
    }
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

fn diagnostic(file: &str, source: &str, node: Node<'_>) -> BundleError {
    let offset = node.start_byte();
    let text = if node.is_missing() {
        let expected = if node.is_named() {
            node.kind().replace('_', " ")
        } else {
            format!("\"{}\"", node.kind())
        };
        format!("Expected {expected} but found {}", next_token(source, offset))
    } else {
        format!("Unexpected {}", next_token(source, offset))
    };
    BundleError::compile_at(file, source, offset, text)
}

/// The token starting at `offset`, quoted, or `end of file`
fn next_token(source: &str, offset: usize) -> String {
    let rest = source.get(offset..).unwrap_or("").trim_start();
    let Some(first) = rest.chars().next() else {
        return "end of file".to_string();
    };
    let token: String = if is_ident_char(first) {
        rest.chars().take_while(|&c| is_ident_char(c)).take(40).collect()
    } else {
        first.to_string()
    };
    format!("\"{token}\"")
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

// ========== Module analysis ==========

struct Collector<'a> {
    file: &'a str,
    source: &'a str,
    syntax: ModuleSyntax,
}

impl<'a> Collector<'a> {
    fn run(mut self, root: Node<'_>) -> Result<ModuleSyntax, BundleError> {
        let mut cursor = root.walk();
        loop {
            self.visit(cursor.node())?;
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return Ok(self.syntax);
                }
            }
        }
    }

    fn visit(&mut self, node: Node<'_>) -> Result<(), BundleError> {
        let kind = node.kind();
        if node.is_named() && TYPESCRIPT_ONLY.contains(&kind) {
            return Err(self.unexpected(node));
        }

        match kind {
            "import_statement" | "export_statement" => {
                if node.parent().map(|parent| parent.kind()) != Some("program") {
                    return Err(self.unexpected(node));
                }
                self.syntax.esm = true;
                if kind == "import_statement" {
                    self.import(node)
                } else {
                    self.export(node)
                }
            }
            "call_expression" => self.call(node),
            _ => Ok(()),
        }
    }

    fn import(&mut self, node: Node<'_>) -> Result<(), BundleError> {
        let source = node
            .child_by_field_name("source")
            .ok_or_else(|| self.unexpected(node))?;
        self.record(string_value(self.source, source), ImportKind::Static, node);
        Ok(())
    }

    fn export(&mut self, node: Node<'_>) -> Result<(), BundleError> {
        if let Some(source) = node.child_by_field_name("source") {
            self.record(string_value(self.source, source), ImportKind::ReExport, node);
        }

        let names = match export_form(self.source, node) {
            ExportForm::Declaration(names) => names,
            ExportForm::DefaultBinding(_) | ExportForm::DefaultValue(_) => vec!["default".to_string()],
            ExportForm::List(pairs) | ExportForm::ReExportList(pairs) => {
                pairs.into_iter().map(|(_, exported)| exported).collect()
            }
            ExportForm::Namespace(name) => vec![name],
            ExportForm::Star | ExportForm::Other => Vec::new(),
        };
        self.syntax.exports.extend(names);
        Ok(())
    }

    fn call(&mut self, node: Node<'_>) -> Result<(), BundleError> {
        let (Some(function), Some(arguments)) = (
            node.child_by_field_name("function"),
            node.child_by_field_name("arguments"),
        ) else {
            return Ok(());
        };
        let kind = match function.kind() {
            "import" => ImportKind::Dynamic,
            "identifier" if text(self.source, function) == "require" => ImportKind::Require,
            _ => return Ok(()),
        };

        let mut cursor = arguments.walk();
        let args: Vec<Node<'_>> = arguments
            .named_children(&mut cursor)
            .filter(|arg| arg.kind() != "comment")
            .collect();
        if let [arg] = args.as_slice() {
            if arg.kind() == "string" {
                self.record(string_value(self.source, *arg), kind, node);
            }
        }
        Ok(())
    }

    fn record(&mut self, specifier: String, kind: ImportKind, node: Node<'_>) {
        self.syntax.imports.push(ImportSite {
            specifier,
            kind,
            span: node.byte_range(),
        });
    }

    fn unexpected(&self, node: Node<'_>) -> BundleError {
        let offset = node.start_byte();
        BundleError::compile_at(
            self.file,
            self.source,
            offset,
            format!("Unexpected {}", next_token(self.source, offset)),
        )
    }
}

// ========== Export forms ==========

/// The shape of an `export` statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExportForm<'t> {
    /// `export const a = 1, { b } = c;`, `export function f() {}`
    Declaration(Vec<String>),
    /// `export default function f() {}`, `export default class W {}`
    DefaultBinding(String),
    /// `export default <expression>`, holding the expression node
    DefaultValue(Node<'t>),
    /// `export { a, b as c };` as `(local, exported)` pairs
    List(Vec<(String, String)>),
    /// `export { a as b } from "m";` as `(imported, exported)` pairs
    ReExportList(Vec<(String, String)>),
    /// `export * as ns from "m";`
    Namespace(String),
    /// `export * from "m";`
    Star,
    /// TypeScript-only forms the analysis rejects elsewhere
    Other,
}

pub(crate) fn export_form<'t>(source: &str, node: Node<'t>) -> ExportForm<'t> {
    let is_default = has_token(node, "default");

    if let Some(declaration) = node.child_by_field_name("declaration") {
        let mut names = declared_names(source, declaration);
        return if is_default && !names.is_empty() {
            ExportForm::DefaultBinding(names.swap_remove(0))
        } else {
            ExportForm::Declaration(names)
        };
    }

    if let Some(value) = node.child_by_field_name("value") {
        // A named function or class keeps its local binding
        let named = matches!(
            value.kind(),
            "function_expression" | "function" | "generator_function" | "class"
        );
        return match value.child_by_field_name("name") {
            Some(name) if named => ExportForm::DefaultBinding(text(source, name).to_string()),
            _ => ExportForm::DefaultValue(value),
        };
    }

    let reexport = node.child_by_field_name("source").is_some();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "export_clause" => {
                let pairs = export_specifiers(source, child);
                return if reexport {
                    ExportForm::ReExportList(pairs)
                } else {
                    ExportForm::List(pairs)
                };
            }
            "namespace_export" => {
                let mut inner = child.walk();
                let name = child
                    .named_children(&mut inner)
                    .last()
                    .map(|name| name_value(source, name))
                    .unwrap_or_default();
                return ExportForm::Namespace(name);
            }
            _ => {}
        }
    }

    if reexport && has_token(node, "*") {
        ExportForm::Star
    } else {
        ExportForm::Other
    }
}

fn export_specifiers(source: &str, clause: Node<'_>) -> Vec<(String, String)> {
    let mut cursor = clause.walk();
    let pairs = clause
        .named_children(&mut cursor)
        .filter(|specifier| specifier.kind() == "export_specifier")
        .filter_map(|specifier| {
            let name = name_value(source, specifier.child_by_field_name("name")?);
            let alias = specifier
                .child_by_field_name("alias")
                .map(|alias| name_value(source, alias))
                .unwrap_or_else(|| name.clone());
            Some((name, alias))
        })
        .collect();
    pairs
}

/// Names bound by a declaration, every declarator and destructured name included
pub(crate) fn declared_names(source: &str, declaration: Node<'_>) -> Vec<String> {
    let mut names = Vec::new();
    match declaration.kind() {
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = declaration.walk();
            for declarator in declaration.named_children(&mut cursor) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(pattern) = declarator.child_by_field_name("name") {
                    collect_bindings(source, pattern, &mut names);
                }
            }
        }
        _ => {
            if let Some(name) = declaration.child_by_field_name("name") {
                names.push(text(source, name).to_string());
            }
        }
    }
    names
}

fn collect_bindings(source: &str, pattern: Node<'_>, names: &mut Vec<String>) {
    match pattern.kind() {
        "identifier" | "shorthand_property_identifier_pattern" => {
            names.push(text(source, pattern).to_string());
        }
        "pair_pattern" => {
            if let Some(value) = pattern.child_by_field_name("value") {
                collect_bindings(source, value, names);
            }
        }
        "assignment_pattern" | "object_assignment_pattern" => {
            if let Some(left) = pattern.child_by_field_name("left") {
                collect_bindings(source, left, names);
            }
        }
        "object_pattern" | "array_pattern" | "rest_pattern" => {
            let mut cursor = pattern.walk();
            for child in pattern.named_children(&mut cursor) {
                collect_bindings(source, child, names);
            }
        }
        _ => {}
    }
}

// ========== Text helpers ==========

pub(crate) fn text<'s>(source: &'s str, node: Node<'_>) -> &'s str {
    source.get(node.byte_range()).unwrap_or("")
}

/// Whether `node` has an anonymous child token `token`
fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token);
    found
}

/// An identifier's text, or a string literal's value
pub(crate) fn name_value(source: &str, node: Node<'_>) -> String {
    if node.kind() == "string" {
        string_value(source, node)
    } else {
        text(source, node).to_string()
    }
}

/// Value of a string literal node
pub(crate) fn string_value(source: &str, node: Node<'_>) -> String {
    let raw = text(source, node);
    let inner = raw
        .get(1..raw.len().saturating_sub(1))
        .unwrap_or("");
    unescape(inner)
}

fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                push_code_point(&mut out, &hex);
            }
            Some('u') if chars.peek() == Some(&'{') => {
                chars.next();
                let hex: String = chars.by_ref().take_while(|&c| c != '}').collect();
                push_code_point(&mut out, &hex);
            }
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                push_code_point(&mut out, &hex);
            }
            Some('\r') => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            Some('\n') | Some('\u{2028}') | Some('\u{2029}') | None => {}
            Some(other) => out.push(other),
        }
    }
    out
}

fn push_code_point(out: &mut String, hex: &str) {
    if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
        out.push(c);
    }
}
