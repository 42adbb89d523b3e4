//! Code generation for bundles
//!
//! Every module becomes a factory in a registry inside one IIFE. ES module
//! syntax is rewritten to calls on the registry's `require`, exports are
//! exposed as getters on the module's `exports` object and markup becomes
//! `React.createElement` calls.

use crate::scan::{export_form, name_value, string_value, text, ExportForm, ParsedModule};
use indexmap::IndexMap;
use std::fmt::Write;
use std::ops::Range;
use tree_sitter::Node;

/// A module after the compile step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledModule {
    /// Rewritten source
    pub body: String,
    /// Specifier as written -> resolved request path
    pub deps: IndexMap<String, String>,
}

const JSX_FACTORY: &str = "React.createElement";
const JSX_FRAGMENT: &str = "React.Fragment";

const RUNTIME_PRELUDE: &str = r#"(() => {
  var __modules = {};
  var __cache = {};
  var __interop = (m) => (m && m.__esModule ? m : Object.assign({ default: m }, m));
  var __export = (target, getters) => {
    Object.defineProperty(target, "__esModule", { value: true });
    for (let name in getters) Object.defineProperty(target, name, { get: getters[name], enumerable: true });
  };
  var __exportStar = (target, source) => {
    for (let name in source) {
      if (name !== "default" && !Object.prototype.hasOwnProperty.call(target, name)) {
        Object.defineProperty(target, name, { get: () => source[name], enumerable: true });
      }
    }
  };
  var __load = (id) => {
    var cached = __cache[id];
    if (cached) return cached.exports;
    var record = __modules[id];
    if (!record) throw new Error("Cannot find module " + JSON.stringify(id));
    var module = { exports: {} };
    __cache[id] = module;
    var require = (specifier) =>
      __load(Object.prototype.hasOwnProperty.call(record.deps, specifier) ? record.deps[specifier] : specifier);
    var __import = (specifier) => Promise.resolve().then(() => __interop(require(specifier)));
    record.factory.call(module.exports, module, module.exports, require, __import);
    return module.exports;
  };
"#;

/// Assemble the bundle; `entry` is executed once every factory is registered
pub fn emit_bundle(entry: &str, modules: &IndexMap<String, CompiledModule>) -> String {
    let mut out = String::from(RUNTIME_PRELUDE);

    for (id, module) in modules {
        let deps = module
            .deps
            .iter()
            .map(|(specifier, resolved)| format!("{}: {}", js_string(specifier), js_string(resolved)))
            .collect::<Vec<_>>()
            .join(", ");

        let _ = writeln!(out, "  // {}", id.replace('\n', " "));
        let _ = writeln!(out, "  __modules[{}] = {{", js_string(id));
        let _ = writeln!(out, "    deps: {{{deps}}},");
        let _ = writeln!(out, "    factory: function (module, exports, require, __import) {{");
        out.push_str(&module.body);
        if !module.body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("    },\n  };\n");
    }

    let _ = writeln!(out, "  __load({});", js_string(entry));
    out.push_str("})();\n");
    out
}

/// Rewrite module syntax and markup in a parsed module
pub fn transform_module(module: &ParsedModule<'_>) -> String {
    let source = module.source();
    let mut rewriter = Rewriter {
        source,
        getters: Vec::new(),
        bindings: 0,
    };
    let mut body = String::with_capacity(source.len() + 64);
    rewriter.render(module.root(), 0..source.len(), &mut body);

    if !module.syntax().is_esm() {
        return body;
    }
    let getters = rewriter
        .getters
        .iter()
        .map(|(name, expr)| format!("{}: () => {expr}", js_string(name)))
        .collect::<Vec<_>>()
        .join(", ");
    // Same line as the first source line so positions stay meaningful
    format!("__export(exports, {{{getters}}}); {body}")
}

enum Edit<'t> {
    Replace(Range<usize>, String),
    Markup(Node<'t>),
}

impl Edit<'_> {
    fn range(&self) -> Range<usize> {
        match self {
            Edit::Replace(range, _) => range.clone(),
            Edit::Markup(element) => element.byte_range(),
        }
    }
}

struct Rewriter<'s> {
    source: &'s str,
    /// `(exported name, expression)` pairs for the module's export getters
    getters: Vec<(String, String)>,
    bindings: usize,
}

impl<'s> Rewriter<'s> {
    /// Copy `range` of the source with every rewrite under `node` applied
    fn render(&mut self, node: Node<'_>, range: Range<usize>, out: &mut String) {
        let mut edits = self.collect(node);
        edits.sort_by_key(|edit| edit.range().start);

        let mut cursor = range.start;
        for edit in edits {
            let span = edit.range();
            if span.start < cursor {
                continue;
            }
            out.push_str(self.slice(cursor..span.start));
            match edit {
                Edit::Replace(_, replacement) => out.push_str(&replacement),
                Edit::Markup(element) => self.markup(element, out),
            }
            cursor = span.end;
        }
        out.push_str(self.slice(cursor..range.end));
    }

    fn render_node(&mut self, node: Node<'_>, out: &mut String) {
        self.render(node, node.byte_range(), out);
    }

    fn slice(&self, range: Range<usize>) -> &'s str {
        self.source.get(range).unwrap_or("")
    }

    fn next_binding(&mut self) -> usize {
        self.bindings += 1;
        self.bindings - 1
    }

    // ========== Module syntax ==========

    fn collect<'t>(&mut self, root: Node<'t>) -> Vec<Edit<'t>> {
        let mut edits = Vec::new();
        let mut cursor = root.walk();
        loop {
            let node = cursor.node();
            if self.edit(node, &mut edits) && cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    return edits;
                }
            }
        }
    }

    /// Record the rewrite for `node`; returns whether its children still need a visit
    fn edit<'t>(&mut self, node: Node<'t>, edits: &mut Vec<Edit<'t>>) -> bool {
        match node.kind() {
            "hash_bang_line" => {
                edits.push(Edit::Replace(node.byte_range(), String::new()));
                false
            }
            "import_statement" => {
                let replacement = self.import(node);
                edits.push(Edit::Replace(node.byte_range(), replacement));
                false
            }
            "export_statement" => self.export(node, edits),
            "call_expression" => {
                if let Some(function) = node
                    .child_by_field_name("function")
                    .filter(|function| function.kind() == "import")
                {
                    edits.push(Edit::Replace(function.byte_range(), "__import".to_string()));
                }
                true
            }
            "jsx_element" | "jsx_self_closing_element" => {
                edits.push(Edit::Markup(node));
                false
            }
            _ => true,
        }
    }

    fn require_call(&self, statement: Node<'_>) -> String {
        let specifier = statement
            .child_by_field_name("source")
            .map(|source| string_value(self.source, source))
            .unwrap_or_default();
        format!("require({})", js_string(&specifier))
    }

    fn import(&mut self, node: Node<'_>) -> String {
        let require = self.require_call(node);
        let binding = format!("__import_{}", self.next_binding());

        let mut cursor = node.walk();
        let clause = node
            .named_children(&mut cursor)
            .find(|child| child.kind() == "import_clause");
        let Some(clause) = clause else {
            return format!("{require};");
        };

        let mut code = format!("var {binding} = {require};");
        let mut cursor = clause.walk();
        for part in clause.named_children(&mut cursor) {
            match part.kind() {
                "identifier" => {
                    let _ = write!(code, " var {} = __interop({binding}).default;", text(self.source, part));
                }
                "namespace_import" => {
                    if let Some(name) = part.named_child(0) {
                        let _ = write!(code, " var {} = __interop({binding});", text(self.source, name));
                    }
                }
                "named_imports" => {
                    let mut inner = part.walk();
                    for specifier in part.named_children(&mut inner) {
                        let Some(name) = specifier.child_by_field_name("name") else {
                            continue;
                        };
                        let imported = name_value(self.source, name);
                        let local = specifier
                            .child_by_field_name("alias")
                            .map(|alias| text(self.source, alias).to_string())
                            .unwrap_or_else(|| imported.clone());
                        let _ = write!(code, " var {local} = {};", member_of(&binding, &imported));
                    }
                }
                _ => {}
            }
        }
        code
    }

    fn export<'t>(&mut self, node: Node<'t>, edits: &mut Vec<Edit<'t>>) -> bool {
        let range = node.byte_range();
        match export_form(self.source, node) {
            ExportForm::Declaration(names) => {
                if let Some(declaration) = node.child_by_field_name("declaration") {
                    edits.push(Edit::Replace(range.start..declaration.start_byte(), String::new()));
                }
                self.getters
                    .extend(names.into_iter().map(|name| (name.clone(), name)));
                true
            }
            ExportForm::DefaultBinding(name) => {
                let target = node
                    .child_by_field_name("declaration")
                    .or_else(|| node.child_by_field_name("value"));
                if let Some(target) = target {
                    edits.push(Edit::Replace(range.start..target.start_byte(), String::new()));
                }
                self.getters.push(("default".to_string(), name));
                true
            }
            ExportForm::DefaultValue(value) => {
                edits.push(Edit::Replace(
                    range.start..value.start_byte(),
                    "exports.default = ".to_string(),
                ));
                true
            }
            ExportForm::List(pairs) => {
                self.getters
                    .extend(pairs.into_iter().map(|(local, exported)| (exported, local)));
                edits.push(Edit::Replace(range, String::new()));
                false
            }
            ExportForm::ReExportList(pairs) => {
                let binding = format!("__reexport_{}", self.next_binding());
                for (imported, exported) in pairs {
                    self.getters.push((exported, member_of(&binding, &imported)));
                }
                let replacement = format!("var {binding} = {};", self.require_call(node));
                edits.push(Edit::Replace(range, replacement));
                false
            }
            ExportForm::Namespace(name) => {
                let binding = format!("__reexport_{}", self.next_binding());
                let replacement = format!("var {binding} = __interop({});", self.require_call(node));
                self.getters.push((name, binding));
                edits.push(Edit::Replace(range, replacement));
                false
            }
            ExportForm::Star => {
                self.next_binding();
                let replacement = format!("__exportStar(exports, {});", self.require_call(node));
                edits.push(Edit::Replace(range, replacement));
                false
            }
            ExportForm::Other => {
                edits.push(Edit::Replace(range, String::new()));
                false
            }
        }
    }

    // ========== Markup ==========

    fn markup(&mut self, element: Node<'_>, out: &mut String) {
        let (opening, closing) = if element.kind() == "jsx_self_closing_element" {
            (element, None)
        } else {
            let mut cursor = element.walk();
            let tags: Vec<Node<'_>> = element
                .named_children(&mut cursor)
                .filter(|child| matches!(child.kind(), "jsx_opening_element" | "jsx_closing_element"))
                .collect();
            match tags.as_slice() {
                [opening, closing] => (*opening, Some(*closing)),
                _ => (element, None),
            }
        };

        out.push_str(JSX_FACTORY);
        out.push('(');
        match opening.child_by_field_name("name") {
            Some(name) => out.push_str(&element_type(self.source, name)),
            None => out.push_str(JSX_FRAGMENT),
        }

        let mut cursor = opening.walk();
        let attributes: Vec<Node<'_>> = opening
            .named_children(&mut cursor)
            .filter(|child| matches!(child.kind(), "jsx_attribute" | "jsx_expression"))
            .collect();
        if attributes.is_empty() {
            out.push_str(", null");
        } else {
            out.push_str(", { ");
            for (i, attribute) in attributes.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                self.attribute(attribute, out);
            }
            out.push_str(" }");
        }

        if let Some(closing) = closing {
            let mut cursor = element.walk();
            let children: Vec<Node<'_>> = element.named_children(&mut cursor).collect();
            let mut text_start = opening.end_byte();
            for child in children {
                match child.kind() {
                    "jsx_element" | "jsx_self_closing_element" => {
                        self.text_child(text_start..child.start_byte(), out);
                        out.push_str(", ");
                        self.markup(child, out);
                        text_start = child.end_byte();
                    }
                    "jsx_expression" => {
                        self.text_child(text_start..child.start_byte(), out);
                        if let Some(expression) = first_named(child) {
                            out.push_str(", ");
                            self.render_node(expression, out);
                        }
                        text_start = child.end_byte();
                    }
                    // Text and character references are read from the source between children
                    _ => {}
                }
            }
            self.text_child(text_start..closing.start_byte(), out);
        }
        out.push(')');
    }

    fn attribute(&mut self, attribute: Node<'_>, out: &mut String) {
        if attribute.kind() == "jsx_expression" {
            // `{...props}`
            if let Some(spread) = first_named(attribute) {
                self.render_node(spread, out);
            }
            return;
        }

        let mut cursor = attribute.walk();
        let parts: Vec<Node<'_>> = attribute.named_children(&mut cursor).collect();
        let Some(key) = parts.first() else {
            return;
        };
        let key = text(self.source, *key);
        if key.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
            out.push_str(key);
        } else {
            out.push_str(&js_string(key));
        }
        out.push_str(": ");

        match parts.get(1) {
            None => out.push_str("true"),
            Some(value) if value.kind() == "string" => {
                let raw = text(self.source, *value);
                let inner = raw.get(1..raw.len().saturating_sub(1)).unwrap_or("");
                out.push_str(&js_string(&decode_entities(inner)));
            }
            Some(value) if value.kind() == "jsx_expression" => match first_named(*value) {
                Some(expression) => self.render_node(expression, out),
                None => out.push_str("undefined"),
            },
            Some(value) => self.render_node(*value, out),
        }
    }

    fn text_child(&self, range: Range<usize>, out: &mut String) {
        let cleaned = clean_jsx_text(self.slice(range));
        if !cleaned.is_empty() {
            out.push_str(", ");
            out.push_str(&js_string(&decode_entities(&cleaned)));
        }
    }
}

fn member_of(binding: &str, name: &str) -> String {
    if name == "default" {
        format!("__interop({binding}).default")
    } else {
        format!("{binding}[{}]", js_string(name))
    }
}

fn first_named(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    found
}

/// Lowercase and dashed tags are host elements, anything else is a binding
fn element_type(source: &str, name: Node<'_>) -> String {
    let tag = text(source, name);
    let host = match name.kind() {
        "identifier" | "jsx_identifier" => {
            tag.starts_with(|c: char| c.is_ascii_lowercase()) || tag.contains('-')
        }
        "jsx_namespace_name" => true,
        _ => false,
    };
    if host {
        js_string(tag)
    } else {
        tag.to_string()
    }
}

/// Collapse markup text the way JSX does: lines are trimmed, blank lines
/// dropped and the rest joined with single spaces
fn clean_jsx_text(raw: &str) -> String {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();
    let last_non_empty = lines
        .iter()
        .rposition(|line| line.chars().any(|c| c != ' ' && c != '\t'))
        .unwrap_or(0);

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let mut trimmed = line.replace('\t', " ");
        if i != 0 {
            trimmed = trimmed.trim_start_matches(' ').to_string();
        }
        if i != lines.len() - 1 {
            trimmed = trimmed.trim_end_matches(' ').to_string();
        }
        if trimmed.is_empty() {
            continue;
        }
        if i != last_non_empty {
            trimmed.push(' ');
        }
        out.push_str(&trimmed);
    }
    out
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| entity(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "hellip" => '\u{2026}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        _ => return None,
    })
}

/// Quote `value` as a JavaScript string literal
pub fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
