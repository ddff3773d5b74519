//! C++ front-end adapter (SPEC_FULL.md §2.13): walks a `tree-sitter-cpp`
//! parse tree and drives the core through [`crate::collector::base::BaseUseCollector`]
//! and [`crate::collector::iwyu::IwyuUseCollector`]. Grounded on
//! `parsers/cpp.rs`'s tree-sitter traversal (`get_text`, `extract_include_path`,
//! the `preproc_include`/`class_specifier`/`function_definition` node-kind
//! matches) and `core/resolvers/cpp.rs`'s include resolution, generalized
//! from "collect names for a dependency graph" to "collect typed uses for
//! an include analysis".
//!
//! This adapter is deliberately not a complete C++ front end: it resolves
//! identifiers to declarations with a flat per-translation-unit symbol
//! table rather than full overload resolution or name lookup, and template
//! instantiation replay is exercised only for the common case of a pattern
//! and its instantiation appearing in the same translation unit. It exists
//! to drive the core's semantics end-to-end on real source, not to rival
//! Clang.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{instrument, trace};
use tree_sitter::{Node as TsNode, Parser, Tree};

use crate::ast::{CallKind, CastKind, Declaration, Node as CoreNode, NodeId, NodeKind, Statement, TypeRef};
use crate::collector::base::{BaseUseCollector, FunctionCall, UseVisitor};
use crate::collector::iwyu::IwyuUseCollector;
use crate::error::{AnalysisError, Result};
use crate::frontend::preprocessor::{IncludeGraph, ProjectLayout};
use crate::include_picker::IncludePicker;
use crate::ledger::{DeclHandle, DeclKind as LedgerDeclKind, DeclTable, FileHandle, FileRegistry, SourceLocation};

struct ParsedFile {
    source: String,
    tree: Tree,
}

fn child_text(node: TsNode, source: &str) -> String {
    node.utf8_text(source.as_bytes()).unwrap_or("").to_string()
}

fn named_child_of_kind<'t>(node: TsNode<'t>, kind: &str) -> Option<TsNode<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

/// The identifier naming a declarator, descending through pointer/reference
/// wrapper nodes (`pointer_declarator`, `reference_declarator`) to the
/// `identifier`/`field_identifier` underneath.
fn declarator_name<'t>(mut node: TsNode<'t>, source: &str) -> Option<String> {
    loop {
        match node.kind() {
            "identifier" | "field_identifier" | "type_identifier" => return Some(child_text(node, source)),
            "pointer_declarator" | "reference_declarator" | "function_declarator" | "array_declarator" => {
                node = node.child_by_field_name("declarator")?;
            }
            "qualified_identifier" => {
                return node.child_by_field_name("name").map(|n| child_text(n, source));
            }
            _ => return None,
        }
    }
}

fn declarator_is_pointer_or_reference(mut node: TsNode) -> bool {
    loop {
        match node.kind() {
            "pointer_declarator" => return true,
            "reference_declarator" => return true,
            "function_declarator" | "array_declarator" => {
                node = match node.child_by_field_name("declarator") {
                    Some(n) => n,
                    None => return false,
                };
            }
            _ => return false,
        }
    }
}

fn loc_of(node: TsNode, file: FileHandle) -> SourceLocation {
    let pos = node.start_position();
    SourceLocation::new(file, pos.row as u32 + 1, pos.column as u32 + 1)
}

/// Source-range location information about one `#include` directive,
/// surfaced so the caller can record it as an `IncludeOrForwardDeclareLine`.
struct RawInclude {
    path: String,
    is_system: bool,
    line: i64,
}

fn extract_includes(root: TsNode, source: &str) -> Vec<RawInclude> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            stack.push(child);
        }
        if node.kind() == "preproc_include" {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "string_literal" => {
                        let text = child_text(child, source);
                        out.push(RawInclude {
                            path: text.trim_matches('"').to_string(),
                            is_system: false,
                            line: node.start_position().row as i64 + 1,
                        });
                        break;
                    }
                    "system_lib_string" => {
                        let text = child_text(child, source);
                        out.push(RawInclude {
                            path: text.trim_start_matches('<').trim_end_matches('>').to_string(),
                            is_system: true,
                            line: node.start_position().row as i64 + 1,
                        });
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
    out
}

/// A function template definition recorded during pass 1 (`template<class
/// T> void f(T t) { ... }`), kept around so pass 2 can re-walk its body
/// under a resugar map when it finds an explicit-template-argument call
/// site (spec §4.8's "pattern and instantiation both appear in the same
/// translation unit" case, per SPEC_FULL.md §4.11).
struct FunctionTemplateInfo {
    file: FileHandle,
    param_names: Vec<String>,
    def_start: usize,
    def_end: usize,
}

/// Drives the two-pass walk (declare, then collect uses) over one
/// translation unit and every header it transitively includes.
pub struct CppFrontEnd {
    parsed: HashMap<FileHandle, ParsedFile>,
    discovery_order: Vec<FileHandle>,
    pub include_graph: IncludeGraph,
    function_templates: HashMap<String, FunctionTemplateInfo>,
}

impl CppFrontEnd {
    pub fn new() -> Self {
        Self {
            parsed: HashMap::new(),
            discovery_order: Vec::new(),
            include_graph: IncludeGraph::new(),
            function_templates: HashMap::new(),
        }
    }

    /// Parses `entry_path` and every header it transitively includes,
    /// recording the include graph and feeding observed `#include` chains
    /// to the Include Picker as it goes. Returns the entry file's handle.
    #[instrument(skip(self, registry, picker), fields(entry = %entry_path.display()))]
    pub fn parse_transitively(
        &mut self,
        entry_path: &Path,
        layout: &ProjectLayout,
        registry: &mut FileRegistry,
        picker: &mut IncludePicker,
    ) -> Result<FileHandle> {
        self.parse_one(entry_path, None, layout, registry, picker)
    }

    fn parse_one(
        &mut self,
        path: &Path,
        includer: Option<FileHandle>,
        layout: &ProjectLayout,
        registry: &mut FileRegistry,
        picker: &mut IncludePicker,
    ) -> Result<FileHandle> {
        let normalized = path.to_string_lossy().to_string();
        let handle = registry.intern(&normalized, &layout.search_paths);

        if let Some(includer) = includer {
            self.include_graph.record(includer, handle);
            let includer_path = registry.path(includer).to_string();
            let includer_quoted = registry.quoted(includer).clone();
            picker.add_direct_include(&includer_path, &includer_quoted, &normalized)?;
        }

        if self.parsed.contains_key(&handle) {
            return Ok(handle);
        }

        let source = std::fs::read_to_string(path)?;
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_cpp::LANGUAGE.into())
            .map_err(|e| AnalysisError::InvariantViolation(format!("loading cpp grammar: {e}")))?;
        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| AnalysisError::InvariantViolation(format!("tree-sitter failed on {}", path.display())))?;

        let includes = extract_includes(tree.root_node(), &source);
        self.discovery_order.push(handle);
        self.parsed.insert(handle, ParsedFile { source, tree });

        for inc in includes {
            if inc.is_system {
                continue;
            }
            match layout.resolve(&inc.path, path) {
                Some(resolved) => {
                    self.parse_one(&resolved, Some(handle), layout, registry, picker)?;
                }
                None => {
                    trace!(include = %inc.path, "could not resolve local include, treating as opaque");
                }
            }
        }

        Ok(handle)
    }

    /// Pass 1 (spec §3's "the decl table is populated before any use is
    /// recorded"): walks every parsed file's top-level and nested
    /// declarations, in discovery order, so later files can reference
    /// earlier ones by qualified name.
    #[instrument(skip_all)]
    pub fn declare_all(&mut self, decls: &mut DeclTable, registry: &FileRegistry) {
        for &file in &self.discovery_order {
            let parsed = &self.parsed[&file];
            let mut namespaces: Vec<String> = Vec::new();
            let mut parent_stack: Vec<DeclHandle> = Vec::new();
            walk_declarations(
                parsed.tree.root_node(),
                &parsed.source,
                file,
                decls,
                registry,
                &mut namespaces,
                &mut parent_stack,
                &mut self.function_templates,
            );
        }
    }

    /// Pass 2: walks every function/method body recorded in pass 1,
    /// translating tree-sitter nodes into [`CoreNode`] events for the
    /// [`BaseUseCollector`]/[`IwyuUseCollector`] pair.
    #[instrument(skip_all)]
    pub fn collect_uses(&self, collector: &mut IwyuUseCollector<'_>, decls: &DeclTable, registry: &FileRegistry) {
        let mut base = BaseUseCollector::new(collector);
        let mut next_id: u32 = 0;
        for &file in &self.discovery_order {
            let parsed = &self.parsed[&file];
            let mut scope: HashMap<String, TypeRef> = HashMap::new();
            let mut namespaces: Vec<String> = Vec::new();
            walk_bodies(
                parsed.tree.root_node(),
                &parsed.source,
                file,
                decls,
                registry,
                &mut base,
                &mut scope,
                &mut next_id,
                &mut namespaces,
                &self.function_templates,
                &self.parsed,
            );
        }
    }

    /// Raw `#include` directives for `file`, for building its
    /// [`crate::ledger::PerFileLedger`] lines and direct-include set.
    pub fn includes_of(&self, file: FileHandle) -> Vec<(String, bool, i64)> {
        let Some(parsed) = self.parsed.get(&file) else { return Vec::new() };
        extract_includes(parsed.tree.root_node(), &parsed.source)
            .into_iter()
            .map(|inc| (inc.path, inc.is_system, inc.line))
            .collect()
    }

    pub fn discovery_order(&self) -> &[FileHandle] {
        &self.discovery_order
    }
}

impl Default for CppFrontEnd {
    fn default() -> Self {
        Self::new()
    }
}

fn record_specifier_kind(kind: &str) -> Option<LedgerDeclKind> {
    match kind {
        "class_specifier" => Some(LedgerDeclKind::Class),
        "struct_specifier" => Some(LedgerDeclKind::Struct),
        "union_specifier" => Some(LedgerDeclKind::Union),
        _ => None,
    }
}

fn qualify(namespaces: &[String], name: &str) -> String {
    if namespaces.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", namespaces.join("::"), name)
    }
}

/// Recursive pass-1 walk: records classes/structs/unions, enums, typedefs
/// and function declarations into `decls`. `parent_stack` tracks the
/// innermost enclosing class, for nested-class and member-function
/// attribution (spec §4.9's A3/B4).
fn walk_declarations(
    node: TsNode,
    source: &str,
    file: FileHandle,
    decls: &mut DeclTable,
    registry: &FileRegistry,
    namespaces: &mut Vec<String>,
    parent_stack: &mut Vec<DeclHandle>,
    function_templates: &mut HashMap<String, FunctionTemplateInfo>,
) {
    match node.kind() {
        "namespace_definition" => {
            let name = node.child_by_field_name("name").map(|n| child_text(n, source));
            if let Some(name) = name {
                namespaces.push(name);
                if let Some(body) = node.child_by_field_name("body") {
                    walk_children_declarations(body, source, file, decls, registry, namespaces, parent_stack, function_templates);
                }
                namespaces.pop();
                return;
            }
        }
        "template_declaration" => {
            let has_default = named_child_of_kind(node, "template_parameter_list")
                .is_some_and(|params| {
                    let mut cursor = params.walk();
                    params.children(&mut cursor).any(|p| p.child_by_field_name("default_type").is_some())
                });
            if let Some(inner) = node.child_by_field_name("declaration") {
                if matches!(inner.kind(), "function_definition" | "declaration") {
                    if let Some(declarator) = inner.child_by_field_name("declarator") {
                        if declarator.kind() == "function_declarator" {
                            if let Some(decl_inner) = declarator.child_by_field_name("declarator") {
                                if let Some(name) = declarator_name(decl_inner, source) {
                                    let qualified = qualify(namespaces, &name);
                                    let loc = loc_of(inner, file);
                                    let handle = decls.declare(&qualified, LedgerDeclKind::Function, file, loc);
                                    if let Some(&parent) = parent_stack.last() {
                                        decls.set_nested_class(handle, parent);
                                    }
                                    let param_names = template_param_names(node, source);
                                    if !param_names.is_empty() {
                                        function_templates.insert(
                                            qualified,
                                            FunctionTemplateInfo {
                                                file,
                                                param_names,
                                                def_start: inner.start_byte(),
                                                def_end: inner.end_byte(),
                                            },
                                        );
                                    }
                                }
                            }
                        }
                    }
                    return;
                }
                if let Some(kind) = record_specifier_kind_from_declaration(inner) {
                    let _ = kind;
                }
                if let Some(name_node) = find_specifier_name(inner) {
                    let name = qualify(namespaces, &child_text(name_node, source));
                    let loc = loc_of(inner, file);
                    let handle = decls.declare(&name, LedgerDeclKind::ClassTemplate, file, loc);
                    decls.set_has_default_template_args(handle, has_default);
                    if let Some(&parent) = parent_stack.last() {
                        decls.set_nested_class(handle, parent);
                    }
                    parent_stack.push(handle);
                    if let Some(body) = find_specifier_body(inner) {
                        walk_children_declarations(body, source, file, decls, registry, namespaces, parent_stack, function_templates);
                    }
                    parent_stack.pop();
                    return;
                }
            }
        }
        "class_specifier" | "struct_specifier" | "union_specifier" => {
            if let Some(kind) = record_specifier_kind(node.kind()) {
                if let Some(name_node) = node.child_by_field_name("name") {
                    let name = qualify(namespaces, &child_text(name_node, source));
                    let loc = loc_of(node, file);
                    let handle = decls.declare(&name, kind, file, loc);
                    if let Some(&parent) = parent_stack.last() {
                        decls.set_nested_class(handle, parent);
                    }
                    parent_stack.push(handle);
                    if let Some(body) = node.child_by_field_name("body") {
                        walk_children_declarations(body, source, file, decls, registry, namespaces, parent_stack, function_templates);
                    }
                    parent_stack.pop();
                    return;
                }
            }
        }
        "enum_specifier" => {
            if let Some(name_node) = node.child_by_field_name("name") {
                let name = qualify(namespaces, &child_text(name_node, source));
                let loc = loc_of(node, file);
                decls.declare(&name, LedgerDeclKind::Enum, file, loc);
                return;
            }
        }
        "type_definition" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if let Some(name) = declarator_name(declarator, source) {
                    let qualified = qualify(namespaces, &name);
                    let loc = loc_of(node, file);
                    decls.declare(&qualified, LedgerDeclKind::Typedef, file, loc);
                }
            }
        }
        "function_definition" | "declaration" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if declarator.kind() == "function_declarator" {
                    if let Some(decl_inner) = declarator.child_by_field_name("declarator") {
                        if let Some(name) = declarator_name(decl_inner, source) {
                            let qualified = qualify(namespaces, &name);
                            let loc = loc_of(node, file);
                            let handle = decls.declare(&qualified, LedgerDeclKind::Function, file, loc);
                            if let Some(&parent) = parent_stack.last() {
                                decls.set_nested_class(handle, parent);
                            }
                        }
                    }
                }
            }
        }
        _ => {}
    }
    walk_children_declarations(node, source, file, decls, registry, namespaces, parent_stack, function_templates);
}

fn walk_children_declarations(
    node: TsNode,
    source: &str,
    file: FileHandle,
    decls: &mut DeclTable,
    registry: &FileRegistry,
    namespaces: &mut Vec<String>,
    parent_stack: &mut Vec<DeclHandle>,
    function_templates: &mut HashMap<String, FunctionTemplateInfo>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_declarations(child, source, file, decls, registry, namespaces, parent_stack, function_templates);
    }
}

/// Names bound by a `template<class T, class U> ...` parameter list, in
/// declaration order -- zipped against a call site's explicit template
/// arguments to build a [`crate::collector::replayer::ResugarMap`]-style
/// substitution for replay.
fn template_param_names(template_decl: TsNode, source: &str) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(params) = named_child_of_kind(template_decl, "template_parameter_list") {
        let mut cursor = params.walk();
        for p in params.children(&mut cursor) {
            if p.kind() == "type_parameter_declaration" {
                if let Some(name_node) = p.child_by_field_name("name") {
                    out.push(child_text(name_node, source));
                } else {
                    let mut inner = p.walk();
                    if let Some(id) = p.children(&mut inner).find(|c| matches!(c.kind(), "type_identifier" | "identifier")) {
                        out.push(child_text(id, source));
                    }
                }
            }
        }
    }
    out
}

fn record_specifier_kind_from_declaration(node: TsNode) -> Option<LedgerDeclKind> {
    record_specifier_kind(node.kind())
}

fn find_specifier_name(node: TsNode) -> Option<TsNode> {
    if matches!(node.kind(), "class_specifier" | "struct_specifier" | "union_specifier") {
        return node.child_by_field_name("name");
    }
    let mut cursor = node.walk();
    node.children(&mut cursor).find_map(find_specifier_name)
}

fn find_specifier_body(node: TsNode) -> Option<TsNode> {
    if matches!(node.kind(), "class_specifier" | "struct_specifier" | "union_specifier") {
        return node.child_by_field_name("body");
    }
    let mut cursor = node.walk();
    node.children(&mut cursor).find_map(find_specifier_body)
}

/// The class/struct/union named by a `friend class Foo;` / `friend struct
/// Foo;` declaration -- the first type-naming identifier reachable under
/// the `friend_declaration` node, resolved against the decl table (spec
/// §4.7: "friend declaration -> forward-declare only").
fn friend_target_type(node: TsNode, source: &str, decls: &DeclTable) -> Option<TypeRef> {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "type_identifier" => return Some(resolve_type_name(decls, &child_text(child, source))),
            "qualified_identifier" => {
                return child.child_by_field_name("name").map(|n| resolve_type_name(decls, &child_text(n, source)));
            }
            _ => {
                if let Some(found) = friend_target_type(child, source, decls) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Resolves a bare type name written in source to a [`TypeRef`], looking it
/// up in the flat symbol table built by pass 1. Unknown names are treated
/// as builtins (spec §7's conservative-by-default stance for unresolved
/// identifiers).
fn resolve_type_name(decls: &DeclTable, name: &str) -> TypeRef {
    match decls.lookup(name) {
        Some(d) => TypeRef::of(d, name),
        None => TypeRef::builtin(name),
    }
}

fn type_ref_from_declarator_type(node: TsNode, source: &str, decls: &DeclTable) -> TypeRef {
    let name = node
        .child_by_field_name("type")
        .map(|n| child_text(n, source))
        .unwrap_or_default();
    let mut ty = resolve_type_name(decls, name.trim());
    if declarator_is_pointer_or_reference(node.child_by_field_name("declarator").unwrap_or(node)) {
        ty = ty.pointer_to();
    }
    ty
}

/// Recursive pass-2 walk over one function/method body (and any nested
/// declarations reachable from the translation unit, since top-level
/// expression statements can appear outside a function in this adapter's
/// simplified model only inside bodies).
#[allow(clippy::too_many_arguments)]
fn walk_bodies<V: UseVisitor>(
    node: TsNode,
    source: &str,
    file: FileHandle,
    decls: &DeclTable,
    registry: &FileRegistry,
    base: &mut BaseUseCollector<'_, V>,
    scope: &mut HashMap<String, TypeRef>,
    next_id: &mut u32,
    namespaces: &mut Vec<String>,
    function_templates: &HashMap<String, FunctionTemplateInfo>,
    parsed: &HashMap<FileHandle, ParsedFile>,
) {
    match node.kind() {
        "namespace_definition" => {
            let name = node.child_by_field_name("name").map(|n| child_text(n, source));
            if let Some(name) = name {
                namespaces.push(name);
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for child in body.children(&mut cursor) {
                        walk_bodies(child, source, file, decls, registry, base, scope, next_id, namespaces, function_templates, parsed);
                    }
                }
                namespaces.pop();
                return;
            }
        }
        "field_declaration" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if declarator.kind() != "function_declarator" {
                    let ty = type_ref_from_declarator_type(node, source, decls);
                    emit_declaration(base, Declaration::Field { ty }, loc_of(node, file), next_id);
                }
            }
        }
        "type_definition" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if let Some(name) = declarator_name(declarator, source) {
                    let qualified = qualify(namespaces, &name);
                    if let Some(decl) = decls.lookup(&qualified) {
                        let target = type_ref_from_declarator_type(node, source, decls);
                        emit_declaration(base, Declaration::Typedef { decl, target }, loc_of(node, file), next_id);
                    }
                }
            }
        }
        "friend_declaration" => {
            if let Some(ty) = friend_target_type(node, source, decls) {
                emit_declaration(base, Declaration::Friend(ty), loc_of(node, file), next_id);
            }
        }
        "function_definition" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if declarator.kind() == "function_declarator" {
                    if let Some(decl_inner) = declarator.child_by_field_name("declarator") {
                        if let Some(name) = declarator_name(decl_inner, source) {
                            let qualified = qualify(namespaces, &name);
                            if let Some(decl) = decls.lookup(&qualified) {
                                let params = function_params(declarator, source, decls);
                                let return_type = type_ref_from_declarator_type(node, source, decls);
                                emit_declaration(
                                    base,
                                    Declaration::Function { decl, is_definition: true, params, return_type },
                                    loc_of(node, file),
                                    next_id,
                                );
                            }
                        }
                    }
                }
            }
        }
        "field_expression" => {
            if let Some(arg) = node.child_by_field_name("argument") {
                if let Some(base_ty) = expr_type(arg, source, decls, scope) {
                    emit_statement(base, Statement::MemberExpr { base: base_ty }, loc_of(node, file), next_id);
                }
            }
        }
        "subscript_expression" => {
            if let Some(arg) = node.child_by_field_name("argument") {
                if let Some(elem_ty) = expr_type(arg, source, decls, scope) {
                    emit_statement(base, Statement::Subscript { element: elem_ty }, loc_of(node, file), next_id);
                }
            }
        }
        "sizeof_expression" => {
            if let Some(value) = node.child_by_field_name("value") {
                if let Some(ty) = expr_type(value, source, decls, scope) {
                    emit_statement(base, Statement::SizeOfExpr { operand: ty }, loc_of(node, file), next_id);
                }
            } else if let Some(ty_node) = node.child_by_field_name("type") {
                let ty = resolve_type_name(decls, child_text(ty_node, source).trim());
                emit_statement(base, Statement::SizeOfType { operand: ty, operand_is_reference: false }, loc_of(node, file), next_id);
            }
        }
        "cast_expression" => {
            if let (Some(ty_node), Some(val_node)) = (node.child_by_field_name("type"), node.child_by_field_name("value")) {
                let to = resolve_type_name(decls, child_text(ty_node, source).trim());
                let from = expr_type(val_node, source, decls, scope).unwrap_or_else(|| TypeRef::builtin("<unknown>"));
                let kind = if to.decl.is_some() && from.decl.is_some() {
                    CastKind::ClassPointerConversion
                } else if to.decl.is_some() {
                    // converting constructor: to-type is a class built from a
                    // non-class value.
                    CastKind::Constructor
                } else if from.decl.is_some() {
                    // user-defined conversion operator on the from-type.
                    CastKind::UserDefined
                } else {
                    CastKind::NoOp
                };
                emit_statement(base, Statement::Cast { kind, from, to }, loc_of(node, file), next_id);
            }
        }
        "delete_expression" => {
            let mut cursor = node.walk();
            if let Some(operand) = node.children(&mut cursor).find(|c| c.kind() != "delete" && c.kind() != "[" && c.kind() != "]") {
                if let Some(ty) = expr_type(operand, source, decls, scope) {
                    emit_statement(base, Statement::Delete { deleted: ty }, loc_of(node, file), next_id);
                }
            }
        }
        "new_expression" => {
            if let Some(ty_node) = node.child_by_field_name("type") {
                let ty = resolve_type_name(decls, child_text(ty_node, source).trim());
                emit_call(base, FunctionCall { callee: ty.decl, parent_type: Some(ty), kind: CallKind::New }, loc_of(node, file), next_id);
            }
        }
        "call_expression" => {
            if let Some(func) = node.child_by_field_name("function") {
                if func.kind() == "template_function" {
                    try_replay_template_instantiation(
                        func, node, source, file, decls, registry, base, next_id, function_templates, parsed,
                    );
                } else {
                    let call = match func.kind() {
                        "field_expression" => {
                            let parent = func
                                .child_by_field_name("argument")
                                .and_then(|a| expr_type(a, source, decls, scope));
                            FunctionCall { callee: None, parent_type: parent, kind: CallKind::Member }
                        }
                        _ => {
                            let name = child_text(func, source);
                            FunctionCall { callee: decls.lookup(name.trim()), parent_type: None, kind: CallKind::Ordinary }
                        }
                    };
                    emit_call(base, call, loc_of(node, file), next_id);
                }
            }
        }
        "declaration" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if declarator.kind() == "function_declarator" {
                    if let Some(decl_inner) = declarator.child_by_field_name("declarator") {
                        if let Some(name) = declarator_name(decl_inner, source) {
                            let qualified = qualify(namespaces, &name);
                            if let Some(decl) = decls.lookup(&qualified) {
                                let params = function_params(declarator, source, decls);
                                let return_type = type_ref_from_declarator_type(node, source, decls);
                                emit_declaration(
                                    base,
                                    Declaration::Function { decl, is_definition: false, params, return_type },
                                    loc_of(node, file),
                                    next_id,
                                );
                            }
                        }
                    }
                } else if let Some(name) = declarator_name(declarator, source) {
                    let ty = type_ref_from_declarator_type(node, source, decls);
                    scope.insert(name, ty.clone());
                    emit_declaration(base, Declaration::Variable { ty, is_local: true }, loc_of(node, file), next_id);
                }
            }
        }
        "init_declarator" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if let Some(name) = declarator_name(declarator, source) {
                    let ty = type_ref_from_declarator_type(node, source, decls);
                    scope.insert(name, ty);
                }
            }
        }
        "parameter_declaration" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if let Some(name) = declarator_name(declarator, source) {
                    let ty = type_ref_from_declarator_type(node, source, decls);
                    scope.insert(name, ty.clone());
                    emit_declaration(base, Declaration::Parameter { ty, has_autocast_ctor: false }, loc_of(node, file), next_id);
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_bodies(child, source, file, decls, registry, base, scope, next_id, namespaces, function_templates, parsed);
    }
}

/// Handles an explicit-template-argument call site (`f<MyClass>()`, spec
/// §4.8/§8 scenarios 5-6): looks up the stored [`FunctionTemplateInfo`] for
/// the callee name, resolves the concrete type arguments, and re-walks the
/// template's body, re-attributing every use found inside it to the call
/// site (`caller_loc`) instead of the template definition's own location.
/// A callee the adapter never recorded as a function template (an ordinary
/// call that merely looks like one, or a template this front end could not
/// resolve) is silently skipped -- this adapter only replays the common
/// case of a pattern and its instantiation appearing in the same
/// translation unit (SPEC_FULL.md §4.11).
#[allow(clippy::too_many_arguments)]
fn try_replay_template_instantiation<V: UseVisitor>(
    func_node: TsNode,
    call_node: TsNode,
    source: &str,
    caller_file: FileHandle,
    decls: &DeclTable,
    registry: &FileRegistry,
    base: &mut BaseUseCollector<'_, V>,
    next_id: &mut u32,
    function_templates: &HashMap<String, FunctionTemplateInfo>,
    parsed: &HashMap<FileHandle, ParsedFile>,
) {
    let Some(name_node) = func_node.child_by_field_name("name") else { return };
    let name = child_text(name_node, source);
    let Some(template) = function_templates.get(name.trim()) else { return };
    let Some(args_node) = func_node.child_by_field_name("arguments") else { return };

    let mut concrete_args = Vec::new();
    let mut cursor = args_node.walk();
    for arg in args_node.children(&mut cursor) {
        if arg.kind() == "type_descriptor" {
            concrete_args.push(resolve_type_name(decls, child_text(arg, source).trim()));
        }
    }
    if concrete_args.is_empty() {
        return;
    }

    let mut resugar: HashMap<String, TypeRef> = HashMap::new();
    for (pname, arg_ty) in template.param_names.iter().zip(concrete_args.iter()) {
        resugar.insert(pname.clone(), arg_ty.clone());
    }

    let Some(template_parsed) = parsed.get(&template.file) else { return };
    let Some(def_node) = template_parsed.tree.root_node().descendant_for_byte_range(template.def_start, template.def_end) else { return };
    let Some(declarator) = def_node.child_by_field_name("declarator") else { return };
    let Some(body) = def_node.child_by_field_name("body") else { return };

    let mut replay_scope: HashMap<String, TypeRef> = HashMap::new();
    bind_parameter_scope(declarator, &template_parsed.source, decls, &resugar, &mut replay_scope);

    let caller_loc = loc_of(call_node, caller_file);
    walk_body_for_replay(body, &template_parsed.source, caller_loc, decls, registry, base, &mut replay_scope, next_id, &resugar);
}

/// Populates `scope` with the template function's parameter names bound to
/// their resugared (concrete, caller-supplied) types, so a replayed body's
/// expressions (`t.size()`) resolve `t`'s type to the instantiation's
/// argument rather than the bare template parameter.
fn bind_parameter_scope(
    function_declarator: TsNode,
    source: &str,
    decls: &DeclTable,
    resugar: &HashMap<String, TypeRef>,
    scope: &mut HashMap<String, TypeRef>,
) {
    let Some(params) = function_declarator.child_by_field_name("parameters") else { return };
    let mut cursor = params.walk();
    for param in params.children(&mut cursor) {
        if param.kind() != "parameter_declaration" {
            continue;
        }
        let Some(declarator) = param.child_by_field_name("declarator") else { continue };
        let Some(pname) = declarator_name(declarator, source) else { continue };
        let ty = type_ref_from_declarator_type_with_resugar(param, source, decls, resugar);
        scope.insert(pname, ty);
    }
}

/// Like [`resolve_type_name`], but consults the replay's resugar map first
/// -- a bare template-parameter name (`T`) resolves to the instantiation's
/// concrete argument rather than an unresolved builtin.
fn resolve_type_name_with_resugar(decls: &DeclTable, resugar: &HashMap<String, TypeRef>, name: &str) -> TypeRef {
    match resugar.get(name) {
        Some(ty) => ty.clone(),
        None => resolve_type_name(decls, name),
    }
}

fn type_ref_from_declarator_type_with_resugar(
    node: TsNode,
    source: &str,
    decls: &DeclTable,
    resugar: &HashMap<String, TypeRef>,
) -> TypeRef {
    let name = node
        .child_by_field_name("type")
        .map(|n| child_text(n, source))
        .unwrap_or_default();
    let mut ty = resolve_type_name_with_resugar(decls, resugar, name.trim());
    if declarator_is_pointer_or_reference(node.child_by_field_name("declarator").unwrap_or(node)) {
        ty = ty.pointer_to();
    }
    ty
}

/// A reduced re-walk of a template body under replay (spec §4.8): handles
/// the statement/declaration forms a template body realistically contains
/// (`T* p;`, `t.method()`, member/subscript/sizeof/cast on a parameter),
/// resolving any mention of a template parameter name through `resugar`,
/// and emitting every use at `caller_loc` so it lands in the instantiating
/// caller's ledger rather than the template definition's own file.
#[allow(clippy::too_many_arguments)]
fn walk_body_for_replay<V: UseVisitor>(
    node: TsNode,
    source: &str,
    caller_loc: SourceLocation,
    decls: &DeclTable,
    registry: &FileRegistry,
    base: &mut BaseUseCollector<'_, V>,
    scope: &mut HashMap<String, TypeRef>,
    next_id: &mut u32,
    resugar: &HashMap<String, TypeRef>,
) {
    match node.kind() {
        "declaration" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if let Some(name) = declarator_name(declarator, source) {
                    let ty = type_ref_from_declarator_type_with_resugar(node, source, decls, resugar);
                    scope.insert(name, ty.clone());
                    emit_declaration(base, Declaration::Variable { ty, is_local: true }, caller_loc, next_id);
                }
            }
        }
        "init_declarator" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if let Some(name) = declarator_name(declarator, source) {
                    let ty = type_ref_from_declarator_type_with_resugar(node, source, decls, resugar);
                    scope.insert(name, ty);
                }
            }
        }
        "field_expression" => {
            if let Some(arg) = node.child_by_field_name("argument") {
                if let Some(base_ty) = expr_type(arg, source, decls, scope) {
                    emit_statement(base, Statement::MemberExpr { base: base_ty }, caller_loc, next_id);
                }
            }
        }
        "subscript_expression" => {
            if let Some(arg) = node.child_by_field_name("argument") {
                if let Some(elem_ty) = expr_type(arg, source, decls, scope) {
                    emit_statement(base, Statement::Subscript { element: elem_ty }, caller_loc, next_id);
                }
            }
        }
        "sizeof_expression" => {
            if let Some(value) = node.child_by_field_name("value") {
                if let Some(ty) = expr_type(value, source, decls, scope) {
                    emit_statement(base, Statement::SizeOfExpr { operand: ty }, caller_loc, next_id);
                }
            } else if let Some(ty_node) = node.child_by_field_name("type") {
                let ty = resolve_type_name_with_resugar(decls, resugar, child_text(ty_node, source).trim());
                emit_statement(base, Statement::SizeOfType { operand: ty, operand_is_reference: false }, caller_loc, next_id);
            }
        }
        "call_expression" => {
            if let Some(func) = node.child_by_field_name("function") {
                let call = match func.kind() {
                    "field_expression" => {
                        let parent = func
                            .child_by_field_name("argument")
                            .and_then(|a| expr_type(a, source, decls, scope));
                        FunctionCall { callee: None, parent_type: parent, kind: CallKind::Member }
                    }
                    _ => {
                        let name = child_text(func, source);
                        FunctionCall { callee: decls.lookup(name.trim()), parent_type: None, kind: CallKind::Ordinary }
                    }
                };
                emit_call(base, call, caller_loc, next_id);
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_body_for_replay(child, source, caller_loc, decls, registry, base, scope, next_id, resugar);
    }
}

fn function_params(function_declarator: TsNode, source: &str, decls: &DeclTable) -> Vec<TypeRef> {
    let Some(params) = function_declarator.child_by_field_name("parameters") else { return Vec::new() };
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for child in params.children(&mut cursor) {
        if child.kind() == "parameter_declaration" {
            out.push(type_ref_from_declarator_type(child, source, decls));
        }
    }
    out
}

fn expr_type(node: TsNode, source: &str, decls: &DeclTable, scope: &HashMap<String, TypeRef>) -> Option<TypeRef> {
    match node.kind() {
        "identifier" | "field_identifier" => {
            let name = child_text(node, source);
            scope.get(&name).cloned().or_else(|| decls.lookup(&name).map(|d| TypeRef::of(d, name)))
        }
        "field_expression" => node.child_by_field_name("field").and_then(|f| expr_type(f, source, decls, scope)),
        "parenthesized_expression" => {
            let mut cursor = node.walk();
            node.named_child(0).or_else(|| node.children(&mut cursor).next())
                .and_then(|c| expr_type(c, source, decls, scope))
        }
        _ => None,
    }
}

/// Pushes a location-bearing synthetic node onto the context stack before
/// routing `call` through [`BaseUseCollector::handle_function_call`], so
/// `ContextStack::current_location` has something to find -- unlike
/// `emit_declaration`/`emit_statement`, `handle_function_call` does not
/// travel through `BaseUseCollector::visit`, so without this the call's
/// parent-type full use would never be attributed to any file.
fn emit_call<V: UseVisitor>(base: &mut BaseUseCollector<'_, V>, call: FunctionCall, loc: SourceLocation, next_id: &mut u32) {
    let id = NodeId(*next_id);
    *next_id += 1;
    let node = CoreNode { id, kind: NodeKind::Statement(Statement::Other), loc: Some(loc) };
    base.stack.push(node, None);
    base.handle_function_call(call);
    base.stack.pop();
}

fn emit_declaration<V: UseVisitor>(base: &mut BaseUseCollector<'_, V>, decl: Declaration, loc: SourceLocation, next_id: &mut u32) {
    let id = NodeId(*next_id);
    *next_id += 1;
    let node = CoreNode { id, kind: NodeKind::Declaration(decl), loc: Some(loc) };
    base.visit(node, None, |_| {});
}

fn emit_statement<V: UseVisitor>(base: &mut BaseUseCollector<'_, V>, stmt: Statement, loc: SourceLocation, next_id: &mut u32) {
    let id = NodeId(*next_id);
    *next_id += 1;
    let node = CoreNode { id, kind: NodeKind::Statement(stmt), loc: Some(loc) };
    base.visit(node, None, |_| {});
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::include_picker::IncludePicker;
    use crate::ledger::FileRegistry;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::File::create(&path).unwrap().write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_transitive_includes_and_records_include_graph() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "b.h", "class Foo {};\n");
        let a = write_file(dir.path(), "a.cc", "#include \"b.h\"\nvoid use(Foo* f) {}\n");

        let layout = ProjectLayout::new(dir.path(), Vec::new());
        let mut registry = FileRegistry::new();
        let mut picker = IncludePicker::new().unwrap();
        let mut front_end = CppFrontEnd::new();
        let handle = front_end.parse_transitively(&a, &layout, &mut registry, &mut picker).unwrap();

        assert_eq!(front_end.discovery_order().len(), 2);
        let includes = front_end.includes_of(handle);
        assert_eq!(includes.len(), 1);
        assert_eq!(includes[0].0, "b.h");
    }

    #[test]
    fn declares_classes_and_functions() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.cc", "class Foo { void bar(); };\n");
        let layout = ProjectLayout::new(dir.path(), Vec::new());
        let mut registry = FileRegistry::new();
        let mut picker = IncludePicker::new().unwrap();
        let mut front_end = CppFrontEnd::new();
        front_end.parse_transitively(&a, &layout, &mut registry, &mut picker).unwrap();

        let mut decls = DeclTable::new();
        front_end.declare_all(&mut decls, &registry);
        assert!(decls.lookup("Foo").is_some());
    }

    #[test]
    fn value_typed_field_produces_a_full_use() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "bar.h", "class Bar {};\n");
        let a = write_file(dir.path(), "a.h", "#include \"bar.h\"\nclass Foo { Bar member; };\n");

        let layout = ProjectLayout::new(dir.path(), Vec::new());
        let mut registry = FileRegistry::new();
        let mut picker = IncludePicker::new().unwrap();
        let mut front_end = CppFrontEnd::new();
        let entry = front_end.parse_transitively(&a, &layout, &mut registry, &mut picker).unwrap();

        let mut decls = DeclTable::new();
        front_end.declare_all(&mut decls, &registry);
        picker.finalize().unwrap();

        let search_paths = Vec::new();
        let mut collector = IwyuUseCollector::new(&mut registry, &decls, &picker, &search_paths);
        front_end.collect_uses(&mut collector, &decls, &registry);
        let ledgers = collector.into_ledgers();

        let ledger = ledgers.get(&entry).expect("a.h should have recorded uses");
        assert!(ledger
            .raw_uses
            .iter()
            .any(|u| u.symbol_name == "Bar" && u.kind == crate::ledger::UseKind::Full));
    }

    #[test]
    fn typedef_target_produces_a_full_use() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "bar.h", "class Bar {};\n");
        let a = write_file(dir.path(), "a.h", "#include \"bar.h\"\ntypedef Bar BarAlias;\n");

        let layout = ProjectLayout::new(dir.path(), Vec::new());
        let mut registry = FileRegistry::new();
        let mut picker = IncludePicker::new().unwrap();
        let mut front_end = CppFrontEnd::new();
        let entry = front_end.parse_transitively(&a, &layout, &mut registry, &mut picker).unwrap();

        let mut decls = DeclTable::new();
        front_end.declare_all(&mut decls, &registry);
        picker.finalize().unwrap();

        let search_paths = Vec::new();
        let mut collector = IwyuUseCollector::new(&mut registry, &decls, &picker, &search_paths);
        front_end.collect_uses(&mut collector, &decls, &registry);
        let ledgers = collector.into_ledgers();

        let ledger = ledgers.get(&entry).expect("a.h should have recorded uses");
        assert!(ledger
            .raw_uses
            .iter()
            .any(|u| u.symbol_name == "Bar" && u.kind == crate::ledger::UseKind::Full));
    }

    #[test]
    fn friend_class_produces_a_forward_declare_use() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "bar.h", "class Bar {};\n");
        let a = write_file(dir.path(), "a.h", "#include \"bar.h\"\nclass Foo { friend class Bar; };\n");

        let layout = ProjectLayout::new(dir.path(), Vec::new());
        let mut registry = FileRegistry::new();
        let mut picker = IncludePicker::new().unwrap();
        let mut front_end = CppFrontEnd::new();
        let entry = front_end.parse_transitively(&a, &layout, &mut registry, &mut picker).unwrap();

        let mut decls = DeclTable::new();
        front_end.declare_all(&mut decls, &registry);
        picker.finalize().unwrap();

        let search_paths = Vec::new();
        let mut collector = IwyuUseCollector::new(&mut registry, &decls, &picker, &search_paths);
        front_end.collect_uses(&mut collector, &decls, &registry);
        let ledgers = collector.into_ledgers();

        let ledger = ledgers.get(&entry).expect("a.h should have recorded uses");
        assert!(ledger
            .raw_uses
            .iter()
            .any(|u| u.symbol_name == "Bar" && u.kind == crate::ledger::UseKind::ForwardDeclare));
    }
}
