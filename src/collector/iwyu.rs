//! IWYU Use Collector (spec §4.7): implements `UseVisitor` and turns every
//! traversal event into a classified [`OneUse`] recorded against the
//! per-file ledger of the file the use occurred in.

use crate::ast::context_stack::ContextStack;
use crate::ast::{CastKind, Declaration, Node, NodeKind, Statement, TypeRef};
use crate::collector::base::{FunctionCall, UseVisitor};
use crate::include_picker::IncludePicker;
use crate::ledger::{DeclHandle, DeclTable, FileHandle, FileRegistry, OneUse, PerFileLedger, SourceLocation, UseKind};
use crate::path_util::HeaderSearchPath;

use std::collections::{HashMap, HashSet};

/// True iff `ty` is forward-declarable at the current point in the
/// traversal (spec §4.7): not an enum, not the target of a typedef, its
/// syntactic parent is a pointer or reference, it is not used as a nested
/// name specifier, and nothing enclosing it has already demanded the full
/// type.
pub fn is_forward_declarable(
    decls: &DeclTable,
    ty: &TypeRef,
    is_typedef_target: bool,
    is_nested_name_specifier: bool,
    full_type_already_required: bool,
) -> bool {
    if is_typedef_target || is_nested_name_specifier || full_type_already_required {
        return false;
    }
    if !(ty.is_pointer || ty.is_reference) {
        return false;
    }
    match ty.decl {
        Some(decl) => decls.kind(decl).is_forward_declarable_kind(),
        None => false,
    }
}

/// Collects uses into per-file ledgers while classifying each one by the
/// rules in spec §4.7's table. Consumes traversal events delivered by
/// [`crate::collector::base::BaseUseCollector`].
pub struct IwyuUseCollector<'a> {
    registry: &'a mut FileRegistry,
    decls: &'a DeclTable,
    picker: &'a IncludePicker,
    search_paths: &'a [HeaderSearchPath],
    ledgers: HashMap<FileHandle, PerFileLedger>,
}

impl<'a> IwyuUseCollector<'a> {
    pub fn new(
        registry: &'a mut FileRegistry,
        decls: &'a DeclTable,
        picker: &'a IncludePicker,
        search_paths: &'a [HeaderSearchPath],
    ) -> Self {
        Self { registry, decls, picker, search_paths, ledgers: HashMap::new() }
    }

    pub fn into_ledgers(self) -> HashMap<FileHandle, PerFileLedger> {
        self.ledgers
    }

    fn ledger_for(&mut self, file: FileHandle) -> &mut PerFileLedger {
        let quoted = self.registry.quoted(file).clone();
        self.ledgers.entry(file).or_insert_with(|| PerFileLedger::new(file, quoted))
    }

    fn public_headers_for_decl(&self, decl: DeclHandle) -> Vec<crate::path_util::QuotedInclude> {
        let path = self.registry.path(self.decls.file(decl)).to_string();
        self.picker.headers_for_path(&path, self.search_paths)
    }

    /// Records one use at `loc`, attributing it to the file the location
    /// effectively belongs to (spec §3's scratch-buffer fallback).
    fn record(&mut self, loc: SourceLocation, decl: Option<DeclHandle>, short_name: &str, kind: UseKind, caller_responsible: bool) {
        let use_file = loc.file(self.registry);
        let (symbol_name, decl_filepath) = match decl {
            Some(d) => (self.decls.qualified_name(d).to_string(), self.registry.path(self.decls.file(d)).to_string()),
            // spec §7 MissingSymbol: no known location for the declaration.
            None => (short_name.to_string(), "<unknown>".to_string()),
        };
        let mut one_use = OneUse::new(symbol_name, short_name, decl_filepath, loc, use_file, kind);
        one_use.declaration = decl;
        one_use.unsupported = decl.is_none();
        if let Some(d) = decl {
            one_use.public_headers = self.public_headers_for_decl(d);
        }
        let ledger = self.ledger_for(use_file);
        if caller_responsible {
            if let Some(d) = decl {
                ledger.caller_responsible_types.insert(d);
            }
        }
        ledger.record_use(one_use);
    }

    fn record_full(&mut self, stack: &ContextStack, ty: &TypeRef) {
        if let Some(loc) = stack.current_location() {
            self.record(SourceLocation::new(loc.file, loc.offset / 1_000_000, loc.offset % 1_000_000), ty.decl, &ty.name, UseKind::Full, false);
        }
    }

    fn record_forward_declare(&mut self, stack: &ContextStack, ty: &TypeRef) {
        if let Some(loc) = stack.current_location() {
            self.record(SourceLocation::new(loc.file, loc.offset / 1_000_000, loc.offset % 1_000_000), ty.decl, &ty.name, UseKind::ForwardDeclare, false);
        }
    }
}

impl<'a> UseVisitor for IwyuUseCollector<'a> {
    fn visit_node(&mut self, stack: &ContextStack, node: &Node) {
        match &node.kind {
            NodeKind::Statement(Statement::MemberExpr { base }) => {
                self.record_full(stack, &base.stripped());
            }
            NodeKind::Statement(Statement::Subscript { element }) => {
                self.record_full(stack, element);
            }
            NodeKind::Statement(Statement::SizeOfType { operand, operand_is_reference }) => {
                if *operand_is_reference {
                    self.record_full(stack, operand);
                }
            }
            NodeKind::Statement(Statement::SizeOfExpr { operand }) => {
                if operand.decl.is_some() {
                    self.record_full(stack, operand);
                }
            }
            NodeKind::Statement(Statement::Cast { kind, from, to }) => match kind {
                CastKind::ClassPointerConversion => {
                    self.record_full(stack, from);
                    self.record_full(stack, to);
                }
                CastKind::Constructor => {
                    self.record_full(stack, to);
                }
                CastKind::UserDefined => {
                    self.record_full(stack, from);
                }
                CastKind::NoOp => {}
            },
            NodeKind::Statement(Statement::Delete { deleted }) => {
                self.record_full(stack, deleted);
            }
            NodeKind::Statement(Statement::VariadicArg { ty }) => {
                self.record_full(stack, ty);
            }
            NodeKind::Declaration(Declaration::Function { params, return_type, is_definition, decl }) => {
                for param in params {
                    if is_forward_declarable(self.decls, param, false, false, false) {
                        self.record_forward_declare(stack, param);
                    } else {
                        self.record_full(stack, param);
                    }
                }
                if !is_definition {
                    let ledger_has_earlier_decl = self
                        .ledgers
                        .get(&self.decls.file(*decl))
                        .is_some_and(|l| l.caller_responsible_types.contains(decl));
                    if !ledger_has_earlier_decl {
                        self.record_full(stack, return_type);
                    }
                }
            }
            NodeKind::Declaration(Declaration::Typedef { target, .. }) => {
                if !target.is_dependent_template_param {
                    self.record_full(stack, target);
                }
            }
            NodeKind::Declaration(Declaration::Parameter { ty, has_autocast_ctor }) => {
                if *has_autocast_ctor {
                    self.record_full(stack, ty);
                }
            }
            NodeKind::Declaration(Declaration::Friend(ty)) => {
                self.record_forward_declare(stack, ty);
            }
            NodeKind::Declaration(Declaration::Enum(decl)) => {
                let ty = TypeRef::of(*decl, self.decls.qualified_name(*decl));
                self.record_full(stack, &ty);
            }
            NodeKind::Declaration(Declaration::Variable { ty, .. }) => {
                if is_forward_declarable(self.decls, ty, false, false, false) {
                    self.record_forward_declare(stack, ty);
                } else {
                    self.record_full(stack, ty);
                }
            }
            NodeKind::Declaration(Declaration::Field { ty }) => {
                if is_forward_declarable(self.decls, ty, false, false, false) {
                    self.record_forward_declare(stack, ty);
                } else {
                    self.record_full(stack, ty);
                }
            }
            NodeKind::NestedNameSpecifier(ty) => {
                self.record_full(stack, ty);
            }
            _ => {}
        }
    }

    fn handle_function_call(&mut self, stack: &ContextStack, call: &FunctionCall) {
        if let Some(parent) = &call.parent_type {
            self.record_full(stack, parent);
        }
    }
}

/// Tracked separately from `is_forward_declarable` so call sites that have
/// already committed to a full use (e.g. a member expression's base) can
/// mark the enclosing context without re-deriving it from AST shape alone
/// (spec §4.7, condition (e)).
#[derive(Debug, Default)]
pub struct ForwardDeclareContext {
    full_type_required: HashSet<crate::ast::NodeId>,
}

impl ForwardDeclareContext {
    pub fn mark_full_required(&mut self, node: crate::ast::NodeId) {
        self.full_type_required.insert(node);
    }

    pub fn full_type_required(&self, node: crate::ast::NodeId) -> bool {
        self.full_type_required.contains(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DeclKind;

    fn setup() -> (FileRegistry, DeclTable, IncludePicker, Vec<HeaderSearchPath>) {
        let registry = FileRegistry::new();
        let decls = DeclTable::new();
        let picker = IncludePicker::new().unwrap();
        (registry, decls, picker, Vec::new())
    }

    #[test]
    fn pointer_member_is_forward_declarable_for_a_class() {
        let (mut registry, mut decls, _picker, _sp) = setup();
        let file = registry.intern("/repo/foo.h", &[]);
        let loc = SourceLocation::new(file, 1, 1);
        let d = decls.declare("Foo", DeclKind::Class, file, loc);
        let ty = TypeRef::of(d, "Foo").pointer_to();
        assert!(is_forward_declarable(&decls, &ty, false, false, false));
    }

    #[test]
    fn enum_is_never_forward_declarable() {
        let (mut registry, mut decls, _picker, _sp) = setup();
        let file = registry.intern("/repo/foo.h", &[]);
        let loc = SourceLocation::new(file, 1, 1);
        let d = decls.declare("Color", DeclKind::Enum, file, loc);
        let ty = TypeRef::of(d, "Color").pointer_to();
        assert!(!is_forward_declarable(&decls, &ty, false, false, false));
    }

    #[test]
    fn member_expression_records_a_full_use() {
        let (mut registry, mut decls, picker, search_paths) = setup();
        let file = registry.intern("/repo/foo.cc", &[]);
        let loc = SourceLocation::new(file, 10, 1);
        let d = decls.declare("Foo", DeclKind::Class, file, loc);
        let mut collector = IwyuUseCollector::new(&mut registry, &decls, &picker, &search_paths);
        let mut stack = ContextStack::new();
        stack.push(Node { id: crate::ast::NodeId(0), kind: NodeKind::Statement(Statement::Other), loc: Some(loc) }, None);
        let base = TypeRef::of(d, "Foo").pointer_to();
        collector.visit_node(&stack, &Node {
            id: crate::ast::NodeId(1),
            kind: NodeKind::Statement(Statement::MemberExpr { base }),
            loc: None,
        });
        let ledgers = collector.into_ledgers();
        let ledger = ledgers.get(&file).unwrap();
        assert_eq!(ledger.raw_uses.len(), 1);
        assert_eq!(ledger.raw_uses[0].kind, UseKind::Full);
    }
}
