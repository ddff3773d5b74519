//! Template Instantiation Replayer (spec §4.8): re-walks an instantiated
//! template body, re-attributing every use it finds back to the
//! instantiating caller (or to whichever enclosing template intends to
//! provide the entity), instead of letting the uses land against the
//! template definition's own file.

use std::collections::{HashMap, HashSet};

use crate::ast::flattener::{flatten, NodeSet};
use crate::ast::{Node, TypeRef};
use crate::cache::{CacheStoringScope, FullUseCache};
use crate::ledger::{DeclHandle, FileHandle};

/// Maps the canonical (desugared) form of a template parameter, as it
/// appears inside the template body, back to the sugar the caller wrote.
/// `None` means the parameter took its value from a default template
/// argument the caller never mentioned (spec §4.8).
#[derive(Debug, Clone, Default)]
pub struct ResugarMap {
    entries: HashMap<String, Option<TypeRef>>,
}

impl ResugarMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, canonical_name: impl Into<String>, sugar: Option<TypeRef>) {
        self.entries.insert(canonical_name.into(), sugar);
    }

    pub fn sugar_for(&self, canonical_name: &str) -> Option<&TypeRef> {
        self.entries.get(canonical_name).and_then(|v| v.as_ref())
    }

    /// True for any canonical name not present in the map at all -- a type
    /// the template body refers to that has nothing to do with its
    /// parameters, and so is never the caller's responsibility.
    pub fn is_unrelated_to_template_params(&self, canonical_name: &str) -> bool {
        !self.entries.contains_key(canonical_name)
    }

    /// True for a canonical name present but mapped to `None`: a default
    /// template argument the caller did not write.
    pub fn is_unmentioned_default(&self, canonical_name: &str) -> bool {
        matches!(self.entries.get(canonical_name), Some(None))
    }
}

/// A caller able to say "I intend to provide the symbols defined in
/// `entity_file`" -- realized either by the instantiating template itself,
/// or by an ancestor template further up the call stack (spec §4.8 step 3).
pub trait IntentProvider {
    fn intended_to_provide(&self, caller_file: FileHandle, entity_file: FileHandle) -> bool;
}

#[derive(Debug, Clone)]
pub struct ReplayedUse {
    pub decl: Option<DeclHandle>,
    pub type_name: String,
    pub attributed_to: FileHandle,
}

/// Drives the resugar-aware replay described in spec §4.8. Holds the
/// recursion guard (`traversed_decls`) and the per-call-stack-frame
/// entities that claim intent to provide, per step 3.
pub struct TemplateInstantiationReplayer<'a> {
    cache: &'a mut FullUseCache,
    traversed_decls: HashSet<DeclHandle>,
    /// Stack of (entity, its file) for every template currently being
    /// replayed, innermost last -- consulted for `intended_to_provide`.
    call_stack: Vec<(DeclHandle, FileHandle)>,
}

impl<'a> TemplateInstantiationReplayer<'a> {
    pub fn new(cache: &'a mut FullUseCache) -> Self {
        Self { cache, traversed_decls: HashSet::new(), call_stack: Vec::new() }
    }

    /// Step 1: the nodes present in the uninstantiated template definition
    /// are the caller's responsibility only if they survive substitution,
    /// so anything already present verbatim must be skipped during replay.
    pub fn nodes_to_ignore<'n>(&self, uninstantiated_body: impl IntoIterator<Item = &'n Node>) -> NodeSet {
        flatten(uninstantiated_body)
    }

    /// `can_ignore_type` per step 2(a): true for any type not mentioned in
    /// the resugar map and not itself a substituted template parameter --
    /// i.e. it was already fully accounted for at the template definition
    /// site and replay need not re-report it.
    pub fn can_ignore_type(&self, resugar: &ResugarMap, canonical_name: &str, is_substituted_param: bool) -> bool {
        !is_substituted_param && resugar.is_unrelated_to_template_params(canonical_name)
    }

    /// Entry point: `scan_instantiated_function` (spec §4.8).
    pub fn scan_instantiated_function(
        &mut self,
        function_decl: DeclHandle,
        caller_file: FileHandle,
        decls: &crate::ledger::DeclTable,
        resugar: &ResugarMap,
        intent: &impl IntentProvider,
        nodes_to_ignore: &NodeSet,
        instantiated_body: impl IntoIterator<Item = Node>,
    ) -> Vec<ReplayedUse> {
        if !self.traversed_decls.insert(function_decl) {
            return Vec::new();
        }
        self.call_stack.push((function_decl, caller_file));
        let result = self.replay(caller_file, decls, resugar, intent, nodes_to_ignore, instantiated_body);
        self.call_stack.pop();
        self.traversed_decls.remove(&function_decl);
        result
    }

    /// Entry point: `scan_instantiated_type` (spec §4.8).
    pub fn scan_instantiated_type(
        &mut self,
        type_decl: DeclHandle,
        caller_file: FileHandle,
        decls: &crate::ledger::DeclTable,
        template_name: &str,
        args: &[TypeRef],
        resugar: &ResugarMap,
        intent: &impl IntentProvider,
        nodes_to_ignore: &NodeSet,
        instantiated_body: impl IntoIterator<Item = Node>,
    ) -> Vec<ReplayedUse> {
        // Step 5: precomputed containers skip the full walk entirely, and
        // the returned parameters are intersected against the resugar map
        // so only parameters the caller actually mentioned are reported.
        if let Some(required) = self.cache.precomputed_requirements(template_name, args) {
            return required
                .into_iter()
                .filter(|arg| resugar.sugar_for(&arg.name).is_some() || !resugar.is_unmentioned_default(&arg.name))
                .map(|arg| ReplayedUse { decl: arg.decl, type_name: arg.name.clone(), attributed_to: caller_file })
                .collect();
        }

        if !self.traversed_decls.insert(type_decl) {
            return Vec::new();
        }
        self.call_stack.push((type_decl, caller_file));
        let result = self.replay(caller_file, decls, resugar, intent, nodes_to_ignore, instantiated_body);
        self.call_stack.pop();
        self.traversed_decls.remove(&type_decl);
        result
    }

    fn replay(
        &mut self,
        caller_file: FileHandle,
        decls: &crate::ledger::DeclTable,
        resugar: &ResugarMap,
        intent: &impl IntentProvider,
        nodes_to_ignore: &NodeSet,
        instantiated_body: impl IntoIterator<Item = Node>,
    ) -> Vec<ReplayedUse> {
        let mut out = Vec::new();
        for node in instantiated_body {
            if nodes_to_ignore.contains(&node) {
                continue;
            }
            let Some((decl, type_name)) = extract_type_of_interest(&node) else { continue };
            if self.can_ignore_type(resugar, &type_name, resugar.sugar_for(&type_name).is_some()) {
                continue;
            }

            // Step 3: if the current template, or any ancestor on the call
            // stack, intends to provide this entity's file, the use is
            // attributed to that template instead of the outermost caller,
            // and must not be cached against the outermost caller.
            let entity_file = decl.map(|d| decls.file(d));
            let mut attributed_to = caller_file;
            if let Some(entity_file) = entity_file {
                if let Some(&(_, owner_file)) = self
                    .call_stack
                    .iter()
                    .rev()
                    .find(|&&(_, owner_file)| intent.intended_to_provide(owner_file, entity_file))
                {
                    attributed_to = owner_file;
                }
            }

            out.push(ReplayedUse { decl, type_name, attributed_to });
        }
        out
    }

    /// Step 4: records the replayed uses against an open cache-storing
    /// scope for `entity`, so a later instantiation under the same
    /// resugar can be satisfied from cache instead of replaying again.
    pub fn record_into_scope(scope: &mut CacheStoringScope<'_>, uses: &[ReplayedUse]) {
        for u in uses {
            scope.record_type(u.type_name.clone());
            if let Some(decl) = u.decl {
                scope.record_decl(decl);
            }
        }
    }
}

fn extract_type_of_interest(node: &Node) -> Option<(Option<DeclHandle>, String)> {
    use crate::ast::NodeKind;
    match &node.kind {
        NodeKind::Type(ty) | NodeKind::TypeLocation(ty) | NodeKind::NestedNameSpecifier(ty) => {
            Some((ty.decl, ty.name.clone()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeId, NodeKind};

    struct NeverProvides;
    impl IntentProvider for NeverProvides {
        fn intended_to_provide(&self, _caller_file: FileHandle, _entity_file: FileHandle) -> bool {
            false
        }
    }

    #[test]
    fn unmentioned_default_argument_is_not_caller_responsibility() {
        let mut resugar = ResugarMap::new();
        resugar.insert("std::allocator<T>", None);
        assert!(resugar.is_unmentioned_default("std::allocator<T>"));
        assert!(!resugar.is_unrelated_to_template_params("std::allocator<T>"));
    }

    #[test]
    fn traversed_decls_guards_against_recursive_replay() {
        let mut cache = FullUseCache::new();
        let mut replayer = TemplateInstantiationReplayer::new(&mut cache);
        let mut registry = crate::ledger::FileRegistry::new();
        let file = registry.intern("/repo/foo.cc", &[]);
        let mut table = crate::ledger::DeclTable::new();
        let loc = crate::ledger::SourceLocation::new(file, 1, 1);
        let decl = table.declare("tmpl<int>", crate::ledger::DeclKind::Function, file, loc);
        let resugar = ResugarMap::new();
        let ignore = NodeSet::new();
        let intent = NeverProvides;
        replayer.traversed_decls.insert(decl);
        let result = replayer.scan_instantiated_function(decl, file, &table, &resugar, &intent, &ignore, Vec::new());
        assert!(result.is_empty());
    }

    #[test]
    fn replay_reattributes_uses_to_the_caller_file() {
        let mut cache = FullUseCache::new();
        let mut replayer = TemplateInstantiationReplayer::new(&mut cache);
        let mut registry = crate::ledger::FileRegistry::new();
        let caller_file = registry.intern("/repo/caller.cc", &[]);
        let mut table = crate::ledger::DeclTable::new();
        let loc = crate::ledger::SourceLocation::new(caller_file, 1, 1);
        let t_decl = table.declare("T", crate::ledger::DeclKind::Class, caller_file, loc);
        let mut resugar = ResugarMap::new();
        resugar.insert("T", Some(TypeRef::of(t_decl, "T")));
        let ignore = NodeSet::new();
        let intent = NeverProvides;
        let body = vec![Node { id: NodeId(0), kind: NodeKind::Type(TypeRef::of(t_decl, "T")), loc: None }];
        let result = replayer.scan_instantiated_function(t_decl, caller_file, &table, &resugar, &intent, &ignore, body);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].attributed_to, caller_file);
    }
}
