//! AST Flattener (spec §4.4): collapses a traversed subtree into a flat
//! `NodeSet` so the Template Instantiation Replayer can ask "was this node
//! already visited while replaying the uninstantiated template". Ordinary
//! nodes (declarations, statements) have stable identity and are tracked by
//! `NodeId`; the "value-returned" kinds -- `Type`, `TypeLocation`,
//! `NestedNameSpecifier`, `TemplateName`, `TemplateArgument` -- are recreated
//! fresh at each visit and so must be compared structurally instead.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::ledger::DeclHandle;

use super::{Node, NodeId, NodeKind};

fn is_identity_kind(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Declaration(_) | NodeKind::Statement(_))
}

/// The flattened set of nodes reachable from some traversal root.
#[derive(Debug, Default, Clone)]
pub struct NodeSet {
    by_identity: HashSet<NodeId>,
    by_value: Vec<NodeKind>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `node`, returning `true` if it was not already present.
    pub fn insert(&mut self, node: &Node) -> bool {
        if is_identity_kind(&node.kind) {
            self.by_identity.insert(node.id)
        } else if self.by_value.contains(&node.kind) {
            false
        } else {
            self.by_value.push(node.kind.clone());
            true
        }
    }

    pub fn contains(&self, node: &Node) -> bool {
        if is_identity_kind(&node.kind) {
            self.by_identity.contains(&node.id)
        } else {
            self.by_value.contains(&node.kind)
        }
    }

    pub fn len(&self) -> usize {
        self.by_identity.len() + self.by_value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty() && self.by_value.is_empty()
    }
}

/// Flattens every node under `roots` (a pre-order walk supplied by the
/// caller, since this module has no traversal logic of its own -- the Base
/// Use Collector drives the walk and feeds nodes in as it visits them).
pub fn flatten<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> NodeSet {
    let mut set = NodeSet::new();
    for node in nodes {
        set.insert(node);
    }
    set
}

/// Per-declaration memoization cache: flattening the same template
/// definition's body once per instantiation would be wasted work when the
/// Replayer revisits the same uninstantiated pattern repeatedly.
#[derive(Debug, Default)]
pub struct FlattenCache {
    cache: HashMap<DeclHandle, NodeSet>,
}

impl FlattenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert_with(&mut self, decl: DeclHandle, build: impl FnOnce() -> NodeSet) -> &NodeSet {
        self.cache.entry(decl).or_insert_with(build)
    }

    pub fn invalidate(&mut self, decl: DeclHandle) {
        self.cache.remove(&decl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CallKind, Statement, TypeRef};

    fn stmt_node(id: u32) -> Node {
        Node { id: NodeId(id), kind: NodeKind::Statement(Statement::Other), loc: None }
    }

    fn type_node(id: u32, name: &str) -> Node {
        Node { id: NodeId(id), kind: NodeKind::Type(TypeRef::builtin(name)), loc: None }
    }

    #[test]
    fn identity_nodes_distinguish_by_node_id_even_with_equal_kind() {
        let mut set = NodeSet::new();
        assert!(set.insert(&stmt_node(0)));
        assert!(set.insert(&stmt_node(1)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn value_nodes_dedupe_by_structural_equality() {
        let mut set = NodeSet::new();
        assert!(set.insert(&type_node(0, "int")));
        assert!(!set.insert(&type_node(1, "int")));
        assert!(set.contains(&type_node(2, "int")));
        assert!(!set.contains(&type_node(3, "double")));
    }

    #[test]
    fn call_nodes_are_identity_based() {
        let a = Node { id: NodeId(0), kind: NodeKind::Statement(Statement::Call { callee: None, parent_type: None, kind: CallKind::Ordinary }), loc: None };
        let b = Node { id: NodeId(1), kind: NodeKind::Statement(Statement::Call { callee: None, parent_type: None, kind: CallKind::Ordinary }), loc: None };
        let mut set = NodeSet::new();
        set.insert(&a);
        assert!(!set.contains(&b));
    }
}
