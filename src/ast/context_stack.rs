//! Node Context Stack (spec §4.3): during traversal, maintains the
//! current ancestor chain with a flag "in forward-declare context" that
//! propagates down and can be toggled before recursing into children.

use crate::ledger::{FileRegistry, RawLoc};

use super::{Node, NodeKind};

#[derive(Debug, Clone)]
struct Entry {
    node: Node,
    in_forward_declare_context: bool,
}

#[derive(Debug, Default)]
pub struct ContextStack {
    entries: Vec<Entry>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `node`, inheriting the parent's forward-declare-context flag
    /// unless `toggle` overrides it.
    pub fn push(&mut self, node: Node, toggle: Option<bool>) {
        let inherited = self.entries.last().map(|e| e.in_forward_declare_context).unwrap_or(false);
        self.entries.push(Entry {
            node,
            in_forward_declare_context: toggle.unwrap_or(inherited),
        });
    }

    pub fn pop(&mut self) -> Option<Node> {
        self.entries.pop().map(|e| e.node)
    }

    pub fn in_forward_declare_context(&self) -> bool {
        self.entries.last().map(|e| e.in_forward_declare_context).unwrap_or(false)
    }

    pub fn current(&self) -> Option<&Node> {
        self.entries.last().map(|e| &e.node)
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    /// Returns the nearest ancestor (including the current node) whose
    /// `NodeKind` matches `pred`, optionally bounded to `max_depth`
    /// ancestors above the current node.
    pub fn ancestor_of_kind(&self, max_depth: Option<usize>, pred: impl Fn(&NodeKind) -> bool) -> Option<&Node> {
        let limit = max_depth.map(|d| d + 1).unwrap_or(self.entries.len());
        self.entries
            .iter()
            .rev()
            .take(limit)
            .map(|e| &e.node)
            .find(|n| pred(&n.kind))
    }

    /// True if the immediate parent's `NodeKind` matches `pred`.
    pub fn parent_is_kind(&self, pred: impl Fn(&NodeKind) -> bool) -> bool {
        self.entries
            .iter()
            .rev()
            .nth(1)
            .is_some_and(|e| pred(&e.node.kind))
    }

    /// True if `loc`'s spelling and expansion locations disagree on file,
    /// i.e. the use site is itself inside a macro expansion.
    pub fn is_in_macro(&self, registry: &FileRegistry, spelling: RawLoc, expansion: RawLoc) -> bool {
        spelling.file != expansion.file || registry.is_scratch_buffer(spelling.file)
    }

    /// Returns the best location known for the current traversal position:
    /// walks up past nodes with no location, and returns `None` ("invalid")
    /// as soon as it finds a node whose spelling and expansion locations
    /// disagree on file (spec §4.3).
    pub fn current_location(&self) -> Option<RawLoc> {
        for entry in self.entries.iter().rev() {
            if let Some(loc) = entry.node.loc {
                if !loc.spelling_expansion_agree() {
                    return None;
                }
                return Some(loc.spelling);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeId;
    use crate::ledger::{FileRegistry, SourceLocation};

    fn node(id: u32, kind: NodeKind, loc: Option<SourceLocation>) -> Node {
        Node { id: NodeId(id), kind, loc }
    }

    #[test]
    fn forward_declare_flag_inherits_then_can_be_toggled() {
        let mut stack = ContextStack::new();
        stack.push(node(0, NodeKind::Statement(super::super::Statement::Other), None), Some(true));
        assert!(stack.in_forward_declare_context());
        stack.push(node(1, NodeKind::Statement(super::super::Statement::Other), None), None);
        assert!(stack.in_forward_declare_context());
        stack.push(node(2, NodeKind::Statement(super::super::Statement::Other), None), Some(false));
        assert!(!stack.in_forward_declare_context());
    }

    #[test]
    fn current_location_skips_nodes_without_loc() {
        let mut registry = FileRegistry::new();
        let f = registry.intern("/repo/foo.h", &[]);
        let mut stack = ContextStack::new();
        stack.push(node(0, NodeKind::Statement(super::super::Statement::Other), Some(SourceLocation::new(f, 1, 1))), None);
        stack.push(node(1, NodeKind::Statement(super::super::Statement::Other), None), None);
        assert_eq!(stack.current_location().unwrap().offset, 1_000_001);
    }
}
