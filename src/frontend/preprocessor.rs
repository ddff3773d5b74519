//! Preprocessor adapter (SPEC_FULL.md §2.14): project-relative `#include`
//! resolution and the direct-include graph, grounded on
//! `core/resolvers/cpp.rs`'s `find_include_file` search-directory strategy.
//! Stands in for the real preprocessor's callback stream (spec §6).

use std::path::{Path, PathBuf};

use petgraph::visit::Walker;

use crate::include_picker::IncludePicker;
use crate::ledger::{FileHandle, FileRegistry};
use crate::path_util::HeaderSearchPath;

/// Where to look for a quoted or system `#include` target. Same-directory-
/// as-includer is tried first, then the configured search paths, then a
/// handful of conventional project layouts.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub project_root: PathBuf,
    pub search_paths: Vec<HeaderSearchPath>,
}

impl ProjectLayout {
    pub fn new(project_root: impl Into<PathBuf>, search_paths: Vec<HeaderSearchPath>) -> Self {
        Self { project_root: project_root.into(), search_paths }
    }

    /// Resolves `include_path` (as written, without quotes/angle-brackets)
    /// to an on-disk file, or `None` if it cannot be found (e.g. a system
    /// header this adapter does not ship a copy of).
    pub fn resolve(&self, include_path: &str, from_file: &Path) -> Option<PathBuf> {
        let normalized = include_path.replace('\\', "/");

        if let Some(parent) = from_file.parent() {
            let candidate = parent.join(&normalized);
            if candidate.exists() {
                return Some(candidate);
            }
        }

        for sp in &self.search_paths {
            let candidate = Path::new(&sp.path).join(&normalized);
            if candidate.exists() {
                return Some(candidate);
            }
        }

        for rel in ["", "include", "src", "include/public"] {
            let candidate = self.project_root.join(rel).join(&normalized);
            if candidate.exists() {
                return Some(candidate);
            }
        }

        None
    }
}

/// The direct `#include` relation observed while parsing, used to answer
/// `file_transitively_includes` (spec §6's external-interface contract).
/// Backed by `petgraph`'s `DiGraphMap`, which keys directly off `FileHandle`
/// without a separate node-index table.
#[derive(Debug, Default)]
pub struct IncludeGraph {
    direct: petgraph::graphmap::DiGraphMap<FileHandle, ()>,
}

impl IncludeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, includer: FileHandle, included: FileHandle) {
        self.direct.add_edge(includer, included, ());
    }

    pub fn direct_includes_of(&self, file: FileHandle) -> impl Iterator<Item = FileHandle> + '_ {
        self.direct.neighbors(file)
    }

    /// `a` transitively includes `b` if `b` is `a` or reachable by
    /// following `#include`s from `a`; uses `petgraph`'s DFS rather than a
    /// hand-rolled stack walk.
    pub fn file_transitively_includes(&self, a: FileHandle, b: FileHandle) -> bool {
        if a == b {
            return true;
        }
        if !self.direct.contains_node(a) {
            return false;
        }
        petgraph::visit::Dfs::new(&self.direct, a).iter(&self.direct).any(|node| node == b)
    }
}

/// `public_header_intends_to_provide` (spec §6): true if `user_file`
/// transitively includes `defining_file` itself, or transitively includes
/// some header the Include Picker maps `defining_file` onto.
pub fn intends_to_provide(
    graph: &IncludeGraph,
    picker: &IncludePicker,
    registry: &FileRegistry,
    search_paths: &[HeaderSearchPath],
    user_file: FileHandle,
    defining_file: FileHandle,
) -> bool {
    if graph.file_transitively_includes(user_file, defining_file) {
        return true;
    }
    let defining_path = registry.path(defining_file).to_string();
    picker
        .headers_for_path(&defining_path, search_paths)
        .iter()
        .any(|public_header| {
            graph
                .direct_includes_of(user_file)
                .any(|inc| registry.quoted(inc) == public_header)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_util::SearchPathKind;
    use std::io::Write;

    #[test]
    fn resolves_relative_to_includer_directory() {
        let dir = tempfile::tempdir().unwrap();
        let header = dir.path().join("foo.h");
        std::fs::File::create(&header).unwrap().write_all(b"").unwrap();
        let includer = dir.path().join("main.cc");
        let layout = ProjectLayout::new(dir.path(), Vec::new());
        assert_eq!(layout.resolve("foo.h", &includer), Some(header));
    }

    #[test]
    fn falls_back_to_conventional_include_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("include")).unwrap();
        let header = dir.path().join("include").join("bar.h");
        std::fs::File::create(&header).unwrap().write_all(b"").unwrap();
        let includer = dir.path().join("src").join("main.cc");
        std::fs::create_dir_all(includer.parent().unwrap()).unwrap();
        let layout = ProjectLayout::new(dir.path(), Vec::new());
        assert_eq!(layout.resolve("bar.h", &includer), Some(header));
    }

    #[test]
    fn unresolvable_include_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let includer = dir.path().join("main.cc");
        let layout = ProjectLayout::new(dir.path(), Vec::new());
        assert_eq!(layout.resolve("nonexistent.h", &includer), None);
    }

    #[test]
    fn transitive_reachability_follows_chain() {
        let mut reg = FileRegistry::new();
        let a = reg.intern("/repo/a.cc", &[]);
        let b = reg.intern("/repo/b.h", &[]);
        let c = reg.intern("/repo/c.h", &[]);
        let mut graph = IncludeGraph::new();
        graph.record(a, b);
        graph.record(b, c);
        assert!(graph.file_transitively_includes(a, c));
        assert!(!graph.file_transitively_includes(c, a));
    }

    #[test]
    fn intends_to_provide_via_include_picker_remap() {
        let system_paths = vec![HeaderSearchPath::new("/", SearchPathKind::System)];
        let mut reg = FileRegistry::new();
        let user = reg.intern("/repo/user.cc", &[]);
        let public = reg.intern("/vector", &system_paths);
        let private = reg.intern("bits/stl_vector.h", &[]);
        let mut graph = IncludeGraph::new();
        graph.record(user, public);
        let picker = IncludePicker::new().unwrap();
        assert!(intends_to_provide(&graph, &picker, &reg, &[], user, private));
    }
}
