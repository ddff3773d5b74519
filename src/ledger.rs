//! Core data model (spec §3): file/declaration identity, source locations,
//! recorded uses, include/forward-declare lines, and the per-file ledger
//! that the Trimmer and Diff Emitter consume.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::path_util::{self, HeaderSearchPath, QuotedInclude};

/// Opaque identity of a physical source file. Equality is identity-based:
/// each on-disk file has exactly one handle, minted once by [`FileRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHandle(u32);

#[derive(Debug)]
struct FileRecord {
    path: String,
    quoted: QuotedInclude,
    is_header: bool,
    /// True for macro-scratch buffers synthesized by the front end; such a
    /// file is never a real translation-unit member.
    is_scratch_buffer: bool,
}

/// Owns every [`FileHandle`] minted during one analysis run. Provided by
/// the preprocessor collaborator (spec §6); here realized as a plain arena
/// indexed by small integers, per spec §9's "plain owned collections
/// indexed by small value handles" note.
#[derive(Debug, Default)]
pub struct FileRegistry {
    files: Vec<FileRecord>,
    by_path: HashMap<String, FileHandle>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, path: &str, search_paths: &[HeaderSearchPath]) -> FileHandle {
        let normalized = path_util::canonicalize(path);
        if let Some(&h) = self.by_path.get(&normalized) {
            return h;
        }
        let quoted = path_util::to_quoted(&normalized, search_paths);
        let handle = FileHandle(self.files.len() as u32);
        self.files.push(FileRecord {
            path: normalized.clone(),
            quoted,
            is_header: path_util::is_header(&normalized),
            is_scratch_buffer: false,
        });
        self.by_path.insert(normalized, handle);
        handle
    }

    pub fn intern_scratch_buffer(&mut self, label: &str) -> FileHandle {
        let handle = FileHandle(self.files.len() as u32);
        self.files.push(FileRecord {
            path: format!("<scratch:{label}>"),
            quoted: QuotedInclude::user(label),
            is_header: false,
            is_scratch_buffer: true,
        });
        handle
    }

    pub fn path(&self, handle: FileHandle) -> &str {
        &self.files[handle.0 as usize].path
    }

    pub fn quoted(&self, handle: FileHandle) -> &QuotedInclude {
        &self.files[handle.0 as usize].quoted
    }

    pub fn is_header(&self, handle: FileHandle) -> bool {
        self.files[handle.0 as usize].is_header
    }

    pub fn is_scratch_buffer(&self, handle: FileHandle) -> bool {
        self.files[handle.0 as usize].is_scratch_buffer
    }
}

/// A compact reference to a position within a translation unit. Carries
/// both the *spelling* location (where the token is written) and the
/// *expansion* location (where the macro that produced it was invoked);
/// they differ only inside macro expansions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLoc {
    pub file: FileHandle,
    /// A total order within `file`: conventionally `line * 1_000_000 + column`.
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub spelling: RawLoc,
    pub expansion: RawLoc,
}

impl SourceLocation {
    pub fn new(file: FileHandle, line: u32, column: u32) -> Self {
        let pos = RawLoc { file, offset: line * 1_000_000 + column };
        Self { spelling: pos, expansion: pos }
    }

    pub fn in_macro(spelling: RawLoc, expansion: RawLoc) -> Self {
        Self { spelling, expansion }
    }

    /// The location the core should attribute a use to. If the spelling
    /// location is inside a macro-scratch buffer, falls back to the
    /// expansion location (spec §3).
    pub fn effective(&self, registry: &FileRegistry) -> RawLoc {
        if registry.is_scratch_buffer(self.spelling.file) {
            self.expansion
        } else {
            self.spelling
        }
    }

    pub fn file(&self, registry: &FileRegistry) -> FileHandle {
        self.effective(registry).file
    }

    /// Whether spelling and expansion point into the same file -- used by
    /// the Node Context Stack's `current_location` to decide validity.
    pub fn spelling_expansion_agree(&self) -> bool {
        self.spelling.file == self.expansion.file
    }

    pub fn is_before(&self, other: &SourceLocation, registry: &FileRegistry) -> bool {
        let a = self.effective(registry);
        let b = other.effective(registry);
        a.file == b.file && a.offset < b.offset
    }
}

/// Identity of a declaration (class, struct, union, class template, enum,
/// function, typedef or namespace). `canonical` is the location of the
/// first-seen declaration; `redeclarations` accumulates every subsequent
/// redeclaration's location, forming the total order used by "visible
/// earlier in the same file" (spec §4.9, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclHandle(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Class,
    Struct,
    Union,
    ClassTemplate,
    Enum,
    Function,
    Typedef,
    Namespace,
}

impl DeclKind {
    pub fn is_record(&self) -> bool {
        matches!(self, DeclKind::Class | DeclKind::Struct | DeclKind::Union)
    }

    pub fn is_forward_declarable_kind(&self) -> bool {
        // Enums are never forward-declarable (spec §4.7's table); class
        // templates and records are.
        matches!(
            self,
            DeclKind::Class | DeclKind::Struct | DeclKind::Union | DeclKind::ClassTemplate
        )
    }
}

#[derive(Debug)]
struct DeclRecord {
    kind: DeclKind,
    qualified_name: String,
    file: FileHandle,
    canonical: SourceLocation,
    redeclarations: Vec<SourceLocation>,
    has_default_template_args: bool,
    is_nested_class: bool,
    parent_class: Option<DeclHandle>,
}

/// Per-translation-unit table of known declarations. Shared across the
/// whole traversal but never across translation units (spec §5).
#[derive(Debug, Default)]
pub struct DeclTable {
    decls: Vec<DeclRecord>,
    by_name: HashMap<String, DeclHandle>,
}

impl DeclTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(
        &mut self,
        qualified_name: &str,
        kind: DeclKind,
        file: FileHandle,
        loc: SourceLocation,
    ) -> DeclHandle {
        if let Some(&existing) = self.by_name.get(qualified_name) {
            self.decls[existing.0 as usize].redeclarations.push(loc);
            return existing;
        }
        let handle = DeclHandle(self.decls.len() as u32);
        self.decls.push(DeclRecord {
            kind,
            qualified_name: qualified_name.to_string(),
            file,
            canonical: loc,
            redeclarations: Vec::new(),
            has_default_template_args: false,
            is_nested_class: false,
            parent_class: None,
        });
        self.by_name.insert(qualified_name.to_string(), handle);
        handle
    }

    pub fn lookup(&self, qualified_name: &str) -> Option<DeclHandle> {
        self.by_name.get(qualified_name).copied()
    }

    pub fn set_has_default_template_args(&mut self, handle: DeclHandle, value: bool) {
        self.decls[handle.0 as usize].has_default_template_args = value;
    }

    pub fn set_nested_class(&mut self, handle: DeclHandle, parent: DeclHandle) {
        self.decls[handle.0 as usize].is_nested_class = true;
        self.decls[handle.0 as usize].parent_class = Some(parent);
    }

    pub fn kind(&self, handle: DeclHandle) -> DeclKind {
        self.decls[handle.0 as usize].kind
    }

    pub fn qualified_name(&self, handle: DeclHandle) -> &str {
        &self.decls[handle.0 as usize].qualified_name
    }

    pub fn file(&self, handle: DeclHandle) -> FileHandle {
        self.decls[handle.0 as usize].file
    }

    pub fn canonical_location(&self, handle: DeclHandle) -> SourceLocation {
        self.decls[handle.0 as usize].canonical
    }

    pub fn has_default_template_args(&self, handle: DeclHandle) -> bool {
        self.decls[handle.0 as usize].has_default_template_args
    }

    pub fn is_nested_class(&self, handle: DeclHandle) -> bool {
        self.decls[handle.0 as usize].is_nested_class
    }

    pub fn parent_class(&self, handle: DeclHandle) -> Option<DeclHandle> {
        self.decls[handle.0 as usize].parent_class
    }

    /// All locations (canonical + redeclarations) for a decl, in no
    /// particular order -- callers sort by `is_before` when order matters.
    pub fn all_locations(&self, handle: DeclHandle) -> Vec<SourceLocation> {
        let record = &self.decls[handle.0 as usize];
        let mut locs = vec![record.canonical];
        locs.extend(record.redeclarations.iter().copied());
        locs
    }

    /// True if any redeclaration of `handle` appears in `file` strictly
    /// before `use_loc`.
    pub fn visible_earlier_in_file(
        &self,
        handle: DeclHandle,
        file: FileHandle,
        use_loc: &SourceLocation,
        registry: &FileRegistry,
    ) -> bool {
        self.all_locations(handle).iter().any(|loc| {
            loc.file(registry) == file && loc.is_before(use_loc, registry)
        })
    }
}

/// How a recorded reference must be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseKind {
    /// Requires the complete definition of a type, or a function body.
    Full,
    /// Satisfied by an opaque (forward) declaration.
    ForwardDeclare,
}

/// One recorded reference to a symbol (spec §3).
#[derive(Debug, Clone)]
pub struct OneUse {
    pub symbol_name: String,
    pub short_name: String,
    pub declaration: Option<DeclHandle>,
    pub decl_filepath: String,
    pub use_loc: SourceLocation,
    pub use_file: FileHandle,
    pub kind: UseKind,
    pub in_method_body: bool,
    pub public_headers: Vec<QuotedInclude>,
    pub suggested_header: Option<QuotedInclude>,
    pub ignored: bool,
    pub is_violation: bool,
    /// Set when the front end could not model the construct that produced
    /// this use (spec §7's `UnsupportedInput`); the use is still recorded
    /// conservatively as full.
    pub unsupported: bool,
}

impl OneUse {
    pub fn new(
        symbol_name: impl Into<String>,
        short_name: impl Into<String>,
        decl_filepath: impl Into<String>,
        use_loc: SourceLocation,
        use_file: FileHandle,
        kind: UseKind,
    ) -> Self {
        Self {
            symbol_name: symbol_name.into(),
            short_name: short_name.into(),
            declaration: None,
            decl_filepath: decl_filepath.into(),
            use_loc,
            use_file,
            kind,
            in_method_body: false,
            public_headers: Vec::new(),
            suggested_header: None,
            ignored: false,
            is_violation: false,
            unsupported: false,
        }
    }
}

/// One desired-or-present element of a file: an `#include` line or a
/// forward declaration.
#[derive(Debug, Clone)]
pub enum LineEntry {
    Include { quoted: QuotedInclude },
    ForwardDecl { decl: DeclHandle, printed_form: String },
}

#[derive(Debug, Clone)]
pub struct IncludeOrForwardDeclareLine {
    pub entry: LineEntry,
    pub start_line: i64,
    pub end_line: i64,
    pub is_present: bool,
    pub is_desired: bool,
    /// short symbol name -> count, for comment generation.
    pub symbol_uses: BTreeMap<String, usize>,
}

impl IncludeOrForwardDeclareLine {
    pub fn new_include(quoted: QuotedInclude, start_line: i64, end_line: i64, is_present: bool) -> Self {
        Self {
            entry: LineEntry::Include { quoted },
            start_line,
            end_line,
            is_present,
            is_desired: false,
            symbol_uses: BTreeMap::new(),
        }
    }

    pub fn new_forward_decl(decl: DeclHandle, printed_form: impl Into<String>) -> Self {
        Self {
            entry: LineEntry::ForwardDecl { decl, printed_form: printed_form.into() },
            start_line: -1,
            end_line: -1,
            is_present: false,
            is_desired: false,
            symbol_uses: BTreeMap::new(),
        }
    }

    pub fn is_include_line(&self) -> bool {
        matches!(self.entry, LineEntry::Include { .. })
    }

    pub fn quoted_include(&self) -> Option<&QuotedInclude> {
        match &self.entry {
            LineEntry::Include { quoted } => Some(quoted),
            LineEntry::ForwardDecl { .. } => None,
        }
    }

    pub fn add_symbol_use(&mut self, short_name: &str) {
        *self.symbol_uses.entry(short_name.to_string()).or_insert(0) += 1;
    }

    pub fn has_symbol_use(&self, short_name: &str) -> bool {
        self.symbol_uses.contains_key(short_name)
    }

    pub fn clear_line_numbers(&mut self) {
        self.start_line = -1;
        self.end_line = -1;
    }

    pub fn line_number_string(&self) -> String {
        if self.start_line < 0 {
            "(none)".to_string()
        } else if self.start_line == self.end_line {
            self.start_line.to_string()
        } else {
            format!("{}-{}", self.start_line, self.end_line)
        }
    }

    pub fn rendered_line(&self) -> String {
        match &self.entry {
            LineEntry::Include { quoted } => format!("#include {quoted}"),
            LineEntry::ForwardDecl { printed_form, .. } => printed_form.clone(),
        }
    }
}

/// Per analyzed file: its direct includes, forward declarations,
/// associated files, and the raw uses recorded against it (spec §3).
#[derive(Debug)]
pub struct PerFileLedger {
    pub file: FileHandle,
    pub quoted_name: QuotedInclude,
    pub associated: HashSet<FileHandle>,
    pub direct_includes: HashSet<QuotedInclude>,
    pub direct_include_files: HashSet<FileHandle>,
    pub direct_forward_declares: HashSet<DeclHandle>,
    pub raw_uses: Vec<OneUse>,
    pub lines: Vec<IncludeOrForwardDeclareLine>,
    pub desired_includes: HashSet<QuotedInclude>,
    /// Types/typedefs/functions for which the code author in this file
    /// wrote an earlier forward declaration and did not directly include a
    /// defining header -- spec §4.7's "code-author-intent override".
    pub caller_responsible_types: HashSet<DeclHandle>,
}

impl PerFileLedger {
    pub fn new(file: FileHandle, quoted_name: QuotedInclude) -> Self {
        Self {
            file,
            quoted_name,
            associated: HashSet::new(),
            direct_includes: HashSet::new(),
            direct_include_files: HashSet::new(),
            direct_forward_declares: HashSet::new(),
            raw_uses: Vec::new(),
            lines: Vec::new(),
            desired_includes: HashSet::new(),
            caller_responsible_types: HashSet::new(),
        }
    }

    pub fn record_use(&mut self, one_use: OneUse) {
        self.raw_uses.push(one_use);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_registry_interns_once() {
        let mut reg = FileRegistry::new();
        let a = reg.intern("/repo/foo.h", &[]);
        let b = reg.intern("/repo/foo.h", &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn decl_table_tracks_redeclarations() {
        let mut reg = FileRegistry::new();
        let f = reg.intern("/repo/foo.h", &[]);
        let mut decls = DeclTable::new();
        let loc1 = SourceLocation::new(f, 10, 1);
        let loc2 = SourceLocation::new(f, 20, 1);
        let h1 = decls.declare("ns::Foo", DeclKind::Class, f, loc1);
        let h2 = decls.declare("ns::Foo", DeclKind::Class, f, loc2);
        assert_eq!(h1, h2);
        assert_eq!(decls.all_locations(h1).len(), 2);
    }

    #[test]
    fn scratch_buffer_falls_back_to_expansion() {
        let mut reg = FileRegistry::new();
        let real = reg.intern("/repo/foo.cc", &[]);
        let scratch = reg.intern_scratch_buffer("macro-expansion");
        let loc = SourceLocation::in_macro(
            RawLoc { file: scratch, offset: 1 },
            RawLoc { file: real, offset: 42 },
        );
        assert_eq!(loc.file(&reg), real);
    }
}
