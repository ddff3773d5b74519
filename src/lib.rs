//! Include-what-you-use style include-dependency analyzer (spec.md §1).
//!
//! Wires the eleven core components (`path_util`, `include_picker`, `ast`,
//! `cache`, `collector`, `ledger`, `trimmer`, `output`) to the two
//! out-of-scope collaborators spec §6 describes -- here realized by the
//! `frontend` adapters -- into one orchestration entry point,
//! [`analyze_file`], that the CLI driver (`src/main.rs`) calls once per
//! translation unit.

pub mod ast;
pub mod cache;
pub mod collector;
pub mod config;
pub mod error;
pub mod frontend;
pub mod include_picker;
pub mod ledger;
pub mod output;
pub mod path_util;
pub mod trimmer;

use std::collections::HashMap;
use std::path::Path;

use tracing::instrument;

use crate::collector::iwyu::IwyuUseCollector;
use crate::config::AnalysisContext;
use crate::error::Result;
use crate::frontend::cpp::CppFrontEnd;
use crate::frontend::preprocessor::ProjectLayout;
use crate::include_picker::IncludePicker;
use crate::ledger::{DeclTable, FileHandle, FileRegistry, PerFileLedger};
use crate::path_util::QuotedInclude;

/// Groups `discovery_order` by [`path_util::get_canonical_name`] and
/// assigns each non-header file the header(s) sharing its canonical name
/// as its associated files (spec §3's "a `.cc`'s associated `.h`" pairing,
/// the input the Trimmer's step C and the Diff Emitter's sort-bucket-1
/// both key off). A header never gets an associated file back: only the
/// translation unit side of the pair inherits the other's direct/desired
/// includes.
fn assign_associated_files(discovery_order: &[FileHandle], registry: &FileRegistry, ledgers: &mut HashMap<FileHandle, PerFileLedger>) {
    let mut by_canonical_name: HashMap<String, Vec<FileHandle>> = HashMap::new();
    for &file in discovery_order {
        let canonical = crate::path_util::get_canonical_name(registry.path(file));
        by_canonical_name.entry(canonical).or_default().push(file);
    }
    for group in by_canonical_name.values() {
        let headers: Vec<FileHandle> = group.iter().copied().filter(|&f| registry.is_header(f)).collect();
        if headers.is_empty() {
            continue;
        }
        for &file in group {
            if registry.is_header(file) {
                continue;
            }
            if let Some(ledger) = ledgers.get_mut(&file) {
                ledger.associated.extend(headers.iter().copied());
            }
        }
    }
}

/// Everything produced by analyzing one translation unit: the file arena,
/// the per-file ledgers the Diff Emitter reads, and the order files were
/// first discovered in (so the CLI can report the entry file first).
pub struct AnalysisResult {
    pub registry: FileRegistry,
    pub ledgers: HashMap<FileHandle, PerFileLedger>,
    pub discovery_order: Vec<FileHandle>,
}

/// Runs the full pipeline over one translation unit (spec.md §2's data
/// flow, end to end): parse, declare, collect uses, then the Trimmer's
/// six-step pass (spec §4.9). A fresh [`DeclTable`] and [`CppFrontEnd`] are
/// used per call, matching spec §5's "shared across the whole translation
/// unit's traversal but not across translation units".
#[instrument(skip(ctx), fields(entry = %entry_path.display()))]
pub fn analyze_file(entry_path: &Path, ctx: &AnalysisContext) -> Result<AnalysisResult> {
    let project_root = entry_path.parent().unwrap_or_else(|| Path::new("."));
    let layout = ProjectLayout::new(project_root, ctx.search_paths.clone());

    let mut registry = FileRegistry::new();
    let mut picker = IncludePicker::new()?;
    for (private_header, public_headers) in &ctx.extra_mappings {
        for public_header in public_headers {
            picker.add_mapping(private_header, &QuotedInclude::from_quoted(public_header.clone()))?;
        }
    }

    let mut front_end = CppFrontEnd::new();
    front_end.parse_transitively(entry_path, &layout, &mut registry, &mut picker)?;

    let mut decls = DeclTable::new();
    front_end.declare_all(&mut decls, &registry);

    picker.finalize()?;

    let mut ledgers = {
        let mut collector = IwyuUseCollector::new(&mut registry, &decls, &picker, &ctx.search_paths);
        front_end.collect_uses(&mut collector, &decls, &registry);
        collector.into_ledgers()
    };

    let discovery_order: Vec<FileHandle> = front_end.discovery_order().to_vec();
    for &file in &discovery_order {
        let quoted_name = registry.quoted(file).clone();
        let ledger = ledgers.entry(file).or_insert_with(|| PerFileLedger::new(file, quoted_name));

        for (path, is_system, line) in front_end.includes_of(file) {
            let file_path = Path::new(registry.path(file));
            let quoted = if is_system {
                QuotedInclude::system(&path)
            } else {
                match layout.resolve(&path, file_path) {
                    Some(resolved) => registry.quoted(registry.intern(&resolved.to_string_lossy(), &ctx.search_paths)).clone(),
                    None => QuotedInclude::user(&path),
                }
            };
            ledger.direct_includes.insert(quoted.clone());
            ledger.lines.push(crate::ledger::IncludeOrForwardDeclareLine::new_include(quoted, line, line, true));
        }
        for included in front_end.include_graph.direct_includes_of(file) {
            ledger.direct_include_files.insert(included);
        }
    }

    assign_associated_files(&discovery_order, &registry, &mut ledgers);

    trimmer::trim_and_resolve(&mut ledgers, &decls, &registry);

    Ok(AnalysisResult { registry, ledgers, discovery_order })
}

/// True if any non-ignored use in any ledger was classified as a violation
/// (spec §7: "the final process exit reflects whether violations were
/// found, not whether errors occurred during analysis").
pub fn has_violations(result: &AnalysisResult) -> bool {
    result.ledgers.values().any(|l| l.raw_uses.iter().any(|u| u.is_violation))
}
