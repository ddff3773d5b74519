//! Use Trimmer & Set-Cover Resolver (spec §4.9).
//!
//! Runs once, after traversal finishes, over every file's [`PerFileLedger`]:
//! trims implausible forward-declare and full uses (steps A-B), computes
//! each file's effective associations (step C), solves the minimal
//! set-cover (step D), classifies violations (step E), and reconciles the
//! desired include/forward-declare lines (step F). Ported in behavior from
//! `ProcessForwardDeclare`/`ProcessFullUse`/`CalculateMinimalIncludes`/
//! `CalculateIwyuViolations` in `examples/original_source/iwyu_output.cc`.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument, trace};

use crate::ledger::{
    DeclHandle, DeclKind, DeclTable, FileHandle, FileRegistry, IncludeOrForwardDeclareLine,
    LineEntry, OneUse, PerFileLedger, UseKind,
};
use crate::path_util::QuotedInclude;

/// Step A: trims one forward-declare use in place. Returns `true` if the
/// use was recategorized to a full use (the caller must then run it
/// through [`trim_full_use`] too).
fn trim_forward_declare_use(
    use_: &mut OneUse,
    decls: &DeclTable,
    registry: &FileRegistry,
) -> bool {
    if use_.ignored {
        return false;
    }
    let Some(decl) = use_.declaration else { return false };

    // A1: not a class or class template -> promote to full use.
    if !decls.kind(decl).is_record() && decls.kind(decl) != DeclKind::ClassTemplate {
        trace!(symbol = %use_.symbol_name, "fwd-decl -> full: not a class");
        use_.kind = UseKind::Full;
        return true;
    }

    // A2: class template with default template args -> promote to full use,
    // but keep evaluating A3/A4 below (they may still discard it entirely).
    let mut promoted = false;
    if decls.kind(decl) == DeclKind::ClassTemplate && decls.has_default_template_args(decl) {
        trace!(symbol = %use_.symbol_name, "fwd-decl -> full: default template args");
        use_.kind = UseKind::Full;
        promoted = true;
    }

    // A3: nested class -> the parent class's definition will supply it.
    if decls.is_nested_class(decl) {
        trace!(symbol = %use_.symbol_name, "dropping fwd-decl use: nested class");
        use_.ignored = true;
        return promoted;
    }

    // A4: a definition is visible earlier in the same file (or later, if
    // inside a class whose method body contains the use) -> drop.
    let use_file = use_.use_file;
    let visible = decls.visible_earlier_in_file(decl, use_file, &use_.use_loc, registry)
        || (use_.in_method_body
            && decls
                .all_locations(decl)
                .iter()
                .any(|loc| loc.file(registry) == use_file));
    if visible {
        trace!(symbol = %use_.symbol_name, "dropping fwd-decl use: redeclaration visible earlier");
        use_.ignored = true;
    }
    promoted
}

/// Step B: trims one full use in place.
fn trim_full_use(use_: &mut OneUse, decls: &DeclTable, registry: &FileRegistry) {
    if use_.ignored {
        return;
    }
    let Some(decl) = use_.declaration else { return };

    // B1: declared in the same file as the use.
    if decls.file(decl) == use_.use_file {
        trace!(symbol = %use_.symbol_name, "dropping full use: same file as decl");
        use_.ignored = true;
        return;
    }

    // B2: built-in functions (and built-in new/delete).
    if decls.kind(decl) == DeclKind::Function && use_.symbol_name.starts_with("__builtin_") {
        trace!(symbol = %use_.symbol_name, "dropping full use: builtin function");
        use_.ignored = true;
        return;
    }
    if decls.kind(decl) == DeclKind::Function
        && (use_.short_name == "operator new" || use_.short_name == "operator delete")
        && !use_.decl_filepath.contains('/')
    {
        use_.ignored = true;
        return;
    }

    // B3: declared in a non-header file, used in a header file.
    let decl_file = decls.file(decl);
    if registry.is_header(use_.use_file) && !registry.is_header(decl_file) {
        trace!(symbol = %use_.symbol_name, "dropping full use: .h using a .cc decl");
        use_.ignored = true;
        return;
    }

    // B4: member function declared in the "same" (post-mapping) file as
    // its parent class.
    if decls.kind(decl) == DeclKind::Function {
        if let Some(parent) = decls.parent_class(decl) {
            if decls.file(parent) == decl_file {
                trace!(symbol = %use_.symbol_name, "dropping full use: member fn, same file as parent");
                use_.ignored = true;
            }
        }
    }
}

/// Step C: files inherit their associated files' direct includes (as
/// additional direct includes for satisfaction purposes) and their
/// associated files' *desired* includes (so `m.cpp` won't re-add something
/// `h.hpp` is already adding).
fn effective_direct_includes(
    ledger: &PerFileLedger,
    ledgers: &HashMap<FileHandle, PerFileLedger>,
) -> HashSet<QuotedInclude> {
    let mut out = ledger.direct_includes.clone();
    out.extend(associated_direct_includes(ledger, ledgers));
    out
}

/// Just the associated files' own direct includes, excluding `ledger`'s.
/// Spec §4.9 Step D's pool 1 is "headers already in the associated file's
/// direct-include set" only; the current file's direct includes are pool 4,
/// tried after the desired-set pools 2 and 3. Keeping this distinct from
/// [`effective_direct_includes`] (which is also used for violation
/// classification, where the union is the correct set) matters: passing the
/// union to pool 1 would make pool 4 dead code.
fn associated_direct_includes(
    ledger: &PerFileLedger,
    ledgers: &HashMap<FileHandle, PerFileLedger>,
) -> HashSet<QuotedInclude> {
    let mut out = HashSet::new();
    for &assoc in &ledger.associated {
        if let Some(l) = ledgers.get(&assoc) {
            out.extend(l.direct_includes.iter().cloned());
        }
    }
    out
}

fn effective_desired_includes(
    ledger: &PerFileLedger,
    ledgers: &HashMap<FileHandle, PerFileLedger>,
) -> HashSet<QuotedInclude> {
    let mut out = ledger.desired_includes.clone();
    for &assoc in &ledger.associated {
        if let Some(l) = ledgers.get(&assoc) {
            out.extend(l.desired_includes.iter().cloned());
        }
    }
    out
}

/// Step D: assigns `suggested_header` to every non-ignored full use in
/// `uses`, given the file's (already effective) direct-include and
/// desired-include sets. Mutates `desired_headers` as it goes.
#[instrument(level = "debug", skip_all)]
fn calculate_minimal_includes(
    direct_includes: &HashSet<QuotedInclude>,
    associated_direct_includes: &HashSet<QuotedInclude>,
    uses: &mut [OneUse],
) -> HashSet<QuotedInclude> {
    let mut desired: HashSet<QuotedInclude> = HashSet::new();

    // Pool 0 (spec's "initialize the desired-include set" special cases,
    // ported from CalculateMinimalIncludes steps (1)): a use whose
    // definition-file maps back to the use's own file is a re-export, so
    // keep the existing include; a use with exactly one candidate header
    // has no real choice to make.
    for use_ in uses.iter_mut() {
        if use_.ignored || use_.kind != UseKind::Full {
            continue;
        }
        if use_.suggested_header.is_some() {
            desired.insert(use_.suggested_header.clone().unwrap());
            continue;
        }
        if use_.public_headers.len() == 1 {
            use_.suggested_header = Some(use_.public_headers[0].clone());
            desired.insert(use_.public_headers[0].clone());
        }
    }

    // The four choice pools, tried in order, for every use still unassigned.
    for use_ in uses.iter_mut() {
        if use_.ignored || use_.kind != UseKind::Full || use_.suggested_header.is_some() {
            continue;
        }
        let headers = use_.public_headers.clone();
        let pick = headers
            .iter()
            .find(|h| associated_direct_includes.contains(h))
            .or_else(|| headers.iter().find(|h| direct_includes.contains(h) && desired.contains(h)))
            .or_else(|| headers.iter().find(|h| desired.contains(h)))
            .or_else(|| headers.iter().find(|h| direct_includes.contains(h)));
        if let Some(h) = pick {
            use_.suggested_header = Some(h.clone());
            desired.insert(h.clone());
        }
    }

    // Greedy set-cover over whatever remains: repeatedly pick the header
    // satisfying the most uses, breaking ties toward headers that are
    // first-choice for the most uses, then alphabetically.
    loop {
        let unmapped: Vec<usize> = uses
            .iter()
            .enumerate()
            .filter(|(_, u)| !u.ignored && u.kind == UseKind::Full && u.suggested_header.is_none())
            .map(|(i, _)| i)
            .collect();
        if unmapped.is_empty() {
            break;
        }

        let mut counts: HashMap<QuotedInclude, (usize, usize)> = HashMap::new();
        for &i in &unmapped {
            for h in &uses[i].public_headers {
                let entry = counts.entry(h.clone()).or_insert((0, 0));
                entry.0 += 1;
                if Some(h) == uses[i].public_headers.first() {
                    entry.1 += 1;
                }
            }
        }
        let best = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(h, _)| h.clone());
        let Some(best) = best else { break };
        desired.insert(best.clone());
        for &i in &unmapped {
            if uses[i].suggested_header.is_none() && uses[i].public_headers.contains(&best) {
                uses[i].suggested_header = Some(best.clone());
            }
        }
    }

    desired
}

/// Step E: marks each use as a violation or not, once the desired set is
/// known.
fn classify_violations(
    uses: &mut [OneUse],
    decls: &DeclTable,
    registry: &FileRegistry,
    effective_direct_includes: &HashSet<QuotedInclude>,
    effective_direct_include_files: &HashSet<FileHandle>,
) {
    for use_ in uses.iter_mut() {
        if use_.ignored {
            use_.is_violation = false;
            continue;
        }
        match use_.kind {
            UseKind::ForwardDeclare => {
                let visible_elsewhere = use_.declaration.is_some_and(|d| {
                    let decl_file = decls.file(d);
                    effective_direct_include_files.contains(&decl_file)
                        || decls.visible_earlier_in_file(d, use_.use_file, &use_.use_loc, registry)
                });
                use_.is_violation = !visible_elsewhere;
            }
            UseKind::Full => {
                use_.is_violation = match &use_.suggested_header {
                    Some(h) => !effective_direct_includes.contains(h),
                    None => true,
                };
            }
        }
    }
}

fn printed_forward_decl(decls: &DeclTable, decl: DeclHandle) -> String {
    let name = decls.qualified_name(decl);
    let kw = match decls.kind(decl) {
        DeclKind::Struct => "struct",
        DeclKind::Union => "union",
        DeclKind::ClassTemplate => "template <typename> class",
        _ => "class",
    };
    if let Some((ns, base)) = name.rsplit_once("::") {
        format!("namespace {ns} {{ {kw} {base}; }}")
    } else {
        format!("{kw} {name};")
    }
}

/// Step F: reconciles `ledger.lines` with the now-finalized desired
/// includes/forward-declares, and sets `ledger.desired_includes`.
fn reconcile_lines(
    ledger: &mut PerFileLedger,
    desired_headers: HashSet<QuotedInclude>,
    decls: &DeclTable,
    effective_desired_from_associates: &HashSet<QuotedInclude>,
    registry: &FileRegistry,
) {
    for line in &mut ledger.lines {
        line.is_desired = false;
    }

    for header in &desired_headers {
        // Already provided by an associated file: don't add it here too.
        if effective_desired_from_associates.contains(header) && !ledger.direct_includes.contains(header) {
            continue;
        }
        if let Some(line) = ledger.lines.iter_mut().find(|l| l.quoted_include() == Some(header)) {
            line.is_desired = true;
        } else {
            ledger.lines.push(IncludeOrForwardDeclareLine::new_include(header.clone(), -1, -1, false));
            ledger.lines.last_mut().unwrap().is_desired = true;
        }
    }

    // A forward-declare use whose declaration's defining file is already
    // going to be included (because some full use needs it) doesn't need
    // its own forward-declare line -- it's satisfied by that #include.
    // Ported from the block in `iwyu_output.cc` that runs once include_map
    // is fully populated and annotates those lines with "(ptr only)".
    let mut ptr_only_uses: Vec<(QuotedInclude, String)> = Vec::new();
    let fwd_decl_uses: Vec<DeclHandle> = ledger
        .raw_uses
        .iter()
        .filter(|u| !u.ignored && u.kind == UseKind::ForwardDeclare && u.suggested_header.is_none())
        .filter_map(|u| {
            let decl = u.declaration?;
            let defining_header = registry.quoted(decls.file(decl)).clone();
            if desired_headers.contains(&defining_header) {
                ptr_only_uses.push((defining_header, u.short_name.clone()));
                None
            } else {
                Some(decl)
            }
        })
        .collect();
    for decl in fwd_decl_uses {
        if let Some(line) = ledger.lines.iter_mut().find(|l| matches!(&l.entry, LineEntry::ForwardDecl { decl: d, .. } if *d == decl)) {
            line.is_desired = true;
        } else {
            let printed = printed_forward_decl(decls, decl);
            let mut line = IncludeOrForwardDeclareLine::new_forward_decl(decl, printed);
            line.is_desired = true;
            ledger.lines.push(line);
        }
    }

    for line in &mut ledger.lines {
        if !line.is_desired {
            continue;
        }
        match &line.entry {
            LineEntry::Include { quoted } => {
                for use_ in &ledger.raw_uses {
                    if use_.ignored {
                        continue;
                    }
                    if use_.kind == UseKind::Full && use_.suggested_header.as_ref() == Some(quoted) {
                        line.add_symbol_use(&use_.short_name);
                    }
                }
            }
            LineEntry::ForwardDecl { decl, .. } => {
                let decl = *decl;
                for use_ in &ledger.raw_uses {
                    if use_.ignored {
                        continue;
                    }
                    if use_.declaration == Some(decl) {
                        line.add_symbol_use(&use_.short_name);
                    }
                }
            }
        }
    }

    for (header, symbol) in ptr_only_uses {
        if let Some(line) = ledger.lines.iter_mut().find(|l| l.quoted_include() == Some(&header)) {
            if !line.has_symbol_use(&symbol) {
                line.add_symbol_use(&format!("{symbol} (ptr only)"));
            }
        }
    }

    ledger.desired_includes = desired_headers;
}

/// Runs the full six-step pipeline (spec §4.9) over every file's ledger.
#[instrument(level = "debug", skip_all)]
pub fn trim_and_resolve(
    ledgers: &mut HashMap<FileHandle, PerFileLedger>,
    decls: &DeclTable,
    registry: &FileRegistry,
) {
    // Steps A-B run per-file, independently.
    for ledger in ledgers.values_mut() {
        for use_ in &mut ledger.raw_uses {
            if use_.kind == UseKind::ForwardDeclare {
                let promoted = trim_forward_declare_use(use_, decls, registry);
                if promoted {
                    trim_full_use(use_, decls, registry);
                }
            } else {
                trim_full_use(use_, decls, registry);
            }
        }
    }

    // Step C needs every file's direct_includes/desired_includes to exist
    // before any file can compute its own effective set, so we snapshot.
    let files: Vec<FileHandle> = ledgers.keys().copied().collect();
    for file in files {
        let (direct, assoc_only_direct, effective_direct) = {
            let ledger = &ledgers[&file];
            (
                ledger.direct_includes.clone(),
                associated_direct_includes(ledger, ledgers),
                effective_direct_includes(ledger, ledgers),
            )
        };
        debug!(file = ?registry.path(file), direct_count = direct.len(), "resolving file");

        let desired = {
            let ledger = ledgers.get_mut(&file).unwrap();
            calculate_minimal_includes(&direct, &assoc_only_direct, &mut ledger.raw_uses)
        };

        let assoc_direct_files: HashSet<FileHandle> = ledgers[&file]
            .associated
            .iter()
            .flat_map(|&a| ledgers.get(&a).map(|l| l.direct_include_files.clone()).unwrap_or_default())
            .chain(ledgers[&file].direct_include_files.iter().copied())
            .collect();

        {
            let ledger = ledgers.get_mut(&file).unwrap();
            classify_violations(&mut ledger.raw_uses, decls, registry, &effective_direct, &assoc_direct_files);
        }

        let effective_desired_assoc = {
            let ledger = &ledgers[&file];
            let mut out = HashSet::new();
            for &a in &ledger.associated {
                if let Some(l) = ledgers.get(&a) {
                    out.extend(l.desired_includes.iter().cloned());
                }
            }
            out
        };

        let ledger = ledgers.get_mut(&file).unwrap();
        reconcile_lines(ledger, desired, decls, &effective_desired_assoc, registry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{DeclTable, FileRegistry, SourceLocation};
    use crate::path_util::QuotedInclude;

    fn use_with_headers(
        symbol: &str,
        decl: DeclHandle,
        decl_filepath: &str,
        use_file: FileHandle,
        loc: SourceLocation,
        headers: Vec<QuotedInclude>,
    ) -> OneUse {
        let mut u = OneUse::new(symbol, symbol, decl_filepath, loc, use_file, UseKind::Full);
        u.declaration = Some(decl);
        u.public_headers = headers;
        u
    }

    #[test]
    fn single_candidate_is_chosen_without_set_cover() {
        let mut registry = FileRegistry::new();
        let use_file = registry.intern("/repo/a.cc", &[]);
        let decl_file = registry.intern("/repo/b.h", &[]);
        let mut decls = DeclTable::new();
        let loc0 = SourceLocation::new(decl_file, 1, 1);
        let d = decls.declare("Foo", DeclKind::Class, decl_file, loc0);

        let loc = SourceLocation::new(use_file, 5, 1);
        let mut uses = vec![use_with_headers("Foo", d, "/repo/b.h", use_file, loc, vec![QuotedInclude::user("b.h")])];
        let desired = calculate_minimal_includes(&HashSet::new(), &HashSet::new(), &mut uses);
        assert_eq!(desired.len(), 1);
        assert_eq!(uses[0].suggested_header, Some(QuotedInclude::user("b.h")));
    }

    #[test]
    fn set_cover_picks_header_satisfying_the_most_uses() {
        let mut registry = FileRegistry::new();
        let use_file = registry.intern("/repo/a.cc", &[]);
        let decl_file = registry.intern("/repo/b.h", &[]);
        let mut decls = DeclTable::new();
        let loc0 = SourceLocation::new(decl_file, 1, 1);
        let d1 = decls.declare("Foo", DeclKind::Class, decl_file, loc0);
        let d2 = decls.declare("Bar", DeclKind::Class, decl_file, loc0);

        let shared = QuotedInclude::user("shared.h");
        let only_foo = QuotedInclude::user("foo_only.h");
        let loc = SourceLocation::new(use_file, 5, 1);
        let mut uses = vec![
            use_with_headers("Foo", d1, "/repo/b.h", use_file, loc, vec![only_foo.clone(), shared.clone()]),
            use_with_headers("Bar", d2, "/repo/b.h", use_file, loc, vec![shared.clone()]),
        ];
        let desired = calculate_minimal_includes(&HashSet::new(), &HashSet::new(), &mut uses);
        // `shared.h` covers both uses; a minimal cover picks it over
        // needing both `foo_only.h` and `shared.h`.
        assert_eq!(desired, HashSet::from([shared]));
    }

    #[test]
    fn associated_direct_include_wins_the_first_pool() {
        let mut registry = FileRegistry::new();
        let use_file = registry.intern("/repo/a.cc", &[]);
        let decl_file = registry.intern("/repo/b.h", &[]);
        let mut decls = DeclTable::new();
        let loc0 = SourceLocation::new(decl_file, 1, 1);
        let d = decls.declare("Foo", DeclKind::Class, decl_file, loc0);

        let preferred = QuotedInclude::user("preferred.h");
        let other = QuotedInclude::user("other.h");
        let loc = SourceLocation::new(use_file, 5, 1);
        let mut uses = vec![use_with_headers("Foo", d, "/repo/b.h", use_file, loc, vec![other.clone(), preferred.clone()])];
        let assoc_direct = HashSet::from([preferred.clone()]);
        let desired = calculate_minimal_includes(&HashSet::new(), &assoc_direct, &mut uses);
        assert_eq!(desired, HashSet::from([preferred]));
    }

    #[test]
    fn no_op_diff_when_everything_already_satisfied() {
        let mut registry = FileRegistry::new();
        let use_file = registry.intern("/repo/a.cc", &[]);
        let decl_file = registry.intern("/repo/b.h", &[]);
        let mut decls = DeclTable::new();
        let loc0 = SourceLocation::new(decl_file, 1, 1);
        let d = decls.declare("Foo", DeclKind::Class, decl_file, loc0);
        let loc = SourceLocation::new(use_file, 5, 1);

        let quoted = QuotedInclude::user("b.h");
        let mut ledger = PerFileLedger::new(use_file, registry.quoted(use_file).clone());
        ledger.direct_includes.insert(quoted.clone());
        ledger.direct_include_files.insert(decl_file);
        ledger.lines.push(IncludeOrForwardDeclareLine::new_include(quoted.clone(), 1, 1, true));
        ledger.record_use(use_with_headers("Foo", d, "/repo/b.h", use_file, loc, vec![quoted.clone()]));

        let mut ledgers = HashMap::new();
        ledgers.insert(use_file, ledger);
        trim_and_resolve(&mut ledgers, &decls, &registry);

        let ledger = &ledgers[&use_file];
        assert!(ledger.raw_uses[0].is_violation == false);
        assert_eq!(ledger.desired_includes, HashSet::from([quoted]));
    }
}
