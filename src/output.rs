//! Diff Emitter (spec §4.10): renders each analyzed file's should-add/
//! should-remove/full-list sections. Ported in behavior from
//! `PrintableDiffs`/`PrintableIncludeOrForwardDeclareLine`/`GetSortKey` in
//! `examples/original_source/iwyu_output.cc`.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::ledger::{FileRegistry, IncludeOrForwardDeclareLine, LineEntry, PerFileLedger};
use crate::path_util::QuotedInclude;

/// Controls whether "should add"/"should remove" sections and per-line
/// reason comments are printed, and whether long symbol lists are
/// truncated at 80 columns (spec §6's "CLI-like surface", §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Verbosity(pub u8);

impl Verbosity {
    pub fn should_print(&self, level: u8) -> bool {
        self.0 >= level
    }
}

/// The six sort buckets from spec §4.10: 1 associated header, 2 associated
/// `-inl` header, 3 C system header, 4 C++ system header, 5 other `"..."`
/// header, 6 forward declaration.
fn sort_bucket(line: &IncludeOrForwardDeclareLine, associated: &HashSet<QuotedInclude>) -> u8 {
    let Some(quoted) = line.quoted_include() else { return 6 };
    if associated.contains(quoted) {
        return if quoted.as_str().ends_with("-inl.h\"") { 2 } else { 1 };
    }
    if quoted.as_str().ends_with(".h>") {
        3
    } else if quoted.as_str().ends_with('>') {
        4
    } else {
        5
    }
}

fn sort_key(line: &IncludeOrForwardDeclareLine, associated: &HashSet<QuotedInclude>) -> (u8, String) {
    (sort_bucket(line, associated), line.rendered_line())
}

/// Symbols sorted by decreasing use count, then alphabetically (spec
/// §4.10's comment-generation rule).
fn symbols_sorted_by_frequency(line: &IncludeOrForwardDeclareLine) -> Vec<&str> {
    let mut symbols: Vec<(&str, usize)> = line.symbol_uses.iter().map(|(s, &c)| (s.as_str(), c)).collect();
    symbols.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    symbols.into_iter().map(|(s, _)| s).collect()
}

/// Renders one include/forward-declare line with its trailing `// for ...`
/// comment, column-38-aligned, truncated at 80 columns unless `verbosity`
/// asks for the full list (spec §4.10).
fn printable_line(
    line: &IncludeOrForwardDeclareLine,
    associated: &HashSet<QuotedInclude>,
    verbosity: Verbosity,
) -> String {
    let rendered = line.rendered_line();

    if line.symbol_uses.is_empty() && !line.is_present {
        return format!("{rendered}\n");
    }
    if line.symbol_uses.is_empty() || !line.is_desired {
        return format!("{rendered}  // lines {}\n", line.line_number_string());
    }
    if let LineEntry::Include { quoted } = &line.entry {
        if associated.contains(quoted) {
            return format!("{rendered}\n");
        }
    }

    let mut retval = rendered.clone();
    let mut prefix = if rendered.len() < 38 {
        " ".repeat(38 - rendered.len())
    } else {
        String::new()
    };
    prefix.push_str("  // for ");

    let mut symbols_printed = 0usize;
    for symbol in symbols_sorted_by_frequency(line) {
        if symbol.is_empty() {
            continue;
        }
        if verbosity.should_print(3) || retval.len() + prefix.len() + symbol.len() <= 74 {
            retval.push_str(&prefix);
            retval.push_str(symbol);
            symbols_printed += 1;
            prefix = ", ".to_string();
        } else {
            if symbols_printed > 0 {
                retval.push_str(", etc");
            }
            break;
        }
    }
    retval.push('\n');
    retval
}

/// Renders the full three-section diff for one file, or the single
/// "has correct #includes/fwd-decls" line if nothing changed (spec §4.10,
/// §8's "no-op diffs" property).
pub fn printable_diff(ledger: &PerFileLedger, registry: &FileRegistry, verbosity: Verbosity) -> String {
    let associated_quoted: HashSet<QuotedInclude> =
        ledger.associated.iter().map(|&f| registry.quoted(f).clone()).collect();
    printable_diff_with_associated_quoted(ledger, &associated_quoted, verbosity)
}

/// As [`printable_diff`], but takes the quoted-include spellings of this
/// file's associated files directly (useful for tests that have no
/// [`FileRegistry`] entry for the associated file).
pub fn printable_diff_with_associated_quoted(
    ledger: &PerFileLedger,
    associated_quoted: &HashSet<QuotedInclude>,
    verbosity: Verbosity,
) -> String {
    let filename = ledger.quoted_name.as_str();

    let mut sorted: Vec<&IncludeOrForwardDeclareLine> = ledger.lines.iter().collect();
    sorted.sort_by(|a, b| sort_key(a, associated_quoted).cmp(&sort_key(b, associated_quoted)));

    let no_adds_or_deletes = sorted
        .iter()
        .all(|l| (l.is_desired == l.is_present) || (!l.is_desired && !l.is_present));
    if no_adds_or_deletes {
        return format!("\n({filename} has correct #includes/fwd-decls)\n");
    }

    let mut out = String::new();
    if verbosity.should_print(1) {
        let _ = writeln!(out, "\n{filename} should add these lines:");
        for line in &sorted {
            if line.is_desired && !line.is_present {
                out.push_str(&printable_line(line, associated_quoted, verbosity));
            }
        }
    }
    if verbosity.should_print(1) {
        let _ = writeln!(out, "\n{filename} should remove these lines:");
        for line in &sorted {
            if line.is_present && !line.is_desired {
                out.push_str("- ");
                out.push_str(&printable_line(line, associated_quoted, verbosity));
            }
        }
    }
    if verbosity.should_print(0) {
        let _ = writeln!(out, "\nThe full include-list for {filename}:");
        for line in &sorted {
            if line.is_desired {
                out.push_str(&printable_line(line, associated_quoted, verbosity));
            }
        }
    }
    out.push_str("---\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{FileRegistry, PerFileLedger};

    fn include_line(path: &str, present: bool, desired: bool, symbols: &[&str]) -> IncludeOrForwardDeclareLine {
        let mut line = IncludeOrForwardDeclareLine::new_include(QuotedInclude::user(path), if present { 1 } else { -1 }, if present { 1 } else { -1 }, present);
        line.is_desired = desired;
        for s in symbols {
            line.add_symbol_use(s);
        }
        line
    }

    #[test]
    fn no_op_when_present_matches_desired() {
        let mut registry = FileRegistry::new();
        let f = registry.intern("/repo/a.cc", &[]);
        let mut ledger = PerFileLedger::new(f, registry.quoted(f).clone());
        let mut line = include_line("b.h", true, true, &["Foo"]);
        line.is_present = true;
        ledger.lines.push(line);
        let out = printable_diff(&ledger, &registry, Verbosity(1));
        assert!(out.contains("has correct #includes/fwd-decls"));
    }

    #[test]
    fn adds_and_removes_are_both_reported() {
        let mut registry = FileRegistry::new();
        let f = registry.intern("/repo/a.cc", &[]);
        let mut ledger = PerFileLedger::new(f, registry.quoted(f).clone());
        ledger.lines.push(include_line("new.h", false, true, &["Foo"]));
        ledger.lines.push(include_line("old.h", true, false, &[]));
        let out = printable_diff(&ledger, &registry, Verbosity(1));
        assert!(out.contains("should add these lines"));
        assert!(out.contains("#include \"new.h\""));
        assert!(out.contains("should remove these lines"));
        assert!(out.contains("- #include \"old.h\""));
        assert!(out.ends_with("---\n"));
    }

    #[test]
    fn long_symbol_lists_truncate_with_etc_at_low_verbosity() {
        let mut registry = FileRegistry::new();
        let f = registry.intern("/repo/a.cc", &[]);
        let mut ledger = PerFileLedger::new(f, registry.quoted(f).clone());
        let many: Vec<String> = (0..40).map(|i| format!("VeryLongSymbolName{i}")).collect();
        let refs: Vec<&str> = many.iter().map(String::as_str).collect();
        ledger.lines.push(include_line("new.h", false, true, &refs));
        let out = printable_diff(&ledger, &registry, Verbosity(1));
        assert!(out.contains(", etc"));
    }

    #[test]
    fn sort_buckets_order_c_before_cpp_before_user_before_fwd_decl() {
        let mut registry = FileRegistry::new();
        let f = registry.intern("/repo/a.cc", &[]);
        let mut ledger = PerFileLedger::new(f, registry.quoted(f).clone());
        ledger.lines.push(include_line("other.h", false, true, &["X"]));
        let mut c_line = IncludeOrForwardDeclareLine::new_include(QuotedInclude::system("stdio.h"), -1, -1, false);
        c_line.is_desired = true;
        c_line.add_symbol_use("printf");
        ledger.lines.push(c_line);
        let mut cpp_line = IncludeOrForwardDeclareLine::new_include(QuotedInclude::system("vector"), -1, -1, false);
        cpp_line.is_desired = true;
        cpp_line.add_symbol_use("vector");
        ledger.lines.push(cpp_line);
        let out = printable_diff(&ledger, &registry, Verbosity(1));
        let stdio_pos = out.find("<stdio.h>").unwrap();
        let vector_pos = out.find("<vector>").unwrap();
        let other_pos = out.find("\"other.h\"").unwrap();
        assert!(stdio_pos < vector_pos);
        assert!(vector_pos < other_pos);
    }
}
