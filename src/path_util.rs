//! Path Normalizer (spec §4.1).
//!
//! Ported in behavior from `ConvertToQuotedInclude` / `GetCanonicalName` /
//! `IsHeaderFile` in `iwyu_path_util.cc`: canonicalizes filesystem paths,
//! classifies them as system vs. user, and converts a path to a quoted
//! `#include` spelling.

use std::fmt;

/// Extensions that mark a file as a translation unit rather than a header.
/// Keep in sync with any tooling that mirrors this list (cf. the comment
/// in the original `iwyu_path_util.cc` about `fix_includes.py`).
const SOURCE_EXTENSIONS: &[&str] = &[
    "c", "C", "cc", "CC", "cxx", "CXX", "cpp", "CPP", "c++", "C++", "cp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchPathKind {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSearchPath {
    pub path: String,
    pub kind: SearchPathKind,
}

impl HeaderSearchPath {
    pub fn new(path: impl Into<String>, kind: SearchPathKind) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self { path, kind }
    }
}

/// The textual form of an `#include` target, `<a/b.h>` or `"a/b.h"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuotedInclude(String);

impl QuotedInclude {
    pub fn from_quoted(spelling: impl Into<String>) -> Self {
        let spelling = spelling.into();
        debug_assert!(is_quoted_include(&spelling), "not a quoted include: {spelling}");
        Self(spelling)
    }

    pub fn system(inner: impl AsRef<str>) -> Self {
        Self(format!("<{}>", inner.as_ref()))
    }

    pub fn user(inner: impl AsRef<str>) -> Self {
        Self(format!("\"{}\"", inner.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_system(&self) -> bool {
        self.0.starts_with('<')
    }

    /// The path with surrounding `<>`/`""` stripped.
    pub fn unquoted(&self) -> &str {
        &self.0[1..self.0.len() - 1]
    }
}

impl fmt::Display for QuotedInclude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_quoted_include(s: &str) -> bool {
    if s.len() < 2 {
        return false;
    }
    (s.starts_with('<') && s.ends_with('>')) || (s.starts_with('"') && s.ends_with('"'))
}

/// Collapses `\\` to `/` and strips leading `./` components. Does not touch
/// the filesystem -- `..` is left alone, since resolving it requires
/// knowing whether intervening components are symlinks.
pub fn canonicalize(path: &str) -> String {
    let mut result = path.replace('\\', "/");
    while let Some(rest) = result.strip_prefix("./") {
        result = rest.to_string();
    }
    result
}

/// Anything not ending in a known source extension is a header.
pub fn is_header(path: &str) -> bool {
    let trimmed = path.trim_end_matches(['"', '>']);
    !SOURCE_EXTENSIONS
        .iter()
        .any(|ext| trimmed.ends_with(&format!(".{ext}")))
}

/// Converts a file path to a quoted `#include` spelling, preferring the
/// *longest* matching header-search-path prefix (so
/// `/usr/include/c++/4.4/foo` becomes `<foo>`, not `<c++/4.4/foo>`).
pub fn to_quoted(path: &str, search_paths: &[HeaderSearchPath]) -> QuotedInclude {
    let normalized = canonicalize(path);

    let mut best: Option<&HeaderSearchPath> = None;
    for sp in search_paths {
        if normalized.starts_with(&sp.path) {
            if best.is_none_or(|b| sp.path.len() > b.path.len()) {
                best = Some(sp);
            }
        }
    }

    match best {
        Some(sp) => {
            let rest = &normalized[sp.path.len()..];
            match sp.kind {
                SearchPathKind::System => QuotedInclude::system(rest),
                SearchPathKind::User => QuotedInclude::user(rest),
            }
        }
        None => QuotedInclude::user(normalized),
    }
}

/// Strips a known set of suffixes/extensions and maps `/internal/` <->
/// `/public/`, `/include/` <-> `/src/`, so implementation files can be
/// paired with their associated headers.
pub fn get_canonical_name(file_path: &str) -> String {
    let mut path = file_path.trim_matches(|c| c == '"' || c == '<' || c == '>').to_string();
    path = canonicalize(&path);

    let header_exts = [".h", ".hpp", ".hxx", ".hh", ".inl"];
    let mut stripped = false;
    for ext in header_exts {
        if let Some(rest) = path.strip_suffix(ext) {
            path = rest.to_string();
            stripped = true;
            break;
        }
    }
    if !stripped {
        for ext in SOURCE_EXTENSIONS {
            let dotted = format!(".{ext}");
            if let Some(rest) = path.strip_suffix(&dotted) {
                path = rest.to_string();
                break;
            }
        }
    }

    for suffix in ["_unittest", "_regtest", "_test"] {
        if let Some(rest) = path.strip_suffix(suffix) {
            path = rest.to_string();
            break;
        }
    }
    if let Some(rest) = path.strip_prefix("test_headercompile_") {
        path = rest.to_string();
    }
    if let Some(rest) = path.strip_suffix("-inl") {
        path = rest.to_string();
    }

    if let Some(pos) = path.find("/internal/") {
        path = format!("{}/public/{}", &path[..pos], &path[pos + "/internal/".len()..]);
    }
    if let Some(pos) = path.find("/include/") {
        path = format!("{}/src/{}", &path[..pos], &path[pos + "/include/".len()..]);
    }

    path
}

pub fn is_system_include_file(path: &str, search_paths: &[HeaderSearchPath]) -> bool {
    to_quoted(path, search_paths).is_system()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(path: &str, kind: SearchPathKind) -> HeaderSearchPath {
        HeaderSearchPath::new(path, kind)
    }

    #[test]
    fn longest_prefix_wins() {
        let paths = vec![
            sp("/usr/include/", SearchPathKind::System),
            sp("/usr/include/c++/4.4/", SearchPathKind::System),
        ];
        let quoted = to_quoted("/usr/include/c++/4.4/foo", &paths);
        assert_eq!(quoted.as_str(), "<foo>");
    }

    #[test]
    fn no_match_is_user_quoted() {
        let quoted = to_quoted("./tests/badinc-i2.h", &[]);
        assert_eq!(quoted.as_str(), "\"tests/badinc-i2.h\"");
    }

    #[test]
    fn backslashes_collapse() {
        assert_eq!(canonicalize("path\\to\\file.h"), "path/to/file.h");
    }

    #[test]
    fn header_vs_source() {
        assert!(is_header("foo.h"));
        assert!(is_header("<vector>"));
        assert!(!is_header("foo.cc"));
        assert!(!is_header("\"foo.cpp\""));
    }

    #[test]
    fn canonical_name_pairs_internal_and_public() {
        assert_eq!(
            get_canonical_name("project/internal/foo.cc"),
            "project/public/foo"
        );
        assert_eq!(
            get_canonical_name("project/include/foo.h"),
            "project/src/foo"
        );
    }

    #[test]
    fn canonical_name_strips_test_suffix() {
        assert_eq!(get_canonical_name("foo_test.cc"), "foo");
        assert_eq!(get_canonical_name("foo-inl.h"), "foo");
    }

    #[test]
    fn round_trip_quoting() {
        let paths = vec![sp("/repo/", SearchPathKind::User)];
        let quoted = to_quoted("/repo/a/b.h", &paths);
        assert_eq!(quoted.unquoted(), "a/b.h");
    }
}
