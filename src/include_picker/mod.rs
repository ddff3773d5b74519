//! Include Picker (spec §4.2).
//!
//! Owns a mapping from private header paths / symbol names to one-or-more
//! public header spellings, closed transitively the way
//! `MakeTransitiveIncludeMap`/`AugmentValuesForKey` close the static maps
//! in `iwyu_include_picker.cc`, plus a dynamic map learned at runtime from
//! observed `#include` chains.

mod static_maps;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::error::{AnalysisError, Result};
use crate::path_util::{self, HeaderSearchPath, QuotedInclude};

fn unquote(value: &str) -> &str {
    if path_util::is_quoted_include(value) {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// DFS expansion of one `(key, value)` pair of the basic map, following
/// private re-exports and collecting every public header reached along
/// the way. Mirrors `AugmentValuesForKey`.
fn augment_values_for_key(
    map: &IndexMap<String, Vec<String>>,
    key: &str,
    value: &str,
    seen_keys: &[String],
    out: &mut Vec<String>,
) -> Result<()> {
    if seen_keys.iter().any(|k| k == key) {
        return Err(AnalysisError::CycleInMapping(key.to_string()));
    }
    let new_key = unquote(value);
    if new_key != value {
        // `value` was quoted: it's a legitimate public header.
        if !out.contains(&value.to_string()) {
            out.push(value.to_string());
        }
    }
    if new_key != key {
        let mut new_seen = seen_keys.to_vec();
        new_seen.push(key.to_string());
        if let Some(children) = map.get(new_key) {
            for child_value in children.clone() {
                augment_values_for_key(map, new_key, &child_value, &new_seen, out)?;
            }
        }
    }
    Ok(())
}

/// Computes the transitive closure of a basic include map, the way
/// `MakeTransitiveIncludeMap` does: walks every `(key, value)` pair,
/// following private re-exports, and keeps only the public headers
/// reached, deduplicated but order-preserving per key.
fn make_transitive_include_map(basic: &IndexMap<String, Vec<String>>) -> Result<IndexMap<String, Vec<String>>> {
    let mut retval: IndexMap<String, Vec<String>> = IndexMap::new();
    for (key, values) in basic {
        let mut all_values = Vec::new();
        for value in values {
            augment_values_for_key(basic, key, value, &[], &mut all_values)?;
        }
        if !all_values.is_empty() {
            retval.insert(key.clone(), all_values);
        }
    }
    Ok(retval)
}

fn map_from_entries(entries: &[static_maps::RawEntry]) -> IndexMap<String, Vec<String>> {
    let mut map: IndexMap<String, Vec<String>> = IndexMap::new();
    for (key, value) in entries {
        let entry = map.entry(key.to_string()).or_default();
        if !entry.iter().any(|v| v == value) {
            entry.push(value.to_string());
        }
    }
    map
}

/// A header is treated as private if it lives under a conventionally
/// implementation-only directory, or is a GCC `.tcc` internal include.
/// Generalizes `iwyu_include_picker.cc`'s ad hoc per-entry annotations
/// into one predicate, since this crate has no single vendor's directory
/// layout to hardcode.
fn looks_private(path: &str) -> bool {
    path.contains("/internal/") || path.starts_with("bits/") || path.ends_with(".tcc")
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Owns the private->public header mapping database (spec §4.2). Has a
/// two-phase lifecycle: mutate via `add_direct_include`/`add_mapping`,
/// then `finalize()`, after which mutation is a programmer error (spec
/// §5: "a mutation attempt ... fails with `PickerAlreadyFinalized`").
#[derive(Debug)]
pub struct IncludePicker {
    c_map: IndexMap<String, Vec<String>>,
    cpp_map: IndexMap<String, Vec<String>>,
    third_party_map: IndexMap<String, Vec<String>>,
    symbol_map: IndexMap<String, Vec<String>>,
    dynamic_map: IndexMap<String, Vec<String>>,
    frozen: bool,
}

/// The static maps are fixed, read-only data known at link time; closing
/// them transitively is pure overhead if redone for every [`IncludePicker`]
/// built in a process (a long-running driver analyzes many translation
/// units per invocation). `Lazy` builds each one once and shares it across
/// every `IncludePicker::new()` call, the same role the teacher's `lazy_static`
/// maps played process-wide in its config.
static C_MAP: Lazy<IndexMap<String, Vec<String>>> = Lazy::new(|| {
    make_transitive_include_map(&map_from_entries(static_maps::C_INCLUDE_MAP)).expect("static C include map must not contain cycles")
});
static CPP_MAP: Lazy<IndexMap<String, Vec<String>>> = Lazy::new(|| {
    make_transitive_include_map(&map_from_entries(static_maps::CPP_INCLUDE_MAP)).expect("static C++ include map must not contain cycles")
});
static THIRD_PARTY_MAP: Lazy<IndexMap<String, Vec<String>>> = Lazy::new(|| map_from_entries(static_maps::THIRD_PARTY_PREFIX_MAP));
static SYMBOL_MAP: Lazy<IndexMap<String, Vec<String>>> = Lazy::new(|| map_from_entries(static_maps::SYMBOL_MAP));

impl IncludePicker {
    pub fn new() -> Result<Self> {
        Ok(Self {
            c_map: C_MAP.clone(),
            cpp_map: CPP_MAP.clone(),
            third_party_map: THIRD_PARTY_MAP.clone(),
            symbol_map: SYMBOL_MAP.clone(),
            dynamic_map: IndexMap::new(),
            frozen: false,
        })
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.frozen {
            Err(AnalysisError::PickerAlreadyFinalized)
        } else {
            Ok(())
        }
    }

    /// Learns a mapping from one observed `#include` chain (spec §4.2):
    /// if `included` is private and `includer` is not, `included` is
    /// exposed publicly through `includer`. If both are private, record a
    /// private-to-private hop so the chain can still be followed later.
    pub fn add_direct_include(&mut self, includer_path: &str, includer_quoted: &QuotedInclude, included_path: &str) -> Result<()> {
        self.ensure_mutable()?;
        let included_private = looks_private(included_path);
        let includer_private = looks_private(includer_path);
        if included_private && !includer_private {
            self.dynamic_map
                .entry(included_path.to_string())
                .or_default()
                .push(includer_quoted.as_str().to_string());
        } else if included_private && includer_private {
            self.dynamic_map
                .entry(included_path.to_string())
                .or_default()
                .push(basename(includer_path).to_string());
        }
        Ok(())
    }

    pub fn add_mapping(&mut self, private_header: &str, public_header: &QuotedInclude) -> Result<()> {
        self.ensure_mutable()?;
        self.dynamic_map
            .entry(private_header.to_string())
            .or_default()
            .push(public_header.as_str().to_string());
        Ok(())
    }

    pub fn finalize(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        self.dynamic_map = make_transitive_include_map(&self.dynamic_map)?;
        self.frozen = true;
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.frozen
    }

    pub fn headers_for_symbol(&self, name: &str) -> Vec<QuotedInclude> {
        self.symbol_map
            .get(name)
            .map(|vs| vs.iter().map(|v| QuotedInclude::from_quoted(v.clone())).collect())
            .unwrap_or_default()
    }

    /// Normalizes `path`, dispatches to the matching static map (C++ if a
    /// known libstdc++-private path, third-party if under a recorded
    /// prefix, otherwise C), falls back to the dynamic map, and finally
    /// falls back to `path` quoted as-is (spec §4.2).
    pub fn headers_for_path(&self, path: &str, search_paths: &[HeaderSearchPath]) -> Vec<QuotedInclude> {
        let normalized = path_util::canonicalize(path);

        if let Some(values) = self.cpp_map.get(&normalized) {
            return values.iter().map(|v| QuotedInclude::from_quoted(v.clone())).collect();
        }

        if let Some((_, values)) = self
            .third_party_map
            .iter()
            .find(|(prefix, _)| normalized.starts_with(prefix.as_str()))
        {
            return values.iter().map(|v| QuotedInclude::from_quoted(v.clone())).collect();
        }

        if let Some(values) = self.c_map.get(&normalized) {
            return values.iter().map(|v| QuotedInclude::from_quoted(v.clone())).collect();
        }

        if let Some(values) = self.dynamic_map.get(&normalized) {
            return values.iter().map(|v| QuotedInclude::from_quoted(v.clone())).collect();
        }

        vec![path_util::to_quoted(&normalized, search_paths)]
    }

    pub fn public_header_provides(
        &self,
        includer_path: &str,
        includee_path: &str,
        search_paths: &[HeaderSearchPath],
    ) -> bool {
        let includer_quoted = path_util::to_quoted(includer_path, search_paths);
        self.headers_for_path(includee_path, search_paths)
            .iter()
            .any(|h| *h == includer_quoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_util::SearchPathKind;

    #[test]
    fn transitivity_holds_for_private_chains() {
        let picker = IncludePicker::new().unwrap();
        let via_private = picker.headers_for_path("bits/stl_vector.h", &[]);
        let via_private2 = picker.headers_for_path("bits/stl_bvector.h", &[]);
        assert!(via_private.contains(&QuotedInclude::system("vector")));
        // bits/stl_vector.h -> bits/stl_bvector.h -> <vector>, so the
        // transitive closure must reach <vector> too.
        assert!(via_private2.contains(&QuotedInclude::system("vector")));
    }

    #[test]
    fn frozen_picker_rejects_mutation() {
        let mut picker = IncludePicker::new().unwrap();
        picker.finalize().unwrap();
        let err = picker.add_mapping("foo/bar.h", &QuotedInclude::system("bar")).unwrap_err();
        assert!(matches!(err, AnalysisError::PickerAlreadyFinalized));
    }

    #[test]
    fn dynamic_learning_exposes_private_header() {
        let mut picker = IncludePicker::new().unwrap();
        let search_paths = vec![HeaderSearchPath::new("/repo/", SearchPathKind::User)];
        let includer_quoted = path_util::to_quoted("/repo/public/foo.h", &search_paths);
        picker
            .add_direct_include("public/foo.h", &includer_quoted, "internal/foo_impl.h")
            .unwrap();
        picker.finalize().unwrap();
        let headers = picker.headers_for_path("internal/foo_impl.h", &search_paths);
        assert_eq!(headers, vec![includer_quoted]);
    }

    #[test]
    fn symbol_lookup_is_exact() {
        let picker = IncludePicker::new().unwrap();
        assert_eq!(picker.headers_for_symbol("std::swap"), vec![QuotedInclude::system("utility")]);
        assert!(picker.headers_for_symbol("not::a::symbol").is_empty());
    }

    #[test]
    fn fallback_quotes_path_as_is() {
        let picker = IncludePicker::new().unwrap();
        let headers = picker.headers_for_path("totally/unknown/path.h", &[]);
        assert_eq!(headers, vec![QuotedInclude::user("totally/unknown/path.h")]);
    }
}
