//! Full-Use Cache (spec §4.5): remembers, for one entity instantiated under
//! one particular resugaring, which types and declarations it caused to be
//! reported as fully used last time it was analyzed -- so the Replayer
//! never has to re-walk a template body it has already scanned under an
//! equivalent set of type arguments.

use std::collections::{HashMap, HashSet};

use crate::ast::TypeRef;
use crate::ledger::DeclHandle;

/// The resugaring an entity was instantiated under: the template arguments
/// in play, compared structurally since there is no stable pointer
/// identity across instantiations in this model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypesOfInterest(Vec<String>);

impl TypesOfInterest {
    pub fn from_args(args: &[TypeRef]) -> Self {
        Self(args.iter().map(|t| t.name.clone()).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    entity: DeclHandle,
    types_of_interest: TypesOfInterest,
}

#[derive(Debug, Clone, Default)]
pub struct CachedUses {
    pub types: HashSet<String>,
    pub decls: HashSet<DeclHandle>,
}

/// Entity -> resugar -> previously-reported uses.
#[derive(Debug, Default)]
pub struct FullUseCache {
    entries: HashMap<CacheKey, CachedUses>,
    precomputed: HashMap<&'static str, CachedUses>,
    /// Currently open `CacheStoringScope`s, innermost last. A report made
    /// while scopes are open is credited to every open scope, which is how
    /// a nested scope's uses roll up to all of its enclosing callers.
    open_scopes: Vec<(CacheKey, CachedUses)>,
}

/// Standard-library container templates whose instantiation requirements
/// are known in closed form, so a cache lookup can shortcut a full replay
/// (spec §4.5's "precomputed sub-cache").
const PRECOMPUTED_CONTAINERS: &[&str] = &[
    "std::vector", "std::deque", "std::list", "std::set", "std::map",
    "std::multiset", "std::multimap", "std::unordered_set", "std::unordered_map",
];

impl FullUseCache {
    pub fn new() -> Self {
        let mut precomputed = HashMap::new();
        for &name in PRECOMPUTED_CONTAINERS {
            precomputed.insert(name, CachedUses::default());
        }
        Self { entries: HashMap::new(), precomputed, open_scopes: Vec::new() }
    }

    pub fn is_precomputed(&self, template_name: &str) -> bool {
        self.precomputed.contains_key(template_name)
    }

    /// Returns the template arguments a precomputed container template
    /// fully uses, given all its arguments -- i.e. everything except those
    /// the library header itself already provides (spec §4.5). The simple
    /// containers here require full types of every argument; allocator and
    /// comparator defaults are elided by the caller before reaching this
    /// point, matching upstream's treatment of `std::vector<T, Alloc>`.
    pub fn precomputed_requirements(&self, template_name: &str, args: &[TypeRef]) -> Option<Vec<TypeRef>> {
        if self.is_precomputed(template_name) {
            Some(args.to_vec())
        } else {
            None
        }
    }

    pub fn get(&self, entity: DeclHandle, types_of_interest: &TypesOfInterest) -> Option<&CachedUses> {
        self.entries.get(&CacheKey { entity, types_of_interest: types_of_interest.clone() })
    }

    pub fn store(&mut self, entity: DeclHandle, types_of_interest: TypesOfInterest, uses: CachedUses) {
        self.entries.insert(CacheKey { entity, types_of_interest }, uses);
    }
}

/// RAII-style recorder (spec §4.5): while alive, every reported use is
/// appended to a pending record instead of (or in addition to) being
/// emitted directly; on drop the accumulated record is written back to the
/// cache under the entity/resugar key it was opened for. Nested scopes
/// roll their uses up into every enclosing scope, so a caller is credited
/// with all of its callees' transitive uses too.
pub struct CacheStoringScope<'a> {
    cache: &'a mut FullUseCache,
    /// Index of this scope's frame in `cache.open_scopes`.
    depth: usize,
}

impl<'a> CacheStoringScope<'a> {
    pub fn new(cache: &'a mut FullUseCache, entity: DeclHandle, types_of_interest: TypesOfInterest) -> Self {
        let depth = cache.open_scopes.len();
        cache.open_scopes.push((CacheKey { entity, types_of_interest }, CachedUses::default()));
        Self { cache, depth }
    }

    /// Opens a nested scope. Uses recorded through it are credited to it
    /// and to every scope still open above it on the stack.
    pub fn nested(&mut self, entity: DeclHandle, types_of_interest: TypesOfInterest) -> CacheStoringScope<'_> {
        CacheStoringScope::new(self.cache, entity, types_of_interest)
    }

    pub fn record_type(&mut self, type_name: impl Into<String>) {
        let type_name = type_name.into();
        for (_, pending) in &mut self.cache.open_scopes {
            pending.types.insert(type_name.clone());
        }
    }

    pub fn record_decl(&mut self, decl: DeclHandle) {
        for (_, pending) in &mut self.cache.open_scopes {
            pending.decls.insert(decl);
        }
    }
}

impl Drop for CacheStoringScope<'_> {
    fn drop(&mut self) {
        debug_assert_eq!(self.cache.open_scopes.len(), self.depth + 1, "CacheStoringScope dropped out of order");
        let (key, uses) = self.cache.open_scopes.pop().expect("scope frame present");
        self.cache.entries.insert(key, uses);
    }
}
