//! External-collaborator adapters (spec §6): thin stand-ins for the real
//! front-end and preprocessor bookkeeping service the core is specified to
//! consume from, realized here with `tree-sitter`/`tree-sitter-cpp` so the
//! engine can be exercised end-to-end (see SPEC_FULL.md §2.13-14). Neither
//! adapter attempts full Clang-grade semantic analysis; both exist only to
//! feed the core real data.

pub mod cpp;
pub mod preprocessor;
