//! CLI driver (SPEC_FULL.md §2.17), grounded on the teacher's `main.rs`
//! `clap::Parser` surface and `run()` shape. Walks a project directory with
//! `ignore::WalkBuilder` (the way the teacher's repo depends on the `ignore`
//! crate for its own project walk), analyzes every translation unit it
//! finds, and prints the Diff Emitter's output for each. Exit code reflects
//! whether any file had an iwyu violation (spec §7), not whether warnings
//! were logged.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use iwyu_core::config::AnalysisContext;
use iwyu_core::output::{printable_diff, Verbosity};
use iwyu_core::path_util;
use iwyu_core::{analyze_file, has_violations};

#[derive(Parser)]
#[command(about = "Include-what-you-use style include-dependency analyzer for C/C++ translation units.")]
struct Cli {
    /// Path to a translation unit or a project directory to walk.
    project_path: PathBuf,

    /// Optional JSON config file (header search paths, extra mappings).
    #[arg(long)]
    config: Option<PathBuf>,

    /// 0 = final include list only, 1 = also add/remove sections (default),
    /// 3 = untruncated "// for ..." symbol comments (spec §4.10, §6).
    #[arg(short, long, default_value_t = 1)]
    verbosity: u8,
}

/// Every translation unit reachable under `path`: `path` itself if it's a
/// single file, or every non-header source file `ignore::WalkBuilder` finds
/// under it otherwise (headers are analyzed transitively, as includes of
/// some translation unit, never as entry points of their own).
fn source_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    ignore::WalkBuilder::new(path)
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .filter(|p| !path_util::is_header(&p.to_string_lossy()))
        .collect()
}

fn run(path: PathBuf, ctx: &AnalysisContext) -> iwyu_core::error::Result<bool> {
    let mut any_violations = false;
    for entry in source_files(&path) {
        let result = analyze_file(&entry, ctx)?;
        if has_violations(&result) {
            any_violations = true;
        }
        for &file in &result.discovery_order {
            let Some(ledger) = result.ledgers.get(&file) else { continue };
            print!("{}", printable_diff(ledger, &result.registry, ctx.verbosity));
        }
    }
    Ok(any_violations)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Cli::parse();

    if !args.project_path.exists() {
        eprintln!("iwyu-core error: path does not exist: {}", args.project_path.display());
        return ExitCode::FAILURE;
    }

    let verbosity = Verbosity(args.verbosity);
    let ctx = match &args.config {
        Some(config_path) => match AnalysisContext::load(config_path, verbosity) {
            Ok(ctx) => ctx,
            Err(e) => {
                eprintln!("iwyu-core error: failed to load {}: {e}", config_path.display());
                return ExitCode::FAILURE;
            }
        },
        None => AnalysisContext::new(Vec::new(), verbosity),
    };

    match run(args.project_path, &ctx) {
        Ok(true) => ExitCode::FAILURE,
        Ok(false) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "analysis aborted");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_files_excludes_headers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.cc"), "").unwrap();
        std::fs::write(dir.path().join("a.h"), "").unwrap();
        let found = source_files(dir.path());
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("a.cc"));
    }

    #[test]
    fn single_file_path_is_returned_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.cc");
        std::fs::write(&file, "").unwrap();
        assert_eq!(source_files(&file), vec![file]);
    }
}
