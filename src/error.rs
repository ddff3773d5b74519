//! Error taxonomy for the analysis engine (spec §7).
//!
//! `InvariantViolation`, `CycleInMapping` and `PickerAlreadyFinalized` are
//! fatal: they indicate a programmer error in the engine itself and are
//! propagated with `?` all the way to `main`, which logs and aborts.
//! `UnsupportedInput` and `MissingSymbol` are *not* represented here -- per
//! spec §7 they never abort analysis, so they are recorded as data on the
//! use/ledger instead (see `ledger::OneUse::unsupported` and
//! `decl_filepath`).

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error("cycle in include mapping at key {0:?}")]
    CycleInMapping(String),

    #[error("include picker mutated after finalize()")]
    PickerAlreadyFinalized,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
