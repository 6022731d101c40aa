//! Error and warning types for the scan engine.

use std::path::PathBuf;

/// Errors that can surface from any component of the scan engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The schema view (or a config document converted into one) is invalid:
    /// missing path, invalid delimiter regex, empty or duplicate column list,
    /// a zero-length record separator, or a zero cache capacity.
    #[error("misconfigured schema view: {reason}")]
    Misconfigured {
        /// Human-readable description of what failed validation.
        reason: String,
    },

    /// Opening, seeking, or reading the underlying file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file the operation was attempted against.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The comparator factory was asked to build a comparator for an
    /// operator it does not know how to service.
    #[error("unknown operator: {operator}")]
    UnknownOperator {
        /// The operator token that had no comparator implementation.
        operator: String,
    },
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal conditions surfaced only through logging/telemetry, never
/// through a `Result`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Warning {
    /// A `between` or `in` predicate was degenerate (lo > hi, or an empty
    /// set). The comparator factory still returns a usable comparator — one
    /// that always reports "above" — but the caller likely made a mistake.
    #[error("degenerate predicate on column {column}: {reason}")]
    DegeneratePredicate {
        /// The column the predicate was built for.
        column: String,
        /// Why the predicate is considered degenerate.
        reason: String,
    },
}
