//! The external interface the scan engine consumes: how a query expresses
//! per-column predicates, and how callers answer "is this column numeric?".
//!
//! Both traits are implemented by the host application (how queries are
//! constructed and how class/property metadata is resolved are explicitly
//! out of scope for this crate); the engine only ever calls through them.

use crate::operator::{Argument, Operator};

/// Supplies, per column name, whether a query constrains it and with what
/// operator/argument.
pub trait QuerySource {
    /// Returns the predicate on `column`, if the query constrains it.
    fn predicate(&self, column: &str) -> Option<(Operator, Argument)>;
}

/// Supplies, per column name, whether the underlying property is numeric.
///
/// Class/property metadata resolution is out of scope for this crate; the
/// host supplies this answer however it resolves its own schema.
pub trait PropertySource {
    /// Returns `true` if `column`'s declared property type is numeric.
    fn is_numeric(&self, column: &str) -> bool;
}

/// A `QuerySource` with no constraints on any column. Compiling against
/// this yields every row in the file exactly once (§8 round-trip property).
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyQuery;

impl QuerySource for EmptyQuery {
    fn predicate(&self, _column: &str) -> Option<(Operator, Argument)> {
        None
    }
}
