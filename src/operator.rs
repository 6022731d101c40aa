//! Query operators and their arguments.

use crate::error::Error;

/// A predicate operator, as named in the operator table (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    Between,
    In,
    Like,
    True,
    False,
}

impl Operator {
    /// Parses the conventional token spelling of an operator.
    pub fn parse(token: &str) -> Result<Self, Error> {
        Ok(match token {
            "=" => Self::Eq,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "between" => Self::Between,
            "in" => Self::In,
            "like" => Self::Like,
            "true" => Self::True,
            "false" => Self::False,
            other => {
                return Err(Error::UnknownOperator {
                    operator: other.to_string(),
                });
            }
        })
    }
}

/// The argument bound to an operator. Scalars and sets are carried as
/// strings; numeric interpretation happens at comparator-build time once we
/// know whether the column's property type is numeric (§4.2).
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// No argument (`true`, `false`).
    None,
    /// A single scalar value (`=`, `<`, `<=`, `>`, `>=`, `like`).
    Scalar(String),
    /// An inclusive `[lo, hi]` range (`between`).
    Range(String, String),
    /// An unordered set of candidate values (`in`).
    Set(Vec<String>),
}
