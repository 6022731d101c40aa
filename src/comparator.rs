//! The comparator factory: compiles (property type, operator, argument)
//! into a three-valued comparator over a row cell (§4.2).

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use regex::Regex;

use crate::error::{Error, Warning};
use crate::operator::{Argument, Operator};
use crate::value::Row;

/// The three-valued verdict a comparator returns for the current row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The cell satisfies the predicate.
    Match,
    /// The cell fails the predicate; on a sorted column this means "keep
    /// scanning forward, the target region hasn't been reached yet".
    Below,
    /// The cell fails the predicate; on a sorted column this means "no
    /// further row in sort order can match".
    Above,
}

/// A cell value resolved to either its numeric or string interpretation,
/// decided once at comparator-build time.
#[derive(Debug, Clone)]
enum Scalar {
    Num(f64),
    Str(String),
}

impl Scalar {
    fn cmp(&self, other: &Scalar) -> Ordering {
        match (self, other) {
            (Scalar::Num(a), Scalar::Num(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Scalar::Str(a), Scalar::Str(b)) => a.cmp(b),
            // Mixed variants only happen if a cell fails to parse under a
            // numeric predicate; fall back to string comparison of both.
            (a, b) => a.as_str().cmp(&b.as_str()),
        }
    }

    fn as_str(&self) -> String {
        match self {
            Scalar::Num(n) => n.to_string(),
            Scalar::Str(s) => s.clone(),
        }
    }

    fn from_cell(cell: &str, numeric: bool) -> Scalar {
        if numeric {
            if let Ok(n) = cell.trim().parse::<f64>() {
                return Scalar::Num(n);
            }
        }
        Scalar::Str(cell.to_string())
    }
}

fn parses_numeric(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

/// Whether numeric semantics apply: the column's property type is numeric
/// *and* every argument value parses as numeric (§4.2).
fn numeric_mode(is_numeric: bool, argument: &Argument) -> bool {
    if !is_numeric {
        return false;
    }
    match argument {
        Argument::None => true,
        Argument::Scalar(s) => parses_numeric(s).is_some(),
        Argument::Range(lo, hi) => parses_numeric(lo).is_some() && parses_numeric(hi).is_some(),
        Argument::Set(values) => values.iter().all(|v| parses_numeric(v).is_some()),
    }
}

fn scalar_of(value: &str, numeric: bool) -> Scalar {
    Scalar::from_cell(value, numeric)
}

fn is_truthy(cell: &str) -> bool {
    !matches!(
        cell.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no"
    )
}

/// The compiled form of one operator/argument pair, with all parsing and
/// pattern compilation done once, up front.
enum CompiledPredicate {
    Eq(Scalar),
    Lt(Scalar),
    Le(Scalar),
    Gt(Scalar),
    Ge(Scalar),
    Between(Scalar, Scalar),
    In {
        sorted: Vec<Scalar>,
        min: Scalar,
        max: Scalar,
    },
    Like(Regex),
    True,
    False,
    /// A degenerate `between`/`in` predicate: always reports `Above`.
    AlwaysAbove,
}

/// A comparator closed over a shared reference to the row currently being
/// evaluated. The same `Comparator` instance is reused across every row of
/// a scan; only the row cell backing it changes.
pub struct Comparator {
    row: Rc<RefCell<Row>>,
    column: usize,
    predicate: CompiledPredicate,
}

impl Comparator {
    /// Evaluates the predicate against the current contents of the shared
    /// row cell at `self.column`.
    pub fn evaluate(&self) -> Verdict {
        let row = self.row.borrow();
        let cell = row.get(self.column).map(String::as_str).unwrap_or("");

        match &self.predicate {
            CompiledPredicate::Eq(arg) => match scalar_of(cell, matches!(arg, Scalar::Num(_))).cmp(arg) {
                Ordering::Equal => Verdict::Match,
                Ordering::Less => Verdict::Below,
                Ordering::Greater => Verdict::Above,
            },
            CompiledPredicate::Lt(arg) => {
                if scalar_of(cell, matches!(arg, Scalar::Num(_))).cmp(arg) == Ordering::Less {
                    Verdict::Match
                } else {
                    Verdict::Above
                }
            }
            CompiledPredicate::Le(arg) => {
                if scalar_of(cell, matches!(arg, Scalar::Num(_))).cmp(arg) != Ordering::Greater {
                    Verdict::Match
                } else {
                    Verdict::Above
                }
            }
            CompiledPredicate::Gt(arg) => {
                if scalar_of(cell, matches!(arg, Scalar::Num(_))).cmp(arg) == Ordering::Greater {
                    Verdict::Match
                } else {
                    Verdict::Below
                }
            }
            CompiledPredicate::Ge(arg) => {
                if scalar_of(cell, matches!(arg, Scalar::Num(_))).cmp(arg) != Ordering::Less {
                    Verdict::Match
                } else {
                    Verdict::Below
                }
            }
            CompiledPredicate::Between(lo, hi) => {
                let numeric = matches!(lo, Scalar::Num(_));
                let value = scalar_of(cell, numeric);
                if value.cmp(lo) == Ordering::Less {
                    Verdict::Below
                } else if value.cmp(hi) == Ordering::Greater {
                    Verdict::Above
                } else {
                    Verdict::Match
                }
            }
            CompiledPredicate::In { sorted, min, max } => {
                let numeric = matches!(min, Scalar::Num(_));
                let value = scalar_of(cell, numeric);
                if value.cmp(min) == Ordering::Less {
                    Verdict::Below
                } else if value.cmp(max) == Ordering::Greater {
                    Verdict::Above
                } else if sorted.iter().any(|s| s.cmp(&value) == Ordering::Equal) {
                    Verdict::Match
                } else {
                    Verdict::Below
                }
            }
            CompiledPredicate::Like(re) => {
                if re.is_match(cell) {
                    Verdict::Match
                } else {
                    Verdict::Above
                }
            }
            CompiledPredicate::True => {
                if is_truthy(cell) {
                    Verdict::Match
                } else {
                    Verdict::Above
                }
            }
            CompiledPredicate::False => {
                if !is_truthy(cell) {
                    Verdict::Match
                } else {
                    Verdict::Above
                }
            }
            CompiledPredicate::AlwaysAbove => Verdict::Above,
        }
    }
}

/// Builds a comparator for `column` given the property's numeric-ness, the
/// operator, and its argument. Returns the comparator plus an optional
/// warning (only ever [`Warning::DegeneratePredicate`]).
///
/// `row` is the shared cell the iterator rewrites before each pull; the
/// same `Comparator` observes every row of the scan through it.
pub fn build_comparator(
    row: Rc<RefCell<Row>>,
    column: usize,
    column_name: &str,
    is_numeric: bool,
    operator: Operator,
    argument: Argument,
) -> Result<(Comparator, Option<Warning>), Error> {
    let numeric = numeric_mode(is_numeric, &argument);
    let mut warning = None;

    let predicate = match operator {
        Operator::Eq => CompiledPredicate::Eq(scalar_from_argument(&argument, numeric)),
        Operator::Lt => CompiledPredicate::Lt(scalar_from_argument(&argument, numeric)),
        Operator::Le => CompiledPredicate::Le(scalar_from_argument(&argument, numeric)),
        Operator::Gt => CompiledPredicate::Gt(scalar_from_argument(&argument, numeric)),
        Operator::Ge => CompiledPredicate::Ge(scalar_from_argument(&argument, numeric)),
        Operator::Between => {
            let Argument::Range(lo, hi) = &argument else {
                return Err(Error::Misconfigured {
                    reason: "between requires a [lo, hi] range argument".into(),
                });
            };
            let lo_scalar = Scalar::from_cell(lo, numeric);
            let hi_scalar = Scalar::from_cell(hi, numeric);
            if lo_scalar.cmp(&hi_scalar) == Ordering::Greater {
                warning = Some(Warning::DegeneratePredicate {
                    column: column_name.to_string(),
                    reason: format!("between lo={lo} > hi={hi}"),
                });
                CompiledPredicate::AlwaysAbove
            } else {
                CompiledPredicate::Between(lo_scalar, hi_scalar)
            }
        }
        Operator::In => {
            let Argument::Set(values) = &argument else {
                return Err(Error::Misconfigured {
                    reason: "in requires a set argument".into(),
                });
            };
            if values.is_empty() {
                warning = Some(Warning::DegeneratePredicate {
                    column: column_name.to_string(),
                    reason: "in with an empty set".into(),
                });
                CompiledPredicate::AlwaysAbove
            } else {
                let mut sorted: Vec<Scalar> =
                    values.iter().map(|v| Scalar::from_cell(v, numeric)).collect();
                sorted.sort_by(Scalar::cmp);
                let min = sorted.first().expect("non-empty").clone_for_bound();
                let max = sorted.last().expect("non-empty").clone_for_bound();
                CompiledPredicate::In { sorted, min, max }
            }
        }
        Operator::Like => {
            let Argument::Scalar(pattern) = &argument else {
                return Err(Error::Misconfigured {
                    reason: "like requires a scalar pattern argument".into(),
                });
            };
            let re = Regex::new(pattern).map_err(|e| Error::Misconfigured {
                reason: format!("invalid like pattern {pattern:?}: {e}"),
            })?;
            CompiledPredicate::Like(re)
        }
        Operator::True => CompiledPredicate::True,
        Operator::False => CompiledPredicate::False,
    };

    Ok((
        Comparator {
            row,
            column,
            predicate,
        },
        warning,
    ))
}

fn scalar_from_argument(argument: &Argument, numeric: bool) -> Scalar {
    match argument {
        Argument::Scalar(v) => Scalar::from_cell(v, numeric),
        // Only `between`/`in` use Range/Set/None; scalar operators always
        // receive a Scalar argument from a well-formed QuerySource. Treat
        // anything else as an empty string so evaluation is total rather
        // than panicking on a malformed caller.
        _ => Scalar::Str(String::new()),
    }
}

impl Scalar {
    fn clone_for_bound(&self) -> Scalar {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn comparator_for(
        cell: &str,
        is_numeric: bool,
        operator: Operator,
        argument: Argument,
    ) -> Verdict {
        let row = Rc::new(RefCell::new(vec![cell.to_string()]));
        let (comparator, _warning) =
            build_comparator(row, 0, "col", is_numeric, operator, argument).unwrap();
        comparator.evaluate()
    }

    #[test_case("3", true, Operator::Eq, Argument::Scalar("3".into()) => Verdict::Match)]
    #[test_case("2", true, Operator::Eq, Argument::Scalar("3".into()) => Verdict::Below)]
    #[test_case("4", true, Operator::Eq, Argument::Scalar("3".into()) => Verdict::Above)]
    #[test_case("2", true, Operator::Lt, Argument::Scalar("3".into()) => Verdict::Match)]
    #[test_case("3", true, Operator::Lt, Argument::Scalar("3".into()) => Verdict::Above)]
    #[test_case("4", true, Operator::Gt, Argument::Scalar("3".into()) => Verdict::Match)]
    #[test_case("3", true, Operator::Gt, Argument::Scalar("3".into()) => Verdict::Below)]
    fn numeric_verdicts(cell: &str, numeric: bool, op: Operator, arg: Argument) -> Verdict {
        comparator_for(cell, numeric, op, arg)
    }

    #[test]
    fn like_never_returns_below() {
        let v = comparator_for("Zed", false, Operator::Like, Argument::Scalar("^[AB]".into()));
        assert_eq!(v, Verdict::Above);
        let v = comparator_for("Alice", false, Operator::Like, Argument::Scalar("^[AB]".into()));
        assert_eq!(v, Verdict::Match);
    }

    #[test]
    fn between_bounds() {
        let arg = Argument::Range("2".into(), "4".into());
        assert_eq!(comparator_for("1", true, Operator::Between, arg.clone()), Verdict::Below);
        assert_eq!(comparator_for("3", true, Operator::Between, arg.clone()), Verdict::Match);
        assert_eq!(comparator_for("5", true, Operator::Between, arg), Verdict::Above);
    }

    #[test]
    fn degenerate_between_always_above() {
        let row = Rc::new(RefCell::new(vec!["3".to_string()]));
        let (comparator, warning) = build_comparator(
            row,
            0,
            "id",
            true,
            Operator::Between,
            Argument::Range("10".into(), "1".into()),
        )
        .unwrap();
        assert_eq!(comparator.evaluate(), Verdict::Above);
        assert!(matches!(warning, Some(Warning::DegeneratePredicate { .. })));
    }

    #[test]
    fn degenerate_in_empty_set_warns_and_always_above() {
        let row = Rc::new(RefCell::new(vec!["3".to_string()]));
        let (comparator, warning) =
            build_comparator(row, 0, "id", true, Operator::In, Argument::Set(vec![])).unwrap();
        assert_eq!(comparator.evaluate(), Verdict::Above);
        assert!(matches!(warning, Some(Warning::DegeneratePredicate { .. })));
    }

    #[test]
    fn in_set_membership() {
        let arg = Argument::Set(vec!["2".into(), "4".into(), "6".into()]);
        assert_eq!(comparator_for("1", true, Operator::In, arg.clone()), Verdict::Below);
        assert_eq!(comparator_for("2", true, Operator::In, arg.clone()), Verdict::Match);
        assert_eq!(comparator_for("3", true, Operator::In, arg.clone()), Verdict::Below);
        assert_eq!(comparator_for("7", true, Operator::In, arg), Verdict::Above);
    }

    #[test]
    fn unknown_operator_is_rejected_at_parse() {
        assert!(Operator::parse("~=").is_err());
    }
}
