//! The top-level entry point: binds a [`SchemaView`] to its [`Handle`] and
//! hands out [`ScanIterator`]s over it.
//!
//! Mirrors the reference stack's pattern of a thin façade in front of a
//! plan/executor pair: the schema view is the plan, the handle plus scan
//! iterator are the executor.

use std::rc::Rc;

use crate::error::Result;
use crate::handle::Handle;
use crate::query::{PropertySource, QuerySource};
use crate::scan::ScanIterator;
use crate::schema::SchemaView;

/// One open file bound to its schema. Cheap to clone (an `Rc` schema plus
/// a `Clone`-able handle); every [`ScanIterator`] it produces shares the
/// same underlying file handle and row cache.
#[derive(Clone)]
pub struct FileSource {
    schema: Rc<SchemaView>,
    handle: Handle,
}

impl FileSource {
    /// Binds `schema` to a fresh handle. The file itself is not opened
    /// until the first scan actually reads from it (§4.4).
    pub fn open(schema: SchemaView) -> Result<Self> {
        let path = schema.path()?;
        let handle = Handle::new(path, schema.cache_capacity());
        Ok(Self {
            schema: Rc::new(schema),
            handle,
        })
    }

    pub fn schema(&self) -> &SchemaView {
        &self.schema
    }

    /// Compiles `query` against this source's schema and returns a lazy
    /// scan iterator over its matching rows.
    pub fn scan<Q: QuerySource, P: PropertySource>(&self, query: &Q, properties: &P) -> Result<ScanIterator> {
        ScanIterator::new(Rc::clone(&self.schema), self.handle.clone(), query, properties)
    }

    /// Number of scans currently pulling from this source.
    pub fn live_iterator_count(&self) -> usize {
        self.handle.live_iterator_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{Argument, Operator};
    use crate::schema::ConstantValue;
    use std::io::Write;

    struct EqQuery {
        column: String,
        value: String,
    }

    impl QuerySource for EqQuery {
        fn predicate(&self, column: &str) -> Option<(Operator, Argument)> {
            if column == self.column {
                Some((Operator::Eq, Argument::Scalar(self.value.clone())))
            } else {
                None
            }
        }
    }

    struct AllNumeric;
    impl PropertySource for AllNumeric {
        fn is_numeric(&self, _column: &str) -> bool {
            true
        }
    }

    fn write_people(path: &std::path::Path) {
        let mut f = std::fs::File::create(path).unwrap();
        writeln!(f, "id,name,age").unwrap();
        writeln!(f, "1,Alice,30").unwrap();
        writeln!(f, "2,Bob,25").unwrap();
        writeln!(f, "3,Carol,40").unwrap();
    }

    #[test]
    fn scans_and_closes_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        write_people(&path);

        let schema = SchemaView::builder(["id", "name", "age"])
            .sort_order(["id"])
            .skip_first_line(true)
            .path(&path)
            .build()
            .unwrap();
        let source = FileSource::open(schema).unwrap();

        let query = EqQuery {
            column: "id".into(),
            value: "2".into(),
        };
        let rows: Vec<_> = source.scan(&query, &AllNumeric).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(rows, vec![vec!["2".to_string(), "Bob".to_string(), "25".to_string()]]);
        assert_eq!(source.live_iterator_count(), 0);
    }

    #[test]
    fn projects_constant_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        write_people(&path);

        let schema = SchemaView::builder(["id", "name", "age"])
            .skip_first_line(true)
            .constant_values([ConstantValue {
                name: "tenant".into(),
                value: "acme".into(),
            }])
            .path(&path)
            .build()
            .unwrap();
        let source = FileSource::open(schema).unwrap();

        let rows: Vec<_> = source
            .scan(&crate::query::EmptyQuery, &AllNumeric)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].last().unwrap(), "acme");
    }
}
