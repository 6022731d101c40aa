//! A read-only, sort-aware scan engine over delimited flat files.
//!
//! A [`schema::SchemaView`] describes one file's columns, declared sort
//! order, and delimiter; a [`source::FileSource`] binds that description to
//! a lazily-opened file handle and hands out [`scan::ScanIterator`]s. Each
//! scan compiles a caller-supplied query (the [`query::QuerySource`] and
//! [`query::PropertySource`] traits) into an ordered comparator list and
//! pulls matching rows one at a time, pruning the scan early whenever the
//! declared sort order rules out the rest of the file.
//!
//! The engine is single-threaded and pull-driven: there is no background
//! I/O, and concurrency across scans of the same file is handled by the
//! fingerprint protocol in [`handle`], not by locking.

pub mod cache;
pub mod comparator;
pub mod error;
pub mod handle;
pub mod operator;
pub mod query;
pub mod scan;
pub mod schema;
pub mod source;
pub mod telemetry;
pub mod value;

pub use comparator::{Comparator, Verdict};
pub use error::{Error, Result, Warning};
pub use operator::{Argument, Operator};
pub use query::{EmptyQuery, PropertySource, QuerySource};
pub use scan::ScanIterator;
pub use schema::{ConstantValue, SchemaView, SchemaViewBuilder, SchemaViewConfig};
pub use source::FileSource;
pub use telemetry::TelemetrySink;
pub use value::Row;
