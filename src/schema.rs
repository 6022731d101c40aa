//! The schema view: immutable description of one delimited flat file
//! (§3, §4.1).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The default delimiter regex when none is configured: comma-separated,
/// discarding surrounding whitespace. This is the exact default behavior;
/// there is no RFC 4180 quoting mode (§9 open question resolution).
pub const DEFAULT_DELIMITER: &str = r"\s*,\s*";

/// The default record separator when none is configured.
pub const DEFAULT_RECORD_SEPARATOR: &str = "\n";

/// The default row-cache capacity when `cache_size` is absent from
/// configuration (§9 open question resolution: per-schema `cache_size` is
/// honored directly when present).
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// A synthetic column not present in the file, with a fixed value appended
/// to every row the engine yields (§4.5 constant-value projection).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantValue {
    /// The synthetic property name (for the host's own bookkeeping; the
    /// engine itself only ever appends `value`).
    pub name: String,
    /// The value appended to every row's constant-value columns.
    pub value: String,
}

/// Immutable description of one delimited flat file: column layout, sort
/// order, delimiter, and the file path(s) backing it.
pub struct SchemaView {
    columns: Vec<String>,
    sort_order: Vec<String>,
    delimiter: String,
    delimiter_regex: OnceLock<Regex>,
    record_separator: String,
    skip_first_line: bool,
    cache_capacity: usize,
    constant_values: Vec<ConstantValue>,
    paths: Vec<PathBuf>,
}

impl SchemaView {
    /// Starts building a `SchemaView` from its required column list.
    pub fn builder(columns: impl IntoIterator<Item = impl Into<String>>) -> SchemaViewBuilder {
        SchemaViewBuilder {
            columns: columns.into_iter().map(Into::into).collect(),
            sort_order: Vec::new(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            record_separator: DEFAULT_RECORD_SEPARATOR.to_string(),
            skip_first_line: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            constant_values: Vec::new(),
            paths: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn sort_order(&self) -> &[String] {
        &self.sort_order
    }

    pub fn record_separator(&self) -> &str {
        &self.record_separator
    }

    pub fn skip_first_line(&self) -> bool {
        self.skip_first_line
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    pub fn constant_values(&self) -> &[ConstantValue] {
        &self.constant_values
    }

    /// Resolves the effective file path. With a single path configured,
    /// returns it; with a list, deterministically selects one by hashing
    /// the current process id, so repeated calls within one process always
    /// agree and different processes load-balance across the list (§4.1).
    pub fn path(&self) -> Result<PathBuf> {
        match self.paths.len() {
            0 => Err(Error::Misconfigured {
                reason: "no file path or file list configured".into(),
            }),
            1 => Ok(self.paths[0].clone()),
            n => {
                let index = (std::process::id() as usize) % n;
                Ok(self.paths[index].clone())
            }
        }
    }

    /// Compiles (once) and returns the delimiter regular expression.
    pub fn delimiter_pattern(&self) -> Result<&Regex> {
        if let Some(re) = self.delimiter_regex.get() {
            return Ok(re);
        }
        let compiled = Regex::new(&self.delimiter).map_err(|e| Error::Misconfigured {
            reason: format!("invalid delimiter regex {:?}: {e}", self.delimiter),
        })?;
        Ok(self.delimiter_regex.get_or_init(|| compiled))
    }
}

/// Builds a [`SchemaView`], validating eagerly rather than deferring
/// mistakes to first scan (§4.1).
pub struct SchemaViewBuilder {
    columns: Vec<String>,
    sort_order: Vec<String>,
    delimiter: String,
    record_separator: String,
    skip_first_line: bool,
    cache_capacity: usize,
    constant_values: Vec<ConstantValue>,
    paths: Vec<PathBuf>,
}

impl SchemaViewBuilder {
    pub fn sort_order(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.sort_order = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn delimiter(mut self, pattern: impl Into<String>) -> Self {
        self.delimiter = pattern.into();
        self
    }

    pub fn record_separator(mut self, separator: impl Into<String>) -> Self {
        self.record_separator = separator.into();
        self
    }

    pub fn skip_first_line(mut self, skip: bool) -> Self {
        self.skip_first_line = skip;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn constant_values(mut self, values: impl IntoIterator<Item = ConstantValue>) -> Self {
        self.constant_values = values.into_iter().collect();
        self
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.paths = vec![path.as_ref().to_path_buf()];
        self
    }

    pub fn file_list(mut self, paths: impl IntoIterator<Item = impl AsRef<Path>>) -> Self {
        self.paths = paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect();
        self
    }

    /// Validates and constructs the `SchemaView`.
    pub fn build(self) -> Result<SchemaView> {
        if self.columns.is_empty() {
            return Err(Error::Misconfigured {
                reason: "column list must not be empty".into(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.as_str()) {
                return Err(Error::Misconfigured {
                    reason: format!("duplicate column name {column:?}"),
                });
            }
        }
        for sorted in &self.sort_order {
            if !self.columns.contains(sorted) {
                return Err(Error::Misconfigured {
                    reason: format!("sort_order references unknown column {sorted:?}"),
                });
            }
        }
        if self.record_separator.is_empty() {
            return Err(Error::Misconfigured {
                reason: "record separator must not be empty".into(),
            });
        }
        if self.cache_capacity == 0 {
            return Err(Error::Misconfigured {
                reason: "cache capacity must be positive".into(),
            });
        }
        if self.paths.is_empty() {
            return Err(Error::Misconfigured {
                reason: "no file path or file list configured".into(),
            });
        }

        let view = SchemaView {
            columns: self.columns,
            sort_order: self.sort_order,
            delimiter: self.delimiter,
            delimiter_regex: OnceLock::new(),
            record_separator: self.record_separator,
            skip_first_line: self.skip_first_line,
            cache_capacity: self.cache_capacity,
            constant_values: self.constant_values,
            paths: self.paths,
        };
        // Validate the delimiter eagerly too, rather than on first use.
        view.delimiter_pattern()?;
        Ok(view)
    }
}

/// A `serde`-deserializable mirror of the recognized configuration options
/// (§6), convertible fallibly into a [`SchemaView`] through the same
/// validation the builder uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaViewConfig {
    pub column_order: Vec<String>,
    pub delimiter: Option<String>,
    pub record_separator: Option<String>,
    pub cache_size: Option<usize>,
    pub skip_first_line: bool,
    pub server: Option<String>,
    pub file_list: Option<Vec<String>>,
    pub sort_order: Vec<String>,
    pub constant_values: Vec<ConstantValue>,
}

impl Default for SchemaViewConfig {
    fn default() -> Self {
        Self {
            column_order: Vec::new(),
            delimiter: None,
            record_separator: None,
            cache_size: None,
            skip_first_line: false,
            server: None,
            file_list: None,
            sort_order: Vec::new(),
            constant_values: Vec::new(),
        }
    }
}

impl TryFrom<SchemaViewConfig> for SchemaView {
    type Error = Error;

    fn try_from(config: SchemaViewConfig) -> Result<SchemaView> {
        let mut builder = SchemaView::builder(config.column_order)
            .sort_order(config.sort_order)
            .skip_first_line(config.skip_first_line)
            .constant_values(config.constant_values)
            .cache_capacity(config.cache_size.unwrap_or(DEFAULT_CACHE_CAPACITY));

        if let Some(delimiter) = config.delimiter {
            builder = builder.delimiter(delimiter);
        }
        if let Some(record_separator) = config.record_separator {
            builder = builder.record_separator(record_separator);
        }

        builder = match (config.server, config.file_list) {
            (Some(server), _) => builder.path(server),
            (None, Some(list)) => builder.file_list(list),
            (None, None) => builder, // build() reports Misconfigured
        };

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SchemaViewBuilder {
        SchemaView::builder(["id", "name", "age"]).path("/tmp/does-not-matter.csv")
    }

    #[test]
    fn rejects_empty_columns() {
        let err = SchemaView::builder(Vec::<String>::new())
            .path("/tmp/x.csv")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Misconfigured { .. }));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = SchemaView::builder(["id", "id"])
            .path("/tmp/x.csv")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Misconfigured { .. }));
    }

    #[test]
    fn rejects_missing_path() {
        let err = SchemaView::builder(["id"]).build().unwrap_err();
        assert!(matches!(err, Error::Misconfigured { .. }));
    }

    #[test]
    fn rejects_zero_cache_capacity() {
        let err = base().cache_capacity(0).build().unwrap_err();
        assert!(matches!(err, Error::Misconfigured { .. }));
    }

    #[test]
    fn rejects_invalid_delimiter() {
        let err = base().delimiter("(unclosed").build().unwrap_err();
        assert!(matches!(err, Error::Misconfigured { .. }));
    }

    #[test]
    fn single_path_resolves_directly() {
        let view = base().build().unwrap();
        assert_eq!(view.path().unwrap(), PathBuf::from("/tmp/does-not-matter.csv"));
    }

    #[test]
    fn file_list_selection_is_stable_within_process() {
        let view = SchemaView::builder(["id"])
            .file_list(["/tmp/a.csv", "/tmp/b.csv", "/tmp/c.csv"])
            .build()
            .unwrap();
        let first = view.path().unwrap();
        let second = view.path().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = SchemaViewConfig {
            column_order: vec!["id".into(), "name".into(), "age".into()],
            sort_order: vec!["id".into()],
            server: Some("/tmp/people.csv".into()),
            cache_size: Some(50),
            skip_first_line: true,
            ..Default::default()
        };
        let toml_text = toml::to_string(&config).unwrap();
        let parsed: SchemaViewConfig = toml::from_str(&toml_text).unwrap();
        let view = SchemaView::try_from(parsed).unwrap();
        assert_eq!(view.columns(), &["id", "name", "age"]);
        assert_eq!(view.cache_capacity(), 50);
        assert!(view.skip_first_line());
    }

    #[test]
    fn config_without_path_is_misconfigured() {
        let config = SchemaViewConfig {
            column_order: vec!["id".into()],
            ..Default::default()
        };
        let err = SchemaView::try_from(config).unwrap_err();
        assert!(matches!(err, Error::Misconfigured { .. }));
    }
}
