//! The scan iterator: compiles a query into an ordered comparator list,
//! chooses a starting position, and pulls rows one at a time (§4.5).

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use crate::comparator::{build_comparator, Comparator, Verdict};
use crate::error::{Error, Result};
use crate::handle::{Fingerprint, Handle};
use crate::query::{PropertySource, QuerySource};
use crate::schema::SchemaView;
use crate::telemetry;
use crate::value::{split_bounded, with_constants, Row};

/// Projects `query` onto `schema`'s columns, in (sort-order, then the rest)
/// order, building a comparator for every column the query constrains.
///
/// Returns the compiled comparator list and the index of the last
/// comparator that still contributes to the leading, gapless sort prefix
/// (-1 if none does).
fn compile<Q: QuerySource, P: PropertySource>(
    schema: &SchemaView,
    query: &Q,
    properties: &P,
    row: &Rc<RefCell<Row>>,
) -> Result<(Vec<Comparator>, isize)> {
    let mut compiled = Vec::new();
    let mut sorted_prefix_end: isize = -1;
    let mut still_leading = true;

    let build = |name: &str, compiled: &mut Vec<Comparator>| -> Result<()> {
        let Some((operator, argument)) = query.predicate(name) else {
            return Ok(());
        };
        let index = schema.column_index(name).expect("schema column");
        let (comparator, warning) = build_comparator(
            Rc::clone(row),
            index,
            name,
            properties.is_numeric(name),
            operator,
            argument,
        )
        .map_err(|e| annotate(e, name))?;
        if let Some(warning) = &warning {
            telemetry::warn(warning);
        }
        compiled.push(comparator);
        Ok(())
    };

    for name in schema.sort_order() {
        if query.predicate(name).is_some() {
            build(name, &mut compiled)?;
            if still_leading {
                sorted_prefix_end = compiled.len() as isize - 1;
            }
        } else {
            still_leading = false;
        }
    }

    for name in schema.columns() {
        if schema.sort_order().contains(name) {
            continue;
        }
        build(name, &mut compiled)?;
    }

    Ok((compiled, sorted_prefix_end))
}

fn annotate(error: Error, column: &str) -> Error {
    match error {
        Error::Misconfigured { reason } => Error::Misconfigured {
            reason: format!("column {column:?}: {reason}"),
        },
        other => other,
    }
}

/// A lazy, forward-only, sort-aware scan over one schema view's file.
///
/// Yields `Result<Row>`: an `Err` mid-scan ends the iteration after that
/// item (the underlying file is left open for other iterators).
pub struct ScanIterator {
    schema: Rc<SchemaView>,
    handle: Handle,
    row: Rc<RefCell<Row>>,
    comparators: Vec<Comparator>,
    sorted_prefix_end: isize,
    fingerprint: Fingerprint,
    /// Offset to seek to the next time this iterator's fingerprint no
    /// longer matches the handle's last reader.
    resume_offset: u64,
    /// Absolute cache index of the next row this iterator wants.
    cache_index: usize,
    constant_values: Vec<String>,
    descriptor: u64,
    started_at: Instant,
    first_row_elapsed_logged: bool,
    rows_yielded: usize,
    finished: bool,
}

impl ScanIterator {
    pub(crate) fn new<Q: QuerySource, P: PropertySource>(
        schema: Rc<SchemaView>,
        handle: Handle,
        query: &Q,
        properties: &P,
    ) -> Result<Self> {
        let row = Rc::new(RefCell::new(vec![String::new(); schema.column_count()]));
        let (comparators, sorted_prefix_end) = compile(&schema, query, properties, &row)?;

        let fingerprint = handle.register_iterator();
        let descriptor = handle.descriptor();
        let constant_values = schema.constant_values().iter().map(|c| c.value.clone()).collect();

        let mut iterator = ScanIterator {
            schema,
            handle,
            row,
            comparators,
            sorted_prefix_end,
            fingerprint,
            resume_offset: 0,
            cache_index: 0,
            constant_values,
            descriptor,
            started_at: Instant::now(),
            first_row_elapsed_logged: false,
            rows_yielded: 0,
            finished: false,
        };
        iterator.choose_start_position();
        Ok(iterator)
    }

    /// Searches the shared cache backwards for a row strictly below the
    /// target region (§4.5 start-position choice). Adopts the cache
    /// position directly on success; otherwise leaves the iterator primed
    /// to seek to offset 0 on its first pull.
    fn choose_start_position(&mut self) {
        if self.sorted_prefix_end < 0 {
            return;
        }
        let prefix_end = self.sorted_prefix_end as usize;
        let row = &self.row;
        let comparators = &self.comparators;
        let found = self.handle.with_cache(|cache| {
            for (index, cached_row, offset) in cache.iter_newest_to_oldest() {
                *row.borrow_mut() = cached_row.clone();
                let any_below = comparators[..=prefix_end].iter().any(|c| c.evaluate() == Verdict::Below);
                if any_below {
                    return Some((index, offset));
                }
            }
            None
        });

        if let Some((index, offset)) = found {
            self.cache_index = index + 1;
            self.resume_offset = offset;
            self.handle.record_reader(self.fingerprint);
        }
        // Otherwise resume_offset stays 0 and cache_index stays 0; the
        // fingerprint we were just assigned has never been recorded as the
        // handle's last reader, so the first pull naturally reseats.
    }

    fn discard_header_if_needed(&self) -> Result<()> {
        if self.resume_offset == 0 && self.schema.skip_first_line() {
            self.handle.read_record(self.schema.record_separator().as_bytes())?;
        }
        Ok(())
    }

    /// Consumes the next row either from the shared cache or, failing
    /// that, by reading one record from the file and appending it to the
    /// cache (§4.5 pull step 2).
    ///
    /// `resume_offset` is advanced on a cache hit too, not just on a real
    /// file read: it must always reflect the file position just past the
    /// last row this iterator has actually consumed, so a later forced
    /// reseek (another iterator having invalidated the cache meanwhile)
    /// resumes past rows already yielded instead of replaying them.
    fn next_candidate(&mut self) -> Result<Option<Row>> {
        if let Some((cached, offset)) = self.handle.with_cache(|c| c.get_with_offset(self.cache_index).map(|(r, o)| (r.clone(), o))) {
            self.cache_index += 1;
            self.resume_offset = offset;
            return Ok(Some(cached));
        }

        self.handle.record_reader(self.fingerprint);
        let Some((line, offset)) = self.handle.read_record(self.schema.record_separator().as_bytes())? else {
            return Ok(None);
        };
        let fields = split_bounded(&line, self.schema.delimiter_pattern()?, self.schema.column_count());
        self.handle.with_cache(|c| c.append(fields.clone(), offset));
        self.cache_index += 1;
        self.resume_offset = offset;
        Ok(Some(fields))
    }

    fn pull(&mut self) -> Result<Option<Row>> {
        loop {
            if !self.handle.fingerprint_matches(self.fingerprint) {
                self.handle.seek_and_invalidate(self.resume_offset)?;
                self.discard_header_if_needed()?;
                self.cache_index = self.handle.with_cache(|c| c.next_index());
            }

            let Some(candidate) = self.next_candidate()? else {
                return Ok(None);
            };

            *self.row.borrow_mut() = candidate.clone();

            let verdicts: Vec<Verdict> = self.comparators.iter().map(Comparator::evaluate).collect();
            let terminate = verdicts
                .iter()
                .enumerate()
                .any(|(i, v)| *v == Verdict::Above && i as isize <= self.sorted_prefix_end);
            if terminate {
                return Ok(None);
            }
            if verdicts.iter().any(|v| *v != Verdict::Match) {
                continue;
            }

            return Ok(Some(with_constants(candidate, &self.constant_values)));
        }
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        telemetry::scan_completed(self.descriptor, self.started_at.elapsed(), self.rows_yielded);
    }
}

impl Iterator for ScanIterator {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.pull() {
            Ok(Some(row)) => {
                self.rows_yielded += 1;
                if !self.first_row_elapsed_logged {
                    self.first_row_elapsed_logged = true;
                    telemetry::first_row_yielded(self.descriptor, self.started_at.elapsed());
                }
                Some(Ok(row))
            }
            Ok(None) => {
                self.finish();
                None
            }
            Err(error) => {
                self.finish();
                Some(Err(error))
            }
        }
    }
}

impl Drop for ScanIterator {
    fn drop(&mut self) {
        self.handle.release_iterator();
    }
}
