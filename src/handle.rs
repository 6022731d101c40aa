//! The handle manager: lazy file open, live-iterator accounting, and the
//! fingerprint protocol that detects interleaved reads (§4.4).

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::RowCache;
use crate::error::{Error, Result};
use crate::telemetry;

/// A fingerprint assigned to one scan iterator, used to detect when another
/// iterator has advanced the shared file handle between pulls.
pub type Fingerprint = u64;

static NEXT_FINGERPRINT: AtomicU64 = AtomicU64::new(1);
static NEXT_DESCRIPTOR: AtomicU64 = AtomicU64::new(1);

fn next_fingerprint() -> Fingerprint {
    NEXT_FINGERPRINT.fetch_add(1, Ordering::SeqCst)
}

struct Inner {
    path: PathBuf,
    descriptor: u64,
    file: Option<File>,
    cache: RowCache,
    live_iterators: usize,
    /// The fingerprint of whichever iterator last read from `file`. `None`
    /// means no iterator has read yet (forces the first pull to seek).
    last_reader: Option<Fingerprint>,
}

/// Per-schema-view owner of the file handle and live-iterator count.
///
/// Cheap to clone (an `Rc` around shared interior-mutable state); every
/// [`crate::scan::ScanIterator`] over the same [`crate::schema::SchemaView`]
/// holds a clone. No scan owns a reference back into any other scan — this
/// is a reference-counted back-reference, not a strong cycle (§9).
#[derive(Clone)]
pub struct Handle(Rc<RefCell<Inner>>);

impl Handle {
    pub fn new(path: PathBuf, cache_capacity: usize) -> Self {
        Self(Rc::new(RefCell::new(Inner {
            path,
            descriptor: NEXT_DESCRIPTOR.fetch_add(1, Ordering::SeqCst),
            file: None,
            cache: RowCache::new(cache_capacity),
            live_iterators: 0,
            last_reader: None,
        })))
    }

    /// Registers a new live iterator and returns its fingerprint.
    pub fn register_iterator(&self) -> Fingerprint {
        self.0.borrow_mut().live_iterators += 1;
        next_fingerprint()
    }

    /// Releases one live iterator. When the count reaches zero, the file is
    /// closed and the cache is cleared.
    pub fn release_iterator(&self) {
        let mut inner = self.0.borrow_mut();
        inner.live_iterators = inner.live_iterators.saturating_sub(1);
        if inner.live_iterators == 0 {
            let descriptor = inner.descriptor;
            inner.file = None;
            inner.cache.invalidate();
            inner.last_reader = None;
            telemetry::handle_closed(descriptor);
        }
    }

    /// Current live-iterator count (exposed for tests/invariant checks).
    pub fn live_iterator_count(&self) -> usize {
        self.0.borrow().live_iterators
    }

    /// True if `fingerprint` is the one that last read from the file (i.e.
    /// the iterator can resume without seeking).
    pub fn fingerprint_matches(&self, fingerprint: Fingerprint) -> bool {
        self.0.borrow().last_reader == Some(fingerprint)
    }

    /// Records that `fingerprint` just advanced the file.
    pub fn record_reader(&self, fingerprint: Fingerprint) {
        self.0.borrow_mut().last_reader = Some(fingerprint);
    }

    pub fn descriptor(&self) -> u64 {
        self.0.borrow().descriptor
    }

    /// Opens the file if not already open, creating an empty one first if
    /// it doesn't exist (§6 persisted state).
    pub fn ensure_open(&self) -> Result<()> {
        let mut inner = self.0.borrow_mut();
        if inner.file.is_some() {
            return Ok(());
        }
        let path = inner.path.clone();
        open_or_create(&path)?;
        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
        inner.file = Some(file);
        let descriptor = inner.descriptor;
        drop(inner);
        telemetry::handle_opened(descriptor, &path);
        Ok(())
    }

    /// Seeks the underlying file to `offset` and invalidates the cache.
    pub fn seek_and_invalidate(&self, offset: u64) -> Result<()> {
        self.ensure_open()?;
        let mut inner = self.0.borrow_mut();
        let path = inner.path.clone();
        let descriptor = inner.descriptor;
        let file = inner.file.as_mut().expect("ensure_open just ran");
        file.seek(SeekFrom::Start(offset))
            .map_err(|source| Error::Io { path, source })?;
        inner.cache.invalidate();
        drop(inner);
        telemetry::cache_invalidating_seek(descriptor, offset);
        Ok(())
    }

    /// Runs `f` with mutable access to the shared row cache.
    pub fn with_cache<R>(&self, f: impl FnOnce(&mut RowCache) -> R) -> R {
        let mut inner = self.0.borrow_mut();
        f(&mut inner.cache)
    }

    /// Reads one record terminated by `separator`, stripping the separator,
    /// and returns it together with the absolute file offset immediately
    /// after it (§4.5 step 2). Returns `None` at end of file.
    ///
    /// Issues small reads directly against the open file rather than
    /// buffering ahead of the logical read position: another iterator may
    /// seek the same file between pulls, and only the current reader's
    /// fingerprint is trusted to resume without reseating (§4.4).
    pub fn read_record(&self, separator: &[u8]) -> Result<Option<(String, u64)>> {
        self.ensure_open()?;
        let mut inner = self.0.borrow_mut();
        let path = inner.path.clone();
        let file = inner.file.as_mut().expect("ensure_open just ran");
        let mut buf: Vec<u8> = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = file
                .read(&mut byte)
                .map_err(|source| Error::Io { path: path.clone(), source })?;
            if n == 0 {
                if buf.is_empty() {
                    return Ok(None);
                }
                let offset = file
                    .stream_position()
                    .map_err(|source| Error::Io { path: path.clone(), source })?;
                return Ok(Some((String::from_utf8_lossy(&buf).into_owned(), offset)));
            }
            buf.push(byte[0]);
            if buf.ends_with(separator) {
                buf.truncate(buf.len() - separator.len());
                let offset = file
                    .stream_position()
                    .map_err(|source| Error::Io { path: path.clone(), source })?;
                return Ok(Some((String::from_utf8_lossy(&buf).into_owned(), offset)));
            }
        }
    }
}

fn open_or_create(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    OpenOptions::new()
        .write(true)
        .create(true)
        .open(path)
        .map(drop)
        .map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
}
