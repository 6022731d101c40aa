//! Process-wide telemetry: an optional human-readable text sink plus the
//! crate's unconditional `tracing` instrumentation.
//!
//! The two are independent. `tracing` events fire on every scan regardless
//! of the monitor flag; the monitor sink is an opt-in extra for deployments
//! that want a plain-text operational log alongside (or instead of)
//! structured tracing output.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use crate::error::Warning;

/// A destination for human-readable telemetry text.
///
/// Implementors should be cheap to call from the hot scan loop; the default
/// sink is a no-op.
pub trait TelemetrySink: Send + Sync {
    /// Record one line of human-readable telemetry.
    fn record(&self, line: &str);
}

struct NoopSink;

impl TelemetrySink for NoopSink {
    fn record(&self, _line: &str) {}
}

static MONITOR_ENABLED: AtomicBool = AtomicBool::new(false);
static SINK: OnceLock<Mutex<Box<dyn TelemetrySink>>> = OnceLock::new();

fn sink() -> &'static Mutex<Box<dyn TelemetrySink>> {
    SINK.get_or_init(|| Mutex::new(Box::new(NoopSink)))
}

/// Enable or disable the monitor. When disabled, `record` calls are no-ops
/// (tracing instrumentation continues regardless).
pub fn set_monitor_enabled(enabled: bool) {
    MONITOR_ENABLED.store(enabled, Ordering::SeqCst);
}

/// Returns whether the monitor is currently enabled.
pub fn monitor_enabled() -> bool {
    MONITOR_ENABLED.load(Ordering::SeqCst)
}

/// Install a new process-wide telemetry sink.
pub fn set_sink(new_sink: Box<dyn TelemetrySink>) {
    let mut guard = sink().lock().expect("telemetry sink mutex poisoned");
    *guard = new_sink;
}

fn emit(line: impl Into<String>) {
    if !monitor_enabled() {
        return;
    }
    let line = line.into();
    let guard = sink().lock().expect("telemetry sink mutex poisoned");
    guard.record(&line);
}

/// Emitted when a handle opens the underlying file for the first time.
pub fn handle_opened(descriptor: u64, path: &std::path::Path) {
    tracing::debug!(descriptor, path = %path.display(), "handle opened");
    emit(format!(
        "[{:?}] handle {descriptor} opened for {}",
        Instant::now(),
        path.display()
    ));
}

/// Emitted whenever a seek forces the row cache to be invalidated.
pub fn cache_invalidating_seek(descriptor: u64, offset: u64) {
    tracing::debug!(descriptor, offset, "cache-invalidating seek");
    emit(format!(
        "[{:?}] handle {descriptor} seeked to offset {offset}, cache invalidated",
        Instant::now()
    ));
}

/// Emitted the first time a scan yields a row.
pub fn first_row_yielded(descriptor: u64, elapsed: std::time::Duration) {
    tracing::info!(descriptor, elapsed_ms = elapsed.as_millis() as u64, "first row yielded");
    emit(format!(
        "[{:?}] handle {descriptor} yielded first row after {elapsed:?}",
        Instant::now()
    ));
}

/// Emitted when a scan completes (exhausted or early-terminated).
pub fn scan_completed(descriptor: u64, elapsed: std::time::Duration, rows_yielded: usize) {
    tracing::info!(
        descriptor,
        elapsed_ms = elapsed.as_millis() as u64,
        rows_yielded,
        "scan completed"
    );
    emit(format!(
        "[{:?}] handle {descriptor} completed scan in {elapsed:?}, {rows_yielded} rows",
        Instant::now()
    ));
}

/// Emitted when the last live iterator drops and the handle closes the file.
pub fn handle_closed(descriptor: u64) {
    tracing::debug!(descriptor, "handle closed");
    emit(format!("[{:?}] handle {descriptor} closed", Instant::now()));
}

/// Emitted for a non-fatal [`Warning`].
pub fn warn(warning: &Warning) {
    tracing::warn!(%warning, "scan engine warning");
    emit(format!("[{:?}] warning: {warning}", Instant::now()));
}
