//! Per-query trace lines with a thread-local sink for deterministic tests, plus the
//! slow-query threshold.
//! Trace lines go to the `bookshelf::trace` target at TRACE level.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static SLOW_QUERY_MS: AtomicU64 = AtomicU64::new(500);

thread_local! {
    static TL_SINK: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Guard that disables the thread-local sink on drop.
pub struct TraceSinkGuard;
impl Drop for TraceSinkGuard {
    fn drop(&mut self) {
        TL_SINK.with(|s| *s.borrow_mut() = None);
    }
}

/// Enable the thread-local sink for the current thread. Returns a guard that will disable it on drop.
pub fn enable_thread_sink() -> TraceSinkGuard {
    TL_SINK.with(|s| *s.borrow_mut() = Some(Vec::new()));
    TraceSinkGuard
}

/// Push a message into the thread-local sink if enabled.
pub fn write_str(msg: &str) {
    TL_SINK.with(|s| {
        if let Some(buf) = s.borrow_mut().as_mut() {
            buf.push(msg.to_owned());
        }
    });
}

/// Drain and return the captured messages for the current thread.
pub fn drain() -> Vec<String> {
    TL_SINK.with(|s| s.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

pub fn set_slow_query_ms(ms: u64) {
    SLOW_QUERY_MS.store(ms, Ordering::Relaxed);
}

#[must_use]
pub fn slow_query_ms() -> u64 {
    SLOW_QUERY_MS.load(Ordering::Relaxed)
}

/// Emit a trace line and capture it in the thread-local sink if enabled.
#[macro_export]
macro_rules! qtrace {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        $crate::utils::querylog::write_str(&__s);
        log::log!(target: "bookshelf::trace", log::Level::Trace, "{}", __s);
    }};
}

/// Records one executed query: a JSON trace line, and a warning past the slow threshold.
pub fn record(op: &str, collection: &str, started: Instant, result_count: usize) {
    let dur_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let line = serde_json::json!({
        "op": op,
        "collection": collection,
        "duration_ms": dur_ms,
        "result_count": result_count,
    });
    crate::qtrace!("{line}");
    if dur_ms > slow_query_ms() {
        log::warn!("slow query: op={op} collection={collection} duration_ms={dur_ms}");
    }
}
