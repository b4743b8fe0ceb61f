//! `dev6!`: developer bench lines for the in-memory query engine.
//!
//! Each line is a small JSON object (`{"bench":"query","op":"find",...}`) logged under
//! [`DEV_TARGET`] at trace level. A test can also capture the lines written on its own
//! thread with [`capture`], which keeps assertions independent of the global logger.

use std::cell::RefCell;

/// Log target for bench lines; the logger gives it its own appender when `dev6` is on.
pub const DEV_TARGET: &str = "plp_bookstore::dev6";

thread_local! {
    static CAPTURED: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Stops capturing on this thread when dropped.
pub struct CaptureGuard(());

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        CAPTURED.with(|c| c.borrow_mut().take());
    }
}

/// Starts capturing bench lines emitted on the current thread.
#[must_use]
pub fn capture() -> CaptureGuard {
    CAPTURED.with(|c| *c.borrow_mut() = Some(Vec::new()));
    CaptureGuard(())
}

#[doc(hidden)]
pub fn record(line: &str) {
    CAPTURED.with(|c| {
        if let Some(lines) = c.borrow_mut().as_mut() {
            lines.push(line.to_owned());
        }
    });
}

/// Removes and returns the lines captured so far.
pub fn take() -> Vec<String> {
    CAPTURED.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
}

/// Captured lines for one operation, parsed. Lines that are not JSON are skipped.
pub fn bench_lines(op: &str) -> Vec<serde_json::Value> {
    CAPTURED.with(|c| {
        c.borrow()
            .iter()
            .flatten()
            .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
            .filter(|v| v["op"] == op)
            .collect()
    })
}

#[macro_export]
macro_rules! dev6 {
    ($($arg:tt)*) => {{
        let line = format!($($arg)*);
        $crate::utils::devlog::record(&line);
        log::trace!(target: $crate::utils::devlog::DEV_TARGET, "{line}");
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_only_while_guard_lives() {
        crate::dev6!("{{\"bench\":\"query\",\"op\":\"find\",\"n\":{}}}", 1);
        {
            let _g = capture();
            crate::dev6!("{{\"bench\":\"query\",\"op\":\"find\",\"n\":{}}}", 2);
            crate::dev6!("{{\"bench\":\"query\",\"op\":\"count\"}}");
            crate::dev6!("free text");
            assert_eq!(bench_lines("find").len(), 1);
            assert_eq!(bench_lines("find")[0]["n"], 2);
            assert_eq!(take().len(), 3);
            assert!(take().is_empty());
        }
        crate::dev6!("after");
        assert!(take().is_empty());
    }

    #[test]
    fn other_threads_are_not_captured() {
        let _g = capture();
        std::thread::spawn(|| crate::dev6!("worker")).join().unwrap();
        assert!(take().is_empty());
    }
}
