#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing and examples in `partition_bench`.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// How long a test guarded by [`with_watchdog()`] may run.
///
/// Miri is dramatically slower at thread synchronization, so it gets more time.
pub const WATCHDOG_TIMEOUT: Duration = if cfg!(miri) {
    Duration::from_secs(120)
} else {
    Duration::from_secs(30)
};

/// Runs a test on a separate thread and fails it if it does not finish within
/// [`WATCHDOG_TIMEOUT`].
///
/// Worker threads that wait on each other can deadlock. Without a watchdog, a deadlocked test
/// hangs the whole test run instead of failing.
///
/// When the `MUTATION_TESTING` environment variable is set to "1", the watchdog is disabled
/// and the test runs directly on the calling thread, so that mutation testing can detect
/// mutations that hang.
///
/// # Panics
///
/// Panics if the test times out. Re-raises the panic of a test that panics.
///
/// # Example
///
/// ```rust
/// use testing::with_watchdog;
///
/// let sum = with_watchdog(|| 2 + 2);
/// assert_eq!(sum, 4);
/// ```
pub fn with_watchdog<F, R>(test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    with_watchdog_timeout(WATCHDOG_TIMEOUT, test_fn)
}

/// Same as [`with_watchdog()`] but with a custom timeout, for tests that are expected to take
/// long, such as heavily oversubscribed ones.
///
/// # Panics
///
/// Panics if the test times out. Re-raises the panic of a test that panics.
pub fn with_watchdog_timeout<F, R>(timeout: Duration, test_fn: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
        return test_fn();
    }

    let (tx, rx) = mpsc::channel();

    let test_thread = thread::spawn(move || {
        // If this fails, the watchdog has already given up on us.
        drop(tx.send(test_fn()));
    });

    match rx.recv_timeout(timeout) {
        Ok(result) => {
            test_thread
                .join()
                .expect("test thread sent its result, so it cannot have panicked");
            result
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("test exceeded the {timeout:?} watchdog timeout, suspect a deadlock");
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => match test_thread.join() {
            Ok(()) => panic!("test thread exited without producing a result"),
            Err(payload) => std::panic::resume_unwind(payload),
        },
    }
}

/// Asserts that two floating-point values differ by no more than a small relative tolerance.
///
/// Values computed by summing in a different order differ in the last few bits, so exact
/// comparison is only appropriate where the computation order is fixed.
///
/// # Panics
///
/// Panics if the values are not close.
#[track_caller]
pub fn assert_close(actual: f64, expected: f64) {
    const RELATIVE_TOLERANCE: f64 = 1e-9;

    let tolerance = RELATIVE_TOLERANCE * expected.abs().max(1.0);
    let difference = (actual - expected).abs();

    assert!(
        difference <= tolerance,
        "{actual} is not close to {expected} (difference {difference}, tolerance {tolerance})"
    );
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn watchdog_returns_test_result() {
        assert_eq!(with_watchdog(|| 42), 42);
    }

    #[test]
    #[should_panic(expected = "watchdog timeout")]
    fn watchdog_fails_hanging_test() {
        if std::env::var("MUTATION_TESTING").as_deref() == Ok("1") {
            // Without the watchdog this test would hang, so pretend it fired.
            panic!("watchdog timeout disabled under mutation testing");
        }

        with_watchdog_timeout(Duration::from_millis(50), || {
            thread::sleep(Duration::from_secs(5));
        });
    }

    #[test]
    #[should_panic(expected = "inner failure")]
    fn watchdog_forwards_panics() {
        with_watchdog(|| panic!("inner failure"));
    }

    #[test]
    fn close_values_pass() {
        assert_close(0.1 + 0.2, 0.3);
        assert_close(1e12 + 1e-3, 1e12);
    }

    #[test]
    #[should_panic(expected = "is not close to")]
    fn distant_values_fail() {
        assert_close(3.0, 3.001);
    }
}
