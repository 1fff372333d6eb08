use std::fmt;
use std::num::NonZero;
use std::time::Duration;

use crate::{Kernel, LoopOrder, Pattern, TimingPolicy, gflops};

/// The outcome of one trial: the only externally observable artifact of a benchmark.
///
/// The [`Display`][fmt::Display] form is one comma-separated record,
/// `N,T,pattern,elapsed_seconds,checksum`, with the pattern as its numeric selector, the
/// elapsed time to 9 decimal places and the checksum to 6. The alternate form (`{:#}`)
/// appends the kernel, loop order and timing policy labels, as records produced under
/// different timing policies are not comparable.
///
/// ```
/// # use partition_bench::{Pattern, Trial, TrialConfig};
/// let result = Trial::new(TrialConfig::new(4, 2, Pattern::CyclicRows)?)?.execute()?.result();
///
/// let record = result.to_string();
/// assert!(record.starts_with("4,2,4,"));
/// assert!(record.ends_with(",48.000000"));
///
/// assert!(format!("{result:#}").ends_with(",add,natural,min_of_R"));
/// # Ok::<(), partition_bench::Error>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrialResult {
    size: usize,
    workers: NonZero<usize>,
    pattern: Pattern,
    kernel: Kernel,
    loop_order: LoopOrder,
    timing: TimingPolicy,
    elapsed: Duration,
    checksum: f64,
}

impl TrialResult {
    #[expect(
        clippy::too_many_arguments,
        reason = "plain record, all fields are required"
    )]
    pub(crate) fn new(
        size: usize,
        workers: NonZero<usize>,
        pattern: Pattern,
        kernel: Kernel,
        loop_order: LoopOrder,
        timing: TimingPolicy,
        elapsed: Duration,
        checksum: f64,
    ) -> Self {
        Self {
            size,
            workers,
            pattern,
            kernel,
            loop_order,
            timing,
            elapsed,
            checksum,
        }
    }

    /// N, the dimension of the input matrices.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// T, the number of workers.
    #[must_use]
    pub fn workers(&self) -> NonZero<usize> {
        self.workers
    }

    /// How the output was divided between workers.
    #[must_use]
    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    /// The work performed for every output cell.
    #[must_use]
    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    /// How the kernel's loops were nested.
    #[must_use]
    pub fn loop_order(&self) -> LoopOrder {
        self.loop_order
    }

    /// The policy under which [`elapsed()`][Self::elapsed] was measured.
    #[must_use]
    pub fn timing(&self) -> TimingPolicy {
        self.timing
    }

    /// The reported time of one pass over the output.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The sampled sum of the output.
    #[must_use]
    pub fn checksum(&self) -> f64 {
        self.checksum
    }

    /// Billions of floating-point operations per second achieved by one pass.
    #[must_use]
    pub fn gflops(&self) -> f64 {
        gflops(self.kernel.flop_count(self.size), self.elapsed)
    }
}

impl fmt::Display for TrialResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{:.9},{:.6}",
            self.size,
            self.workers,
            self.pattern.selector(),
            self.elapsed.as_secs_f64(),
            self.checksum
        )?;

        if f.alternate() {
            write!(
                f,
                ",{},{},{}",
                self.kernel,
                self.loop_order,
                self.timing.label()
            )?;
        }

        Ok(())
    }
}
