use std::num::NonZero;
use std::time::Duration;

use new_zealand::nz;

/// Warmup passes run before measuring, unless configured otherwise.
pub const DEFAULT_WARMUP: usize = 2;

/// Timed runs under [`TimingPolicy::MinimumOfRuns`], unless configured otherwise.
pub const DEFAULT_RUNS: NonZero<usize> = nz!(5);

/// How elapsed time is measured and reported.
///
/// The two policies measure different things and their results are not comparable with each
/// other. Every [`TrialResult`][crate::TrialResult] records which policy produced it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum TimingPolicy {
    /// Every run is timed on its own, with fresh worker threads and a reset output, and the
    /// shortest run is reported. Filters out noise: the true cost of a run cannot be beaten.
    MinimumOfRuns {
        /// How many runs are timed.
        runs: NonZero<usize>,
    },

    /// One set of workers makes `repeats` barrier-separated passes under a single timer and
    /// the total is divided by `repeats`. Amortizes thread launch but includes the barrier
    /// overhead in every pass.
    AverageUnderBarrier {
        /// How many passes are made under the timer.
        repeats: NonZero<usize>,
    },
}

impl TimingPolicy {
    /// The label that identifies the policy in emitted records.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::MinimumOfRuns { .. } => "min_of_R",
            Self::AverageUnderBarrier { .. } => "barrier_avg_of_R",
        }
    }

    /// How many kernel passes over the output a measurement performs.
    #[must_use]
    pub fn repetitions(&self) -> NonZero<usize> {
        match *self {
            Self::MinimumOfRuns { runs } => runs,
            Self::AverageUnderBarrier { repeats } => repeats,
        }
    }
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self::MinimumOfRuns { runs: DEFAULT_RUNS }
    }
}

/// The timing data collected by one trial.
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    policy: TimingPolicy,
    samples: Box<[Duration]>,
    elapsed: Duration,
}

impl Measurement {
    /// A measurement from individually timed runs, reporting the shortest.
    ///
    /// # Panics
    ///
    /// Panics if `samples` is empty.
    pub(crate) fn minimum_of(samples: Box<[Duration]>) -> Self {
        let elapsed = samples
            .iter()
            .copied()
            .min()
            .expect("guarded by at least one run being configured");

        let runs = NonZero::new(samples.len())
            .expect("guarded by at least one run being configured");

        Self {
            policy: TimingPolicy::MinimumOfRuns { runs },
            samples,
            elapsed,
        }
    }

    /// A measurement from one timer covering `repeats` passes, reporting the mean.
    pub(crate) fn average_of(total: Duration, repeats: NonZero<usize>) -> Self {
        // Anything past u32::MAX passes is clamped; nobody waits for that many.
        let divisor = u32::try_from(repeats.get()).unwrap_or(u32::MAX);

        Self {
            policy: TimingPolicy::AverageUnderBarrier { repeats },
            samples: Box::new([total]),
            elapsed: total / divisor,
        }
    }

    /// The policy that produced the measurement.
    #[must_use]
    pub fn policy(&self) -> TimingPolicy {
        self.policy
    }

    /// The raw timer readings: one per run for [`TimingPolicy::MinimumOfRuns`], a single
    /// total for [`TimingPolicy::AverageUnderBarrier`].
    #[must_use]
    pub fn samples(&self) -> &[Duration] {
        &self.samples
    }

    /// The reported time of one pass.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The minimum over the first `r` samples, for every `r` in `1..=samples().len()`.
    ///
    /// This is what the minimum-of-R policy would have reported had it stopped after `r`
    /// runs. It never increases with `r`.
    pub fn prefix_minimums(&self) -> impl Iterator<Item = Duration> {
        self.samples.iter().scan(Duration::MAX, |minimum, &sample| {
            *minimum = (*minimum).min(sample);
            Some(*minimum)
        })
    }
}
