//! Throughput and scaling figures derived from trial results.

use std::collections::HashMap;
use std::num::NonZero;
use std::time::Duration;

use crate::{Kernel, LoopOrder, Pattern, TimingPolicy, TrialResult};

/// Billions of floating-point operations per second for `flops` operations done in `elapsed`.
///
/// Returns infinity if `elapsed` is zero.
#[must_use]
pub fn gflops(flops: f64, elapsed: Duration) -> f64 {
    flops / elapsed.as_secs_f64() / 1e9
}

/// How many times faster `elapsed` is than the single-worker `baseline`.
#[must_use]
#[expect(
    clippy::cast_precision_loss,
    reason = "precision loss acceptable for a ratio"
)]
pub fn speedup(baseline: Duration, elapsed: Duration) -> f64 {
    baseline.as_nanos() as f64 / elapsed.as_nanos() as f64
}

/// Speedup per worker, as a percentage. 100% is perfect linear scaling.
#[must_use]
#[expect(
    clippy::cast_precision_loss,
    reason = "worker counts are far below the f64 mantissa limit"
)]
pub fn efficiency(speedup: f64, workers: NonZero<usize>) -> f64 {
    speedup / workers.get() as f64 * 100.0
}

/// Trial results annotated with their speedup and efficiency relative to the single-worker
/// result of the same configuration.
///
/// Results are compared only with results of the same matrix size, pattern, kernel, loop
/// order and timing policy. A result with no single-worker counterpart has no scaling figures.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalingReport {
    entries: Box<[ScalingEntry]>,
}

/// One row of a [`ScalingReport`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScalingEntry {
    result: TrialResult,
    speedup: Option<f64>,
    efficiency: Option<f64>,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
struct GroupKey {
    size: usize,
    pattern: Pattern,
    kernel: Kernel,
    order: LoopOrder,
    timing: TimingPolicy,
}

impl GroupKey {
    fn of(result: &TrialResult) -> Self {
        Self {
            size: result.size(),
            pattern: result.pattern(),
            kernel: result.kernel(),
            order: result.loop_order(),
            timing: result.timing(),
        }
    }
}

impl ScalingReport {
    /// Annotates `results`, keeping their order.
    ///
    /// If a configuration has more than one single-worker result, the first one is the
    /// baseline.
    #[must_use]
    pub fn from_results(results: impl IntoIterator<Item = TrialResult>) -> Self {
        let results = results.into_iter().collect::<Vec<_>>();

        let mut baselines = HashMap::new();

        for result in results.iter().filter(|result| result.workers().get() == 1) {
            baselines
                .entry(GroupKey::of(result))
                .or_insert_with(|| result.elapsed());
        }

        let entries = results
            .into_iter()
            .map(|result| {
                let ratio = baselines
                    .get(&GroupKey::of(&result))
                    .map(|&baseline| speedup(baseline, result.elapsed()));

                ScalingEntry {
                    result,
                    speedup: ratio,
                    efficiency: ratio.map(|ratio| efficiency(ratio, result.workers())),
                }
            })
            .collect();

        Self { entries }
    }

    /// The annotated results, in the order they were supplied.
    #[must_use]
    pub fn entries(&self) -> &[ScalingEntry] {
        &self.entries
    }
}

impl ScalingEntry {
    /// The annotated result.
    #[must_use]
    pub fn result(&self) -> &TrialResult {
        &self.result
    }

    /// `Time(T=1) / Time(T)`, if there is a single-worker baseline.
    #[must_use]
    pub fn speedup(&self) -> Option<f64> {
        self.speedup
    }

    /// `Speedup(T) / T × 100`, if there is a single-worker baseline.
    #[must_use]
    pub fn efficiency(&self) -> Option<f64> {
        self.efficiency
    }
}

#[cfg(test)]
mod tests {
    use new_zealand::nz;

    use super::*;

    fn result(
        workers: NonZero<usize>,
        pattern: Pattern,
        timing: TimingPolicy,
        millis: u64,
    ) -> TrialResult {
        result_in(LoopOrder::Natural, workers, pattern, timing, millis)
    }

    fn result_in(
        order: LoopOrder,
        workers: NonZero<usize>,
        pattern: Pattern,
        timing: TimingPolicy,
        millis: u64,
    ) -> TrialResult {
        TrialResult::new(
            256,
            workers,
            pattern,
            Kernel::ElementwiseAdd,
            order,
            timing,
            Duration::from_millis(millis),
            48.0,
        )
    }

    #[test]
    fn ratio_helpers() {
        testing::assert_close(gflops(2e9, Duration::from_secs(1)), 2.0);
        testing::assert_close(
            speedup(Duration::from_millis(80), Duration::from_millis(20)),
            4.0,
        );
        testing::assert_close(efficiency(4.0, nz!(8)), 50.0);
    }

    #[test]
    fn report_derives_ratios_from_single_worker_baseline() {
        let minimum = TimingPolicy::default();

        let report = ScalingReport::from_results([
            result(nz!(1), Pattern::ContiguousRows, minimum, 80),
            result(nz!(2), Pattern::ContiguousRows, minimum, 40),
            result(nz!(4), Pattern::ContiguousRows, minimum, 40),
        ]);

        let speedups = report
            .entries()
            .iter()
            .map(|entry| entry.speedup().unwrap())
            .collect::<Vec<_>>();
        let efficiencies = report
            .entries()
            .iter()
            .map(|entry| entry.efficiency().unwrap())
            .collect::<Vec<_>>();

        for (actual, expected) in speedups.into_iter().zip([1.0, 2.0, 2.0]) {
            testing::assert_close(actual, expected);
        }
        for (actual, expected) in efficiencies.into_iter().zip([100.0, 100.0, 50.0]) {
            testing::assert_close(actual, expected);
        }
    }

    #[test]
    fn groups_do_not_share_baselines() {
        let minimum = TimingPolicy::default();
        let barrier = TimingPolicy::AverageUnderBarrier { repeats: nz!(5) };

        let report = ScalingReport::from_results([
            result(nz!(1), Pattern::ContiguousRows, minimum, 80),
            // Different pattern: no baseline of its own.
            result(nz!(4), Pattern::Morton, minimum, 20),
            // Different policy: no baseline of its own.
            result(nz!(4), Pattern::ContiguousRows, barrier, 20),
            // Different loop order: no baseline of its own.
            result_in(LoopOrder::Unrolled, nz!(4), Pattern::ContiguousRows, minimum, 20),
        ]);

        let entries = report.entries();
        assert!(entries[0].speedup().is_some());
        assert_eq!(entries[1].speedup(), None);
        assert_eq!(entries[2].efficiency(), None);
        assert_eq!(entries[3].speedup(), None);
        assert_eq!(entries[2].result().timing(), barrier);
    }
}
