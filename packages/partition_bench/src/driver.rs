use std::num::NonZero;
use std::time::Instant;

use new_zealand::nz;

use crate::buffers::TrialBuffers;
use crate::pool::{PoolTask, WorkerPool};
use crate::{
    ChecksumSampling, Grid, Measurement, PartitionPlan, Result, TimingPolicy, TrialConfig,
    TrialResult, WorkerReport,
};

/// One benchmark trial: a matrix size, a worker count and a pattern, with everything needed
/// to run them already allocated and verified.
///
/// A trial owns its buffers and runs exactly once. Executing a trial consumes it, so no
/// trial can start from the output of another.
///
/// # Examples
///
/// ```
/// use partition_bench::{Pattern, Trial, TrialConfig};
///
/// let trial = Trial::new(TrialConfig::new(64, 4, Pattern::BlockedTiles)?)?;
/// let outcome = trial.execute()?;
///
/// assert!(outcome.output().iter().all(|&value| value == 3.0));
/// println!("{}", outcome.result());
/// # Ok::<(), partition_bench::Error>(())
/// ```
#[derive(Debug)]
pub struct Trial {
    config: TrialConfig,
    grid: Grid,
    plan: PartitionPlan,
    buffers: TrialBuffers,
    pool: WorkerPool,
    phase: TrialPhase,
}

/// The trial lifecycle. Phases are only ever entered in declaration order.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, derive_more::Display)]
enum TrialPhase {
    #[display("idle")]
    Idle,

    #[display("warming up")]
    WarmingUp,

    #[display("timing")]
    Timing,

    #[display("done")]
    Done,
}

impl Trial {
    /// Prepares a trial: verifies the partition and allocates and fills the buffers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`][crate::Error::Configuration] if the matrix is too large
    /// to address or the kernel does not support the loop order,
    /// [`Error::Allocation`][crate::Error::Allocation] if a buffer cannot be
    /// allocated, or a partition error if the selected strategy does not cover the output
    /// exactly once.
    pub fn new(config: TrialConfig) -> Result<Self> {
        config.kernel().check_supports(config.loop_order())?;

        let grid = config.kernel().output_grid(config.size())?;
        let plan = PartitionPlan::new(config.strategy(), grid, config.workers())?;
        let buffers = TrialBuffers::new(config.kernel(), config.size())?;
        let pool = WorkerPool::new(config.workers(), config.affinity());

        tracing::debug!(
            size = config.size(),
            workers = config.workers().get(),
            pattern = %config.pattern(),
            kernel = %config.kernel(),
            loop_order = %config.loop_order(),
            timing = config.timing().label(),
            "trial prepared"
        );

        Ok(Self {
            config,
            grid,
            plan,
            buffers,
            pool,
            phase: TrialPhase::Idle,
        })
    }

    /// The parameters of the trial.
    #[must_use]
    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    /// The verified partition the workers will follow.
    #[must_use]
    pub fn plan(&self) -> &PartitionPlan {
        &self.plan
    }

    /// Runs the warmup passes, then the measured passes, and reports the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ThreadCreation`][crate::Error::ThreadCreation] if the worker threads
    /// cannot be started. Nothing is retried.
    ///
    /// # Panics
    ///
    /// Re-raises the panic of any worker that panics.
    #[cfg_attr(test, mutants::skip)] // Timing loops, verified by the integration tests.
    pub fn execute(mut self) -> Result<TrialOutcome> {
        self.enter(TrialPhase::WarmingUp);

        if let Some(warmup) = NonZero::new(self.config.warmup()) {
            self.run_pool(warmup, self.config.kernel().is_accumulative())?;
        }

        self.enter(TrialPhase::Timing);

        let (measurement, worker_reports) = match self.config.timing() {
            TimingPolicy::MinimumOfRuns { runs } => self.time_minimum_of(runs)?,
            TimingPolicy::AverageUnderBarrier { repeats } => self.time_average_of(repeats)?,
        };

        self.enter(TrialPhase::Done);

        let checksum = self
            .config
            .checksum()
            .unwrap_or_else(|| ChecksumSampling::for_grid(self.grid))
            .checksum(self.grid, self.buffers.output());

        let result = TrialResult::new(
            self.config.size(),
            self.config.workers(),
            self.config.pattern(),
            self.config.kernel(),
            self.config.loop_order(),
            measurement.policy(),
            measurement.elapsed(),
            checksum,
        );

        tracing::debug!(%result, "trial finished");

        Ok(TrialOutcome {
            result,
            measurement,
            worker_reports,
            grid: self.grid,
            output: self.buffers.into_output(),
        })
    }

    /// Each run gets fresh threads and its own timer. The output reset, when needed, happens
    /// outside the timer.
    fn time_minimum_of(
        &mut self,
        runs: NonZero<usize>,
    ) -> Result<(Measurement, Box<[WorkerReport]>)> {
        let mut samples = Vec::with_capacity(runs.get());
        let mut reports = Box::default();

        for _ in 0..runs.get() {
            if self.config.kernel().is_accumulative() {
                self.buffers.reset_output();
            }

            let start = Instant::now();
            reports = self.run_pool(nz!(1), false)?;
            samples.push(start.elapsed());
        }

        Ok((Measurement::minimum_of(samples.into_boxed_slice()), reports))
    }

    /// One set of threads makes every pass under a single timer. Accumulating kernels reset
    /// their cells inside each pass, as the pass boundaries are only visible to the workers.
    fn time_average_of(
        &mut self,
        repeats: NonZero<usize>,
    ) -> Result<(Measurement, Box<[WorkerReport]>)> {
        let accumulative = self.config.kernel().is_accumulative();

        if accumulative {
            self.buffers.reset_output();
        }

        let start = Instant::now();
        let reports = self.run_pool(repeats, accumulative)?;
        let total = start.elapsed();

        Ok((Measurement::average_of(total, repeats), reports))
    }

    fn run_pool(
        &mut self,
        repeats: NonZero<usize>,
        reset_each_pass: bool,
    ) -> Result<Box<[WorkerReport]>> {
        let (operands, output) = self.buffers.split();

        self.pool.run(&PoolTask {
            plan: &self.plan,
            kernel: self.config.kernel(),
            order: self.config.loop_order(),
            operands,
            output,
            repeats,
            reset_each_pass,
        })
    }

    fn enter(&mut self, phase: TrialPhase) {
        debug_assert!(phase > self.phase, "trial cannot go from {} to {phase}", self.phase);

        tracing::debug!(from = %self.phase, to = %phase, "trial phase changed");

        self.phase = phase;
    }
}

/// Everything a finished trial produced.
#[derive(Debug)]
pub struct TrialOutcome {
    result: TrialResult,
    measurement: Measurement,
    worker_reports: Box<[WorkerReport]>,
    grid: Grid,
    output: Box<[f64]>,
}

impl TrialOutcome {
    /// The result record of the trial.
    #[must_use]
    pub fn result(&self) -> TrialResult {
        self.result
    }

    /// The raw timing data behind [`TrialResult::elapsed()`].
    #[must_use]
    pub fn measurement(&self) -> &Measurement {
        &self.measurement
    }

    /// What each worker did during the last measured pool run, in worker order.
    #[must_use]
    pub fn worker_reports(&self) -> &[WorkerReport] {
        &self.worker_reports
    }

    /// The index space of [`output()`][Self::output].
    #[must_use]
    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// The output buffer after the last measured pass.
    #[must_use]
    pub fn output(&self) -> &[f64] {
        &self.output
    }
}

#[cfg(test)]
mod tests {
    use testing::with_watchdog;

    use super::*;
    use crate::{Error, Kernel, LoopOrder, Pattern};

    #[test]
    fn phases_are_ordered() {
        assert!(TrialPhase::Idle < TrialPhase::WarmingUp);
        assert!(TrialPhase::WarmingUp < TrialPhase::Timing);
        assert!(TrialPhase::Timing < TrialPhase::Done);
    }

    #[test]
    fn minimum_policy_keeps_one_sample_per_run() {
        with_watchdog(|| {
            let config = TrialConfig::new(8, 2, Pattern::ContiguousRows)
                .unwrap()
                .with_timing(TimingPolicy::MinimumOfRuns { runs: nz!(4) });

            let outcome = Trial::new(config).unwrap().execute().unwrap();

            assert_eq!(outcome.measurement().samples().len(), 4);
            assert_eq!(
                outcome.measurement().elapsed(),
                outcome.measurement().samples().iter().copied().min().unwrap()
            );
            assert_eq!(outcome.result().timing().label(), "min_of_R");
        });
    }

    #[test]
    fn barrier_policy_keeps_one_total() {
        with_watchdog(|| {
            let config = TrialConfig::new(8, 3, Pattern::Morton)
                .unwrap()
                .with_timing(TimingPolicy::AverageUnderBarrier { repeats: nz!(6) });

            let outcome = Trial::new(config).unwrap().execute().unwrap();
            let measurement = outcome.measurement();

            assert_eq!(measurement.samples().len(), 1);
            assert_eq!(measurement.elapsed(), measurement.samples()[0] / 6);

            let cells = outcome
                .worker_reports()
                .iter()
                .map(WorkerReport::cells_written)
                .sum::<usize>();
            assert_eq!(cells, 64 * 6);
        });
    }

    #[test]
    fn trial_without_warmup_still_fills_output() {
        with_watchdog(|| {
            let config = TrialConfig::new(5, 2, Pattern::ContiguousColumns)
                .unwrap()
                .with_warmup(0);

            let outcome = Trial::new(config).unwrap().execute().unwrap();

            assert!(outcome.output().iter().all(|&value| value == 3.0));
            assert_eq!(outcome.grid(), Grid::square(5).unwrap());
        });
    }

    #[test]
    fn matrix_vector_trial_writes_a_vector() {
        with_watchdog(|| {
            let config = TrialConfig::new(16, 4, Pattern::FlattenedLinear)
                .unwrap()
                .with_kernel(Kernel::MatrixVector);

            let trial = Trial::new(config).unwrap();
            assert_eq!(trial.plan().grid(), Grid::new(16, 1).unwrap());
            assert_eq!(trial.config().kernel(), Kernel::MatrixVector);

            let outcome = trial.execute().unwrap();

            assert_eq!(outcome.output().len(), 16);
            for &value in outcome.output() {
                testing::assert_close(value, 3.0);
            }

            // The whole vector is summed: 16 cells of 3.0.
            testing::assert_close(outcome.result().checksum(), 48.0);
        });
    }

    #[test]
    fn unsupported_loop_order_is_rejected_before_allocating() {
        let config = TrialConfig::new(usize::MAX / 2, 4, Pattern::ContiguousRows)
            .unwrap()
            .with_loop_order(LoopOrder::Ijk);

        // Would otherwise fail as too large to address.
        let error = Trial::new(config).unwrap_err();

        assert!(matches!(error, Error::Configuration { .. }));
        assert!(error.to_string().contains("loop order ijk"), "{error}");
    }

    #[test]
    fn blocked_matrix_multiply_trial_matches_natural() {
        with_watchdog(|| {
            let outputs = [LoopOrder::Natural, LoopOrder::Blocked].map(|order| {
                let config = TrialConfig::new(40, 3, Pattern::BlockedTiles)
                    .unwrap()
                    .with_kernel(Kernel::MatrixMultiply)
                    .with_loop_order(order)
                    .with_warmup(1);

                let outcome = Trial::new(config).unwrap().execute().unwrap();
                assert_eq!(outcome.result().loop_order(), order);

                outcome.output().to_vec()
            });

            assert_eq!(outputs[0], outputs[1]);
        });
    }
}
