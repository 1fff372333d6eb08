use std::num::NonZero;

use new_zealand::nz;

use crate::{
    Affinity, ChecksumSampling, Error, Kernel, LoopOrder, Pattern, Result, Strategy, TimingPolicy,
};

/// Side of a blocked tile, unless configured otherwise.
pub const DEFAULT_BLOCK_SIZE: NonZero<usize> = nz!(32);

/// The parameters of one benchmark trial.
///
/// # Examples
///
/// ```
/// use new_zealand::nz;
/// use partition_bench::{Kernel, Pattern, TimingPolicy, TrialConfig};
///
/// let config = TrialConfig::new(256, 8, Pattern::Morton)?
///     .with_kernel(Kernel::MatrixVector)
///     .with_timing(TimingPolicy::AverageUnderBarrier { repeats: nz!(10) });
///
/// assert_eq!(config.size(), 256);
/// assert_eq!(config.workers().get(), 8);
/// # Ok::<(), partition_bench::Error>(())
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct TrialConfig {
    size: NonZero<usize>,
    workers: NonZero<usize>,
    pattern: Pattern,
    block_size: NonZero<usize>,
    warmup: usize,
    timing: TimingPolicy,
    kernel: Kernel,
    loop_order: LoopOrder,
    affinity: Affinity,
    checksum: Option<ChecksumSampling>,
}

impl TrialConfig {
    /// A trial over an N×N matrix with `workers` workers, partitioned by `pattern`, using
    /// default values for everything else.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `size` or `workers` is zero.
    pub fn new(size: usize, workers: usize, pattern: Pattern) -> Result<Self> {
        let size = NonZero::new(size)
            .ok_or_else(|| Error::configuration("matrix dimension must be positive"))?;
        let workers = NonZero::new(workers)
            .ok_or_else(|| Error::configuration("worker count must be positive"))?;

        Ok(Self {
            size,
            workers,
            pattern,
            block_size: DEFAULT_BLOCK_SIZE,
            warmup: crate::DEFAULT_WARMUP,
            timing: TimingPolicy::default(),
            kernel: Kernel::default(),
            loop_order: LoopOrder::default(),
            affinity: Affinity::default(),
            checksum: None,
        })
    }

    /// Sets the side of a blocked tile. Only used by [`Pattern::BlockedTiles`].
    #[must_use]
    pub fn with_block_size(mut self, block_size: NonZero<usize>) -> Self {
        self.block_size = block_size;
        self
    }

    /// Sets how many unmeasured passes run before timing starts. Zero disables warmup.
    #[must_use]
    pub fn with_warmup(mut self, warmup: usize) -> Self {
        self.warmup = warmup;
        self
    }

    /// Sets how elapsed time is measured.
    #[must_use]
    pub fn with_timing(mut self, timing: TimingPolicy) -> Self {
        self.timing = timing;
        self
    }

    /// Sets the work performed for every output cell.
    #[must_use]
    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }

    /// Sets how the kernel's loops are nested for the cells of each worker. The kernel has to
    /// [support][Kernel::supports] the order, which is checked when the trial is created.
    #[must_use]
    pub fn with_loop_order(mut self, loop_order: LoopOrder) -> Self {
        self.loop_order = loop_order;
        self
    }

    /// Sets whether workers are pinned to processors.
    #[must_use]
    pub fn with_affinity(mut self, affinity: Affinity) -> Self {
        self.affinity = affinity;
        self
    }

    /// Sets which output cells are summed into the checksum.
    #[must_use]
    pub fn with_checksum(mut self, checksum: ChecksumSampling) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// N, the dimension of the input matrices.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size.get()
    }

    /// T, the number of workers.
    #[must_use]
    pub fn workers(&self) -> NonZero<usize> {
        self.workers
    }

    /// How the output is divided between workers.
    #[must_use]
    pub fn pattern(&self) -> Pattern {
        self.pattern
    }

    /// Side of a blocked tile.
    #[must_use]
    pub fn block_size(&self) -> NonZero<usize> {
        self.block_size
    }

    /// Unmeasured passes run before timing starts.
    #[must_use]
    pub fn warmup(&self) -> usize {
        self.warmup
    }

    /// How elapsed time is measured.
    #[must_use]
    pub fn timing(&self) -> TimingPolicy {
        self.timing
    }

    /// The work performed for every output cell.
    #[must_use]
    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    /// How the kernel's loops are nested.
    #[must_use]
    pub fn loop_order(&self) -> LoopOrder {
        self.loop_order
    }

    /// Whether workers are pinned to processors.
    #[must_use]
    pub fn affinity(&self) -> Affinity {
        self.affinity
    }

    /// Which output cells are summed into the checksum, if configured.
    ///
    /// When `None`, the trial picks [`ChecksumSampling::for_grid()`] for its output grid.
    #[must_use]
    pub fn checksum(&self) -> Option<ChecksumSampling> {
        self.checksum
    }

    /// The partition strategy selected by the pattern and block size.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        Strategy::new(self.pattern, self.block_size)
    }
}
