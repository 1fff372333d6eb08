#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Benchmarks how the way a matrix is partitioned between worker threads affects throughput.
//!
//! A benchmark is a series of [`Trial`]s. Each trial fixes a matrix dimension N, a worker
//! count T and a [`Pattern`] that decides which output cells each worker owns. The trial
//! verifies that the pattern covers every cell exactly once, runs warmup passes, times the
//! measured passes under a [`TimingPolicy`] and reports a [`TrialResult`] with the elapsed time
//! of one pass and a checksum of the output.
//!
//! The core functionality includes:
//! - [`Strategy`] - The six partitioning rules, each yielding a worker's cells as [`Span`]s
//! - [`PartitionPlan`] - A partition verified to cover the output exactly once
//! - [`Trial`] - One end-to-end measurement over a [`TrialConfig`]
//! - [`LoopOrder`] - How a kernel's loops are nested over the cells a worker owns
//! - [`ChecksumSampling`] - The cheap output checksum that flags partitioning bugs
//! - [`ScalingReport`] - Speedup and efficiency relative to single-worker results
//!
//! This package is not meant for use in production, serving only as a development tool for
//! studying cache behavior and parallel scaling.
//!
//! # Operating Principles
//!
//! ## Disjoint writes
//!
//! Workers write to one shared output buffer without locking. This is sound only because the
//! cells of different workers never overlap. Rather than trusting each strategy to get its
//! arithmetic right, every trial walks the full partition once when it is created and refuses
//! to run if any cell is unowned, owned twice or out of bounds.
//!
//! ## Timing policies
//!
//! [`TimingPolicy::MinimumOfRuns`] times every run separately, with fresh threads, and reports
//! the shortest run. [`TimingPolicy::AverageUnderBarrier`] starts the threads once, makes
//! barrier-separated passes under one timer and reports the mean. The numbers measure different
//! things and are labeled with the policy that produced them.
//!
//! ## Pinning
//!
//! With [`Affinity::PinToCores`], worker `t` is pinned to the `t mod P`-th available processor.
//! Pinning is advisory: where processors cannot be enumerated, workers run unpinned.
//!
//! # Example
//!
//! ```
//! use partition_bench::{Pattern, Trial, TrialConfig};
//!
//! for pattern in Pattern::ALL {
//!     let config = TrialConfig::new(32, 4, pattern)?;
//!     let outcome = Trial::new(config)?.execute()?;
//!
//!     println!("{}", outcome.result());
//! }
//! # Ok::<(), partition_bench::Error>(())
//! ```

mod affinity;
mod buffers;
mod checksum;
mod config;
mod driver;
mod error;
mod grid;
mod kernel;
mod loop_order;
mod metrics;
mod partition;
mod pattern;
mod plan;
mod pool;
mod record;
mod timing;

pub use affinity::*;
pub use checksum::*;
pub use config::*;
pub use driver::*;
pub use error::Error;
pub(crate) use error::Result;
pub use grid::{Grid, Span};
pub use kernel::Kernel;
pub use loop_order::*;
pub use metrics::*;
pub use partition::{Spans, Strategy, WorkerId, morton};
pub use pattern::*;
pub use plan::*;
pub use pool::WorkerReport;
pub use record::*;
pub use timing::*;
