//! Runs every partitioning pattern across a range of matrix sizes and worker counts and prints
//! one CSV record per trial, followed by the speedup and efficiency of each record.
//!
//! Records go to stdout and diagnostics to stderr, so the records can be redirected to a file:
//!
//! ```text
//! cargo run --release --example sweep > results.csv
//! ```

#![allow(missing_docs, reason = "No need for API documentation in example code")]

use std::error::Error;
use std::io;
use std::iter;
use std::thread;

use partition_bench::{
    Affinity, DEFAULT_RUNS, Pattern, ScalingReport, TimingPolicy, Trial, TrialConfig,
};

const SIZES: [usize; 3] = [256, 512, 1024];

const POLICIES: [TimingPolicy; 2] = [
    TimingPolicy::MinimumOfRuns { runs: DEFAULT_RUNS },
    TimingPolicy::AverageUnderBarrier {
        repeats: DEFAULT_RUNS,
    },
];

fn main() -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(io::stderr)
        .init();

    let max_workers = thread::available_parallelism()?.get();
    let worker_counts = worker_counts(max_workers);

    eprintln!("Sweeping {} sizes over worker counts {worker_counts:?}", SIZES.len());

    let mut results = Vec::new();

    for timing in POLICIES {
        for size in SIZES {
            for pattern in Pattern::ALL {
                for &workers in &worker_counts {
                    let config = TrialConfig::new(size, workers, pattern)?
                        .with_timing(timing)
                        .with_affinity(Affinity::PinToCores);

                    let result = Trial::new(config)?.execute()?.result();

                    println!("{result:#}");
                    results.push(result);
                }
            }
        }
    }

    println!();
    println!("size,workers,pattern,loop_order,timing,gflops,speedup,efficiency_pct");

    for entry in ScalingReport::from_results(results).entries() {
        let result = entry.result();

        println!(
            "{},{},{},{},{},{:.3},{},{}",
            result.size(),
            result.workers(),
            result.pattern(),
            result.loop_order(),
            result.timing().label(),
            result.gflops(),
            entry
                .speedup()
                .map_or_else(String::new, |speedup| format!("{speedup:.3}")),
            entry
                .efficiency()
                .map_or_else(String::new, |efficiency| format!("{efficiency:.1}")),
        );
    }

    Ok(())
}

/// Powers of two up to the processor count, plus the processor count itself.
fn worker_counts(max_workers: usize) -> Vec<usize> {
    let mut counts = iter::successors(Some(1_usize), |count| count.checked_mul(2))
        .take_while(|&count| count <= max_workers)
        .collect::<Vec<_>>();

    if counts.last() != Some(&max_workers) {
        counts.push(max_workers);
    }

    counts
}
