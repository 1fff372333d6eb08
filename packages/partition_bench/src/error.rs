use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

/// Errors that can prevent a benchmark trial from producing a result.
///
/// Every error is fatal for the trial that raised it. Nothing is retried, as a retried
/// trial would no longer measure what it claims to measure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The trial parameters are invalid. Detected before any buffer is allocated.
    #[error("invalid trial configuration: {problem}")]
    Configuration {
        /// A human-readable description of the problem.
        problem: String,
    },

    /// A trial buffer could not be allocated.
    #[error("failed to allocate a buffer of {elements} elements")]
    Allocation {
        /// How many `f64` elements the buffer was supposed to hold.
        elements: usize,

        /// The underlying allocation failure.
        #[source]
        source: TryReserveError,
    },

    /// The operating system refused to start one of the worker threads.
    ///
    /// Launch is all-or-nothing: any workers already started were released without
    /// touching the trial buffers before this error was returned.
    #[error("failed to start worker thread {worker}")]
    ThreadCreation {
        /// Index of the worker whose thread could not be started.
        worker: usize,

        /// The underlying spawn failure.
        #[source]
        source: io::Error,
    },

    /// A partition strategy assigned a worker a cell that does not exist.
    #[error("worker {worker} was assigned cell {cell}, which is outside the {cells}-cell grid")]
    PartitionOutOfBounds {
        /// The offending worker.
        worker: usize,

        /// The linear index of the nonexistent cell.
        cell: usize,

        /// How many cells the grid has.
        cells: usize,
    },

    /// A partition strategy assigned the same cell to more than one worker.
    #[error("cell {cell} was assigned to worker {worker} after already being assigned to another worker")]
    PartitionOverlap {
        /// The worker that made the second claim.
        worker: usize,

        /// The linear index of the doubly claimed cell.
        cell: usize,
    },

    /// A partition strategy left a cell without any owner.
    #[error("cell {cell} is not assigned to any worker")]
    PartitionGap {
        /// The linear index of the first unowned cell.
        cell: usize,
    },
}

impl Error {
    pub(crate) fn configuration(problem: impl Into<String>) -> Self {
        Self::Configuration {
            problem: problem.into(),
        }
    }
}

/// A specialized `Result` type for trial operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn configuration_error_mentions_problem() {
        let error = Error::configuration("matrix dimension must be positive");

        assert_eq!(
            error.to_string(),
            "invalid trial configuration: matrix dimension must be positive"
        );
    }

    #[test]
    fn allocation_error_exposes_source() {
        let source = Vec::<f64>::new()
            .try_reserve_exact(usize::MAX)
            .expect_err("reserving usize::MAX elements cannot succeed");

        let error = Error::Allocation {
            elements: usize::MAX,
            source,
        };

        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn partition_errors_describe_the_cell() {
        let overlap = Error::PartitionOverlap { worker: 3, cell: 17 };
        assert!(overlap.to_string().contains("cell 17"));
        assert!(overlap.to_string().contains("worker 3"));

        let gap = Error::PartitionGap { cell: 5 };
        assert_eq!(gap.to_string(), "cell 5 is not assigned to any worker");
    }
}
