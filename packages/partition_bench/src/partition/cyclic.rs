use std::iter::StepBy;
use std::ops::Range;

use crate::grid::Span;
use crate::{Grid, WorkerId};

/// One contiguous span for every `T`-th row, starting from the worker's own index.
///
/// Neighboring rows belong to different workers, so writes from different workers land close
/// to each other in memory.
#[derive(Clone, Debug)]
pub(crate) struct CyclicSpans {
    grid: Grid,
    rows: StepBy<Range<usize>>,
}

impl CyclicSpans {
    pub(crate) fn new(grid: Grid, worker: WorkerId) -> Self {
        let first_row = worker.index().min(grid.rows());

        Self {
            grid,
            rows: (first_row..grid.rows()).step_by(worker.count().get()),
        }
    }
}

impl Iterator for CyclicSpans {
    type Item = Span;

    #[inline]
    fn next(&mut self) -> Option<Span> {
        let row = self.rows.next()?;

        Some(Span::contiguous(self.grid.index(row, 0), self.grid.cols()))
    }
}
