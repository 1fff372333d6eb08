use std::ops::Range;

use crate::grid::{Span, chunk};
use crate::{Grid, WorkerId};

/// One contiguous span per row of the band owned by a worker.
#[derive(Clone, Debug)]
pub(crate) struct RowSpans {
    grid: Grid,
    rows: Range<usize>,
}

impl RowSpans {
    pub(crate) fn new(grid: Grid, worker: WorkerId) -> Self {
        Self {
            grid,
            rows: chunk(grid.rows(), worker.index(), worker.count()),
        }
    }
}

impl Iterator for RowSpans {
    type Item = Span;

    #[inline]
    fn next(&mut self) -> Option<Span> {
        let row = self.rows.next()?;

        Some(Span::contiguous(self.grid.index(row, 0), self.grid.cols()))
    }
}
