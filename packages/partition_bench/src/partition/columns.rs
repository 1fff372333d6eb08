use std::ops::Range;

use crate::grid::{Span, chunk};
use crate::{Grid, WorkerId};

/// One strided span per column of the band owned by a worker, each walking the column
/// from the top row to the bottom row.
#[derive(Clone, Debug)]
pub(crate) struct ColumnSpans {
    grid: Grid,
    cols: Range<usize>,
}

impl ColumnSpans {
    pub(crate) fn new(grid: Grid, worker: WorkerId) -> Self {
        Self {
            grid,
            cols: chunk(grid.cols(), worker.index(), worker.count()),
        }
    }
}

impl Iterator for ColumnSpans {
    type Item = Span;

    #[inline]
    fn next(&mut self) -> Option<Span> {
        let col = self.cols.next()?;

        Some(Span::strided(
            self.grid.index(0, col),
            self.grid.rows(),
            self.grid.row_stride(),
        ))
    }
}
