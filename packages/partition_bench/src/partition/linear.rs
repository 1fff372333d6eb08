use crate::grid::{Span, chunk};
use crate::{Grid, WorkerId};

/// The single chunk of the flattened buffer owned by a worker. Chunks may start and end in
/// the middle of a row.
#[derive(Clone, Debug)]
pub(crate) struct LinearSpans {
    span: Option<Span>,
}

impl LinearSpans {
    pub(crate) fn new(grid: Grid, worker: WorkerId) -> Self {
        let cells = chunk(grid.cells(), worker.index(), worker.count());

        Self {
            span: (!cells.is_empty()).then(|| Span::contiguous(cells.start, cells.len())),
        }
    }
}

impl Iterator for LinearSpans {
    type Item = Span;

    #[inline]
    fn next(&mut self) -> Option<Span> {
        self.span.take()
    }
}
