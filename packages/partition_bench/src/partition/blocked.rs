use std::num::NonZero;

use crate::grid::{Span, chunk};
use crate::{Grid, WorkerId};

/// Walks the band of rows owned by a worker as a row-major sequence of square tiles,
/// yielding one contiguous span per tile row.
///
/// Tiles span the full width of the grid. Tiles on the right edge of the grid and on the
/// bottom edge of the band are clipped when the extents are not multiples of the block size.
#[derive(Clone, Debug)]
pub(crate) struct TileSpans {
    grid: Grid,
    block_size: usize,

    /// One past the last row of the band.
    band_end: usize,

    /// First row of the current tile.
    tile_row: usize,

    /// First column of the current tile.
    tile_col: usize,

    /// The row of the current tile that yields the next span.
    row: usize,
}

impl TileSpans {
    pub(crate) fn new(grid: Grid, worker: WorkerId, block_size: NonZero<usize>) -> Self {
        let band = chunk(grid.rows(), worker.index(), worker.count());

        Self {
            grid,
            block_size: block_size.get(),
            band_end: band.end,
            tile_row: band.start,
            tile_col: 0,
            row: band.start,
        }
    }
}

impl Iterator for TileSpans {
    type Item = Span;

    #[inline]
    fn next(&mut self) -> Option<Span> {
        loop {
            if self.tile_row >= self.band_end {
                return None;
            }

            if self.tile_col >= self.grid.cols() {
                // Finished this row of tiles, move down to the next one.
                self.tile_row = self.tile_row.saturating_add(self.block_size);
                self.tile_col = 0;
                self.row = self.tile_row;
                continue;
            }

            let tile_row_end = self
                .tile_row
                .saturating_add(self.block_size)
                .min(self.band_end);

            if self.row >= tile_row_end {
                // Finished this tile, move right to the next one.
                self.tile_col = self.tile_col.saturating_add(self.block_size);
                self.row = self.tile_row;
                continue;
            }

            let tile_col_end = self
                .tile_col
                .saturating_add(self.block_size)
                .min(self.grid.cols());

            let span = Span::contiguous(
                self.grid.index(self.row, self.tile_col),
                tile_col_end.saturating_sub(self.tile_col),
            );

            self.row = self.row.saturating_add(1);

            return Some(span);
        }
    }
}
