use std::iter::StepBy;
use std::num::NonZero;
use std::ops::Range;

use num_integer::Integer;

use crate::{Error, Result};

/// The row-major index space of a trial's output buffer.
///
/// Cell `(row, col)` lives at linear index `row * cols + col`. Elementwise and
/// matrix-multiply kernels write an N×N grid; the matrix-vector kernel writes an N×1 grid.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Grid {
    rows: NonZero<usize>,
    cols: NonZero<usize>,
}

impl Grid {
    /// Creates a grid of `rows × cols` cells.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if either extent is zero or if the grid is too large
    /// to be addressed, including by the Morton traversal which needs a power-of-two square
    /// that encloses the grid.
    pub fn new(rows: usize, cols: usize) -> Result<Self> {
        let (Some(row_count), Some(col_count)) = (NonZero::new(rows), NonZero::new(cols)) else {
            return Err(Error::configuration(format!(
                "grid extents must be positive, got {rows}×{cols}"
            )));
        };

        let too_large = || Error::configuration(format!("grid of {rows}×{cols} cells is too large"));

        rows.checked_mul(cols).ok_or_else(too_large)?;

        let side = rows
            .max(cols)
            .checked_next_power_of_two()
            .ok_or_else(too_large)?;
        side.checked_mul(side).ok_or_else(too_large)?;

        Ok(Self {
            rows: row_count,
            cols: col_count,
        })
    }

    /// Creates an N×N grid.
    ///
    /// # Errors
    ///
    /// Same as [`new()`][Self::new].
    pub fn square(size: usize) -> Result<Self> {
        Self::new(size, size)
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows.get()
    }

    /// Number of columns.
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols.get()
    }

    /// Distance in cells between vertically adjacent cells.
    #[must_use]
    pub(crate) fn row_stride(&self) -> NonZero<usize> {
        self.cols
    }

    /// Total number of cells.
    #[must_use]
    #[expect(
        clippy::arithmetic_side_effects,
        reason = "overflow rejected at construction"
    )]
    pub fn cells(&self) -> usize {
        self.rows.get() * self.cols.get()
    }

    /// Linear index of the cell at `(row, col)`.
    #[must_use]
    #[expect(
        clippy::arithmetic_side_effects,
        reason = "in-grid coordinates cannot overflow, overflow rejected at construction"
    )]
    pub fn index(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows() && col < self.cols());

        row * self.cols.get() + col
    }

    /// The `(row, col)` coordinates of a linear index.
    #[must_use]
    pub fn coordinates(&self, index: usize) -> (usize, usize) {
        index.div_rem(&self.cols.get())
    }

    /// Side of the smallest power-of-two square that encloses the grid.
    #[must_use]
    pub(crate) fn morton_side(&self) -> usize {
        // Cannot fail, checked at construction.
        self.rows().max(self.cols()).next_power_of_two()
    }
}

/// A run of cells owned by one worker, visited in order.
///
/// A span starts at linear index `start` and covers `len` cells, each `stride` cells after
/// the previous one. Row traversals produce contiguous spans (stride 1); column traversals
/// produce spans whose stride is the row width.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Span {
    start: usize,
    len: usize,
    stride: NonZero<usize>,
}

impl Span {
    /// A span of `len` adjacent cells starting at `start`.
    #[must_use]
    pub fn contiguous(start: usize, len: usize) -> Self {
        Self {
            start,
            len,
            stride: NonZero::<usize>::MIN,
        }
    }

    /// A span of `len` cells starting at `start`, `stride` cells apart.
    #[must_use]
    pub fn strided(start: usize, len: usize, stride: NonZero<usize>) -> Self {
        Self { start, len, stride }
    }

    /// Linear index of the first cell.
    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of cells in the span.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the span covers no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distance between consecutive cells of the span.
    #[must_use]
    pub fn stride(&self) -> NonZero<usize> {
        self.stride
    }

    /// Whether the cells of the span are adjacent in memory.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.stride.get() == 1 || self.len <= 1
    }

    /// Linear index one past the last cell, for contiguous spans.
    #[must_use]
    #[expect(
        clippy::arithmetic_side_effects,
        reason = "spans are only created for in-grid cells"
    )]
    pub(crate) fn end(&self) -> usize {
        debug_assert!(self.is_contiguous());

        self.start + self.len
    }

    /// The linear indexes of the cells in the span, in traversal order.
    #[expect(
        clippy::arithmetic_side_effects,
        reason = "spans are only created for in-grid cells"
    )]
    pub fn indices(&self) -> StepBy<Range<usize>> {
        let end = if self.len == 0 {
            self.start
        } else {
            self.start + (self.len - 1) * self.stride.get() + 1
        };

        (self.start..end).step_by(self.stride.get())
    }
}

/// Divides and rounds up.
#[expect(
    clippy::arithmetic_side_effects,
    reason = "quotient of a division by a non-zero value is at most usize::MAX / 1"
)]
pub(crate) fn ceil_div(numerator: usize, denominator: NonZero<usize>) -> usize {
    let (quotient, remainder) = numerator.div_rem(&denominator.get());

    if remainder == 0 { quotient } else { quotient + 1 }
}

/// The `index`-th of `count` equal chunks of `0..extent`, the last ones clipped or empty.
///
/// Chunks are `ceil(extent / count)` long, so when `count` does not divide `extent` the final
/// non-empty chunk is shorter and any chunks after it are empty.
pub(crate) fn chunk(extent: usize, index: usize, count: NonZero<usize>) -> Range<usize> {
    let per_chunk = ceil_div(extent, count);

    let start = index.saturating_mul(per_chunk).min(extent);
    let end = start.saturating_add(per_chunk).min(extent);

    start..end
}
