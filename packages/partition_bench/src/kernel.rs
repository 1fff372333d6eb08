use std::ops::Range;

use crate::buffers::{OUTPUT_BASELINE, SharedOutput};
use crate::grid::Span;
use crate::{Grid, LOOP_TILE, LoopOrder, Result};

/// The work performed for every cell of the output.
///
/// Each kernel fills its operands with fixed values when the trial is created, so the output
/// of a correct trial is known in advance.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, derive_more::Display)]
#[non_exhaustive]
pub enum Kernel {
    /// `C[i] = A[i] + B[i]` over an N×N grid, with `A = 1.0` and `B = 2.0`.
    #[default]
    #[display("add")]
    ElementwiseAdd,

    /// `y[i] = Σₖ A[i][k] · x[k]` with `A = 1/N` and `x = 48/N`, writing an N×1 grid.
    #[display("matvec")]
    MatrixVector,

    /// `C[i][j] += Σₖ A[i][k] · B[k][j]` over an N×N grid, with
    /// `A[i][j] = ((i + j) mod 10) · 0.1` and `B[i][j] = ((i − j + N) mod 10) · 0.1`.
    ///
    /// This kernel accumulates into the output, which therefore has to be reset before
    /// every pass.
    #[display("matmul")]
    MatrixMultiply,
}

/// Buffer lengths required by a kernel for a given N.
#[derive(Clone, Copy, Debug)]
pub(crate) struct KernelShape {
    /// The N×N input grid.
    pub(crate) input: Grid,
    pub(crate) lhs_len: usize,
    pub(crate) rhs_len: usize,
    pub(crate) output: Grid,
}

impl Kernel {
    /// Every kernel.
    pub const ALL: [Self; 3] = [
        Self::ElementwiseAdd,
        Self::MatrixVector,
        Self::MatrixMultiply,
    ];

    /// The grid of output cells the kernel writes for an N×N input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`][crate::Error::Configuration] if `size` is zero or too
    /// large to address.
    pub fn output_grid(self, size: usize) -> Result<Grid> {
        match self {
            Self::ElementwiseAdd | Self::MatrixMultiply => Grid::square(size),
            Self::MatrixVector => Grid::new(size, 1),
        }
    }

    pub(crate) fn shape(self, size: usize) -> Result<KernelShape> {
        let input = Grid::square(size)?;

        let rhs_len = match self {
            Self::ElementwiseAdd | Self::MatrixMultiply => input.cells(),
            Self::MatrixVector => size,
        };

        Ok(KernelShape {
            input,
            lhs_len: input.cells(),
            rhs_len,
            output: self.output_grid(size)?,
        })
    }

    /// Number of floating-point operations in one pass over the whole output.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "operation counts are reported as approximate throughput figures"
    )]
    pub fn flop_count(self, size: usize) -> f64 {
        let n = size as f64;

        match self {
            Self::ElementwiseAdd | Self::MatrixVector => 2.0 * n * n,
            Self::MatrixMultiply => 2.0 * n * n * n,
        }
    }

    /// Whether a pass adds to the existing output instead of overwriting it.
    #[must_use]
    pub fn is_accumulative(self) -> bool {
        matches!(self, Self::MatrixMultiply)
    }

    /// Fills the operands with the kernel's fixed input values.
    #[expect(
        clippy::cast_precision_loss,
        reason = "matrix dimensions are far below the f64 mantissa limit"
    )]
    pub(crate) fn fill_operands(self, input: Grid, lhs: &mut [f64], rhs: &mut [f64]) {
        let size = input.rows();

        match self {
            Self::ElementwiseAdd => {
                lhs.fill(1.0);
                rhs.fill(2.0);
            }
            Self::MatrixVector => {
                let n = size as f64;
                lhs.fill(1.0 / n);
                rhs.fill(48.0 / n);
            }
            Self::MatrixMultiply => {
                for (index, (a, b)) in lhs.iter_mut().zip(rhs.iter_mut()).enumerate() {
                    let (row, col) = input.coordinates(index);

                    *a = tenths(row.saturating_add(col));
                    // row + N - col cannot underflow as col < N.
                    *b = tenths(row.saturating_add(size).saturating_sub(col));
                }
            }
        }
    }

    /// Performs one pass of the kernel over the cells of `span`, nesting the kernel's loops
    /// in `order`.
    ///
    /// When `reset_first` is set, the cells are restored to the baseline before an
    /// accumulative kernel adds to them. Overwriting kernels ignore the flag.
    ///
    /// # Safety
    ///
    /// The caller must own every cell of `span` under a verified partition plan of the
    /// kernel's output grid for the duration of the call.
    pub(crate) unsafe fn apply(
        self,
        order: LoopOrder,
        operands: &Operands<'_>,
        output: &SharedOutput<'_>,
        span: Span,
        reset_first: bool,
    ) {
        debug_assert!(self.supports(order), "{self} cannot run in {order} order");

        if span.is_empty() {
            return;
        }

        match self {
            // SAFETY: Forwarding the caller's guarantee.
            Self::ElementwiseAdd => unsafe { operands.add(order, output, span) },
            // SAFETY: Forwarding the caller's guarantee.
            Self::MatrixVector => unsafe { operands.multiply_vector(order, output, span) },
            // SAFETY: Forwarding the caller's guarantee.
            Self::MatrixMultiply => unsafe {
                operands.multiply_matrix(order, output, span, reset_first);
            },
        }
    }
}

/// The read-only inputs of a kernel over an N×N input grid.
///
/// The kernel methods share the safety contract of [`Kernel::apply()`]: the caller owns
/// every cell of the span under a verified partition plan.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Operands<'a> {
    input: Grid,
    lhs: &'a [f64],
    rhs: &'a [f64],
}

impl<'a> Operands<'a> {
    pub(crate) fn new(input: Grid, lhs: &'a [f64], rhs: &'a [f64]) -> Self {
        Self { input, lhs, rhs }
    }

    fn size(&self) -> usize {
        self.input.cols()
    }

    fn lhs_row(&self, row: usize) -> &'a [f64] {
        let start = self.input.index(row, 0);
        &self.lhs[start..start.saturating_add(self.size())]
    }

    fn rhs_row(&self, row: usize) -> &'a [f64] {
        let start = self.input.index(row, 0);
        &self.rhs[start..start.saturating_add(self.size())]
    }

    /// `C = A + B`. Unrolling only applies to contiguous runs.
    unsafe fn add(&self, order: LoopOrder, output: &SharedOutput<'_>, span: Span) {
        if !span.is_contiguous() {
            for index in span.indices() {
                // SAFETY: Forwarding the caller's guarantee.
                let cell = unsafe { output.cell_mut(index) };
                *cell = self.lhs[index] + self.rhs[index];
            }

            return;
        }

        // SAFETY: Forwarding the caller's guarantee.
        let cells = unsafe { output.contiguous_mut(span) };
        let range = span.start()..span.end();
        let (lhs, rhs) = (&self.lhs[range.clone()], &self.rhs[range]);

        if order == LoopOrder::Unrolled {
            add_unrolled(cells, lhs, rhs);
        } else {
            for ((cell, a), b) in cells.iter_mut().zip(lhs).zip(rhs) {
                *cell = a + b;
            }
        }
    }

    /// `y = A · x`, where the span covers cells of `y`.
    unsafe fn multiply_vector(&self, order: LoopOrder, output: &SharedOutput<'_>, span: Span) {
        match order {
            LoopOrder::Jki => {
                // SAFETY: Forwarding the caller's guarantee.
                unsafe { reset_cells(output, span) };

                for (k, &x) in self.rhs.iter().enumerate() {
                    for row in span.indices() {
                        // SAFETY: Forwarding the caller's guarantee.
                        let cell = unsafe { output.cell_mut(row) };
                        *cell += self.lhs[self.input.index(row, k)] * x;
                    }
                }
            }
            LoopOrder::Blocked => {
                // SAFETY: Forwarding the caller's guarantee.
                unsafe { reset_cells(output, span) };

                for first in (0..span.len()).step_by(LOOP_TILE) {
                    let rows = span.indices().skip(first).take(LOOP_TILE);

                    for k_tile in tiles(self.size()) {
                        for row in rows.clone() {
                            // SAFETY: Forwarding the caller's guarantee.
                            let cell = unsafe { output.cell_mut(row) };
                            *cell = dot_from(
                                *cell,
                                &self.lhs_row(row)[k_tile.clone()],
                                self.rhs[k_tile.clone()].iter(),
                            );
                        }
                    }
                }
            }
            LoopOrder::Unrolled => {
                for row in span.indices() {
                    // SAFETY: Forwarding the caller's guarantee.
                    let cell = unsafe { output.cell_mut(row) };
                    *cell = dot_unrolled(self.lhs_row(row), self.rhs);
                }
            }
            _ => {
                for row in span.indices() {
                    // SAFETY: Forwarding the caller's guarantee.
                    let cell = unsafe { output.cell_mut(row) };
                    *cell = dot(self.lhs_row(row), self.rhs.iter());
                }
            }
        }
    }

    /// `C += A · B`, where the span covers cells of `C`.
    unsafe fn multiply_matrix(
        &self,
        order: LoopOrder,
        output: &SharedOutput<'_>,
        span: Span,
        reset_first: bool,
    ) {
        match order {
            LoopOrder::Natural | LoopOrder::Blocked if span.is_contiguous() => {
                // SAFETY: Forwarding the caller's guarantee.
                let cells = unsafe { output.contiguous_mut(span) };

                self.for_each_row_segment(span.start(), cells, |row, col, segment| {
                    if reset_first {
                        segment.fill(OUTPUT_BASELINE);
                    }

                    if order == LoopOrder::Blocked {
                        self.multiply_segment_blocked(row, col, segment);
                    } else {
                        self.multiply_segment(row, col, segment);
                    }
                });
            }
            LoopOrder::Jki if span.stride() == self.input.row_stride() => {
                // SAFETY: Forwarding the caller's guarantee.
                unsafe { self.multiply_column_run(output, span, reset_first) };
            }
            LoopOrder::Jki => {
                for index in span.indices() {
                    // SAFETY: Forwarding the caller's guarantee.
                    unsafe {
                        self.multiply_column_run(
                            output,
                            Span::contiguous(index, 1),
                            reset_first,
                        );
                    }
                }
            }
            _ => {
                for index in span.indices() {
                    // SAFETY: Forwarding the caller's guarantee.
                    let cell = unsafe { output.cell_mut(index) };

                    if reset_first {
                        *cell = OUTPUT_BASELINE;
                    }

                    *cell += self.multiply_cell(index);
                }
            }
        }
    }

    /// `A[i][·] · B[·][j]` for the cell at linear index `i · N + j`.
    fn multiply_cell(&self, index: usize) -> f64 {
        let (row, col) = self.input.coordinates(index);

        let column = self.rhs.iter().skip(col).step_by(self.size());

        dot(self.lhs_row(row), column)
    }

    /// Splits a contiguous run of cells starting at `start` at row boundaries.
    fn for_each_row_segment(
        &self,
        start: usize,
        cells: &mut [f64],
        mut f: impl FnMut(usize, usize, &mut [f64]),
    ) {
        let mut remaining = cells;
        let mut index = start;

        while !remaining.is_empty() {
            let (row, col) = self.input.coordinates(index);
            let segment_len = remaining.len().min(self.size().saturating_sub(col));
            let (segment, rest) = remaining.split_at_mut(segment_len);

            f(row, col, segment);

            index = index.saturating_add(segment_len);
            remaining = rest;
        }
    }

    /// Accumulates into the cells of `row` starting at column `col`, in i-k-j order.
    fn multiply_segment(&self, row: usize, col: usize, segment: &mut [f64]) {
        for (k, &a) in self.lhs_row(row).iter().enumerate() {
            let b_segment = &self.rhs_row(k)[col..col.saturating_add(segment.len())];

            for (cell, b) in segment.iter_mut().zip(b_segment) {
                *cell += a * b;
            }
        }
    }

    /// Same as [`multiply_segment()`][Self::multiply_segment] with `k` and the cells split
    /// into tiles.
    fn multiply_segment_blocked(&self, row: usize, col: usize, segment: &mut [f64]) {
        let a_row = self.lhs_row(row);

        for k_tile in tiles(self.size()) {
            for (cell_tile, j_first) in segment
                .chunks_mut(LOOP_TILE)
                .zip((col..).step_by(LOOP_TILE))
            {
                for (k, &a) in a_row.iter().enumerate().take(k_tile.end).skip(k_tile.start) {
                    let b_row = self.rhs_row(k);
                    let b_tile = &b_row[j_first..j_first.saturating_add(cell_tile.len())];

                    for (cell, b) in cell_tile.iter_mut().zip(b_tile) {
                        *cell += a * b;
                    }
                }
            }
        }
    }

    /// Accumulates into a run of vertically adjacent cells, broadcasting each `B[k][j]` down
    /// the run.
    unsafe fn multiply_column_run(
        &self,
        output: &SharedOutput<'_>,
        run: Span,
        reset_first: bool,
    ) {
        let (first_row, col) = self.input.coordinates(run.start());

        if reset_first {
            // SAFETY: Forwarding the caller's guarantee.
            unsafe { reset_cells(output, run) };
        }

        for (k, &b) in self.rhs.iter().skip(col).step_by(self.size()).enumerate() {
            for (index, row) in run.indices().zip(first_row..) {
                // SAFETY: Forwarding the caller's guarantee.
                let cell = unsafe { output.cell_mut(index) };
                *cell += self.lhs[self.input.index(row, k)] * b;
            }
        }
    }
}

/// Restores every cell of `span` to the baseline.
///
/// # Safety
///
/// Same as [`Kernel::apply()`].
unsafe fn reset_cells(output: &SharedOutput<'_>, span: Span) {
    for index in span.indices() {
        // SAFETY: Forwarding the caller's guarantee.
        *unsafe { output.cell_mut(index) } = OUTPUT_BASELINE;
    }
}

/// `0..len` in consecutive ranges of at most [`LOOP_TILE`].
fn tiles(len: usize) -> impl Iterator<Item = Range<usize>> {
    (0..len)
        .step_by(LOOP_TILE)
        .map(move |first| first..first.saturating_add(LOOP_TILE).min(len))
}

/// Sums the products in index order, starting from zero.
fn dot<'a>(lhs: &[f64], rhs: impl Iterator<Item = &'a f64>) -> f64 {
    dot_from(0.0, lhs, rhs)
}

/// Adds the products to `sum` in index order.
fn dot_from<'a>(sum: f64, lhs: &[f64], rhs: impl Iterator<Item = &'a f64>) -> f64 {
    lhs.iter().zip(rhs).fold(sum, |sum, (a, b)| sum + a * b)
}

/// [`dot()`] with the loop unrolled four times. Adds in the same order, so the result is
/// bitwise identical.
#[expect(
    clippy::indexing_slicing,
    reason = "chunks_exact yields exactly four elements"
)]
fn dot_unrolled(lhs: &[f64], rhs: &[f64]) -> f64 {
    let lhs_quads = lhs.chunks_exact(4);
    let rhs_quads = rhs.chunks_exact(4);
    let (lhs_rest, rhs_rest) = (lhs_quads.remainder(), rhs_quads.remainder());

    let mut sum = 0.0;

    for (a, b) in lhs_quads.zip(rhs_quads) {
        sum += a[0] * b[0];
        sum += a[1] * b[1];
        sum += a[2] * b[2];
        sum += a[3] * b[3];
    }

    dot_from(sum, lhs_rest, rhs_rest.iter())
}

#[expect(
    clippy::indexing_slicing,
    reason = "chunks_exact yields exactly four elements"
)]
fn add_unrolled(cells: &mut [f64], lhs: &[f64], rhs: &[f64]) {
    let mut cell_quads = cells.chunks_exact_mut(4);
    let lhs_quads = lhs.chunks_exact(4);
    let rhs_quads = rhs.chunks_exact(4);
    let (lhs_rest, rhs_rest) = (lhs_quads.remainder(), rhs_quads.remainder());

    for ((c, a), b) in (&mut cell_quads).zip(lhs_quads).zip(rhs_quads) {
        c[0] = a[0] + b[0];
        c[1] = a[1] + b[1];
        c[2] = a[2] + b[2];
        c[3] = a[3] + b[3];
    }

    for ((cell, a), b) in cell_quads
        .into_remainder()
        .iter_mut()
        .zip(lhs_rest)
        .zip(rhs_rest)
    {
        *cell = a + b;
    }
}

/// `(value mod 10) · 0.1`
#[expect(
    clippy::cast_precision_loss,
    reason = "a single decimal digit is exactly representable"
)]
fn tenths(value: usize) -> f64 {
    (value % 10) as f64 * 0.1
}
