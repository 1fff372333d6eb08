use std::marker::PhantomData;
use std::ptr::NonNull;
use std::slice;

use crate::grid::Span;
use crate::kernel::Operands;
use crate::{Error, Grid, Kernel, Result};

/// The memory of one trial: two read-only operands and the output written by the workers.
///
/// Buffers belong to exactly one trial. They are allocated and filled when the trial is
/// created and dropped with it, so no trial can observe another trial's output.
#[derive(Debug)]
pub(crate) struct TrialBuffers {
    /// The N×N grid the operands are laid out on.
    input: Grid,

    /// `A` for every kernel.
    lhs: Box<[f64]>,

    /// `B` for the elementwise and multiply kernels, `x` for the matrix-vector kernel.
    rhs: Box<[f64]>,

    output: Box<[f64]>,
}

impl TrialBuffers {
    /// Allocates and fills the buffers for `kernel` over an N×N input.
    pub(crate) fn new(kernel: Kernel, size: usize) -> Result<Self> {
        let shape = kernel.shape(size)?;

        let mut lhs = allocate(shape.lhs_len, 0.0)?;
        let mut rhs = allocate(shape.rhs_len, 0.0)?;
        let output = allocate(shape.output.cells(), OUTPUT_BASELINE)?;

        kernel.fill_operands(shape.input, &mut lhs, &mut rhs);

        Ok(Self {
            input: shape.input,
            lhs,
            rhs,
            output,
        })
    }

    #[cfg(test)]
    pub(crate) fn lhs(&self) -> &[f64] {
        &self.lhs
    }

    #[cfg(test)]
    pub(crate) fn rhs(&self) -> &[f64] {
        &self.rhs
    }

    pub(crate) fn output(&self) -> &[f64] {
        &self.output
    }

    /// Splits the buffers into the read-only operands and the shared output.
    pub(crate) fn split(&mut self) -> (Operands<'_>, SharedOutput<'_>) {
        (
            Operands::new(self.input, &self.lhs, &self.rhs),
            SharedOutput::new(&mut self.output),
        )
    }

    /// Restores every output cell to the baseline value.
    pub(crate) fn reset_output(&mut self) {
        self.output.fill(OUTPUT_BASELINE);
    }

    pub(crate) fn into_output(self) -> Box<[f64]> {
        self.output
    }
}

/// The value every output cell holds before a pass writes to it.
pub(crate) const OUTPUT_BASELINE: f64 = 0.0;

/// Allocates a buffer of `len` copies of `value`, reporting allocation failure as an error
/// instead of aborting the process.
pub(crate) fn allocate<T: Clone>(len: usize, value: T) -> Result<Box<[T]>> {
    let mut buffer = Vec::new();

    buffer
        .try_reserve_exact(len)
        .map_err(|source| Error::Allocation {
            elements: len,
            source,
        })?;

    buffer.resize(len, value);

    Ok(buffer.into_boxed_slice())
}

/// The output buffer of a trial, shared by all workers.
///
/// Workers access cells through raw pointers with no synchronization. This is only sound
/// because every worker restricts itself to the cells of a verified
/// [`PartitionPlan`][crate::PartitionPlan], which are disjoint from the cells of every other
/// worker, and because the pool separates passes with a barrier.
#[derive(Debug)]
pub(crate) struct SharedOutput<'a> {
    ptr: NonNull<f64>,
    len: usize,

    _buffer: PhantomData<&'a mut [f64]>,
}

// SAFETY: The wrapper is just a `&mut [f64]` whose exclusivity is enforced per cell by the
// partition plan rather than by the borrow checker. Sending it to another thread is as safe
// as sending the mutable slice.
unsafe impl Send for SharedOutput<'_> {}

// SAFETY: Concurrent access from multiple threads only ever touches disjoint cells, see
// type-level documentation.
unsafe impl Sync for SharedOutput<'_> {}

impl<'a> SharedOutput<'a> {
    pub(crate) fn new(buffer: &'a mut [f64]) -> Self {
        Self {
            len: buffer.len(),
            ptr: NonNull::from(buffer).cast(),
            _buffer: PhantomData,
        }
    }

    /// Number of cells in the buffer.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns the cells of a contiguous span.
    ///
    /// # Safety
    ///
    /// The caller must own every cell of the span under a verified partition plan and must
    /// not hold any other reference to these cells while the returned slice is alive.
    ///
    /// # Panics
    ///
    /// Panics if the span is not contiguous or does not lie within the buffer.
    #[expect(
        clippy::mut_from_ref,
        reason = "exclusivity is guaranteed by the partition plan, not by the borrow"
    )]
    pub(crate) unsafe fn contiguous_mut(&self, span: Span) -> &mut [f64] {
        assert!(span.is_contiguous(), "span {span:?} is not contiguous");
        assert!(span.end() <= self.len, "span {span:?} exceeds the buffer");

        // SAFETY: The span lies within the buffer (asserted above) and the caller guarantees
        // that nothing else accesses these cells for the lifetime of the slice.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr().add(span.start()), span.len()) }
    }

    /// Returns one cell.
    ///
    /// # Safety
    ///
    /// The caller must own the cell under a verified partition plan and must not hold any
    /// other reference to it while the returned reference is alive.
    ///
    /// # Panics
    ///
    /// Panics if the index is outside the buffer.
    #[expect(
        clippy::mut_from_ref,
        reason = "exclusivity is guaranteed by the partition plan, not by the borrow"
    )]
    pub(crate) unsafe fn cell_mut(&self, index: usize) -> &mut f64 {
        assert!(index < self.len, "cell {index} exceeds the buffer");

        // SAFETY: The index lies within the buffer (asserted above) and the caller guarantees
        // that nothing else accesses this cell for the lifetime of the reference.
        unsafe { &mut *self.ptr.as_ptr().add(index) }
    }
}
