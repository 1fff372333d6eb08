use std::num::NonZero;

use new_zealand::nz;

use crate::Grid;
use crate::grid::ceil_div;

/// Which cells of the output are summed into the checksum.
///
/// The checksum is a smoke signal: a partitioning bug such as a gap, an overlap or an
/// off-by-one is likely to perturb it. It proves nothing about the cells it does not sample.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum ChecksumSampling {
    /// The top-left `side × side` block, clipped to the grid.
    LeadingBlock {
        /// Side of the block, in cells.
        side: NonZero<usize>,
    },

    /// Every `ceil(cells / samples)`-th cell, starting with the first.
    Strided {
        /// How many cells are sampled when the grid has at least that many.
        samples: NonZero<usize>,
    },

    /// Every cell.
    Everything,
}

impl ChecksumSampling {
    /// Side of the default leading block.
    pub const DEFAULT_SIDE: NonZero<usize> = nz!(4);

    /// Sample count of the default strided sampling.
    pub const DEFAULT_SAMPLES: NonZero<usize> = nz!(16);

    /// The sampling used when none is configured: the leading block for a matrix, the whole
    /// output for a single column such as the matrix-vector product.
    #[must_use]
    pub fn for_grid(grid: Grid) -> Self {
        if grid.cols() == 1 {
            Self::Everything
        } else {
            Self::default()
        }
    }

    /// Sums the sampled cells of `output`, laid out on `grid`.
    ///
    /// # Panics
    ///
    /// Panics if `output` does not hold exactly one value per cell of `grid`.
    #[must_use]
    pub fn checksum(&self, grid: Grid, output: &[f64]) -> f64 {
        assert_eq!(
            output.len(),
            grid.cells(),
            "output buffer does not match the grid"
        );

        match *self {
            Self::LeadingBlock { side } => {
                let rows = side.get().min(grid.rows());
                let cols = side.get().min(grid.cols());

                output
                    .chunks_exact(grid.cols())
                    .take(rows)
                    .flat_map(|row| &row[..cols])
                    .sum()
            }
            Self::Strided { samples } => {
                let step = ceil_div(grid.cells(), samples);

                output.iter().step_by(step).sum()
            }
            Self::Everything => output.iter().sum(),
        }
    }
}

impl Default for ChecksumSampling {
    fn default() -> Self {
        Self::LeadingBlock {
            side: Self::DEFAULT_SIDE,
        }
    }
}
