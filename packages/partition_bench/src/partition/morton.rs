//! Morton (Z-order) curve coordinates.
//!
//! A Morton index interleaves the bits of a row and a column: bit `2k` of the index is bit `k`
//! of the column and bit `2k + 1` is bit `k` of the row. Walking indexes in order visits a
//! 2×2 block, then the 2×2 block to its right, then the two blocks below them, and so on
//! recursively:
//!
//! ```
//! use partition_bench::morton;
//!
//! assert_eq!(morton::decode(0), (0, 0));
//! assert_eq!(morton::decode(1), (0, 1));
//! assert_eq!(morton::decode(2), (1, 0));
//! assert_eq!(morton::decode(3), (1, 1));
//! assert_eq!(morton::decode(4), (0, 2));
//!
//! assert_eq!(morton::encode(1, 2), 6);
//! ```

use std::ops::Range;

use crate::grid::{Span, chunk};
use crate::{Grid, WorkerId};

/// Returns the `(row, col)` coordinates of a Morton index.
#[must_use]
#[inline]
#[expect(
    clippy::cast_possible_truncation,
    reason = "compacting 32 bits out of 64 leaves a value that fits in u32"
)]
pub fn decode(index: u64) -> (u32, u32) {
    let row = compact_even_bits(index >> 1);
    let col = compact_even_bits(index);

    (row as u32, col as u32)
}

/// Returns the Morton index of the cell at `(row, col)`.
#[must_use]
#[inline]
pub fn encode(row: u32, col: u32) -> u64 {
    (spread_bits(row) << 1) | spread_bits(col)
}

/// Gathers the even bits of `value` into its low 32 bits.
#[inline]
fn compact_even_bits(value: u64) -> u64 {
    let mut x = value & 0x5555_5555_5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333_3333_3333;
    x = (x | (x >> 2)) & 0x0f0f_0f0f_0f0f_0f0f;
    x = (x | (x >> 4)) & 0x00ff_00ff_00ff_00ff;
    x = (x | (x >> 8)) & 0x0000_ffff_0000_ffff;
    (x | (x >> 16)) & 0x0000_0000_ffff_ffff
}

/// Moves bit `k` of `value` to bit `2k` of the result. Inverse of [`compact_even_bits()`].
#[inline]
fn spread_bits(value: u32) -> u64 {
    let mut x = u64::from(value);
    x = (x | (x << 16)) & 0x0000_ffff_0000_ffff;
    x = (x | (x << 8)) & 0x00ff_00ff_00ff_00ff;
    x = (x | (x << 4)) & 0x0f0f_0f0f_0f0f_0f0f;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    (x | (x << 1)) & 0x5555_5555_5555_5555
}

/// The smallest Morton index greater than `index` whose cell lies in the rectangle from
/// `(0, 0)` to the cell with Morton index `last`, or `None` if there is no such index.
///
/// `index` must lie outside the rectangle. This is the BIGMIN search of Tropf and Herzog,
/// specialized to a rectangle anchored at the origin: it walks the bits from the top and
/// narrows the rectangle to the half that the next index can be in.
fn next_inside(index: u64, last: u64) -> Option<u64> {
    if index >= last {
        return None;
    }

    let mut min = 0_u64;
    let mut max = last;
    let mut candidate = None;

    for bit in (0..u64::BITS).rev() {
        let mask = 1_u64.wrapping_shl(bit);
        let below = same_dimension_as(bit) & mask.wrapping_sub(1);

        // Sets `bit` and clears the lower bits of the same coordinate.
        let first_of_upper_half = |value: u64| (value & !below) | mask;
        // Clears `bit` and sets the lower bits of the same coordinate.
        let last_of_lower_half = |value: u64| (value & !mask) | below;

        match (index & mask != 0, min & mask != 0, max & mask != 0) {
            (false, false, true) => {
                candidate = Some(first_of_upper_half(min));
                max = last_of_lower_half(max);
            }
            (false, true, true) => return Some(min),
            (true, false, false) => return candidate,
            (true, false, true) => min = first_of_upper_half(min),
            // Equal bits, or `min > max` which the narrowing never produces.
            _ => {}
        }
    }

    candidate
}

/// The bits that hold the same coordinate as `bit`: columns in even bits, rows in odd bits.
fn same_dimension_as(bit: u32) -> u64 {
    if bit % 2 == 0 {
        0x5555_5555_5555_5555
    } else {
        0xaaaa_aaaa_aaaa_aaaa
    }
}

/// The chunk of the Z-order curve owned by a worker, one single-cell span per curve position
/// that falls inside the grid.
///
/// The curve covers the smallest power-of-two square enclosing the grid, so positions
/// outside the grid occur whenever the grid is not itself such a square. Runs of such
/// positions are jumped over rather than walked, so a tall or wide grid costs time in
/// proportion to its cells and not to the enclosing square.
#[derive(Clone, Debug)]
pub(crate) struct MortonSpans {
    grid: Grid,
    positions: Range<u64>,

    /// Morton index of the bottom-right cell of the grid.
    last: u64,

    #[cfg(test)]
    examined: usize,
}

impl MortonSpans {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "grid extents fit in u32, checked at grid construction"
    )]
    pub(crate) fn new(grid: Grid, worker: WorkerId) -> Self {
        let side = grid.morton_side();

        // Cannot overflow, checked at grid construction.
        let positions = chunk(side.saturating_mul(side), worker.index(), worker.count());

        Self {
            grid,
            positions: positions.start as u64..positions.end as u64,
            last: encode(
                grid.rows().saturating_sub(1) as u32,
                grid.cols().saturating_sub(1) as u32,
            ),
            #[cfg(test)]
            examined: 0,
        }
    }
}

impl Iterator for MortonSpans {
    type Item = Span;

    #[inline]
    fn next(&mut self) -> Option<Span> {
        loop {
            let position = self.positions.next()?;

            #[cfg(test)]
            {
                self.examined = self.examined.saturating_add(1);
            }

            let (row, col) = decode(position);
            let (row, col) = (row as usize, col as usize);

            if row < self.grid.rows() && col < self.grid.cols() {
                return Some(Span::contiguous(self.grid.index(row, col), 1));
            }

            self.positions.start = next_inside(position, self.last)
                .map_or(self.positions.end, |next| next.min(self.positions.end));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::num::NonZero;

    use new_zealand::nz;

    use super::*;

    #[test]
    fn low_indexes_follow_the_documented_convention() {
        assert_eq!(decode(0), (0, 0));
        assert_eq!(decode(1), (0, 1));
        assert_eq!(decode(2), (1, 0));
        assert_eq!(decode(3), (1, 1));
        assert_eq!(decode(8), (2, 0));
        assert_eq!(decode(15), (3, 3));
    }

    #[test]
    fn decode_is_a_bijection_onto_small_squares() {
        for side in [1_u32, 2, 4, 8, 16, 32] {
            let cells = u64::from(side) * u64::from(side);

            let decoded = (0..cells).map(decode).collect::<Vec<_>>();

            assert!(
                decoded
                    .iter()
                    .all(|&(row, col)| row < side && col < side),
                "side {side} decodes outside the square"
            );

            let unique = decoded.iter().collect::<HashSet<_>>();
            assert_eq!(unique.len(), decoded.len(), "side {side} repeats a cell");
        }
    }

    #[test]
    fn encode_inverts_decode() {
        for index in 0..4096 {
            let (row, col) = decode(index);
            assert_eq!(encode(row, col), index);
        }
    }

    #[test]
    fn extreme_coordinates_round_trip() {
        for (row, col) in [
            (u32::MAX, 0),
            (0, u32::MAX),
            (u32::MAX, u32::MAX),
            (0xdead_beef, 0x1234_5678),
        ] {
            assert_eq!(decode(encode(row, col)), (row, col));
        }
    }

    /// Every in-grid cell visited across `workers` workers, in visiting order, and how many
    /// curve positions were examined to find them.
    fn walk(grid: Grid, workers: NonZero<usize>) -> (Vec<usize>, usize) {
        let mut cells = Vec::new();
        let mut examined = 0;

        for worker in WorkerId::all(workers) {
            let mut spans = MortonSpans::new(grid, worker);
            cells.extend(spans.by_ref().map(|span| span.start()));
            examined += spans.examined;
        }

        (cells, examined)
    }

    /// The cells of the grid in curve order, found by brute force over the enclosing square.
    fn brute_force(grid: Grid) -> Vec<usize> {
        let side = grid.morton_side() as u64;

        (0..side * side)
            .map(decode)
            .map(|(row, col)| (row as usize, col as usize))
            .filter(|&(row, col)| row < grid.rows() && col < grid.cols())
            .map(|(row, col)| grid.index(row, col))
            .collect()
    }

    #[test]
    fn next_inside_finds_following_cell() {
        // 3×3 grid: index 5 is (0, 3), the next cell inside is index 6 at (1, 2).
        let last = encode(2, 2);

        assert_eq!(next_inside(5, last), Some(6));
        assert_eq!(next_inside(last, last), None);
        assert_eq!(next_inside(last + 1, last), None);
    }

    #[test]
    fn next_inside_matches_linear_search() {
        for (rows, cols) in [(3_u32, 3_u32), (5, 2), (1, 7), (9, 1), (6, 11)] {
            let last = encode(rows - 1, cols - 1);
            let side = u64::from(rows.max(cols).next_power_of_two());
            let inside = |index: u64| {
                let (row, col) = decode(index);
                row < rows && col < cols
            };

            for index in (0..side * side).filter(|&index| !inside(index)) {
                let expected = (index + 1..side * side).find(|&next| inside(next));

                assert_eq!(
                    next_inside(index, last),
                    expected,
                    "{rows}×{cols} after {index}"
                );
            }
        }
    }

    #[test]
    fn rectangular_grids_are_covered_in_curve_order() {
        for (rows, cols) in [(1, 1), (3, 3), (1, 9), (9, 1), (5, 12), (17, 3)] {
            let grid = Grid::new(rows, cols).unwrap();

            for workers in [nz!(1), nz!(3), nz!(8), nz!(64)] {
                let (cells, _) = walk(grid, workers);

                assert_eq!(cells, brute_force(grid), "{rows}×{cols} T={workers}");
            }
        }
    }

    #[test]
    fn tall_and_wide_grids_examine_positions_in_proportion_to_cells() {
        for grid in [
            Grid::new(1024, 1).unwrap(),
            Grid::new(1, 1000).unwrap(),
            Grid::new(700, 3).unwrap(),
        ] {
            for workers in [nz!(1), nz!(7)] {
                let (cells, examined) = walk(grid, workers);

                assert_eq!(cells.len(), grid.cells());
                // At most one jump per visited cell, plus one per worker to reach its first.
                assert!(
                    examined <= 2 * grid.cells() + workers.get(),
                    "{grid:?} T={workers}: {examined} positions for {} cells",
                    grid.cells()
                );
            }
        }
    }

    #[test]
    fn positions_outside_grid_are_skipped() {
        // A 3×3 grid lives in a 4×4 curve; the single worker sees each of the 9 cells once.
        let grid = Grid::square(3).unwrap();

        let spans = MortonSpans::new(grid, WorkerId::new(0, nz!(1)))
            .collect::<Vec<_>>();

        assert_eq!(spans.len(), 9);
        assert!(spans.iter().all(|span| span.len() == 1));
    }
}
