//! Partition strategies: deterministic rules that divide the cells of a [`Grid`] between
//! workers so that every cell is owned by exactly one worker.
//!
//! Each strategy is a pure function of the grid, the worker identity and (for blocked tiles)
//! the block size. A worker's share is described as a sequence of [`Span`]s visited in the
//! strategy's traversal order. The strategies differ only in which disjoint partition they
//! produce and in the order cells are visited, never in which cells end up covered.

use std::num::NonZero;

use crate::grid::Span;
use crate::{Grid, Pattern};

mod blocked;
mod columns;
mod cyclic;
mod linear;
pub mod morton;
mod rows;

use blocked::TileSpans;
use columns::ColumnSpans;
use cyclic::CyclicSpans;
use linear::LinearSpans;
use morton::MortonSpans;
use rows::RowSpans;

/// Identifies one of the workers that together execute a trial.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct WorkerId {
    index: usize,
    count: NonZero<usize>,
}

impl WorkerId {
    /// Identifies worker `index` out of `count` workers.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not less than `count`.
    #[must_use]
    pub fn new(index: usize, count: NonZero<usize>) -> Self {
        assert!(
            index < count.get(),
            "worker index {index} out of range for {count} workers"
        );

        Self { index, count }
    }

    /// Every worker out of `count` workers, in index order.
    pub fn all(count: NonZero<usize>) -> impl Iterator<Item = Self> {
        (0..count.get()).map(move |index| Self { index, count })
    }

    /// Position of the worker, in `0..count`.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// How many workers share the grid.
    #[must_use]
    pub fn count(&self) -> NonZero<usize> {
        self.count
    }
}

/// A partition strategy selected by a [`Pattern`], together with its parameters.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum Strategy {
    /// Rows are split into `T` bands of `ceil(rows / T)` rows.
    ContiguousRows,

    /// Columns are split into `T` bands of `ceil(cols / T)` columns, traversed top to bottom.
    ContiguousColumns,

    /// Rows are split as for [`ContiguousRows`][Self::ContiguousRows], then each band is
    /// traversed in `block_size × block_size` tiles, clipped at the band and grid edges.
    BlockedTiles {
        /// Side of a tile, in cells.
        block_size: NonZero<usize>,
    },

    /// The flattened buffer is split into `T` chunks of `ceil(cells / T)` cells.
    FlattenedLinear,

    /// Worker `t` owns rows `t, t + T, t + 2T, ...`.
    CyclicRows,

    /// The Z-order curve over the enclosing power-of-two square is split into `T` chunks;
    /// curve positions that fall outside the grid are skipped.
    Morton,
}

impl Strategy {
    /// The strategy for `pattern`. The block size only matters for
    /// [`Pattern::BlockedTiles`].
    #[must_use]
    pub fn new(pattern: Pattern, block_size: NonZero<usize>) -> Self {
        match pattern {
            Pattern::ContiguousRows => Self::ContiguousRows,
            Pattern::ContiguousColumns => Self::ContiguousColumns,
            Pattern::BlockedTiles => Self::BlockedTiles { block_size },
            Pattern::FlattenedLinear => Self::FlattenedLinear,
            Pattern::CyclicRows => Self::CyclicRows,
            Pattern::Morton => Self::Morton,
        }
    }

    /// The pattern this strategy implements.
    #[must_use]
    pub fn pattern(&self) -> Pattern {
        match self {
            Self::ContiguousRows => Pattern::ContiguousRows,
            Self::ContiguousColumns => Pattern::ContiguousColumns,
            Self::BlockedTiles { .. } => Pattern::BlockedTiles,
            Self::FlattenedLinear => Pattern::FlattenedLinear,
            Self::CyclicRows => Pattern::CyclicRows,
            Self::Morton => Pattern::Morton,
        }
    }

    /// The spans of cells owned by `worker`, in traversal order.
    ///
    /// Workers beyond the extent of the partition (e.g. worker 5 of 8 over a 3-row grid)
    /// receive an empty sequence.
    pub fn spans(&self, grid: Grid, worker: WorkerId) -> Spans {
        let inner = match *self {
            Self::ContiguousRows => SpansInner::Rows(RowSpans::new(grid, worker)),
            Self::ContiguousColumns => SpansInner::Columns(ColumnSpans::new(grid, worker)),
            Self::BlockedTiles { block_size } => {
                SpansInner::Tiles(TileSpans::new(grid, worker, block_size))
            }
            Self::FlattenedLinear => SpansInner::Linear(LinearSpans::new(grid, worker)),
            Self::CyclicRows => SpansInner::Cyclic(CyclicSpans::new(grid, worker)),
            Self::Morton => SpansInner::Morton(MortonSpans::new(grid, worker)),
        };

        Spans { inner }
    }

    /// The linear indexes of the cells owned by `worker`, in traversal order.
    pub fn owned_indices(&self, grid: Grid, worker: WorkerId) -> impl Iterator<Item = usize> {
        self.spans(grid, worker).flat_map(|span| span.indices())
    }
}

/// The spans owned by one worker under one [`Strategy`].
///
/// Returned by [`Strategy::spans()`].
#[derive(Clone, Debug)]
pub struct Spans {
    inner: SpansInner,
}

#[derive(Clone, Debug)]
enum SpansInner {
    Rows(RowSpans),
    Columns(ColumnSpans),
    Tiles(TileSpans),
    Linear(LinearSpans),
    Cyclic(CyclicSpans),
    Morton(MortonSpans),
}

impl Iterator for Spans {
    type Item = Span;

    #[inline]
    fn next(&mut self) -> Option<Span> {
        match &mut self.inner {
            SpansInner::Rows(spans) => spans.next(),
            SpansInner::Columns(spans) => spans.next(),
            SpansInner::Tiles(spans) => spans.next(),
            SpansInner::Linear(spans) => spans.next(),
            SpansInner::Cyclic(spans) => spans.next(),
            SpansInner::Morton(spans) => spans.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use new_zealand::nz;

    use super::*;

    const SIZES: [usize; 9] = [1, 2, 3, 4, 5, 7, 8, 16, 33];
    const WORKER_COUNTS: [usize; 9] = [1, 2, 3, 4, 5, 8, 16, 40, 128];
    const BLOCK_SIZES: [usize; 4] = [1, 3, 4, 32];

    fn all_strategies() -> Vec<Strategy> {
        let mut strategies = Vec::new();

        for pattern in Pattern::ALL {
            if pattern == Pattern::BlockedTiles {
                for block_size in BLOCK_SIZES {
                    strategies.push(Strategy::new(
                        pattern,
                        NonZero::new(block_size).unwrap(),
                    ));
                }
            } else {
                strategies.push(Strategy::new(pattern, nz!(32)));
            }
        }

        strategies
    }

    /// Counts how many times each cell of the grid is claimed across all workers.
    fn claims(strategy: Strategy, grid: Grid, workers: NonZero<usize>) -> Vec<usize> {
        let mut claims = vec![0_usize; grid.cells()];

        for worker in WorkerId::all(workers) {
            for index in strategy.owned_indices(grid, worker) {
                claims[index] += 1;
            }
        }

        claims
    }

    fn owned(strategy: Strategy, grid: Grid, index: usize, count: usize) -> Vec<usize> {
        strategy
            .owned_indices(grid, WorkerId::new(index, NonZero::new(count).unwrap()))
            .collect()
    }

    #[test]
    fn every_strategy_covers_every_cell_exactly_once() {
        for strategy in all_strategies() {
            for size in SIZES {
                let grid = Grid::square(size).unwrap();

                for workers in WORKER_COUNTS {
                    let claims = claims(strategy, grid, NonZero::new(workers).unwrap());

                    assert!(
                        claims.iter().all(|&count| count == 1),
                        "{strategy:?} with N={size} T={workers} claims {claims:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn every_strategy_covers_rectangular_grids() {
        for strategy in all_strategies() {
            for (rows, cols) in [(7, 1), (1, 7), (5, 3), (3, 9), (64, 1)] {
                let grid = Grid::new(rows, cols).unwrap();

                for workers in [1, 2, 4, 9] {
                    let claims = claims(strategy, grid, NonZero::new(workers).unwrap());

                    assert!(
                        claims.iter().all(|&count| count == 1),
                        "{strategy:?} over {rows}×{cols} with T={workers} claims {claims:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn single_worker_owns_everything() {
        for strategy in all_strategies() {
            let grid = Grid::square(5).unwrap();

            let mut indices = owned(strategy, grid, 0, 1);
            indices.sort_unstable();

            assert_eq!(indices, (0..25).collect::<Vec<_>>(), "{strategy:?}");
        }
    }

    #[test]
    fn contiguous_rows_use_ceiling_sized_bands() {
        let strategy = Strategy::ContiguousRows;
        let grid = Grid::square(10).unwrap();

        let spans = strategy
            .spans(grid, WorkerId::new(1, nz!(4)))
            .collect::<Vec<_>>();
        assert_eq!(
            spans,
            vec![
                Span::contiguous(30, 10),
                Span::contiguous(40, 10),
                Span::contiguous(50, 10)
            ]
        );

        // The last worker gets the single remaining row.
        assert_eq!(owned(strategy, grid, 3, 4), (90..100).collect::<Vec<_>>());
    }

    #[test]
    fn surplus_workers_own_nothing() {
        let grid = Grid::square(3).unwrap();

        for strategy in [
            Strategy::ContiguousRows,
            Strategy::ContiguousColumns,
            Strategy::BlockedTiles {
                block_size: nz!(2),
            },
            Strategy::CyclicRows,
        ] {
            for index in 3..8 {
                assert!(owned(strategy, grid, index, 8).is_empty(), "{strategy:?}");
            }
        }

        // The flattened and Morton strategies split cells, not rows: 9 cells over 16 workers.
        for index in 9..16 {
            assert!(owned(Strategy::FlattenedLinear, grid, index, 16).is_empty());
        }
    }

    #[test]
    fn contiguous_columns_walk_top_to_bottom() {
        let grid = Grid::square(4).unwrap();

        assert_eq!(
            owned(Strategy::ContiguousColumns, grid, 1, 2),
            vec![2, 6, 10, 14, 3, 7, 11, 15]
        );
    }

    #[test]
    fn blocked_tiles_are_row_major_and_clipped() {
        let strategy = Strategy::BlockedTiles {
            block_size: nz!(2),
        };
        let grid = Grid::square(5).unwrap();

        // Worker 0 of 2 owns rows 0..3: tile rows 0..2 then the clipped tile row 2..3.
        let spans = strategy
            .spans(grid, WorkerId::new(0, nz!(2)))
            .collect::<Vec<_>>();

        assert_eq!(
            spans,
            vec![
                // Tile (0, 0)
                Span::contiguous(0, 2),
                Span::contiguous(5, 2),
                // Tile (0, 2)
                Span::contiguous(2, 2),
                Span::contiguous(7, 2),
                // Tile (0, 4), clipped at the right edge.
                Span::contiguous(4, 1),
                Span::contiguous(9, 1),
                // Tile row 2..3, clipped at the band edge.
                Span::contiguous(10, 2),
                Span::contiguous(12, 2),
                Span::contiguous(14, 1),
            ]
        );
    }

    #[test]
    fn blocked_tiles_larger_than_grid_degenerate_to_rows() {
        let grid = Grid::square(5).unwrap();
        let blocked = Strategy::BlockedTiles {
            block_size: nz!(32),
        };

        for index in 0..3 {
            assert_eq!(
                owned(blocked, grid, index, 3),
                owned(Strategy::ContiguousRows, grid, index, 3)
            );
        }
    }

    #[test]
    fn flattened_linear_chunks_ignore_row_boundaries() {
        let grid = Grid::square(3).unwrap();

        assert_eq!(owned(Strategy::FlattenedLinear, grid, 0, 2), vec![0, 1, 2, 3, 4]);
        assert_eq!(owned(Strategy::FlattenedLinear, grid, 1, 2), vec![5, 6, 7, 8]);
    }

    #[test]
    fn cyclic_rows_interleave() {
        let grid = Grid::square(5).unwrap();

        let rows = |index| {
            Strategy::CyclicRows
                .spans(grid, WorkerId::new(index, nz!(2)))
                .map(|span| grid.coordinates(span.start()).0)
                .collect::<Vec<_>>()
        };

        assert_eq!(rows(0), vec![0, 2, 4]);
        assert_eq!(rows(1), vec![1, 3]);
    }

    #[test]
    fn morton_walks_z_order() {
        let grid = Grid::square(4).unwrap();

        let visited = owned(Strategy::Morton, grid, 0, 1)
            .into_iter()
            .map(|index| grid.coordinates(index))
            .collect::<Vec<_>>();

        assert_eq!(
            &visited[..8],
            &[
                (0, 0),
                (0, 1),
                (1, 0),
                (1, 1),
                (0, 2),
                (0, 3),
                (1, 2),
                (1, 3)
            ]
        );
    }

    #[test]
    fn morton_covers_non_power_of_two_grids() {
        // N=3 needs the 4×4 enclosing square; with only N² z-values cells would be missed.
        let grid = Grid::square(3).unwrap();

        let claims = claims(Strategy::Morton, grid, nz!(2));
        assert!(claims.iter().all(|&count| count == 1), "{claims:?}");
    }

    #[test]
    fn strategies_are_deterministic() {
        let grid = Grid::square(17).unwrap();

        for strategy in all_strategies() {
            for index in 0..5 {
                assert_eq!(
                    owned(strategy, grid, index, 5),
                    owned(strategy, grid, index, 5)
                );
            }
        }
    }

    #[test]
    fn pattern_round_trips_through_strategy() {
        for pattern in Pattern::ALL {
            assert_eq!(Strategy::new(pattern, nz!(8)).pattern(), pattern);
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn worker_index_must_be_in_range() {
        let _worker = WorkerId::new(4, nz!(4));
    }
}
