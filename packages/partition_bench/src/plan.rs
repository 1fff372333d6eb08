use std::num::NonZero;

use crate::buffers::allocate;
use crate::grid::Span;
use crate::partition::Spans;
use crate::{Error, Grid, Result, Strategy, WorkerId};

/// A partition of a grid between a fixed number of workers, verified to cover every cell
/// exactly once.
///
/// Workers write to the shared output buffer without any locking. What makes that sound is
/// that the cell sets of different workers are disjoint, which this type checks once when the
/// plan is created instead of trusting the strategy to get it right.
#[derive(Clone, Debug)]
pub struct PartitionPlan {
    strategy: Strategy,
    grid: Grid,
    workers: NonZero<usize>,
    cells_per_worker: Box<[usize]>,
}

impl PartitionPlan {
    /// Partitions `grid` between `workers` workers using `strategy`.
    ///
    /// # Errors
    ///
    /// Returns a partition error if any worker is assigned a cell outside the grid, if any
    /// cell is assigned to more than one worker or if any cell is assigned to no worker.
    /// Returns [`Error::Allocation`] if the bookkeeping for the check cannot be allocated.
    pub fn new(strategy: Strategy, grid: Grid, workers: NonZero<usize>) -> Result<Self> {
        let cells_per_worker =
            verify_coverage(grid, workers, |worker| strategy.spans(grid, worker))?;

        Ok(Self {
            strategy,
            grid,
            workers,
            cells_per_worker,
        })
    }

    /// The strategy that produced the partition.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// The partitioned grid.
    #[must_use]
    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// How many workers share the grid.
    #[must_use]
    pub fn workers(&self) -> NonZero<usize> {
        self.workers
    }

    /// How many cells each worker owns, indexed by worker.
    #[must_use]
    pub fn cells_per_worker(&self) -> &[usize] {
        &self.cells_per_worker
    }

    /// The spans owned by `worker`.
    pub(crate) fn spans(&self, worker: WorkerId) -> Spans {
        debug_assert_eq!(worker.count(), self.workers);

        self.strategy.spans(self.grid, worker)
    }
}

/// Checks that the spans returned by `spans_of` for each worker cover every cell of `grid`
/// exactly once and returns the number of cells owned by each worker.
pub(crate) fn verify_coverage<I>(
    grid: Grid,
    workers: NonZero<usize>,
    spans_of: impl Fn(WorkerId) -> I,
) -> Result<Box<[usize]>>
where
    I: IntoIterator<Item = Span>,
{
    let cells = grid.cells();
    let mut claimed = allocate(cells, false)?;
    let mut cells_per_worker = Vec::with_capacity(workers.get());

    for worker in WorkerId::all(workers) {
        let mut owned: usize = 0;

        for span in spans_of(worker) {
            for cell in span.indices() {
                let slot = claimed
                    .get_mut(cell)
                    .ok_or(Error::PartitionOutOfBounds {
                        worker: worker.index(),
                        cell,
                        cells,
                    })?;

                if *slot {
                    return Err(Error::PartitionOverlap {
                        worker: worker.index(),
                        cell,
                    });
                }

                *slot = true;
                owned = owned.saturating_add(1);
            }
        }

        cells_per_worker.push(owned);
    }

    if let Some(cell) = claimed.iter().position(|claimed| !claimed) {
        return Err(Error::PartitionGap { cell });
    }

    Ok(cells_per_worker.into_boxed_slice())
}

#[cfg(test)]
mod tests {
    use new_zealand::nz;

    use super::*;
    use crate::Pattern;

    #[test]
    fn plans_for_every_pattern_account_for_every_cell() {
        let grid = Grid::square(13).unwrap();

        for pattern in Pattern::ALL {
            for workers in [nz!(1), nz!(4), nz!(20)] {
                let plan = PartitionPlan::new(Strategy::new(pattern, nz!(4)), grid, workers)
                    .unwrap();

                assert_eq!(plan.cells_per_worker().len(), workers.get());
                assert_eq!(plan.cells_per_worker().iter().sum::<usize>(), 169);
            }
        }
    }

    #[test]
    fn rows_plan_records_uneven_shares() {
        let grid = Grid::square(10).unwrap();

        let plan = PartitionPlan::new(Strategy::ContiguousRows, grid, nz!(4)).unwrap();

        assert_eq!(plan.cells_per_worker(), &[30, 30, 30, 10]);
        assert_eq!(plan.strategy(), Strategy::ContiguousRows);
        assert_eq!(plan.grid(), grid);
        assert_eq!(plan.workers(), nz!(4));
    }

    #[test]
    fn overlap_is_detected() {
        let grid = Grid::square(4).unwrap();

        // Every worker claims the first row.
        let result = verify_coverage(grid, nz!(2), |_| [Span::contiguous(0, 4)]);

        assert!(matches!(
            result,
            Err(Error::PartitionOverlap { worker: 1, cell: 0 })
        ));
    }

    #[test]
    fn gap_is_detected() {
        let grid = Grid::square(4).unwrap();

        // Off-by-one: the last cell is never claimed.
        let result = verify_coverage(grid, nz!(1), |_| [Span::contiguous(0, 15)]);

        assert!(matches!(result, Err(Error::PartitionGap { cell: 15 })));
    }

    #[test]
    fn out_of_bounds_is_detected() {
        let grid = Grid::square(2).unwrap();

        let result = verify_coverage(grid, nz!(1), |_| [Span::contiguous(0, 5)]);

        assert!(matches!(
            result,
            Err(Error::PartitionOutOfBounds {
                worker: 0,
                cell: 4,
                cells: 4
            })
        ));
    }

    #[test]
    fn workers_without_cells_are_allowed() {
        let grid = Grid::square(2).unwrap();

        let shares = verify_coverage(grid, nz!(3), |worker| {
            if worker.index() == 1 {
                vec![Span::contiguous(0, 4)]
            } else {
                Vec::new()
            }
        })
        .unwrap();

        assert_eq!(&*shares, &[0, 4, 0]);
    }
}
