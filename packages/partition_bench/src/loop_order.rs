use crate::{Error, Kernel, Result};

/// Side of the tiles used by [`LoopOrder::Blocked`].
pub const LOOP_TILE: usize = 32;

/// The order in which a worker walks the inner loops of a kernel over the cells it owns.
///
/// The partition pattern decides which cells a worker owns and in which order it visits
/// them; the loop order decides how the kernel's own loops are nested for those cells. The
/// two combine: a dot product per cell ([`Ijk`][Self::Ijk]) under
/// [`Pattern::ContiguousColumns`][crate::Pattern::ContiguousColumns] is the classic `jik`
/// traversal, while [`Jki`][Self::Jki] under the same pattern walks down the columns of
/// both `A` and `C`.
///
/// Not every order applies to every kernel, see [`Kernel::supports()`]. Every order sums
/// the products of one cell in ascending `k`, so all orders of a kernel produce bitwise
/// identical output.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, derive_more::Display)]
#[non_exhaustive]
pub enum LoopOrder {
    /// The straightforward loop of each kernel: one add per cell, one dot product per row of
    /// a matrix-vector product, `i-k-j` for a matrix product.
    #[default]
    #[display("natural")]
    Natural,

    /// Matrix product with `k` innermost: one dot product per output cell, walking a column
    /// of `B` for each.
    #[display("ijk")]
    Ijk,

    /// `k` outermost, broadcasting one element of `B` (or `x`) down a run of cells in the
    /// same column. Column runs read `A` down its columns.
    #[display("jki")]
    Jki,

    /// The innermost loop unrolled four times.
    #[display("unrolled")]
    Unrolled,

    /// The `k` loop split into tiles of [`LOOP_TILE`], with the cells processed in tiles of
    /// the same size inside each `k` tile.
    #[display("blocked")]
    Blocked,
}

impl LoopOrder {
    /// Every loop order.
    pub const ALL: [Self; 5] = [
        Self::Natural,
        Self::Ijk,
        Self::Jki,
        Self::Unrolled,
        Self::Blocked,
    ];
}

impl Kernel {
    /// Whether the kernel can be run in the given loop order.
    #[must_use]
    pub fn supports(self, order: LoopOrder) -> bool {
        match self {
            Self::ElementwiseAdd => matches!(order, LoopOrder::Natural | LoopOrder::Unrolled),
            Self::MatrixVector => !matches!(order, LoopOrder::Ijk),
            Self::MatrixMultiply => !matches!(order, LoopOrder::Unrolled),
        }
    }

    pub(crate) fn check_supports(self, order: LoopOrder) -> Result<()> {
        if self.supports(order) {
            Ok(())
        } else {
            Err(Error::configuration(format!(
                "loop order {order} does not apply to the {self} kernel"
            )))
        }
    }
}
