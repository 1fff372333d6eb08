use crate::{Error, Result};

/// Selects how the output matrix is divided between workers.
///
/// The numeric selector of each variant (see [`selector()`][Self::selector]) is the stable
/// identifier used in emitted result records.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, derive_more::Display)]
#[non_exhaustive]
pub enum Pattern {
    /// Each worker owns one contiguous band of rows.
    #[display("rows")]
    ContiguousRows,

    /// Each worker owns one contiguous band of columns.
    #[display("columns")]
    ContiguousColumns,

    /// Each worker owns a band of rows, traversed as square tiles.
    #[display("blocked")]
    BlockedTiles,

    /// Each worker owns one contiguous chunk of the flattened buffer.
    #[display("linear")]
    FlattenedLinear,

    /// Worker `t` of `T` owns rows `t, t + T, t + 2T, ...`.
    #[display("cyclic")]
    CyclicRows,

    /// Each worker owns one contiguous chunk of the Morton (Z-order) curve.
    #[display("morton")]
    Morton,
}

impl Pattern {
    /// Every pattern, in selector order.
    pub const ALL: [Self; 6] = [
        Self::ContiguousRows,
        Self::ContiguousColumns,
        Self::BlockedTiles,
        Self::FlattenedLinear,
        Self::CyclicRows,
        Self::Morton,
    ];

    /// The numeric selector of the pattern, in `0..=5`.
    #[must_use]
    pub fn selector(self) -> u32 {
        match self {
            Self::ContiguousRows => 0,
            Self::ContiguousColumns => 1,
            Self::BlockedTiles => 2,
            Self::FlattenedLinear => 3,
            Self::CyclicRows => 4,
            Self::Morton => 5,
        }
    }
}

impl TryFrom<u32> for Pattern {
    type Error = Error;

    fn try_from(selector: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|pattern| pattern.selector() == selector)
            .ok_or_else(|| {
                Error::configuration(format!(
                    "pattern selector must be in 0..=5, got {selector}"
                ))
            })
    }
}
