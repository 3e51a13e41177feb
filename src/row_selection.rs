use std::ops::Range;

use bitvec::prelude::*;

/// A set of row indices produced by a filter.
///
/// Searches over SORTED data produce a contiguous [RowSelection::Range]; scans produce a
/// [RowSelection::Bits] vector with one bit per row of the searched table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowSelection {
    /// Every row in `[start, end)`.
    Range(Range<usize>),
    /// Every row whose bit is set.
    Bits(BitVec),
}

impl RowSelection {
    /// Selects every row of a table with `row_count` rows.
    pub fn all(row_count: usize) -> Self {
        Self::Range(0..row_count)
    }

    pub fn empty() -> Self {
        Self::Range(0..0)
    }

    /// Builds a bit selection over `row_count` rows from arbitrary row indices.
    /// Indices past `row_count` are ignored.
    pub fn from_rows(row_count: usize, rows: impl IntoIterator<Item = usize>) -> Self {
        let mut bits = bitvec![0; row_count];
        for row in rows {
            if row < row_count {
                bits.set(row, true);
            }
        }
        Self::Bits(bits)
    }

    /// Number of selected rows.
    pub fn len(&self) -> usize {
        match self {
            Self::Range(range) => range.len(),
            Self::Bits(bits) => bits.count_ones(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, row: usize) -> bool {
        match self {
            Self::Range(range) => range.contains(&row),
            Self::Bits(bits) => bits.get(row).is_some_and(|bit| *bit),
        }
    }

    /// Returns the contiguous range if the selection is one.
    pub fn as_range(&self) -> Option<Range<usize>> {
        match self {
            Self::Range(range) => Some(range.clone()),
            Self::Bits(_) => None,
        }
    }

    /// Iterates the selected rows in increasing order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = usize> + '_> {
        match self {
            Self::Range(range) => Box::new(range.clone()),
            Self::Bits(bits) => Box::new(bits.iter_ones()),
        }
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }

    /// Rows of `[0, row_count)` not in this selection.
    pub fn complement(&self, row_count: usize) -> Self {
        let mut bits = bitvec![1; row_count];
        for row in self.iter().take_while(|&row| row < row_count) {
            bits.set(row, false);
        }
        Self::Bits(bits)
    }

    /// Rows present in both selections. Two ranges intersect into a range.
    pub fn intersect(&self, other: &RowSelection) -> Self {
        match (self, other) {
            (Self::Range(a), Self::Range(b)) => {
                let start = a.start.max(b.start);
                let end = a.end.min(b.end).max(start);
                Self::Range(start..end)
            }
            (Self::Range(range), Self::Bits(bits)) | (Self::Bits(bits), Self::Range(range)) => {
                let mut out = bitvec![0; bits.len()];
                let end = range.end.min(bits.len());
                if range.start < end {
                    out[range.start..end].copy_from_bitslice(&bits[range.start..end]);
                }
                Self::Bits(out)
            }
            (Self::Bits(a), Self::Bits(b)) => {
                let len = a.len().max(b.len());
                Self::from_rows(len, a.iter_ones().filter(|&row| other.contains(row)))
            }
        }
    }
}
