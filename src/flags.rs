use serde::{Deserialize, Serialize};

use crate::data_type::DataType;

bitflags::bitflags! {
    /// Declared properties of a column's data. They enable specialized access paths and are
    /// checked on every append.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ColumnFlags: u32 {
        /// Values are non-decreasing with the row index.
        const SORTED = 1 << 0;
        /// Optional column storing one slot per row (null slots included).
        const DENSE = 1 << 1;
        /// `col[i] <= i` and `col[i] == i` marks the head of a new set.
        const SET_ID = 1 << 2;
        /// Excluded from `SELECT *` but addressable by name.
        const HIDDEN = 1 << 3;
        /// Rows may be updated in place after being appended.
        const MUTABLE = 1 << 4;
    }
}

impl ColumnFlags {
    pub const NONE: Self = Self::empty();

    /// Checks that the flags make sense for a column of `data_type`.
    /// Returns the reason of the first conflict found.
    pub fn validate(self, data_type: &DataType, optional: bool) -> Result<(), String> {
        if self.contains(Self::SET_ID) && (optional || *data_type != DataType::Uint32) {
            return Err("SET_ID requires a non-optional uint32 column".into());
        }
        if self.contains(Self::SORTED) && optional {
            return Err("SORTED requires a non-optional column".into());
        }
        if self.contains(Self::DENSE) && !optional {
            return Err("DENSE only applies to optional columns".into());
        }
        if self.contains(Self::MUTABLE) && self.intersects(Self::SORTED | Self::SET_ID) {
            return Err("MUTABLE cannot be combined with SORTED or SET_ID".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_combinations() {
        let set_id = ColumnFlags::SORTED | ColumnFlags::SET_ID;
        assert!(set_id.validate(&DataType::Uint32, false).is_ok());
        assert!(ColumnFlags::DENSE.validate(&DataType::Uint32, true).is_ok());
        assert!(ColumnFlags::HIDDEN.validate(&DataType::String, true).is_ok());
        assert!(ColumnFlags::NONE.validate(&DataType::Double, true).is_ok());
    }

    #[test]
    fn test_invalid_combinations() {
        assert!(ColumnFlags::SET_ID.validate(&DataType::Int64, false).is_err());
        assert!(ColumnFlags::SET_ID.validate(&DataType::Uint32, true).is_err());
        assert!(ColumnFlags::SORTED.validate(&DataType::Int64, true).is_err());
        assert!(ColumnFlags::DENSE.validate(&DataType::Int64, false).is_err());
        assert!(
            (ColumnFlags::MUTABLE | ColumnFlags::SORTED)
                .validate(&DataType::Int64, false)
                .is_err()
        );
    }
}
