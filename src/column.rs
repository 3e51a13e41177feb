use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use allocative::Allocative;
use bitvec::prelude::*;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data_type::DataType;
use crate::error::{Result, StoreError};
use crate::flags::ColumnFlags;
use crate::row_selection::RowSelection;
use crate::value::Value;

/// Comparison operators a column can evaluate against a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    IsNull,
    IsNotNull,
}

impl FilterOp {
    /// Returns true if a row comparing as `ord` against the literal satisfies the operator.
    /// `None` (NULL or incomparable) never matches a comparison.
    pub fn matches(self, ord: Option<Ordering>) -> bool {
        let Some(ord) = ord else {
            return false;
        };
        match self {
            Self::Eq => ord == Ordering::Equal,
            Self::Ne => ord != Ordering::Equal,
            Self::Lt => ord == Ordering::Less,
            Self::Le => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::Ge => ord != Ordering::Less,
            Self::IsNull | Self::IsNotNull => false,
        }
    }

    /// Operators answered by a binary search on SORTED data.
    pub fn is_range_op(self) -> bool {
        matches!(self, Self::Eq | Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        };
        f.write_str(op)
    }
}

/// Physical storage for column data.
/// Each variant wraps a collection of a specific type to ensure contiguous memory
/// allocation (columnar storage). Row-id references are stored as `u32`.
#[derive(Debug, Clone, Allocative)]
pub enum ColumnData {
    Int32(Vec<i32>),
    Uint32(Vec<u32>),
    Int64(Vec<i64>),
    Uint64(Vec<u64>),
    Double(Vec<f64>),
    /// Handles to strings owned by the session's [crate::StringPool].
    Text(Vec<Arc<str>>),
}

impl ColumnData {
    fn new(data_type: &DataType) -> Self {
        match data_type {
            DataType::Int32 => Self::Int32(vec![]),
            DataType::Uint32 | DataType::TableId(_) | DataType::SelfId => Self::Uint32(vec![]),
            DataType::Int64 => Self::Int64(vec![]),
            DataType::Uint64 => Self::Uint64(vec![]),
            DataType::Double => Self::Double(vec![]),
            DataType::String => Self::Text(vec![]),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Int32(v) => v.len(),
            Self::Uint32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Uint64(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    fn value(&self, slot: usize) -> Value {
        match self {
            Self::Int32(v) => Value::Int(v[slot] as i64),
            Self::Uint32(v) => Value::Int(v[slot] as i64),
            Self::Int64(v) => Value::Int(v[slot]),
            Self::Uint64(v) => Value::from(v[slot]),
            Self::Double(v) => Value::Float(v[slot]),
            Self::Text(v) => Value::Text(Arc::clone(&v[slot])),
        }
    }

    /// Integer view of a slot, wide enough for every integer variant.
    fn int_at(&self, slot: usize) -> Option<i128> {
        match self {
            Self::Int32(v) => Some(v[slot] as i128),
            Self::Uint32(v) => Some(v[slot] as i128),
            Self::Int64(v) => Some(v[slot] as i128),
            Self::Uint64(v) => Some(v[slot] as i128),
            Self::Double(_) | Self::Text(_) => None,
        }
    }

    /// Compares the value stored at `slot` with a literal.
    fn cmp_slot(&self, slot: usize, literal: &Value) -> Option<Ordering> {
        match (self, literal) {
            (Self::Text(v), Value::Text(l)) => Some(v[slot].as_ref().cmp(l.as_ref())),
            (Self::Double(v), Value::Int(_) | Value::Uint(_) | Value::Float(_)) => {
                v[slot].partial_cmp(&literal.as_float()?)
            }
            (_, Value::Int(_) | Value::Uint(_)) => {
                Some(self.int_at(slot)?.cmp(&literal.as_i128()?))
            }
            (_, Value::Float(l)) => (self.int_at(slot)? as f64).partial_cmp(l),
            _ => None,
        }
    }

    /// Placeholder slot for a NULL row of a dense column.
    fn push_default(&mut self) {
        match self {
            Self::Int32(v) => v.push(0),
            Self::Uint32(v) => v.push(0),
            Self::Int64(v) => v.push(0),
            Self::Uint64(v) => v.push(0),
            Self::Double(v) => v.push(0.0),
            Self::Text(v) => v.push(Arc::from("")),
        }
    }

    /// Writes a validated value: appended when `slot` is `None`, inserted before `slot` when
    /// `insert` is set, overwritten otherwise.
    fn write(
        &mut self,
        slot: Option<usize>,
        insert: bool,
        value: &Value,
    ) -> std::result::Result<(), String> {
        fn put<T>(vec: &mut Vec<T>, slot: Option<usize>, insert: bool, item: T) {
            match slot {
                None => vec.push(item),
                Some(slot) if insert => vec.insert(slot, item),
                Some(slot) => vec[slot] = item,
            }
        }
        match (self, value.as_i128(), value.as_float(), value) {
            (Self::Int32(v), Some(i), _, _) => put(v, slot, insert, i as i32),
            (Self::Uint32(v), Some(i), _, _) => put(v, slot, insert, i as u32),
            (Self::Int64(v), Some(i), _, _) => put(v, slot, insert, i as i64),
            (Self::Uint64(v), Some(i), _, _) => put(v, slot, insert, i as u64),
            (Self::Double(v), _, Some(f), _) => put(v, slot, insert, f),
            (Self::Text(v), _, _, Value::Text(s)) => put(v, slot, insert, Arc::clone(s)),
            _ => return Err("Internal error: type mismatch".into()),
        }
        Ok(())
    }

    fn truncate(&mut self, slots: usize) {
        match self {
            Self::Int32(v) => v.truncate(slots),
            Self::Uint32(v) => v.truncate(slots),
            Self::Int64(v) => v.truncate(slots),
            Self::Uint64(v) => v.truncate(slots),
            Self::Double(v) => v.truncate(slots),
            Self::Text(v) => v.truncate(slots),
        }
    }

    fn remove(&mut self, slot: usize) {
        match self {
            Self::Int32(v) => {
                v.remove(slot);
            }
            Self::Uint32(v) => {
                v.remove(slot);
            }
            Self::Int64(v) => {
                v.remove(slot);
            }
            Self::Uint64(v) => {
                v.remove(slot);
            }
            Self::Double(v) => {
                v.remove(slot);
            }
            Self::Text(v) => {
                v.remove(slot);
            }
        }
    }
}

/// First index of `[0, len)` for which `pred` is false, assuming `pred` holds on a prefix.
pub(crate) fn partition_point(len: usize, pred: impl Fn(usize) -> bool) -> usize {
    let (mut lo, mut hi) = (0, len);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if pred(mid) {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Rows of `[0, len)` satisfying a range operator, given the ordering of each row against the
/// literal. Rows must be ordered non-decreasingly.
pub(crate) fn sorted_search(
    len: usize,
    op: FilterOp,
    cmp: impl Fn(usize) -> Option<Ordering>,
) -> Range<usize> {
    let lower = partition_point(len, |row| cmp(row) == Some(Ordering::Less));
    let upper = partition_point(len, |row| {
        matches!(cmp(row), Some(Ordering::Less | Ordering::Equal))
    });
    match op {
        FilterOp::Eq => lower..upper,
        FilterOp::Lt => 0..lower,
        FilterOp::Le => 0..upper,
        FilterOp::Gt => upper..len,
        FilterOp::Ge => lower..len,
        FilterOp::Ne | FilterOp::IsNull | FilterOp::IsNotNull => 0..0,
    }
}

/// Rows covered by one entry of [NullBitmap]'s rank directory.
const RANK_BLOCK: usize = 512;

/// Null bitmap of an optional column, with a rank directory so that mapping a row to its
/// sparse storage slot counts at most one block of bits.
#[derive(Debug, Clone, Allocative)]
struct NullBitmap {
    /// A `true` bit indicates that the value at that row is `NULL`.
    #[allocative(skip)]
    bits: BitVec,
    /// `ranks[b]` is the number of NULL rows before row `b * RANK_BLOCK`. There is always an
    /// entry for the block receiving the next row.
    ranks: Vec<usize>,
}

impl NullBitmap {
    fn new() -> Self {
        Self {
            bits: BitVec::new(),
            ranks: vec![0],
        }
    }

    fn is_null(&self, row: usize) -> bool {
        self.bits[row]
    }

    /// Number of NULL rows in `[0, row)`; `row` may be the length.
    fn nulls_before(&self, row: usize) -> usize {
        let block = row / RANK_BLOCK;
        self.ranks[block] + self.bits[block * RANK_BLOCK..row].count_ones()
    }

    fn push(&mut self, null: bool) {
        self.bits.push(null);
        let len = self.bits.len();
        if len % RANK_BLOCK == 0 {
            let before = self.ranks.last().copied().unwrap_or(0);
            self.ranks.push(before + self.bits[len - RANK_BLOCK..].count_ones());
        }
    }

    fn truncate(&mut self, len: usize) {
        self.bits.truncate(len);
        self.ranks.truncate(len / RANK_BLOCK + 1);
    }

    fn set(&mut self, row: usize, null: bool) {
        if self.bits[row] == null {
            return;
        }
        self.bits.set(row, null);
        for rank in &mut self.ranks[row / RANK_BLOCK + 1..] {
            if null {
                *rank += 1;
            } else {
                *rank -= 1;
            }
        }
    }

    fn rows(&self, nulls: bool) -> RowSelection {
        if nulls {
            RowSelection::Bits(self.bits.clone())
        } else {
            RowSelection::Bits(!self.bits.clone())
        }
    }
}

/// Lazily built map from set head to the rows of its set.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SetIdIndex {
    members: HashMap<u32, Vec<u32>>,
}

impl SetIdIndex {
    fn build(values: &[u32]) -> Self {
        let mut members: HashMap<u32, Vec<u32>> = HashMap::new();
        for (row, head) in values.iter().enumerate() {
            members.entry(*head).or_default().push(row as u32);
        }
        Self { members }
    }

    pub fn members(&self, head: u32) -> &[u32] {
        self.members.get(&head).map_or(&[], Vec::as_slice)
    }

    /// Number of distinct sets.
    pub fn set_count(&self) -> usize {
        self.members.len()
    }
}

/// Represents a column within a table.
/// It combines metadata (name, type, flags) with the actual data and a nullability tracker.
///
/// Optional columns come in two layouts: sparse (default) stores only non-null values and maps
/// a row to its slot by ranking the null bitmap; [ColumnFlags::DENSE] stores a slot for every
/// row, so access is O(1) at the price of placeholder slots for nulls.
#[derive(Debug, Allocative)]
pub struct Column {
    /// The name of the column.
    pub name: String,
    /// The declared type of the column.
    #[allocative(skip)]
    pub data_type: DataType,
    /// Whether the column accepts `NULL`.
    pub optional: bool,
    #[allocative(skip)]
    pub flags: ColumnFlags,
    data: ColumnData,
    /// Only maintained for optional columns.
    null_bitmap: NullBitmap,
    len: usize,
    #[allocative(skip)]
    set_id_index: RwLock<Option<Arc<SetIdIndex>>>,
}

impl Column {
    /// Creates a new, empty, non-optional column without flags.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let data = ColumnData::new(&data_type);
        Self {
            name: name.into(),
            data_type,
            optional: false,
            flags: ColumnFlags::NONE,
            data,
            null_bitmap: NullBitmap::new(),
            len: 0,
            set_id_index: RwLock::new(None),
        }
    }

    /// Makes the column accept `NULL`.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_flags(mut self, flags: ColumnFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Returns the number of rows currently stored in the column.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if there is no row in the column, else false.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_sorted(&self) -> bool {
        self.flags.contains(ColumnFlags::SORTED)
    }

    pub fn is_set_id(&self) -> bool {
        self.flags.contains(ColumnFlags::SET_ID)
    }

    fn is_dense(&self) -> bool {
        self.flags.contains(ColumnFlags::DENSE)
    }

    /// Maps a row to its storage slot, `None` for a NULL row.
    fn slot(&self, row: usize) -> Option<usize> {
        if !self.optional {
            return Some(row);
        }
        if self.null_bitmap.is_null(row) {
            return None;
        }
        if self.is_dense() {
            Some(row)
        } else {
            Some(row - self.null_bitmap.nulls_before(row))
        }
    }

    /// Checks that `value` can be appended as the next row.
    ///
    /// Besides the type, this enforces the data flags: SORTED values must not decrease, and a
    /// SET_ID value must either start a new set (`v == row`) or point at an earlier set head.
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        if value.is_null() {
            if self.optional {
                return Ok(());
            }
            return Err(format!("column {:?} does not accept NULL", self.name));
        }
        self.check_type(value)?;

        let row = self.len;
        if self.is_sorted() && value.is_unordered() {
            return Err(format!(
                "column {:?} is SORTED but {value:?} is unordered",
                self.name
            ));
        }
        if self.is_sorted() && row > 0 {
            let last = self.data.value(self.data.len() - 1);
            match value.sql_cmp(&last) {
                Some(Ordering::Less) => {
                    return Err(format!(
                        "column {:?} is SORTED but {value:?} follows {last:?}",
                        self.name
                    ));
                }
                None => {
                    return Err(format!(
                        "column {:?} is SORTED but {value:?} is unordered",
                        self.name
                    ));
                }
                _ => {}
            }
        }
        if self.is_set_id() {
            let Some(head) = value.as_i128().filter(|head| *head >= 0) else {
                return Err(format!(
                    "SET_ID column {:?}: {value:?} is not a row index",
                    self.name
                ));
            };
            if head > row as i128 {
                return Err(format!(
                    "SET_ID column {:?}: value {head} is greater than row {row}",
                    self.name
                ));
            }
            let head = head as usize;
            if head < row && self.data.int_at(head) != Some(head as i128) {
                return Err(format!(
                    "SET_ID column {:?}: row {head} is not the head of a set",
                    self.name
                ));
            }
        }
        Ok(())
    }

    fn check_type(&self, value: &Value) -> std::result::Result<(), String> {
        let accepted = match (&self.data_type, value) {
            (DataType::Double, _) => value.is_numeric(),
            (DataType::String, Value::Text(_)) => true,
            (data_type, Value::Int(_) | Value::Uint(_)) => {
                match (data_type.int_bounds(), value.as_i128()) {
                    (Some((min, max)), Some(i)) => (min..=max).contains(&i),
                    _ => false,
                }
            }
            _ => false,
        };
        if accepted {
            Ok(())
        } else {
            Err(format!(
                "Value {value:?} does not fit column {:?} of type {}",
                self.name,
                self.data_type.name()
            ))
        }
    }

    /// Appends a new value to the end of the column.
    ///
    /// # Errors
    /// Returns the reason of the rejection if [Column::check] fails; the column is left untouched.
    ///
    /// # Example
    /// ```
    /// # use tracedb::{Column, DataType, Value};
    /// let mut col = Column::new("dur", DataType::Int64).optional();
    /// col.push(Value::Int(30)).unwrap();
    /// col.push(Value::Null).unwrap();
    ///
    /// assert_eq!(col.len(), 2);
    /// assert!(col.get(1).unwrap().is_null());
    /// ```
    pub fn push(&mut self, value: Value) -> std::result::Result<(), String> {
        self.check(&value)?;
        self.push_unchecked(&value)
    }

    /// Appends a value already accepted by [Column::check].
    pub(crate) fn push_unchecked(&mut self, value: &Value) -> std::result::Result<(), String> {
        if value.is_null() {
            if self.is_dense() {
                self.data.push_default();
            }
            self.null_bitmap.push(true);
        } else {
            self.data.write(None, false, value)?;
            if self.optional {
                self.null_bitmap.push(false);
            }
        }
        self.len += 1;
        *self.set_id_index.get_mut() = None;
        Ok(())
    }

    /// Drops every row from `len` on. Only used to roll back a partially written row.
    pub(crate) fn truncate(&mut self, len: usize) {
        if len >= self.len {
            return;
        }
        let slots = if !self.optional || self.is_dense() {
            len
        } else {
            len - self.null_bitmap.nulls_before(len)
        };
        self.data.truncate(slots);
        if self.optional {
            self.null_bitmap.truncate(len);
        }
        self.len = len;
        *self.set_id_index.get_mut() = None;
    }

    /// Retrieves the value at the specified row index.
    ///
    /// # Errors
    /// [StoreError::OutOfRange] if `row_idx >= len`; positions are never clamped.
    pub fn get(&self, row_idx: usize) -> Result<Value> {
        if row_idx >= self.len {
            return Err(StoreError::OutOfRange {
                index: row_idx,
                len: self.len,
            });
        }
        Ok(self
            .slot(row_idx)
            .map_or(Value::Null, |slot| self.data.value(slot)))
    }

    /// Replace a value in the column by a new value.
    ///
    /// Flag policy (MUTABLE) is enforced by the owning table; this only checks the type and
    /// keeps the sparse layout consistent when a row switches between NULL and non-NULL.
    pub fn set(&mut self, row_idx: usize, value: &Value) -> std::result::Result<(), String> {
        self.check_set(row_idx, value)?;

        if !self.optional || self.is_dense() {
            if value.is_null() {
                self.null_bitmap.set(row_idx, true);
            } else {
                self.data.write(Some(row_idx), false, value)?;
                if self.optional {
                    self.null_bitmap.set(row_idx, false);
                }
            }
        } else {
            let slot = row_idx - self.null_bitmap.nulls_before(row_idx);
            let was_null = self.null_bitmap.is_null(row_idx);
            match (was_null, value.is_null()) {
                (true, true) => {}
                (true, false) => self.data.write(Some(slot), true, value)?,
                (false, true) => self.data.remove(slot),
                (false, false) => self.data.write(Some(slot), false, value)?,
            }
            self.null_bitmap.set(row_idx, value.is_null());
        }
        *self.set_id_index.get_mut() = None;
        Ok(())
    }

    /// Checks that [Column::set] would accept `value` at `row_idx`, without writing it.
    pub fn check_set(&self, row_idx: usize, value: &Value) -> std::result::Result<(), String> {
        if self.len <= row_idx {
            return Err("The row index is too high".into());
        }
        if value.is_null() {
            if !self.optional {
                return Err(format!("column {:?} does not accept NULL", self.name));
            }
            Ok(())
        } else {
            self.check_type(value)
        }
    }

    /// Compares the row with a literal; `None` for NULL rows and incomparable values.
    pub fn compare_row(&self, row: usize, literal: &Value) -> Option<Ordering> {
        self.data.cmp_slot(self.slot(row)?, literal)
    }

    /// Rejects literals which can never be compared with this column.
    pub fn check_literal(&self, literal: &Value) -> Result<()> {
        let compatible = match literal {
            Value::Null => true,
            Value::Text(_) => !self.data_type.is_numeric(),
            Value::Int(_) | Value::Uint(_) | Value::Float(_) => self.data_type.is_numeric(),
        };
        if compatible {
            Ok(())
        } else {
            Err(StoreError::TypeMismatch {
                expected: self.data_type.name(),
                found: literal.type_name().into(),
            })
        }
    }

    /// Finds the rows satisfying `col OP literal`.
    ///
    /// SORTED columns answer range operators with a binary search in O(log n) and `!=` as the
    /// complement of the `=` range; everything else is a full linear scan.
    ///
    /// # Errors
    /// [StoreError::TypeMismatch] if the literal cannot be compared with the column type.
    pub fn find_range(&self, op: FilterOp, literal: &Value) -> Result<RowSelection> {
        match op {
            FilterOp::IsNull => return Ok(self.null_rows(true)),
            FilterOp::IsNotNull => return Ok(self.null_rows(false)),
            _ => {}
        }
        if literal.is_unordered() {
            return Ok(RowSelection::empty());
        }
        self.check_literal(literal)?;

        if self.is_sorted() {
            if op.is_range_op() {
                return Ok(RowSelection::Range(self.sorted_range(op, literal)));
            }
            let eq = self.sorted_range(FilterOp::Eq, literal);
            return Ok(RowSelection::Range(eq).complement(self.len));
        }

        let mut bits = bitvec![0; self.len];
        self.scan_into(op, literal, 0..self.len, &mut bits);
        Ok(RowSelection::Bits(bits))
    }

    fn null_rows(&self, nulls: bool) -> RowSelection {
        if !self.optional {
            return if nulls {
                RowSelection::empty()
            } else {
                RowSelection::all(self.len)
            };
        }
        self.null_bitmap.rows(nulls)
    }

    /// Linear scan of `rows`, setting the bit of every matching row in `out`.
    ///
    /// `out` must be at least `rows.end` bits long. Exposed so callers can scan in chunks and
    /// check for cancellation in between.
    pub fn scan_into(&self, op: FilterOp, literal: &Value, rows: Range<usize>, out: &mut BitVec) {
        for row in rows {
            let matched = match op {
                FilterOp::IsNull => self.optional && self.null_bitmap.is_null(row),
                FilterOp::IsNotNull => !self.optional || !self.null_bitmap.is_null(row),
                _ => op.matches(self.compare_row(row, literal)),
            };
            if matched {
                out.set(row, true);
            }
        }
    }

    /// Binary search over a SORTED column. `op` must be a range operator.
    pub fn sorted_range(&self, op: FilterOp, literal: &Value) -> Range<usize> {
        sorted_search(self.len, op, |row| self.compare_row(row, literal))
    }

    /// Returns every row `i` with `col[i] == head`.
    ///
    /// SORTED set-id columns answer with a binary search; other set-id columns build a
    /// head→members index on first use and reuse it until the next write.
    ///
    /// # Errors
    /// [StoreError::TypeMismatch] if the column is not flagged SET_ID.
    pub fn set_id_members(&self, head: u32) -> Result<Vec<u32>> {
        if !self.is_set_id() {
            return Err(StoreError::TypeMismatch {
                expected: "SET_ID column".into(),
                found: format!("column {:?}", self.name),
            });
        }
        if self.is_sorted() {
            let run = self.sorted_range(FilterOp::Eq, &Value::Int(head as i64));
            return Ok(run.map(|row| row as u32).collect());
        }
        Ok(self.set_id_index().members(head).to_vec())
    }

    /// Returns the head→members index, building it if needed.
    ///
    /// Concurrent callers may each build an index; the first one published wins and, since
    /// the build is a pure function of the column data, every build is identical.
    pub fn set_id_index(&self) -> Arc<SetIdIndex> {
        if let Some(index) = self.set_id_index.read().as_ref() {
            return Arc::clone(index);
        }
        let values: &[u32] = match &self.data {
            ColumnData::Uint32(values) => values,
            _ => &[],
        };
        let built = Arc::new(SetIdIndex::build(values));
        debug!(
            column = %self.name,
            rows = values.len(),
            sets = built.set_count(),
            "built set-id index"
        );
        let mut slot = self.set_id_index.write();
        Arc::clone(slot.get_or_insert(built))
    }

    /// Returns true once the lazy set-id index has been built.
    pub fn has_set_id_index(&self) -> bool {
        self.set_id_index.read().is_some()
    }

    /// Re-verifies the SORTED and SET_ID invariants over the whole column.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        for row in 1..self.len {
            if self.is_sorted() {
                let prev = self.data.value(row - 1);
                if self.data.cmp_slot(row, &prev) == Some(Ordering::Less) {
                    return Err(format!("column {:?} is not sorted at row {row}", self.name));
                }
            }
        }
        if self.is_set_id() {
            for row in 0..self.len {
                let head = self.data.int_at(row).unwrap_or(-1);
                let is_valid_head = head >= 0
                    && head <= row as i128
                    && self.data.int_at(head as usize) == Some(head);
                if !is_valid_head {
                    return Err(format!(
                        "SET_ID column {:?}: row {row} holds invalid set {head}",
                        self.name
                    ));
                }
            }
        }
        Ok(())
    }
}
