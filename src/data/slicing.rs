// Resolve integer, slice and mask indexing into subselection expressions
// Author: Gabriel Demetrios Lafis

use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use log::debug;

use super::{
    arange, rowid, BooleanColumnView, Column, ColumnExpr, DataError, Evaluate,
    FloatColumn, FloatColumnView, FloatOps, Length, Operand,
};
use crate::comm::Session;

/// Python-style `[start:stop:step]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SliceSpec {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl SliceSpec {
    /// Create a new slice
    pub fn new(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Self {
        SliceSpec { start, stop, step }
    }

    /// `[..]`
    pub fn full() -> Self {
        SliceSpec::default()
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    fn step_or_default(&self) -> Result<i64, DataError> {
        match self.step.unwrap_or(1) {
            0 => Err(DataError::Value("slice step cannot be zero".to_string())),
            step => Ok(step),
        }
    }

    /// Concrete `(start, stop, step)` for a container of length `len`,
    /// clamped exactly like Python's `slice.indices`
    pub fn indices(&self, len: usize) -> Result<(i64, i64, i64), DataError> {
        let step = self.step_or_default()?;
        let len = len as i64;

        let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };

        let clamp = |bound: Option<i64>, default: i64| match bound {
            None => default,
            Some(b) => {
                let b = if b < 0 { b + len } else { b };
                b.clamp(lower, upper)
            }
        };

        let start = clamp(self.start, if step < 0 { upper } else { lower });
        let stop = clamp(self.stop, if step < 0 { lower } else { upper });

        Ok((start, stop, step))
    }

    /// Whether resolving requires the container's length
    pub fn needs_length(&self) -> bool {
        let negative_step = self.step.map_or(false, |s| s < 0);
        let negative_start = self.start.map_or(false, |s| s < 0);
        let open_or_negative_stop = self.stop.map_or(true, |s| s < 0);

        negative_step || negative_start || open_or_negative_stop
    }
}

impl From<Range<i64>> for SliceSpec {
    fn from(r: Range<i64>) -> Self {
        SliceSpec::new(Some(r.start), Some(r.end), None)
    }
}

impl From<RangeFrom<i64>> for SliceSpec {
    fn from(r: RangeFrom<i64>) -> Self {
        SliceSpec::new(Some(r.start), None, None)
    }
}

impl From<RangeTo<i64>> for SliceSpec {
    fn from(r: RangeTo<i64>) -> Self {
        SliceSpec::new(None, Some(r.end), None)
    }
}

impl From<RangeFull> for SliceSpec {
    fn from(_: RangeFull) -> Self {
        SliceSpec::full()
    }
}

/// Anything a column or table can be indexed with
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Index(i64),
    Slice(SliceSpec),
    /// Rows where the mask is true
    Mask(BooleanColumnView),
    /// Row numbers given by a numerical column
    Numeric(Column),
}

impl From<i64> for Selection {
    fn from(i: i64) -> Self {
        Selection::Index(i)
    }
}

impl From<i32> for Selection {
    fn from(i: i32) -> Self {
        Selection::Index(i64::from(i))
    }
}

impl From<SliceSpec> for Selection {
    fn from(s: SliceSpec) -> Self {
        Selection::Slice(s)
    }
}

impl From<Range<i64>> for Selection {
    fn from(r: Range<i64>) -> Self {
        Selection::Slice(r.into())
    }
}

impl From<RangeFrom<i64>> for Selection {
    fn from(r: RangeFrom<i64>) -> Self {
        Selection::Slice(r.into())
    }
}

impl From<RangeTo<i64>> for Selection {
    fn from(r: RangeTo<i64>) -> Self {
        Selection::Slice(r.into())
    }
}

impl From<RangeFull> for Selection {
    fn from(r: RangeFull) -> Self {
        Selection::Slice(r.into())
    }
}

impl From<BooleanColumnView> for Selection {
    fn from(mask: BooleanColumnView) -> Self {
        Selection::Mask(mask)
    }
}

impl From<FloatColumn> for Selection {
    fn from(col: FloatColumn) -> Self {
        Selection::Numeric(Column::Float(col))
    }
}

impl From<FloatColumnView> for Selection {
    fn from(col: FloatColumnView) -> Self {
        Selection::Numeric(Column::FloatView(col))
    }
}

/// Source of a container's length, asked at most once per resolution
#[cfg_attr(test, mockall::automock)]
pub trait RowCount {
    fn row_count(&self) -> Result<Length, DataError>;
}

/// A length that is already known
impl RowCount for Length {
    fn row_count(&self) -> Result<Length, DataError> {
        Ok(*self)
    }
}

/// Ask the engine for the length of a column
pub struct RemoteRowCount<'a, C: Evaluate + ?Sized> {
    session: &'a Session,
    col: &'a C,
}

impl<'a, C: Evaluate + ?Sized> RemoteRowCount<'a, C> {
    pub fn new(session: &'a Session, col: &'a C) -> Self {
        RemoteRowCount { session, col }
    }
}

impl<'a, C: Evaluate + ?Sized> RowCount for RemoteRowCount<'a, C> {
    fn row_count(&self) -> Result<Length, DataError> {
        debug!("Fetching the length of {} to resolve an index", self.col.column_type());
        self.col.nrows(self.session)
    }
}

/// The canonical filter a selection resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum Subselection {
    /// A contiguous or strided range of row numbers
    Range(FloatColumnView),
    Mask(BooleanColumnView),
    Numeric(Column),
}

impl Subselection {
    /// Number of rows a range selects
    pub fn range_len(&self) -> Option<usize> {
        match self {
            Subselection::Range(range) => range.range_len(),
            _ => None,
        }
    }

    pub fn to_operand(&self) -> Operand {
        match self {
            Subselection::Range(range) => range.operand(),
            Subselection::Mask(mask) => mask.operand(),
            Subselection::Numeric(col) => col.operand(),
        }
    }

    pub fn to_column(&self) -> Column {
        match self {
            Subselection::Range(range) => range.to_column(),
            Subselection::Mask(mask) => mask.to_column(),
            Subselection::Numeric(col) => col.clone(),
        }
    }
}

fn range_of(start: i64, stop: i64, step: i64) -> FloatColumnView {
    arange(start as f64, stop as f64, step as f64)
}

/// Resolve a slice, fetching the length only when a bound is open or negative
/// or the step runs backwards
pub fn resolve_slice(spec: &SliceSpec, rows: &impl RowCount) -> Result<Subselection, DataError> {
    let step = spec.step_or_default()?;

    if !spec.needs_length() {
        let start = spec.start.unwrap_or(0);
        let stop = spec.stop.unwrap_or(start).max(start);
        return Ok(Subselection::Range(range_of(start, stop, step)));
    }

    match rows.row_count()? {
        Length::Finite(len) => {
            let (start, stop, step) = spec.indices(len)?;
            Ok(Subselection::Range(range_of(start, stop, step)))
        }
        Length::Infinite if step > 0 && spec.stop.is_none() && spec.start.map_or(true, |s| s >= 0) => {
            let start = spec.start.unwrap_or(0) as f64;
            let ids = rowid();
            let mask = ids.greater_equal(start) & ((&ids - start) % (step as f64)).equal_to(0.0);
            Ok(Subselection::Mask(mask))
        }
        length => Err(DataError::Index(format!(
            "Cannot resolve the slice {:?} on a column of {} length.",
            spec, length
        ))),
    }
}

/// Resolve a single row number into a one-row range
pub fn resolve_index(index: i64, rows: &impl RowCount) -> Result<Subselection, DataError> {
    let index = if index < 0 {
        match rows.row_count()? {
            Length::Finite(len) => index + len as i64,
            length => {
                return Err(DataError::Index(format!(
                    "Negative indices require a finite length, got {}.",
                    length
                )))
            }
        }
    } else {
        index
    };

    if index < 0 {
        return Err(DataError::Index("Index out of bounds.".to_string()));
    }

    Ok(Subselection::Range(range_of(index, index + 1, 1)))
}

impl Selection {
    /// Canonical filter for this selection
    pub fn resolve(&self, rows: &impl RowCount) -> Result<Subselection, DataError> {
        match self {
            Selection::Index(i) => resolve_index(*i, rows),
            Selection::Slice(spec) => resolve_slice(spec, rows),
            Selection::Mask(mask) => Ok(Subselection::Mask(mask.clone())),
            Selection::Numeric(col) if col.column_type().is_float() => Ok(Subselection::Numeric(col.clone())),
            Selection::Numeric(col) => Err(DataError::Type(format!(
                "Only numerical columns can select rows by number, got {}.",
                col.column_type()
            ))),
        }
    }
}

impl Column {
    /// Subselect rows of this column
    ///
    /// Integer indices resolve to a one-row range; out-of-bounds rows are
    /// detected by probing the length of that one-row view.
    pub fn select(&self, session: &Session, selection: impl Into<Selection>) -> Result<Column, DataError> {
        let selection = selection.into();
        let rows = RemoteRowCount::new(session, self);
        let sub = selection.resolve(&rows)?;

        let selected = self.subselect(sub.to_operand());

        if let Selection::Index(_) = selection {
            if selected.nrows(session)? == Length::Finite(0) {
                return Err(DataError::Index("Index out of bounds.".to_string()));
            }
        }

        Ok(selected)
    }

    /// Subselect rows using an already known length; never talks to the engine
    pub fn select_with_length(&self, selection: impl Into<Selection>, length: Length) -> Result<Column, DataError> {
        let sub = selection.into().resolve(&length)?;
        Ok(self.subselect(sub.to_operand()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finite(n: usize) -> MockRowCount {
        let mut rows = MockRowCount::new();
        rows.expect_row_count().times(1).returning(move || Ok(Length::Finite(n)));
        rows
    }

    fn untouched() -> MockRowCount {
        let mut rows = MockRowCount::new();
        rows.expect_row_count().times(0);
        rows
    }

    #[test]
    fn test_indices_match_python() {
        let cases = [
            (SliceSpec::new(None, None, Some(-1)), (9, -1, -1)),
            (SliceSpec::new(Some(-3), None, None), (7, 10, 1)),
            (SliceSpec::new(Some(2), Some(-2), Some(3)), (2, 8, 3)),
            (SliceSpec::new(Some(100), None, None), (10, 10, 1)),
            (SliceSpec::new(Some(-100), Some(5), None), (0, 5, 1)),
            (SliceSpec::new(Some(5), Some(2), None), (5, 2, 1)),
            (SliceSpec::new(None, None, Some(-2)), (9, -1, -2)),
            (SliceSpec::new(Some(-100), None, Some(-1)), (-1, -1, -1)),
        ];

        for (spec, expected) in cases {
            assert_eq!(spec.indices(10).unwrap(), expected, "{:?}", spec);
        }

        assert_eq!(crate::data::arange_len(9.0, -1.0, -2.0), 5);
        assert_eq!(crate::data::arange_len(5.0, 2.0, 1.0), 0);
    }

    #[test]
    fn test_zero_step_is_rejected() {
        let spec = SliceSpec::full().with_step(0);

        assert!(spec.indices(10).unwrap_err().is_local());
        assert!(resolve_slice(&spec, &untouched()).is_err());
    }

    #[test]
    fn test_closed_slice_needs_no_length() {
        // Step 1: `rowid()[3:3]` is empty without a round trip
        let sub = resolve_slice(&SliceSpec::from(3..3), &untouched()).unwrap();
        assert_eq!(sub.range_len(), Some(0));

        // Step 2: a forward slice with explicit bounds
        let sub = resolve_slice(&SliceSpec::new(Some(2), Some(10), Some(3)), &untouched()).unwrap();
        assert_eq!(sub.range_len(), Some(3));
    }

    #[test]
    fn test_open_slice_fetches_length_once() {
        let sub = resolve_slice(&SliceSpec::new(Some(-3), None, None), &finite(10)).unwrap();

        match sub {
            Subselection::Range(range) => {
                let cmd = range.to_cmd();
                assert_eq!(cmd["start_"], 7.0);
                assert_eq!(cmd["stop_"], 10.0);
            }
            other => panic!("expected a range, got {:?}", other),
        }

        let sub = resolve_slice(&SliceSpec::full().with_step(-1), &finite(4)).unwrap();
        assert_eq!(sub.range_len(), Some(4));
    }

    #[test]
    fn test_infinite_column_uses_rowid_mask() {
        let mut rows = MockRowCount::new();
        rows.expect_row_count().times(1).returning(|| Ok(Length::Infinite));

        let sub = resolve_slice(&SliceSpec::new(Some(2), None, Some(3)), &rows).unwrap();

        match sub {
            Subselection::Mask(mask) => {
                let cmd = mask.to_cmd();
                assert_eq!(cmd["operator_"], "and");
                assert_eq!(cmd["operand1_"]["operator_"], "greater_equal");
                assert_eq!(cmd["operand2_"]["operator_"], "num_equal_to");
            }
            other => panic!("expected a mask, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_index() {
        // Non-negative indices never ask for the length
        let sub = resolve_index(4, &untouched()).unwrap();
        assert_eq!(sub.range_len(), Some(1));

        // Negative indices ask once
        let sub = resolve_index(-1, &finite(10)).unwrap();
        assert_eq!(sub.to_operand().to_cmd()["start_"], 9.0);

        // Too negative is out of bounds before any data is fetched
        let err = resolve_index(-11, &finite(10)).unwrap_err();
        assert_eq!(err.to_string(), "Index error: Index out of bounds.");
    }

    #[test]
    fn test_masks_pass_through() {
        let mask = rowid().greater(5.0);

        let sub = Selection::from(mask.clone()).resolve(&untouched()).unwrap();

        assert_eq!(sub, Subselection::Mask(mask));
    }

    #[test]
    fn test_select_with_known_length() {
        let col = Column::from(rowid());

        let selected = col.select_with_length(2..5, Length::Finite(10)).unwrap();
        let cmd = selected.to_cmd();

        assert_eq!(cmd["operator_"], "num_subselection");
        assert_eq!(cmd["operand2_"]["operator_"], "arange");
    }
}
