//! Tier of rows held in a vector.
use super::{insert_into_row, Side};

/// Rows of at most `row_max` records each, in order.
///
/// At least one row always exists, possibly empty.
#[derive(Clone)]
pub(crate) struct Medium<T> {
    pub(crate) rows: Vec<Vec<T>>,
}

impl<T> Medium<T> {
    pub(crate) fn from_row(row: Vec<T>) -> Self {
        Self { rows: vec![row] }
    }

    #[inline(always)]
    pub(crate) fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the row holding `idx` and the offset within it; `idx == len` maps to the
    /// end of the last row.
    fn locate(&self, idx: usize) -> (usize, usize) {
        let mut rem = idx;
        for (i, row) in self.rows.iter().enumerate() {
            if rem < row.len() {
                return (i, rem);
            }
            rem -= row.len();
        }
        let last = self.rows.len() - 1;
        (last, self.rows[last].len())
    }

    pub(crate) fn insert(&mut self, idx: usize, val: T, row_max: usize) {
        let (i, offset) = self.locate(idx);
        if let Some((row, side)) = insert_into_row(&mut self.rows[i], offset, val, row_max) {
            let at = match side {
                Side::Before => i,
                Side::After => i + 1,
            };
            self.rows.insert(at, row);
        }
    }

    pub(crate) fn delete(&mut self, idx: usize) -> T {
        let (i, offset) = self.locate(idx);
        let val = self.rows[i].remove(offset);
        if self.rows[i].is_empty() && self.rows.len() > 1 {
            self.rows.remove(i);
        }
        val
    }

    pub(crate) fn get(&self, idx: usize) -> Option<&T> {
        let (i, offset) = self.locate(idx);
        self.rows[i].get(offset)
    }

    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        let (i, offset) = self.locate(idx);
        self.rows[i].get_mut(offset)
    }
}
