//! Helpers shared by `Debug` implementations.
use std::fmt;

/// Row-wise debug view of a long slice.
///
/// `{:?}` prints only the number of items, and `{:#?}` prints `cols` items per row.
pub(crate) struct MatrixView<'a, T> {
    data: &'a [T],
    cols: usize,
}

impl<'a, T> MatrixView<'a, T> {
    /// Creates a view printing `cols` items per row, or one if `cols` is zero.
    pub(crate) fn new(data: &'a [T], cols: usize) -> Self {
        Self {
            data,
            cols: cols.max(1),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for MatrixView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !f.alternate() {
            return write!(f, "[{} items]", self.data.len());
        }
        writeln!(f, "[")?;
        for row in self.data.chunks(self.cols) {
            write!(f, "    ")?;
            for (i, item) in row.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{item:?}")?;
            }
            writeln!(f, ",")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_and_pretty() {
        let data = [1u8, 2, 3, 4, 5];
        assert_eq!(format!("{:?}", MatrixView::new(&data, 2)), "[5 items]");
        assert_eq!(
            format!("{:#?}", MatrixView::new(&data, 2)),
            "[\n    1, 2,\n    3, 4,\n    5,\n]"
        );
        assert_eq!(format!("{:#?}", MatrixView::new(&data[..1], 0)), "[\n    1,\n]");
    }
}
