//! Element types a Fenwick tree can accumulate.
use std::fmt::Debug;

use num_traits::{WrappingAdd, WrappingSub, Zero};

/// A summable element of a [`Fenwick`](crate::Fenwick) tree.
///
/// Integer sums wrap on overflow, so that [`Fenwick::set()`](crate::Fenwick::set) on
/// unsigned types can store a negative delta.
pub trait FenwickValue: Copy + Debug + Default + PartialOrd + Zero {
    /// Returns `self + rhs`.
    fn accumulate(self, rhs: Self) -> Self;

    /// Returns `self - rhs`.
    fn difference(self, rhs: Self) -> Self;
}

macro_rules! integer_value {
    ($($ty:ty),*) => {
        $(
            impl FenwickValue for $ty {
                #[inline(always)]
                fn accumulate(self, rhs: Self) -> Self {
                    WrappingAdd::wrapping_add(&self, &rhs)
                }

                #[inline(always)]
                fn difference(self, rhs: Self) -> Self {
                    WrappingSub::wrapping_sub(&self, &rhs)
                }
            }
        )*
    };
}

macro_rules! float_value {
    ($($ty:ty),*) => {
        $(
            impl FenwickValue for $ty {
                #[inline(always)]
                fn accumulate(self, rhs: Self) -> Self {
                    self + rhs
                }

                #[inline(always)]
                fn difference(self, rhs: Self) -> Self {
                    self - rhs
                }
            }
        )*
    };
}

integer_value!(i16, i32, i64, i128, u16, u32, u64, u128);
float_value!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping() {
        assert_eq!(3u16.difference(5), u16::MAX - 1);
        assert_eq!(u16::MAX.difference(1).accumulate(2), 0);
        assert_eq!(i64::MAX.accumulate(1), i64::MIN);
        assert_eq!(0.5f32.difference(1.0), -0.5);
        assert!(<f64 as Zero>::zero().is_zero());
    }
}
