//! In-place counters and whole-list arithmetic folds.
use super::{Entry, Flex};
use crate::databox::Databox;
use crate::error::{Error, Result};

fn as_float(val: &Databox<'_>) -> Option<f64> {
    match *val {
        Databox::Float32(v) => Some(v as f64),
        _ => None,
    }
}

fn as_double(val: &Databox<'_>) -> Option<f64> {
    match *val {
        Databox::Double64(v) => Some(v),
        _ => None,
    }
}

macro_rules! fold_def {
    ($name:ident, $ty:ty, $extract:expr, $expected:literal, $op:expr, $doc:literal) => {
        #[doc = $doc]
        ///
        /// An empty list folds to zero.
        ///
        /// # Errors
        ///
        /// An error is returned if any entry is not of the folded type.
        pub fn $name(&self) -> Result<$ty> {
            self.fold($expected, $extract, $op)
        }
    };
}

impl Flex {
    fn fold<T: Default>(
        &self,
        expected: &'static str,
        extract: impl Fn(&Databox<'_>) -> Option<T>,
        op: impl Fn(T, T) -> T,
    ) -> Result<T> {
        let mut acc: Option<T> = None;
        for val in self.iter() {
            let x = extract(&val).ok_or(Error::TypeMismatch {
                expected,
                found: val.type_name(),
            })?;
            acc = Some(match acc {
                Some(a) => op(a, x),
                None => x,
            });
        }
        Ok(acc.unwrap_or_default())
    }

    fold_def!(
        add_signed,
        i64,
        |v: &Databox<'_>| v.as_i64(),
        "signed",
        i64::wrapping_add,
        "Returns the wrapping sum of every entry as `i64`."
    );
    fold_def!(
        subtract_signed,
        i64,
        |v: &Databox<'_>| v.as_i64(),
        "signed",
        i64::wrapping_sub,
        "Returns the first entry minus every following entry as `i64`, wrapping."
    );
    fold_def!(
        multiply_signed,
        i64,
        |v: &Databox<'_>| v.as_i64(),
        "signed",
        i64::wrapping_mul,
        "Returns the wrapping product of every entry as `i64`."
    );
    fold_def!(
        add_unsigned,
        u64,
        |v: &Databox<'_>| v.as_u64(),
        "unsigned",
        u64::wrapping_add,
        "Returns the wrapping sum of every entry as `u64`."
    );
    fold_def!(
        subtract_unsigned,
        u64,
        |v: &Databox<'_>| v.as_u64(),
        "unsigned",
        u64::wrapping_sub,
        "Returns the first entry minus every following entry as `u64`, wrapping."
    );
    fold_def!(
        multiply_unsigned,
        u64,
        |v: &Databox<'_>| v.as_u64(),
        "unsigned",
        u64::wrapping_mul,
        "Returns the wrapping product of every entry as `u64`."
    );
    fold_def!(
        add_float,
        f64,
        as_float,
        "float32",
        |a, b| a + b,
        "Returns the sum of every 32-bit float entry."
    );
    fold_def!(
        subtract_float,
        f64,
        as_float,
        "float32",
        |a, b| a - b,
        "Returns the first 32-bit float entry minus every following one."
    );
    fold_def!(
        multiply_float,
        f64,
        as_float,
        "float32",
        |a, b| a * b,
        "Returns the product of every 32-bit float entry."
    );
    fold_def!(
        add_double,
        f64,
        as_double,
        "double64",
        |a, b| a + b,
        "Returns the sum of every 64-bit float entry."
    );
    fold_def!(
        subtract_double,
        f64,
        as_double,
        "double64",
        |a, b| a - b,
        "Returns the first 64-bit float entry minus every following one."
    );
    fold_def!(
        multiply_double,
        f64,
        as_double,
        "double64",
        |a, b| a * b,
        "Returns the product of every 64-bit float entry."
    );

    /// Adds `delta` to the integer at `e`, returning the rewritten entry and the new value.
    ///
    /// # Errors
    ///
    /// An error is returned if the entry is not an `i64`-representable integer or the
    /// addition overflows.
    ///
    /// # Examples
    ///
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use datakit::{Databox, Endpoint, Flex};
    ///
    /// let mut f = Flex::new();
    /// let e = f.push(&Databox::from(100u64), Endpoint::Tail);
    /// let (e, v) = f.incrby_signed(e, -250)?;
    /// assert_eq!(v, -150);
    /// assert_eq!(f.get(e), Databox::from(-150i64));
    /// assert!(f.incrby_signed(e, i64::MIN).is_err());
    /// # Ok(())
    /// # }
    /// ```
    pub fn incrby_signed(&mut self, e: Entry, delta: i64) -> Result<(Entry, i64)> {
        let current = self.get(e);
        let v = current.as_i64().ok_or(Error::TypeMismatch {
            expected: "signed",
            found: current.type_name(),
        })?;
        let updated = v.checked_add(delta).ok_or_else(|| {
            Error::CapacityExceeded(format!("{v} + {delta} overflows i64."))
        })?;
        let e = self.replace(e, &Databox::from(updated));
        Ok((e, updated))
    }

    /// Adds `delta` to the unsigned integer at `e`, returning the rewritten entry and the
    /// new value.
    ///
    /// # Errors
    ///
    /// An error is returned if the entry is not a `u64`-representable integer or the
    /// result leaves the range of `u64`.
    pub fn incrby_unsigned(&mut self, e: Entry, delta: i64) -> Result<(Entry, u64)> {
        let current = self.get(e);
        let v = current.as_u64().ok_or(Error::TypeMismatch {
            expected: "unsigned",
            found: current.type_name(),
        })?;
        let updated = v.checked_add_signed(delta).ok_or_else(|| {
            Error::CapacityExceeded(format!("{v} + {delta} leaves the range of u64."))
        })?;
        let e = self.replace(e, &Databox::from(updated));
        Ok((e, updated))
    }
}

#[cfg(test)]
mod tests {
    use crate::{Databox, Endpoint, Flex};

    fn flex_of(vals: &[Databox<'_>]) -> Flex {
        let mut f = Flex::new();
        for v in vals {
            f.push(v, Endpoint::Tail);
        }
        f
    }

    #[test]
    fn test_integer_folds() {
        let f = flex_of(&[Databox::from(10u64), Databox::from(-3i64), Databox::from(2u64)]);
        assert_eq!(f.add_signed().unwrap(), 9);
        assert_eq!(f.subtract_signed().unwrap(), 11);
        assert_eq!(f.multiply_signed().unwrap(), -60);
        assert_eq!(
            f.add_unsigned().err().map(|x| x.to_string()),
            Some("type mismatch: expected unsigned, but got signed.".to_string())
        );

        let f = flex_of(&[Databox::from(u64::MAX), Databox::from(2u64)]);
        assert_eq!(f.add_unsigned().unwrap(), 1);
        assert_eq!(f.subtract_unsigned().unwrap(), u64::MAX - 2);
        assert_eq!(Flex::new().multiply_unsigned().unwrap(), 0);
    }

    #[test]
    fn test_float_folds() {
        let f = flex_of(&[Databox::Float32(1.5), Databox::Float32(0.25)]);
        assert_eq!(f.add_float().unwrap(), 1.75);
        assert_eq!(f.subtract_float().unwrap(), 1.25);
        assert_eq!(f.multiply_float().unwrap(), 0.375);
        assert!(f.add_double().is_err());

        let f = flex_of(&[Databox::Double64(3.0), Databox::Double64(0.5)]);
        assert_eq!(f.multiply_double().unwrap(), 1.5);
        assert_eq!(f.subtract_double().unwrap(), 2.5);
        assert_eq!(
            flex_of(&[Databox::Double64(1.0), Databox::from("x")])
                .add_double()
                .err()
                .map(|x| x.to_string()),
            Some("type mismatch: expected double64, but got bytes.".to_string())
        );
    }

    #[test]
    fn test_incrby_unsigned() {
        let mut f = flex_of(&[Databox::from(200u64), Databox::from("tail")]);
        let e = f.head().unwrap();
        let (e, v) = f.incrby_unsigned(e, 70000).unwrap();
        assert_eq!(v, 70200);
        assert_eq!(f.next(e).map(|x| f.get(x)), Some(Databox::from("tail")));
        assert!(f.incrby_unsigned(e, -70201).is_err());
        let tail = f.tail().unwrap();
        assert_eq!(
            f.incrby_unsigned(tail, 1).err().map(|x| x.to_string()),
            Some("type mismatch: expected unsigned, but got bytes.".to_string())
        );
    }
}
