//! Tagged value through which every polymorphic element is read and written.
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

/// Tagged union of the values a packed list can hold.
///
/// Integers are normalized on construction through [`From`]: non-negative values become
/// [`Databox::Unsigned`] and negative values [`Databox::Signed`], and 128-bit integers that
/// fit in 64 bits are narrowed. Values read back from a packed list follow the same rule,
/// so a pushed value compares equal to the popped one.
///
/// # Examples
///
/// ```
/// use datakit::Databox;
///
/// assert_eq!(Databox::from(5i64), Databox::Unsigned(5));
/// assert_eq!(Databox::from(-5i64), Databox::Signed(-5));
/// assert_eq!(Databox::from("abc").as_bytes(), Some(&b"abc"[..]));
/// assert_eq!(Databox::from(2.5f64).as_f64(), Some(2.5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Databox<'a> {
    /// Placeholder carrying no value.
    Void,
    /// Signed 64-bit integer.
    Signed(i64),
    /// Unsigned 64-bit integer.
    Unsigned(u64),
    /// Signed 128-bit integer.
    Signed128(i128),
    /// Unsigned 128-bit integer.
    Unsigned128(u128),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Double64(f64),
    /// Boolean true.
    True,
    /// Boolean false.
    False,
    /// Null marker.
    Null,
    /// Byte string, borrowed from a buffer or owned.
    Bytes(Cow<'a, [u8]>),
    /// Key into an [`AtomTable`](crate::flex::AtomTable).
    Atom(u64),
}

enum Number {
    Int(i128),
    // Only for u128 values above i128::MAX.
    Huge(u128),
    Float(f64),
}

impl Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Huge(a), Self::Huge(b)) => a.cmp(b),
            (Self::Int(_), Self::Huge(_)) => Ordering::Less,
            (Self::Huge(_), Self::Int(_)) => Ordering::Greater,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::Float(a), b) => a.total_cmp(&b.to_f64()),
            (a, Self::Float(b)) => a.to_f64().total_cmp(b),
        }
    }

    fn to_f64(&self) -> f64 {
        match *self {
            Self::Int(v) => v as f64,
            Self::Huge(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

impl<'a> Databox<'a> {
    /// Returns a short name of the variant, used in error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Signed(_) => "signed",
            Self::Unsigned(_) => "unsigned",
            Self::Signed128(_) => "signed128",
            Self::Unsigned128(_) => "unsigned128",
            Self::Float32(_) => "float32",
            Self::Double64(_) => "double64",
            Self::True | Self::False => "bool",
            Self::Null => "null",
            Self::Bytes(_) => "bytes",
            Self::Atom(_) => "atom",
        }
    }

    /// Checks if the value is an integer or a float.
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Signed(_)
                | Self::Unsigned(_)
                | Self::Signed128(_)
                | Self::Unsigned128(_)
                | Self::Float32(_)
                | Self::Double64(_)
        )
    }

    /// Checks if the value is an integer.
    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Signed(_) | Self::Unsigned(_) | Self::Signed128(_) | Self::Unsigned128(_)
        )
    }

    /// Returns the value as `i64` if it is an integer in range.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Signed(v) => Some(v),
            Self::Unsigned(v) => i64::try_from(v).ok(),
            Self::Signed128(v) => i64::try_from(v).ok(),
            Self::Unsigned128(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Returns the value as `u64` if it is an integer in range.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::Signed(v) => u64::try_from(v).ok(),
            Self::Unsigned(v) => Some(v),
            Self::Signed128(v) => u64::try_from(v).ok(),
            Self::Unsigned128(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Returns the value as `i128` if it is an integer in range.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::Signed(v) => Some(v as i128),
            Self::Unsigned(v) => Some(v as i128),
            Self::Signed128(v) => Some(v),
            Self::Unsigned128(v) => i128::try_from(v).ok(),
            _ => None,
        }
    }

    /// Returns any numeric value converted to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        self.number().map(|n| n.to_f64())
    }

    /// Returns the bytes of a [`Databox::Bytes`] value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns `Some(true)` or `Some(false)` for boolean values.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::True => Some(true),
            Self::False => Some(false),
            _ => None,
        }
    }

    /// Detaches the value from any borrowed buffer.
    pub fn into_owned(self) -> Databox<'static> {
        match self {
            Self::Void => Databox::Void,
            Self::Signed(v) => Databox::Signed(v),
            Self::Unsigned(v) => Databox::Unsigned(v),
            Self::Signed128(v) => Databox::Signed128(v),
            Self::Unsigned128(v) => Databox::Unsigned128(v),
            Self::Float32(v) => Databox::Float32(v),
            Self::Double64(v) => Databox::Double64(v),
            Self::True => Databox::True,
            Self::False => Databox::False,
            Self::Null => Databox::Null,
            Self::Bytes(b) => Databox::Bytes(Cow::Owned(b.into_owned())),
            Self::Atom(k) => Databox::Atom(k),
        }
    }

    fn number(&self) -> Option<Number> {
        match *self {
            Self::Signed(v) => Some(Number::Int(v as i128)),
            Self::Unsigned(v) => Some(Number::Int(v as i128)),
            Self::Signed128(v) => Some(Number::Int(v)),
            Self::Unsigned128(v) => Some(
                i128::try_from(v).map_or(Number::Huge(v), Number::Int),
            ),
            Self::Float32(v) => Some(Number::Float(v as f64)),
            Self::Double64(v) => Some(Number::Float(v)),
            _ => None,
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Signed(_)
            | Self::Unsigned(_)
            | Self::Signed128(_)
            | Self::Unsigned128(_)
            | Self::Float32(_)
            | Self::Double64(_) => 0,
            Self::Bytes(_) => 1,
            Self::Atom(_) => 2,
            Self::False => 3,
            Self::True => 4,
            Self::Null => 5,
            Self::Void => 6,
        }
    }

    /// Compares two values under a total order.
    ///
    /// Numbers of every kind compare by value and sort before byte strings, which compare
    /// lexicographically. Atom keys, `false`, `true`, null and void follow in this order.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::cmp::Ordering;
    /// use datakit::Databox;
    ///
    /// assert_eq!(Databox::from(-1i64).compare(&Databox::from(0u64)), Ordering::Less);
    /// assert_eq!(Databox::from(2u64).compare(&Databox::from(1.5f64)), Ordering::Greater);
    /// assert_eq!(Databox::from(1u64).compare(&Databox::from("0")), Ordering::Less);
    /// ```
    pub fn compare(&self, other: &Databox<'_>) -> Ordering {
        match (self.number(), other.number()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => match (self, other) {
                (Self::Bytes(a), Databox::Bytes(b)) => a.as_ref().cmp(b.as_ref()),
                (Self::Atom(a), Databox::Atom(b)) => a.cmp(b),
                _ => self.rank().cmp(&other.rank()),
            },
        }
    }
}

impl fmt::Display for Databox<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Signed(v) => write!(f, "{v}"),
            Self::Unsigned(v) => write!(f, "{v}"),
            Self::Signed128(v) => write!(f, "{v}"),
            Self::Unsigned128(v) => write!(f, "{v}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Double64(v) => write!(f, "{v}"),
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Null => write!(f, "null"),
            Self::Bytes(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Self::Atom(k) => write!(f, "atom:{k}"),
        }
    }
}

macro_rules! from_signed {
    ($int:ty) => {
        impl From<$int> for Databox<'_> {
            fn from(v: $int) -> Self {
                if v < 0 {
                    Self::Signed(v as i64)
                } else {
                    Self::Unsigned(v as u64)
                }
            }
        }
    };
}

macro_rules! from_unsigned {
    ($int:ty) => {
        impl From<$int> for Databox<'_> {
            fn from(v: $int) -> Self {
                Self::Unsigned(v as u64)
            }
        }
    };
}

from_signed!(i8);
from_signed!(i16);
from_signed!(i32);
from_signed!(i64);
from_signed!(isize);
from_unsigned!(u8);
from_unsigned!(u16);
from_unsigned!(u32);
from_unsigned!(u64);
from_unsigned!(usize);

impl From<i128> for Databox<'_> {
    fn from(v: i128) -> Self {
        if let Ok(u) = u64::try_from(v) {
            Self::Unsigned(u)
        } else if let Ok(s) = i64::try_from(v) {
            Self::Signed(s)
        } else {
            Self::Signed128(v)
        }
    }
}

impl From<u128> for Databox<'_> {
    fn from(v: u128) -> Self {
        u64::try_from(v).map_or(Self::Unsigned128(v), Self::Unsigned)
    }
}

impl From<f32> for Databox<'_> {
    fn from(v: f32) -> Self {
        Self::Float32(v)
    }
}

impl From<f64> for Databox<'_> {
    fn from(v: f64) -> Self {
        Self::Double64(v)
    }
}

impl From<bool> for Databox<'_> {
    fn from(v: bool) -> Self {
        if v {
            Self::True
        } else {
            Self::False
        }
    }
}

impl<'a> From<&'a [u8]> for Databox<'a> {
    fn from(v: &'a [u8]) -> Self {
        Self::Bytes(Cow::Borrowed(v))
    }
}

impl<'a> From<&'a str> for Databox<'a> {
    fn from(v: &'a str) -> Self {
        Self::Bytes(Cow::Borrowed(v.as_bytes()))
    }
}

impl From<Vec<u8>> for Databox<'_> {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(Cow::Owned(v))
    }
}

impl From<String> for Databox<'_> {
    fn from(v: String) -> Self {
        Self::Bytes(Cow::Owned(v.into_bytes()))
    }
}
