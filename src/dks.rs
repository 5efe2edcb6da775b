//! Mutable byte string with a variable-width header.
//!
//! # Introduction
//!
//! A [`Dks`] keeps its length, its free space and its header category in one buffer laid
//! out as
//!
//! ```text
//! [len: w bytes][free << t | tag: w bytes][data: len bytes][free bytes][NUL]
//! ```
//!
//! where both header fields are big-endian integers of the same width `w`. The category
//! tag occupies the low `t` bits of the second field, so free space is limited to the
//! field maximum shifted right by `t`. Categories and their limits:
//!
//! | Category | `w` | `t` | Maximum length  | Maximum free space |
//! |----------|-----|-----|-----------------|--------------------|
//! | 8-bit    | 1   | 2   | 255             | 63                 |
//! | 16-bit   | 2   | 2   | 65535           | 16383              |
//! | 24-bit   | 3   | 3   | 2^24 - 1        | 2^21 - 1           |
//! | 32-bit   | 4   | 3   | 2^32 - 1        | 2^29 - 1           |
//! | 40-bit   | 5   | 3   | 2^40 - 1        | 2^37 - 1           |
//! | 48-bit   | 6   | 3   | 2^48 - 1        | 2^45 - 1           |
//!
//! A string is created in the smallest category that holds its length. Growth follows
//! the Fibonacci staircase rounded to allocator size classes, and widens the category in
//! place when the new size no longer fits. Free space beyond the limit of the current
//! category is released rather than recorded.
//!
//! The byte after the data is always zero, as is the last byte of the buffer.
//!
//! # Examples
//!
//! ```
//! use datakit::dks::{Category, Dks};
//!
//! let mut s = Dks::empty();
//! assert_eq!(s.category(), Category::Bits8);
//!
//! s.cat_len(&[b'x'; 300]);
//! assert_eq!(s.len(), 300);
//! assert_eq!(s.category(), Category::Bits16);
//! assert!(s.as_bytes().iter().all(|&b| b == b'x'));
//!
//! s.range(0, 4);
//! s.cat("yz");
//! assert_eq!(s.as_bytes(), b"xxxxxyz");
//! assert_eq!(s.alloc_size(), s.header_len() + s.len() + s.avail() + 1);
//! ```
pub mod fmt;

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};

use anyhow::anyhow;
use tracing::debug;

use crate::error::{Error, Result};
use crate::growth::{fibbuf, jebuf};
use crate::varint::external;
use crate::serial::{self, Serializable};

pub use fmt::FmtArg;

/// Header width category of a [`Dks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    /// 1-byte fields with 2 tag bits.
    Bits8,
    /// 2-byte fields with 2 tag bits.
    Bits16,
    /// 3-byte fields with 3 tag bits.
    Bits24,
    /// 4-byte fields with 3 tag bits.
    Bits32,
    /// 5-byte fields with 3 tag bits.
    Bits40,
    /// 6-byte fields with 3 tag bits.
    Bits48,
}

impl Category {
    const ALL: [Self; 6] = [
        Self::Bits8,
        Self::Bits16,
        Self::Bits24,
        Self::Bits32,
        Self::Bits40,
        Self::Bits48,
    ];

    /// Gets the width of one header field in bytes.
    #[inline(always)]
    pub const fn width(self) -> usize {
        match self {
            Self::Bits8 => 1,
            Self::Bits16 => 2,
            Self::Bits24 => 3,
            Self::Bits32 => 4,
            Self::Bits40 => 5,
            Self::Bits48 => 6,
        }
    }

    /// Gets the width of both header fields in bytes.
    #[inline(always)]
    pub const fn header_len(self) -> usize {
        2 * self.width()
    }

    /// Gets the tag stored in the low bits of the free-space field.
    ///
    /// Tags of 2-bit categories end in a zero bit and tags of 3-bit categories in a one
    /// bit, so the tag can be recognized from the last header byte alone.
    #[inline(always)]
    pub const fn tag(self) -> u8 {
        match self {
            Self::Bits8 => 0x00,
            Self::Bits16 => 0x02,
            Self::Bits24 => 0x01,
            Self::Bits32 => 0x03,
            Self::Bits40 => 0x05,
            Self::Bits48 => 0x07,
        }
    }

    /// Gets the number of bits the tag occupies.
    #[inline(always)]
    pub const fn tag_bits(self) -> u32 {
        match self {
            Self::Bits8 | Self::Bits16 => 2,
            _ => 3,
        }
    }

    /// Returns the category with `tag`, read from the last byte of a header.
    pub fn from_tag(byte: u8) -> Option<Self> {
        let tag = if byte & 1 == 0 { byte & 0x03 } else { byte & 0x07 };
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }

    /// Gets the largest length the category records.
    #[inline(always)]
    pub const fn max_len(self) -> usize {
        (1 << (8 * self.width())) - 1
    }

    /// Gets the largest free space the category records.
    #[inline(always)]
    pub const fn max_free(self) -> usize {
        self.max_len() >> self.tag_bits()
    }

    /// Returns the smallest category holding `len` bytes of data and `free` bytes of free
    /// space.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::dks::Category;
    ///
    /// assert_eq!(Category::select(255, 63), Category::Bits8);
    /// assert_eq!(Category::select(255, 64), Category::Bits16);
    /// assert_eq!(Category::select(65536, 0), Category::Bits24);
    /// ```
    pub fn select(len: usize, free: usize) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| len <= c.max_len() && free <= c.max_free())
            .unwrap_or(Self::Bits48)
    }
}

/// Compact mutable byte string.
#[derive(Clone)]
pub struct Dks {
    buf: Vec<u8>,
    category: Category,
}

impl Dks {
    /// Creates a string holding a copy of `init`, without free space.
    pub fn new(init: &[u8]) -> Self {
        let category = Category::select(init.len(), 0);
        let header = category.header_len();
        let mut buf = Vec::with_capacity(jebuf::size_allocation(header + init.len() + 1));
        buf.resize(header, 0);
        buf.extend_from_slice(init);
        buf.push(0);
        let mut s = Self { buf, category };
        s.store(init.len(), 0);
        s
    }

    /// Creates an empty string.
    pub fn empty() -> Self {
        Self::new(&[])
    }

    /// Creates a string of `len` zero bytes.
    pub fn with_len(len: usize) -> Self {
        let mut s = Self::empty();
        s.grow_zero(len);
        s
    }

    /// Creates the decimal representation of `value`.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::Dks;
    ///
    /// assert_eq!(Dks::from_i64(-9001).as_bytes(), b"-9001");
    /// ```
    pub fn from_i64(value: i64) -> Self {
        Self::new(value.to_string().as_bytes())
    }

    /// Gets the header category.
    #[inline(always)]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Gets the header size in bytes.
    #[inline(always)]
    pub const fn header_len(&self) -> usize {
        self.category.header_len()
    }

    /// Gets the length of the data in bytes.
    #[inline(always)]
    pub fn len(&self) -> usize {
        let w = self.category.width();
        external::get_quick(&self.buf, w) as usize
    }

    /// Checks if the data is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the free space after the data in bytes.
    #[inline(always)]
    pub fn avail(&self) -> usize {
        let w = self.category.width();
        (external::get_quick(&self.buf[w..], w) >> self.category.tag_bits()) as usize
    }

    /// Gets the size of the data plus the free space.
    pub fn buf_alloc_size(&self) -> usize {
        self.len() + self.avail()
    }

    /// Gets the size of the whole buffer: header, data, free space and terminator.
    pub fn alloc_size(&self) -> usize {
        self.buf.len()
    }

    /// Gets the data.
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        let h = self.header_len();
        &self.buf[h..h + self.len()]
    }

    /// Gets the data followed by its zero terminator.
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        let h = self.header_len();
        &self.buf[h..=h + self.len()]
    }

    /// Gets the data mutably.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        let h = self.header_len();
        let len = self.len();
        &mut self.buf[h..h + len]
    }

    /// Gets the free space mutably, to be claimed with [`Dks::incr_len()`] or
    /// [`Dks::update_len()`] after writing.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        let h = self.header_len();
        let len = self.len();
        let free = self.avail();
        &mut self.buf[h + len..h + len + free]
    }

    /// Gets the whole buffer including the header.
    pub fn as_raw(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the string and returns its data.
    pub fn into_vec(self) -> Vec<u8> {
        let h = self.header_len();
        let len = self.len();
        let mut buf = self.buf;
        buf.truncate(h + len);
        buf.drain(..h);
        buf
    }

    /// Writes both header fields and the terminators.
    ///
    /// Free space beyond the limit of the category is cut from the buffer.
    fn store(&mut self, len: usize, free: usize) {
        let c = self.category;
        let free = if free > c.max_free() {
            self.buf.truncate(c.header_len() + len + c.max_free() + 1);
            c.max_free()
        } else {
            free
        };
        debug_assert_eq!(self.buf.len(), c.header_len() + len + free + 1);
        let w = c.width();
        external::put_quick(&mut self.buf, w, len as u64);
        let shared = ((free as u64) << c.tag_bits()) | c.tag() as u64;
        external::put_quick(&mut self.buf[w..], w, shared);
        self.buf[c.header_len() + len] = 0;
        if let Some(last) = self.buf.last_mut() {
            *last = 0;
        }
    }

    /// Resizes the data area to `data_alloc` bytes, widening the category as needed and
    /// rounding up to the allocator size class.
    fn reallocate(&mut self, data_alloc: usize) {
        let len = self.len();
        let old = self.category;
        let mut data_alloc = data_alloc.max(len);
        let mut category = old;
        let total = loop {
            let target = Category::select(data_alloc, data_alloc - len);
            if target > category {
                category = target;
            }
            let header = category.header_len();
            let total = header + data_alloc + 1;
            let rounded = jebuf::size_allocation(total);
            if rounded > total {
                data_alloc = rounded - header - 1;
                continue;
            }
            break total;
        };

        if total > self.buf.len() {
            self.buf.reserve_exact(total - self.buf.len());
        }
        if category != old {
            debug!(from = ?old, to = ?category, len, "dks header widened");
            let shift = category.header_len() - old.header_len();
            self.buf.resize(self.buf.len() + shift, 0);
            let h = old.header_len();
            self.buf.copy_within(h..h + len + 1, h + shift);
            self.category = category;
        }
        self.buf.resize(total, 0);
        self.store(len, data_alloc - len);
    }

    /// Ensures at least `addlen` bytes of free space, growing along the Fibonacci
    /// staircase.
    ///
    /// The length is unchanged.
    pub fn expand_by(&mut self, addlen: usize) {
        if self.avail() >= addlen {
            return;
        }
        self.reallocate(fibbuf::next_size(self.len() + addlen));
    }

    /// Ensures at least `addlen` bytes of free space, rounded only to the allocator size
    /// class.
    pub fn expand_by_exact(&mut self, addlen: usize) {
        if self.avail() >= addlen {
            return;
        }
        self.reallocate(self.len() + addlen);
    }

    /// Releases all free space, keeping the category.
    pub fn remove_free_space(&mut self) {
        let len = self.len();
        self.buf.truncate(self.header_len() + len + 1);
        self.buf.shrink_to_fit();
        self.store(len, 0);
    }

    /// Moves `incr` bytes between the data and the free space, claiming bytes written
    /// through [`Dks::spare_mut()`] if positive and trimming the tail if negative.
    ///
    /// # Errors
    ///
    /// An error is returned if `incr` exceeds the free space or `-incr` the length.
    pub fn incr_len(&mut self, incr: isize) -> Result<()> {
        let len = self.len();
        let free = self.avail();
        let ok = if incr >= 0 {
            incr as usize <= free
        } else {
            incr.unsigned_abs() <= len
        };
        if !ok {
            return Err(Error::CapacityExceeded(format!(
                "incr must be in -{len}..={free}, but got {incr}."
            )));
        }
        let new_len = len.wrapping_add_signed(incr);
        self.store(new_len, len + free - new_len);
        Ok(())
    }

    /// Sets the length to the position of the first zero byte of the buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::Dks;
    ///
    /// let mut s = Dks::new(b"abc");
    /// s.expand_by(10);
    /// s.spare_mut()[..2].copy_from_slice(b"de");
    /// s.update_len();
    /// assert_eq!(s.as_bytes(), b"abcde");
    ///
    /// s.as_mut_bytes()[1] = 0;
    /// s.update_len();
    /// assert_eq!(s.as_bytes(), b"a");
    /// ```
    pub fn update_len(&mut self) {
        let h = self.header_len();
        let total = self.len() + self.avail();
        let new_len = self.buf[h..]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(total)
            .min(total);
        self.store(new_len, total - new_len);
    }

    /// Empties the data and turns it into free space.
    pub fn clear(&mut self) {
        let total = self.len() + self.avail();
        self.store(0, total);
    }

    /// Appends `t`.
    ///
    /// # Complexity
    ///
    /// Amortized linear in `t.len()`
    pub fn cat_len(&mut self, t: &[u8]) {
        self.expand_by(t.len());
        let h = self.header_len();
        let len = self.len();
        let free = self.avail();
        self.buf[h + len..h + len + t.len()].copy_from_slice(t);
        self.store(len + t.len(), free - t.len());
    }

    /// Appends the UTF-8 bytes of `t`.
    pub fn cat(&mut self, t: &str) {
        self.cat_len(t.as_bytes());
    }

    /// Appends the data of `t`.
    pub fn cat_dks(&mut self, t: &Dks) {
        self.cat_len(t.as_bytes());
    }

    /// Inserts `t` before the data.
    pub fn prepend_len(&mut self, t: &[u8]) {
        self.expand_by(t.len());
        let h = self.header_len();
        let len = self.len();
        let free = self.avail();
        self.buf.copy_within(h..h + len, h + t.len());
        self.buf[h..h + t.len()].copy_from_slice(t);
        self.store(len + t.len(), free - t.len());
    }

    /// Replaces the data with `t`.
    pub fn copy(&mut self, t: &[u8]) {
        let len = self.len();
        if self.avail() + len < t.len() {
            self.expand_by(t.len() - len);
        }
        let total = self.len() + self.avail();
        let h = self.header_len();
        self.buf[h..h + t.len()].copy_from_slice(t);
        self.store(t.len(), total - t.len());
    }

    /// Extends the data with zero bytes up to `len`; shorter lengths are ignored.
    pub fn grow_zero(&mut self, len: usize) {
        let cur = self.len();
        if len <= cur {
            return;
        }
        self.expand_by(len - cur);
        let h = self.header_len();
        self.buf[h + cur..h + len].fill(0);
        let total = self.len() + self.avail();
        self.store(len, total - len);
    }

    /// Keeps `data[start..start + len]`, moving it to the front.
    fn keep(&mut self, start: usize, len: usize) {
        let h = self.header_len();
        let total = self.len() + self.avail();
        if start > 0 && len > 0 {
            self.buf.copy_within(h + start..h + start + len, h);
        }
        self.store(len, total - len);
    }

    /// Removes the leading and trailing bytes found in `cset`.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::Dks;
    ///
    /// let mut s = Dks::new(b"AA...AA.a.aa.aHelloWorld     :::");
    /// s.trim(b"Aa. :");
    /// assert_eq!(s.as_bytes(), b"HelloWorld");
    /// ```
    pub fn trim(&mut self, cset: &[u8]) {
        let data = self.as_bytes();
        let start = data.iter().position(|b| !cset.contains(b));
        let (start, len) = match start {
            Some(start) => {
                let end = data.iter().rposition(|b| !cset.contains(b)).unwrap_or(start);
                (start, end + 1 - start)
            }
            None => (0, 0),
        };
        self.keep(start, len);
    }

    /// Keeps the inclusive byte range `start..=end`, where negative positions count
    /// from the end.
    ///
    /// Positions are clamped to the data; an empty range empties the string.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::Dks;
    ///
    /// let mut s = Dks::new(b"Hello World");
    /// s.range(1, -1);
    /// assert_eq!(s.as_bytes(), b"ello World");
    /// s.range(-5, 100);
    /// assert_eq!(s.as_bytes(), b"World");
    /// s.range(3, 1);
    /// assert!(s.is_empty());
    /// ```
    pub fn range(&mut self, start: isize, end: isize) {
        let len = self.len();
        if len == 0 {
            return;
        }
        let resolve = |i: isize| {
            if i < 0 {
                len.saturating_sub(i.unsigned_abs())
            } else {
                i as usize
            }
        };
        let start = resolve(start);
        let end = resolve(end).min(len - 1);
        if start > end || start >= len {
            self.keep(0, 0);
        } else {
            self.keep(start, end - start + 1);
        }
    }

    /// Keeps `length` bytes from `start`, truncated at the end; a start past the end is
    /// ignored.
    pub fn substr(&mut self, start: usize, length: usize) {
        let len = self.len();
        if start > len {
            return;
        }
        self.keep(start, length.min(len - start));
    }

    /// Keeps `length` UTF-8 characters from character `start`.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::Dks;
    ///
    /// let mut s = Dks::new("añb€c".as_bytes());
    /// s.substr_utf8(1, 3);
    /// assert_eq!(s.as_bytes(), "ñb€".as_bytes());
    /// assert_eq!(s.len_utf8(), 3);
    /// ```
    pub fn substr_utf8(&mut self, start: usize, length: usize) {
        let data = self.as_bytes();
        if start > data.len() {
            return;
        }
        let offset = utf8_offset(data, start);
        if offset > data.len() {
            return;
        }
        let extent = utf8_offset(&data[offset..], length);
        self.keep(offset, extent);
    }

    /// Counts the UTF-8 characters of the data.
    pub fn len_utf8(&self) -> usize {
        self.as_bytes().iter().filter(|&&b| b & 0xc0 != 0x80).count()
    }

    /// Lowercases ASCII letters in place.
    pub fn to_lower(&mut self) {
        self.as_mut_bytes().make_ascii_lowercase();
    }

    /// Uppercases ASCII letters in place.
    pub fn to_upper(&mut self) {
        self.as_mut_bytes().make_ascii_uppercase();
    }

    /// Replaces every byte found in `from` with the byte at the same position of `to`.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::Dks;
    ///
    /// let mut s = Dks::new(b"hello");
    /// s.map_chars(b"ho", b"01");
    /// assert_eq!(s.as_bytes(), b"0ell1");
    /// ```
    pub fn map_chars(&mut self, from: &[u8], to: &[u8]) {
        for b in self.as_mut_bytes() {
            if let Some(i) = from.iter().zip(to).position(|(&f, _)| f == *b) {
                *b = to[i];
            }
        }
    }

    /// Splits `s` at every occurrence of `sep`.
    ///
    /// A trailing separator yields no empty token; empty input or an empty separator
    /// yields no tokens.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::Dks;
    ///
    /// let tokens = Dks::split_len(b"foo_-_bar_-_", b"_-_");
    /// assert_eq!(tokens, vec![Dks::new(b"foo"), Dks::new(b"bar")]);
    /// ```
    pub fn split_len(s: &[u8], sep: &[u8]) -> Vec<Dks> {
        Self::split_len_max(s, sep, 0)
    }

    /// Splits `s` at every occurrence of `sep` into at most `max` tokens, or without
    /// limit if `max` is 0.
    ///
    /// Input after the last returned token is dropped.
    pub fn split_len_max(s: &[u8], sep: &[u8], max: usize) -> Vec<Dks> {
        let mut tokens = vec![];
        if s.is_empty() || sep.is_empty() {
            return tokens;
        }
        let mut start = 0;
        let mut j = 0;
        while j + sep.len() <= s.len() {
            if max != 0 && tokens.len() == max {
                return tokens;
            }
            if &s[j..j + sep.len()] == sep {
                tokens.push(Dks::new(&s[start..j]));
                start = j + sep.len();
                j = start;
            } else {
                j += 1;
            }
        }
        if (max == 0 || tokens.len() < max) && start < s.len() {
            tokens.push(Dks::new(&s[start..]));
        }
        tokens
    }

    /// Joins `items` with `sep` between consecutive items.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::Dks;
    ///
    /// let s = Dks::join(["a", "b", "c"], b", ");
    /// assert_eq!(s.as_bytes(), b"a, b, c");
    /// ```
    pub fn join<I, T>(items: I, sep: &[u8]) -> Dks
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut s = Dks::empty();
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                s.cat_len(sep);
            }
            s.cat_len(item.as_ref());
        }
        s
    }
}

/// Returns the byte offset after `chars` characters of `bytes`, judged by lead bytes.
fn utf8_offset(bytes: &[u8], chars: usize) -> usize {
    let mut offset = 0;
    for _ in 0..chars {
        let Some(&lead) = bytes.get(offset) else {
            break;
        };
        offset += match lead {
            0xf0..=0xff => 4,
            0xe0..=0xef => 3,
            0xc0..=0xdf => 2,
            _ => 1,
        };
    }
    offset.min(bytes.len())
}

impl Default for Dks {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Dks {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Dks {}

impl PartialOrd for Dks {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Dks {
    /// Compares the data bytewise; a proper prefix orders first.
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl Hash for Dks {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl AsRef<[u8]> for Dks {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<&[u8]> for Dks {
    fn from(init: &[u8]) -> Self {
        Self::new(init)
    }
}

impl From<&str> for Dks {
    fn from(init: &str) -> Self {
        Self::new(init.as_bytes())
    }
}

impl std::fmt::Debug for Dks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dks")
            .field("category", &self.category)
            .field("len", &self.len())
            .field("avail", &self.avail())
            .field("data", &String::from_utf8_lossy(self.as_bytes()))
            .finish()
    }
}

impl Serializable for Dks {
    fn serialize_into<W: Write>(&self, mut writer: W) -> anyhow::Result<usize> {
        let mut mem = self.category.tag().serialize_into(&mut writer)?;
        mem += serial::serialize_bytes(&self.buf, &mut writer)?;
        Ok(mem)
    }

    fn deserialize_from<R: Read>(mut reader: R) -> anyhow::Result<Self> {
        let tag = u8::deserialize_from(&mut reader)?;
        let buf = serial::deserialize_bytes(&mut reader)?;
        let category = Category::from_tag(tag)
            .filter(|c| c.tag() == tag)
            .ok_or_else(|| anyhow!("tag must be a category tag, but got {tag}."))?;
        let w = category.width();
        let h = category.header_len();
        if buf.len() <= h || Category::from_tag(buf[h - 1]) != Some(category) {
            return Err(anyhow!("header must carry tag {tag}."));
        }
        let len = external::get_quick(&buf, w) as usize;
        let free = (external::get_quick(&buf[w..], w) >> category.tag_bits()) as usize;
        if h + len + free + 1 != buf.len() || buf[h + len] != 0 || buf[buf.len() - 1] != 0 {
            return Err(anyhow!(
                "buffer of {} bytes must hold len={len} and free={free}.",
                buf.len()
            ));
        }
        Ok(Self { buf, category })
    }

    fn size_in_bytes(&self) -> usize {
        u8::size_of().unwrap_or(1) + serial::bytes_size(self.buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    fn check(s: &Dks) {
        let h = s.header_len();
        assert_eq!(s.alloc_size(), h + s.len() + s.avail() + 1);
        assert_eq!(s.as_raw()[h + s.len()], 0);
        assert_eq!(s.as_raw().last(), Some(&0));
        assert!(s.len() <= s.category().max_len());
        assert!(s.avail() <= s.category().max_free());
        assert_eq!(Category::from_tag(s.as_raw()[h - 1]), Some(s.category()));
    }

    #[test]
    fn test_limits() {
        assert_eq!(Category::Bits8.max_free(), 63);
        assert_eq!(Category::Bits16.max_free(), 16383);
        assert_eq!(Category::Bits24.max_free(), (1 << 21) - 1);
        assert_eq!(Category::Bits48.max_len(), (1 << 48) - 1);
        for c in Category::ALL {
            assert_eq!(Category::from_tag(c.tag()), Some(c));
        }
    }

    #[test]
    fn test_grow_across_categories() {
        let mut s = Dks::empty();
        assert_eq!(s.category(), Category::Bits8);
        assert_eq!(s.alloc_size(), 3);
        let payload: Vec<u8> = (0..300).map(|i| (i % 251) as u8 + 1).collect();
        s.cat_len(&payload);
        check(&s);
        assert_eq!(s.category(), Category::Bits16);
        assert_eq!(s.as_bytes(), &payload[..]);
        assert_eq!(s.alloc_size(), 384);
        assert_eq!(s.avail(), 79);
    }

    #[test]
    fn test_random_against_vec() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        let mut s = Dks::empty();
        let mut model: Vec<u8> = vec![];
        for _ in 0..2000 {
            let chunk: Vec<u8> = (0..rng.gen_range(0..200)).map(|_| rng.gen_range(1..=255)).collect();
            match rng.gen_range(0..6) {
                0 | 1 => {
                    s.cat_len(&chunk);
                    model.extend_from_slice(&chunk);
                }
                2 => {
                    s.prepend_len(&chunk);
                    model = [chunk, model].concat();
                }
                3 if !model.is_empty() => {
                    let start = rng.gen_range(0..model.len());
                    let length = rng.gen_range(0..=model.len());
                    s.substr(start, length);
                    let end = (start + length).min(model.len());
                    model = model[start..end].to_vec();
                }
                4 => {
                    s.copy(&chunk);
                    model = chunk;
                }
                _ => {
                    s.clear();
                    model.clear();
                }
            }
            check(&s);
            assert_eq!(s.as_bytes(), &model[..]);
        }
    }

    #[test]
    fn test_shrinking_releases_excess_free() {
        let mut s = Dks::new(&[b'a'; 200]);
        assert_eq!(s.category(), Category::Bits8);
        assert_eq!(s.avail(), 0);
        s.range(0, 9);
        check(&s);
        assert_eq!(s.len(), 10);
        assert_eq!(s.avail(), 63);
        s.clear();
        check(&s);
        assert_eq!(s.avail(), 63);
        s.remove_free_space();
        check(&s);
        assert_eq!((s.len(), s.avail(), s.alloc_size()), (0, 0, 3));
    }

    #[test]
    fn test_incr_len() {
        let mut s = Dks::new(b"abc");
        s.expand_by_exact(4);
        let free = s.avail();
        assert!(free >= 4);
        s.spare_mut()[..4].copy_from_slice(b"defg");
        s.incr_len(4).unwrap();
        assert_eq!(s.as_bytes(), b"abcdefg");
        s.incr_len(-2).unwrap();
        assert_eq!(s.as_bytes(), b"abcde");
        check(&s);
        assert_eq!(
            s.incr_len(-6).err().map(|x| x.to_string()),
            Some(format!(
                "capacity exceeded: incr must be in -5..={}, but got -6.",
                s.avail()
            ))
        );
    }

    #[test]
    fn test_grow_zero_and_with_len() {
        let mut s = Dks::new(b"ab");
        s.grow_zero(5);
        assert_eq!(s.as_bytes(), b"ab\0\0\0");
        s.grow_zero(1);
        assert_eq!(s.len(), 5);
        let z = Dks::with_len(70000);
        check(&z);
        assert_eq!(z.category(), Category::Bits24);
        assert!(z.as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_split_edges() {
        assert_eq!(
            Dks::split_len(b",a,,b", b","),
            vec![Dks::new(b""), Dks::new(b"a"), Dks::new(b""), Dks::new(b"b")]
        );
        assert_eq!(Dks::split_len(b"ab", b"abc"), vec![Dks::new(b"ab")]);
        assert!(Dks::split_len(b"", b",").is_empty());
        assert!(Dks::split_len(b"a", b"").is_empty());
        assert_eq!(
            Dks::split_len_max(b"a,b,c", b",", 2),
            vec![Dks::new(b"a"), Dks::new(b"b")]
        );
    }

    #[test]
    fn test_order_and_case() {
        let mut a = Dks::new(b"Hello");
        let b = Dks::new(b"hello world");
        assert!(a < b);
        a.to_lower();
        assert!(a < b);
        assert_eq!(a.cmp(&Dks::new(b"hello")), Ordering::Equal);
        a.to_upper();
        assert_eq!(a.as_bytes(), b"HELLO");
        let mut c = a.clone();
        c.cat_dks(&a);
        assert_eq!(c.as_bytes(), b"HELLOHELLO");
        assert_eq!(a.into_vec(), b"HELLO".to_vec());
    }

    #[test]
    fn test_serialize() {
        let mut s = Dks::from_i64(42);
        s.cat_len(&[b'z'; 500]);
        let mut bytes = vec![];
        let size = s.serialize_into(&mut bytes).unwrap();
        let other = Dks::deserialize_from(&bytes[..]).unwrap();
        assert_eq!(s, other);
        assert_eq!(other.category(), Category::Bits16);
        assert_eq!(size, bytes.len());
        assert_eq!(size, s.size_in_bytes());

        bytes[0] = 0x04;
        assert!(Dks::deserialize_from(&bytes[..]).is_err());
    }
}
