//! Packed polymorphic list stored in a single byte buffer.
//!
//! # Introduction
//!
//! A [`Flex`] is a self-describing sequence of [`Databox`] values. The buffer starts with a
//! header of two tagged varints, the total number of bytes and the number of entries,
//! followed by the entries themselves:
//!
//! ```text
//! [total bytes][count][prefix|payload|trailer][prefix|payload|trailer]...
//! ```
//!
//! Every entry ends with a byte-reversed trailer recording its own size, so both
//! [`Flex::next()`] and [`Flex::prev()`] run in constant time. Integers are stored in their
//! narrowest form, and float values that are exactly representable as IEEE half floats
//! take two bytes.
//!
//! Positions inside a list are [`Entry`] cursors. A mutation may move every byte of the
//! buffer, so cursors obtained before a mutation are stale afterwards; mutating methods
//! return the cursors that remain meaningful.
//!
//! # Examples
//!
//! ```
//! use datakit::{Databox, Endpoint, Flex};
//!
//! let mut f = Flex::new();
//! f.push(&Databox::from("aa"), Endpoint::Tail);
//! f.push(&Databox::from(1u64), Endpoint::Tail);
//! f.push(&Databox::from(-7i64), Endpoint::Head);
//!
//! assert_eq!(f.len(), 3);
//! assert_eq!(f.get_index(0), Some(Databox::from(-7i64)));
//! assert_eq!(f.get_index(-1), Some(Databox::from(1u64)));
//!
//! assert_eq!(f.pop(Endpoint::Tail), Some(Databox::from(1u64)));
//! assert_eq!(f.len(), 2);
//! ```
pub mod atom;
pub mod capacity;
mod entry;
mod fold;
mod sorted;

pub use atom::AtomTable;

use std::fmt;
use std::io::{Read, Write};
use std::ops::Range;

use crate::databox::Databox;
use crate::error::{Error, Result};
use crate::growth;
use crate::varint::{prelude::*, Tagged};
use crate::serial::{self, Serializable};

/// Cursor to an entry of a [`Flex`], i.e., the byte offset of its prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entry(usize);

impl Entry {
    /// Returns the byte offset of the entry from the start of the buffer.
    #[inline(always)]
    pub const fn offset(self) -> usize {
        self.0
    }
}

/// End of a sequence that pushes and pops apply to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// The first element.
    Head,
    /// The last element.
    Tail,
}

/// Packed polymorphic list.
///
/// See the [module documentation](self) for the layout.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Flex {
    buf: Vec<u8>,
}

impl Default for Flex {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the header for `entries_len` bytes of entries and `count` entries.
fn encode_header(entries_len: usize, count: usize) -> Vec<u8> {
    let count_len = Tagged::encoded_len(count as u64);
    let mut total_len = Tagged::encoded_len((entries_len + count_len + 1) as u64);
    loop {
        let next = Tagged::encoded_len((entries_len + count_len + total_len) as u64);
        if next == total_len {
            break;
        }
        total_len = next;
    }
    let mut header = Vec::with_capacity(total_len + count_len);
    Tagged::encode_append((entries_len + count_len + total_len) as u64, &mut header);
    Tagged::encode_append(count as u64, &mut header);
    header
}

impl Flex {
    /// Creates a new empty list of [`capacity::EMPTY_BYTES`] bytes.
    pub fn new() -> Self {
        Self {
            buf: encode_header(0, 0),
        }
    }

    /// Creates a list from its raw bytes, checking every entry.
    ///
    /// # Errors
    ///
    /// An error is returned if the header disagrees with the buffer or any entry is
    /// malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use datakit::{Databox, Endpoint, Flex};
    ///
    /// let mut f = Flex::new();
    /// f.push(&Databox::from("abc"), Endpoint::Tail);
    /// let other = Flex::from_bytes(f.as_bytes().to_vec())?;
    /// assert_eq!(f, other);
    ///
    /// assert!(Flex::from_bytes(vec![3, 0]).is_err());
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self> {
        let (total, w0) = Tagged::decode(&buf)?;
        let (count, w1) = Tagged::decode(&buf[w0..])?;
        if total as usize != buf.len() {
            return Err(Error::InvalidEncoding(format!(
                "header records {total} bytes, but the buffer has {}.",
                buf.len()
            )));
        }
        let mut off = w0 + w1;
        let mut found = 0;
        while off < buf.len() {
            let size = entry::size_at(&buf, off)?;
            entry::check_trailer(&buf, off, size)?;
            entry::decode(&buf, off)?;
            off += size;
            found += 1;
        }
        if found != count {
            return Err(Error::InvalidEncoding(format!(
                "header records {count} entries, but {found} were found."
            )));
        }
        Ok(Self { buf })
    }

    /// Wraps bytes produced by [`Flex::as_bytes()`] without re-checking the entries.
    pub(crate) fn from_trusted_bytes(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    /// Builds a list from concatenated entry bytes.
    fn from_entries(entries: &[u8], count: usize) -> Self {
        let mut buf = encode_header(entries.len(), count);
        buf.reserve_exact(entries.len());
        buf.extend_from_slice(entries);
        Self { buf }
    }

    /// Returns the raw bytes, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the list, returning its raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    #[inline(always)]
    fn header_widths(&self) -> (usize, usize) {
        let w0 = Tagged::width_from_first_byte(self.buf[0]);
        let w1 = Tagged::width_from_first_byte(self.buf[w0]);
        (w0, w1)
    }

    /// Returns the number of header bytes.
    #[inline(always)]
    pub fn header_len(&self) -> usize {
        let (w0, w1) = self.header_widths();
        w0 + w1
    }

    /// Returns the number of bytes `val` takes once stored, trailer included.
    pub fn stored_size(val: &Databox<'_>) -> usize {
        entry::encoded_size(val)
    }

    /// Gets the number of entries.
    ///
    /// # Complexity
    ///
    /// Constant
    #[inline(always)]
    pub fn len(&self) -> usize {
        let (w0, _) = self.header_widths();
        Tagged::decode(&self.buf[w0..]).map_or(0, |(c, _)| c as usize)
    }

    /// Checks if the list is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the total number of bytes, header included.
    #[inline(always)]
    pub fn bytes(&self) -> usize {
        self.buf.len()
    }

    fn entries(&self) -> &[u8] {
        &self.buf[self.header_len()..]
    }

    /// Rewrites the header for `count` entries, returning the new header length.
    fn write_header(&mut self, count: usize) -> usize {
        let old = self.header_len();
        let header = encode_header(self.buf.len() - old, count);
        let new = header.len();
        if new == old {
            self.buf[..new].copy_from_slice(&header);
        } else {
            self.buf.splice(0..old, header);
        }
        new
    }

    /// Replaces the bytes in `range` by `replacement` and sets the count,
    /// returning the new absolute offset of `range.start`.
    fn splice(&mut self, range: Range<usize>, replacement: &[u8], count: usize) -> usize {
        let rel = range.start - self.header_len();
        growth::reserve(
            &mut self.buf,
            replacement.len().saturating_sub(range.end - range.start),
        );
        self.buf.splice(range, replacement.iter().copied());
        self.write_header(count) + rel
    }

    /// Returns the size of the entry at `e`, or the rest of the buffer if it is malformed.
    #[inline(always)]
    fn size(&self, e: Entry) -> usize {
        entry::size_at(&self.buf, e.0).unwrap_or(self.buf.len() - e.0)
    }

    /// Returns the number of bytes of the entry at `e`, trailer included.
    pub fn entry_size(&self, e: Entry) -> usize {
        self.size(e)
    }

    /// Returns the first entry, or [`None`] if empty.
    #[inline(always)]
    pub fn head(&self) -> Option<Entry> {
        let hl = self.header_len();
        (hl < self.buf.len()).then_some(Entry(hl))
    }

    /// Returns the last entry, or [`None`] if empty.
    #[inline(always)]
    pub fn tail(&self) -> Option<Entry> {
        self.prev_of(self.buf.len())
    }

    /// Returns the entry following `e`, or [`None`] if `e` is the last.
    #[inline(always)]
    pub fn next(&self, e: Entry) -> Option<Entry> {
        let next = e.0 + self.size(e);
        (next < self.buf.len()).then_some(Entry(next))
    }

    /// Returns the entry preceding `e`, or [`None`] if `e` is the first.
    #[inline(always)]
    pub fn prev(&self, e: Entry) -> Option<Entry> {
        self.prev_of(e.0)
    }

    fn prev_of(&self, off: usize) -> Option<Entry> {
        if off <= self.header_len() {
            return None;
        }
        let (size, _) = crate::varint::tagged::decode_reversed(&self.buf, off).ok()?;
        off.checked_sub(size as usize).map(Entry)
    }

    /// Returns the `index`-th entry, counting from the tail if `index` is negative.
    ///
    /// The walk starts from whichever end is nearer.
    ///
    /// # Complexity
    ///
    /// Linear
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::{Databox, Endpoint, Flex};
    ///
    /// let mut f = Flex::new();
    /// for i in 0..5u64 {
    ///     f.push(&Databox::from(i), Endpoint::Tail);
    /// }
    /// assert_eq!(f.index(1).map(|e| f.get(e)), Some(Databox::from(1u64)));
    /// assert_eq!(f.index(-2).map(|e| f.get(e)), Some(Databox::from(3u64)));
    /// assert_eq!(f.index(5), None);
    /// assert_eq!(f.index(-6), None);
    /// ```
    pub fn index(&self, index: isize) -> Option<Entry> {
        let n = self.len() as isize;
        let idx = if index < 0 { index + n } else { index };
        if idx < 0 || idx >= n {
            return None;
        }
        if idx <= n / 2 {
            let mut e = self.head()?;
            for _ in 0..idx {
                e = self.next(e)?;
            }
            Some(e)
        } else {
            let mut e = self.tail()?;
            for _ in 0..(n - 1 - idx) {
                e = self.prev(e)?;
            }
            Some(e)
        }
    }

    /// Returns the value at `e`. Byte strings borrow from the list.
    ///
    /// Atom keys are returned as [`Databox::Atom`] without resolution.
    pub fn get(&self, e: Entry) -> Databox<'_> {
        entry::decode(&self.buf, e.0).unwrap_or(Databox::Void)
    }

    /// Returns the value at `index`, counting from the tail if negative.
    pub fn get_index(&self, index: isize) -> Option<Databox<'_>> {
        self.index(index).map(|e| self.get(e))
    }

    /// Returns the value at `e`, resolving atom keys through `atoms`.
    ///
    /// # Errors
    ///
    /// An error is returned if the entry holds an atom key and `atoms` is [`None`] or
    /// misses the key.
    pub fn get_with_reference<'a>(
        &'a self,
        e: Entry,
        atoms: Option<&'a AtomTable>,
    ) -> Result<Databox<'a>> {
        match self.get(e) {
            Databox::Atom(key) => atoms
                .and_then(|t| t.get(key))
                .map(Databox::from)
                .ok_or(Error::AtomUnresolved(key)),
            val => Ok(val),
        }
    }

    /// Pushes `val` at `endpoint`, returning the new entry.
    ///
    /// # Complexity
    ///
    /// Amortized constant at the tail, linear at the head
    pub fn push(&mut self, val: &Databox<'_>, endpoint: Endpoint) -> Entry {
        let at = match endpoint {
            Endpoint::Head => self.header_len(),
            Endpoint::Tail => self.buf.len(),
        };
        self.insert_at_offset(at, val)
    }

    /// Stores `bytes` in `atoms` and pushes its key at `endpoint`, returning the new entry.
    ///
    /// # Examples
    ///
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use datakit::flex::AtomTable;
    /// use datakit::{Databox, Endpoint, Flex};
    ///
    /// let mut atoms = AtomTable::new();
    /// let mut f = Flex::new();
    /// let e = f.push_atom(&mut atoms, b"a long shared key".to_vec(), Endpoint::Tail);
    /// assert!(matches!(f.get(e), Databox::Atom(_)));
    /// assert_eq!(
    ///     f.get_with_reference(e, Some(&atoms))?,
    ///     Databox::from("a long shared key")
    /// );
    /// # Ok(())
    /// # }
    /// ```
    pub fn push_atom(&mut self, atoms: &mut AtomTable, bytes: Vec<u8>, endpoint: Endpoint) -> Entry {
        let key = atoms.insert(bytes);
        self.push(&Databox::Atom(key), endpoint)
    }

    fn insert_at_offset(&mut self, at: usize, val: &Databox<'_>) -> Entry {
        let mut encoded = Vec::with_capacity(entry::encoded_size(val));
        entry::encode_append(val, &mut encoded);
        let count = self.len() + 1;
        Entry(self.splice(at..at, &encoded, count))
    }

    /// Inserts `val` right before `e`, returning the new entry.
    pub fn insert(&mut self, e: Entry, val: &Databox<'_>) -> Entry {
        self.insert_at_offset(e.0, val)
    }

    /// Inserts `val` right after `e`, returning the new entry.
    pub fn insert_after(&mut self, e: Entry, val: &Databox<'_>) -> Entry {
        let at = e.0 + self.size(e);
        self.insert_at_offset(at, val)
    }

    /// Inserts `val` so that it becomes the `index`-th entry.
    ///
    /// # Errors
    ///
    /// An error is returned if `index > self.len()`.
    pub fn insert_index(&mut self, index: usize, val: &Databox<'_>) -> Result<Entry> {
        if index == self.len() {
            return Ok(self.push(val, Endpoint::Tail));
        }
        let e = self.index(index as isize).ok_or(Error::OutOfRange {
            index: index as i64,
            len: self.len(),
        })?;
        Ok(self.insert(e, val))
    }

    /// Replaces the value at `e` by `val`, widening or narrowing the entry in place.
    pub fn replace(&mut self, e: Entry, val: &Databox<'_>) -> Entry {
        let mut encoded = Vec::with_capacity(entry::encoded_size(val));
        entry::encode_append(val, &mut encoded);
        let end = e.0 + self.size(e);
        let count = self.len();
        Entry(self.splice(e.0..end, &encoded, count))
    }

    /// Deletes the entry at `e`, returning the entry that took its place.
    pub fn delete(&mut self, e: Entry) -> Option<Entry> {
        self.delete_count(e, 1)
    }

    /// Deletes up to `count` entries starting at `e`, returning the entry that took
    /// their place, or [`None`] if the deletion reached the tail.
    pub fn delete_count(&mut self, e: Entry, count: usize) -> Option<Entry> {
        let mut end = e.0;
        let mut deleted = 0;
        while deleted < count && end < self.buf.len() {
            end += self.size(Entry(end));
            deleted += 1;
        }
        let remaining = self.len() - deleted;
        let at = self.splice(e.0..end, &[], remaining);
        (at < self.buf.len()).then_some(Entry(at))
    }

    /// Deletes `count` entries starting at `offset`, counting from the tail if negative.
    ///
    /// # Errors
    ///
    /// An error is returned if `offset` is out of range.
    pub fn delete_offset_count(&mut self, offset: isize, count: usize) -> Result<()> {
        let e = self.index(offset).ok_or(Error::OutOfRange {
            index: offset as i64,
            len: self.len(),
        })?;
        self.delete_count(e, count);
        Ok(())
    }

    /// Deletes up to `count` entries starting at `index`, counting from the tail if
    /// negative, and returns the number of deleted entries.
    ///
    /// Nothing happens if `index` is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::{Databox, Endpoint, Flex};
    ///
    /// let mut f = Flex::new();
    /// for i in 0..10u64 {
    ///     f.push(&Databox::from(i), Endpoint::Tail);
    /// }
    /// assert_eq!(f.delete_range(-3, 100), 3);
    /// assert_eq!(f.delete_range(1, 2), 2);
    /// assert_eq!(f.delete_range(20, 1), 0);
    /// assert_eq!(f.len(), 5);
    /// assert_eq!(f.get_index(1), Some(Databox::from(3u64)));
    /// ```
    pub fn delete_range(&mut self, index: isize, count: usize) -> usize {
        let before = self.len();
        if let Some(e) = self.index(index) {
            self.delete_count(e, count);
        }
        before - self.len()
    }

    /// Deletes every entry from the head up to and including `e`.
    pub fn delete_up_to_inclusive(&mut self, e: Entry) {
        let hl = self.header_len();
        let end = e.0 + self.size(e);
        let mut deleted = 0;
        let mut off = hl;
        while off < end {
            off += self.size(Entry(off));
            deleted += 1;
        }
        let remaining = self.len() - deleted;
        self.splice(hl..end, &[], remaining);
    }

    /// Removes and returns the value at `endpoint`, or [`None`] if empty.
    pub fn pop(&mut self, endpoint: Endpoint) -> Option<Databox<'static>> {
        let e = match endpoint {
            Endpoint::Head => self.head()?,
            Endpoint::Tail => self.tail()?,
        };
        let val = self.get(e).into_owned();
        self.delete(e);
        Some(val)
    }

    /// Returns the first entry at or after `start` equal to `val`, comparing one entry
    /// and then skipping `skip` entries.
    ///
    /// Equality is [`Databox::compare()`] returning `Equal`.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::{Databox, Endpoint, Flex};
    ///
    /// let mut f = Flex::new();
    /// for kv in ["a", "1", "b", "a", "a", "2"] {
    ///     f.push(&Databox::from(kv), Endpoint::Tail);
    /// }
    /// let key = Databox::from("a");
    /// let found = f.find(f.head().unwrap(), &key, 1).unwrap();
    /// assert_eq!(found, f.index(0).unwrap());
    ///
    /// let found = f.find(f.index(2).unwrap(), &key, 1).unwrap();
    /// assert_eq!(found, f.index(4).unwrap());
    /// ```
    pub fn find(&self, start: Entry, val: &Databox<'_>, skip: usize) -> Option<Entry> {
        let mut cur = Some(start);
        while let Some(e) = cur {
            if self.get(e).compare(val).is_eq() {
                return Some(e);
            }
            cur = Some(e);
            for _ in 0..=skip {
                cur = cur.and_then(|c| self.next(c));
            }
        }
        None
    }

    /// Same as [`Self::find()`] starting from the head.
    pub fn find_head(&self, val: &Databox<'_>, skip: usize) -> Option<Entry> {
        self.head().and_then(|h| self.find(h, val, skip))
    }

    /// Returns the first entry at or before `start` equal to `val`, walking backwards and
    /// skipping `skip` entries between comparisons.
    pub fn find_rev(&self, start: Entry, val: &Databox<'_>, skip: usize) -> Option<Entry> {
        let mut cur = Some(start);
        while let Some(e) = cur {
            if self.get(e).compare(val).is_eq() {
                return Some(e);
            }
            cur = Some(e);
            for _ in 0..=skip {
                cur = cur.and_then(|c| self.prev(c));
            }
        }
        None
    }

    /// Moves the entries from `index` on into a new list, keeping `[0, index)` in `self`.
    ///
    /// If `index >= self.len()` the returned list is empty.
    pub fn split_at(&mut self, index: usize) -> Flex {
        let n = self.len();
        if index >= n {
            return Flex::new();
        }
        let Some(e) = self.index(index as isize) else {
            return Flex::new();
        };
        let tail = Self::from_entries(&self.buf[e.0..], n - index);
        let end = self.buf.len();
        self.splice(e.0..end, &[], index);
        tail
    }

    /// Splits the list roughly in half at a boundary of records of `elements_per_entry`
    /// entries, keeping the first half and returning the second.
    ///
    /// `self` keeps `ceil(records / 2)` records, so splitting a list of one record
    /// returns an empty list.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::{Databox, Endpoint, Flex};
    ///
    /// let mut f = Flex::new();
    /// for i in 0..10u64 {
    ///     f.push(&Databox::from(i), Endpoint::Tail);
    /// }
    /// let second = f.split(2);
    /// assert_eq!(f.len(), 6);
    /// assert_eq!(second.len(), 4);
    /// assert_eq!(second.get_index(0), Some(Databox::from(6u64)));
    /// ```
    pub fn split(&mut self, elements_per_entry: usize) -> Flex {
        let epe = elements_per_entry.max(1);
        let records = self.len() / epe;
        let keep = (records + 1) / 2 * epe;
        self.split_at(keep)
    }

    /// Splits at the cached `middle` entry, keeping the entries before it.
    pub fn split_middle(&mut self, middle: Entry) -> Flex {
        let n = self.len();
        let mut index = 0;
        let mut cur = self.head();
        while let Some(e) = cur {
            if e == middle {
                break;
            }
            index += 1;
            cur = self.next(e);
        }
        self.split_at(index.min(n))
    }

    /// Moves up to `count` entries starting at `index` (from the tail if negative)
    /// into a new list.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::{Databox, Endpoint, Flex};
    ///
    /// let mut f = Flex::new();
    /// for i in 0..6u64 {
    ///     f.push(&Databox::from(i), Endpoint::Tail);
    /// }
    /// let mid = f.split_range(2, 3);
    /// assert_eq!(mid.len(), 3);
    /// assert_eq!(f.len(), 3);
    /// assert_eq!(f.get_index(2), Some(Databox::from(5u64)));
    /// ```
    pub fn split_range(&mut self, index: isize, count: usize) -> Flex {
        let Some(e) = self.index(index) else {
            return Flex::new();
        };
        let mut end = e.0;
        let mut taken = 0;
        while taken < count && end < self.buf.len() {
            end += self.size(Entry(end));
            taken += 1;
        }
        let range = Self::from_entries(&self.buf[e.0..end], taken);
        let remaining = self.len() - taken;
        self.splice(e.0..end, &[], remaining);
        range
    }

    /// Concatenates `first` and `second` into one list.
    pub fn merge(first: Flex, second: Flex) -> Flex {
        if second.is_empty() {
            return first;
        }
        let mut merged = first;
        merged.append_flex(&second);
        merged
    }

    /// Appends every entry of `other` to the tail.
    pub fn append_flex(&mut self, other: &Flex) {
        if other.is_empty() {
            return;
        }
        let count = self.len() + other.len();
        let at = self.buf.len();
        self.splice(at..at, other.entries(), count);
    }

    /// Creates an iterator over values from head to tail.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self, true)
    }

    /// Creates an iterator over values from tail to head.
    pub fn iter_rev(&self) -> Iter<'_> {
        Iter::new(self, false)
    }
}

impl fmt::Debug for Flex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flex")
            .field("vals", &self.iter().collect::<Vec<_>>())
            .field("len", &self.len())
            .field("bytes", &self.bytes())
            .finish()
    }
}

impl Serializable for Flex {
    fn serialize_into<W: Write>(&self, mut writer: W) -> anyhow::Result<usize> {
        serial::serialize_bytes(&self.buf, &mut writer)
    }

    fn deserialize_from<R: Read>(mut reader: R) -> anyhow::Result<Self> {
        let buf = serial::deserialize_bytes(&mut reader)?;
        Ok(Self::from_bytes(buf)?)
    }

    fn size_in_bytes(&self) -> usize {
        serial::bytes_size(self.buf.len())
    }
}

/// Iterator over the values of a [`Flex`], created by [`Flex::iter()`] or
/// [`Flex::iter_rev()`].
pub struct Iter<'a> {
    flex: &'a Flex,
    cur: Option<Entry>,
    remaining: usize,
    forward: bool,
}

impl<'a> Iter<'a> {
    /// Creates a new iterator.
    pub fn new(flex: &'a Flex, forward: bool) -> Self {
        let cur = if forward { flex.head() } else { flex.tail() };
        Self {
            flex,
            cur,
            remaining: flex.len(),
            forward,
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Databox<'a>;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        let e = self.cur?;
        self.cur = if self.forward {
            self.flex.next(e)
        } else {
            self.flex.prev(e)
        };
        self.remaining = self.remaining.saturating_sub(1);
        Some(self.flex.get(e))
    }

    #[inline(always)]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    fn sample() -> Vec<Databox<'static>> {
        vec![
            Databox::from("aa"),
            Databox::from(1u64),
            Databox::Float32(2.5),
            Databox::from("z"),
            Databox::from(-7i64),
        ]
    }

    fn random_box(rng: &mut ChaChaRng) -> Databox<'static> {
        match rng.gen_range(0..6) {
            0 => Databox::from(rng.gen::<u64>() >> rng.gen_range(0..64)),
            1 => Databox::from(-(rng.gen_range(1..1_000_000i64))),
            2 => Databox::Double64(rng.gen()),
            3 => Databox::from(vec![b'x'; rng.gen_range(0..300)]),
            4 => Databox::from(rng.gen::<bool>()),
            _ => Databox::Null,
        }
    }

    #[test]
    fn test_push_pop_symmetry() {
        let mut f = Flex::new();
        for v in sample() {
            f.push(&v, Endpoint::Tail);
        }
        assert_eq!(f.len(), 5);
        let mut popped = vec![];
        while let Some(v) = f.pop(Endpoint::Tail) {
            popped.push(v);
        }
        let mut expected = sample();
        expected.reverse();
        assert_eq!(popped, expected);
        assert!(f.is_empty());
        assert_eq!(f.bytes(), f.header_len());
        assert_eq!(f.bytes(), capacity::EMPTY_BYTES);
        assert_eq!(f.pop(Endpoint::Head), None);
    }

    #[test]
    fn test_forward_backward_random() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        let mut f = Flex::new();
        let mut model = std::collections::VecDeque::new();
        for _ in 0..2000 {
            let v = random_box(&mut rng);
            if rng.gen_bool(0.5) {
                f.push(&v, Endpoint::Tail);
                model.push_back(v);
            } else {
                f.push(&v, Endpoint::Head);
                model.push_front(v);
            }
        }
        assert_eq!(f.len(), model.len());
        assert_eq!(f.iter().collect::<Vec<_>>(), model.iter().cloned().collect::<Vec<_>>());
        assert_eq!(
            f.iter_rev().collect::<Vec<_>>(),
            model.iter().rev().cloned().collect::<Vec<_>>()
        );
        let copy = Flex::from_bytes(f.as_bytes().to_vec()).unwrap();
        assert_eq!(copy, f);
    }

    #[test]
    fn test_header_widening() {
        let mut f = Flex::new();
        let big = vec![1u8; 3000];
        let e = f.push(&Databox::from(big.clone()), Endpoint::Tail);
        assert_eq!(f.header_len(), 4);
        assert_eq!(e.offset(), 4);
        assert_eq!(f.get(e), Databox::from(big));
        let next = f.delete(e);
        assert_eq!(next, None);
        assert_eq!(f.bytes(), 2);
    }

    #[test]
    fn test_insert_replace_delete() {
        let mut f = Flex::new();
        for i in 0..5u64 {
            f.push(&Databox::from(i), Endpoint::Tail);
        }
        let e = f.index(2).unwrap();
        let e = f.insert(e, &Databox::from("two"));
        assert_eq!(f.get(e), Databox::from("two"));
        let e = f.insert_after(e, &Databox::from(-2i64));
        assert_eq!(f.next(e).map(|x| f.get(x)), Some(Databox::from(2u64)));
        let e = f.replace(e, &Databox::from(vec![b'y'; 500]));
        assert_eq!(f.get(e).as_bytes().map(|b| b.len()), Some(500));
        let after = f.delete(e).unwrap();
        assert_eq!(f.get(after), Databox::from(2u64));
        assert_eq!(
            f.iter().collect::<Vec<_>>(),
            vec![
                Databox::from(0u64),
                Databox::from(1u64),
                Databox::from("two"),
                Databox::from(2u64),
                Databox::from(3u64),
                Databox::from(4u64),
            ]
        );
        f.insert_index(6, &Databox::from(9u64)).unwrap();
        let e = f.insert_index(8, &Databox::Null);
        assert_eq!(
            e.err().map(|x| x.to_string()),
            Some("index must be in -7..7, but got 8.".to_string())
        );
    }

    #[test]
    fn test_delete_up_to_inclusive() {
        let mut f = Flex::new();
        for i in 0..6u64 {
            f.push(&Databox::from(i), Endpoint::Tail);
        }
        let e = f.index(3).unwrap();
        f.delete_up_to_inclusive(e);
        assert_eq!(f.len(), 2);
        assert_eq!(f.get_index(0), Some(Databox::from(4u64)));
        let e = f.delete_offset_count(-9, 1);
        assert_eq!(
            e.err().map(|x| x.to_string()),
            Some("index must be in -2..2, but got -9.".to_string())
        );
    }

    #[test]
    fn test_split_merge_roundtrip() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        let mut f = Flex::new();
        for _ in 0..101 {
            f.push(&random_box(&mut rng), Endpoint::Tail);
        }
        let original = f.clone();
        let second = f.split(1);
        assert_eq!(f.len(), 51);
        assert_eq!(second.len(), 50);
        assert_eq!(Flex::merge(f, second), original);

        let mut one = Flex::new();
        one.push(&Databox::from(1u64), Endpoint::Tail);
        assert!(one.split(1).is_empty());
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn test_split_middle() {
        let mut f = Flex::new();
        for i in 0..8u64 {
            f.push(&Databox::from(i), Endpoint::Tail);
        }
        let middle = f.index(3).unwrap();
        let right = f.split_middle(middle);
        assert_eq!(f.len(), 3);
        assert_eq!(right.get_index(0), Some(Databox::from(3u64)));
    }

    #[test]
    fn test_find_rev() {
        let mut f = Flex::new();
        for v in ["k", "v", "k", "w"] {
            f.push(&Databox::from(v), Endpoint::Tail);
        }
        let key = Databox::from("k");
        let found = f.find_rev(f.index(2).unwrap(), &key, 1).unwrap();
        assert_eq!(found, f.index(2).unwrap());
        assert_eq!(f.find_rev(f.index(1).unwrap(), &key, 1), None);
        assert_eq!(f.find_head(&Databox::from("w"), 0), f.index(3));
    }

    #[test]
    fn test_atom_unresolved() {
        let mut f = Flex::new();
        let e = f.push(&Databox::Atom(4), Endpoint::Tail);
        let r = f.get_with_reference(e, None);
        assert_eq!(
            r.err().map(|x| x.to_string()),
            Some("atom 4 cannot be resolved.".to_string())
        );
        let atoms = AtomTable::new();
        assert!(f.get_with_reference(e, Some(&atoms)).is_err());
    }

    #[test]
    fn test_serialize() {
        let mut f = Flex::new();
        for v in sample() {
            f.push(&v, Endpoint::Tail);
        }
        let mut bytes = vec![];
        let size = f.serialize_into(&mut bytes).unwrap();
        let other = Flex::deserialize_from(&bytes[..]).unwrap();
        assert_eq!(f, other);
        assert_eq!(size, bytes.len());
        assert_eq!(size, f.size_in_bytes());

        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(Flex::deserialize_from(&bytes[..]).is_err());
    }

    #[test]
    fn test_from_bytes_rejects_corruption() {
        let mut f = Flex::new();
        f.push(&Databox::from("abc"), Endpoint::Tail);
        let mut bytes = f.into_bytes();
        let last = bytes.len() - 1;
        bytes[last] = 99;
        assert!(Flex::from_bytes(bytes).is_err());

        let e = Flex::from_bytes(vec![2, 1]);
        assert_eq!(
            e.err().map(|x| x.to_string()),
            Some("invalid encoding: header records 1 entries, but 0 were found.".to_string())
        );
    }
}
