//! Sorted operations over lists of fixed-size records.
//!
//! A record is `elements_per_entry` consecutive entries whose first entry is the key.
//! The caller attests that keys are in ascending [`Databox::compare()`] order and keeps a
//! cached middle cursor, which these operations refresh after every mutation.
use std::cmp::Ordering;

use super::{entry, Entry, Flex};
use crate::databox::Databox;

impl Flex {
    /// Returns the first entry of the middle record, or [`None`] if there is no full record.
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
    /// let middle = f.middle(2).unwrap();
    /// assert_eq!(f.get(middle), Databox::from(4u64));
    /// ```
    pub fn middle(&self, elements_per_entry: usize) -> Option<Entry> {
        let epe = elements_per_entry.max(1);
        let records = self.len() / epe;
        if records == 0 {
            return None;
        }
        self.index((records / 2 * epe) as isize)
    }

    fn advance(&self, e: Entry, n: usize) -> Option<Entry> {
        let mut cur = Some(e);
        for _ in 0..n {
            cur = cur.and_then(|c| self.next(c));
        }
        cur
    }

    /// Returns the first record whose key is not less than `key` (or [`None`] for the end),
    /// and whether that key is equal to `key`.
    fn locate_sorted(
        &self,
        epe: usize,
        key: &Databox<'_>,
        middle: Option<Entry>,
    ) -> (Option<Entry>, bool) {
        self.locate_sorted_by(epe, middle, |x| x.compare(key))
    }

    /// Bisects the records with `cmp`, which orders a record key against the target.
    ///
    /// The middle record picks the half; the half is then bisected by walking relative to
    /// its low end, so the walk never covers more than that half.
    fn locate_sorted_by<F>(
        &self,
        epe: usize,
        middle: Option<Entry>,
        mut cmp: F,
    ) -> (Option<Entry>, bool)
    where
        F: FnMut(&Databox<'_>) -> Ordering,
    {
        let records = self.len() / epe;
        if records == 0 {
            return (None, false);
        }
        let Some(mid_entry) = middle.or_else(|| self.middle(epe)) else {
            return (None, false);
        };
        let mid = records / 2;
        // Records in lo..hi are undecided; hi is the answer once the range is empty.
        let (mut lo, mut lo_entry, mut hi, mut hi_entry, mut hi_equal) =
            match cmp(&self.get(mid_entry)) {
                Ordering::Less => (mid + 1, self.advance(mid_entry, epe), records, None, false),
                ord => (0, self.head(), mid, Some(mid_entry), ord == Ordering::Equal),
            };
        while lo < hi {
            let m = lo + (hi - lo) / 2;
            let Some(e) = lo_entry.and_then(|x| self.advance(x, (m - lo) * epe)) else {
                break;
            };
            match cmp(&self.get(e)) {
                Ordering::Less => {
                    lo = m + 1;
                    lo_entry = self.advance(e, epe);
                }
                ord => {
                    hi = m;
                    hi_entry = Some(e);
                    hi_equal = ord == Ordering::Equal;
                }
            }
        }
        (hi_entry, hi_equal)
    }

    /// Returns the first record whose key equals `key`.
    ///
    /// The cached `middle` picks the half to bisect; pass [`None`] to derive it.
    ///
    /// # Complexity
    ///
    /// $`O(\log n)`$ key comparisons over a walk of at most half the entries
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::{Databox, Endpoint, Flex};
    ///
    /// let mut f = Flex::new();
    /// for i in (0..20u64).step_by(2) {
    ///     f.push(&Databox::from(i), Endpoint::Tail);
    /// }
    /// let middle = f.middle(1);
    /// let found = f.find_sorted_with_middle(1, &Databox::from(14u64), middle);
    /// assert_eq!(found, f.index(7));
    /// assert_eq!(f.find_sorted_with_middle(1, &Databox::from(3u64), middle), None);
    /// ```
    pub fn find_sorted_with_middle(
        &self,
        elements_per_entry: usize,
        key: &Databox<'_>,
        middle: Option<Entry>,
    ) -> Option<Entry> {
        match self.locate_sorted(elements_per_entry.max(1), key, middle) {
            (found, true) => found,
            _ => None,
        }
    }

    fn encode_record(record: &[Databox<'_>]) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(record.iter().map(entry::encoded_size).sum());
        for val in record {
            entry::encode_append(val, &mut encoded);
        }
        encoded
    }

    /// Inserts `record` at its sorted position, or replaces the record with an equal key.
    ///
    /// The record size is `record.len()` and the key is `record[0]`. Returns `true` if a
    /// new record was added, and refreshes `middle`.
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::{Databox, Flex};
    ///
    /// let mut f = Flex::new();
    /// let mut middle = None;
    /// for (k, v) in [(5u64, "five"), (1, "one"), (3, "three"), (1, "uno")] {
    ///     f.insert_replace_sorted_with_middle(&[Databox::from(k), Databox::from(v)], &mut middle);
    /// }
    /// assert_eq!(f.len(), 6);
    /// assert_eq!(f.get_index(1), Some(Databox::from("uno")));
    /// assert_eq!(f.get_index(4), Some(Databox::from(5u64)));
    /// ```
    pub fn insert_replace_sorted_with_middle(
        &mut self,
        record: &[Databox<'_>],
        middle: &mut Option<Entry>,
    ) -> bool {
        let Some(key) = record.first() else {
            return false;
        };
        let epe = record.len();
        let encoded = Self::encode_record(record);
        let (pos, found) = self.locate_sorted(epe, key, *middle);
        let added = match (pos, found) {
            (Some(e), true) => {
                let end = self.advance(e, epe).map_or(self.buf.len(), |x| x.0);
                let count = self.len();
                self.splice(e.0..end, &encoded, count);
                false
            }
            (pos, _) => {
                let at = pos.map_or(self.buf.len(), |e| e.0);
                let count = self.len() + epe;
                self.splice(at..at, &encoded, count);
                true
            }
        };
        *middle = self.middle(epe);
        added
    }

    /// Inserts `record` before the first record whose key is not less than `record[0]`,
    /// keeping duplicates, and refreshes `middle`.
    pub fn insert_sorted_with_middle(&mut self, record: &[Databox<'_>], middle: &mut Option<Entry>) {
        let Some(key) = record.first() else {
            return;
        };
        let epe = record.len();
        let encoded = Self::encode_record(record);
        let (pos, _) = self.locate_sorted(epe, key, *middle);
        let at = pos.map_or(self.buf.len(), |e| e.0);
        let count = self.len() + epe;
        self.splice(at..at, &encoded, count);
        *middle = self.middle(epe);
    }

    /// Deletes the first record whose key equals `key`, returning `true` if one was found,
    /// and refreshes `middle`.
    pub fn delete_sorted_value_with_middle(
        &mut self,
        elements_per_entry: usize,
        key: &Databox<'_>,
        middle: &mut Option<Entry>,
    ) -> bool {
        let epe = elements_per_entry.max(1);
        let deleted = match self.locate_sorted(epe, key, *middle) {
            (Some(e), true) => {
                self.delete_count(e, epe);
                true
            }
            _ => false,
        };
        *middle = self.middle(epe);
        deleted
    }
}

#[cfg(test)]
mod tests {
    use crate::{Databox, Endpoint, Flex};

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    #[test]
    fn test_sorted_random_insert() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        let mut f = Flex::new();
        let mut middle = None;
        let mut model = std::collections::BTreeMap::new();
        for _ in 0..500 {
            let k = rng.gen_range(-200i64..200);
            let v = rng.gen::<u32>() as u64;
            let added = f.insert_replace_sorted_with_middle(
                &[Databox::from(k), Databox::from(v)],
                &mut middle,
            );
            assert_eq!(added, model.insert(k, v).is_none());
            assert_eq!(middle, f.middle(2));
        }
        let flat: Vec<_> = model
            .iter()
            .flat_map(|(&k, &v)| [Databox::from(k), Databox::from(v)])
            .collect();
        assert_eq!(f.iter().collect::<Vec<_>>(), flat);

        for (&k, _) in model.iter().take(50) {
            let key = Databox::from(k);
            assert!(f.find_sorted_with_middle(2, &key, middle).is_some());
            assert!(f.delete_sorted_value_with_middle(2, &key, &mut middle));
            assert!(f.find_sorted_with_middle(2, &key, middle).is_none());
        }
        assert_eq!(f.len(), 2 * (model.len() - 50));
    }

    #[test]
    fn test_non_decreasing_with_duplicates() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        let mut f = Flex::new();
        let mut middle = None;
        for _ in 0..300 {
            let k = rng.gen_range(0..30u64);
            f.insert_sorted_with_middle(&[Databox::from(k)], &mut middle);
        }
        assert_eq!(f.len(), 300);
        let vals: Vec<_> = f.iter().collect();
        assert!(vals.windows(2).all(|w| w[0].compare(&w[1]).is_le()));

        // The first of several equal keys is returned.
        let e = f.find_sorted_with_middle(1, &vals[150], None).unwrap();
        let first = vals.iter().position(|v| v == &vals[150]).unwrap();
        assert_eq!(Some(e), f.index(first as isize));
    }

    #[test]
    fn test_lookup_comparisons_are_logarithmic() {
        let mut f = Flex::new();
        for i in 0..1024u64 {
            f.push(&Databox::from(i / 4), Endpoint::Tail);
            f.push(&Databox::from(i), Endpoint::Tail);
        }
        let middle = f.middle(2);
        for k in [0u64, 1, 37, 128, 200, 255, 256, 1000] {
            let key = Databox::from(k);
            let mut calls = 0;
            let (pos, equal) = f.locate_sorted_by(2, middle, |x| {
                calls += 1;
                x.compare(&key)
            });
            assert!(calls <= 12, "{calls} comparisons for {k}");
            // Keys repeat four times; the first of them is found.
            let first = 8 * k.min(256) as isize;
            assert_eq!(pos, f.index(first));
            assert_eq!(equal, k < 256);
        }
        let found = f.find_sorted_with_middle(2, &Databox::from(100u64), middle);
        assert_eq!(f.get(found.unwrap()), Databox::from(100u64));
        assert_eq!(f.get_index(801), Some(Databox::from(400u64)));
    }

    #[test]
    fn test_delete_missing() {
        let mut f = Flex::new();
        let mut middle = None;
        assert!(!f.delete_sorted_value_with_middle(1, &Databox::from(1u64), &mut middle));
        assert_eq!(middle, None);
    }
}
