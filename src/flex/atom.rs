//! Caller-held table resolving atom keys stored in packed lists.
use std::collections::HashMap;

/// Table mapping atom keys to owned byte strings.
///
/// A packed list stores only the integer key of an atom; the table must be presented
/// again to resolve it through [`Flex::get_with_reference()`](crate::flex::Flex::get_with_reference).
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use datakit::{flex::AtomTable, Databox, Endpoint, Flex};
///
/// let mut atoms = AtomTable::new();
/// let key = atoms.insert(b"a long shared value".to_vec());
///
/// let mut f = Flex::new();
/// f.push(&Databox::Atom(key), Endpoint::Tail);
///
/// let head = f.head().unwrap();
/// assert_eq!(f.get(head), Databox::Atom(key));
/// assert_eq!(
///     f.get_with_reference(head, Some(&atoms))?.as_bytes(),
///     Some(&b"a long shared value"[..])
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AtomTable {
    map: HashMap<u64, Vec<u8>>,
    next_key: u64,
}

impl AtomTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` under a fresh key and returns the key.
    pub fn insert(&mut self, bytes: Vec<u8>) -> u64 {
        while self.map.contains_key(&self.next_key) {
            self.next_key = self.next_key.wrapping_add(1);
        }
        let key = self.next_key;
        self.map.insert(key, bytes);
        self.next_key = self.next_key.wrapping_add(1);
        key
    }

    /// Stores `bytes` under `key`, returning the previous bytes if any.
    pub fn insert_with_key(&mut self, key: u64, bytes: Vec<u8>) -> Option<Vec<u8>> {
        self.map.insert(key, bytes)
    }

    /// Returns the bytes stored under `key`.
    pub fn get(&self, key: u64) -> Option<&[u8]> {
        self.map.get(&key).map(Vec::as_slice)
    }

    /// Removes `key`, returning its bytes.
    pub fn remove(&mut self, key: u64) -> Option<Vec<u8>> {
        self.map.remove(&key)
    }

    /// Gets the number of atoms.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Checks if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_skips_taken_keys() {
        let mut atoms = AtomTable::new();
        atoms.insert_with_key(0, b"x".to_vec());
        atoms.insert_with_key(1, b"y".to_vec());
        let key = atoms.insert(b"z".to_vec());
        assert_eq!(key, 2);
        assert_eq!(atoms.get(1), Some(&b"y"[..]));
        assert_eq!(atoms.len(), 3);
        assert_eq!(atoms.remove(0), Some(b"x".to_vec()));
        assert_eq!(atoms.get(0), None);
    }
}
