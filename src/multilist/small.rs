//! Single-chunk tier.
use super::{insert_in_flex, Entry};
use crate::databox::Databox;
use crate::flex::{Endpoint, Flex};

/// One packed list holding every value.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct Small {
    pub(crate) f: Flex,
}

impl Small {
    pub(crate) fn new(f: Flex) -> Self {
        Self { f }
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.f.len()
    }

    #[inline(always)]
    pub(crate) fn bytes(&self) -> usize {
        self.f.bytes()
    }

    pub(crate) fn push(&mut self, val: &Databox<'_>, endpoint: Endpoint) {
        self.f.push(val, endpoint);
    }

    pub(crate) fn index(&self, idx: usize) -> Entry {
        Entry::new(0, idx)
    }

    pub(crate) fn get(&self, entry: Entry) -> Option<Databox<'static>> {
        self.f
            .get_index(entry.offset as isize)
            .map(Databox::into_owned)
    }

    pub(crate) fn insert(&mut self, entry: Entry, val: &Databox<'_>, after: bool) {
        insert_in_flex(&mut self.f, entry.offset, val, after);
    }

    pub(crate) fn replace(&mut self, entry: Entry, val: &Databox<'_>) -> bool {
        match self.f.index(entry.offset as isize) {
            Some(e) => {
                self.f.replace(e, val);
                true
            }
            None => false,
        }
    }

    pub(crate) fn delete(&mut self, entry: Entry) {
        self.f.delete_range(entry.offset as isize, 1);
    }

    pub(crate) fn del_range(&mut self, start: usize, extent: usize) {
        self.f.delete_range(start as isize, extent);
    }

    pub(crate) fn pop(&mut self, endpoint: Endpoint) -> Option<Databox<'static>> {
        self.f.pop(endpoint)
    }

    pub(crate) fn rotate(&mut self) {
        if self.f.len() > 1 {
            if let Some(val) = self.f.pop(Endpoint::Tail) {
                self.f.push(&val, Endpoint::Head);
            }
        }
    }
}
