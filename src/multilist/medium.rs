//! Two-chunk tier.
//!
//! The head chunk is non-empty whenever the list is; emptying it swaps the chunks.
use super::{insert_in_flex, Entry};
use crate::databox::Databox;
use crate::flex::{Endpoint, Flex};

/// Head and tail packed lists.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct Medium {
    pub(crate) f: [Flex; 2],
}

impl Medium {
    /// Splits `f` in half, or keeps it whole as the head if it has a single value.
    pub(crate) fn from_flex(mut f: Flex) -> Self {
        if f.len() > 1 {
            let second = f.split(1);
            Self { f: [f, second] }
        } else {
            Self {
                f: [f, Flex::new()],
            }
        }
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.f[0].len() + self.f[1].len()
    }

    #[inline(always)]
    pub(crate) fn bytes(&self) -> usize {
        self.f[0].bytes() + self.f[1].bytes()
    }

    fn keep_head_populated(&mut self) {
        if self.f[0].is_empty() && !self.f[1].is_empty() {
            self.f.swap(0, 1);
        }
    }

    pub(crate) fn push(&mut self, val: &Databox<'_>, endpoint: Endpoint) {
        match endpoint {
            Endpoint::Head => self.f[0].push(val, Endpoint::Head),
            Endpoint::Tail if self.f[0].is_empty() => self.f[0].push(val, Endpoint::Tail),
            Endpoint::Tail => self.f[1].push(val, Endpoint::Tail),
        };
    }

    pub(crate) fn index(&self, idx: usize) -> Entry {
        let c0 = self.f[0].len();
        if idx < c0 {
            Entry::new(0, idx)
        } else {
            Entry::new(1, idx - c0)
        }
    }

    pub(crate) fn get(&self, entry: Entry) -> Option<Databox<'static>> {
        self.f
            .get(entry.chunk)?
            .get_index(entry.offset as isize)
            .map(Databox::into_owned)
    }

    pub(crate) fn insert(&mut self, entry: Entry, val: &Databox<'_>, after: bool) {
        insert_in_flex(&mut self.f[entry.chunk.min(1)], entry.offset, val, after);
        self.keep_head_populated();
    }

    pub(crate) fn replace(&mut self, entry: Entry, val: &Databox<'_>) -> bool {
        let f = &mut self.f[entry.chunk.min(1)];
        match f.index(entry.offset as isize) {
            Some(e) => {
                f.replace(e, val);
                true
            }
            None => false,
        }
    }

    pub(crate) fn delete(&mut self, entry: Entry) {
        self.f[entry.chunk.min(1)].delete_range(entry.offset as isize, 1);
        self.keep_head_populated();
    }

    pub(crate) fn del_range(&mut self, start: usize, extent: usize) {
        let c0 = self.f[0].len();
        let end = start + extent;
        if start < c0 {
            self.f[0].delete_range(start as isize, end.min(c0) - start);
        }
        if end > c0 {
            let from = start.max(c0);
            self.f[1].delete_range((from - c0) as isize, end - from);
        }
        self.keep_head_populated();
    }

    pub(crate) fn pop(&mut self, endpoint: Endpoint) -> Option<Databox<'static>> {
        let val = match endpoint {
            Endpoint::Head => self.f[0].pop(Endpoint::Head),
            Endpoint::Tail if !self.f[1].is_empty() => self.f[1].pop(Endpoint::Tail),
            Endpoint::Tail => self.f[0].pop(Endpoint::Tail),
        };
        self.keep_head_populated();
        val
    }

    pub(crate) fn rotate(&mut self) {
        if self.len() > 1 {
            if let Some(val) = self.pop(Endpoint::Tail) {
                self.f[0].push(&val, Endpoint::Head);
            }
        }
    }
}
