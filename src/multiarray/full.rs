//! Tier of rows in a xor-linked list.
//!
//! Rows live in an arena and are named by ids, where id `i` is slot `i - 1` and id 0 is
//! the null link. Each row stores `prev ^ next`, so a walk needs the id it came from.
use super::{insert_into_row, Side};

#[derive(Clone)]
struct Node<T> {
    data: Vec<T>,
    prev_next: usize,
}

/// Position of a record: the neighbouring row ids and the offset inside `cur`.
#[derive(Clone, Copy, Debug)]
struct Cursor {
    prev: usize,
    cur: usize,
    offset: usize,
}

/// Rows of at most `row_max` records each, xor-linked from `head` to `tail`.
///
/// At least one row is always linked, possibly empty.
#[derive(Clone)]
pub(crate) struct Full<T> {
    slots: Vec<Node<T>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    rows: usize,
}

impl<T> Full<T> {
    pub(crate) fn from_rows(rows: Vec<Vec<T>>) -> Self {
        let mut full = Self {
            slots: Vec::with_capacity(rows.len()),
            free: vec![],
            head: 0,
            tail: 0,
            rows: 0,
        };
        for row in rows {
            let tail = full.tail;
            full.link_between(tail, 0, row);
        }
        if full.rows == 0 {
            full.link_between(0, 0, Vec::new());
        }
        full
    }

    #[inline(always)]
    pub(crate) fn row_count(&self) -> usize {
        self.rows
    }

    #[inline(always)]
    fn node(&self, id: usize) -> &Node<T> {
        &self.slots[id - 1]
    }

    #[inline(always)]
    fn node_mut(&mut self, id: usize) -> &mut Node<T> {
        &mut self.slots[id - 1]
    }

    #[inline(always)]
    fn next_of(&self, prev: usize, cur: usize) -> usize {
        self.node(cur).prev_next ^ prev
    }

    /// Links a new row holding `data` between `a` and `b` and returns its id.
    fn link_between(&mut self, a: usize, b: usize, data: Vec<T>) -> usize {
        let node = Node {
            data,
            prev_next: a ^ b,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id - 1] = node;
                id
            }
            None => {
                self.slots.push(node);
                self.slots.len()
            }
        };
        if a == 0 {
            self.head = id;
        } else {
            self.node_mut(a).prev_next ^= b ^ id;
        }
        if b == 0 {
            self.tail = id;
        } else {
            self.node_mut(b).prev_next ^= a ^ id;
        }
        self.rows += 1;
        id
    }

    /// Unlinks row `c` lying between `a` and `b`.
    fn unlink(&mut self, a: usize, c: usize, b: usize) {
        if a == 0 {
            self.head = b;
        } else {
            self.node_mut(a).prev_next ^= c ^ b;
        }
        if b == 0 {
            self.tail = a;
        } else {
            self.node_mut(b).prev_next ^= c ^ a;
        }
        let node = self.node_mut(c);
        node.data = Vec::new();
        node.prev_next = 0;
        self.free.push(c);
        self.rows -= 1;
    }

    /// Walks from the head to the row holding `idx`; `idx == len` maps to the end of the
    /// tail row.
    fn locate(&self, idx: usize) -> Cursor {
        let mut rem = idx;
        let mut prev = 0;
        let mut cur = self.head;
        loop {
            let len = self.node(cur).data.len();
            let next = self.next_of(prev, cur);
            if rem < len || next == 0 {
                return Cursor {
                    prev,
                    cur,
                    offset: rem.min(len),
                };
            }
            rem -= len;
            prev = cur;
            cur = next;
        }
    }

    pub(crate) fn insert(&mut self, idx: usize, val: T, row_max: usize) {
        let Cursor { prev, cur, offset } = self.locate(idx);
        let next = self.next_of(prev, cur);
        let row = &mut self.node_mut(cur).data;
        if let Some((data, side)) = insert_into_row(row, offset, val, row_max) {
            match side {
                Side::Before => self.link_between(prev, cur, data),
                Side::After => self.link_between(cur, next, data),
            };
        }
    }

    pub(crate) fn delete(&mut self, idx: usize) -> T {
        let Cursor { prev, cur, offset } = self.locate(idx);
        let next = self.next_of(prev, cur);
        let val = self.node_mut(cur).data.remove(offset);
        if self.node(cur).data.is_empty() && self.rows > 1 {
            self.unlink(prev, cur, next);
        }
        val
    }

    pub(crate) fn get(&self, idx: usize) -> Option<&T> {
        let c = self.locate(idx);
        self.node(c.cur).data.get(c.offset)
    }

    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        let c = self.locate(idx);
        self.node_mut(c.cur).data.get_mut(c.offset)
    }

    pub(crate) fn head_row(&self) -> &[T] {
        &self.node(self.head).data
    }

    pub(crate) fn tail_row(&self) -> &[T] {
        &self.node(self.tail).data
    }

    pub(crate) fn tail_row_mut(&mut self) -> &mut Vec<T> {
        let tail = self.tail;
        &mut self.node_mut(tail).data
    }

    pub(crate) fn rows(&self) -> Rows<'_, T> {
        Rows {
            full: self,
            prev: 0,
            cur: self.head,
        }
    }

    /// Checks that both walks visit every linked row and agree on the neighbours.
    pub(crate) fn verify_links(&self) -> bool {
        let mut forward = vec![];
        let (mut prev, mut cur) = (0, self.head);
        while cur != 0 {
            if forward.len() > self.rows {
                return false;
            }
            forward.push(cur);
            let next = self.next_of(prev, cur);
            prev = cur;
            cur = next;
        }
        if forward.len() != self.rows || forward.last() != Some(&self.tail) {
            return false;
        }
        let mut backward = vec![];
        let (mut next, mut cur) = (0, self.tail);
        while cur != 0 && backward.len() <= self.rows {
            backward.push(cur);
            let prev = self.node(cur).prev_next ^ next;
            next = cur;
            cur = prev;
        }
        backward.reverse();
        forward == backward
    }
}

/// Row iterator following the xor links from the head.
pub(crate) struct Rows<'a, T> {
    full: &'a Full<T>,
    prev: usize,
    cur: usize,
}

impl<'a, T> Iterator for Rows<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur == 0 {
            return None;
        }
        let row = &self.full.node(self.cur).data;
        let next = self.full.next_of(self.prev, self.cur);
        self.prev = self.cur;
        self.cur = next;
        Some(row)
    }
}
