//! Cursors and iterators over a [`Multilist`].
use super::{Entry, Multilist};
use crate::databox::Databox;
use crate::error::Result;
use crate::flex::{self, Flex};
use crate::mflex::MflexState;

/// Decoded copy of the chunk a cursor is inside.
#[derive(Clone, Debug)]
struct View {
    chunk: usize,
    start: usize,
    flex: Flex,
    at: usize,
    cursor: flex::Entry,
}

/// Position in a [`Multilist`] that survives deletions made through it.
///
/// A cursor does not borrow the list; it is advanced with [`Cursor::next()`] and may
/// delete the entry it just returned with [`Multilist::del_entry()`]. Any other mutation
/// of the list invalidates it.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use datakit::{Databox, MflexState, Multilist};
///
/// let mut state = MflexState::new();
/// let mut ml = Multilist::new(1, 0);
/// for i in 0..100u64 {
///     ml.push_tail(&mut state, &Databox::from(i))?;
/// }
///
/// let mut cursor = ml.cursor(true);
/// while let Some((entry, val)) = cursor.next(&ml, &mut state)? {
///     if val.as_u64().map_or(false, |v| v % 2 == 1) {
///         ml.del_entry(&mut cursor, entry, &mut state)?;
///     }
/// }
/// assert_eq!(ml.len(), 50);
/// assert_eq!(ml.get(&mut state, -1)?, Some(Databox::from(98u64)));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Cursor {
    next: Option<usize>,
    last: Option<usize>,
    forward: bool,
    read_only: bool,
    view: Option<View>,
}

impl Cursor {
    pub(crate) fn new(start: Option<usize>, forward: bool, read_only: bool) -> Self {
        Self {
            next: start,
            last: None,
            forward,
            read_only,
            view: None,
        }
    }

    /// Checks if the cursor moves from head to tail.
    pub const fn is_forward(&self) -> bool {
        self.forward
    }

    /// Checks if the cursor refuses deletions.
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the next entry and its value, or [`None`] past the end.
    ///
    /// # Errors
    ///
    /// An error is returned if a compressed chunk cannot be decompressed.
    pub fn next(
        &mut self,
        list: &Multilist,
        state: &mut MflexState,
    ) -> Result<Option<(Entry, Databox<'static>)>> {
        let Some(g) = self.next.filter(|&g| g < list.len()) else {
            self.next = None;
            return Ok(None);
        };
        let covered = self
            .view
            .as_ref()
            .map_or(false, |v| v.start <= g && g < v.start + v.flex.len());
        if !covered {
            let Some(entry) = list.index(g as isize) else {
                return Ok(None);
            };
            let flex = list.chunk_flex(entry.chunk, state)?;
            let Some(cursor) = flex.index(entry.offset as isize) else {
                return Ok(None);
            };
            self.view = Some(View {
                chunk: entry.chunk,
                start: g - entry.offset,
                flex,
                at: entry.offset,
                cursor,
            });
        }
        let Some(view) = self.view.as_mut() else {
            return Ok(None);
        };
        let target = g - view.start;
        while view.at != target {
            let moved = if view.at < target {
                view.flex.next(view.cursor)
            } else {
                view.flex.prev(view.cursor)
            };
            let Some(cursor) = moved else {
                return Ok(None);
            };
            view.cursor = cursor;
            view.at = if view.at < target { view.at + 1 } else { view.at - 1 };
        }
        let val = view.flex.get(view.cursor).into_owned();
        let entry = Entry::new(view.chunk, target);
        self.last = Some(g);
        self.next = if self.forward { Some(g + 1) } else { g.checked_sub(1) };
        Ok(Some((entry, val)))
    }

    /// Repositions after the last returned value was deleted.
    pub(crate) fn after_delete(&mut self) {
        self.view = None;
        if let Some(g) = self.last.take() {
            self.next = if self.forward { Some(g) } else { g.checked_sub(1) };
        }
    }
}

/// Iterator over the values of a [`Multilist`], created by [`Multilist::iter()`],
/// [`Multilist::iter_rev()`] or [`Multilist::iter_at()`].
///
/// Values are decoded into owned boxes; an error is yielded once if a compressed chunk
/// cannot be decompressed, ending the iteration.
pub struct Iter<'a> {
    list: &'a Multilist,
    state: &'a mut MflexState,
    cursor: Cursor,
}

impl<'a> Iter<'a> {
    /// Creates a new iterator.
    pub(crate) fn new(list: &'a Multilist, state: &'a mut MflexState, cursor: Cursor) -> Self {
        Self {
            list,
            state,
            cursor,
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = Result<Databox<'static>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.cursor.next(self.list, self.state) {
            Ok(Some((_, val))) => Some(Ok(val)),
            Ok(None) => None,
            Err(e) => {
                self.cursor.next = None;
                Some(Err(e))
            }
        }
    }
}
