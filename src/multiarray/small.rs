//! Single-row tier.

/// All records in one vector.
#[derive(Clone, Default)]
pub(crate) struct Small<T> {
    pub(crate) data: Vec<T>,
}

impl<T> Small<T> {
    pub(crate) fn new() -> Self {
        Self { data: Vec::new() }
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn insert(&mut self, idx: usize, val: T) {
        self.data.insert(idx, val);
    }

    pub(crate) fn delete(&mut self, idx: usize) -> T {
        self.data.remove(idx)
    }

    #[inline(always)]
    pub(crate) fn get(&self, idx: usize) -> Option<&T> {
        self.data.get(idx)
    }

    #[inline(always)]
    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.data.get_mut(idx)
    }
}
