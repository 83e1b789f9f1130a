//! Stack of installed vtree versions.
//!
//! The top entry is the *active* vtree every factory operation works against.
//! Pushing installs a new version; popping discards the top version together
//! with its pins. A stash mark remembers a depth so that a batch of tentative
//! versions pushed afterwards can be discarded in one `restore`.
//!
//! Two counters are kept: the `version` counter increases on every change of
//! the stack, and each pushed entry receives a fresh `generation` number that
//! identifies it for as long as it is installed.

use log::debug;

use crate::sdd::SddId;
use crate::vtree_root::VtreeRoot;

#[derive(Debug, Clone)]
struct Entry {
    root: VtreeRoot,
    generation: u64,
}

#[derive(Debug, Clone, Default)]
pub struct VtreeStack {
    entries: Vec<Entry>,
    next_generation: u64,
    version: u64,
    stash_marks: Vec<usize>,
}

impl VtreeStack {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of modifications performed on the stack so far.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Generation of the active entry, if any.
    #[inline]
    pub fn generation(&self) -> Option<u64> {
        self.entries.last().map(|e| e.generation)
    }

    #[inline]
    pub fn active(&self) -> Option<&VtreeRoot> {
        self.entries.last().map(|e| &e.root)
    }

    #[inline]
    pub fn active_mut(&mut self) -> Option<&mut VtreeRoot> {
        self.entries.last_mut().map(|e| &mut e.root)
    }

    /// Installs `root` as the new active version and returns its generation.
    pub fn push(&mut self, root: VtreeRoot) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.version += 1;
        debug!("vtree push: generation {}, depth {}", generation, self.entries.len() + 1);
        self.entries.push(Entry { root, generation });
        generation
    }

    /// Removes the active version, releasing all of its pins.
    ///
    /// Returns the removed root (with an empty pin table) and the nodes that
    /// were pinned to it.
    pub fn pop(&mut self) -> Option<(VtreeRoot, Vec<SddId>)> {
        let mut entry = self.entries.pop()?;
        self.version += 1;
        self.stash_marks.retain(|&mark| mark <= self.entries.len());
        let released = entry.root.clear_pins();
        debug!("vtree pop: generation {}, released {} pins", entry.generation, released.len());
        Some((entry.root, released))
    }

    /// Remembers the current depth; versions pushed afterwards are tentative
    /// until the mark is dropped with [`commit`](Self::commit) or rolled back
    /// with [`restore`](Self::restore).
    pub fn stash(&mut self) {
        self.stash_marks.push(self.entries.len());
    }

    /// Pops every version pushed since the most recent stash mark.
    ///
    /// Returns the number of versions discarded.
    pub fn restore(&mut self) -> usize {
        let Some(mark) = self.stash_marks.pop() else {
            return 0;
        };
        let mut popped = 0;
        while self.entries.len() > mark {
            self.pop();
            popped += 1;
        }
        popped
    }

    /// Drops the most recent stash mark, keeping the tentative versions.
    pub fn commit(&mut self) {
        self.stash_marks.pop();
    }

    /// Removes the entries at depths `from..top` while keeping the active one,
    /// releasing their pins. Used to collapse a chain of superseded versions.
    pub fn collapse(&mut self, from: usize) -> Vec<SddId> {
        let top = self.entries.len();
        if from + 1 >= top {
            return Vec::new();
        }
        let mut released = Vec::new();
        for mut entry in self.entries.drain(from..top - 1) {
            released.extend(entry.root.clear_pins());
        }
        self.version += 1;
        self.stash_marks.retain(|&mark| mark <= from);
        released.sort();
        released.dedup();
        released
    }

    /// Position of the entry with the given generation, counted from the bottom.
    pub fn depth_of(&self, generation: u64) -> Option<usize> {
        self.entries.iter().position(|e| e.generation == generation)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::vtree::Vtree;

    #[test]
    fn test_push_pop_counters() {
        let mut vt = Vtree::new();
        let a = vt.balanced(&[1, 2]);
        let b = vt.balanced(&[2, 1]);

        let mut stack = VtreeStack::new();
        assert!(stack.active().is_none());
        let g0 = stack.push(VtreeRoot::new(&vt, a));
        let g1 = stack.push(VtreeRoot::new(&vt, b));
        assert_ne!(g0, g1);
        assert_eq!(stack.generation(), Some(g1));
        assert_eq!(stack.active().unwrap().root(), b);
        assert_eq!(stack.version(), 2);

        stack.active_mut().unwrap().pin(SddId::new(5));
        let (root, released) = stack.pop().unwrap();
        assert_eq!(root.root(), b);
        assert_eq!(released, vec![SddId::new(5)]);
        assert_eq!(stack.generation(), Some(g0));
        assert_eq!(stack.version(), 3);
    }

    #[test]
    fn test_stash_restore() {
        let mut vt = Vtree::new();
        let a = vt.balanced(&[1, 2, 3]);
        let b = vt.right_linear(&[1, 2, 3]);
        let c = vt.left_linear(&[1, 2, 3]);

        let mut stack = VtreeStack::new();
        stack.push(VtreeRoot::new(&vt, a));
        stack.active_mut().unwrap().pin(SddId::new(9));
        stack.stash();
        stack.push(VtreeRoot::new(&vt, b));
        stack.push(VtreeRoot::new(&vt, c));
        assert_eq!(stack.depth(), 3);
        assert_eq!(stack.restore(), 2);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.active().unwrap().root(), a);
        assert_eq!(stack.active().unwrap().pin_count(SddId::new(9)), 1);
        assert_eq!(stack.restore(), 0);
    }

    #[test]
    fn test_collapse_keeps_top() {
        let mut vt = Vtree::new();
        let a = vt.balanced(&[1, 2, 3]);
        let b = vt.right_linear(&[1, 2, 3]);
        let c = vt.left_linear(&[1, 2, 3]);

        let mut stack = VtreeStack::new();
        stack.push(VtreeRoot::new(&vt, a));
        stack.active_mut().unwrap().pin(SddId::new(2));
        stack.push(VtreeRoot::new(&vt, b));
        stack.active_mut().unwrap().pin(SddId::new(3));
        let top = stack.push(VtreeRoot::new(&vt, c));

        let released = stack.collapse(0);
        assert_eq!(released, vec![SddId::new(2), SddId::new(3)]);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.generation(), Some(top));
        assert_eq!(stack.depth_of(top), Some(0));
    }
}
