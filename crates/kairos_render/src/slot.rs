//! Frame slots and per-slot storage.

use std::fmt;
use std::ops::{Index, IndexMut};

use smallvec::SmallVec;

use crate::settings::MAX_FRAMES_IN_FLIGHT;

/// One of the `F` frames that may be in flight at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FrameSlot(pub usize);

impl FrameSlot {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }

    /// The slot that follows this one in the `0..frames_in_flight` cycle.
    #[inline]
    #[must_use]
    pub fn next(self, frames_in_flight: usize) -> Self {
        Self((self.0 + 1) % frames_in_flight.max(1))
    }
}

impl fmt::Display for FrameSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}", self.0)
    }
}

/// Exactly one `T` per frame slot, stored inline.
#[derive(Debug, Clone)]
pub struct PerSlot<T>(SmallVec<[T; MAX_FRAMES_IN_FLIGHT]>);

impl<T> PerSlot<T> {
    pub fn from_fn(frames_in_flight: usize, mut f: impl FnMut(FrameSlot) -> T) -> Self {
        Self((0..frames_in_flight).map(|i| f(FrameSlot(i))).collect())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn get(&self, slot: FrameSlot) -> Option<&T> {
        self.0.get(slot.0)
    }

    #[inline]
    pub fn get_mut(&mut self, slot: FrameSlot) -> Option<&mut T> {
        self.0.get_mut(slot.0)
    }

    /// All slots in index order.
    pub fn slots(&self) -> impl Iterator<Item = FrameSlot> + use<T> {
        (0..self.0.len()).map(FrameSlot)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.0.iter_mut()
    }
}

impl<T: Clone> PerSlot<T> {
    #[must_use]
    pub fn splat(frames_in_flight: usize, value: T) -> Self {
        Self(smallvec::smallvec![value; frames_in_flight])
    }
}

impl<T> Index<FrameSlot> for PerSlot<T> {
    type Output = T;

    fn index(&self, slot: FrameSlot) -> &T {
        &self.0[slot.0]
    }
}

impl<T> IndexMut<FrameSlot> for PerSlot<T> {
    fn index_mut(&mut self, slot: FrameSlot) -> &mut T {
        &mut self.0[slot.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_wraps_around() {
        assert_eq!(FrameSlot(0).next(2), FrameSlot(1));
        assert_eq!(FrameSlot(1).next(2), FrameSlot(0));
        assert_eq!(FrameSlot(0).next(1), FrameSlot(0));
    }

    #[test]
    fn per_slot_builds_from_index() {
        let values = PerSlot::from_fn(3, |slot| slot.index() * 10);
        assert_eq!(values[FrameSlot(2)], 20);
        assert_eq!(values.slots().collect::<Vec<_>>(), vec![FrameSlot(0), FrameSlot(1), FrameSlot(2)]);
        assert!(values.get(FrameSlot(3)).is_none());
    }
}
