//! Render Pass Resource Set
//!
//! Tracks the lazily created binding state of one pass:
//!
//! ```text
//! Unprovisioned --layout--> LayoutCreated --populate all slots--> BindingsPopulated
//!                                                                   |        ^
//!                                                          mark_stale|        |refresh last stale slot
//!                                                                   v        |
//!                                                                  Stale ----+
//! ```
//!
//! `reset` (pass cleanup) returns to `Unprovisioned` from any state. Every
//! other move not drawn above is rejected with
//! [`KairosError::InvalidResourceTransition`].
//!
//! Staleness is tracked per frame slot: a binding table is only rebuilt right
//! before its own slot records, when that slot's previous submission is known
//! to be complete.

use kairos_core::{KairosError, Result};
use smallvec::SmallVec;

use crate::gpu::ResourceHandle;
use crate::settings::MAX_FRAMES_IN_FLIGHT;
use crate::slot::FrameSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceSetState {
    Unprovisioned,
    LayoutCreated,
    BindingsPopulated,
    Stale,
}

impl ResourceSetState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unprovisioned => "Unprovisioned",
            Self::LayoutCreated => "LayoutCreated",
            Self::BindingsPopulated => "BindingsPopulated",
            Self::Stale => "Stale",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceSet {
    state: ResourceSetState,
    layout: Option<ResourceHandle>,
    tables: SmallVec<[Option<ResourceHandle>; MAX_FRAMES_IN_FLIGHT]>,
    stale: SmallVec<[bool; MAX_FRAMES_IN_FLIGHT]>,
}

impl ResourceSet {
    #[must_use]
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            state: ResourceSetState::Unprovisioned,
            layout: None,
            tables: smallvec::smallvec![None; frames_in_flight],
            stale: smallvec::smallvec![false; frames_in_flight],
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> ResourceSetState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn layout(&self) -> Option<ResourceHandle> {
        self.layout
    }

    #[inline]
    #[must_use]
    pub fn table(&self, slot: FrameSlot) -> Option<ResourceHandle> {
        self.tables.get(slot.index()).copied().flatten()
    }

    /// Whether binding tables exist for every slot (fresh or stale).
    #[must_use]
    pub fn has_bindings(&self) -> bool {
        matches!(self.state, ResourceSetState::BindingsPopulated | ResourceSetState::Stale)
    }

    #[must_use]
    pub fn is_stale(&self, slot: FrameSlot) -> bool {
        self.state == ResourceSetState::Stale && self.stale.get(slot.index()).copied().unwrap_or(false)
    }

    /// Records the binding layout. Only valid once per provisioning.
    pub fn layout_created(&mut self, layout: ResourceHandle) -> Result<()> {
        self.expect(&[ResourceSetState::Unprovisioned], ResourceSetState::LayoutCreated)?;
        self.layout = Some(layout);
        self.state = ResourceSetState::LayoutCreated;
        Ok(())
    }

    /// Records the initial binding table of `slot`. The set becomes
    /// `BindingsPopulated` once every slot has one.
    pub fn populate(&mut self, slot: FrameSlot, table: ResourceHandle) -> Result<()> {
        self.expect(&[ResourceSetState::LayoutCreated], ResourceSetState::BindingsPopulated)?;
        let entry = self.slot_entry(slot)?;
        if entry.is_some() {
            return Err(Self::transition_error(ResourceSetState::BindingsPopulated, ResourceSetState::BindingsPopulated));
        }
        *entry = Some(table);
        if self.tables.iter().all(Option::is_some) {
            self.state = ResourceSetState::BindingsPopulated;
        }
        Ok(())
    }

    /// Flags the table of `slot` for rebuilding before that slot records.
    pub fn mark_stale(&mut self, slot: FrameSlot) -> Result<()> {
        self.expect(
            &[ResourceSetState::BindingsPopulated, ResourceSetState::Stale],
            ResourceSetState::Stale,
        )?;
        self.slot_entry(slot)?;
        self.stale[slot.index()] = true;
        self.state = ResourceSetState::Stale;
        Ok(())
    }

    pub fn mark_all_stale(&mut self) -> Result<()> {
        for index in 0..self.tables.len() {
            self.mark_stale(FrameSlot(index))?;
        }
        Ok(())
    }

    /// Swaps in the rebuilt table of a stale slot and returns the old one for
    /// destruction.
    pub fn refresh(&mut self, slot: FrameSlot, table: ResourceHandle) -> Result<Option<ResourceHandle>> {
        if !self.is_stale(slot) {
            return Err(Self::transition_error(self.state, ResourceSetState::BindingsPopulated));
        }
        let previous = self.slot_entry(slot)?.replace(table);
        self.stale[slot.index()] = false;
        if !self.stale.contains(&true) {
            self.state = ResourceSetState::BindingsPopulated;
        }
        Ok(previous)
    }

    /// Returns to `Unprovisioned`, handing back every handle the set held.
    pub fn reset(&mut self) -> Vec<ResourceHandle> {
        let handles = self.tables.iter_mut().filter_map(Option::take).chain(self.layout.take()).collect();
        self.stale.fill(false);
        self.state = ResourceSetState::Unprovisioned;
        handles
    }

    fn slot_entry(&mut self, slot: FrameSlot) -> Result<&mut Option<ResourceHandle>> {
        let frames_in_flight = self.tables.len();
        self.tables.get_mut(slot.index()).ok_or(KairosError::SlotOutOfRange {
            slot: slot.index(),
            frames_in_flight,
        })
    }

    fn expect(&self, allowed: &[ResourceSetState], to: ResourceSetState) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Self::transition_error(self.state, to))
        }
    }

    fn transition_error(from: ResourceSetState, to: ResourceSetState) -> KairosError {
        KairosError::InvalidResourceTransition { from: from.as_str(), to: to.as_str() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn handle(n: u64) -> ResourceHandle {
        ResourceHandle::from(KeyData::from_ffi(n))
    }

    fn populated(frames: usize) -> ResourceSet {
        let mut set = ResourceSet::new(frames);
        set.layout_created(handle(1)).unwrap();
        for i in 0..frames {
            set.populate(FrameSlot(i), handle(10 + i as u64)).unwrap();
        }
        set
    }

    #[test]
    fn provisioning_walks_the_states_in_order() {
        let mut set = ResourceSet::new(2);
        assert_eq!(set.state(), ResourceSetState::Unprovisioned);
        assert!(set.populate(FrameSlot(0), handle(2)).is_err());

        set.layout_created(handle(1)).unwrap();
        set.populate(FrameSlot(0), handle(2)).unwrap();
        assert_eq!(set.state(), ResourceSetState::LayoutCreated);
        set.populate(FrameSlot(1), handle(3)).unwrap();
        assert_eq!(set.state(), ResourceSetState::BindingsPopulated);
        assert!(set.layout_created(handle(4)).is_err());
    }

    #[test]
    fn stale_slots_are_refreshed_individually() {
        let mut set = populated(2);
        set.mark_all_stale().unwrap();
        assert!(set.is_stale(FrameSlot(0)) && set.is_stale(FrameSlot(1)));

        let old = set.refresh(FrameSlot(0), handle(20)).unwrap();
        assert_eq!(old, Some(handle(10)));
        assert_eq!(set.state(), ResourceSetState::Stale);
        assert!(!set.is_stale(FrameSlot(0)));

        set.refresh(FrameSlot(1), handle(21)).unwrap();
        assert_eq!(set.state(), ResourceSetState::BindingsPopulated);
        assert!(set.refresh(FrameSlot(1), handle(22)).is_err());
    }

    #[test]
    fn mark_stale_before_bindings_is_rejected() {
        let mut set = ResourceSet::new(1);
        assert_eq!(
            set.mark_stale(FrameSlot(0)),
            Err(KairosError::InvalidResourceTransition { from: "Unprovisioned", to: "Stale" })
        );
    }

    #[test]
    fn reset_returns_every_handle() {
        let mut set = populated(2);
        set.mark_stale(FrameSlot(1)).unwrap();
        let mut handles = set.reset();
        handles.sort();
        assert_eq!(handles.len(), 3);
        assert_eq!(set.state(), ResourceSetState::Unprovisioned);
        assert!(set.table(FrameSlot(0)).is_none());
        set.layout_created(handle(5)).unwrap();
    }
}
