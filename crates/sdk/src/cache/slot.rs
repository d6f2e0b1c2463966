use crate::types::Slot;

/// Highest slot ever accepted for one feed of one venue.
///
/// Only moves forward: an observation below the floor is rejected and leaves
/// the floor unchanged. The floor is sent as `minContextSlot` on the next read
/// so the node refuses to serve older state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotTracker {
    floor: Slot,
}

impl SlotTracker {
    pub fn new() -> Self { Self::default() }

    pub fn floor(&self) -> Slot { self.floor }

    pub fn admits(&self, slot: Slot) -> bool { slot >= self.floor }

    /// Advances the floor to `slot` if admissible. Returns whether it was.
    pub fn observe(&mut self, slot: Slot) -> bool {
        if !self.admits(slot) {
            return false;
        }
        self.floor = slot;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_never_decreases() {
        let mut tracker = SlotTracker::new();
        assert_eq!(tracker.floor(), 0);

        let observed = [5, 3, 5, 9, 1, 0, 12];
        let mut floors = Vec::new();
        for slot in observed {
            tracker.observe(slot);
            floors.push(tracker.floor());
        }
        assert_eq!(floors, vec![5, 5, 5, 9, 9, 9, 12]);
    }

    #[test]
    fn equal_slot_is_admitted() {
        let mut tracker = SlotTracker::new();
        assert!(tracker.observe(7));
        assert!(tracker.observe(7));
        assert!(!tracker.observe(6));
        assert_eq!(tracker.floor(), 7);
    }
}
