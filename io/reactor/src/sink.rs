//! Output sinks for finished connections.

use crate::types::SlotIndex;

/// Receives the payload of every connection that reaches a terminal state.
///
/// Called at most once per slot. Failed connections deliver whatever they
/// had accumulated, possibly nothing.
pub trait Sink {
    fn write(&mut self, slot: SlotIndex, payload: Vec<u8>);
}

impl<F> Sink for F
where
    F: FnMut(SlotIndex, Vec<u8>),
{
    fn write(&mut self, slot: SlotIndex, payload: Vec<u8>) {
        self(slot, payload)
    }
}

/// Sink that keeps every payload in memory, indexed by slot.
#[derive(Debug, Clone, Default)]
pub struct CollectSink {
    slots: Vec<Option<Vec<u8>>>,
}

impl CollectSink {
    /// Create a sink with room for `slots` results.
    pub fn new(slots: usize) -> Self {
        Self {
            slots: vec![None; slots],
        }
    }

    /// Payload delivered for `slot`, if any.
    pub fn get(&self, slot: SlotIndex) -> Option<&[u8]> {
        self.slots.get(slot).and_then(|s| s.as_deref())
    }

    /// Number of slots that received a payload.
    pub fn received(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Number of slots this sink was sized for.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Iterate over delivered payloads in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, &[u8])> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, payload)| payload.as_deref().map(|p| (slot, p)))
    }
}

impl Sink for CollectSink {
    fn write(&mut self, slot: SlotIndex, payload: Vec<u8>) {
        if slot >= self.slots.len() {
            self.slots.resize(slot + 1, None);
        }
        debug_assert!(self.slots[slot].is_none(), "slot {slot} delivered twice");
        self.slots[slot] = Some(payload);
    }
}
