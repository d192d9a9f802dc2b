//! Ordered, keyed collection of utterances or interactions.
//!
//! Elements keep arrival order. Packets are merged into the element they
//! belong to (as decided by [`Containable::matches`]) or seed a new one.

use std::collections::VecDeque;

use cadence_core::{Packet, Timestamp};

/// Something an [`OrderedContainer`] can hold.
pub trait Containable {
    /// Stable identifier of the element.
    fn key(&self) -> &str;

    /// Latest packet timestamp observed by the element.
    fn recent_time(&self) -> Timestamp;

    /// Whether `packet` belongs to this element.
    fn matches(&self, packet: &Packet) -> bool;

    /// Merge `packet` into the element.
    fn absorb(&mut self, packet: Packet);

    /// Called when the element leaves a container through `dequeue(true)`.
    fn on_dequeue(&mut self) {}
}

/// FIFO container with merge-on-match insertion.
#[derive(Debug, Clone)]
pub struct OrderedContainer<T> {
    elements: VecDeque<T>,
    recent_time: Option<Timestamp>,
}

impl<T> Default for OrderedContainer<T> {
    fn default() -> Self {
        Self {
            elements: VecDeque::new(),
            recent_time: None,
        }
    }
}

impl<T: Containable> OrderedContainer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Latest timestamp seen by this container, `None` until something arrives.
    pub fn recent_time(&self) -> Option<Timestamp> {
        self.recent_time
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.elements.iter()
    }

    pub fn front(&self) -> Option<&T> {
        self.elements.front()
    }

    pub fn contains(&self, packet: &Packet) -> bool {
        self.elements.iter().any(|e| e.matches(packet))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.elements.iter().any(|e| e.key() == key)
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.elements.iter().find(|e| e.key() == key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.elements.iter_mut().find(|e| e.key() == key)
    }

    /// True when `packet` is older than traffic this container already saw.
    pub fn is_overdue(&self, packet: &Packet) -> bool {
        matches!(self.recent_time, Some(recent) if recent > packet.timestamp)
    }

    /// Append an element, raising `recent_time` to the element's.
    pub fn enqueue(&mut self, element: T) {
        self.observe(element.recent_time());
        self.elements.push_back(element);
    }

    /// Pop the oldest element. `recent_time` is left untouched.
    pub fn dequeue(&mut self, invoke_callback: bool) -> Option<T> {
        let mut element = self.elements.pop_front()?;
        if invoke_callback {
            element.on_dequeue();
        }
        Some(element)
    }

    /// Take the element with `key` out of the container, wherever it sits.
    pub fn remove(&mut self, key: &str, invoke_callback: bool) -> Option<T> {
        let index = self.elements.iter().position(|e| e.key() == key)?;
        let mut element = self.elements.remove(index)?;
        if invoke_callback {
            element.on_dequeue();
        }
        Some(element)
    }

    /// Remove the oldest element satisfying `predicate`.
    pub fn evict_first<F>(&mut self, predicate: F) -> Option<T>
    where
        F: Fn(&T) -> bool,
    {
        let index = self.elements.iter().position(predicate)?;
        self.elements.remove(index)
    }

    /// Move every element into `other`, oldest first, invoking each
    /// element's dequeue hook exactly once. Returns how many moved.
    pub fn pour_to(&mut self, other: &mut OrderedContainer<T>) -> usize {
        let mut moved = 0;
        while let Some(element) = self.dequeue(true) {
            other.enqueue(element);
            moved += 1;
        }
        moved
    }

    pub fn clear(&mut self) {
        self.elements.clear();
        self.recent_time = None;
    }

    fn observe(&mut self, time: Timestamp) {
        if self.recent_time.map_or(true, |recent| time > recent) {
            self.recent_time = Some(time);
        }
    }
}

impl<T: Containable + From<Packet>> OrderedContainer<T> {
    /// Merge `packet` into its element or seed a new one from it.
    ///
    /// Packets missing any id are dropped; returns whether the packet was kept.
    pub fn add(&mut self, packet: Packet) -> bool {
        if !packet.is_well_formed() {
            tracing::trace!(packet_id = %packet.packet_id, "Dropping packet with missing ids");
            return false;
        }
        self.observe(packet.timestamp);
        match self.elements.iter_mut().find(|e| e.matches(&packet)) {
            Some(element) => element.absorb(packet),
            None => self.elements.push_back(T::from(packet)),
        }
        true
    }
}

// =============================================================================
// Tests
// =============================================================================
