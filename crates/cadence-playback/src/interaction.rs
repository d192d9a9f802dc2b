//! One request/response exchange: every utterance sharing an interaction id.
//!
//! Utterances live in exactly one of three containers:
//! - `prepared`: received, waiting to be dispatched
//! - `processed`: dispatched (including the one currently presenting) or stale
//! - `cancelled`: discarded by a cancel request

use cadence_core::{HistoryItem, Packet, Timestamp};

use crate::container::{Containable, OrderedContainer};
use crate::error::PlaybackError;
use crate::state::InteractionStatus;
use crate::utterance::Utterance;

/// Where [`Interaction::add`] routed a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Already dispatched, stale, or an end marker.
    Processed,
    /// Appended to the utterance currently presenting.
    Current,
    /// Waiting for dispatch.
    Prepared,
    /// The interaction was cancelled.
    Cancelled,
    /// Wrong interaction id or missing ids.
    Rejected,
}

#[derive(Debug, Clone)]
pub struct Interaction {
    id: String,
    sequence_number: u64,
    recent_time: Timestamp,
    status: InteractionStatus,
    received_interaction_end: bool,
    interruptible: bool,
    prepared: OrderedContainer<Utterance>,
    processed: OrderedContainer<Utterance>,
    cancelled: OrderedContainer<Utterance>,
    current_utterance: Option<String>,
}

impl Interaction {
    pub fn new(id: impl Into<String>, sequence_number: u64, created_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            sequence_number,
            recent_time: created_at,
            status: InteractionStatus::Created,
            received_interaction_end: false,
            interruptible: true,
            prepared: OrderedContainer::new(),
            processed: OrderedContainer::new(),
            cancelled: OrderedContainer::new(),
            current_utterance: None,
        }
    }

    /// Route `packet` into the right container.
    pub fn add(&mut self, packet: Packet) -> Placement {
        if packet.interaction_id() != self.id || !packet.is_well_formed() {
            return Placement::Rejected;
        }
        if packet.timestamp > self.recent_time {
            self.recent_time = packet.timestamp;
        }
        if packet.is_uninterruptible_trigger() {
            tracing::debug!(interaction_id = %self.id, "Interaction marked uninterruptible");
            self.interruptible = false;
        }

        if self.status == InteractionStatus::Cancelled {
            self.cancelled.add(packet);
            return Placement::Cancelled;
        }

        if packet.is_interaction_end() {
            self.received_interaction_end = true;
            self.mark_last_content_final();
            self.processed.add(packet);
            return Placement::Processed;
        }

        if self.processed.contains(&packet) {
            let is_current = self.current_utterance.as_deref() == Some(packet.utterance_id());
            self.processed.add(packet);
            return if is_current {
                Placement::Current
            } else {
                Placement::Processed
            };
        }

        // An utterance never lives in two containers, so late packets for a
        // prepared utterance join it even when they look stale.
        if !self.prepared.contains(&packet) && self.processed.is_overdue(&packet) {
            tracing::trace!(
                interaction_id = %self.id,
                packet = %packet.packet_id,
                "Overdue packet recorded without playback"
            );
            self.processed.add(packet);
            return Placement::Processed;
        }

        self.prepared.add(packet);
        Placement::Prepared
    }

    /// Dispatch the oldest prepared utterance.
    pub fn dequeue(&mut self) -> Option<&Utterance> {
        let key = self.prepared.front()?.id().to_string();
        self.dequeue_utterance(&key)
    }

    /// Dispatch a specific prepared utterance: it moves to `processed` and
    /// becomes the current utterance.
    pub fn dequeue_utterance(&mut self, utterance_id: &str) -> Option<&Utterance> {
        let utterance = self.prepared.remove(utterance_id, true)?;
        self.processed.enqueue(utterance);
        self.current_utterance = Some(utterance_id.to_string());
        self.processed.get(utterance_id)
    }

    /// Mark the current utterance played and clear the pointer.
    pub fn finish_current(&mut self) -> Option<&Utterance> {
        let id = self.current_utterance.take()?;
        let utterance = self.processed.get_mut(&id)?;
        utterance.mark_played();
        Some(utterance)
    }

    /// Move an utterance straight to `processed` as already played. Used for
    /// the player's own lines, which are never paced.
    pub fn record_played(&mut self, utterance_id: &str) -> bool {
        if let Some(utterance) = self.prepared.remove(utterance_id, true) {
            self.processed.enqueue(utterance);
        }
        match self.processed.get_mut(utterance_id) {
            Some(utterance) => {
                utterance.mark_played();
                true
            }
            None => false,
        }
    }

    /// Discard pending content. A hard cancel also drops the utterance that
    /// is presenting; a soft cancel lets it finish.
    pub fn cancel(&mut self, hard: bool) {
        if hard {
            if let Some(id) = self.current_utterance.take() {
                if let Some(mut utterance) = self.processed.remove(&id, false) {
                    utterance.clear();
                    self.cancelled.enqueue(utterance);
                }
            }
        }
        let poured = self.prepared.pour_to(&mut self.cancelled);
        if let Err(e) = self.transition(InteractionStatus::Cancelled) {
            tracing::debug!(interaction_id = %self.id, error = %e, "Cancel on settled interaction");
        }
        tracing::debug!(interaction_id = %self.id, hard, poured, "Interaction cancelled");
    }

    /// Ids of the presenting utterance and everything still prepared.
    pub fn pending_utterance_ids(&self) -> Vec<String> {
        self.current_utterance
            .iter()
            .cloned()
            .chain(self.prepared.iter().map(|u| u.id().to_string()))
            .collect()
    }

    pub fn transition(&mut self, target: InteractionStatus) -> Result<(), PlaybackError> {
        if !self.status.can_transition_to(&target) {
            return Err(PlaybackError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        tracing::debug!(interaction_id = %self.id, "Interaction status: {} -> {}", self.status, target);
        self.status = target;
        Ok(())
    }

    /// Nothing prepared and nothing left in the current utterance.
    pub fn is_empty(&self) -> bool {
        self.prepared.is_empty() && self.current_utterance().map_or(true, Utterance::is_empty)
    }

    /// Prepared utterances still hold text or audio.
    pub fn has_pending_content(&self) -> bool {
        self.prepared.iter().any(Utterance::has_content)
    }

    /// Played utterances with something to show, oldest first.
    pub fn history_items(&self) -> Vec<HistoryItem> {
        self.processed
            .iter()
            .filter(|u| u.is_played() && (u.has_text() || u.content_length() > 0))
            .map(Utterance::to_history_item)
            .collect()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn status(&self) -> InteractionStatus {
        self.status
    }

    pub fn received_interaction_end(&self) -> bool {
        self.received_interaction_end
    }

    pub fn is_interruptible(&self) -> bool {
        self.interruptible
    }

    pub fn current_utterance(&self) -> Option<&Utterance> {
        self.processed.get(self.current_utterance.as_deref()?)
    }

    pub fn prepared(&self) -> &OrderedContainer<Utterance> {
        &self.prepared
    }

    pub fn prepared_utterance_mut(&mut self, utterance_id: &str) -> Option<&mut Utterance> {
        self.prepared.get_mut(utterance_id)
    }

    pub fn processed(&self) -> &OrderedContainer<Utterance> {
        &self.processed
    }

    pub fn cancelled(&self) -> &OrderedContainer<Utterance> {
        &self.cancelled
    }

    /// Whether this exact packet id was already recorded, in any container.
    pub fn has_packet(&self, packet: &Packet) -> bool {
        self.utterance(packet.utterance_id())
            .map_or(false, |u| u.contains_packet(packet.id()))
    }

    /// Look an utterance up in any container.
    pub fn utterance(&self, utterance_id: &str) -> Option<&Utterance> {
        self.prepared
            .get(utterance_id)
            .or_else(|| self.processed.get(utterance_id))
            .or_else(|| self.cancelled.get(utterance_id))
    }

    fn mark_last_content_final(&mut self) {
        let last = self
            .prepared
            .iter()
            .rev()
            .find(|u| u.has_content())
            .map(|u| u.id().to_string());
        let target = match last {
            Some(id) => self.prepared.get_mut(&id),
            None => {
                let id = self
                    .processed
                    .iter()
                    .rev()
                    .find(|u| u.has_content())
                    .map(|u| u.id().to_string());
                match id {
                    Some(id) => self.processed.get_mut(&id),
                    None => None,
                }
            }
        };
        if let Some(utterance) = target {
            utterance.set_final(true);
        }
    }
}

impl Containable for Interaction {
    fn key(&self) -> &str {
        &self.id
    }

    fn recent_time(&self) -> Timestamp {
        self.recent_time
    }

    fn matches(&self, packet: &Packet) -> bool {
        packet.interaction_id() == self.id
    }

    fn absorb(&mut self, packet: Packet) {
        self.add(packet);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, audio, emotion, end, text, uninterruptible};

    fn interaction() -> Interaction {
        Interaction::new("i1", 1, at(0))
    }

    #[test]
    fn test_new_interaction() {
        let i = interaction();
        assert_eq!(i.id(), "i1");
        assert_eq!(i.sequence_number(), 1);
        assert_eq!(i.status(), InteractionStatus::Created);
        assert!(i.is_interruptible());
        assert!(!i.received_interaction_end());
        assert!(i.is_empty());
    }

    #[test]
    fn test_content_goes_to_prepared_and_merges() {
        let mut i = interaction();
        assert_eq!(i.add(text("p1", "u1", "i1", 1, "Hi")), Placement::Prepared);
        assert_eq!(i.add(audio("p2", "u1", "i1", 2, 1.0)), Placement::Prepared);
        assert_eq!(i.prepared().len(), 1);
        assert_eq!(i.prepared().front().unwrap().len(), 2);
        assert!(i.has_pending_content());
    }

    #[test]
    fn test_rejects_other_interactions() {
        let mut i = interaction();
        assert_eq!(i.add(text("p1", "u1", "i2", 1, "Hi")), Placement::Rejected);
        assert_eq!(i.add(text("", "u1", "i1", 1, "Hi")), Placement::Rejected);
        assert!(i.is_empty());
    }

    #[test]
    fn test_dequeue_moves_to_processed_and_sets_current() {
        let mut i = interaction();
        i.add(text("p1", "u1", "i1", 1, "a"));
        i.add(text("p2", "u2", "i1", 2, "b"));

        let u = i.dequeue().unwrap();
        assert_eq!(u.id(), "u1");
        assert!(u.has_left_prepared());
        assert_eq!(i.current_utterance().unwrap().id(), "u1");
        assert!(i.processed().contains_key("u1"));
        assert!(!i.prepared().contains_key("u1"));

        let finished = i.finish_current().unwrap();
        assert!(finished.is_played());
        assert!(i.current_utterance().is_none());
        assert!(i.finish_current().is_none());
    }

    #[test]
    fn test_dequeue_utterance_by_id() {
        let mut i = interaction();
        i.add(text("p1", "u1", "i1", 1, "a"));
        i.add(text("p2", "u2", "i1", 2, "b"));
        assert_eq!(i.dequeue_utterance("u2").unwrap().id(), "u2");
        assert!(i.dequeue_utterance("u2").is_none());
        assert_eq!(i.prepared().front().unwrap().id(), "u1");
    }

    #[test]
    fn test_packets_for_current_utterance_append_to_it() {
        let mut i = interaction();
        i.add(text("p1", "u1", "i1", 1, "a"));
        i.dequeue();
        assert_eq!(i.add(audio("p2", "u1", "i1", 2, 1.0)), Placement::Current);
        assert_eq!(i.current_utterance().unwrap().len(), 2);
    }

    #[test]
    fn test_packets_for_dispatched_utterance_go_to_processed() {
        let mut i = interaction();
        i.add(text("p1", "u1", "i1", 1, "a"));
        i.dequeue();
        i.finish_current();
        assert_eq!(i.add(audio("p2", "u1", "i1", 2, 1.0)), Placement::Processed);
        assert!(i.prepared().is_empty());
    }

    #[test]
    fn test_overdue_packet_is_not_played() {
        let mut i = interaction();
        i.add(text("p1", "u1", "i1", 5, "a"));
        i.dequeue();
        assert_eq!(i.add(text("p2", "u2", "i1", 3, "stale")), Placement::Processed);
        assert!(i.prepared().is_empty());
        assert!(i.processed().contains_key("u2"));
    }

    #[test]
    fn test_late_packet_for_prepared_utterance_joins_it() {
        let mut i = interaction();
        i.add(text("p1", "u1", "i1", 5, "a"));
        i.add(text("p2", "u2", "i1", 3, "b"));
        i.dequeue_utterance("u1");
        assert_eq!(i.add(audio("p3", "u2", "i1", 4, 1.0)), Placement::Prepared);
        assert_eq!(i.utterance("u2").unwrap().len(), 2);
        assert!(!i.processed().contains_key("u2"));
    }

    #[test]
    fn test_interaction_end_sets_flag_and_final() {
        let mut i = interaction();
        i.add(text("p1", "u1", "i1", 1, "a"));
        i.add(text("p2", "u2", "i1", 2, "b"));
        assert_eq!(i.add(end("p3", "u9", "i1", 3)), Placement::Processed);
        assert!(i.received_interaction_end());
        assert!(i.utterance("u2").unwrap().is_final());
        assert!(!i.utterance("u1").unwrap().is_final());
    }

    #[test]
    fn test_has_packet_across_containers() {
        let mut i = interaction();
        let first = text("p1", "u1", "i1", 1, "a");
        let second = emotion("p2", "u2", "i1", 2);
        assert!(!i.has_packet(&first));

        i.add(first.clone());
        i.add(second.clone());
        i.dequeue();
        assert!(i.has_packet(&first));
        assert!(i.has_packet(&second));
        assert!(!i.has_packet(&text("p3", "u1", "i1", 3, "b")));
    }

    #[test]
    fn test_uninterruptible_trigger() {
        let mut i = interaction();
        i.add(uninterruptible("p1", "u1", "i1", 1));
        assert!(!i.is_interruptible());
    }

    #[test]
    fn test_hard_cancel_discards_everything_pending() {
        let mut i = interaction();
        i.add(text("p1", "u1", "i1", 1, "a"));
        i.add(text("p2", "u2", "i1", 2, "b"));
        i.add(text("p3", "u3", "i1", 3, "c"));
        i.dequeue();
        i.transition(InteractionStatus::Started).unwrap();

        assert_eq!(i.pending_utterance_ids(), vec!["u1", "u2", "u3"]);
        i.cancel(true);

        assert_eq!(i.status(), InteractionStatus::Cancelled);
        assert!(i.prepared().is_empty());
        assert!(i.current_utterance().is_none());
        assert!(i.is_empty());
        let cancelled: Vec<&str> = i.cancelled().iter().map(|u| u.id()).collect();
        assert_eq!(cancelled, vec!["u1", "u2", "u3"]);
        assert!(i.cancelled().get("u1").unwrap().is_empty());
        assert!(i.cancelled().iter().skip(1).all(|u| u.has_left_prepared()));
    }

    #[test]
    fn test_soft_cancel_keeps_current() {
        let mut i = interaction();
        i.add(text("p1", "u1", "i1", 1, "a"));
        i.add(text("p2", "u2", "i1", 2, "b"));
        i.dequeue();
        i.cancel(false);

        assert_eq!(i.status(), InteractionStatus::Cancelled);
        assert_eq!(i.current_utterance().unwrap().id(), "u1");
        assert!(i.prepared().is_empty());
        assert_eq!(i.cancelled().len(), 1);
    }

    #[test]
    fn test_packets_after_cancel_are_discarded() {
        let mut i = interaction();
        i.cancel(true);
        assert_eq!(i.add(text("p1", "u1", "i1", 1, "late")), Placement::Cancelled);
        assert!(i.prepared().is_empty());
        assert!(i.cancelled().contains_key("u1"));
    }

    #[test]
    fn test_record_played() {
        let mut i = interaction();
        i.add(text("p1", "u1", "i1", 1, "player line"));
        assert!(i.record_played("u1"));
        assert!(i.prepared().is_empty());
        assert!(i.utterance("u1").unwrap().is_played());
        assert!(i.current_utterance().is_none());
        assert!(!i.record_played("missing"));
    }

    #[test]
    fn test_history_items_only_played_content() {
        let mut i = interaction();
        i.add(emotion("p0", "u0", "i1", 0));
        i.add(text("p1", "u1", "i1", 1, "a"));
        i.add(text("p2", "u2", "i1", 2, "b"));
        i.record_played("u0");
        i.dequeue_utterance("u1");
        i.finish_current();
        i.dequeue_utterance("u2");

        let items = i.history_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].utterance_id, "u1");
        assert_eq!(items[0].text.as_deref(), Some("a"));
    }

    #[test]
    fn test_invalid_transition_reports_both_states() {
        let mut i = interaction();
        i.transition(InteractionStatus::Completed).unwrap();
        match i.transition(InteractionStatus::Started) {
            Err(PlaybackError::InvalidTransition { from, to }) => {
                assert_eq!(from, InteractionStatus::Completed);
                assert_eq!(to, InteractionStatus::Started);
            }
            other => panic!("expected invalid transition, got {:?}", other),
        }
    }

    #[test]
    fn test_containable_matches_by_interaction() {
        let mut i = interaction();
        assert!(i.matches(&text("p1", "u1", "i1", 1, "a")));
        assert!(!i.matches(&text("p1", "u1", "i2", 1, "a")));
        i.absorb(text("p1", "u1", "i1", 7, "a"));
        assert_eq!(Containable::recent_time(&i), at(7));
    }
}
