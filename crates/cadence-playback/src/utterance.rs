//! One coherent unit of character output: the text, audio and side-channel
//! packets that share an utterance id.

use std::collections::HashMap;

use cadence_core::{HistoryItem, Packet, PacketKind, Role, Timestamp};

use crate::container::Containable;

/// Packets sharing one utterance id, in arrival order.
///
/// A packet id delivered twice replaces the earlier copy in place, so
/// re-delivery never duplicates content.
#[derive(Debug, Clone)]
pub struct Utterance {
    id: String,
    interaction_id: String,
    role: Role,
    speaker_id: String,
    recent_time: Timestamp,
    packets: Vec<Packet>,
    by_packet_id: HashMap<String, usize>,
    played: bool,
    is_final: bool,
    scheduled: bool,
    left_prepared: bool,
}

impl Utterance {
    /// Seed an utterance from its first packet.
    pub fn new(packet: Packet) -> Self {
        let mut utterance = Self {
            id: packet.utterance_id().to_string(),
            interaction_id: packet.interaction_id().to_string(),
            role: packet.routing.source.role,
            speaker_id: packet.routing.source.id.clone(),
            recent_time: packet.timestamp,
            packets: Vec::new(),
            by_packet_id: HashMap::new(),
            played: false,
            is_final: false,
            scheduled: false,
            left_prepared: false,
        };
        utterance.add(packet);
        utterance
    }

    /// Store `packet`, replacing any earlier packet with the same id.
    ///
    /// Returns false (and drops the packet) when it belongs to another utterance.
    pub fn add(&mut self, packet: Packet) -> bool {
        if packet.utterance_id() != self.id {
            tracing::trace!(
                utterance_id = %self.id,
                packet = %packet.packet_id,
                "Rejecting packet for a different utterance"
            );
            return false;
        }
        if packet.timestamp > self.recent_time {
            self.recent_time = packet.timestamp;
        }
        match self.by_packet_id.get(packet.id()) {
            Some(&index) => self.packets[index] = packet,
            None => {
                self.by_packet_id
                    .insert(packet.id().to_string(), self.packets.len());
                self.packets.push(packet);
            }
        }
        true
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn interaction_id(&self) -> &str {
        &self.interaction_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn speaker_id(&self) -> &str {
        &self.speaker_id
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// Text and audio packets in arrival order. Side-channel packets are
    /// delivered on arrival and are not repeated here.
    pub fn content_packets(&self) -> Vec<Packet> {
        self.packets.iter().filter(|p| p.is_content()).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn contains_packet(&self, packet_id: &str) -> bool {
        self.by_packet_id.contains_key(packet_id)
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn has_kind(&self, kind: PacketKind) -> bool {
        self.packets.iter().any(|p| p.kind() == kind)
    }

    pub fn has_text(&self) -> bool {
        self.has_kind(PacketKind::Text)
    }

    pub fn has_audio(&self) -> bool {
        self.has_kind(PacketKind::Audio)
    }

    /// Holds text or audio.
    pub fn has_content(&self) -> bool {
        self.packets.iter().any(Packet::is_content)
    }

    /// Characters driving text pacing: the first text packet, else the first
    /// narrated action.
    pub fn content_length(&self) -> usize {
        self.packets
            .iter()
            .find(|p| p.kind() == PacketKind::Text)
            .or_else(|| self.packets.iter().find(|p| p.kind() == PacketKind::Action))
            .map_or(0, Packet::content_length)
    }

    /// Combined duration of every audio chunk, `None` without audio.
    pub fn audio_duration(&self) -> Option<f64> {
        self.packets
            .iter()
            .filter_map(Packet::audio_duration)
            .fold(None, |total, d| Some(total.unwrap_or(0.0) + d))
    }

    /// Text packets joined in arrival order.
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self.packets.iter().filter_map(Packet::text).collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.concat())
        }
    }

    pub fn recent_time(&self) -> Timestamp {
        self.recent_time
    }

    pub fn is_played(&self) -> bool {
        self.played
    }

    pub fn mark_played(&mut self) {
        self.played = true;
    }

    pub fn is_final(&self) -> bool {
        self.is_final
    }

    pub fn set_final(&mut self, is_final: bool) {
        self.is_final = is_final;
    }

    /// Whether a playback reference to this utterance has been queued.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn mark_scheduled(&mut self) {
        self.scheduled = true;
    }

    /// Whether the utterance has been released from its prepared queue.
    pub fn has_left_prepared(&self) -> bool {
        self.left_prepared
    }

    /// Drop every packet. Used when a hard cancel discards unplayed content.
    pub fn clear(&mut self) {
        self.packets.clear();
        self.by_packet_id.clear();
    }

    pub fn to_history_item(&self) -> HistoryItem {
        HistoryItem {
            interaction_id: self.interaction_id.clone(),
            utterance_id: self.id.clone(),
            role: self.role,
            speaker_id: self.speaker_id.clone(),
            text: self.text(),
            is_final: self.is_final,
            recent_time: self.recent_time,
        }
    }
}

impl From<Packet> for Utterance {
    fn from(packet: Packet) -> Self {
        Self::new(packet)
    }
}

impl Containable for Utterance {
    fn key(&self) -> &str {
        &self.id
    }

    fn recent_time(&self) -> Timestamp {
        self.recent_time
    }

    fn matches(&self, packet: &Packet) -> bool {
        packet.utterance_id() == self.id
    }

    fn absorb(&mut self, packet: Packet) {
        self.add(packet);
    }

    fn on_dequeue(&mut self) {
        self.left_prepared = true;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, audio, emotion, player_text, text, CHARACTER};
    use cadence_core::PacketPayload;

    #[test]
    fn test_new_takes_identity_from_first_packet() {
        let u = Utterance::new(text("p1", "u1", "i1", 3, "Hello"));
        assert_eq!(u.id(), "u1");
        assert_eq!(u.interaction_id(), "i1");
        assert_eq!(u.role(), Role::Agent);
        assert_eq!(u.speaker_id(), CHARACTER);
        assert_eq!(u.recent_time(), at(3));
        assert_eq!(u.len(), 1);
        assert!(!u.is_played());
        assert!(!u.is_scheduled());
    }

    #[test]
    fn test_redelivery_replaces_in_place() {
        let mut u = Utterance::new(text("p1", "u1", "i1", 1, "Hel"));
        u.add(audio("p2", "u1", "i1", 2, 1.5));
        assert!(u.add(text("p1", "u1", "i1", 3, "Hello")));

        assert_eq!(u.len(), 2);
        assert!(u.contains_packet("p1"));
        assert!(!u.contains_packet("p3"));
        assert_eq!(u.packets()[0].text(), Some("Hello"));
        assert_eq!(u.packets()[1].kind(), PacketKind::Audio);
        assert_eq!(u.recent_time(), at(3));
    }

    #[test]
    fn test_rejects_foreign_utterance_id() {
        let mut u = Utterance::new(text("p1", "u1", "i1", 1, "a"));
        assert!(!u.add(text("p2", "u2", "i1", 2, "b")));
        assert_eq!(u.len(), 1);
        assert_eq!(u.recent_time(), at(1));
    }

    #[test]
    fn test_content_queries() {
        let mut u = Utterance::new(emotion("p0", "u1", "i1", 0));
        assert!(!u.has_content());
        assert_eq!(u.content_length(), 0);
        assert_eq!(u.audio_duration(), None);
        assert_eq!(u.text(), None);

        u.add(text("p1", "u1", "i1", 1, "héllo"));
        u.add(audio("p2", "u1", "i1", 1, 0.75));
        u.add(audio("p3", "u1", "i1", 1, 0.25));
        assert!(u.has_content());
        assert!(u.has_text());
        assert!(u.has_audio());
        assert_eq!(u.content_length(), 5);
        assert_eq!(u.audio_duration(), Some(1.0));
        assert_eq!(u.text().as_deref(), Some("héllo"));
        assert_eq!(u.content_packets().len(), 3);
        assert_eq!(u.len(), 4);
    }

    #[test]
    fn test_content_length_falls_back_to_action() {
        let mut action = emotion("p1", "u1", "i1", 0);
        action.payload = PacketPayload::Action {
            narrated: "shrugs".to_string(),
        };
        let u = Utterance::new(action);
        assert_eq!(u.content_length(), 6);
        assert!(!u.has_content());
    }

    #[test]
    fn test_clear_keeps_identity() {
        let mut u = Utterance::new(text("p1", "u1", "i1", 1, "a"));
        u.clear();
        assert!(u.is_empty());
        assert_eq!(u.id(), "u1");
        // Cleared utterances still accept late packets.
        assert!(u.add(text("p1", "u1", "i1", 2, "b")));
        assert_eq!(u.len(), 1);
    }

    #[test]
    fn test_history_item_for_player() {
        let mut u = Utterance::new(player_text("p1", "u1", "i1", 4, "hi"));
        u.set_final(true);
        let item = u.to_history_item();
        assert_eq!(item.role, Role::Player);
        assert_eq!(item.speaker_id, "player");
        assert_eq!(item.text.as_deref(), Some("hi"));
        assert!(item.is_final);
        assert_eq!(item.recent_time, at(4));
    }

    #[test]
    fn test_dequeue_hook_marks_release() {
        let mut u = Utterance::new(text("p1", "u1", "i1", 1, "a"));
        assert!(!u.has_left_prepared());
        u.on_dequeue();
        assert!(u.has_left_prepared());
    }
}
