use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// UTC instant attached to every packet. RFC 3339 on the wire.
pub type Timestamp = DateTime<Utc>;

// =============================================================================
// Routing
// =============================================================================

/// Which side of the conversation an endpoint speaks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The human user (or the client acting on their behalf).
    Player,
    /// A remote character.
    Agent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Player => write!(f, "player"),
            Role::Agent => write!(f, "agent"),
        }
    }
}

/// One end of a packet's route.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub role: Role,
}

impl Endpoint {
    pub fn player(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Player,
        }
    }

    pub fn agent(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Agent,
        }
    }
}

/// Source and target of a packet.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Routing {
    pub source: Endpoint,
    pub target: Endpoint,
}

impl Routing {
    pub fn new(source: Endpoint, target: Endpoint) -> Self {
        Self { source, target }
    }

    /// Whether either end of the route is `id`.
    pub fn involves(&self, id: &str) -> bool {
        !id.is_empty() && (self.source.id == id || self.target.id == id)
    }
}

/// Compound identifier assigned by the remote peer.
///
/// Missing fields deserialize as empty strings so that malformed packets can
/// still be parsed and then dropped by the engine instead of failing the feed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PacketId {
    #[serde(default)]
    pub packet_id: String,
    #[serde(default)]
    pub utterance_id: String,
    #[serde(default)]
    pub interaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl PacketId {
    pub fn new(
        packet_id: impl Into<String>,
        utterance_id: impl Into<String>,
        interaction_id: impl Into<String>,
    ) -> Self {
        Self {
            packet_id: packet_id.into(),
            utterance_id: utterance_id.into(),
            interaction_id: interaction_id.into(),
            correlation_id: None,
        }
    }

    /// Generate a fresh identifier for a locally originated packet.
    pub fn generate() -> Self {
        Self::new(
            Uuid::new_v4().to_string(),
            Uuid::new_v4().to_string(),
            Uuid::new_v4().to_string(),
        )
    }

    /// All three mandatory ids are present.
    pub fn is_complete(&self) -> bool {
        !self.packet_id.is_empty() && !self.utterance_id.is_empty() && !self.interaction_id.is_empty()
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "I: {} U: {} P: {}",
            self.interaction_id, self.utterance_id, self.packet_id
        )
    }
}

// =============================================================================
// Payloads
// =============================================================================

/// Control signals carried by `control` packets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    AudioSessionStart,
    AudioSessionEnd,
    /// The server has sent every text response for the interaction.
    InteractionEnd,
    TtsPlaybackStart,
    TtsPlaybackEnd,
    TtsPlaybackMute,
    TtsPlaybackUnmute,
    Warning,
    #[serde(other)]
    Unknown,
}

/// Name/value pair attached to a custom trigger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerParameter {
    pub name: String,
    pub value: String,
}

/// Session mutations, both inbound acknowledgements and outbound requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    CancelResponses {
        interaction_id: String,
        #[serde(default)]
        utterance_ids: Vec<String>,
    },
    RegenerateResponse {
        interaction_id: String,
    },
    ApplyResponse {
        packet_id: PacketId,
    },
}

/// Custom trigger name that pins an interaction as not cancellable.
pub const UNINTERRUPTIBLE_TRIGGER: &str = "uninterruptible";

/// The typed body of a packet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PacketPayload {
    Text {
        text: String,
        #[serde(default, rename = "final")]
        is_final: bool,
    },
    Audio {
        /// Encoded audio, opaque to this crate.
        #[serde(default)]
        chunk: String,
        #[serde(default)]
        duration_secs: f64,
    },
    Control {
        action: ControlAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Custom {
        name: String,
        #[serde(default)]
        parameters: Vec<TriggerParameter>,
    },
    Emotion {
        behavior: String,
        #[serde(default)]
        strength: String,
    },
    Action {
        narrated: String,
    },
    Mutation {
        mutation: Mutation,
    },
}

/// Discriminant of [`PacketPayload`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketKind {
    Text,
    Audio,
    Control,
    Custom,
    Emotion,
    Action,
    Mutation,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketKind::Text => "text",
            PacketKind::Audio => "audio",
            PacketKind::Control => "control",
            PacketKind::Custom => "custom",
            PacketKind::Emotion => "emotion",
            PacketKind::Action => "action",
            PacketKind::Mutation => "mutation",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Packet
// =============================================================================

/// One inbound or outbound protocol message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub timestamp: Timestamp,
    pub routing: Routing,
    #[serde(default)]
    pub packet_id: PacketId,
    #[serde(flatten)]
    pub payload: PacketPayload,
}

impl Packet {
    pub fn new(
        timestamp: Timestamp,
        routing: Routing,
        packet_id: PacketId,
        payload: PacketPayload,
    ) -> Self {
        Self {
            timestamp,
            routing,
            packet_id,
            payload,
        }
    }

    /// Build the upstream request asking the service to stop generating
    /// responses for `interaction_id`.
    pub fn cancel_responses(
        routing: Routing,
        interaction_id: impl Into<String>,
        utterance_ids: Vec<String>,
    ) -> Self {
        Self::new(
            Utc::now(),
            routing,
            PacketId::generate(),
            PacketPayload::Mutation {
                mutation: Mutation::CancelResponses {
                    interaction_id: interaction_id.into(),
                    utterance_ids,
                },
            },
        )
    }

    pub fn kind(&self) -> PacketKind {
        match self.payload {
            PacketPayload::Text { .. } => PacketKind::Text,
            PacketPayload::Audio { .. } => PacketKind::Audio,
            PacketPayload::Control { .. } => PacketKind::Control,
            PacketPayload::Custom { .. } => PacketKind::Custom,
            PacketPayload::Emotion { .. } => PacketKind::Emotion,
            PacketPayload::Action { .. } => PacketKind::Action,
            PacketPayload::Mutation { .. } => PacketKind::Mutation,
        }
    }

    /// A packet is usable only when it carries every id the engine keys on.
    pub fn is_well_formed(&self) -> bool {
        self.packet_id.is_complete()
    }

    pub fn interaction_id(&self) -> &str {
        &self.packet_id.interaction_id
    }

    pub fn utterance_id(&self) -> &str {
        &self.packet_id.utterance_id
    }

    pub fn id(&self) -> &str {
        &self.packet_id.packet_id
    }

    pub fn is_from_player(&self) -> bool {
        self.routing.source.role == Role::Player
    }

    /// Text or audio: the packets that take part in paced playback.
    pub fn is_content(&self) -> bool {
        matches!(self.kind(), PacketKind::Text | PacketKind::Audio)
    }

    pub fn is_interaction_end(&self) -> bool {
        matches!(
            self.payload,
            PacketPayload::Control {
                action: ControlAction::InteractionEnd,
                ..
            }
        )
    }

    pub fn is_uninterruptible_trigger(&self) -> bool {
        matches!(&self.payload, PacketPayload::Custom { name, .. } if name == UNINTERRUPTIBLE_TRIGGER)
    }

    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            PacketPayload::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn audio_duration(&self) -> Option<f64> {
        match self.payload {
            PacketPayload::Audio { duration_secs, .. } => Some(duration_secs.max(0.0)),
            _ => None,
        }
    }

    /// Number of characters that drive text pacing.
    pub fn content_length(&self) -> usize {
        match &self.payload {
            PacketPayload::Text { text, .. } => text.chars().count(),
            PacketPayload::Action { narrated } => narrated.chars().count(),
            _ => 0,
        }
    }
}

// =============================================================================
// History
// =============================================================================

/// One presented utterance as exposed to UI consumers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub interaction_id: String,
    pub utterance_id: String,
    pub role: Role,
    pub speaker_id: String,
    pub text: Option<String>,
    pub is_final: bool,
    pub recent_time: Timestamp,
}
