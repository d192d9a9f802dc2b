//! Packet builders shared by the unit tests.

use chrono::{TimeZone, Utc};

use cadence_core::{
    ControlAction, Endpoint, Packet, PacketId, PacketPayload, Routing, Timestamp,
    UNINTERRUPTIBLE_TRIGGER,
};

pub const CHARACTER: &str = "char-1";

pub fn at(secs: i64) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn agent_packet(pid: &str, uid: &str, iid: &str, secs: i64, payload: PacketPayload) -> Packet {
    Packet::new(
        at(secs),
        Routing::new(Endpoint::agent(CHARACTER), Endpoint::player("player")),
        PacketId::new(pid, uid, iid),
        payload,
    )
}

pub fn text(pid: &str, uid: &str, iid: &str, secs: i64, body: &str) -> Packet {
    agent_packet(
        pid,
        uid,
        iid,
        secs,
        PacketPayload::Text {
            text: body.to_string(),
            is_final: true,
        },
    )
}

pub fn audio(pid: &str, uid: &str, iid: &str, secs: i64, duration_secs: f64) -> Packet {
    agent_packet(
        pid,
        uid,
        iid,
        secs,
        PacketPayload::Audio {
            chunk: String::new(),
            duration_secs,
        },
    )
}

pub fn emotion(pid: &str, uid: &str, iid: &str, secs: i64) -> Packet {
    agent_packet(
        pid,
        uid,
        iid,
        secs,
        PacketPayload::Emotion {
            behavior: "joy".to_string(),
            strength: "normal".to_string(),
        },
    )
}

pub fn end(pid: &str, uid: &str, iid: &str, secs: i64) -> Packet {
    agent_packet(
        pid,
        uid,
        iid,
        secs,
        PacketPayload::Control {
            action: ControlAction::InteractionEnd,
            description: None,
        },
    )
}

pub fn uninterruptible(pid: &str, uid: &str, iid: &str, secs: i64) -> Packet {
    agent_packet(
        pid,
        uid,
        iid,
        secs,
        PacketPayload::Custom {
            name: UNINTERRUPTIBLE_TRIGGER.to_string(),
            parameters: vec![],
        },
    )
}

pub fn player_text(pid: &str, uid: &str, iid: &str, secs: i64, body: &str) -> Packet {
    Packet::new(
        at(secs),
        Routing::new(Endpoint::player("player"), Endpoint::agent(CHARACTER)),
        PacketId::new(pid, uid, iid),
        PacketPayload::Text {
            text: body.to_string(),
            is_final: true,
        },
    )
}
