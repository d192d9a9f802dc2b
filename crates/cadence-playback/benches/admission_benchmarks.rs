//! Benchmarks for packet admission and pacing throughput.
//!
//! Admission runs on the tick thread, so a burst of packets arriving between
//! two frames has to be absorbed well inside one frame budget (~16ms).
//! These benchmarks feed realistic bursts through a text-paced tracker and
//! measure the cost of admitting them and of draining them through ticks.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use cadence_core::{
    ControlAction, Endpoint, Packet, PacketId, PacketPayload, PlaybackConfig, Routing,
};
use cadence_playback::SessionTracker;

const CHARACTER: &str = "char-1";

fn packet(index: usize, interaction: usize, payload: PacketPayload) -> Packet {
    Packet::new(
        Utc.timestamp_opt(1_700_000_000 + index as i64, 0).unwrap(),
        Routing::new(Endpoint::agent(CHARACTER), Endpoint::player("player")),
        PacketId::new(
            format!("p{}", index),
            format!("u{}", index / 2),
            format!("i{}", interaction),
        ),
        payload,
    )
}

/// `interactions` exchanges of `utterances` text+audio pairs each, closed by
/// an end marker.
fn generate_burst(interactions: usize, utterances: usize) -> Vec<Packet> {
    let mut packets = Vec::with_capacity(interactions * (utterances * 2 + 1));
    let mut index = 0;
    for i in 0..interactions {
        for _ in 0..utterances {
            packets.push(packet(
                index,
                i,
                PacketPayload::Text {
                    text: "The quick brown fox jumps over the lazy dog.".to_string(),
                    is_final: true,
                },
            ));
            index += 1;
            packets.push(packet(
                index,
                i,
                PacketPayload::Audio {
                    chunk: String::new(),
                    duration_secs: 1.2,
                },
            ));
            index += 1;
        }
        packets.push(packet(
            index,
            i,
            PacketPayload::Control {
                action: ControlAction::InteractionEnd,
                description: None,
            },
        ));
        index += 2;
    }
    packets
}

fn bound_tracker() -> SessionTracker {
    let mut tracker = SessionTracker::new(PlaybackConfig::default());
    tracker.bind_session(CHARACTER);
    tracker
}

fn bench_admission(c: &mut Criterion) {
    let small = generate_burst(1, 10);
    let large = generate_burst(20, 10);

    let mut group = c.benchmark_group("admission");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("single_interaction_burst", |b| {
        b.iter_batched(
            || (bound_tracker(), small.clone()),
            |(mut tracker, packets)| {
                for p in packets {
                    tracker.receive(p);
                }
                tracker
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("twenty_interaction_burst", |b| {
        b.iter_batched(
            || (bound_tracker(), large.clone()),
            |(mut tracker, packets)| {
                for p in packets {
                    tracker.receive(p);
                }
                tracker
            },
            BatchSize::SmallInput,
        );
    });

    // Redelivery of packets that already played.
    group.bench_function("duplicate_redelivery", |b| {
        b.iter_batched(
            || {
                let mut tracker = bound_tracker();
                for p in small.clone() {
                    tracker.receive(p);
                }
                for _ in 0..small.len() {
                    tracker.skip_current_utterance();
                    tracker.tick(Duration::from_millis(16));
                }
                (tracker, small.clone())
            },
            |(mut tracker, packets)| {
                for p in packets {
                    tracker.receive(p);
                }
                tracker
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_pacing(c: &mut Criterion) {
    let burst = generate_burst(20, 10);

    let mut group = c.benchmark_group("pacing");
    group.sample_size(50);

    group.bench_function("drain_twenty_interactions", |b| {
        b.iter_batched(
            || {
                let mut tracker = bound_tracker();
                for p in burst.clone() {
                    tracker.receive(p);
                }
                tracker
            },
            |mut tracker| {
                while !tracker.is_idle() {
                    tracker.skip_current_utterance();
                    tracker.tick(Duration::from_millis(16));
                }
                tracker
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_admission, bench_pacing);
criterion_main!(benches);
