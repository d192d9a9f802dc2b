//! Cadence application binary - composition root.
//!
//! Replays a recorded packet script through the playback engine:
//! 1. Load configuration from TOML and apply CLI overrides
//! 2. Spawn a producer task that pushes script packets into the feed
//! 3. Drive the session tracker from a fixed-interval tick loop
//! 4. Print every playback event until the script is exhausted and idle
//!
//! With `auto_proceed` off, each line read from stdin releases one utterance.

mod cli;
mod script;

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;

use cadence_core::config::{CadenceConfig, PacingMode};
use cadence_core::{Packet, PlaybackEvent};
use cadence_playback::{
    packet_feed, PacingStrategy, PacketSender, PlaybackError, PlaybackPacer, SessionTracker,
};

use crate::cli::CliArgs;
use crate::script::{load_script, ScriptEntry};

/// Push script packets into the feed, honouring each entry's delay.
async fn producer_loop(entries: Vec<ScriptEntry>, sender: PacketSender) {
    tracing::info!(packets = entries.len(), "Producer started");
    for entry in entries {
        if entry.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(entry.delay_ms)).await;
        }
        if let Err(e) = sender.push(entry.packet) {
            tracing::warn!(error = %e, "Feed closed, stopping producer");
            return;
        }
    }
    tracing::info!("Producer finished");
}

/// Log outbound requests that would go to the character service.
async fn upstream_loop(mut receiver: mpsc::UnboundedReceiver<Packet>) {
    while let Some(packet) = receiver.recv().await {
        match serde_json::to_string(&packet) {
            Ok(json) => tracing::info!(packet = %json, "Upstream request"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize upstream packet"),
        }
    }
}

/// Forward one signal per line typed on stdin.
async fn continue_loop(sender: mpsc::UnboundedSender<()>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(_)) => {
                if sender.send(()).is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stdin");
                return;
            }
        }
    }
}

/// Print one event to stdout.
fn print_event(event: &PlaybackEvent, json: bool) -> Result<(), PlaybackError> {
    if json {
        let line = serde_json::to_string(event).map_err(cadence_core::CadenceError::from)?;
        println!("{}", line);
        return Ok(());
    }
    match event {
        PlaybackEvent::Dispatch { packets } => {
            for packet in packets {
                match (packet.text(), packet.audio_duration()) {
                    (Some(text), _) => println!("[{}] {}", packet.packet_id, text),
                    (None, Some(secs)) => println!("[{}] <audio {:.2}s>", packet.packet_id, secs),
                    _ => println!("[{}] <{}>", packet.packet_id, packet.kind()),
                }
            }
        }
        PlaybackEvent::SpeakingChanged { speaking } => println!("-- speaking: {}", speaking),
        PlaybackEvent::HistoryChanged { items } => println!("-- history: {} items", items.len()),
        other => println!("-- {}", other.event_name()),
    }
    Ok(())
}

/// When the media-paced tracker is playing audio, the instant it finishes.
#[derive(Clone, Default)]
struct MediaClock {
    finishes_at: Rc<RefCell<Option<Instant>>>,
}

impl MediaClock {
    fn on_event(&self, event: &PlaybackEvent) {
        if let Some(packets) = event.packets() {
            let secs: f64 = packets.iter().filter_map(Packet::audio_duration).sum();
            if secs > 0.0 {
                let duration = Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO);
                *self.finishes_at.borrow_mut() = Some(Instant::now() + duration);
            }
        }
    }

    /// True once, when the simulated audio has finished.
    fn take_finished(&self) -> bool {
        let mut finishes_at = self.finishes_at.borrow_mut();
        match *finishes_at {
            Some(at) if Instant::now() >= at => {
                *finishes_at = None;
                true
            }
            _ => false,
        }
    }
}

async fn run<P: PacingStrategy>(
    mut tracker: SessionTracker<P>,
    args: &CliArgs,
    tick_interval: Duration,
) {
    let clock = MediaClock::default();
    let json = args.json;
    tracker.subscribe(move |event: &PlaybackEvent| print_event(event, json));
    let media = clock.clone();
    tracker.subscribe(move |event: &PlaybackEvent| -> Result<(), PlaybackError> {
        media.on_event(event);
        Ok(())
    });

    let (upstream_tx, upstream_rx) = mpsc::unbounded_channel();
    tracker.set_upstream(upstream_tx);
    tokio::spawn(upstream_loop(upstream_rx));

    let cancel_at = args
        .cancel_after_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));
    let mut cancel_pending = cancel_at.is_some();

    let (continue_tx, mut continue_rx) = mpsc::unbounded_channel();
    if !tracker.config().auto_proceed {
        tracing::info!("Manual mode: press Enter to play the next utterance");
        tokio::spawn(continue_loop(continue_tx));
    }
    let mut release_pending = false;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut interval = tokio::time::interval(tick_interval);
    let mut last_tick = Instant::now();
    tracing::info!(tick_ms = tick_interval.as_millis() as u64, "Tick loop started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                let delta = now - last_tick;
                last_tick = now;

                if clock.take_finished() {
                    tracker.signal_media_finished();
                }
                if cancel_pending && cancel_at.map_or(false, |at| now >= at) {
                    cancel_pending = false;
                    let cancelled = tracker.cancel_response();
                    tracing::info!(cancelled, "Scheduled cancel fired");
                }

                if release_pending && tracker.is_waiting_for_continue() {
                    release_pending = false;
                    tracker.continue_playback();
                    tracker.tick(delta);
                    tracker.pause_playback();
                } else {
                    tracker.tick(delta);
                }

                if tracker.feed_closed() && tracker.is_idle() {
                    tracing::info!("Script exhausted and playback idle");
                    break;
                }
            }
            Some(()) = continue_rx.recv() => {
                release_pending = true;
            }
            _ = &mut ctrl_c => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    let history = tracker.history();
    tracing::info!(items = history.len(), "Playback finished");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = CadenceConfig::load_or_default(&config_file);
    args.apply_overrides(&mut config.playback);
    config.playback.validate()?;

    // Tracing.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    tracing::info!("Starting Cadence v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), pacing = ?config.playback.pacing, "Configuration resolved");

    // Script and feed.
    let entries = load_script(&args.script)?;
    let (sender, receiver) = packet_feed();
    tokio::spawn(producer_loop(entries, sender));

    let tick_interval = Duration::from_millis(config.playback.tick_interval_ms);
    match config.playback.pacing {
        PacingMode::Text => {
            let mut tracker = SessionTracker::new(config.playback.clone());
            tracker.bind_session(args.session.clone());
            tracker.attach_feed(receiver);
            run(tracker, &args, tick_interval).await;
        }
        PacingMode::Media => {
            let mut tracker = PlaybackPacer::media_paced(config.playback.clone());
            tracker.bind_session(args.session.clone());
            tracker.attach_feed(receiver);
            run(tracker, &args, tick_interval).await;
        }
    }

    Ok(())
}
