//! Session tracker: admits packets for the live session, keeps bounded
//! interaction history, and paces utterances out to listeners one at a time.
//!
//! Everything runs on the tick thread. Packets arrive either directly through
//! [`SessionTracker::receive`] or through an attached [`PacketReceiver`] that
//! is drained at the start of every [`SessionTracker::tick`].

use std::collections::VecDeque;
use std::time::Duration;

use cadence_core::{
    Endpoint, HistoryItem, Packet, PacketKind, PlaybackConfig, PlaybackEvent, Routing,
};

use crate::container::OrderedContainer;
use crate::feed::PacketReceiver;
use crate::interaction::{Interaction, Placement};
use crate::listener::{notify_all, PlaybackListener, UpstreamSink};
use crate::pacing::{MediaPacing, Pace, PacingStrategy, TextPacing};
use crate::state::InteractionStatus;

/// Tracker variant that waits for the presentation layer to report that
/// each utterance's audio finished.
pub type PlaybackPacer = SessionTracker<MediaPacing>;

/// Points at one prepared utterance awaiting dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtteranceRef {
    pub interaction_id: String,
    pub utterance_id: String,
    pub sequence_number: u64,
}

#[derive(Debug)]
struct InFlight {
    utterance: UtteranceRef,
    pace: Pace,
}

pub struct SessionTracker<P: PacingStrategy = TextPacing> {
    config: PlaybackConfig,
    strategy: P,
    live_session_id: Option<String>,
    history: OrderedContainer<Interaction>,
    queue: VecDeque<UtteranceRef>,
    current_interaction: Option<String>,
    in_flight: Option<InFlight>,
    next_sequence_number: u64,
    last_interaction_sequence_number: u64,
    media_finished: bool,
    continue_requested: bool,
    last_from_player: bool,
    speaking: bool,
    listeners: Vec<Box<dyn PlaybackListener>>,
    upstream: Option<Box<dyn UpstreamSink>>,
    feed: Option<PacketReceiver>,
}

impl SessionTracker<TextPacing> {
    /// Tracker that paces by estimated reading time.
    pub fn new(config: PlaybackConfig) -> Self {
        let strategy = TextPacing::from_config(&config);
        Self::with_strategy(strategy, config)
    }
}

impl SessionTracker<MediaPacing> {
    /// Tracker that plays an utterance only once both its text and audio
    /// arrived, and holds it until [`SessionTracker::signal_media_finished`].
    pub fn media_paced(config: PlaybackConfig) -> Self {
        Self::with_strategy(MediaPacing, config)
    }
}

impl<P: PacingStrategy> SessionTracker<P> {
    pub fn with_strategy(strategy: P, config: PlaybackConfig) -> Self {
        Self {
            config,
            strategy,
            live_session_id: None,
            history: OrderedContainer::new(),
            queue: VecDeque::new(),
            current_interaction: None,
            in_flight: None,
            next_sequence_number: 1,
            last_interaction_sequence_number: 0,
            media_finished: false,
            continue_requested: false,
            last_from_player: false,
            speaking: false,
            listeners: Vec::new(),
            upstream: None,
            feed: None,
        }
    }

    // -------------------------------------------------------------------------
    // Wiring
    // -------------------------------------------------------------------------

    /// Register a listener. Listeners are called in subscription order.
    pub fn subscribe(&mut self, listener: impl PlaybackListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn set_upstream(&mut self, sink: impl UpstreamSink + 'static) {
        self.upstream = Some(Box::new(sink));
    }

    /// Drain `receiver` at the start of every tick.
    pub fn attach_feed(&mut self, receiver: PacketReceiver) {
        self.feed = Some(receiver);
    }

    pub fn feed_closed(&self) -> bool {
        self.feed.as_ref().map_or(true, PacketReceiver::is_closed)
    }

    /// Bind to a live session. Interactions seen so far are superseded: they
    /// stay in history but none of them will play.
    pub fn bind_session(&mut self, session_id: impl Into<String>) {
        let session_id = session_id.into();
        tracing::info!(session_id = %session_id, "Binding live session");

        let superseded: Vec<String> = self
            .history
            .iter()
            .filter(|i| !i.status().is_terminal())
            .map(|i| i.id().to_string())
            .collect();
        for interaction_id in superseded {
            if let Some(interaction) = self.history.get_mut(&interaction_id) {
                let started = interaction.status() == InteractionStatus::Started;
                interaction.cancel(true);
                if started {
                    self.emit(PlaybackEvent::InteractionCancelled {
                        interaction_id,
                        hard: true,
                    });
                }
            }
        }

        self.live_session_id = Some(session_id);
        self.last_interaction_sequence_number = self.next_sequence_number.saturating_sub(1);
        self.queue.clear();
        self.current_interaction = None;
        self.in_flight = None;
        self.media_finished = false;
        self.last_from_player = false;
        self.set_speaking(false);
    }

    pub fn live_session_id(&self) -> Option<&str> {
        self.live_session_id.as_deref()
    }

    // -------------------------------------------------------------------------
    // Admission
    // -------------------------------------------------------------------------

    /// Whether `packet` belongs to the bound session.
    pub fn is_relevant(&self, packet: &Packet) -> bool {
        self.live_session_id
            .as_deref()
            .map_or(false, |id| packet.routing.involves(id))
    }

    /// Admit one packet.
    pub fn receive(&mut self, packet: Packet) {
        if !packet.is_well_formed() {
            tracing::trace!(packet = %packet.packet_id, "Dropping packet with missing ids");
            return;
        }
        if !self.is_relevant(&packet) {
            tracing::trace!(
                packet = %packet.packet_id,
                source = %packet.routing.source.id,
                "Dropping packet for another session"
            );
            return;
        }

        let interaction_id = packet.interaction_id().to_string();
        let utterance_id = packet.utterance_id().to_string();
        let kind = packet.kind();
        let is_end = packet.is_interaction_end();
        let from_player = packet.is_from_player();
        let is_content = packet.is_content();

        if !from_player {
            self.last_from_player = false;
        } else if kind != PacketKind::Audio {
            self.last_from_player = true;
        }

        if !self.history.contains_key(&interaction_id) {
            self.make_room();
            let sequence_number = self.next_sequence_number;
            self.next_sequence_number += 1;
            tracing::debug!(
                interaction_id = %interaction_id,
                sequence_number,
                "Tracking new interaction"
            );
            self.history.enqueue(Interaction::new(
                interaction_id.clone(),
                sequence_number,
                packet.timestamp,
            ));
        }

        let redelivered = self
            .history
            .get(&interaction_id)
            .map_or(false, |i| i.has_packet(&packet));
        let side_channel = if !redelivered && (from_player || (!is_end && !is_content)) {
            Some(packet.clone())
        } else {
            None
        };

        let placement = match self.history.get_mut(&interaction_id) {
            Some(interaction) => interaction.add(packet),
            None => return,
        };
        tracing::trace!(
            interaction_id = %interaction_id,
            utterance_id = %utterance_id,
            kind = %kind,
            ?placement,
            "Packet admitted"
        );
        if matches!(placement, Placement::Cancelled | Placement::Rejected) {
            return;
        }

        if is_end {
            self.evaluate_completion(&interaction_id);
            return;
        }

        if from_player {
            if let Some(interaction) = self.history.get_mut(&interaction_id) {
                interaction.record_played(&utterance_id);
            }
            if kind != PacketKind::Audio {
                if let Some(packet) = side_channel {
                    self.dispatch(vec![packet]);
                    self.emit_history_changed();
                }
            }
            return;
        }

        if let Some(packet) = side_channel {
            self.dispatch(vec![packet]);
            return;
        }

        if is_content && placement == Placement::Prepared {
            self.try_schedule(&interaction_id, &utterance_id);
        }
    }

    fn make_room(&mut self) {
        while self.history.len() >= self.config.max_history_size {
            let current = self.current_interaction.as_deref();
            let queue = &self.queue;
            let evicted = self.history.evict_first(|i| {
                i.status() != InteractionStatus::Started
                    && Some(i.id()) != current
                    && !queue.iter().any(|r| r.interaction_id == i.id())
            });
            match evicted {
                Some(interaction) => {
                    tracing::debug!(
                        interaction_id = %interaction.id(),
                        status = %interaction.status(),
                        "Evicted interaction from history"
                    );
                }
                None => {
                    tracing::debug!(
                        len = self.history.len(),
                        "History over capacity but every interaction is live"
                    );
                    break;
                }
            }
        }
    }

    fn accepts(&self, interaction: &Interaction) -> bool {
        self.current_interaction.as_deref() == Some(interaction.id())
            || interaction.sequence_number() > self.last_interaction_sequence_number
    }

    fn try_schedule(&mut self, interaction_id: &str, utterance_id: &str) {
        let sequence_number = match self.history.get(interaction_id) {
            Some(i) if !i.status().is_terminal() && self.accepts(i) => i.sequence_number(),
            _ => {
                tracing::trace!(
                    interaction_id,
                    utterance_id,
                    "Interaction superseded or settled; recorded only"
                );
                return;
            }
        };

        // The first accepted content makes an interaction current, even when
        // the strategy is still waiting for more of the utterance.
        if self.current_interaction.is_none() {
            self.current_interaction = Some(interaction_id.to_string());
            self.last_interaction_sequence_number =
                self.last_interaction_sequence_number.max(sequence_number);
            tracing::debug!(interaction_id, sequence_number, "Interaction is now current");
        }

        let Some(utterance) = self
            .history
            .get_mut(interaction_id)
            .and_then(|i| i.prepared_utterance_mut(utterance_id))
        else {
            return;
        };
        if utterance.is_scheduled() || !self.strategy.is_eligible(utterance) {
            return;
        }
        utterance.mark_scheduled();

        let position = self
            .queue
            .iter()
            .position(|r| r.sequence_number > sequence_number)
            .unwrap_or(self.queue.len());
        self.queue.insert(
            position,
            UtteranceRef {
                interaction_id: interaction_id.to_string(),
                utterance_id: utterance_id.to_string(),
                sequence_number,
            },
        );
        tracing::debug!(interaction_id, utterance_id, queued = self.queue.len(), "Utterance scheduled");
    }

    // -------------------------------------------------------------------------
    // Pacing
    // -------------------------------------------------------------------------

    /// Advance playback by `delta`.
    pub fn tick(&mut self, delta: Duration) {
        self.drain_feed();

        if let Some(active) = self.in_flight.as_mut() {
            let done = match &mut active.pace {
                Pace::Countdown(remaining) => {
                    *remaining = remaining.saturating_sub(delta);
                    remaining.is_zero()
                }
                Pace::AwaitSignal => self.media_finished,
            };
            if !done {
                return;
            }
            self.finish_in_flight();
        }

        self.start_next();
    }

    fn drain_feed(&mut self) {
        let Some(mut feed) = self.feed.take() else {
            return;
        };
        for packet in feed.drain() {
            self.receive(packet);
        }
        self.feed = Some(feed);
    }

    fn finish_in_flight(&mut self) {
        let Some(active) = self.in_flight.take() else {
            return;
        };
        self.media_finished = false;
        let interaction_id = active.utterance.interaction_id;
        if let Some(interaction) = self.history.get_mut(&interaction_id) {
            interaction.finish_current();
        }
        tracing::trace!(
            interaction_id = %interaction_id,
            utterance_id = %active.utterance.utterance_id,
            "Utterance played"
        );
        self.emit_history_changed();
        self.evaluate_completion(&interaction_id);
    }

    fn start_next(&mut self) {
        if !self.queue.is_empty() && !self.may_proceed() {
            tracing::trace!(queued = self.queue.len(), "Holding next utterance until continue");
            return;
        }
        while let Some(next) = self.queue.pop_front() {
            let Some(interaction) = self.history.get_mut(&next.interaction_id) else {
                continue;
            };
            if interaction.status().is_terminal() {
                continue;
            }
            let at_front = interaction
                .prepared()
                .front()
                .map_or(false, |u| u.id() == next.utterance_id);
            let dequeued = if at_front {
                interaction.dequeue()
            } else {
                interaction.dequeue_utterance(&next.utterance_id)
            };
            let Some(utterance) = dequeued else {
                continue;
            };
            let packets = utterance.content_packets();
            let pace = self.strategy.pace(utterance);
            let newly_started = interaction.status() == InteractionStatus::Created;
            if newly_started {
                if let Err(e) = interaction.transition(InteractionStatus::Started) {
                    tracing::warn!(interaction_id = %next.interaction_id, error = %e, "Could not start interaction");
                }
            }
            let sequence_number = interaction.sequence_number();

            self.current_interaction = Some(next.interaction_id.clone());
            self.last_interaction_sequence_number =
                self.last_interaction_sequence_number.max(sequence_number);
            self.media_finished = false;
            tracing::debug!(
                interaction_id = %next.interaction_id,
                utterance_id = %next.utterance_id,
                packets = packets.len(),
                ?pace,
                "Dispatching utterance"
            );
            let interaction_id = next.interaction_id.clone();
            self.in_flight = Some(InFlight {
                utterance: next,
                pace,
            });

            if newly_started {
                tracing::info!(interaction_id = %interaction_id, sequence_number, "Interaction started");
                self.emit(PlaybackEvent::InteractionStarted {
                    interaction_id,
                    sequence_number,
                });
            }
            self.set_speaking(true);
            self.dispatch(packets);
            return;
        }

        let presenting = self
            .current_interaction()
            .map_or(false, |i| i.status() == InteractionStatus::Started);
        if !presenting {
            self.set_speaking(false);
        }
    }

    /// Whether the next queued utterance may start. With `auto_proceed` off,
    /// a started interaction holds between its utterances until the consumer
    /// asks to continue; a player turn or an exhausted interaction never holds.
    fn may_proceed(&self) -> bool {
        self.config.auto_proceed
            || self.continue_requested
            || self.last_from_player
            || self
                .current_interaction()
                .map_or(true, |i| i.status() != InteractionStatus::Started || i.is_empty())
    }

    /// Let queued utterances start until [`SessionTracker::pause_playback`].
    pub fn continue_playback(&mut self) {
        self.continue_requested = true;
    }

    /// Hold between utterances again. Only matters with `auto_proceed` off.
    pub fn pause_playback(&mut self) {
        self.continue_requested = false;
    }

    /// An utterance is queued but held until [`SessionTracker::continue_playback`].
    pub fn is_waiting_for_continue(&self) -> bool {
        self.in_flight.is_none() && !self.queue.is_empty() && !self.may_proceed()
    }

    /// Report that the media for the in-flight utterance finished playing.
    pub fn signal_media_finished(&mut self) {
        if self.in_flight.is_some() {
            self.media_finished = true;
        }
    }

    /// Cut the in-flight utterance short; the next tick moves on.
    pub fn skip_current_utterance(&mut self) {
        if let Some(active) = self.in_flight.as_mut() {
            tracing::debug!(utterance_id = %active.utterance.utterance_id, "Skipping utterance");
            active.pace = Pace::Countdown(Duration::ZERO);
        }
    }

    fn evaluate_completion(&mut self, interaction_id: &str) {
        let queued = self.queue.iter().any(|r| r.interaction_id == interaction_id);
        let in_flight = self
            .in_flight
            .as_ref()
            .map_or(false, |a| a.utterance.interaction_id == interaction_id);
        let Some(interaction) = self.history.get(interaction_id) else {
            return;
        };
        let awaiting_content = self.accepts(interaction) && interaction.has_pending_content();
        if !interaction.received_interaction_end()
            || interaction.status().is_terminal()
            || interaction.current_utterance().is_some()
            || queued
            || in_flight
            || awaiting_content
        {
            return;
        }

        let Some(interaction) = self.history.get_mut(interaction_id) else {
            return;
        };
        if let Err(e) = interaction.transition(InteractionStatus::Completed) {
            tracing::warn!(interaction_id, error = %e, "Could not complete interaction");
            return;
        }
        tracing::info!(interaction_id, "Interaction completed");

        if self.current_interaction.as_deref() == Some(interaction_id) {
            self.current_interaction = None;
        }
        self.emit(PlaybackEvent::InteractionCompleted {
            interaction_id: interaction_id.to_string(),
        });
        if self.in_flight.is_none() && self.queue.is_empty() {
            self.set_speaking(false);
        }
    }

    // -------------------------------------------------------------------------
    // Cancellation
    // -------------------------------------------------------------------------

    /// Hard-cancel the current interaction. Returns whether anything was cancelled.
    pub fn cancel_response(&mut self) -> bool {
        self.cancel_response_with(true)
    }

    /// Cancel the current interaction. A soft cancel lets the utterance that
    /// is presenting finish and discards only what is still pending.
    pub fn cancel_response_with(&mut self, hard: bool) -> bool {
        let Some(session_id) = self.live_session_id.clone() else {
            return false;
        };
        if !self.config.interruptible {
            tracing::debug!("Cancel ignored: character is not interruptible");
            return false;
        }
        let Some(interaction_id) = self.current_interaction.clone() else {
            return false;
        };
        let Some(interaction) = self.history.get(&interaction_id) else {
            return false;
        };
        if !interaction.is_interruptible() || interaction.status().is_terminal() {
            tracing::debug!(interaction_id = %interaction_id, "Cancel ignored: interaction is not interruptible");
            return false;
        }

        let request = Packet::cancel_responses(
            Routing::new(
                Endpoint::player(self.config.player_id.clone()),
                Endpoint::agent(session_id),
            ),
            interaction_id.clone(),
            interaction.pending_utterance_ids(),
        );
        self.send_upstream(request);

        if let Some(interaction) = self.history.get_mut(&interaction_id) {
            interaction.cancel(hard);
        }
        self.queue.retain(|r| r.interaction_id != interaction_id);
        if hard
            && self
                .in_flight
                .as_ref()
                .map_or(false, |a| a.utterance.interaction_id == interaction_id)
        {
            self.in_flight = None;
            self.media_finished = false;
        }
        self.current_interaction = None;

        tracing::info!(interaction_id = %interaction_id, hard, "Interaction cancelled");
        self.emit(PlaybackEvent::InteractionCancelled {
            interaction_id,
            hard,
        });
        if self.in_flight.is_none() {
            self.set_speaking(false);
        }
        true
    }

    fn send_upstream(&mut self, packet: Packet) {
        match self.upstream.as_mut() {
            Some(sink) => {
                if let Err(e) = sink.send(packet) {
                    tracing::warn!(error = %e, "Failed to send cancel request upstream");
                }
            }
            None => tracing::debug!("No upstream sink; cancel request dropped"),
        }
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    fn emit(&mut self, event: PlaybackEvent) {
        notify_all(&mut self.listeners, &event);
    }

    fn dispatch(&mut self, packets: Vec<Packet>) {
        self.emit(PlaybackEvent::Dispatch { packets });
    }

    fn set_speaking(&mut self, speaking: bool) {
        if self.speaking != speaking {
            self.speaking = speaking;
            self.emit(PlaybackEvent::SpeakingChanged { speaking });
        }
    }

    fn emit_history_changed(&mut self) {
        let items = self.history();
        self.emit(PlaybackEvent::HistoryChanged { items });
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Played utterances, most recent first, capped at the history size.
    pub fn history(&self) -> Vec<HistoryItem> {
        self.history
            .iter()
            .rev()
            .flat_map(|i| i.history_items().into_iter().rev())
            .take(self.config.max_history_size)
            .collect()
    }

    pub fn interaction(&self, interaction_id: &str) -> Option<&Interaction> {
        self.history.get(interaction_id)
    }

    pub fn interactions(&self) -> impl Iterator<Item = &Interaction> {
        self.history.iter()
    }

    pub fn current_interaction(&self) -> Option<&Interaction> {
        self.history.get(self.current_interaction.as_deref()?)
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Utterances scheduled but not yet dispatched.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Nothing presenting and nothing queued.
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queue.is_empty()
    }

    pub fn last_interaction_sequence_number(&self) -> u64 {
        self.last_interaction_sequence_number
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================
