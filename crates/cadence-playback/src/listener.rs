//! Seams between the tracker and the outside world: event listeners on the
//! presentation side, and the upstream sink for outbound requests.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use tokio::sync::mpsc::UnboundedSender;

use cadence_core::{Packet, PlaybackEvent};

use crate::error::PlaybackError;

/// Receives playback events synchronously on the tick thread.
///
/// Errors and panics are logged and never interrupt playback.
pub trait PlaybackListener {
    fn on_event(&mut self, event: &PlaybackEvent) -> Result<(), PlaybackError>;
}

impl<F> PlaybackListener for F
where
    F: FnMut(&PlaybackEvent) -> Result<(), PlaybackError>,
{
    fn on_event(&mut self, event: &PlaybackEvent) -> Result<(), PlaybackError> {
        self(event)
    }
}

/// Deliver `event` to every listener in subscription order, isolating failures.
pub(crate) fn notify_all(listeners: &mut [Box<dyn PlaybackListener>], event: &PlaybackEvent) {
    for (index, listener) in listeners.iter_mut().enumerate() {
        match panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(listener = index, event = event.event_name(), error = %e, "Listener failed");
            }
            Err(_) => {
                tracing::error!(listener = index, event = event.event_name(), "Listener panicked");
            }
        }
    }
}

/// Where outbound packets (cancel requests) go.
pub trait UpstreamSink {
    fn send(&mut self, packet: Packet) -> Result<(), PlaybackError>;
}

impl UpstreamSink for UnboundedSender<Packet> {
    fn send(&mut self, packet: Packet) -> Result<(), PlaybackError> {
        UnboundedSender::send(self, packet).map_err(|_| PlaybackError::UpstreamClosed)
    }
}

/// Listener that keeps every event it sees. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Rc<RefCell<Vec<PlaybackEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PlaybackEvent> {
        self.events.borrow().clone()
    }

    /// Packets of each dispatch event, in order.
    pub fn dispatched(&self) -> Vec<Vec<Packet>> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| e.packets().map(<[Packet]>::to_vec))
            .collect()
    }

    pub fn speaking_changes(&self) -> Vec<bool> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                PlaybackEvent::SpeakingChanged { speaking } => Some(*speaking),
                _ => None,
            })
            .collect()
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.borrow().iter().map(|e| e.event_name()).collect()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl PlaybackListener for EventRecorder {
    fn on_event(&mut self, event: &PlaybackEvent) -> Result<(), PlaybackError> {
        self.events.borrow_mut().push(event.clone());
        Ok(())
    }
}
