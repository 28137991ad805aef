//! Event fan-out to connected observers.
//!
//! Every published [`PanelEvent`] goes to all live subscribers through a
//! bounded broadcast channel. The bus also tracks the last committed
//! lifecycle state and a ring of recent console lines so that late joiners
//! can be brought up to date.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_stream::stream;
use futures_core::Stream;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use warden_core::{OutputEvent, PanelEvent, ProcessState};

/// Number of console lines kept for history replay.
pub const CONSOLE_HISTORY_LINES: usize = 1000;

/// Per-subscriber buffer. Slow subscribers skip ahead once it overflows.
const CHANNEL_CAPACITY: usize = 512;

/// Ring buffer of recent console lines.
#[derive(Debug)]
struct ConsoleHistory {
    lines: VecDeque<OutputEvent>,
    capacity: usize,
}

impl ConsoleHistory {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, line: OutputEvent) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }
}

#[derive(Debug)]
struct BusState {
    current: ProcessState,
    history: ConsoleHistory,
}

/// Publish/subscribe hub for lifecycle, console and telemetry events.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<PanelEvent>,
    state: Mutex<BusState>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history_capacity(CONSOLE_HISTORY_LINES)
    }

    pub fn with_history_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            state: Mutex::new(BusState {
                current: ProcessState::Stopped,
                history: ConsoleHistory::new(capacity),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish an event to every current subscriber.
    ///
    /// Events published with no subscribers are dropped (console lines are
    /// still recorded in the history ring).
    pub fn publish(&self, event: PanelEvent) {
        // Hold the state lock across the send so a concurrent subscribe()
        // sees either the old state and this event, or the new state only.
        let mut state = self.lock();
        match &event {
            PanelEvent::StateChanged { state: next, .. } => state.current = *next,
            PanelEvent::Output(line) => state.history.push(line.clone()),
            _ => {}
        }

        if self.sender.send(event).is_err() {
            debug!("No subscribers, event dropped");
        }
    }

    /// Convenience wrapper for console lines.
    pub fn publish_line(&self, line: OutputEvent) {
        self.publish(PanelEvent::Output(line));
    }

    /// Subscribe; the first event received is always the current state.
    pub fn subscribe(&self) -> Subscription {
        let state = self.lock();
        let receiver = self.sender.subscribe();
        Subscription {
            initial: Some(PanelEvent::current_state(state.current)),
            receiver,
        }
    }

    /// Last state committed through this bus.
    pub fn current_state(&self) -> ProcessState {
        self.lock().current
    }

    /// Recent console lines, oldest first.
    pub fn history(&self) -> Vec<OutputEvent> {
        self.lock().history.lines.iter().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One observer's view of the bus.
///
/// Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    initial: Option<PanelEvent>,
    receiver: broadcast::Receiver<PanelEvent>,
}

impl Subscription {
    /// Next event, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<PanelEvent> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }

        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagged behind, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Adapt into a `Stream` for transports.
    pub fn into_stream(self) -> impl Stream<Item = PanelEvent> + Send + 'static {
        let mut subscription = self;
        stream! {
            while let Some(event) = subscription.recv().await {
                yield event;
            }
        }
    }
}
