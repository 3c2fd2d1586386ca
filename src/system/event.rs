//! System Events
//!
//! Channels between the transports and the drive task. Transports post
//! [`ControlEvent`]s; only motion commands are dropped when the queue is full,
//! everything else waits for room. The drive task is the only receiver.
//! Status echoes flow the other way, to the command server.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use rover_core::command::ControlEvent;
use rover_core::control::{self, ControlQueue};
use rover_core::status::StatusEcho;

use crate::system::config::{CONTROL_QUEUE_DEPTH, STATUS_OUTBOX_DEPTH};

/// Multi-producer, single-consumer control queue
pub static CONTROL_EVENTS: ControlQueue<CriticalSectionRawMutex, CONTROL_QUEUE_DEPTH> = Channel::new();

/// Echoes waiting to be written to the connected client
pub static STATUS_OUTBOX: Channel<CriticalSectionRawMutex, StatusEcho, STATUS_OUTBOX_DEPTH> = Channel::new();

/// Posts a control event; returns false if it was a motion command dropped on a full queue
pub async fn send(event: ControlEvent) -> bool {
    control::post(&CONTROL_EVENTS, event).await
}

/// Receives the next control event
pub async fn wait() -> ControlEvent {
    CONTROL_EVENTS.receive().await
}

/// Queues an echo for the client; dropped when nobody drains the outbox
pub fn publish_status(echo: StatusEcho) {
    if STATUS_OUTBOX.try_send(echo).is_err() {
        defmt::debug!("Status outbox full, echo dropped");
    }
}

/// Receives the next echo to send
pub async fn next_status() -> StatusEcho {
    STATUS_OUTBOX.receive().await
}

/// Drops echoes left over from a previous client
pub fn clear_status() {
    STATUS_OUTBOX.clear();
}
