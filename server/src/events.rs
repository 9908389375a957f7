//! Change notifications from the round core.
//!
//! Events are advisory. A client that misses one catches up from the next
//! snapshot.

use log::debug;
use shared::ServerEvent;

/// Outbox for change notifications published by the round core.
///
/// The host loop drains it once per tick and broadcasts the contents. The
/// core never talks to the network directly.
#[derive(Debug, Default)]
pub struct EventBus {
    outbox: Vec<ServerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, event: ServerEvent) {
        debug!("event: {:?}", event);
        self.outbox.push(event);
    }

    pub fn drain(&mut self) -> Vec<ServerEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn pending(&self) -> &[ServerEvent] {
        &self.outbox
    }
}
