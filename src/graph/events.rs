//! Change notifications for view layers.
//!
//! Any number of observers can call [`Graph::subscribe`](super::Graph::subscribe)
//! and receive every [`GraphEvent`] on a crossbeam channel. Observers that drop
//! their receiver are forgotten on the next send.

use crate::graph::id::{ComponentId, InputId, OutputId, PulseId};
use crate::pulse::{PulseOrigin, PulseState};
use crate::types::Sufficiency;
use crossbeam_channel::{unbounded, Receiver, Sender};

#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// An output holds new data.
    ValueChanged {
        component: ComponentId,
        output: OutputId,
        pulse: Option<PulseId>,
    },

    Connected {
        output: OutputId,
        input: InputId,
    },

    Disconnected {
        output: OutputId,
        input: InputId,
    },

    SufficiencyChanged {
        component: ComponentId,
        from: Sufficiency,
        to: Sufficiency,
    },

    Removed {
        component: ComponentId,
    },

    PulseCompleted {
        pulse: PulseId,
        origin: PulseOrigin,
        state: PulseState,
        recalculated: usize,
    },
}

#[derive(Debug, Default)]
pub(crate) struct EventBus {
    senders: Vec<Sender<GraphEvent>>,
}

impl EventBus {
    pub fn subscribe(&mut self) -> Receiver<GraphEvent> {
        let (tx, rx) = unbounded();
        self.senders.push(tx);
        rx
    }

    pub fn emit(&mut self, event: GraphEvent) {
        if self.senders.is_empty() {
            return;
        }
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.senders.len()
    }
}
