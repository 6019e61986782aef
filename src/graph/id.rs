//! Identity types for graph nodes.
//!
//! Components, inputs and outputs draw their ids from one shared
//! [`IdAllocator`], so an id is unique across all three kinds. That is what
//! lets a project file refer to connection peers by a bare number. Pulse
//! ids come from their own counter.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! node_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub const INVALID: $name = $name(u32::MAX);

            #[inline]
            pub fn is_valid(self) -> bool {
                self != Self::INVALID
            }

            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if *self == Self::INVALID {
                    write!(f, concat!(stringify!($name), "(INVALID)"))
                } else {
                    write!(f, concat!(stringify!($name), "({})"), self.0)
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }
    };
}

node_id!(
    /// Identifies a component within a [`Graph`](super::Graph).
    ComponentId
);
node_id!(
    /// Identifies an input port.
    InputId
);
node_id!(
    /// Identifies an output port.
    OutputId
);
node_id!(
    /// Identifies one change-propagation pass.
    PulseId
);

/// Hands out ids from a single increasing counter.
///
/// Loading a project seeds the allocator above the highest persisted id so
/// nodes created afterwards never collide with loaded ones.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator whose first id is `max + 1`.
    pub fn seeded_above(max: u32) -> Self {
        Self {
            next: max.saturating_add(1),
        }
    }

    /// Ensure future ids are greater than `id`.
    pub fn reserve(&mut self, id: u32) {
        if id >= self.next {
            self.next = id.saturating_add(1);
        }
    }

    pub fn peek(&self) -> u32 {
        self.next
    }

    fn take(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }

    pub fn component(&mut self) -> ComponentId {
        ComponentId(self.take())
    }

    pub fn input(&mut self) -> InputId {
        InputId(self.take())
    }

    pub fn output(&mut self) -> OutputId {
        OutputId(self.take())
    }
}
