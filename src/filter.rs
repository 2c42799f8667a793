use crate::events::{Event, Op};

/// Returns true when every kind in `op` is also in `mask`.
///
/// This is a subset test, not an overlap test: `WRITE|CHMOD` does not pass a
/// mask of `WRITE` alone.
pub fn matches(op: Op, mask: Op) -> bool {
    op & mask == op
}

/// Event-kind filter fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFilter {
    mask: Op,
}

impl EventFilter {
    pub fn new(mask: Op) -> Self {
        Self { mask }
    }

    pub fn mask(&self) -> Op {
        self.mask
    }

    pub fn accepts(&self, event: &Event) -> bool {
        matches(event.op(), self.mask)
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::new(Op::DEFAULT_MASK)
    }
}
