//! FIFO buffer for control requests issued before the control socket opens.

use std::collections::VecDeque;

use parley_protocol::ControlRequest;

use crate::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// What a bounded queue does when a request arrives at capacity.
pub enum OverflowPolicy {
    #[default]
    RejectNewest,
    DropOldest,
}

impl OverflowPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RejectNewest => "reject-newest",
            Self::DropOldest => "drop-oldest",
        }
    }
}

#[derive(Debug, Default)]
/// Ordered buffer of not-yet-sent control requests.
pub struct OutboundQueue {
    pending: VecDeque<ControlRequest>,
    capacity: Option<usize>,
    policy: OverflowPolicy,
}

impl OutboundQueue {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            pending: VecDeque::new(),
            capacity: Some(capacity.max(1)),
            policy,
        }
    }

    pub fn with_limit(capacity: Option<usize>, policy: OverflowPolicy) -> Self {
        match capacity {
            Some(capacity) => Self::bounded(capacity, policy),
            None => Self::unbounded(),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Appends `request` to the tail.
    ///
    /// Returns the evicted head when a full queue uses
    /// [`OverflowPolicy::DropOldest`].
    pub fn enqueue(
        &mut self,
        request: ControlRequest,
    ) -> Result<Option<ControlRequest>, SessionError> {
        let Some(capacity) = self.capacity else {
            self.pending.push_back(request);
            return Ok(None);
        };
        if self.pending.len() < capacity {
            self.pending.push_back(request);
            return Ok(None);
        }
        match self.policy {
            OverflowPolicy::RejectNewest => Err(SessionError::QueueFull { capacity }),
            OverflowPolicy::DropOldest => {
                let evicted = self.pending.pop_front();
                self.pending.push_back(request);
                Ok(evicted)
            }
        }
    }

    /// Removes every queued request, oldest first.
    pub fn drain(&mut self) -> Vec<ControlRequest> {
        self.pending.drain(..).collect()
    }
}
