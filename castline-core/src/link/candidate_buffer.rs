use std::collections::VecDeque;

/// Holds candidates for one link until its remote description is applied.
///
/// Before [`flush`](Self::flush) every candidate is queued; `flush` hands the
/// queue back in arrival order exactly once, after which [`add`](Self::add)
/// passes candidates straight through. Applying them is left to the owner,
/// so one rejected candidate cannot stop the rest from being tried.
#[derive(Debug)]
pub struct CandidateBuffer<C> {
    pending: VecDeque<C>,
    flushed: bool,
}

impl<C> CandidateBuffer<C> {
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            flushed: false,
        }
    }

    /// Returns the candidate back when it should be applied right away.
    #[must_use]
    pub fn add(&mut self, candidate: C) -> Option<C> {
        if self.flushed {
            return Some(candidate);
        }
        self.pending.push_back(candidate);
        None
    }

    /// Drains the queue. Only the first call yields anything.
    pub fn flush(&mut self) -> Vec<C> {
        if self.flushed {
            return Vec::new();
        }
        self.flushed = true;
        self.pending.drain(..).collect()
    }

    /// Whether the remote description has been applied.
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

impl<C> Default for CandidateBuffer<C> {
    fn default() -> Self {
        Self::new()
    }
}
