use castline_core::PeerId;
use std::collections::{HashSet, VecDeque};

/// Ids remembered per broadcast. Redelivered messages arrive shortly after
/// a removal, so only the most recent ones need to be kept.
pub(crate) const RETIRED_CAPACITY: usize = 1024;

/// Peer ids whose links were torn down, oldest evicted first once
/// `capacity` is reached.
pub(crate) struct RetiredPeers {
    capacity: usize,
    order: VecDeque<PeerId>,
    ids: HashSet<PeerId>,
}

impl RetiredPeers {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            ids: HashSet::new(),
        }
    }

    pub fn insert(&mut self, peer_id: PeerId) {
        if !self.ids.insert(peer_id.clone()) {
            return;
        }
        self.order.push_back(peer_id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.ids.contains(peer_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}

impl Default for RetiredPeers {
    fn default() -> Self {
        Self::new(RETIRED_CAPACITY)
    }
}
