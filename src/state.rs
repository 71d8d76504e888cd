use std::sync::{Mutex, MutexGuard};

use crate::model::{Message, MessageId, MessageRecord, PeerAddress, Snapshot};

/// What a merge changed locally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub new_peers: usize,
    pub new_messages: usize,
    /// Ids present on both sides with differing records. The local copy was kept.
    pub collisions: Vec<MessageId>,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        self.new_peers > 0 || self.new_messages > 0
    }
}

/// The in-memory peer set and message map, behind a single lock.
///
/// Every operation holds the lock for its whole critical section and no
/// operation performs I/O while holding it.
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<Snapshot>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            inner: Mutex::new(snapshot),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        // A panicking holder cannot leave a half-applied union behind, so the
        // data is still usable after poisoning.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    /// Union `incoming` into local state. On id collision the local record wins.
    pub fn merge(&self, incoming: Snapshot) -> MergeReport {
        let mut report = MergeReport::default();
        let mut state = self.lock();

        for peer in incoming.peers {
            if state.peers.insert(peer) {
                report.new_peers += 1;
            }
        }

        for (id, record) in incoming.messages {
            match state.messages.get(&id) {
                Some(existing) => {
                    if *existing != record {
                        report.collisions.push(id);
                    }
                }
                None => {
                    state.messages.insert(id, record);
                    report.new_messages += 1;
                }
            }
        }

        report
    }

    /// Insert a freshly authored message and return its new id.
    pub fn add(&self, author: &str, body: &str, origin_port: u16, now: i64) -> MessageId {
        let record = MessageRecord {
            author_name: author.to_string(),
            body: body.to_string(),
            origin_port,
            created_at: now,
        };

        let mut state = self.lock();
        let mut id = MessageId::generate();
        while state.messages.contains_key(&id) {
            id = MessageId::generate();
        }
        state.messages.insert(id.clone(), record);
        id
    }

    /// Returns true when the port was not yet known.
    pub fn register_self_port(&self, port: u16) -> bool {
        self.lock().peers.insert(PeerAddress::new(port))
    }

    pub fn peers(&self) -> Vec<PeerAddress> {
        self.lock().peers.iter().copied().collect()
    }

    pub fn message_count(&self) -> usize {
        self.lock().messages.len()
    }

    /// All messages, oldest first. Ties on timestamp are ordered by id.
    pub fn list_messages(&self) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .lock()
            .messages
            .iter()
            .map(|(id, record)| Message {
                id: id.clone(),
                record: record.clone(),
            })
            .collect();
        messages.sort_by(|a, b| {
            a.record
                .created_at
                .cmp(&b.record.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        messages
    }
}
