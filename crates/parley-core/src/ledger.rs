//! Message Ledger
//!
//! Accumulates a session's incoming messages and exposes a merged,
//! time-ordered view for display.
//!
//! ## Invariants
//!
//! - Append-only: entries are never removed or mutated while the session lives
//! - Unique ids: no id appears twice across the broadcast and whisper
//!   sequences, so whisper classification is exclusive
//! - Ordered view: [`MessageLedger::merged_view`] is non-decreasing by
//!   timestamp; equal timestamps keep insertion order

use std::collections::HashSet;

use crate::{
    message::{InboundMessage, Message, MessageId, MessageKind},
    scope::Scope,
};

/// A message together with its ledger-wide insertion sequence.
#[derive(Debug, Clone)]
struct Stored {
    message: Message,
    seq: u64,
}

/// Entry yielded by the merged view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry<'a> {
    /// The message.
    pub message: &'a Message,
    /// Which sequence the message was ingested into.
    pub kind: MessageKind,
    /// Ledger-wide insertion sequence (tie-breaker for equal timestamps).
    pub seq: u64,
}

impl LedgerEntry<'_> {
    /// Whether the entry came from the whisper sequence.
    pub fn is_whisper(&self) -> bool {
        self.kind == MessageKind::Whisper
    }
}

/// Two append-only message sequences owned by one session.
#[derive(Debug, Clone, Default)]
pub struct MessageLedger {
    broadcast: Vec<Stored>,
    whisper: Vec<Stored>,
    ids: HashSet<MessageId>,
    next_seq: u64,
}

impl MessageLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the sequence matching `kind`.
    ///
    /// Returns `false` and leaves the ledger untouched when the id is already
    /// present in either sequence.
    pub fn ingest(&mut self, message: Message, kind: MessageKind) -> bool {
        if !self.ids.insert(message.id.clone()) {
            tracing::debug!(id = %message.id, ?kind, "duplicate message ignored");
            return false;
        }

        let stored = Stored { message, seq: self.next_seq };
        self.next_seq += 1;

        match kind {
            MessageKind::Broadcast => self.broadcast.push(stored),
            MessageKind::Whisper => self.whisper.push(stored),
        }

        true
    }

    /// Ingest a history batch that may arrive out of order.
    ///
    /// The batch is stably sorted by timestamp first so entries with equal
    /// timestamps keep their delivery order. Returns the number appended.
    pub fn hydrate(
        &mut self,
        mut batch: Vec<InboundMessage>,
        kind: MessageKind,
        username: &str,
        scope: &Scope,
    ) -> usize {
        batch.sort_by_key(|m| m.timestamp);

        let mut appended = 0;
        for inbound in batch {
            if self.ingest(Message::from_inbound(inbound, username, scope.clone()), kind) {
                appended += 1;
            }
        }
        appended
    }

    /// Merged, time-ordered view over both sequences.
    ///
    /// Derived from the current contents on every call; the returned iterator
    /// is finite and independent of later ingestion.
    pub fn merged_view(&self) -> MergedView<'_> {
        let mut entries: Vec<LedgerEntry<'_>> = self
            .broadcast
            .iter()
            .map(|s| LedgerEntry { message: &s.message, kind: MessageKind::Broadcast, seq: s.seq })
            .chain(self.whisper.iter().map(|s| LedgerEntry {
                message: &s.message,
                kind: MessageKind::Whisper,
                seq: s.seq,
            }))
            .collect();

        entries.sort_by(|a, b| {
            a.message.timestamp.cmp(&b.message.timestamp).then(a.seq.cmp(&b.seq))
        });

        MergedView { inner: entries.into_iter() }
    }

    /// Broadcast messages in insertion order.
    pub fn broadcast(&self) -> impl Iterator<Item = &Message> {
        self.broadcast.iter().map(|s| &s.message)
    }

    /// Whisper messages in insertion order.
    pub fn whispers(&self) -> impl Iterator<Item = &Message> {
        self.whisper.iter().map(|s| &s.message)
    }

    /// Whether a message id has been ingested.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    /// Total number of messages across both sequences.
    pub fn len(&self) -> usize {
        self.broadcast.len() + self.whisper.len()
    }

    /// Whether both sequences are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything. Only the owning session calls this when it resets.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Iterator over a ledger's merged view.
#[derive(Debug)]
pub struct MergedView<'a> {
    inner: std::vec::IntoIter<LedgerEntry<'a>>,
}

impl<'a> Iterator for MergedView<'a> {
    type Item = LedgerEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for MergedView<'_> {}
