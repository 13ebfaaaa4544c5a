//! Record of the chat messages we sent and whether the peer acknowledged them.

use std::collections::BTreeMap;

use crate::message::MessageId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundChatMessage {
    pub id: MessageId,
    pub body: String,
    pub acknowledged: bool,
}

/// Ids start at 1 and grow by one per submitted message. Entries live until the ledger is dropped.
#[derive(Debug, Default)]
pub struct Ledger {
    sent: BTreeMap<MessageId, OutboundChatMessage>,
}

impl Ledger {
    pub fn new() -> Ledger {
        Ledger::default()
    }

    /// Record a new outbound message and return the id to send it under.
    pub fn submit(&mut self, body: impl Into<String>) -> MessageId {
        let id = self.sent.keys().next_back().map_or(1, |last| last + 1);
        self.sent.insert(
            id,
            OutboundChatMessage {
                id,
                body: body.into(),
                acknowledged: false,
            },
        );
        id
    }

    /// Mark `id` as delivered. Unknown ids are ignored.
    pub fn acknowledge(&mut self, id: MessageId) {
        if let Some(entry) = self.sent.get_mut(&id) {
            entry.acknowledged = true;
        }
    }

    pub fn unacknowledged_count(&self) -> usize {
        self.sent.values().filter(|entry| !entry.acknowledged).count()
    }

    pub fn get(&self, id: MessageId) -> Option<&OutboundChatMessage> {
        self.sent.get(&id)
    }

    /// Entries newest first.
    pub fn iter(&self) -> impl Iterator<Item = &OutboundChatMessage> {
        self.sent.values().rev()
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}
