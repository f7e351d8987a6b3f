use std::collections::VecDeque;

use crate::message::Message;

pub const DEFAULT_MAX_MESSAGES: usize = 100;

/// Kind of the most recent mutation, used by observers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    Appended,
    Cleared,
}

/// Ordered, capacity-bounded conversation log.
///
/// Insertion order is the conversation order. When the log grows past its
/// capacity the oldest entries are dropped; survivors keep their order.
#[derive(Clone, Debug)]
pub struct MessageStore {
    messages: VecDeque<Message>,
    capacity: usize,
    revision: u64,
    last_change: Option<StoreChange>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_MESSAGES)
    }
}

impl MessageStore {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
            revision: 0,
            last_change: None,
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push_back(message);
        self.truncate_head();
        self.touch(StoreChange::Appended);
    }

    pub fn append_many(&mut self, messages: impl IntoIterator<Item = Message>) {
        let len = self.messages.len();
        self.messages.extend(messages);
        if self.messages.len() == len {
            return;
        }
        self.truncate_head();
        self.touch(StoreChange::Appended);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.touch(StoreChange::Cleared);
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Message> + '_ {
        self.messages.iter()
    }

    /// Messages from `start` to the tail.
    pub fn tail_from(&self, start: usize) -> impl Iterator<Item = &Message> + '_ {
        self.messages.iter().skip(start)
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.back()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bumped on every mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn last_change(&self) -> Option<StoreChange> {
        self.last_change
    }

    fn truncate_head(&mut self) {
        if self.messages.len() > self.capacity {
            let excess = self.messages.len() - self.capacity;
            self.messages.drain(..excess);
        }
    }

    fn touch(&mut self, change: StoreChange) {
        self.revision += 1;
        self.last_change = Some(change);
    }
}
