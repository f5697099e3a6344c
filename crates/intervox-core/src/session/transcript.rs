//! The canonical, ordered interview transcript.

use std::collections::HashSet;

use super::message::Utterance;

/// An append-only ordered sequence of utterances.
///
/// Local completions are appended in the order the coordinator observes
/// them. Remote arrivals normally append too, but a server timestamp that
/// orders a message before the current tail inserts it in sorted position
/// instead; late arrivals are never dropped. Ties keep arrival order.
/// Every insert deduplicates by utterance id.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    entries: Vec<Utterance>,
    ids: HashSet<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends at the tail. Returns false for a duplicate id.
    pub fn append(&mut self, utterance: Utterance) -> bool {
        if !self.ids.insert(utterance.id.clone()) {
            return false;
        }
        self.entries.push(utterance);
        true
    }

    /// Inserts in timestamp order, after any entry with an equal or
    /// earlier key. Returns false for a duplicate id.
    pub fn insert_ordered(&mut self, utterance: Utterance) -> bool {
        if !self.ids.insert(utterance.id.clone()) {
            return false;
        }
        let index = self
            .entries
            .partition_point(|entry| entry.occurred_at <= utterance.occurred_at);
        self.entries.insert(index, utterance);
        true
    }

    pub fn entries(&self) -> &[Utterance] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops everything; only session reset does this.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.ids.clear();
    }
}
