use std::collections::VecDeque;
use sync_core::InputCommand;
use sync_core::domain::movement::{MoveStatus, MoverState};

/// Default capacity: one second of commands at 60 Hz.
pub const DEFAULT_HISTORY_CAPACITY: usize = 60;

/// One predicted step: the command, the movement status it ran under, and the
/// state it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub sequence: u64,
    pub command: InputCommand,
    pub status: MoveStatus,
    pub predicted: MoverState,
    pub captured_at_ms: u64,
}

/// Ring buffer of unacknowledged predictions, ordered by sequence.
#[derive(Debug)]
pub struct PredictionHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for PredictionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl PredictionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest when full.
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn find(&self, sequence: u64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.sequence == sequence)
    }

    /// Drops every entry the server has already processed.
    pub fn acknowledge(&mut self, sequence: u64) {
        while self.entries.front().is_some_and(|e| e.sequence <= sequence) {
            self.entries.pop_front();
        }
    }

    /// Entries newer than `sequence`, oldest first.
    pub fn after(&self, sequence: u64) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter().filter(move |e| e.sequence > sequence)
    }

    pub fn after_mut(&mut self, sequence: u64) -> impl Iterator<Item = &mut HistoryEntry> {
        self.entries.iter_mut().filter(move |e| e.sequence > sequence)
    }

    pub fn newest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::ActionFlags;

    fn entry(sequence: u64) -> HistoryEntry {
        HistoryEntry {
            sequence,
            command: InputCommand {
                sequence,
                timestamp_ms: sequence * 16,
                move_x: 1.0,
                move_y: 0.0,
                aim: 0.0,
                delta_time_ms: 16,
                actions: ActionFlags::default(),
            },
            status: MoveStatus::Free,
            predicted: MoverState {
                x: sequence as f32,
                ..MoverState::default()
            },
            captured_at_ms: sequence * 16,
        }
    }

    #[test]
    fn when_capacity_is_exceeded_then_oldest_entry_is_evicted() {
        let mut history = PredictionHistory::new(3);
        for seq in 1..=4 {
            history.push(entry(seq));
        }
        assert_eq!(history.len(), 3);
        assert!(history.find(1).is_none());
        assert_eq!(history.newest().map(|e| e.sequence), Some(4));
    }

    #[test]
    fn when_acknowledged_then_entries_up_to_sequence_are_pruned() {
        let mut history = PredictionHistory::default();
        for seq in 1..=5 {
            history.push(entry(seq));
        }
        history.acknowledge(3);
        let remaining: Vec<u64> = history.after(0).map(|e| e.sequence).collect();
        assert_eq!(remaining, vec![4, 5]);
    }

    #[test]
    fn when_ack_is_older_than_history_then_nothing_is_pruned() {
        let mut history = PredictionHistory::default();
        history.push(entry(10));
        history.acknowledge(2);
        assert_eq!(history.len(), 1);
    }
}
