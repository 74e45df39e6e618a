//! Sequence-ordered, deduplicating command queue (C3).

use std::collections::BTreeMap;

use crate::error::QueueError;
use crate::types::{Input, MAX_QUEUE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueuedCommand {
    pub seq: u64,
    pub input: Input,
}

/// Bounded, seq-keyed queue. Entries are stored in a `BTreeMap` so that the
/// lowest outstanding `seq` is always the dequeue candidate without a
/// separate sort step.
pub struct CommandQueue {
    entries: BTreeMap<u64, Input>,
    next_sequence: u64,
    max_size: usize,
}

impl CommandQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            next_sequence: 0,
            max_size,
        }
    }

    pub fn enqueue(&mut self, seq: u64, input: Input) -> Result<(), QueueError> {
        if seq < self.next_sequence {
            return Err(QueueError::StaleSequence);
        }
        if self.entries.contains_key(&seq) {
            return Err(QueueError::DuplicateSequence);
        }
        if self.entries.len() >= self.max_size {
            return Err(QueueError::QueueFull);
        }
        self.entries.insert(seq, input);
        Ok(())
    }

    /// Remove and return the lowest-`seq` entry, advancing `next_sequence`
    /// past it so no future enqueue at or below that seq can succeed.
    pub fn dequeue(&mut self) -> Option<QueuedCommand> {
        let seq = *self.entries.keys().next()?;
        let input = self.entries.remove(&seq)?;
        self.next_sequence = self.next_sequence.max(seq + 1);
        Some(QueuedCommand { seq, input })
    }

    pub fn peek(&self) -> Option<QueuedCommand> {
        let (&seq, &input) = self.entries.iter().next()?;
        Some(QueuedCommand { seq, input })
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new(MAX_QUEUE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reordering_and_dedup_scenario() {
        let mut q = CommandQueue::default();
        assert!(q
            .enqueue(2, Input { thrust: 0.2, turn: 0.0 })
            .is_ok());
        assert!(q
            .enqueue(1, Input { thrust: 0.1, turn: 0.0 })
            .is_ok());
        assert!(q
            .enqueue(3, Input { thrust: 0.3, turn: 0.0 })
            .is_ok());
        assert_eq!(
            q.enqueue(1, Input { thrust: 0.9, turn: 0.0 }),
            Err(QueueError::DuplicateSequence)
        );

        let first = q.dequeue().unwrap();
        let second = q.dequeue().unwrap();
        let third = q.dequeue().unwrap();

        assert_eq!((first.seq, first.input.thrust), (1, 0.1));
        assert_eq!((second.seq, second.input.thrust), (2, 0.2));
        assert_eq!((third.seq, third.input.thrust), (3, 0.3));
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn stale_sequence_rejected_after_dequeue() {
        let mut q = CommandQueue::default();
        q.enqueue(5, Input::ZERO).unwrap();
        q.dequeue().unwrap();
        assert_eq!(q.enqueue(5, Input::ZERO), Err(QueueError::StaleSequence));
        assert_eq!(q.enqueue(3, Input::ZERO), Err(QueueError::StaleSequence));
    }

    #[test]
    fn queue_full_rejects_further_enqueues() {
        let mut q = CommandQueue::new(2);
        q.enqueue(1, Input::ZERO).unwrap();
        q.enqueue(2, Input::ZERO).unwrap();
        assert_eq!(q.enqueue(3, Input::ZERO), Err(QueueError::QueueFull));
    }

    proptest::proptest! {
        #[test]
        fn dequeue_is_monotone(seqs in proptest::collection::vec(0u64..200, 0..40)) {
            let mut q = CommandQueue::new(1000);
            for s in seqs {
                let _ = q.enqueue(s, Input::ZERO);
            }
            let mut last: Option<u64> = None;
            while let Some(cmd) = q.dequeue() {
                if let Some(l) = last {
                    proptest::prop_assert!(cmd.seq > l);
                }
                last = Some(cmd.seq);
            }
        }
    }
}
