use crate::application::events::SyncEvent;
use std::collections::VecDeque;

/// Bounded FIFO of session events waiting for the UI
#[derive(Debug)]
pub struct EventQueue {
    queue: VecDeque<SyncEvent>,
    max_size: usize,
}

impl EventQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Push an event (returns error if full)
    pub fn push(&mut self, event: SyncEvent) -> Result<(), QueueError> {
        if self.queue.len() >= self.max_size {
            return Err(QueueError::Full { max: self.max_size });
        }
        self.queue.push_back(event);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<SyncEvent> {
        self.queue.pop_front()
    }

    pub fn drain(&mut self) -> Vec<SyncEvent> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum QueueError {
    #[error("Queue is full (max size: {max})")]
    Full { max: usize },
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(256)
    }
}
