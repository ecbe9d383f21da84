use std::collections::VecDeque;
use std::sync::Arc;

use thiserror::Error;

use crate::command::Command;

const DEFAULT_HIGH_WATERMARK: f64 = 0.8;
const DEFAULT_LOW_WATERMARK: f64 = 0.2;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum QueueError {
    #[error("Command queue full ({len}/{capacity}, {incoming} incoming)")]
    Full {
        len: usize,
        capacity: usize,
        incoming: usize,
    },
    #[error("Command queue is empty")]
    Empty,
    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Producer-side flow control. `hold` fires once when the fill level crosses
/// up to the high watermark, `resume` once when it crosses back down to the
/// low watermark. Invoked synchronously while the queue is being mutated, so
/// implementations must not re-enter the queue.
pub trait QueueProducer: Send + Sync {
    fn hold(&self);
    fn resume(&self);
}

/// Consumer-side wakeups. `on_command_enqueued` fires when the queue goes
/// from empty to non-empty, `on_queue_drained` when it empties out. Both are
/// invoked synchronously while the queue is being mutated, so implementations
/// must not re-enter the queue.
pub trait QueueConsumer: Send + Sync {
    fn on_command_enqueued(&self);
    fn on_queue_drained(&self);
}

/// Bounded FIFO of pending commands. A batch that does not fit is rejected
/// whole; the queue is never left with a partial sequence.
pub struct CommandQueue {
    capacity: usize,
    high_mark: usize,
    low_mark: usize,
    commands: VecDeque<Command>,
    producers: Vec<Arc<dyn QueueProducer>>,
    consumers: Vec<Arc<dyn QueueConsumer>>,
}

impl CommandQueue {
    pub fn new(capacity: usize) -> CommandQueue {
        CommandQueue::with_watermarks(capacity, DEFAULT_HIGH_WATERMARK, DEFAULT_LOW_WATERMARK)
    }

    /// `high` and `low` are fractions of `capacity` in (0, 1], high above low.
    pub fn with_watermarks(capacity: usize, high: f64, low: f64) -> CommandQueue {
        let high_mark = ((capacity as f64) * high).round() as usize;
        let low_mark = ((capacity as f64) * low).round() as usize;
        CommandQueue {
            capacity,
            high_mark: high_mark.clamp(1, capacity),
            low_mark: low_mark.min(high_mark.saturating_sub(1)),
            commands: VecDeque::with_capacity(capacity),
            producers: Vec::new(),
            consumers: Vec::new(),
        }
    }

    pub fn register_producer(&mut self, producer: Arc<dyn QueueProducer>) {
        self.producers.push(producer);
    }

    pub fn unregister_producer(&mut self, producer: &Arc<dyn QueueProducer>) {
        self.producers.retain(|p| !Arc::ptr_eq(p, producer));
    }

    pub fn register_consumer(&mut self, consumer: Arc<dyn QueueConsumer>) {
        self.consumers.push(consumer);
    }

    pub fn unregister_consumer(&mut self, consumer: &Arc<dyn QueueConsumer>) {
        self.consumers.retain(|c| !Arc::ptr_eq(c, consumer));
    }

    pub fn enqueue(&mut self, command: Command) -> Result<(), QueueError> {
        self.enqueue_all(vec![command])
    }

    /// Appends the whole batch or nothing. Watermark and non-empty
    /// notifications fire at most once per call, on the crossing itself.
    pub fn enqueue_all(&mut self, commands: Vec<Command>) -> Result<(), QueueError> {
        if commands.is_empty() {
            return Ok(());
        }
        let old_len = self.commands.len();
        let incoming = commands.len();
        if old_len + incoming > self.capacity {
            warn!(
                "rejecting batch of {} commands: queue at {}/{}",
                incoming, old_len, self.capacity
            );
            return Err(QueueError::Full {
                len: old_len,
                capacity: self.capacity,
                incoming,
            });
        }
        self.commands.extend(commands);
        let new_len = self.commands.len();

        if old_len < self.high_mark && new_len >= self.high_mark {
            debug!("queue reached high watermark ({}/{})", new_len, self.capacity);
            for producer in &self.producers {
                producer.hold();
            }
        }
        if old_len == 0 {
            for consumer in &self.consumers {
                consumer.on_command_enqueued();
            }
        }
        Ok(())
    }

    pub fn dequeue(&mut self) -> Result<Command, QueueError> {
        let old_len = self.commands.len();
        let command = self.commands.pop_front().ok_or(QueueError::Empty)?;
        let new_len = self.commands.len();

        if old_len > self.low_mark && new_len <= self.low_mark {
            debug!("queue back below low watermark ({}/{})", new_len, self.capacity);
            for producer in &self.producers {
                producer.resume();
            }
        }
        if new_len == 0 {
            for consumer in &self.consumers {
                consumer.on_queue_drained();
            }
        }
        Ok(command)
    }

    /// Read-only peek at an arbitrary position; front is index 0.
    pub fn get(&self, index: usize) -> Result<&Command, QueueError> {
        self.commands.get(index).ok_or(QueueError::IndexOutOfRange {
            index,
            len: self.commands.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops all pending commands. No notifications are emitted.
    pub fn reset(&mut self) {
        self.commands.clear();
    }
}
