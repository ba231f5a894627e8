// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::event::EventRecord;
use std::collections::VecDeque;

/// What a bounded queue does with an incoming record when it is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the record at the front to make room.
    #[default]
    DropOldest,
    /// Keep the queue as is and discard the incoming record.
    DropNewest,
}

#[derive(Debug)]
pub enum Enqueued {
    Accepted,
    /// The record was queued and this older record was evicted.
    Evicted(EventRecord),
    /// The queue was full and the record was not queued.
    Rejected(EventRecord),
}

/// Ordered buffer of records waiting for delivery.
///
/// FIFO for normal flow. A record whose delivery failed is put back with
/// [`DispatchQueue::requeue_front`] so it is retried before anything that
/// was enqueued after it.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    records: VecDeque<EventRecord>,
    capacity: Option<usize>,
    overflow_policy: OverflowPolicy,
}

impl DispatchQueue {
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn bounded(capacity: usize, overflow_policy: OverflowPolicy) -> Self {
        DispatchQueue {
            records: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
            overflow_policy,
        }
    }

    pub fn enqueue(&mut self, record: EventRecord) -> Enqueued {
        let full = self
            .capacity
            .is_some_and(|capacity| self.records.len() >= capacity);
        if !full {
            self.records.push_back(record);
            return Enqueued::Accepted;
        }

        match self.overflow_policy {
            OverflowPolicy::DropNewest => Enqueued::Rejected(record),
            OverflowPolicy::DropOldest => {
                let evicted = self.records.pop_front();
                self.records.push_back(record);
                match evicted {
                    Some(evicted) => Enqueued::Evicted(evicted),
                    None => Enqueued::Accepted,
                }
            }
        }
    }

    pub fn dequeue_front(&mut self) -> Option<EventRecord> {
        self.records.pop_front()
    }

    /// Puts a record back at the front. Never evicts, so a bounded queue may
    /// briefly hold one record over its capacity.
    pub fn requeue_front(&mut self, record: EventRecord) {
        self.records.push_front(record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
