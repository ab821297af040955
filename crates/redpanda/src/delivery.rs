//! Per-subscription delivery bookkeeping.
//!
//! Kafka has no per-message negative acknowledgement, so redelivery is kept
//! here: a nak'd message goes to a queue that is served ahead of new records,
//! until it has been delivered `max_deliveries` times.

use std::collections::{BTreeMap, VecDeque};

/// One message handed to the consumer loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub subject: String,
    pub payload: Vec<u8>,
    /// Log offset, unique within the subscription
    pub offset: i64,
    /// 1 on first delivery
    pub delivery_count: u32,
}

impl BusMessage {
    pub fn new(subject: impl Into<String>, payload: impl Into<Vec<u8>>, offset: i64) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
            offset,
            delivery_count: 1,
        }
    }

    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }
}

/// What happened to a nak'd message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NakOutcome {
    /// Queued for another delivery
    Requeued,
    /// Delivery budget spent; the message is gone
    Exhausted,
    /// Not in flight (already settled)
    Unknown,
}

/// Tracks in-flight and to-be-redelivered messages for one subscription.
#[derive(Debug)]
pub struct DeliveryTracker {
    max_deliveries: u32,
    /// Next log offset to read
    cursor: i64,
    in_flight: BTreeMap<i64, BusMessage>,
    redeliveries: VecDeque<BusMessage>,
}

impl DeliveryTracker {
    pub fn new(start_offset: i64, max_deliveries: u32) -> Self {
        Self {
            max_deliveries: max_deliveries.max(1),
            cursor: start_offset,
            in_flight: BTreeMap::new(),
            redeliveries: VecDeque::new(),
        }
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn max_deliveries(&self) -> u32 {
        self.max_deliveries
    }

    /// Move the read cursor past `offset` without tracking anything there
    /// (filtered or empty records).
    pub fn skip(&mut self, offset: i64) {
        self.cursor = self.cursor.max(offset + 1);
    }

    /// Start tracking a freshly read message and advance the cursor.
    pub fn deliver(&mut self, message: BusMessage) -> BusMessage {
        self.skip(message.offset);
        self.in_flight.insert(message.offset, message.clone());
        message
    }

    /// Pop up to `max` queued redeliveries, bumping their delivery count.
    pub fn take_redeliveries(&mut self, max: usize) -> Vec<BusMessage> {
        let n = max.min(self.redeliveries.len());
        self.redeliveries
            .drain(..n)
            .map(|mut message| {
                message.delivery_count += 1;
                self.in_flight.insert(message.offset, message.clone());
                message
            })
            .collect()
    }

    /// Settle a message. Returns `false` if it was not in flight.
    pub fn ack(&mut self, offset: i64) -> bool {
        self.in_flight.remove(&offset).is_some()
    }

    pub fn nak(&mut self, offset: i64) -> NakOutcome {
        let Some(message) = self.in_flight.remove(&offset) else {
            return NakOutcome::Unknown;
        };
        if message.delivery_count >= self.max_deliveries {
            NakOutcome::Exhausted
        } else {
            self.redeliveries.push_back(message);
            NakOutcome::Requeued
        }
    }

    pub fn pending_redeliveries(&self) -> usize {
        self.redeliveries.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Lowest offset not yet settled; everything below it has been acked or
    /// dropped.
    pub fn committed_offset(&self) -> i64 {
        let in_flight = self.in_flight.keys().next().copied();
        let queued = self.redeliveries.iter().map(|m| m.offset).min();
        [in_flight, queued]
            .into_iter()
            .flatten()
            .fold(self.cursor, i64::min)
    }
}
