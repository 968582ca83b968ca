//! Pending-event list for the three-phase engine.
//!
//! A [BinaryHeap] with reversed ordering acts as a min-heap keyed by
//! `(time, seq)`. The sequence number is assigned on insertion, so events at the
//! same instant come out in the order they were scheduled.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt::Debug;

use crate::clock::SimTime;
use crate::error::KernelError;

/// A bound event: something that happens at exactly `time`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event<K> {
    pub kind: K,
    pub time: SimTime,
    /// Insertion order; breaks ties between events at the same time.
    pub seq: u64,
}

/// Heap entry. Only `time` and `seq` take part in the ordering so event kinds
/// do not need to be comparable.
#[derive(Debug)]
struct Pending<K>(Event<K>);

impl<K> PartialEq for Pending<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K> Eq for Pending<K> {}

impl<K> Ord for Pending<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by (time, seq).
        other
            .0
            .time
            .total_cmp(&self.0.time)
            .then_with(|| other.0.seq.cmp(&self.0.seq))
    }
}

impl<K> PartialOrd for Pending<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
pub struct EventList<K> {
    heap: BinaryHeap<Pending<K>>,
    next_seq: u64,
}

impl<K> Default for EventList<K> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<K: Copy + Debug> EventList<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `kind` at `time` and returns the stored event.
    pub fn schedule(&mut self, kind: K, time: SimTime) -> Result<Event<K>, KernelError> {
        let event = Event {
            kind,
            time,
            seq: self.next_seq,
        };
        self.insert(event)?;
        Ok(event)
    }

    /// Inserts a pre-built event. The sequence number is reassigned so FIFO
    /// order among equal times always reflects insertion order.
    pub fn insert(&mut self, mut event: Event<K>) -> Result<(), KernelError> {
        if !event.time.is_finite() || event.time < 0.0 {
            return Err(KernelError::InvalidEventTime(event.time));
        }
        event.seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Pending(event));
        Ok(())
    }

    /// Earliest pending time, or `f64::INFINITY` when nothing is scheduled.
    pub fn peek_earliest_time(&self) -> SimTime {
        self.heap
            .peek()
            .map(|pending| pending.0.time)
            .unwrap_or(SimTime::INFINITY)
    }

    pub fn peek(&self) -> Option<&Event<K>> {
        self.heap.peek().map(|pending| &pending.0)
    }

    pub fn remove_earliest(&mut self) -> Result<Event<K>, KernelError> {
        self.heap
            .pop()
            .map(|pending| pending.0)
            .ok_or(KernelError::EmptyEventList)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.next_seq = 0;
    }

    /// Drains all events in dispatch order.
    pub fn drain_ordered(&mut self) -> Vec<Event<K>> {
        let mut events = Vec::with_capacity(self.heap.len());
        while let Some(pending) = self.heap.pop() {
            events.push(pending.0);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Arrival,
        Departure,
    }

    #[test]
    fn pops_events_in_time_order() {
        let mut events = EventList::new();
        events.schedule(Kind::Arrival, 10.0).unwrap();
        events.schedule(Kind::Arrival, 5.0).unwrap();
        events.schedule(Kind::Departure, 20.0).unwrap();

        assert_eq!(events.peek_earliest_time(), 5.0);
        assert_eq!(events.remove_earliest().unwrap().time, 5.0);
        assert_eq!(events.remove_earliest().unwrap().time, 10.0);
        let last = events.remove_earliest().unwrap();
        assert_eq!(last.time, 20.0);
        assert_eq!(last.kind, Kind::Departure);
        assert!(events.is_empty());
    }

    #[test]
    fn equal_times_are_fifo() {
        let mut events = EventList::new();
        events.schedule(Kind::Departure, 3.0).unwrap();
        events.schedule(Kind::Arrival, 3.0).unwrap();
        events.schedule(Kind::Departure, 1.0).unwrap();
        events.schedule(Kind::Arrival, 3.0).unwrap();

        let drained = events.drain_ordered();
        let kinds: Vec<_> = drained.iter().map(|e| (e.time, e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (1.0, Kind::Departure),
                (3.0, Kind::Departure),
                (3.0, Kind::Arrival),
                (3.0, Kind::Arrival),
            ]
        );
        for pair in drained.windows(2) {
            if pair[0].time == pair[1].time {
                assert!(pair[0].seq < pair[1].seq);
            }
        }
    }

    #[test]
    fn empty_list_reports_infinity_and_refuses_removal() {
        let mut events: EventList<Kind> = EventList::new();
        assert_eq!(events.peek_earliest_time(), f64::INFINITY);
        assert_eq!(events.remove_earliest(), Err(KernelError::EmptyEventList));
    }

    #[test]
    fn rejects_negative_and_non_finite_times() {
        let mut events = EventList::new();
        assert!(events.schedule(Kind::Arrival, -1.0).is_err());
        assert!(events.schedule(Kind::Arrival, f64::NAN).is_err());
        assert!(events.schedule(Kind::Arrival, f64::INFINITY).is_err());
        assert!(events.is_empty());
        events.schedule(Kind::Arrival, 0.0).expect("zero is a valid time");
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn insert_reassigns_sequence_numbers() {
        let mut events = EventList::new();
        events
            .insert(Event {
                kind: Kind::Arrival,
                time: 2.0,
                seq: 99,
            })
            .unwrap();
        events
            .insert(Event {
                kind: Kind::Departure,
                time: 2.0,
                seq: 0,
            })
            .unwrap();

        assert_eq!(events.remove_earliest().unwrap().kind, Kind::Arrival);
        assert_eq!(events.remove_earliest().unwrap().kind, Kind::Departure);
    }
}
