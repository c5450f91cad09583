//! Bounded history container that forgets records older than a rolling window.

use std::collections::VecDeque;
use std::sync::Arc;

use log::trace;

use super::clock::{Clock, SystemClock};
use super::types::Timestamped;

/// Insertion-ordered records, evicted by age.
///
/// Eviction is a prefix trim: records are expected to arrive in roughly
/// chronological order, so the scan stops at the first record still inside
/// the window. An out-of-order record older than its successors stays until
/// the cutoff passes the records in front of it.
pub struct TimeWindowBuffer<T: Timestamped> {
    items: VecDeque<T>,
    window_ms: u64,
    clock: Arc<dyn Clock>,
}

impl<T: Timestamped + Clone> TimeWindowBuffer<T> {
    pub fn new(window_ms: u64) -> Self {
        Self::with_clock(window_ms, Arc::new(SystemClock))
    }

    pub fn with_clock(window_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            items: VecDeque::new(),
            window_ms,
            clock,
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        self.evict();
    }

    pub fn push_many<I: IntoIterator<Item = T>>(&mut self, items: I) {
        self.items.extend(items);
        self.evict();
    }

    /// Drops every record in front of the first one with `timestamp >= now - window`.
    pub fn evict(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let window = i64::try_from(self.window_ms).unwrap_or(i64::MAX);
        let cutoff = self.clock.now_ms().saturating_sub(window);
        match self.items.iter().position(|item| item.timestamp() >= cutoff) {
            Some(0) => {}
            Some(first_valid) => {
                trace!("evicting {} record(s) older than {}", first_valid, cutoff);
                self.items.drain(..first_valid);
            }
            None => {
                trace!("evicting all {} record(s)", self.items.len());
                self.items.clear();
            }
        }
    }

    /// Evicts, then returns a copy of what is left.
    pub fn get_all(&mut self) -> Vec<T> {
        self.evict();
        self.items.iter().cloned().collect()
    }

    /// Records with `start <= timestamp <= end`. Does not evict.
    pub fn get_range(&self, start: i64, end: i64) -> Vec<T> {
        self.items
            .iter()
            .filter(|item| item.timestamp() >= start && item.timestamp() <= end)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Age of the oldest retained record, in milliseconds (0 when empty).
    pub fn get_duration(&mut self) -> i64 {
        self.evict();
        match self.items.front() {
            Some(oldest) => self.clock.now_ms() - oldest.timestamp(),
            None => 0,
        }
    }

    pub fn window_duration(&self) -> u64 {
        self.window_ms
    }

    /// Takes effect at the next eviction.
    pub fn set_window_duration(&mut self, window_ms: u64) {
        self.window_ms = window_ms;
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_capture::clock::ManualClock;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(i64);

    impl Timestamped for Item {
        fn timestamp(&self) -> i64 {
            self.0
        }
    }

    fn buffer(window: u64, now: i64) -> (TimeWindowBuffer<Item>, ManualClock) {
        let clock = ManualClock::new(now);
        (TimeWindowBuffer::with_clock(window, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn retains_maximal_suffix_inside_window() {
        let (mut buf, clock) = buffer(1_000, 0);
        for ts in [100, 200, 900, 1_500, 2_000] {
            buf.items.push_back(Item(ts));
        }
        clock.set(2_100);
        buf.evict();

        let kept = buf.get_all();
        assert_eq!(kept, vec![Item(1_500), Item(2_000)]);
        assert!(kept.iter().all(|i| 2_100 - i.0 <= 1_000));
    }

    #[test]
    fn record_exactly_on_cutoff_is_kept() {
        let (mut buf, _clock) = buffer(1_000, 5_000);
        buf.push(Item(4_000));
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn everything_expired_clears_buffer() {
        let (mut buf, clock) = buffer(1_000, 1_000);
        buf.push_many(vec![Item(500), Item(900)]);
        assert_eq!(buf.len(), 2);
        clock.advance(10_000);
        assert!(buf.get_all().is_empty());
        assert_eq!(buf.get_duration(), 0);
    }

    #[test]
    fn out_of_order_record_lingers_behind_newer_one() {
        let (mut buf, clock) = buffer(1_000, 2_000);
        buf.push(Item(1_900));
        buf.push(Item(1_100));
        clock.set(2_500);
        buf.evict();
        // 1_100 is past the cutoff of 1_500 but sits behind a record that is not
        assert_eq!(buf.get_all(), vec![Item(1_900), Item(1_100)]);
    }

    #[test]
    fn oversized_window_keeps_everything() {
        let (mut buf, clock) = buffer(u64::MAX, 1_000);
        buf.push_many(vec![Item(-5_000), Item(0), Item(1_000)]);
        clock.set(1_700_000_000_000);
        assert_eq!(buf.get_all().len(), 3);
    }

    #[test]
    fn get_all_is_a_defensive_copy() {
        let (mut buf, _clock) = buffer(1_000, 100);
        buf.push(Item(100));
        let mut copy = buf.get_all();
        copy.clear();
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn get_range_is_inclusive_and_does_not_evict() {
        let (mut buf, clock) = buffer(1_000, 300);
        buf.push_many(vec![Item(100), Item(200), Item(300)]);
        clock.set(10_000);
        assert_eq!(buf.get_range(100, 200), vec![Item(100), Item(200)]);
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn duration_measures_oldest_record() {
        let (mut buf, clock) = buffer(10_000, 1_000);
        buf.push(Item(1_000));
        buf.push(Item(1_500));
        clock.set(4_000);
        assert_eq!(buf.get_duration(), 3_000);
    }

    #[test]
    fn shrinking_window_applies_on_next_eviction() {
        let (mut buf, clock) = buffer(10_000, 0);
        buf.push_many(vec![Item(0), Item(5_000), Item(9_000)]);
        clock.set(10_000);
        buf.set_window_duration(2_000);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.get_all(), vec![Item(9_000)]);
        assert_eq!(buf.window_duration(), 2_000);
    }
}
