//! Timer bookkeeping for the session loop.
//!
//! Provides one-shot and repeating timers keyed by [`TimerId`]. The manager
//! never sleeps; the owner asks for [`TimerManager::next_deadline`], waits on
//! its own runtime, then calls [`TimerManager::process_expired_at`] to learn
//! which timers fired. Taking `now` explicitly keeps tests deterministic.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use slotmap::{SlotMap, new_key_type};

use crate::error::{Result, TimerError};
use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a timer.
    pub struct TimerId;
}

/// The type of timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Fires once after the specified duration.
    OneShot,
    /// Fires repeatedly at the specified interval.
    Repeating,
}

#[derive(Debug)]
struct TimerData {
    next_fire: Instant,
    interval: Duration,
    kind: TimerKind,
}

/// An entry in the timer queue (min-heap by fire time).
#[derive(Debug, Clone, Copy)]
struct TimerQueueEntry {
    id: TimerId,
    fire_time: Instant,
}

impl PartialEq for TimerQueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_time == other.fire_time
    }
}

impl Eq for TimerQueueEntry {}

impl PartialOrd for TimerQueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerQueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap.
        other.fire_time.cmp(&self.fire_time)
    }
}

/// Schedules one-shot and repeating timers.
#[derive(Debug, Default)]
pub struct TimerManager {
    timers: SlotMap<TimerId, TimerData>,
    queue: BinaryHeap<TimerQueueEntry>,
}

impl TimerManager {
    /// Create a new timer manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a one-shot timer firing `duration` after `now`.
    pub fn start_one_shot(&mut self, now: Instant, duration: Duration) -> TimerId {
        self.insert(now, duration, TimerKind::OneShot)
    }

    /// Start a repeating timer. The first fire is `interval` after `now`.
    pub fn start_repeating(&mut self, now: Instant, interval: Duration) -> TimerId {
        self.insert(now, interval, TimerKind::Repeating)
    }

    fn insert(&mut self, now: Instant, interval: Duration, kind: TimerKind) -> TimerId {
        let next_fire = now + interval;
        let id = self.timers.insert(TimerData {
            next_fire,
            interval,
            kind,
        });
        self.queue.push(TimerQueueEntry {
            id,
            fire_time: next_fire,
        });
        tracing::trace!(target: targets::TIMER, ?id, ?kind, ?interval, "timer started");
        id
    }

    /// Stop and remove a timer.
    pub fn stop(&mut self, id: TimerId) -> Result<()> {
        if self.timers.remove(id).is_some() {
            tracing::trace!(target: targets::TIMER, ?id, "timer stopped");
            Ok(())
        } else {
            Err(TimerError::InvalidTimerId.into())
        }
    }

    /// Check if a timer is currently scheduled.
    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.contains_key(id)
    }

    /// The earliest instant at which a live timer fires.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_stale();
        self.queue.peek().map(|entry| entry.fire_time)
    }

    /// Time from `now` until the next timer fires, if any.
    pub fn time_until_next(&mut self, now: Instant) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    // Drop queue entries whose timer was stopped or rescheduled.
    fn discard_stale(&mut self) {
        while let Some(entry) = self.queue.peek() {
            match self.timers.get(entry.id) {
                Some(timer) if timer.next_fire == entry.fire_time => break,
                _ => {
                    self.queue.pop();
                }
            }
        }
    }

    /// Collect every timer due at `now`.
    ///
    /// One-shot timers are removed once fired. Repeating timers are
    /// rescheduled one interval after `now`, so a late caller sees a single
    /// fire rather than a burst of missed ones.
    #[tracing::instrument(skip(self), target = "topoview_core::timer", level = "trace")]
    pub fn process_expired_at(&mut self, now: Instant) -> Vec<TimerId> {
        let mut fired = Vec::new();

        while let Some(entry) = self.queue.peek().copied() {
            if entry.fire_time > now {
                break;
            }
            self.queue.pop();

            let Some(timer) = self.timers.get_mut(entry.id) else {
                continue;
            };
            if timer.next_fire != entry.fire_time {
                continue;
            }

            tracing::trace!(target: targets::TIMER, id = ?entry.id, "timer fired");
            fired.push(entry.id);

            match timer.kind {
                TimerKind::OneShot => {
                    self.timers.remove(entry.id);
                }
                TimerKind::Repeating => {
                    timer.next_fire = now + timer.interval;
                    self.queue.push(TimerQueueEntry {
                        id: entry.id,
                        fire_time: timer.next_fire,
                    });
                }
            }
        }

        fired
    }

    /// Get the number of live timers.
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_one_shot_fires_once() {
        let start = Instant::now();
        let mut timers = TimerManager::new();
        let id = timers.start_one_shot(start, 100 * MS);

        assert!(timers.process_expired_at(start + 99 * MS).is_empty());
        assert_eq!(timers.process_expired_at(start + 100 * MS), vec![id]);
        assert!(!timers.is_active(id));
        assert!(timers.process_expired_at(start + 500 * MS).is_empty());
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn test_repeating_reschedules_from_now() {
        let start = Instant::now();
        let mut timers = TimerManager::new();
        let id = timers.start_repeating(start, 500 * MS);

        assert_eq!(timers.process_expired_at(start + 500 * MS), vec![id]);
        assert_eq!(timers.next_deadline(), Some(start + 1000 * MS));

        // Late by several periods: one fire, not a burst.
        assert_eq!(timers.process_expired_at(start + 3000 * MS), vec![id]);
        assert_eq!(timers.time_until_next(start + 3000 * MS), Some(500 * MS));
        assert!(timers.is_active(id));
    }

    #[test]
    fn test_stop_cancels_pending_fire() {
        let start = Instant::now();
        let mut timers = TimerManager::new();
        let id = timers.start_repeating(start, 10 * MS);
        let other = timers.start_one_shot(start, 20 * MS);

        timers.stop(id).unwrap();
        assert_eq!(timers.next_deadline(), Some(start + 20 * MS));
        assert_eq!(timers.process_expired_at(start + 50 * MS), vec![other]);
        assert_eq!(timers.active_count(), 0);

        assert_eq!(timers.stop(id), Err(CoreError::Timer(TimerError::InvalidTimerId)));
    }

    #[test]
    fn test_fire_order_follows_deadlines() {
        let start = Instant::now();
        let mut timers = TimerManager::new();
        let late = timers.start_one_shot(start, 30 * MS);
        let early = timers.start_one_shot(start, 10 * MS);

        assert_eq!(timers.process_expired_at(start + 30 * MS), vec![early, late]);
    }
}
