//! Tick-driven timers: a single countdown scalar and a delayed-task queue.
//!
//! Nothing here sleeps. Both types advance only when the host loop hands
//! them the elapsed frame time.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A countdown that never goes negative and fires exactly once per arming.
#[derive(Debug, Clone, Default)]
pub struct Countdown {
    remaining: f32,
    armed: bool,
}

impl Countdown {
    pub fn new(seconds: f32) -> Self {
        let mut countdown = Self::default();
        countdown.reset(seconds);
        countdown
    }

    /// Re-arms the countdown. Negative or non-finite input clamps to zero,
    /// which fires on the next tick.
    pub fn reset(&mut self, seconds: f32) {
        self.remaining = if seconds.is_finite() {
            seconds.max(0.0)
        } else {
            0.0
        };
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.remaining = 0.0;
        self.armed = false;
    }

    /// Lowers the remaining time to at most `seconds` without re-arming.
    pub fn truncate(&mut self, seconds: f32) {
        if self.armed {
            self.remaining = self.remaining.min(seconds.max(0.0));
        }
    }

    /// Advances the countdown. Returns true on the tick it reaches zero.
    pub fn tick(&mut self, dt: f32) -> bool {
        if !self.armed {
            return false;
        }
        if dt.is_finite() && dt > 0.0 {
            self.remaining = (self.remaining - dt).max(0.0);
        }
        if self.remaining <= 0.0 {
            self.armed = false;
            return true;
        }
        false
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

struct Entry<T> {
    due: f64,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed so the BinaryHeap pops the earliest task first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Deferred tasks fired from the host tick.
///
/// Cancellation is guard-on-fire: handlers re-check the state they act on
/// when a task comes due, so a stale task simply does nothing.
pub struct Scheduler<T> {
    now: f64,
    next_seq: u64,
    queue: BinaryHeap<Entry<T>>,
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now: 0.0,
            next_seq: 0,
            queue: BinaryHeap::new(),
        }
    }

    pub fn schedule(&mut self, delay: f32, task: T) {
        let delay = if delay.is_finite() {
            delay.max(0.0)
        } else {
            0.0
        };
        let entry = Entry {
            due: self.now + delay as f64,
            seq: self.next_seq,
            task,
        };
        self.next_seq += 1;
        self.queue.push(entry);
    }

    /// Advances scheduler time and returns every task now due, earliest first.
    pub fn advance(&mut self, dt: f32) -> Vec<T> {
        if dt.is_finite() && dt > 0.0 {
            self.now += dt as f64;
        }

        let mut due = Vec::new();
        while let Some(entry) = self.queue.peek() {
            if entry.due > self.now {
                break;
            }
            if let Some(entry) = self.queue.pop() {
                due.push(entry.task);
            }
        }
        due
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
