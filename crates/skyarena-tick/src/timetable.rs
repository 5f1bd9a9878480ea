//! Periodic main-context tasks keyed by tick cadence.

use std::time::Duration;

use crate::TickConfig;

/// How often a task runs, in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    every: u64,
    offset: u64,
}

impl Cadence {
    /// Runs every `every` ticks. Zero is treated as every tick.
    pub fn every(every: u64) -> Self {
        Self {
            every: every.max(1),
            offset: 0,
        }
    }

    /// Runs once per `period` at the clock's configured rate.
    pub fn from_period(period: Duration, config: &TickConfig) -> Self {
        Self::every(config.ticks_for(period))
    }

    /// Shifts the task by `offset` ticks so tasks with the same period
    /// do not all land on the same tick.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset % self.every;
        self
    }

    pub fn period(&self) -> u64 {
        self.every
    }

    /// Whether the task is due on `tick` (ticks start at 1).
    pub fn is_due(&self, tick: u64) -> bool {
        tick >= self.every && tick % self.every == self.offset
    }
}

/// A fixed set of repeating tasks.
///
/// `K` is whatever the owner uses to name its tasks, usually a small
/// `Copy` enum. Tasks are reported in registration order.
#[derive(Debug, Clone)]
pub struct Timetable<K> {
    entries: Vec<(K, Cadence)>,
}

impl<K: Copy + PartialEq> Timetable<K> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers `task`. Registering the same key again replaces its cadence.
    pub fn schedule(&mut self, task: K, cadence: Cadence) -> &mut Self {
        match self.entries.iter_mut().find(|(k, _)| *k == task) {
            Some(entry) => entry.1 = cadence,
            None => self.entries.push((task, cadence)),
        }
        self
    }

    /// Tasks due on `tick`, in registration order.
    pub fn due(&self, tick: u64) -> impl Iterator<Item = K> + '_ {
        self.entries
            .iter()
            .filter(move |(_, cadence)| cadence.is_due(tick))
            .map(|(task, _)| *task)
    }

    pub fn cadence(&self, task: K) -> Option<Cadence> {
        self.entries
            .iter()
            .find(|(k, _)| *k == task)
            .map(|(_, cadence)| *cadence)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Copy + PartialEq> Default for Timetable<K> {
    fn default() -> Self {
        Self::new()
    }
}
