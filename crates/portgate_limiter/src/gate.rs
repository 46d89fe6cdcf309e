//! Per-port in-flight counters.

use dashmap::DashMap;
use tracing::trace;

/// Independent counter sets a supervisor keeps.
///
/// `Request` slots are held for the duration of a supervised call. `Background`
/// slots are acquired and released by hand, for long-lived work whose end the
/// supervisor cannot observe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Namespace {
    /// Slots held by `call`.
    Request,
    /// Slots held between `acquire_key` and `release_key`.
    Background,
}

/// Bounded in-flight counter per port.
///
/// Counts always stay within `0..=capacity`: acquiring a full port and releasing
/// an idle one are both clamped rather than reported. Each port lives in its own
/// `DashMap` shard entry, so ports never contend on a global lock and same-port
/// updates are serialized.
///
/// # Example
///
/// ```
/// use portgate_limiter::{Gate, Namespace};
///
/// let gate = Gate::new(Namespace::Request, 2);
/// assert!(gate.try_acquire("drive"));
/// assert!(gate.try_acquire("drive"));
/// assert!(!gate.try_acquire("drive"));
/// assert!(!gate.has_free_slot("drive"));
///
/// gate.release("drive");
/// assert_eq!(gate.in_flight("drive"), 1);
/// ```
#[derive(Debug)]
pub struct Gate {
    namespace: Namespace,
    capacity: usize,
    counters: DashMap<String, usize>,
}

impl Gate {
    /// Create a gate allowing `capacity` concurrent slots per port.
    pub fn new(namespace: Namespace, capacity: usize) -> Self {
        Self {
            namespace,
            capacity,
            counters: DashMap::new(),
        }
    }

    /// Namespace this gate counts for.
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Slots per port.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Start tracking `port` at zero. No-op for known ports.
    pub fn register(&self, port: &str) {
        if !self.counters.contains_key(port) {
            self.counters.entry(port.to_string()).or_insert(0);
        }
    }

    /// True when `port` has fewer than `capacity` slots in use.
    pub fn has_free_slot(&self, port: &str) -> bool {
        self.in_flight(port) < self.capacity
    }

    /// Take a slot unconditionally, clamped at `capacity`.
    pub fn acquire(&self, port: &str) {
        let mut count = self.counters.entry(port.to_string()).or_insert(0);
        *count = (*count + 1).min(self.capacity);
        trace!(namespace = %self.namespace, port, in_flight = *count, "Slot acquired");
    }

    /// Take a slot only if one is free, as a single step.
    pub fn try_acquire(&self, port: &str) -> bool {
        let mut count = self.counters.entry(port.to_string()).or_insert(0);
        if *count < self.capacity {
            *count += 1;
            trace!(namespace = %self.namespace, port, in_flight = *count, "Slot acquired");
            true
        } else {
            false
        }
    }

    /// Give a slot back, clamped at zero.
    pub fn release(&self, port: &str) {
        if let Some(mut count) = self.counters.get_mut(port) {
            *count = count.saturating_sub(1);
            trace!(namespace = %self.namespace, port, in_flight = *count, "Slot released");
        }
    }

    /// Slots currently in use for `port`.
    pub fn in_flight(&self, port: &str) -> usize {
        self.counters.get(port).map_or(0, |count| *count)
    }

    /// Every port this gate has seen.
    pub fn ports(&self) -> Vec<String> {
        self.counters.iter().map(|entry| entry.key().clone()).collect()
    }
}

/// A held slot that is returned to its gate when dropped.
///
/// Dropping covers every exit path of the holder, including errors, panics and
/// cancelled futures.
#[derive(Debug)]
#[must_use = "dropping the permit releases the slot immediately"]
pub struct SlotPermit<'a> {
    gate: &'a Gate,
    port: String,
    armed: bool,
}

impl<'a> SlotPermit<'a> {
    pub(crate) fn new(gate: &'a Gate, port: &str) -> Self {
        Self {
            gate,
            port: port.to_string(),
            armed: true,
        }
    }

    /// Port the slot belongs to.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Keep the slot after the permit goes away; it must be released by hand.
    pub fn detach(mut self) {
        self.armed = false;
    }
}

impl Drop for SlotPermit<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.gate.release(&self.port);
        }
    }
}
