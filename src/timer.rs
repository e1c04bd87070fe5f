//! Logical-time one-shot timers, advanced cooperatively by the host.

use std::collections::BTreeMap;
use std::fmt;

/// Registry of named one-shot timers counted in logical ticks.
///
/// There is no wall clock anywhere in the core: the host calls
/// [`tick`](TickingTimers::tick), every armed timer counts down by one, and
/// the names whose countdown reached zero are handed back for the caller to
/// act on. Keeping the firing on the caller's side (instead of stored
/// callbacks) keeps the registry free of references into the state it
/// drives.
pub struct TickingTimers<K> {
    armed: BTreeMap<K, u32>,
}

impl<K: Ord + Copy + fmt::Debug> TickingTimers<K> {
    /// Creates a registry with no armed timers
    pub fn new() -> TickingTimers<K> {
        TickingTimers { armed: BTreeMap::new() }
    }

    /// Arms the named timer to fire after `ticks` ticks. Arming a timer
    /// that is already running leaves the running countdown in place.
    pub fn arm(&mut self, key: K, ticks: u32) {
        assert!(ticks > 0, "timers must be armed with at least one tick");
        if self.armed.contains_key(&key) {
            trace!("timer {:?} already armed", key);
            return;
        }
        self.armed.insert(key, ticks);
    }

    /// Disarms the named timer; disarming an idle timer is a no-op
    pub fn cancel(&mut self, key: &K) {
        self.armed.remove(key);
    }

    /// Flag indicating whether the named timer is running
    pub fn is_armed(&self, key: &K) -> bool {
        self.armed.contains_key(key)
    }

    /// Advances logical time by one tick and returns the names of the
    /// timers that fired, in ascending name order. Fired timers may be
    /// re-armed.
    pub fn tick(&mut self) -> Vec<K> {
        let mut fired = Vec::new();
        self.armed.retain(|key, remaining| {
            *remaining -= 1;
            if *remaining == 0 {
                fired.push(*key);
                false
            } else {
                true
            }
        });
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_after_the_armed_number_of_ticks() {
        let mut timers = TickingTimers::new();
        timers.arm("slow-path", 2);
        assert!(timers.is_armed(&"slow-path"));

        assert!(timers.tick().is_empty());
        assert!(timers.is_armed(&"slow-path"));

        assert_eq!(vec!["slow-path"], timers.tick());
        assert!(!timers.is_armed(&"slow-path"));
        assert!(timers.tick().is_empty());
    }

    #[test]
    fn arming_twice_keeps_the_running_countdown() {
        let mut timers = TickingTimers::new();
        timers.arm("t", 1);
        timers.arm("t", 10);
        assert_eq!(vec!["t"], timers.tick());
    }

    #[test]
    fn cancel_disarms() {
        let mut timers = TickingTimers::new();
        timers.arm("t", 1);
        timers.cancel(&"t");
        assert!(!timers.is_armed(&"t"));
        assert!(timers.tick().is_empty());

        // cancelled timers may be re-armed
        timers.arm("t", 1);
        assert_eq!(vec!["t"], timers.tick());
    }

    #[test]
    fn fires_in_name_order() {
        let mut timers = TickingTimers::new();
        timers.arm("b", 1);
        timers.arm("a", 1);
        timers.arm("c", 2);
        assert_eq!(vec!["a", "b"], timers.tick());
        assert_eq!(vec!["c"], timers.tick());
    }
}
