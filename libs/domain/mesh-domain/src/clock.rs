// [libs/domain/mesh-domain/src/clock.rs]
/*!
 * Lamport logical clock.
 *
 * Every mutation that originates on a peer is stamped with `tick()`;
 * every mutation a peer receives from the wire is first folded into the
 * clock with `witness()` so the local clock never falls behind whatever
 * the rest of the mesh has already observed. The clock itself has no
 * opinion about persistence — `fleetmesh-store` reads and writes the
 * raw integer on the interval and at shutdown described in the
 * configuration.
 */

use std::sync::atomic::{AtomicI64, Ordering};

/// A monotonically non-decreasing logical clock.
///
/// `LamportClock` is cheap to clone (it is a thin wrapper over an
/// `Arc<AtomicI64>`-free `AtomicI64`, since the clock is only ever held
/// behind a single `Arc` by its owner) and safe to call from any number of
/// concurrent tasks without external locking.
#[derive(Debug)]
pub struct LamportClock {
    current: AtomicI64,
}

impl LamportClock {
    /// Start a fresh clock at `0`. Use [`LamportClock::restore`] on startup
    /// instead, when a previously persisted value is available.
    pub fn new() -> Self {
        Self {
            current: AtomicI64::new(0),
        }
    }

    /// Rehydrate a clock from a value read back from the persistent store.
    pub fn restore(initial: i64) -> Self {
        Self {
            current: AtomicI64::new(initial),
        }
    }

    /// Read the current value without advancing it.
    pub fn current(&self) -> i64 {
        self.current.load(Ordering::SeqCst)
    }

    /// Advance the clock by one and return the new value. Call this when
    /// originating a mutation — the returned value becomes the mutation's
    /// `lamport_ts`.
    pub fn tick(&self) -> i64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Fold an observed timestamp into the clock: `current := max(current, t)`.
    /// Returns the value the clock held *before* the fold, matching the
    /// semantics callers need when they must tick immediately afterwards to
    /// originate a causally-later event.
    pub fn witness(&self, observed: i64) -> i64 {
        let mut prev = self.current.load(Ordering::SeqCst);
        loop {
            let next = prev.max(observed);
            match self.current.compare_exchange_weak(
                prev,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return prev,
                Err(actual) => prev = actual,
            }
        }
    }
}

impl Default for LamportClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_is_strictly_increasing() {
        let clock = LamportClock::new();
        assert_eq!(clock.tick(), 1);
        assert_eq!(clock.tick(), 2);
        assert_eq!(clock.tick(), 3);
    }

    #[test]
    fn witness_never_decreases_the_clock() {
        let clock = LamportClock::new();
        clock.tick(); // 1
        clock.tick(); // 2
        clock.witness(10);
        assert_eq!(clock.current(), 10);
        clock.witness(1);
        assert_eq!(clock.current(), 10, "witnessing a lower value must be a no-op");
    }

    #[test]
    fn restore_seeds_from_persisted_value() {
        let clock = LamportClock::restore(42);
        assert_eq!(clock.current(), 42);
        assert_eq!(clock.tick(), 43);
    }

    #[test]
    fn witness_then_tick_originates_strictly_after_observed() {
        let clock = LamportClock::new();
        clock.witness(5);
        let ts = clock.tick();
        assert!(ts > 5);
    }
}
