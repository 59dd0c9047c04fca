use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::Half;

/// The two notification latches shared between interrupt and consumer.
///
/// Only the notification handler raises a latch, only the consumer takes it.
/// A latch raised while it is still set is counted as dropped rather than
/// queued.
pub struct CompletionFlags {
    half_ready: AtomicBool,
    full_ready: AtomicBool,
    raised: AtomicU32,
    dropped: AtomicU32,
    faults: AtomicU32,
}

impl CompletionFlags {
    pub const fn new() -> Self {
        Self {
            half_ready: AtomicBool::new(false),
            full_ready: AtomicBool::new(false),
            raised: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            faults: AtomicU32::new(0),
        }
    }

    fn latch(&self, half: Half) -> &AtomicBool {
        match half {
            Half::First => &self.half_ready,
            Half::Second => &self.full_ready,
        }
    }

    /// Set the latch for `half`. Interrupt context only.
    ///
    /// Returns `false` when the latch was already set, in which case the
    /// earlier notification is lost.
    pub fn raise(&self, half: Half) -> bool {
        self.raised.fetch_add(1, Ordering::Relaxed);

        // Release: every sample the transfer engine wrote before this point is
        // visible to whoever takes the latch
        let was_set = self.latch(half).swap(true, Ordering::Release);
        if was_set {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }

        !was_set
    }

    /// Clear the latch for `half` and report whether it was set. Consumer only.
    ///
    /// Taking a latch that is not set changes nothing.
    pub fn take(&self, half: Half) -> bool {
        self.latch(half).swap(false, Ordering::Acquire)
    }

    pub fn is_set(&self, half: Half) -> bool {
        self.latch(half).load(Ordering::Relaxed)
    }

    pub fn any_pending(&self) -> bool {
        self.is_set(Half::First) || self.is_set(Half::Second)
    }

    /// Count `conditions` acknowledged hardware error conditions.
    pub fn record_faults(&self, conditions: u32) {
        self.faults.fetch_add(conditions, Ordering::Relaxed);
    }

    /// Total number of notifications raised since power-on.
    pub fn raised(&self) -> u32 {
        self.raised.load(Ordering::Relaxed)
    }

    /// Notifications lost because the consumer had not taken the latch yet.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn faults(&self) -> u32 {
        self.faults.load(Ordering::Relaxed)
    }
}

impl Default for CompletionFlags {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_then_take() {
        let flags = CompletionFlags::new();
        assert!(!flags.any_pending());

        assert!(flags.raise(Half::First));
        assert!(flags.is_set(Half::First));
        assert!(!flags.is_set(Half::Second));

        assert!(flags.take(Half::First));
        assert!(!flags.any_pending());
        assert_eq!(flags.raised(), 1);
        assert_eq!(flags.dropped(), 0);
    }

    #[test]
    fn taking_a_clear_latch_is_a_noop() {
        let flags = CompletionFlags::new();

        assert!(!flags.take(Half::Second));
        assert!(!flags.take(Half::Second));
        assert!(!flags.any_pending());
        assert_eq!(flags.raised(), 0);
    }

    #[test]
    fn raising_twice_drops_one() {
        let flags = CompletionFlags::new();

        assert!(flags.raise(Half::Second));
        assert!(!flags.raise(Half::Second));
        assert_eq!(flags.dropped(), 1);

        // Still only one notification to consume
        assert!(flags.take(Half::Second));
        assert!(!flags.take(Half::Second));
        assert_eq!(flags.raised(), 2);
    }

    #[test]
    fn latches_are_independent() {
        let flags = CompletionFlags::new();

        flags.raise(Half::First);
        flags.raise(Half::Second);
        assert!(flags.take(Half::Second));
        assert!(flags.is_set(Half::First));
        assert_eq!(flags.dropped(), 0);
    }

    #[test]
    fn faults_are_counted() {
        let flags = CompletionFlags::new();
        flags.record_faults(1);
        flags.record_faults(2);

        assert_eq!(flags.faults(), 3);
        assert!(!flags.any_pending());
    }

    #[test]
    fn every_raise_is_either_taken_or_dropped() {
        static FLAGS: CompletionFlags = CompletionFlags::new();
        const ROUNDS: u32 = 10_000;

        let producer = std::thread::spawn(|| {
            for i in 0..ROUNDS {
                let half = if i % 2 == 0 { Half::First } else { Half::Second };
                FLAGS.raise(half);
            }
        });

        let mut taken = 0;
        while !producer.is_finished() {
            taken += u32::from(FLAGS.take(Half::First));
            taken += u32::from(FLAGS.take(Half::Second));
        }
        producer.join().unwrap();
        taken += u32::from(FLAGS.take(Half::First));
        taken += u32::from(FLAGS.take(Half::Second));

        assert_eq!(FLAGS.raised(), ROUNDS);
        assert_eq!(taken + FLAGS.dropped(), ROUNDS);
    }
}
