//! Non-blocking single-permit lock around the control-loop state.
//!
//! Acquisition never waits. A caller that loses the race skips its guarded
//! work for this cycle and tries again on its own schedule. There is no
//! fairness, so a caller can be starved under sustained contention.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct MainLoopGuard {
    held: AtomicBool,
}

impl MainLoopGuard {
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Take the permit if it is free. `true` means the caller now holds it.
    pub fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Return the permit.
    ///
    /// # Panics
    ///
    /// Releasing a permit nobody holds is a logic error.
    pub fn release(&self) {
        let was_held = self.held.swap(false, Ordering::Release);
        assert!(was_held, "main loop guard released while not held");
    }

    /// Scoped variant of [`try_acquire`](Self::try_acquire); the permit is
    /// returned when the token drops.
    pub fn try_lock(&self) -> Option<MainLoopPermit<'_>> {
        if self.try_acquire() {
            Some(MainLoopPermit { guard: self })
        } else {
            None
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub struct MainLoopPermit<'a> {
    guard: &'a MainLoopGuard,
}

impl Drop for MainLoopPermit<'_> {
    fn drop(&mut self) {
        self.guard.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let guard = MainLoopGuard::new();
        assert!(guard.try_acquire());
        assert!(!guard.try_acquire());
        guard.release();
        assert!(guard.try_acquire());
        guard.release();
        assert!(!guard.is_held());
    }

    #[test]
    fn test_permit_releases_on_drop() {
        let guard = MainLoopGuard::new();
        {
            let _permit = guard.try_lock().unwrap();
            assert!(guard.try_lock().is_none());
        }
        assert!(guard.try_lock().is_some());
    }

    #[test]
    #[should_panic(expected = "not held")]
    fn test_release_without_hold_panics() {
        MainLoopGuard::new().release();
    }

    #[test]
    fn test_at_most_one_holder_across_threads() {
        let guard = Arc::new(MainLoopGuard::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();

        for _ in 0..4 {
            let guard = Arc::clone(&guard);
            let inside = Arc::clone(&inside);
            handles.push(thread::spawn(move || {
                for _ in 0..10_000 {
                    if let Some(_permit) = guard.try_lock() {
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(!guard.is_held());
    }
}
