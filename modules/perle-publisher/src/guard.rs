use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single-flight flag for publication cycles.
#[derive(Debug, Clone, Default)]
pub struct CycleGuard {
    running: Arc<AtomicBool>,
}

impl CycleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        !self.running.load(Ordering::Acquire)
    }

    /// Claim the guard. `None` when a cycle is already in flight.
    pub fn try_start(&self) -> Option<CyclePermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CyclePermit {
                running: Arc::clone(&self.running),
            })
    }
}

/// Held for the duration of a cycle; releases the guard on drop.
#[derive(Debug)]
pub struct CyclePermit {
    running: Arc<AtomicBool>,
}

impl Drop for CyclePermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_start_is_refused_until_release() {
        let guard = CycleGuard::new();
        assert!(guard.is_idle());

        let permit = guard.try_start().expect("first start");
        assert!(!guard.is_idle());
        assert!(guard.try_start().is_none());

        drop(permit);
        assert!(guard.is_idle());
        assert!(guard.try_start().is_some());
    }

    #[test]
    fn clones_share_state() {
        let guard = CycleGuard::new();
        let other = guard.clone();
        let _permit = guard.try_start().unwrap();
        assert!(!other.is_idle());
    }

    #[test]
    fn permit_released_on_panic() {
        let guard = CycleGuard::new();
        let g = guard.clone();
        let result = std::panic::catch_unwind(move || {
            let _permit = g.try_start().unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(guard.is_idle());
    }
}
