use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};
use tracing::trace;

/// Exclusive guard over every region that brings the engine or dataset up
/// or tears it down.
///
/// Background stages hold it for each bring-up step; `stop()` holds it for
/// the whole unload / deinit sequence. Poisoning is ignored: the lock guards
/// no data of its own, only the ordering of SDK calls.
#[derive(Debug, Default)]
pub struct ShutdownLock {
    inner: Mutex<()>,
}

/// Held shutdown lock; released on drop.
pub struct ShutdownGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl ShutdownLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) -> ShutdownGuard<'_> {
        trace!("acquiring shutdown lock");
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        ShutdownGuard { _guard: guard }
    }

    pub fn try_acquire(&self) -> Option<ShutdownGuard<'_>> {
        match self.inner.try_lock() {
            Ok(guard) => Some(ShutdownGuard { _guard: guard }),
            Err(TryLockError::Poisoned(e)) => Some(ShutdownGuard {
                _guard: e.into_inner(),
            }),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(move || {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            std::process::exit(1);
        }
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
        eprintln!("\nshutdown requested, finishing current session cycle...");
    });
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn try_acquire_returns_none_when_held() {
        let lock = ShutdownLock::new();
        let _guard = lock.acquire();
        assert!(lock.try_acquire().is_none());
    }

    #[test]
    fn lock_released_on_drop() {
        let lock = ShutdownLock::new();
        {
            let _guard = lock.acquire();
        }
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn poisoned_lock_is_still_usable() {
        let lock = Arc::new(ShutdownLock::new());
        let l = Arc::clone(&lock);
        let _ = thread::spawn(move || {
            let _guard = l.acquire();
            panic!("stage panicked while holding the lock");
        })
        .join();

        assert!(lock.try_acquire().is_some());
        let _guard = lock.acquire();
    }

    #[test]
    fn acquire_waits_for_holder() {
        let lock = Arc::new(ShutdownLock::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let guard = lock.acquire();
        let (l, o) = (Arc::clone(&lock), Arc::clone(&order));
        let waiter = thread::spawn(move || {
            let _guard = l.acquire();
            o.lock().unwrap().push("waiter");
        });

        thread::sleep(std::time::Duration::from_millis(20));
        order.lock().unwrap().push("holder");
        drop(guard);
        waiter.join().unwrap();

        assert_eq!(*order.lock().unwrap(), vec!["holder", "waiter"]);
    }
}
