/*
 * Copyright (C) 2015-2023 IoT.bzh Company
 * Author: Fulup Ar Foll <fulup@iot.bzh>
 *
 * Redpesk interface code/config use MIT License and can be freely copy/modified even within proprietary code
 * License: $RP_BEGIN_LICENSE$ SPDX:MIT https://opensource.org/licenses/MIT $RP_END_LICENSE$
 *
*/
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Cross thread waitable used by `CanIface::select` to sleep until the rx
/// pipeline delivers a frame or a deadline elapses.
pub trait CanEventHandle: Send + Sync {
    /// Wait at most `timeout`, returns true when signalled.
    fn wait(&self, timeout: Duration) -> bool;
    fn signal(&self);
}

/// Binary semaphore: any number of signals collapse into one pending wakeup.
pub struct BinarySemaphore {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl BinarySemaphore {
    pub fn new() -> Self {
        BinarySemaphore { pending: Mutex::new(false), cond: Condvar::new() }
    }
}

impl Default for BinarySemaphore {
    fn default() -> Self {
        Self::new()
    }
}

impl CanEventHandle for BinarySemaphore {
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while !*pending {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            pending = match self.cond.wait_timeout(pending, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        *pending = false;
        true
    }

    fn signal(&self) {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *pending = true;
        self.cond.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_times_out() {
        let sem = BinarySemaphore::new();
        let start = Instant::now();
        assert!(!sem.wait(Duration::from_millis(5)));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn signals_collapse() {
        let sem = BinarySemaphore::new();
        sem.signal();
        sem.signal();
        assert!(sem.wait(Duration::from_millis(1)));
        assert!(!sem.wait(Duration::from_millis(1)));
    }

    #[test]
    fn wakes_other_thread() {
        let sem = Arc::new(BinarySemaphore::new());
        let waiter = {
            let sem = sem.clone();
            thread::spawn(move || sem.wait(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(10));
        sem.signal();
        assert!(waiter.join().unwrap());
    }
}
