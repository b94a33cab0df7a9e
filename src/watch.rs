// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! One-shot broadcast signals for watch notifications
//!
//! Every node and every leaf carries a [`WatchSignal`]. A committing
//! transaction with mutation tracking enabled fires the signals of the
//! positions it replaced; any number of readers may hold clones of a
//! signal and block on it. Firing is permanent: once fired a signal stays
//! fired, and the replacement node carries a fresh one.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct SignalState {
    /// Fast path for `has_fired`; the mutex-guarded flag is authoritative
    /// for waiters.
    fired: AtomicBool,
    lock: Mutex<bool>,
    cond: Condvar,
}

/// A clonable handle to a one-shot broadcast signal.
///
/// Obtained from [`RadixTree::get_watch`](crate::RadixTree::get_watch) or
/// [`Iter::seek_prefix_watch`](crate::Iter::seek_prefix_watch). All clones
/// observe the same underlying signal; equality and hashing are by signal
/// identity, not by state.
pub struct WatchSignal {
    inner: Arc<SignalState>,
}

impl WatchSignal {
    pub(crate) fn new() -> Self {
        WatchSignal {
            inner: Arc::new(SignalState {
                fired: AtomicBool::new(false),
                lock: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    /// Transition to the fired state and wake all waiters. Idempotent.
    pub(crate) fn fire(&self) {
        if self.inner.fired.swap(true, Ordering::Release) {
            return;
        }
        let mut fired = self.inner.lock.lock();
        *fired = true;
        self.inner.cond.notify_all();
    }

    /// Whether the signal has fired.
    #[inline]
    pub fn has_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Block the calling thread until the signal fires. Returns
    /// immediately if it already has.
    pub fn wait(&self) {
        if self.has_fired() {
            return;
        }
        let mut fired = self.inner.lock.lock();
        while !*fired {
            self.inner.cond.wait(&mut fired);
        }
    }

    /// Block until the signal fires or `timeout` elapses. Returns whether
    /// the signal fired.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        if self.has_fired() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        let mut fired = self.inner.lock.lock();
        while !*fired {
            if self.inner.cond.wait_until(&mut fired, deadline).timed_out() {
                return *fired;
            }
        }
        true
    }

    /// Stable identity of the underlying signal, used for de-duplication
    /// in the transaction's tracked set.
    #[inline]
    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl Clone for WatchSignal {
    fn clone(&self) -> Self {
        WatchSignal {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl PartialEq for WatchSignal {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for WatchSignal {}

impl Hash for WatchSignal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.id());
    }
}

impl std::fmt::Debug for WatchSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSignal")
            .field("fired", &self.has_fired())
            .finish()
    }
}
