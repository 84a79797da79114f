//! Signal source driven by the test instead of the operating system.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use nix::sys::signal::Signal;

use crate::process::{ShutdownError, SignalSource, SignalSubscription};

#[derive(Debug, Default)]
struct Queue {
    pending: VecDeque<Signal>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
}

/// Delivers signals queued with [`ManualSignals::deliver`].
#[derive(Debug, Clone, Default)]
pub struct ManualSignals {
    shared: Arc<Shared>,
}

impl ManualSignals {
    /// Queues `signal` for the next waiting subscription.
    pub fn deliver(&self, signal: Signal) {
        let mut queue = self.shared.queue.lock().expect("signal queue poisoned");
        queue.pending.push_back(signal);
        self.shared.ready.notify_all();
    }
}

impl SignalSource for ManualSignals {
    fn subscribe(&self) -> Result<Box<dyn SignalSubscription>, ShutdownError> {
        self.shared.queue.lock().expect("signal queue poisoned").closed = false;
        Ok(Box::new(ManualSubscription {
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct ManualSubscription {
    shared: Arc<Shared>,
}

impl SignalSubscription for ManualSubscription {
    fn wait(&self) -> Option<Signal> {
        let queue = self.shared.queue.lock().expect("signal queue poisoned");
        let mut queue = self
            .shared
            .ready
            .wait_while(queue, |queue| queue.pending.is_empty() && !queue.closed)
            .expect("signal queue poisoned");
        queue.pending.pop_front()
    }

    fn close(&self) {
        let mut queue = self.shared.queue.lock().expect("signal queue poisoned");
        queue.closed = true;
        self.shared.ready.notify_all();
    }
}
