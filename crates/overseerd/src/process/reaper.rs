use std::process::Child;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use super::PROCESS_TARGET;

/// Owns spawned children until they exit.
///
/// Exited children stay zombies until waited on, and a zombie still answers
/// the liveness probe. Supervisors reap before probing.
#[derive(Debug, Default)]
pub struct ChildReaper {
    children: Mutex<Vec<(String, Child)>>,
}

impl ChildReaper {
    /// Creates an empty reaper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a freshly spawned child.
    pub fn adopt(&self, name: &str, child: Child) {
        self.guard().push((name.to_owned(), child));
    }

    /// Waits on every exited child without blocking; returns how many exited.
    pub fn reap(&self) -> usize {
        let mut children = self.guard();
        let before = children.len();
        children.retain_mut(|(name, child)| match child.try_wait() {
            Ok(Some(status)) => {
                debug!(
                    target: PROCESS_TARGET,
                    child = %name,
                    pid = child.id(),
                    %status,
                    "child exited"
                );
                false
            }
            Ok(None) => true,
            Err(error) => {
                warn!(
                    target: PROCESS_TARGET,
                    child = %name,
                    pid = child.id(),
                    error = %error,
                    "failed to poll child"
                );
                true
            }
        });
        before - children.len()
    }

    /// Children still being tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// Whether no children are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<(String, Child)>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::process::Command;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn exited_children_are_reaped() {
        let reaper = ChildReaper::new();
        reaper.adopt("quick", Command::new("true").spawn().expect("spawn true"));
        reaper.adopt("slow", Command::new("sleep").arg("2").spawn().expect("spawn sleep"));

        let deadline = Instant::now() + Duration::from_secs(1);
        let mut reaped = 0;
        while reaped == 0 && Instant::now() < deadline {
            reaped += reaper.reap();
            thread::sleep(Duration::from_millis(20));
        }

        assert_eq!(reaped, 1);
        assert_eq!(reaper.len(), 1);
    }
}
