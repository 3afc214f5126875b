//! Monotonic version counters propagated to masters.

use std::cell::Cell;
use std::collections::HashSet;

use quire_foundation::InstanceId;

use crate::participant::Participant;

#[derive(Clone, Copy, Debug)]
struct Lock {
    snapshot: u64,
    bumped: bool,
}

/// Version counter of a single entity.
///
/// Every observable mutation bumps the counter. While locked, a batch of
/// mutations bumps it at most once.
#[derive(Debug, Default)]
pub struct Version {
    value: Cell<u64>,
    lock: Cell<Option<Lock>>,
}

impl Version {
    /// Creates a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version number.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.get()
    }

    /// Increments the counter. Returns false if the increment was absorbed by
    /// an active lock that already counted a change.
    pub fn next(&self) -> bool {
        if let Some(lock) = self.lock.get() {
            if lock.bumped {
                return false;
            }
            self.lock.set(Some(Lock {
                bumped: true,
                ..lock
            }));
        }
        self.value.set(self.value.get() + 1);
        true
    }

    /// Starts a batch. Nested locks are absorbed by the outer one.
    pub fn lock(&self) {
        if self.lock.get().is_none() {
            self.lock.set(Some(Lock {
                snapshot: self.value.get(),
                bumped: false,
            }));
        }
    }

    /// Ends a batch. Without `keep` the number from before the lock is restored.
    pub fn unlock(&self, keep: bool) {
        if let Some(lock) = self.lock.take() {
            if !keep {
                self.value.set(lock.snapshot);
            }
        }
    }

    /// Returns true while a batch is active.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.get().is_some()
    }
}

/// Bumps the version of a participant and of every versioned master above it.
///
/// Masters are visited once even if the master graph has cycles. Propagation
/// stops at participants whose counter absorbed the bump.
pub fn bump_version(participant: &dyn Participant) {
    let mut visited = HashSet::new();
    bump(participant, &mut visited);
}

fn bump(participant: &dyn Participant, visited: &mut HashSet<InstanceId>) {
    if !visited.insert(participant.instance_id()) {
        return;
    }
    if let Some(tracked) = participant.versioned() {
        if !tracked.version().next() {
            return;
        }
    }
    let Some(mediator) = participant.mediator() else {
        return;
    };
    let mut masters = Vec::new();
    mediator.belongs_to(participant, |master, _| masters.push(master));
    for master in masters {
        bump(master.as_ref(), visited);
    }
}
