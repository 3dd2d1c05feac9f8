use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use odoopanel_core::job::{Lane, SlotKey};
use thiserror::Error;
use tokio::sync::{Notify, watch};
use tracing::debug;

use crate::tracker::{OperationTracker, TrackerPhase, TrackerState};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{active} is already running; wait for it to finish before starting {requested}")]
pub struct AlreadyActiveError {
    pub requested: SlotKey,
    pub active: SlotKey,
}

pub(crate) type SharedState = Arc<watch::Sender<TrackerState>>;

struct ActiveEntry {
    slot: SlotKey,
    generation: u64,
    state: SharedState,
    cancel: Arc<Notify>,
}

#[derive(Default)]
struct RegistryInner {
    next_generation: u64,
    active: HashMap<Lane, ActiveEntry>,
}

/// Owns the lane to active job map. Clones share the same map.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, slot: SlotKey) -> Result<OperationTracker, AlreadyActiveError> {
        let lane = slot.lane();
        let mut inner = self.lock();

        if let Some(entry) = inner.active.get(&lane) {
            return Err(AlreadyActiveError {
                requested: slot,
                active: entry.slot.clone(),
            });
        }

        inner.next_generation += 1;
        let generation = inner.next_generation;
        let (sender, _) = watch::channel(TrackerState::default());
        let state = Arc::new(sender);
        let cancel = Arc::new(Notify::new());

        inner.active.insert(
            lane,
            ActiveEntry {
                slot: slot.clone(),
                generation,
                state: Arc::clone(&state),
                cancel: Arc::clone(&cancel),
            },
        );
        debug!(%slot, generation, "job slot acquired");

        Ok(OperationTracker::new(
            self.clone(),
            slot,
            generation,
            state,
            cancel,
        ))
    }

    /// Releasing a slot that is not active is a no-op.
    pub fn release(&self, slot: &SlotKey) {
        let mut inner = self.lock();
        let lane = slot.lane();
        let matches = inner
            .active
            .get(&lane)
            .is_some_and(|entry| entry.slot == *slot);

        if matches {
            if let Some(entry) = inner.active.remove(&lane) {
                entry.cancel.notify_one();
                debug!(%slot, generation = entry.generation, "job slot released");
            }
        }
    }

    pub fn current(&self, slot: &SlotKey) -> Option<TrackerState> {
        let inner = self.lock();
        inner
            .active
            .get(&slot.lane())
            .filter(|entry| entry.slot == *slot)
            .map(|entry| entry.state.borrow().clone())
    }

    pub fn active(&self) -> Vec<SlotKey> {
        let inner = self.lock();
        let mut slots: Vec<_> = inner.active.values().map(|entry| entry.slot.clone()).collect();
        slots.sort();
        slots
    }

    pub fn is_active(&self, slot: &SlotKey) -> bool {
        self.current(slot).is_some()
    }

    /// Applies `mutate` only while `generation` still owns the lane. A mutation that leaves
    /// the state terminal releases the lane in the same critical section.
    pub(crate) fn commit(
        &self,
        slot: &SlotKey,
        generation: u64,
        mutate: impl FnOnce(&mut TrackerState),
    ) -> bool {
        let mut inner = self.lock();
        let lane = slot.lane();

        let Some(entry) = inner.active.get(&lane) else {
            return false;
        };
        if entry.generation != generation {
            return false;
        }

        entry.state.send_modify(mutate);
        let terminal = entry.state.borrow().phase.is_terminal();
        if terminal {
            inner.active.remove(&lane);
            debug!(%slot, generation, "job slot released on terminal state");
        }
        true
    }

    pub(crate) fn release_generation(&self, slot: &SlotKey, generation: u64) {
        let mut inner = self.lock();
        let lane = slot.lane();
        let owned = inner
            .active
            .get(&lane)
            .is_some_and(|entry| entry.generation == generation);

        if owned {
            inner.active.remove(&lane);
            debug!(%slot, generation, "job slot released by its tracker");
        }
    }

    /// Drops the lane if `generation` still owns it and closes the tracker state.
    pub(crate) fn cancel(&self, slot: &SlotKey, generation: u64, state: &SharedState) -> bool {
        let mut inner = self.lock();
        let lane = slot.lane();
        let owned = inner
            .active
            .get(&lane)
            .is_some_and(|entry| entry.generation == generation);

        if owned {
            if let Some(entry) = inner.active.remove(&lane) {
                entry.cancel.notify_one();
            }
        }

        state.send_if_modified(|current| {
            if current.phase == TrackerPhase::Closed {
                return false;
            }
            current.phase = TrackerPhase::Closed;
            true
        });
        owned
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // State stays consistent across a panic in a mutation closure, so recover the guard.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use odoopanel_core::job::OperationKind;

    use super::*;

    fn slot(kind: OperationKind, target: &str) -> SlotKey {
        SlotKey::new(kind, target)
    }

    #[test]
    fn second_acquire_on_same_lane_is_rejected() {
        let registry = JobRegistry::new();
        let _first = registry
            .acquire(slot(OperationKind::UpdateDb, "dev-acme"))
            .expect("first acquire");

        let error = match registry.acquire(slot(OperationKind::UpdateDb, "dev-acme")) {
            Ok(_) => panic!("second acquire should fail"),
            Err(error) => error,
        };
        assert_eq!(error.active, slot(OperationKind::UpdateDb, "dev-acme"));
    }

    #[test]
    fn shared_lane_blocks_sibling_kinds() {
        let registry = JobRegistry::new();
        let _backup = registry
            .acquire(slot(OperationKind::BackupCreate, "prod-acme"))
            .expect("backup acquire");

        assert!(
            registry
                .acquire(slot(OperationKind::BackupRestore, "prod-acme"))
                .is_err()
        );
        assert!(
            registry
                .acquire(slot(OperationKind::BackupRestore, "prod-other"))
                .is_ok()
        );
    }

    #[test]
    fn release_is_idempotent() {
        let registry = JobRegistry::new();
        let key = slot(OperationKind::GitPush, "dev-acme");
        let tracker = registry.acquire(key.clone()).expect("acquire");

        registry.release(&key);
        registry.release(&key);
        assert!(registry.active().is_empty());
        assert!(registry.acquire(key.clone()).is_ok());
        drop(tracker);
    }

    #[test]
    fn release_of_other_kind_in_lane_does_not_steal_it() {
        let registry = JobRegistry::new();
        let _commit = registry
            .acquire(slot(OperationKind::GitCommit, "dev-acme"))
            .expect("acquire");

        registry.release(&slot(OperationKind::GitPush, "dev-acme"));
        assert_eq!(
            registry.active(),
            vec![slot(OperationKind::GitCommit, "dev-acme")]
        );
    }

    #[test]
    fn stale_generation_cannot_commit() {
        let registry = JobRegistry::new();
        let key = slot(OperationKind::UpdateFiles, "dev-acme");
        let first = registry.acquire(key.clone()).expect("acquire");
        let stale = first.generation();
        drop(first);

        let _second = registry.acquire(key.clone()).expect("reacquire");
        let applied = registry.commit(&key, stale, |state| state.polls += 1);
        assert!(!applied);
        assert_eq!(registry.current(&key).map(|state| state.polls), Some(0));
    }

    #[test]
    fn terminal_commit_releases_lane() {
        let registry = JobRegistry::new();
        let key = slot(OperationKind::UpdateDb, "dev-acme");
        let tracker = registry.acquire(key.clone()).expect("acquire");

        assert!(registry.commit(&key, tracker.generation(), |state| {
            state.phase = TrackerPhase::Failed;
        }));
        assert!(registry.current(&key).is_none());
        assert_eq!(tracker.state().phase, TrackerPhase::Failed);
    }
}
