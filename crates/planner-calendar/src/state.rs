//! Resident entity state lookup.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::RawStateRecord;

/// Synchronous access to entity state the host already holds.
pub trait StateLookup: Send + Sync {
    /// `None` when the host has no state for `source_id`.
    fn get_local_state(&self, source_id: &str) -> Option<RawStateRecord>;
}

/// In-memory state table kept current by the host.
#[derive(Debug, Default)]
pub struct StateStore {
    states: RwLock<HashMap<String, RawStateRecord>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the state of one entity.
    pub fn set(&self, state: RawStateRecord) {
        self.states.write().insert(state.entity_id.clone(), state);
    }

    pub fn remove(&self, entity_id: &str) -> Option<RawStateRecord> {
        self.states.write().remove(entity_id)
    }

    /// Swap in a full snapshot, e.g. the result of `GET /api/states`.
    pub fn replace_all(&self, states: impl IntoIterator<Item = RawStateRecord>) {
        let snapshot: HashMap<String, RawStateRecord> = states
            .into_iter()
            .map(|state| (state.entity_id.clone(), state))
            .collect();
        *self.states.write() = snapshot;
    }

    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

impl StateLookup for StateStore {
    fn get_local_state(&self, source_id: &str) -> Option<RawStateRecord> {
        self.states.read().get(source_id).cloned()
    }
}
