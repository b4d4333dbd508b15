//! In-memory checkpoint store on a sharded concurrent map
//!
//! Entries are kept serialized (thread id -> JSON bytes) so a stored state is
//! never aliased by a caller.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{CheckpointError, CheckpointStore};
use crate::data::types::{WorkflowPhase, WorkflowState};

#[derive(Default)]
pub struct InMemoryCheckpointStore {
    entries: DashMap<String, Vec<u8>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn encode(state: &WorkflowState) -> Result<Vec<u8>, CheckpointError> {
    Ok(serde_json::to_vec(state)?)
}

fn decode(bytes: &[u8]) -> Result<WorkflowState, CheckpointError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn get(&self, thread_id: &str) -> Result<Option<WorkflowState>, CheckpointError> {
        match self.entries.get(thread_id) {
            Some(entry) => Ok(Some(decode(entry.value())?)),
            None => Ok(None),
        }
    }

    async fn get_or_create(
        &self,
        thread_id: &str,
        initial: WorkflowState,
    ) -> Result<WorkflowState, CheckpointError> {
        match self.entries.entry(thread_id.to_string()) {
            Entry::Occupied(entry) => decode(entry.get()),
            Entry::Vacant(entry) => {
                entry.insert(encode(&initial)?);
                tracing::trace!(thread_id, "Checkpoint created");
                Ok(initial)
            }
        }
    }

    async fn put(
        &self,
        thread_id: &str,
        state: &WorkflowState,
        expected: Option<WorkflowPhase>,
    ) -> Result<(), CheckpointError> {
        let bytes = encode(state)?;
        match self.entries.entry(thread_id.to_string()) {
            Entry::Occupied(mut entry) => {
                let actual = decode(entry.get())?.phase;
                if expected != Some(actual) {
                    return Err(CheckpointError::Conflict {
                        thread_id: thread_id.to_string(),
                        expected,
                        actual: Some(actual),
                    });
                }
                entry.insert(bytes);
            }
            Entry::Vacant(entry) => {
                if expected.is_some() {
                    return Err(CheckpointError::Conflict {
                        thread_id: thread_id.to_string(),
                        expected,
                        actual: None,
                    });
                }
                entry.insert(bytes);
            }
        }
        tracing::trace!(thread_id, phase = %state.phase, "Checkpoint committed");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::QueryMetadata;
    use chrono::Utc;
    use std::sync::Arc;

    fn state(query_id: &str) -> WorkflowState {
        WorkflowState::new(QueryMetadata {
            user: "u".into(),
            query_id: query_id.into(),
            workspace_name: "w".into(),
            workspace_id: "ws".into(),
            tenant_id: "t".into(),
            warehouse_type: "XL".into(),
            timestamp: Utc::now(),
        })
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.get("query_Q1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_or_create_inserts_once() {
        let store = InMemoryCheckpointStore::new();
        let first = store.get_or_create("query_Q1", state("Q1")).await.unwrap();
        assert_eq!(first.phase, WorkflowPhase::Pending);

        let mut advanced = first.clone();
        advanced.transition(WorkflowPhase::Analyzing);
        store
            .put("query_Q1", &advanced, Some(WorkflowPhase::Pending))
            .await
            .unwrap();

        // Existing entry wins over the new initial value
        let second = store.get_or_create("query_Q1", state("Q1")).await.unwrap();
        assert_eq!(second.phase, WorkflowPhase::Analyzing);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_put_rejects_wrong_expected_phase() {
        let store = InMemoryCheckpointStore::new();
        let initial = store.get_or_create("query_Q1", state("Q1")).await.unwrap();
        let mut done = initial.clone();
        done.transition(WorkflowPhase::Completed);

        let err = store
            .put("query_Q1", &done, Some(WorkflowPhase::Analyzing))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckpointError::Conflict {
                actual: Some(WorkflowPhase::Pending),
                ..
            }
        ));
        let stored = store.get("query_Q1").await.unwrap().unwrap();
        assert_eq!(stored.phase, WorkflowPhase::Pending);
    }

    #[tokio::test]
    async fn test_put_absent_requires_none_expected() {
        let store = InMemoryCheckpointStore::new();
        let s = state("Q1");
        assert!(
            store
                .put("query_Q1", &s, Some(WorkflowPhase::Pending))
                .await
                .is_err()
        );
        store.put("query_Q1", &s, None).await.unwrap();
        assert!(store.put("query_Q1", &s, None).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_cas_single_winner() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let initial = store.get_or_create("query_Q1", state("Q1")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let mut next = initial.clone();
            next.transition(WorkflowPhase::Analyzing);
            handles.push(tokio::spawn(async move {
                store
                    .put("query_Q1", &next, Some(WorkflowPhase::Pending))
                    .await
                    .is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_distinct_threads_independent() {
        let store = InMemoryCheckpointStore::new();
        store.get_or_create("query_A", state("A")).await.unwrap();
        store.get_or_create("query_B", state("B")).await.unwrap();
        let a = store.get("query_A").await.unwrap().unwrap();
        let b = store.get("query_B").await.unwrap().unwrap();
        assert_eq!(a.query.query_id, "A");
        assert_eq!(b.query.query_id, "B");
    }
}
