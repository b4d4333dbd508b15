//! Workflow orchestration
//!
//! Drives a query through `Pending -> Analyzing -> {Completed | Failed}`,
//! checkpointing the [`WorkflowState`] under `query_<query_id>` after every
//! transition and node. Nodes run in order; a node that already completed in
//! an interrupted run is skipped when the run is resumed.

mod node;

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::data::checkpoint::{CheckpointError, CheckpointStore};
use crate::data::types::{QueryAnalysis, QueryMetadata, WorkflowPhase, WorkflowState};

pub use node::{AnalyzerNode, WorkflowNode};

/// Root cause recorded when a failure escapes the agent boundary
pub const ROOT_CAUSE_SYSTEM: &str = "System error";

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Node {node} failed: {message}")]
    Node { node: &'static str, message: String },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Workflow for {thread_id} has no nodes")]
    NoNodes { thread_id: String },
}

impl WorkflowError {
    pub fn node(node: &'static str, message: impl Into<String>) -> Self {
        Self::Node {
            node,
            message: message.into(),
        }
    }
}

/// Runs workflows against a shared checkpoint store
///
/// Runs for the same thread id are serialized; distinct thread ids proceed
/// concurrently.
pub struct Orchestrator {
    store: Arc<dyn CheckpointStore>,
    nodes: Vec<Arc<dyn WorkflowNode>>,
    locks: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn CheckpointStore>, nodes: Vec<Arc<dyn WorkflowNode>>) -> Self {
        Self {
            store,
            nodes,
            locks: DashMap::new(),
        }
    }

    /// Append a node after the existing ones
    pub fn with_node(mut self, node: Arc<dyn WorkflowNode>) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    fn lock_for(&self, thread_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Analyze a query and return its terminal analysis
    pub async fn run_query_analysis(&self, query: QueryMetadata) -> QueryAnalysis {
        let query_id = query.query_id.clone();
        let state = self.execute(query).await;
        state
            .analysis
            .unwrap_or_else(|| failure_analysis(&query_id, "no analysis produced"))
    }

    /// Drive the workflow for `query` to a terminal state.
    ///
    /// A terminal checkpoint is returned as-is. A checkpoint left in
    /// `Analyzing` by an interrupted run is resumed.
    pub async fn execute(&self, query: QueryMetadata) -> WorkflowState {
        let thread_id = query.thread_id();
        let lock = self.lock_for(&thread_id);
        let state = {
            let _guard = lock.lock().await;
            self.execute_locked(&thread_id, query).await
        };
        self.release_lock(&thread_id, lock);
        state
    }

    /// Evict the thread's lock unless another run holds or awaits it
    fn release_lock(&self, thread_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        // Only the map's own reference left
        self.locks.remove_if(thread_id, |_, l| Arc::strong_count(l) == 1);
    }

    async fn execute_locked(&self, thread_id: &str, query: QueryMetadata) -> WorkflowState {
        let fallback = WorkflowState::new(query.clone());
        let state = match self.store.get_or_create(thread_id, fallback.clone()).await {
            Ok(state) => state,
            Err(e) => return self.fail(fallback, None, WorkflowError::from(e)).await,
        };

        if state.phase.is_terminal() {
            tracing::debug!(thread_id = %thread_id, phase = %state.phase, "Returning checkpointed result");
            return state;
        }

        let state = match self.start(state).await {
            Ok(state) => state,
            Err((state, expected, e)) => return self.fail(state, expected, e).await,
        };

        match self.run_nodes(state).await {
            Ok(state) => state,
            Err((state, e)) => self.fail(state, Some(WorkflowPhase::Analyzing), e).await,
        }
    }

    /// Move `Pending` to `Analyzing`; an `Analyzing` state is a resumed run
    async fn start(
        &self,
        mut state: WorkflowState,
    ) -> Result<WorkflowState, (WorkflowState, Option<WorkflowPhase>, WorkflowError)> {
        if state.phase == WorkflowPhase::Analyzing {
            tracing::info!(
                thread_id = %state.thread_id,
                completed = state.completed_nodes.len(),
                "Resuming interrupted workflow"
            );
            return Ok(state);
        }
        state.transition(WorkflowPhase::Analyzing);
        match self
            .store
            .put(&state.thread_id, &state, Some(WorkflowPhase::Pending))
            .await
        {
            Ok(()) => Ok(state),
            Err(e) => Err((state, Some(WorkflowPhase::Pending), e.into())),
        }
    }

    async fn run_nodes(
        &self,
        mut state: WorkflowState,
    ) -> Result<WorkflowState, (WorkflowState, WorkflowError)> {
        if self.nodes.is_empty() {
            let e = WorkflowError::NoNodes {
                thread_id: state.thread_id.clone(),
            };
            return Err((state, e));
        }

        for node in &self.nodes {
            if state.has_completed(node.name()) {
                continue;
            }
            tracing::debug!(thread_id = %state.thread_id, node = node.name(), "Running node");
            let analysis = match node.run(&state).await {
                Ok(analysis) => analysis,
                Err(e) => return Err((state, e)),
            };
            state.analysis = Some(analysis);
            state.completed_nodes.push(node.name().to_string());
            state.transition(WorkflowPhase::Analyzing);
            if let Err(e) = self
                .store
                .put(&state.thread_id, &state, Some(WorkflowPhase::Analyzing))
                .await
            {
                return Err((state, e.into()));
            }
        }

        state.transition(WorkflowPhase::Completed);
        if let Err(e) = self
            .store
            .put(&state.thread_id, &state, Some(WorkflowPhase::Analyzing))
            .await
        {
            return Err((state, e.into()));
        }
        tracing::info!(
            thread_id = %state.thread_id,
            severity = %state.analysis.as_ref().map(|a| a.severity.as_str()).unwrap_or("none"),
            "Workflow completed"
        );
        Ok(state)
    }

    /// Commit a `Failed` state carrying a synthesized error analysis
    async fn fail(
        &self,
        mut state: WorkflowState,
        expected: Option<WorkflowPhase>,
        error: WorkflowError,
    ) -> WorkflowState {
        tracing::warn!(thread_id = %state.thread_id, error = %error, "Workflow failed");
        state.analysis = Some(failure_analysis(&state.query.query_id, &error.to_string()));
        state.transition(WorkflowPhase::Failed);
        if let Err(e) = self.store.put(&state.thread_id, &state, expected).await {
            tracing::warn!(
                thread_id = %state.thread_id,
                error = %e,
                "Failed to checkpoint failed workflow"
            );
        }
        state
    }
}

fn failure_analysis(query_id: &str, message: &str) -> QueryAnalysis {
    QueryAnalysis::error(
        query_id,
        format!("Workflow failed: {}", message),
        ROOT_CAUSE_SYSTEM,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::checkpoint::InMemoryCheckpointStore;
    use crate::data::source::SimulatedMetricSource;
    use crate::data::types::{Severity, thread_id_for};
    use crate::domain::agent::planner::scripted::ScriptedPlanner;
    use crate::domain::agent::{
        AgentConfig, DiagnosticAgent, HeuristicPlanner, Planner, PlannerAction, PlannerError,
        ROOT_CAUSE_EXHAUSTED, Transcript,
    };
    use crate::domain::tools::MetricToolService;
    use crate::utils::retry::RetryPolicy;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn query(id: &str) -> QueryMetadata {
        QueryMetadata {
            user: "analyst".into(),
            query_id: id.into(),
            workspace_name: "sales".into(),
            workspace_id: "ws-1".into(),
            tenant_id: "tenant-1".into(),
            warehouse_type: "XL".into(),
            timestamp: Utc::now(),
        }
    }

    fn agent_config(max_steps: u32) -> AgentConfig {
        AgentConfig {
            max_steps,
            step_timeout: Duration::from_secs(5),
            tool_timeout: Duration::from_secs(5),
            retry: RetryPolicy::new(2, 1),
        }
    }

    fn heuristic_agent() -> Arc<DiagnosticAgent> {
        Arc::new(DiagnosticAgent::new(
            Arc::new(HeuristicPlanner::new()),
            Arc::new(MetricToolService::new(Arc::new(SimulatedMetricSource::new()))),
            agent_config(10),
        ))
    }

    fn orchestrator(
        store: Arc<InMemoryCheckpointStore>,
        agent: Arc<DiagnosticAgent>,
    ) -> Orchestrator {
        let analyzer: Arc<dyn WorkflowNode> = Arc::new(AnalyzerNode::new(agent));
        Orchestrator::new(store, vec![analyzer])
    }

    /// Planner that panics on its first step
    struct PanickingPlanner;

    #[async_trait]
    impl Planner for PanickingPlanner {
        async fn next(&self, _transcript: &Transcript) -> Result<PlannerAction, PlannerError> {
            panic!("planner crashed")
        }

        fn planner_name(&self) -> &'static str {
            "panicking"
        }
    }

    /// Node that counts invocations and always fails
    struct FailingNode {
        calls: AtomicU32,
    }

    #[async_trait]
    impl WorkflowNode for FailingNode {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn run(&self, _state: &WorkflowState) -> Result<QueryAnalysis, WorkflowError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(WorkflowError::node("failing", "boom"))
        }
    }

    /// Node that counts invocations and echoes the previous analysis
    struct CountingNode {
        calls: AtomicU32,
    }

    #[async_trait]
    impl WorkflowNode for CountingNode {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run(&self, state: &WorkflowState) -> Result<QueryAnalysis, WorkflowError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            state
                .analysis
                .clone()
                .ok_or_else(|| WorkflowError::node("counting", "missing analysis"))
        }
    }

    #[tokio::test]
    async fn test_completes_with_analysis() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let orch = orchestrator(store.clone(), heuristic_agent());
        let state = orch.execute(query("Q1")).await;
        assert_eq!(state.phase, WorkflowPhase::Completed);
        assert_eq!(state.thread_id, "query_Q1");
        assert_eq!(state.completed_nodes, vec!["query_analyzer".to_string()]);
        let analysis = state.analysis.unwrap();
        assert_eq!(analysis.severity, Severity::Critical);

        let stored = store.get(&thread_id_for("Q1")).await.unwrap().unwrap();
        assert_eq!(stored.phase, WorkflowPhase::Completed);
        assert_eq!(stored.analysis.unwrap(), analysis);
    }

    #[tokio::test]
    async fn test_reinvocation_returns_checkpoint() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let orch = orchestrator(store.clone(), heuristic_agent());
        let first = orch.run_query_analysis(query("Q1")).await;
        let second = orch.run_query_analysis(query("Q1")).await;
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_step_cap_completes_with_error_analysis() {
        let actions = (0..10)
            .map(|_| ScriptedPlanner::query_call("get_query_history", "Q1"))
            .collect();
        let agent = Arc::new(DiagnosticAgent::new(
            Arc::new(ScriptedPlanner::new(actions)),
            Arc::new(MetricToolService::new(Arc::new(SimulatedMetricSource::new()))),
            agent_config(2),
        ));
        let orch = orchestrator(Arc::new(InMemoryCheckpointStore::new()), agent);
        let state = orch.execute(query("Q1")).await;
        assert_eq!(state.phase, WorkflowPhase::Completed);
        let analysis = state.analysis.unwrap();
        assert_eq!(analysis.severity, Severity::Error);
        assert_eq!(analysis.root_cause, ROOT_CAUSE_EXHAUSTED);
    }

    #[tokio::test]
    async fn test_node_failure_marks_failed() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let failing = Arc::new(FailingNode {
            calls: AtomicU32::new(0),
        });
        let orch = Orchestrator::new(store.clone(), vec![failing.clone() as Arc<dyn WorkflowNode>]);

        let state = orch.execute(query("Q1")).await;
        assert_eq!(state.phase, WorkflowPhase::Failed);
        let analysis = state.analysis.unwrap();
        assert_eq!(analysis.severity, Severity::Error);
        assert_eq!(analysis.root_cause, ROOT_CAUSE_SYSTEM);
        assert!(analysis.issues[0].starts_with("Workflow failed: Node failing failed: boom"));

        // Failed is terminal: no re-run
        let again = orch.execute(query("Q1")).await;
        assert_eq!(again.phase, WorkflowPhase::Failed);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);

        let stored = store.get("query_Q1").await.unwrap().unwrap();
        assert_eq!(stored.phase, WorkflowPhase::Failed);
    }

    #[tokio::test]
    async fn test_agent_panic_marks_failed() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let agent = Arc::new(DiagnosticAgent::new(
            Arc::new(PanickingPlanner),
            Arc::new(MetricToolService::new(Arc::new(SimulatedMetricSource::new()))),
            agent_config(10),
        ));
        let orch = orchestrator(store.clone(), agent);

        let state = orch.execute(query("Q1")).await;
        assert_eq!(state.phase, WorkflowPhase::Failed);
        assert!(state.completed_nodes.is_empty());
        let analysis = state.analysis.unwrap();
        assert_eq!(analysis.severity, Severity::Error);
        assert_eq!(analysis.root_cause, ROOT_CAUSE_SYSTEM);
        assert!(
            analysis.issues[0].starts_with("Workflow failed: Node query_analyzer failed:")
        );

        let stored = store.get("query_Q1").await.unwrap().unwrap();
        assert_eq!(stored.phase, WorkflowPhase::Failed);
    }

    #[tokio::test]
    async fn test_no_nodes_fails() {
        let orch = Orchestrator::new(Arc::new(InMemoryCheckpointStore::new()), Vec::new());
        let analysis = orch.run_query_analysis(query("Q1")).await;
        assert_eq!(analysis.root_cause, ROOT_CAUSE_SYSTEM);
    }

    #[tokio::test]
    async fn test_appended_node_sees_analysis() {
        let counting = Arc::new(CountingNode {
            calls: AtomicU32::new(0),
        });
        let orch = orchestrator(Arc::new(InMemoryCheckpointStore::new()), heuristic_agent())
            .with_node(counting.clone());
        let state = orch.execute(query("Q1")).await;
        assert_eq!(state.phase, WorkflowPhase::Completed);
        assert_eq!(state.completed_nodes, vec!["query_analyzer", "counting"]);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resumes_interrupted_run() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let counting = Arc::new(CountingNode {
            calls: AtomicU32::new(0),
        });
        let orch = orchestrator(store.clone(), heuristic_agent()).with_node(counting.clone());

        // Simulate a run that died after the analyzer checkpointed
        let mut interrupted = WorkflowState::new(query("Q1"));
        interrupted.transition(WorkflowPhase::Analyzing);
        interrupted.analysis = Some(QueryAnalysis::error("Q1", "partial", "partial"));
        interrupted.completed_nodes.push("query_analyzer".into());
        store.put("query_Q1", &interrupted, None).await.unwrap();

        let state = orch.execute(query("Q1")).await;
        assert_eq!(state.phase, WorkflowPhase::Completed);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
        // Analyzer was skipped, so the stored partial analysis is carried over
        assert_eq!(state.analysis.unwrap().root_cause, "partial");
    }

    #[tokio::test]
    async fn test_concurrent_same_query_runs_once() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let counting = Arc::new(CountingNode {
            calls: AtomicU32::new(0),
        });
        let orch = Arc::new(
            orchestrator(store.clone(), heuristic_agent()).with_node(counting.clone()),
        );

        let mut handles = Vec::new();
        for _ in 0..8 {
            let orch = orch.clone();
            handles.push(tokio::spawn(async move {
                orch.run_query_analysis(query("Q1")).await
            }));
        }
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_thread_locks_released_after_runs() {
        let orch = Arc::new(orchestrator(
            Arc::new(InMemoryCheckpointStore::new()),
            heuristic_agent(),
        ));
        let mut handles = Vec::new();
        for id in ["A", "B", "A", "C", "A"] {
            let orch = orch.clone();
            handles.push(tokio::spawn(async move {
                orch.run_query_analysis(query(id)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(orch.locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_queries_independent() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let orch = Arc::new(orchestrator(store.clone(), heuristic_agent()));
        let a = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.run_query_analysis(query("A")).await })
        };
        let b = {
            let orch = orch.clone();
            tokio::spawn(async move { orch.run_query_analysis(query("B")).await })
        };
        assert_eq!(a.await.unwrap().query_id, "A");
        assert_eq!(b.await.unwrap().query_id, "B");
        assert_eq!(store.len(), 2);
    }
}
