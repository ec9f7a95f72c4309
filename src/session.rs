//! Session registry
//!
//! Each session owns one `BiasState`. Evaluations for the same session are
//! serialized by that session's lock; different sessions never contend.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::{AnalysisInput, BiasState, DecisionOrchestrator, Evaluation, PerturbationPolicy};
use crate::error::{Error, Result};

/// State held for one session
#[derive(Debug, Clone)]
struct SessionEntry {
    bias: BiasState,
    created_at: DateTime<Utc>,
    last_evaluated: Option<DateTime<Utc>>,
}

impl SessionEntry {
    fn new() -> Self {
        Self {
            bias: BiasState::new(),
            created_at: Utc::now(),
            last_evaluated: None,
        }
    }
}

/// Snapshot of a session for display
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub bias: BiasState,
    pub created_at: DateTime<Utc>,
    pub last_evaluated: Option<DateTime<Utc>>,
}

/// Concurrent session store
pub struct SessionStore {
    orchestrator: Arc<DecisionOrchestrator>,
    perturbation: PerturbationPolicy,
    max_sessions: usize,
    /// Reserved session slots, kept in step with `sessions`
    open_count: AtomicUsize,
    sessions: DashMap<String, Arc<Mutex<SessionEntry>>>,
}

impl SessionStore {
    /// Create a store; `max_sessions` of 0 means unbounded
    pub fn new(
        orchestrator: Arc<DecisionOrchestrator>,
        perturbation: PerturbationPolicy,
        max_sessions: usize,
    ) -> Self {
        Self {
            orchestrator,
            perturbation,
            max_sessions,
            open_count: AtomicUsize::new(0),
            sessions: DashMap::new(),
        }
    }

    /// Claim a slot for a new session without touching the map
    fn reserve_slot(&self) -> Result<()> {
        if self.max_sessions == 0 {
            self.open_count.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        self.open_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |open| {
                (open < self.max_sessions).then_some(open + 1)
            })
            .map(|_| ())
            .map_err(|_| Error::SessionLimit {
                limit: self.max_sessions,
            })
    }

    /// Open a new session with a fresh bias state
    pub fn open(&self) -> Result<String> {
        self.reserve_slot()?;
        let id = Uuid::new_v4().to_string();
        self.sessions
            .insert(id.clone(), Arc::new(Mutex::new(SessionEntry::new())));
        info!(session = %id, "Session opened");
        Ok(id)
    }

    /// Open a session under a caller-chosen id, or return the existing one
    pub fn open_named(&self, id: &str) -> Result<String> {
        match self.sessions.entry(id.to_string()) {
            Entry::Occupied(_) => {}
            Entry::Vacant(vacant) => {
                self.reserve_slot()?;
                vacant.insert(Arc::new(Mutex::new(SessionEntry::new())));
                info!(session = %id, "Session opened");
            }
        }
        Ok(id.to_string())
    }

    /// Open a named session seeded with an existing bias state
    pub async fn restore(&self, id: &str, bias: BiasState) -> Result<()> {
        self.open_named(id)?;
        let entry = self.entry(id)?;
        entry.lock().await.bias = bias;
        debug!(session = %id, "Session bias restored");
        Ok(())
    }

    fn entry(&self, id: &str) -> Result<Arc<Mutex<SessionEntry>>> {
        self.sessions
            .get(id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Evaluate one analysis for a session and store the new bias state
    pub async fn evaluate(&self, id: &str, input: &AnalysisInput) -> Result<Evaluation> {
        let entry = self.entry(id)?;
        let mut session = entry.lock().await;

        let evaluation = self
            .orchestrator
            .evaluate(input, &session.bias, &self.perturbation)?;

        session.bias = evaluation.bias_state.clone();
        session.last_evaluated = Some(Utc::now());

        debug!(
            session = %id,
            action = %evaluation.decision.action,
            evaluations = session.bias.evaluations,
            "Session updated"
        );

        Ok(evaluation)
    }

    /// Restart a session: clear its bias history
    pub async fn reset(&self, id: &str) -> Result<()> {
        let entry = self.entry(id)?;
        let mut session = entry.lock().await;
        session.bias = BiasState::new();
        session.last_evaluated = None;
        info!(session = %id, "Session reset");
        Ok(())
    }

    /// Remove a session, returning its final bias state
    pub async fn close(&self, id: &str) -> Result<BiasState> {
        let (_, entry) = self
            .sessions
            .remove(id)
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))?;
        self.open_count.fetch_sub(1, Ordering::SeqCst);
        let bias = entry.lock().await.bias.clone();
        info!(session = %id, evaluations = bias.evaluations, "Session closed");
        Ok(bias)
    }

    /// Snapshot of a session
    pub async fn info(&self, id: &str) -> Result<SessionInfo> {
        let entry = self.entry(id)?;
        let session = entry.lock().await;
        Ok(SessionInfo {
            id: id.to_string(),
            bias: session.bias.clone(),
            created_at: session.created_at,
            last_evaluated: session.last_evaluated,
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
