//! Runtime for executing conversations
//!
//! One [`SessionRuntime`] task per conversation; the [`SessionManager`] routes
//! input to it and hands out observers. Sessions share nothing but the
//! read-only provider catalog and the record sink.

mod executor;
pub mod scheduler;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use traits::*;

use crate::state_machine::{ConvContext, ConvState, UserInput, DEFAULT_ORDER_LITERS};
use crate::transcript::{Transcript, TranscriptHandle, Turn};
use scheduler::{TurnScheduler, DEFAULT_PACING};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;

/// Type alias for the runtime the server spawns
pub type SharedRuntime = SessionRuntime<dyn ProviderCatalog, dyn RecordSink>;

/// Events sent to session observers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A turn was appended to the transcript
    Turn { turn: Turn },
    StateChange {
        /// Full state as JSON object (e.g., `{"type":"show_providers",...}`)
        state: serde_json::Value,
    },
    /// A finalized record was handed to the sink
    Record { record: serde_json::Value },
    Closed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Session closed: {0}")]
    Closed(String),
}

/// Per-session settings shared by every new conversation
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Delay in front of each bot utterance
    pub pacing: Duration,
    pub order_liters: u32,
    pub subsidy_percent: u8,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            pacing: DEFAULT_PACING,
            order_liters: DEFAULT_ORDER_LITERS,
            subsidy_percent: 0,
        }
    }
}

/// Point-in-time view of a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub state: ConvState,
    pub turns: Vec<Turn>,
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub input_tx: mpsc::Sender<UserInput>,
    pub state_rx: watch::Receiver<ConvState>,
    pub transcript: TranscriptHandle,
    cancel: CancellationToken,
}

impl SessionHandle {
    /// Tear the session down: no further transcript appends, pending
    /// replies are dropped and the runtime task exits.
    pub fn dispose(&self) {
        self.transcript.dispose();
        self.cancel.cancel();
    }
}

/// Manager for all session runtimes
pub struct SessionManager {
    catalog: Arc<dyn ProviderCatalog>,
    sink: Arc<dyn RecordSink>,
    settings: SessionSettings,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionManager {
    pub fn new(
        catalog: Arc<dyn ProviderCatalog>,
        sink: Arc<dyn RecordSink>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            catalog,
            sink,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a new conversation. The greeting is emitted by the runtime
    /// task; the returned id is usable immediately.
    pub async fn create_session(&self) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();

        let context = ConvContext::new(&session_id)
            .with_order_liters(self.settings.order_liters)
            .with_subsidy_percent(self.settings.subsidy_percent);

        let (input_tx, input_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);
        let (state_tx, state_rx) = watch::channel(ConvState::Welcome);
        let cancel = CancellationToken::new();

        let transcript = Transcript::new(broadcast_tx.clone());
        let handle = SessionHandle {
            input_tx,
            state_rx,
            transcript: transcript.handle(),
            cancel: cancel.clone(),
        };

        let runtime: SharedRuntime = SessionRuntime::new(
            context,
            transcript,
            TurnScheduler::new(self.settings.pacing, cancel.clone()),
            Arc::clone(&self.catalog),
            Arc::clone(&self.sink),
            input_rx,
            broadcast_tx,
            state_tx,
            cancel,
        );

        // Store handle before the runtime can emit anything
        let active = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(session_id.clone(), handle);
            sessions.len()
        };

        tokio::spawn(async move {
            runtime.run().await;
        });

        tracing::info!(session_id = %session_id, active, "Session created");
        session_id
    }

    async fn handle(&self, session_id: &str) -> Result<SessionHandle, SessionError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))
    }

    /// Queue one user turn. Returns as soon as the turn is buffered; it is
    /// processed after any replies still being paced out.
    pub async fn send_input(&self, session_id: &str, input: UserInput) -> Result<(), SessionError> {
        let handle = self.handle(session_id).await?;
        if handle.transcript.is_disposed() {
            return Err(SessionError::Closed(session_id.to_string()));
        }
        handle
            .input_tx
            .send(input)
            .await
            .map_err(|_| SessionError::Closed(session_id.to_string()))
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot, SessionError> {
        let handle = self.handle(session_id).await?;
        let state = handle.state_rx.borrow().clone();
        Ok(SessionSnapshot {
            session_id: session_id.to_string(),
            state,
            turns: handle.transcript.turns(),
        })
    }

    /// Snapshot plus a receiver for everything after it
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<(SessionSnapshot, broadcast::Receiver<SessionEvent>), SessionError> {
        let handle = self.handle(session_id).await?;
        let (turns, rx) = handle.transcript.subscribe();
        let state = handle.state_rx.borrow().clone();
        Ok((
            SessionSnapshot {
                session_id: session_id.to_string(),
                state,
                turns,
            },
            rx,
        ))
    }

    /// Dispose a session and forget it
    pub async fn close(&self, session_id: &str) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        handle.dispose();
        tracing::info!(session_id = %session_id, "Session closed");
        Ok(())
    }
}
