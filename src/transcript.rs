//! Append-only conversation transcript
//!
//! One [`Transcript`] per session. Only the session runtime holds it, so it is
//! the single writer; everything else reads through a [`TranscriptHandle`].
//! Every append is broadcast as [`SessionEvent::Turn`] while the write lock is
//! held, so observers see turns in exactly the order they were stored.

use crate::runtime::SessionEvent;
use crate::state_machine::{MenuOption, Utterance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    Bot,
    User,
}

/// One message in the conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub author: Author,
    pub content: String,
    pub emitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<MenuOption>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("Transcript has been disposed")]
    Disposed,
}

#[derive(Debug, Default)]
struct Inner {
    turns: Vec<Turn>,
    disposed: bool,
}

fn read(inner: &RwLock<Inner>) -> RwLockReadGuard<'_, Inner> {
    inner.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(inner: &RwLock<Inner>) -> RwLockWriteGuard<'_, Inner> {
    inner.write().unwrap_or_else(PoisonError::into_inner)
}

/// Writer side of a session transcript
pub struct Transcript {
    inner: Arc<RwLock<Inner>>,
    notify: broadcast::Sender<SessionEvent>,
}

impl Transcript {
    pub fn new(notify: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            notify,
        }
    }

    pub fn append_bot(&self, utterance: Utterance) -> Result<Turn, TranscriptError> {
        self.append(Author::Bot, utterance.content, utterance.options)
    }

    pub fn append_user(&self, content: impl Into<String>) -> Result<Turn, TranscriptError> {
        self.append(Author::User, content.into(), None)
    }

    fn append(
        &self,
        author: Author,
        content: String,
        options: Option<Vec<MenuOption>>,
    ) -> Result<Turn, TranscriptError> {
        let mut inner = write(&self.inner);
        if inner.disposed {
            return Err(TranscriptError::Disposed);
        }

        let turn = Turn {
            id: uuid::Uuid::new_v4().to_string(),
            author,
            content,
            emitted_at: Utc::now(),
            options,
        };
        inner.turns.push(turn.clone());

        // No receivers is fine
        let _ = self.notify.send(SessionEvent::Turn { turn: turn.clone() });
        Ok(turn)
    }

    pub fn handle(&self) -> TranscriptHandle {
        TranscriptHandle {
            inner: Arc::clone(&self.inner),
            notify: self.notify.clone(),
        }
    }
}

/// Read-only view of a transcript, plus the ability to dispose it
#[derive(Clone)]
pub struct TranscriptHandle {
    inner: Arc<RwLock<Inner>>,
    notify: broadcast::Sender<SessionEvent>,
}

impl TranscriptHandle {
    pub fn turns(&self) -> Vec<Turn> {
        read(&self.inner).turns.clone()
    }

    pub fn len(&self) -> usize {
        read(&self.inner).turns.len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.inner).turns.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        read(&self.inner).disposed
    }

    /// Stop accepting appends. Idempotent.
    pub fn dispose(&self) {
        write(&self.inner).disposed = true;
    }

    /// Current turns plus a receiver for everything appended after them.
    ///
    /// Both are taken under one lock, so no turn is missed or duplicated.
    pub fn subscribe(&self) -> (Vec<Turn>, broadcast::Receiver<SessionEvent>) {
        let inner = read(&self.inner);
        (inner.turns.clone(), self.notify.subscribe())
    }
}
