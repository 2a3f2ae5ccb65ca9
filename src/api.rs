//! HTTP API for the water assistant
//!
//! Sessions are driven over JSON and observed over SSE; the provider catalog
//! and finalized records are exposed for operators.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::db::Database;
use crate::runtime::{DatabaseCatalog, DatabaseSink, SessionManager, SessionSettings};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub db: Database,
}

impl AppState {
    pub fn new(db: Database, settings: SessionSettings) -> Self {
        let sessions = SessionManager::new(
            Arc::new(DatabaseCatalog::new(db.clone())),
            Arc::new(DatabaseSink::new(db.clone())),
            settings,
        );
        Self {
            sessions: Arc::new(sessions),
            db,
        }
    }
}
