//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::db::{Database, DbError};
use crate::state_machine::{FinalizedRecord, Provider};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Provider catalog unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Record rejected: {0}")]
    Rejected(String),
}

impl From<DbError> for CatalogError {
    fn from(e: DbError) -> Self {
        CatalogError::Unavailable(e.to_string())
    }
}

impl From<DbError> for SinkError {
    fn from(e: DbError) -> Self {
        SinkError::Rejected(e.to_string())
    }
}

/// Read-only source of delivery providers
#[async_trait]
pub trait ProviderCatalog: Send + Sync {
    /// Providers currently accepting orders, in listing order. The result is
    /// a snapshot owned by the caller.
    async fn list_available_providers(&self) -> Result<Vec<Provider>, CatalogError>;
}

/// Destination for finalized orders and reports
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn submit(&self, record: FinalizedRecord) -> Result<(), SinkError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ProviderCatalog + ?Sized> ProviderCatalog for Arc<T> {
    async fn list_available_providers(&self) -> Result<Vec<Provider>, CatalogError> {
        (**self).list_available_providers().await
    }
}

#[async_trait]
impl<T: RecordSink + ?Sized> RecordSink for Arc<T> {
    async fn submit(&self, record: FinalizedRecord) -> Result<(), SinkError> {
        (**self).submit(record).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as a provider catalog
#[derive(Clone)]
pub struct DatabaseCatalog {
    db: Database,
}

impl DatabaseCatalog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProviderCatalog for DatabaseCatalog {
    async fn list_available_providers(&self) -> Result<Vec<Provider>, CatalogError> {
        Ok(self.db.list_available_providers()?)
    }
}

/// Adapter to use Database as the record sink
#[derive(Clone)]
pub struct DatabaseSink {
    db: Database,
}

impl DatabaseSink {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordSink for DatabaseSink {
    async fn submit(&self, record: FinalizedRecord) -> Result<(), SinkError> {
        self.db.insert_record(&record)?;
        Ok(())
    }
}
