//! Database module for the water assistant
//!
//! Holds the provider catalog and the records finalized by conversations.

mod schema;

use schema::{DEMO_PROVIDERS, SCHEMA};

use crate::state_machine::state::{
    IncidentKind, IncidentReport, Money, OutageDuration, WaterOrder,
};
use crate::state_machine::{FinalizedRecord, Provider};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),
    #[error("Unknown stored value: {0}")]
    UnknownValue(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Provider Operations ====================

    /// Insert a provider, or update every field of an existing one.
    /// Listing order stays the order of first insertion.
    pub fn upsert_provider(&self, provider: &Provider) -> DbResult<()> {
        self.conn().execute(
            "INSERT INTO providers (id, name, price_per_liter_cents, eta_minutes, rating, available)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                price_per_liter_cents = excluded.price_per_liter_cents,
                eta_minutes = excluded.eta_minutes,
                rating = excluded.rating,
                available = excluded.available",
            params![
                provider.id,
                provider.name,
                provider.price_per_liter.cents(),
                provider.eta_minutes,
                f64::from(provider.rating),
                provider.available,
            ],
        )?;
        Ok(())
    }

    pub fn set_provider_available(&self, id: &str, available: bool) -> DbResult<()> {
        let updated = self.conn().execute(
            "UPDATE providers SET available = ?1 WHERE id = ?2",
            params![available, id],
        )?;

        if updated == 0 {
            return Err(DbError::ProviderNotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn get_provider(&self, id: &str) -> DbResult<Provider> {
        self.conn()
            .query_row(
                "SELECT id, name, price_per_liter_cents, eta_minutes, rating, available
                 FROM providers WHERE id = ?1",
                params![id],
                provider_from_row,
            )
            .optional()?
            .ok_or_else(|| DbError::ProviderNotFound(id.to_string()))
    }

    /// All providers in insertion order
    pub fn list_providers(&self) -> DbResult<Vec<Provider>> {
        self.query_providers(
            "SELECT id, name, price_per_liter_cents, eta_minutes, rating, available
             FROM providers ORDER BY rowid",
        )
    }

    /// Providers currently accepting orders, in insertion order
    pub fn list_available_providers(&self) -> DbResult<Vec<Provider>> {
        self.query_providers(
            "SELECT id, name, price_per_liter_cents, eta_minutes, rating, available
             FROM providers WHERE available = 1 ORDER BY rowid",
        )
    }

    fn query_providers(&self, sql: &str) -> DbResult<Vec<Provider>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], provider_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Fill an empty catalog with the demo providers. Returns how many were
    /// inserted (zero when the catalog already had entries).
    pub fn seed_demo_providers(&self) -> DbResult<usize> {
        let existing: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM providers", [], |row| row.get(0))?;
        if existing > 0 {
            return Ok(0);
        }

        for seed in &DEMO_PROVIDERS {
            self.upsert_provider(&Provider {
                id: seed.id.to_string(),
                name: seed.name.to_string(),
                price_per_liter: Money::from_cents(seed.price_per_liter_cents),
                eta_minutes: seed.eta_minutes,
                rating: seed.rating,
                available: true,
            })?;
        }
        Ok(DEMO_PROVIDERS.len())
    }

    // ==================== Record Operations ====================

    pub fn insert_record(&self, record: &FinalizedRecord) -> DbResult<()> {
        match record {
            FinalizedRecord::WaterOrder(order) => self.insert_order(order),
            FinalizedRecord::IncidentReport(report) => self.insert_report(report),
        }
    }

    pub fn insert_order(&self, order: &WaterOrder) -> DbResult<()> {
        self.conn().execute(
            "INSERT INTO water_orders (id, provider_id, provider_name, location_text,
                 quantity_liters, total_price_cents, subsidy_cents, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                order.id,
                order.provider_id,
                order.provider_name,
                order.location_text,
                order.quantity_liters,
                order.total_price.cents(),
                order.subsidy_applied.cents(),
                order.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn insert_report(&self, report: &IncidentReport) -> DbResult<()> {
        self.conn().execute(
            "INSERT INTO incident_reports (id, type, location_text, duration,
                 affected_households, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                report.id,
                report.kind.as_str(),
                report.location_text,
                report.duration.as_str(),
                report.affected_households,
                report.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Orders, newest first
    pub fn list_orders(&self) -> DbResult<Vec<WaterOrder>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, provider_id, provider_name, location_text, quantity_liters,
                    total_price_cents, subsidy_cents, created_at
             FROM water_orders ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(WaterOrder {
                id: row.get(0)?,
                provider_id: row.get(1)?,
                provider_name: row.get(2)?,
                location_text: row.get(3)?,
                quantity_liters: row.get(4)?,
                total_price: Money::from_cents(row.get(5)?),
                subsidy_applied: Money::from_cents(row.get(6)?),
                created_at: parse_datetime(&row.get::<_, String>(7)?),
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Incident reports, newest first
    pub fn list_reports(&self) -> DbResult<Vec<IncidentReport>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, type, location_text, duration, affected_households, created_at
             FROM incident_reports ORDER BY created_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(1)?;
            let duration: String = row.get(3)?;
            Ok(IncidentReport {
                id: row.get(0)?,
                kind: parse_column(1, &kind, IncidentKind::parse)?,
                location_text: row.get(2)?,
                duration: parse_column(3, &duration, OutageDuration::parse)?,
                affected_households: row.get(4)?,
                created_at: parse_datetime(&row.get::<_, String>(5)?),
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }
}

#[allow(clippy::cast_possible_truncation)] // ratings are single-digit with one decimal
fn provider_from_row(row: &Row<'_>) -> rusqlite::Result<Provider> {
    Ok(Provider {
        id: row.get(0)?,
        name: row.get(1)?,
        price_per_liter: Money::from_cents(row.get(2)?),
        eta_minutes: row.get(3)?,
        rating: row.get::<_, f64>(4)? as f32,
        available: row.get(5)?,
    })
}

fn parse_column<T>(index: usize, value: &str, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            Type::Text,
            Box::new(DbError::UnknownValue(value.to_string())),
        )
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
