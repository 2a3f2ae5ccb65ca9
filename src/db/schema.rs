//! Database schema and seed data

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS providers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    price_per_liter_cents INTEGER NOT NULL,
    eta_minutes INTEGER NOT NULL,
    rating REAL NOT NULL,
    available BOOLEAN NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS water_orders (
    id TEXT PRIMARY KEY,
    provider_id TEXT NOT NULL,
    provider_name TEXT NOT NULL,
    location_text TEXT NOT NULL,
    quantity_liters INTEGER NOT NULL,
    total_price_cents INTEGER NOT NULL,
    subsidy_cents INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_water_orders_created ON water_orders(created_at DESC);

CREATE TABLE IF NOT EXISTS incident_reports (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    location_text TEXT NOT NULL,
    duration TEXT NOT NULL,
    affected_households INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_incident_reports_created ON incident_reports(created_at DESC);
";

/// A provider row used to seed an empty catalog
pub struct SeedProvider {
    pub id: &'static str,
    pub name: &'static str,
    pub price_per_liter_cents: u64,
    pub eta_minutes: u32,
    pub rating: f32,
}

/// Demo catalog, inserted only when the providers table is empty
pub const DEMO_PROVIDERS: [SeedProvider; 5] = [
    SeedProvider {
        id: "prov-pipas-del-valle",
        name: "Pipas del Valle",
        price_per_liter_cents: 35,
        eta_minutes: 45,
        rating: 4.6,
    },
    SeedProvider {
        id: "prov-aguaexpress",
        name: "AguaExpress Iztapalapa",
        price_per_liter_cents: 30,
        eta_minutes: 90,
        rating: 4.2,
    },
    SeedProvider {
        id: "prov-hidro-sur",
        name: "Hidro Servicios Sur",
        price_per_liter_cents: 32,
        eta_minutes: 60,
        rating: 4.4,
    },
    SeedProvider {
        id: "prov-agua-limpia",
        name: "Agua Limpia Tlalpan",
        price_per_liter_cents: 40,
        eta_minutes: 35,
        rating: 4.8,
    },
    SeedProvider {
        id: "prov-pipas-oriente",
        name: "Pipas del Oriente",
        price_per_liter_cents: 28,
        eta_minutes: 120,
        rating: 3.9,
    },
];
