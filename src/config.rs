//! Environment-driven configuration

use crate::runtime::scheduler::DEFAULT_PACING;
use crate::runtime::SessionSettings;
use crate::state_machine::DEFAULT_ORDER_LITERS;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;

/// Server and session configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    pub port: u16,
    /// Delay in front of every bot utterance
    pub pacing: Duration,
    pub order_liters: u32,
    /// Discount applied to every order, 0..=100
    pub subsidy_percent: u8,
    /// Fill an empty provider table with the demo catalog
    pub seed_providers: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Invalid values are
    /// logged and replaced by their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("AGUA_DB_PATH").unwrap_or_else(|| {
            let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
            format!("{home}/.agua-bot/agua.db")
        });

        let pacing_ms = parse_or(&lookup, "AGUA_PACING_MS", duration_millis(DEFAULT_PACING));

        let subsidy_percent: u8 = parse_or(&lookup, "AGUA_SUBSIDY_PERCENT", 0);
        if subsidy_percent > 100 {
            tracing::warn!(
                value = subsidy_percent,
                "AGUA_SUBSIDY_PERCENT above 100, clamping"
            );
        }

        let seed_providers = match lookup("AGUA_SEED_PROVIDERS") {
            None => true,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    tracing::warn!(value = %raw, "Invalid AGUA_SEED_PROVIDERS, using default");
                    true
                }
            },
        };

        Self {
            db_path,
            port: parse_or(&lookup, "AGUA_PORT", DEFAULT_PORT),
            pacing: Duration::from_millis(pacing_ms),
            order_liters: parse_or(&lookup, "AGUA_ORDER_LITERS", DEFAULT_ORDER_LITERS),
            subsidy_percent: subsidy_percent.min(100),
            seed_providers,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            pacing: self.pacing,
            order_liters: self.order_liters,
            subsidy_percent: self.subsidy_percent,
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    if let Ok(value) = raw.trim().parse() {
        value
    } else {
        tracing::warn!(key, value = %raw, "Invalid configuration value, using default");
        default
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
