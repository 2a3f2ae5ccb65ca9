//! Conversation state types

use super::effect::MenuOption;
use super::prompts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Money
// ============================================================================

/// An amount in cents. Prices are never represented as floats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    pub fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(u64::from(quantity)))
    }

    /// `percent`% of this amount, rounded down
    pub fn percent(self, percent: u8) -> Self {
        Self(self.0.saturating_mul(u64::from(percent.min(100))) / 100)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Provider (external catalog entry, read-only here)
// ============================================================================

/// A water delivery provider as listed by the external catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    pub price_per_liter: Money,
    pub eta_minutes: u32,
    pub rating: f32,
    pub available: bool,
}

/// Price breakdown for an order of a given quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub gross: Money,
    pub subsidy: Money,
    pub total: Money,
}

impl Quote {
    pub fn for_provider(provider: &Provider, liters: u32, subsidy_percent: u8) -> Self {
        let gross = provider.price_per_liter.times(liters);
        let subsidy = gross.percent(subsidy_percent);
        Self {
            gross,
            subsidy,
            total: gross.saturating_sub(subsidy),
        }
    }
}

// ============================================================================
// Incident report vocabulary
// ============================================================================

/// Kind of incident a citizen can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    Leak,
    NoWater,
    Contamination,
    Infrastructure,
    Other,
}

impl IncidentKind {
    pub const ALL: [IncidentKind; 5] = [
        IncidentKind::Leak,
        IncidentKind::NoWater,
        IncidentKind::Contamination,
        IncidentKind::Infrastructure,
        IncidentKind::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentKind::Leak => "leak",
            IncidentKind::NoWater => "no_water",
            IncidentKind::Contamination => "contamination",
            IncidentKind::Infrastructure => "infrastructure",
            IncidentKind::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    pub fn label(self) -> &'static str {
        match self {
            IncidentKind::Leak => "Fuga de agua",
            IncidentKind::NoWater => "Sin servicio de agua",
            IncidentKind::Contamination => "Agua contaminada",
            IncidentKind::Infrastructure => "Daño en infraestructura",
            IncidentKind::Other => "Otro problema",
        }
    }
}

/// How long an outage or incident has been going on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutageDuration {
    LessThanDay,
    OneToThreeDays,
    FourToSevenDays,
    MoreThanWeek,
}

impl OutageDuration {
    pub const ALL: [OutageDuration; 4] = [
        OutageDuration::LessThanDay,
        OutageDuration::OneToThreeDays,
        OutageDuration::FourToSevenDays,
        OutageDuration::MoreThanWeek,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutageDuration::LessThanDay => "less_than_day",
            OutageDuration::OneToThreeDays => "one_to_three_days",
            OutageDuration::FourToSevenDays => "four_to_seven_days",
            OutageDuration::MoreThanWeek => "more_than_week",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|duration| duration.as_str() == value)
    }

    pub fn label(self) -> &'static str {
        match self {
            OutageDuration::LessThanDay => "Menos de 24 horas",
            OutageDuration::OneToThreeDays => "De 1 a 3 días",
            OutageDuration::FourToSevenDays => "De 4 a 7 días",
            OutageDuration::MoreThanWeek => "Más de una semana",
        }
    }
}

// ============================================================================
// Finalized records
// ============================================================================

/// A confirmed water delivery order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterOrder {
    pub id: String,
    pub provider_id: String,
    pub provider_name: String,
    pub location_text: String,
    pub quantity_liters: u32,
    pub total_price: Money,
    pub subsidy_applied: Money,
    pub created_at: DateTime<Utc>,
}

impl WaterOrder {
    /// Short user-facing reference
    pub fn folio(&self) -> String {
        format!("PED-{}", short_id(&self.id))
    }
}

/// A filed incident report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentReport {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: IncidentKind,
    pub location_text: String,
    pub duration: OutageDuration,
    pub affected_households: u32,
    pub created_at: DateTime<Utc>,
}

impl IncidentReport {
    pub fn folio(&self) -> String {
        format!("REP-{}", short_id(&self.id))
    }
}

/// Record emitted when a sub-flow reaches its confirmation state.
/// Ownership passes to the record sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum FinalizedRecord {
    WaterOrder(WaterOrder),
    IncidentReport(IncidentReport),
}

impl FinalizedRecord {
    pub fn id(&self) -> &str {
        match self {
            FinalizedRecord::WaterOrder(order) => &order.id,
            FinalizedRecord::IncidentReport(report) => &report.id,
        }
    }
}

fn short_id(id: &str) -> String {
    id.chars()
        .filter(char::is_ascii_hexdigit)
        .take(8)
        .collect::<String>()
        .to_uppercase()
}

// ============================================================================
// Session Context - per-conversation form data
// ============================================================================

/// Incident report fields collected so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReport {
    #[serde(rename = "type")]
    pub kind: Option<IncidentKind>,
    pub location_text: Option<String>,
    pub duration: Option<OutageDuration>,
    pub affected_households: Option<u32>,
}

impl PendingReport {
    /// Build the final record once every field has been captured
    pub fn finalize(&self, id: String, created_at: DateTime<Utc>) -> Option<IncidentReport> {
        Some(IncidentReport {
            id,
            kind: self.kind?,
            location_text: self.location_text.clone()?,
            duration: self.duration?,
            affected_households: self.affected_households?,
            created_at,
        })
    }
}

/// The task sub-flow currently in progress. At most one exists per session,
/// so a pending report and a selected provider can never coexist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubFlow {
    #[default]
    Idle,
    Order {
        provider: Provider,
        location: String,
    },
    Report(PendingReport),
}

/// Mutable record scoped to one conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub sub_flow: SubFlow,
    /// Orders confirmed during this conversation, oldest first
    #[serde(default)]
    pub placed_orders: Vec<WaterOrder>,
}

impl SessionContext {
    pub fn pending_report(&self) -> Option<&PendingReport> {
        match &self.sub_flow {
            SubFlow::Report(report) => Some(report),
            _ => None,
        }
    }

    pub fn selected_provider(&self) -> Option<&Provider> {
        match &self.sub_flow {
            SubFlow::Order { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Copy of this context with the active sub-flow replaced
    pub fn with_sub_flow(&self, sub_flow: SubFlow) -> Self {
        Self {
            sub_flow,
            placed_orders: self.placed_orders.clone(),
        }
    }

    /// Copy of this context with no sub-flow in progress
    pub fn idle(&self) -> Self {
        self.with_sub_flow(SubFlow::Idle)
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// How the provider list is framed to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingFraming {
    /// Part of a water order
    Order,
    /// Price consultation
    Prices,
}

/// Conversation state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Initial state, left on the first event and never re-entered
    #[default]
    Welcome,

    /// Top-level menu
    MainMenu,

    /// Order flow: waiting for the delivery location
    RequestLocation,

    /// Price flow: waiting for the location to quote
    PricesLocation,

    /// Provider list on screen
    ShowProviders {
        framing: ListingFraming,
        location: String,
        /// Providers in the order they were listed (1-based on screen)
        shown: Vec<Provider>,
    },

    /// Waiting for the user to confirm the selected provider
    ConfirmOrder,

    /// Order finalized; advances to `MainMenu` on its own
    OrderConfirmed { order_id: String },

    /// Orders placed in this conversation
    OrdersMenu,

    /// Report flow: incident type menu
    ReportType,

    /// Report flow: free-text location
    ReportLocation,

    /// Report flow: duration menu
    ReportDuration,

    /// Report flow: affected household count
    ReportAffected,

    /// Report finalized; advances to `MainMenu` on its own
    ReportConfirmed { report_id: String },
}

impl ConvState {
    /// Stable snake-case name, matching the serialized tag
    pub fn name(&self) -> &'static str {
        match self {
            ConvState::Welcome => "welcome",
            ConvState::MainMenu => "main_menu",
            ConvState::RequestLocation => "request_location",
            ConvState::PricesLocation => "prices_location",
            ConvState::ShowProviders { .. } => "show_providers",
            ConvState::ConfirmOrder => "confirm_order",
            ConvState::OrderConfirmed { .. } => "order_confirmed",
            ConvState::OrdersMenu => "orders_menu",
            ConvState::ReportType => "report_type",
            ConvState::ReportLocation => "report_location",
            ConvState::ReportDuration => "report_duration",
            ConvState::ReportAffected => "report_affected",
            ConvState::ReportConfirmed { .. } => "report_confirmed",
        }
    }

    /// Confirmation states never wait for input
    pub fn is_confirmation(&self) -> bool {
        matches!(
            self,
            ConvState::OrderConfirmed { .. } | ConvState::ReportConfirmed { .. }
        )
    }

    /// Whether handling a turn in this state needs a fresh catalog snapshot
    pub fn needs_catalog(&self) -> bool {
        matches!(
            self,
            ConvState::RequestLocation | ConvState::PricesLocation | ConvState::ShowProviders { .. }
        )
    }

    /// Options the user can currently pick by id
    pub fn offered_options(&self) -> Vec<MenuOption> {
        match self {
            ConvState::Welcome | ConvState::MainMenu => prompts::main_menu_options(),
            ConvState::ShowProviders { shown, .. } => prompts::provider_options(shown),
            ConvState::ConfirmOrder => prompts::confirm_options(),
            ConvState::OrdersMenu => prompts::orders_menu_options(),
            ConvState::ReportType => prompts::report_type_options(),
            ConvState::ReportDuration => prompts::duration_options(),
            ConvState::RequestLocation
            | ConvState::PricesLocation
            | ConvState::OrderConfirmed { .. }
            | ConvState::ReportLocation
            | ConvState::ReportAffected
            | ConvState::ReportConfirmed { .. } => Vec::new(),
        }
    }
}

// ============================================================================
// Conversation Context - immutable per-session configuration
// ============================================================================

/// Default quantity for a water order, in liters
pub const DEFAULT_ORDER_LITERS: u32 = 1_000;

/// Context for a conversation (immutable configuration)
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub session_id: String,
    /// Liters delivered per order
    pub order_liters: u32,
    /// Discount applied to every order, 0..=100
    pub subsidy_percent: u8,
}

impl ConvContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            order_liters: DEFAULT_ORDER_LITERS,
            subsidy_percent: 0,
        }
    }

    pub fn with_order_liters(mut self, liters: u32) -> Self {
        self.order_liters = liters;
        self
    }

    pub fn with_subsidy_percent(mut self, percent: u8) -> Self {
        self.subsidy_percent = percent.min(100);
        self
    }

    pub fn quote(&self, provider: &Provider) -> Quote {
        Quote::for_provider(provider, self.order_liters, self.subsidy_percent)
    }
}
