//! Events that can occur in a conversation

use super::effect::MenuOption;
use super::state::{IncidentKind, OutageDuration, Provider};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw user turn as it arrives at the session boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum UserInput {
    /// Free text typed by the user
    Text(String),
    /// A menu button pressed by the user
    Option(String),
}

impl UserInput {
    pub fn raw(&self) -> &str {
        match self {
            UserInput::Text(text) | UserInput::Option(text) => text,
        }
    }

    /// What the transcript shows for this turn: the label of a pressed
    /// button, or the text as typed
    pub fn display_text(&self, options: &[MenuOption]) -> String {
        match self {
            UserInput::Option(id) => options
                .iter()
                .find(|option| option.id == *id)
                .map_or_else(|| id.clone(), |option| option.label.clone()),
            UserInput::Text(text) => text.clone(),
        }
    }
}

/// What a keyword trigger means in the state it was registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    RequestWater,
    ReportIssue,
    CheckPrices,
    MyOrders,
    NewOrder,
    BackToMenu,
    Confirm,
    Cancel,
    Incident(IncidentKind),
    Duration(OutageDuration),
}

/// Interpreted meaning of one user turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// The input matched an offered option id exactly
    OptionSelected(String),
    /// The input contained a trigger phrase registered for the state
    KeywordMatch(Intent),
    /// Free-form capture for a state that expects one
    RawCapture(String),
    Unrecognized,
}

/// A user turn after interpretation, with everything the pure transition
/// needs from the outside world
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub signal: Signal,
    /// Fresh available-only catalog snapshot; empty for states that do not
    /// consult the catalog
    pub providers: Vec<Provider>,
    /// Id to use if this turn finalizes a record
    pub record_id: String,
    pub received_at: DateTime<Utc>,
}

impl TurnInput {
    pub fn new(signal: Signal) -> Self {
        Self {
            signal,
            providers: Vec::new(),
            record_id: uuid::Uuid::new_v4().to_string(),
            received_at: Utc::now(),
        }
    }

    pub fn with_providers(mut self, providers: Vec<Provider>) -> Self {
        self.providers = providers;
        self
    }
}

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// Fed once by the runtime when the session starts
    SessionStarted,

    /// An interpreted user turn
    UserTurn(TurnInput),

    /// Fed by the runtime after a confirmation summary has been emitted
    Advance,
}
