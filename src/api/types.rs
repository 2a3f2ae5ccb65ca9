//! API request and response types

use crate::state_machine::state::{IncidentReport, WaterOrder};
use crate::state_machine::{Provider, UserInput};
use serde::{Deserialize, Serialize};

/// Response for session creation
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

/// One user turn: typed text or a pressed option, never both
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub text: Option<String>,
    pub option_id: Option<String>,
}

impl TurnRequest {
    pub fn into_input(self) -> Result<UserInput, &'static str> {
        match (self.text, self.option_id) {
            (Some(text), None) => Ok(UserInput::Text(text)),
            (None, Some(id)) => Ok(UserInput::Option(id)),
            (Some(_), Some(_)) => Err("Send either text or option_id, not both"),
            (None, None) => Err("Missing text or option_id"),
        }
    }
}

/// Response for a queued turn
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub queued: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<Provider>,
}

#[derive(Debug, Serialize)]
pub struct ProviderResponse {
    pub provider: Provider,
}

/// Operator update of a provider
#[derive(Debug, Deserialize)]
pub struct UpdateProviderRequest {
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<WaterOrder>,
}

#[derive(Debug, Serialize)]
pub struct ReportsResponse {
    pub reports: Vec<IncidentReport>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
