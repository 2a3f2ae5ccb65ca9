//! Effects and utterances produced by state transitions

use super::state::FinalizedRecord;
use serde::{Deserialize, Serialize};

/// A selectable option attached to a bot turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuOption {
    pub id: String,
    pub label: String,
}

impl MenuOption {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// One bot message, in the order it should be emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub content: String,
    pub options: Option<Vec<MenuOption>>,
}

impl Utterance {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            options: None,
        }
    }

    pub fn menu(content: impl Into<String>, options: Vec<MenuOption>) -> Self {
        Self {
            content: content.into(),
            options: Some(options),
        }
    }
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Hand a finalized record to the sink (fire-and-forget)
    SubmitRecord(FinalizedRecord),

    /// Notify observers of the new state
    PublishState,

    /// Leave a confirmation state once its summary has been emitted
    Advance,
}

impl Effect {
    pub fn submit(record: FinalizedRecord) -> Self {
        Effect::SubmitRecord(record)
    }
}
