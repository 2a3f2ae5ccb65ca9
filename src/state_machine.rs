//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! the interpreter turns a raw turn into a [`Signal`], and [`transition`]
//! maps `(state, session context, event)` to the next state, the bot
//! utterances to emit and the effects for the runtime to execute.

mod effect;
pub mod event;
pub mod interpreter;
pub mod prompts;
pub mod state;
pub(crate) mod transition;


pub use effect::{Effect, MenuOption, Utterance};
pub use event::{Event, TurnInput, UserInput};
pub use interpreter::interpret;
pub use state::{
    ConvContext, ConvState, FinalizedRecord, Provider, SessionContext, DEFAULT_ORDER_LITERS,
};
pub use transition::transition;
