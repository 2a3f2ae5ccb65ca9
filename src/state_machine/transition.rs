//! Pure state transition function
//!
//! Every `(state, user turn)` pair has a defined outcome: either the flow
//! advances, or the bot re-prompts and the state stays put (or falls back
//! to the main menu). Only runtime-originated events can be rejected.

use super::effect::{Effect, Utterance};
use super::event::{Event, Intent, Signal, TurnInput};
use super::interpreter::{capture_count, parse_index};
use super::prompts;
use super::state::{
    ConvContext, ConvState, FinalizedRecord, ListingFraming, PendingReport, Provider,
    SessionContext, SubFlow, WaterOrder,
};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub context: SessionContext,
    /// Bot messages to emit, in order
    pub utterances: Vec<Utterance>,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState, context: SessionContext) -> Self {
        Self {
            new_state: state,
            context,
            utterances: vec![],
            effects: vec![Effect::PublishState],
        }
    }

    pub fn with_utterance(mut self, utterance: Utterance) -> Self {
        self.utterances.push(utterance);
        self
    }

    pub fn with_utterances(mut self, utterances: impl IntoIterator<Item = Utterance>) -> Self {
        self.utterances.extend(utterances);
        self
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Put an utterance in front of the ones already queued
    fn preceded_by(mut self, utterance: Utterance) -> Self {
        self.utterances.insert(0, utterance);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs. Ids and
/// timestamps for finalized records come in with the event.
pub fn transition(
    state: &ConvState,
    session: &SessionContext,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Session start
        // ============================================================
        (ConvState::Welcome, Event::SessionStarted) => {
            Ok(main_menu(session).preceded_by(prompts::greeting()))
        }

        (state, Event::SessionStarted) => Err(TransitionError::InvalidTransition(format!(
            "session already started (in {})",
            state.name()
        ))),

        // ============================================================
        // Confirmation states advance on their own
        // ============================================================
        (state, Event::Advance) if state.is_confirmation() => {
            Ok(TransitionResult::new(ConvState::MainMenu, session.idle())
                .with_utterance(prompts::anything_else()))
        }

        (state, Event::Advance) => Err(TransitionError::InvalidTransition(format!(
            "nothing to advance from {}",
            state.name()
        ))),

        (state, Event::UserTurn(turn)) => Ok(user_turn(state, session, context, turn)),
    }
}

fn user_turn(
    state: &ConvState,
    session: &SessionContext,
    context: &ConvContext,
    turn: TurnInput,
) -> TransitionResult {
    match state {
        // A turn before the greeting went out: greet, then treat it as a
        // main menu choice
        ConvState::Welcome => {
            if turn.signal == Signal::Unrecognized {
                main_menu(session).preceded_by(prompts::greeting())
            } else {
                main_menu_turn(session, &turn.signal).preceded_by(prompts::greeting())
            }
        }

        ConvState::MainMenu => main_menu_turn(session, &turn.signal),

        ConvState::RequestLocation => {
            location_turn(ListingFraming::Order, session, context, turn)
        }
        ConvState::PricesLocation => {
            location_turn(ListingFraming::Prices, session, context, turn)
        }

        ConvState::ShowProviders {
            framing,
            location,
            shown,
        } => provider_selection_turn(*framing, location, shown, session, context, turn),

        ConvState::ConfirmOrder => confirm_order_turn(session, context, turn),

        ConvState::OrdersMenu => orders_menu_turn(session, &turn.signal),

        ConvState::ReportType => report_type_turn(session, &turn.signal),
        ConvState::ReportLocation => report_location_turn(session, turn.signal),
        ConvState::ReportDuration => report_duration_turn(session, &turn.signal),
        ConvState::ReportAffected => report_affected_turn(session, turn),

        // Input normally never reaches a confirmation state; move on rather
        // than leave the user without an answer
        ConvState::OrderConfirmed { .. } | ConvState::ReportConfirmed { .. } => {
            main_menu(session)
        }
    }
}

// ============================================================================
// Main menu
// ============================================================================

fn main_menu(session: &SessionContext) -> TransitionResult {
    TransitionResult::new(ConvState::MainMenu, session.idle()).with_utterance(prompts::main_menu())
}

fn main_menu_turn(session: &SessionContext, signal: &Signal) -> TransitionResult {
    let intent = match signal {
        Signal::OptionSelected(id) => prompts::main_menu_intent(id),
        Signal::KeywordMatch(intent) => Some(*intent),
        Signal::RawCapture(_) | Signal::Unrecognized => None,
    };

    match intent {
        Some(Intent::RequestWater) => {
            TransitionResult::new(ConvState::RequestLocation, session.idle())
                .with_utterance(prompts::ask_delivery_location())
        }
        Some(Intent::ReportIssue) => TransitionResult::new(
            ConvState::ReportType,
            session.with_sub_flow(SubFlow::Report(PendingReport::default())),
        )
        .with_utterance(prompts::report_type_menu()),
        Some(Intent::CheckPrices) => {
            TransitionResult::new(ConvState::PricesLocation, session.idle())
                .with_utterance(prompts::ask_prices_location())
        }
        Some(Intent::MyOrders) => orders_menu(session),
        _ => main_menu(session).preceded_by(prompts::not_understood()),
    }
}

// ============================================================================
// Order and price flows
// ============================================================================

fn location_turn(
    framing: ListingFraming,
    session: &SessionContext,
    context: &ConvContext,
    turn: TurnInput,
) -> TransitionResult {
    match turn.signal {
        Signal::RawCapture(location) if !location.trim().is_empty() => {
            show_providers(framing, location, turn.providers, session, context)
        }
        _ => {
            let state = match framing {
                ListingFraming::Order => ConvState::RequestLocation,
                ListingFraming::Prices => ConvState::PricesLocation,
            };
            TransitionResult::new(state, session.idle())
                .with_utterance(prompts::ask_location_again())
        }
    }
}

/// Enter (or re-enter) the provider list from a fresh snapshot
fn show_providers(
    framing: ListingFraming,
    location: String,
    snapshot: Vec<Provider>,
    session: &SessionContext,
    context: &ConvContext,
) -> TransitionResult {
    let available: Vec<Provider> = snapshot.into_iter().filter(|p| p.available).collect();

    if available.is_empty() {
        return main_menu(session).preceded_by(prompts::no_providers(&location));
    }

    let listing = prompts::provider_listing(framing, &location, &available, context);
    TransitionResult::new(
        ConvState::ShowProviders {
            framing,
            location,
            shown: available,
        },
        session.idle(),
    )
    .with_utterance(listing)
}

fn provider_selection_turn(
    framing: ListingFraming,
    location: &str,
    shown: &[Provider],
    session: &SessionContext,
    context: &ConvContext,
    turn: TurnInput,
) -> TransitionResult {
    let index = match &turn.signal {
        Signal::OptionSelected(id) if id == prompts::BACK_TO_MENU_ID => return main_menu(session),
        Signal::KeywordMatch(Intent::BackToMenu) => return main_menu(session),
        Signal::OptionSelected(raw) | Signal::RawCapture(raw) => parse_index(raw),
        Signal::KeywordMatch(_) | Signal::Unrecognized => None,
    };

    let Some(chosen) = index
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| shown.get(i))
    else {
        let count = shown.len();
        return show_providers(framing, location.to_string(), turn.providers, session, context)
            .preceded_by(prompts::invalid_selection(count));
    };

    // Re-validate against the fresh snapshot, never the list on screen
    let fresh = turn
        .providers
        .iter()
        .find(|p| p.id == chosen.id && p.available)
        .cloned();

    match fresh {
        Some(provider) => {
            let summary = prompts::confirm_order(&provider, location, context);
            TransitionResult::new(
                ConvState::ConfirmOrder,
                session.with_sub_flow(SubFlow::Order {
                    provider,
                    location: location.to_string(),
                }),
            )
            .with_utterance(summary)
        }
        None => show_providers(framing, location.to_string(), turn.providers, session, context)
            .preceded_by(prompts::stale_selection()),
    }
}

fn confirm_order_turn(
    session: &SessionContext,
    context: &ConvContext,
    turn: TurnInput,
) -> TransitionResult {
    let confirmed = match &turn.signal {
        Signal::OptionSelected(id) => id == prompts::CONFIRM_ID,
        Signal::KeywordMatch(intent) => *intent == Intent::Confirm,
        Signal::RawCapture(_) | Signal::Unrecognized => false,
    };

    let SubFlow::Order { provider, location } = &session.sub_flow else {
        return main_menu(session).preceded_by(prompts::order_cancelled());
    };

    if !confirmed {
        return main_menu(session).preceded_by(prompts::order_cancelled());
    }

    let quote = context.quote(provider);
    let order = WaterOrder {
        id: turn.record_id,
        provider_id: provider.id.clone(),
        provider_name: provider.name.clone(),
        location_text: location.clone(),
        quantity_liters: context.order_liters,
        total_price: quote.total,
        subsidy_applied: quote.subsidy,
        created_at: turn.received_at,
    };

    let mut next = session.idle();
    next.placed_orders.push(order.clone());

    TransitionResult::new(
        ConvState::OrderConfirmed {
            order_id: order.id.clone(),
        },
        next,
    )
    .with_utterances(prompts::order_confirmed(&order))
    .with_effect(Effect::submit(FinalizedRecord::WaterOrder(order)))
    .with_effect(Effect::Advance)
}

fn orders_menu(session: &SessionContext) -> TransitionResult {
    TransitionResult::new(ConvState::OrdersMenu, session.idle())
        .with_utterance(prompts::orders_menu(&session.placed_orders))
}

fn orders_menu_turn(session: &SessionContext, signal: &Signal) -> TransitionResult {
    let intent = match signal {
        Signal::OptionSelected(id) => prompts::orders_menu_intent(id),
        Signal::KeywordMatch(intent) => Some(*intent),
        Signal::RawCapture(_) | Signal::Unrecognized => None,
    };

    match intent {
        Some(Intent::NewOrder) => TransitionResult::new(ConvState::RequestLocation, session.idle())
            .with_utterance(prompts::ask_delivery_location()),
        Some(Intent::BackToMenu) => main_menu(session),
        _ => orders_menu(session).preceded_by(prompts::not_understood()),
    }
}

// ============================================================================
// Report flow
// ============================================================================

/// The report being filled in, or a blank one if the context lost it
fn pending_report(session: &SessionContext) -> PendingReport {
    session.pending_report().cloned().unwrap_or_default()
}

fn report_step(
    state: ConvState,
    session: &SessionContext,
    report: PendingReport,
    prompt: Utterance,
) -> TransitionResult {
    TransitionResult::new(state, session.with_sub_flow(SubFlow::Report(report))).with_utterance(prompt)
}

fn report_type_turn(session: &SessionContext, signal: &Signal) -> TransitionResult {
    let kind = match signal {
        Signal::OptionSelected(id) => prompts::report_kind_for_option(id),
        Signal::KeywordMatch(Intent::Incident(kind)) => Some(*kind),
        _ => None,
    };

    let report = pending_report(session);
    match kind {
        Some(kind) => report_step(
            ConvState::ReportLocation,
            session,
            PendingReport {
                kind: Some(kind),
                ..report
            },
            prompts::ask_report_location(),
        ),
        None => report_step(ConvState::ReportType, session, report, prompts::report_type_menu())
            .preceded_by(prompts::not_understood()),
    }
}

fn report_location_turn(session: &SessionContext, signal: Signal) -> TransitionResult {
    let report = pending_report(session);
    match signal {
        Signal::RawCapture(location) if !location.trim().is_empty() => report_step(
            ConvState::ReportDuration,
            session,
            PendingReport {
                location_text: Some(location),
                ..report
            },
            prompts::duration_menu(),
        ),
        _ => report_step(
            ConvState::ReportLocation,
            session,
            report,
            prompts::ask_report_location(),
        )
        .preceded_by(prompts::not_understood()),
    }
}

fn report_duration_turn(session: &SessionContext, signal: &Signal) -> TransitionResult {
    let duration = match signal {
        Signal::OptionSelected(id) => prompts::duration_for_option(id),
        Signal::KeywordMatch(Intent::Duration(duration)) => Some(*duration),
        _ => None,
    };

    let report = pending_report(session);
    match duration {
        Some(duration) => report_step(
            ConvState::ReportAffected,
            session,
            PendingReport {
                duration: Some(duration),
                ..report
            },
            prompts::ask_affected_households(),
        ),
        None => report_step(ConvState::ReportDuration, session, report, prompts::duration_menu())
            .preceded_by(prompts::not_understood()),
    }
}

fn report_affected_turn(session: &SessionContext, turn: TurnInput) -> TransitionResult {
    let report = pending_report(session);

    let Signal::RawCapture(raw) = &turn.signal else {
        return report_step(
            ConvState::ReportAffected,
            session,
            report,
            prompts::ask_affected_households(),
        )
        .preceded_by(prompts::not_understood());
    };

    let report = PendingReport {
        affected_households: Some(capture_count(raw)),
        ..report
    };

    match report.finalize(turn.record_id, turn.received_at) {
        Some(finished) => TransitionResult::new(
            ConvState::ReportConfirmed {
                report_id: finished.id.clone(),
            },
            session.idle(),
        )
        .with_utterances(prompts::report_confirmed(&finished))
        .with_effect(Effect::submit(FinalizedRecord::IncidentReport(finished)))
        .with_effect(Effect::Advance),
        None => report_step(
            ConvState::ReportType,
            session,
            PendingReport::default(),
            prompts::report_type_menu(),
        )
        .preceded_by(prompts::report_restart()),
    }
}
