//! Session runtime executor

use super::scheduler::{DrainOutcome, TurnScheduler};
use super::traits::{ProviderCatalog, RecordSink};
use super::SessionEvent;

use crate::state_machine::{
    interpret, transition, ConvContext, ConvState, Effect, Event, FinalizedRecord, Provider,
    SessionContext, TurnInput, UserInput,
};
use crate::transcript::Transcript;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Drives one conversation: reads user input, runs the pure transition and
/// executes its effects, pacing bot replies through the turn scheduler.
///
/// Input is read only after the previous transition's replies have drained,
/// so anything sent in the meantime waits in the channel.
pub struct SessionRuntime<C, K>
where
    C: ProviderCatalog + ?Sized + 'static,
    K: RecordSink + ?Sized + 'static,
{
    context: ConvContext,
    state: ConvState,
    session: SessionContext,
    transcript: Transcript,
    scheduler: TurnScheduler,
    catalog: Arc<C>,
    sink: Arc<K>,
    input_rx: mpsc::Receiver<UserInput>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    state_tx: watch::Sender<ConvState>,
    cancel: CancellationToken,
}

impl<C, K> SessionRuntime<C, K>
where
    C: ProviderCatalog + ?Sized + 'static,
    K: RecordSink + ?Sized + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: ConvContext,
        transcript: Transcript,
        scheduler: TurnScheduler,
        catalog: Arc<C>,
        sink: Arc<K>,
        input_rx: mpsc::Receiver<UserInput>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
        state_tx: watch::Sender<ConvState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            context,
            state: ConvState::Welcome,
            session: SessionContext::default(),
            transcript,
            scheduler,
            catalog,
            sink,
            input_rx,
            broadcast_tx,
            state_tx,
            cancel,
        }
    }

    pub async fn run(mut self) {
        let session_id = self.context.session_id.clone();
        tracing::info!(
            session_id = %session_id,
            pacing = ?self.scheduler.pacing(),
            "Starting session runtime"
        );

        self.process_event(Event::SessionStarted).await;

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => break,

                input = self.input_rx.recv() => match input {
                    Some(input) => self.handle_user_turn(input).await,
                    None => break,
                },
            }
        }

        let transcript = self.transcript.handle();
        transcript.dispose();
        let _ = self.broadcast_tx.send(SessionEvent::Closed);
        tracing::info!(
            session_id = %session_id,
            turns = transcript.len(),
            "Session runtime stopped"
        );
    }

    /// The single input path: record the turn, interpret it, transition
    async fn handle_user_turn(&mut self, input: UserInput) {
        let options = self.state.offered_options();

        if self
            .transcript
            .append_user(input.display_text(&options))
            .is_err()
        {
            tracing::debug!(session_id = %self.context.session_id, "Input after disposal ignored");
            return;
        }

        let signal = interpret(&self.state, &input, &options);
        tracing::debug!(
            session_id = %self.context.session_id,
            state = self.state.name(),
            ?signal,
            "Interpreted user turn"
        );

        let providers = if self.state.needs_catalog() {
            self.catalog_snapshot().await
        } else {
            Vec::new()
        };

        self.process_event(Event::UserTurn(
            TurnInput::new(signal).with_providers(providers),
        ))
        .await;
    }

    /// Fresh copy of the available providers. A failing catalog reads as
    /// an empty one, which the conversation already handles.
    async fn catalog_snapshot(&self) -> Vec<Provider> {
        match self.catalog.list_available_providers().await {
            Ok(providers) => providers,
            Err(e) => {
                tracing::warn!(
                    session_id = %self.context.session_id,
                    error = %e,
                    "Provider catalog unavailable"
                );
                Vec::new()
            }
        }
    }

    async fn process_event(&mut self, event: Event) {
        // Process events in a loop to handle chained effects
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let result = match transition(
                &self.state,
                &self.session,
                &self.context,
                current_event,
            ) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(
                        session_id = %self.context.session_id,
                        error = %e,
                        "Rejected runtime event"
                    );
                    return;
                }
            };

            let from = self.state.name();
            self.state = result.new_state;
            self.session = result.context;
            tracing::debug!(
                session_id = %self.context.session_id,
                from,
                to = self.state.name(),
                "Transition"
            );

            // The sink hears about records at once; observers only after the
            // replies that announce them are in the transcript
            for effect in &result.effects {
                if let Effect::SubmitRecord(record) = effect {
                    self.submit_record(record.clone());
                }
            }

            match self
                .scheduler
                .drain(&self.transcript, result.utterances)
                .await
            {
                DrainOutcome::Completed { .. } => {}
                DrainOutcome::Cancelled { emitted, dropped } => {
                    tracing::info!(
                        session_id = %self.context.session_id,
                        emitted,
                        dropped,
                        "Session closed while replies were pending"
                    );
                    return;
                }
            }

            let mut generated = Vec::new();
            for effect in result.effects {
                if let Some(event) = self.execute_effect(effect) {
                    generated.push(event);
                }
            }

            events_to_process.extend(generated);
        }
    }

    /// Hand a finalized record to the sink without waiting on it
    fn submit_record(&self, record: FinalizedRecord) {
        tracing::info!(
            session_id = %self.context.session_id,
            record_id = %record.id(),
            "Submitting finalized record"
        );

        // Fire-and-forget: the confirmation does not wait on the sink
        let sink = Arc::clone(&self.sink);
        let session_id = self.context.session_id.clone();
        tokio::spawn(async move {
            let record_id = record.id().to_string();
            if let Err(e) = sink.submit(record).await {
                tracing::error!(
                    session_id = %session_id,
                    record_id = %record_id,
                    error = %e,
                    "Record sink failed"
                );
            }
        });
    }

    /// Execute an effect and optionally return a generated event
    fn execute_effect(&self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::SubmitRecord(record) => {
                let record_json = serde_json::to_value(&record).unwrap_or(Value::Null);
                let _ = self
                    .broadcast_tx
                    .send(SessionEvent::Record { record: record_json });
                None
            }

            Effect::PublishState => {
                self.state_tx.send_replace(self.state.clone());
                let state_json = serde_json::to_value(&self.state).unwrap_or(Value::Null);
                let _ = self
                    .broadcast_tx
                    .send(SessionEvent::StateChange { state: state_json });
                None
            }

            Effect::Advance => Some(Event::Advance),
        }
    }
}
