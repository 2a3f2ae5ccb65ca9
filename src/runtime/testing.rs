//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::scheduler::TurnScheduler;
use super::traits::*;
use super::{SessionEvent, SessionRuntime};
use crate::state_machine::state::Money;
use crate::state_machine::{ConvContext, ConvState, FinalizedRecord, Provider, UserInput};
use crate::transcript::{Author, Transcript, TranscriptHandle};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Provider Catalog
// ============================================================================

/// Catalog backed by a mutable list, so tests can change availability
/// between turns
pub struct StaticCatalog {
    providers: Mutex<Vec<Provider>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl StaticCatalog {
    pub fn new(providers: Vec<Provider>) -> Self {
        Self {
            providers: Mutex::new(providers),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Three available providers: `p-1`, `p-2`, `p-3`
    pub fn demo() -> Self {
        Self::new(vec![
            test_provider("p-1", "Pipas del Valle", 35),
            test_provider("p-2", "Hidro Servicios Sur", 32),
            test_provider("p-3", "Agua Limpia Tlalpan", 40),
        ])
    }

    pub fn set_available(&self, id: &str, available: bool) {
        for provider in self.providers.lock().unwrap().iter_mut() {
            if provider.id == id {
                provider.available = available;
            }
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderCatalog for StaticCatalog {
    async fn list_available_providers(&self) -> Result<Vec<Provider>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("mock catalog offline".to_string()));
        }
        Ok(self
            .providers
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.available)
            .cloned()
            .collect())
    }
}

pub fn test_provider(id: &str, name: &str, cents: u64) -> Provider {
    Provider {
        id: id.to_string(),
        name: name.to_string(),
        price_per_liter: Money::from_cents(cents),
        eta_minutes: 45,
        rating: 4.5,
        available: true,
    }
}

// ============================================================================
// Mock Record Sink
// ============================================================================

/// Sink that keeps every record it accepts
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<FinalizedRecord>>,
    failing: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects everything
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn records(&self) -> Vec<FinalizedRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Wait until at least `count` records arrived
    pub async fn wait_for_records(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.records.lock().unwrap().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

#[async_trait]
impl RecordSink for RecordingSink {
    async fn submit(&self, record: FinalizedRecord) -> Result<(), SinkError> {
        if self.failing {
            return Err(SinkError::Rejected("mock sink offline".to_string()));
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

// ============================================================================
// Test Session Builder
// ============================================================================

/// A running session wired to mocks, with its observers
pub struct TestSession {
    pub input_tx: mpsc::Sender<UserInput>,
    pub events: broadcast::Receiver<SessionEvent>,
    pub transcript: TranscriptHandle,
    pub state_rx: watch::Receiver<ConvState>,
    pub catalog: Arc<StaticCatalog>,
    pub sink: Arc<RecordingSink>,
    pub cancel: CancellationToken,
    _runtime_handle: tokio::task::JoinHandle<()>,
}

impl TestSession {
    pub fn builder() -> TestSessionBuilder {
        TestSessionBuilder::new()
    }
}

pub struct TestSessionBuilder {
    session_id: String,
    pacing: Duration,
    subsidy_percent: u8,
    catalog: Option<StaticCatalog>,
    sink: Option<RecordingSink>,
}

impl TestSessionBuilder {
    pub fn new() -> Self {
        Self {
            session_id: "test-session".to_string(),
            pacing: Duration::ZERO,
            subsidy_percent: 0,
            catalog: None,
            sink: None,
        }
    }

    pub fn pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn subsidy_percent(mut self, percent: u8) -> Self {
        self.subsidy_percent = percent;
        self
    }

    pub fn catalog(mut self, catalog: StaticCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn sink(mut self, sink: RecordingSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> TestSession {
        let catalog = Arc::new(self.catalog.unwrap_or_else(StaticCatalog::demo));
        let sink = Arc::new(self.sink.unwrap_or_default());

        let context =
            ConvContext::new(&self.session_id).with_subsidy_percent(self.subsidy_percent);
        let (input_tx, input_rx) = mpsc::channel(32);
        let (broadcast_tx, events) = broadcast::channel(256);
        let (state_tx, state_rx) = watch::channel(ConvState::Welcome);
        let cancel = CancellationToken::new();

        let transcript = Transcript::new(broadcast_tx.clone());
        let transcript_handle = transcript.handle();

        let runtime = SessionRuntime::new(
            context,
            transcript,
            TurnScheduler::new(self.pacing, cancel.clone()),
            catalog.clone(),
            sink.clone(),
            input_rx,
            broadcast_tx,
            state_tx,
            cancel.clone(),
        );

        let handle = tokio::spawn(async move {
            runtime.run().await;
        });

        TestSession {
            input_tx,
            events,
            transcript: transcript_handle,
            state_rx,
            catalog,
            sink,
            cancel,
            _runtime_handle: handle,
        }
    }
}

impl Default for TestSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestSession {
    /// Send typed text
    pub async fn say(&self, text: &str) {
        self.input_tx
            .send(UserInput::Text(text.to_string()))
            .await
            .expect("Failed to send input");
    }

    /// Press a menu button
    pub async fn press(&self, option_id: &str) {
        self.input_tx
            .send(UserInput::Option(option_id.to_string()))
            .await
            .expect("Failed to send input");
    }

    /// Wait for the next state change of the given type
    pub async fn wait_for_state(&mut self, expected_type: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.events.recv()).await {
                Ok(Ok(SessionEvent::StateChange { state })) => {
                    if state.get("type").and_then(|v| v.as_str()) == Some(expected_type) {
                        return true;
                    }
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => return false,
                _ => continue,
            }
        }
        false
    }

    /// Wait for the runtime to announce it has stopped
    pub async fn wait_for_closed(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.events.recv()).await {
                Ok(Ok(SessionEvent::Closed)) => return true,
                Ok(Err(broadcast::error::RecvError::Closed)) => return false,
                _ => continue,
            }
        }
        false
    }

    /// Wait until the transcript holds at least `count` bot turns
    pub async fn wait_for_bot_turns(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.bot_texts().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    pub fn bot_texts(&self) -> Vec<String> {
        self.texts_by(Author::Bot)
    }

    pub fn user_texts(&self) -> Vec<String> {
        self.texts_by(Author::User)
    }

    fn texts_by(&self, author: Author) -> Vec<String> {
        self.transcript
            .turns()
            .into_iter()
            .filter(|t| t.author == author)
            .map(|t| t.content)
            .collect()
    }

    pub fn state(&self) -> ConvState {
        self.state_rx.borrow().clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{SessionError, SessionManager, SessionSettings};
    use crate::state_machine::prompts;

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_static_catalog_filters_and_fails() {
        let catalog = StaticCatalog::demo();
        catalog.set_available("p-1", false);
        let providers = catalog.list_available_providers().await.unwrap();
        assert_eq!(providers.len(), 2);

        catalog.set_failing(true);
        assert!(catalog.list_available_providers().await.is_err());
        assert_eq!(catalog.call_count(), 2);
    }

    #[tokio::test]
    async fn test_session_greets_on_start() {
        let mut session = TestSession::builder().build();
        assert!(session.wait_for_state("main_menu", WAIT).await);
        assert!(session.wait_for_bot_turns(2, WAIT).await);

        let bot = session.bot_texts();
        assert_eq!(bot[0], prompts::greeting().content);
        assert_eq!(bot[1], prompts::main_menu().content);
        let turns = session.transcript.turns();
        assert_eq!(turns[1].options.as_ref().unwrap().len(), 4);
    }

    /// Integration test: order from greeting to confirmation
    #[tokio::test]
    async fn test_full_order_flow() {
        let mut session = TestSession::builder().build();
        for input in ["1", "Iztapalapa", "1", "confirm"] {
            session.say(input).await;
        }

        assert!(session.wait_for_state("order_confirmed", WAIT).await);
        assert!(session.wait_for_state("main_menu", WAIT).await);
        // greeting + menu, location prompt, listing, summary, two confirmation
        // lines, follow-up menu
        assert!(session.wait_for_bot_turns(8, WAIT).await);
        assert!(session.sink.wait_for_records(1, WAIT).await);

        let records = session.sink.records();
        let FinalizedRecord::WaterOrder(order) = &records[0] else {
            panic!("expected a water order");
        };
        assert_eq!(order.provider_id, "p-1");
        assert_eq!(order.total_price, Money::from_cents(35_000));

        let bot = session.bot_texts();
        let all = bot.join("\n");
        assert!(all.contains(&order.folio()));
        assert!(all.contains("Pipas del Valle"));
        assert!(all.contains("$350.00"));
        assert_eq!(bot.last().unwrap(), &prompts::anything_else().content);
        assert_eq!(session.state(), ConvState::MainMenu);
    }

    /// Observers see a state change only after the replies that announce it
    #[tokio::test]
    async fn test_state_change_follows_its_replies() {
        let mut session = TestSession::builder().build();
        for input in ["1", "Iztapalapa", "1", "confirm"] {
            session.say(input).await;
        }

        let mut events = Vec::new();
        let mut confirmed = false;
        let deadline = tokio::time::Instant::now() + WAIT;
        while tokio::time::Instant::now() < deadline {
            let Ok(Ok(event)) =
                tokio::time::timeout(Duration::from_millis(50), session.events.recv()).await
            else {
                continue;
            };
            let state_type = match &event {
                SessionEvent::StateChange { state } => {
                    state["type"].as_str().map(str::to_string)
                }
                _ => None,
            };
            events.push(event);
            match state_type.as_deref() {
                Some("order_confirmed") => confirmed = true,
                Some("main_menu") if confirmed => break,
                _ => {}
            }
        }
        assert!(confirmed);
        assert!(session.sink.wait_for_records(1, WAIT).await);

        let FinalizedRecord::WaterOrder(order) = &session.sink.records()[0] else {
            panic!("expected a water order");
        };
        let folio = order.folio();
        let turn_at = |needle: &str| {
            events.iter().position(|e| {
                matches!(e, SessionEvent::Turn { turn } if turn.content.contains(needle))
            })
        };
        let state_at = |name: &str| {
            events.iter().position(|e| {
                matches!(e, SessionEvent::StateChange { state } if state["type"] == name)
            })
        };

        let folio_turn = turn_at(&folio).expect("confirmation turn");
        let record = events
            .iter()
            .position(|e| matches!(e, SessionEvent::Record { .. }))
            .expect("record event");
        let order_confirmed = state_at("order_confirmed").expect("order_confirmed");
        assert!(folio_turn < order_confirmed);
        assert!(folio_turn < record);

        let follow_up = events
            .iter()
            .rposition(|e| {
                matches!(e, SessionEvent::Turn { turn }
                    if turn.content == prompts::anything_else().content)
            })
            .expect("follow-up menu");
        let back_to_menu = events
            .iter()
            .rposition(|e| {
                matches!(e, SessionEvent::StateChange { state } if state["type"] == "main_menu")
            })
            .expect("main_menu");
        assert!(order_confirmed < follow_up);
        assert!(follow_up < back_to_menu);
    }

    /// Input sent while replies are still being paced waits its turn
    #[tokio::test(start_paused = true)]
    async fn test_input_is_buffered_until_replies_drain() {
        let session = TestSession::builder()
            .pacing(Duration::from_millis(200))
            .build();

        // both arrive before the greeting has finished
        session.say("1").await;
        session.say("Centro").await;

        assert!(session.wait_for_bot_turns(4, Duration::from_secs(10)).await);
        let authors: Vec<Author> = session
            .transcript
            .turns()
            .into_iter()
            .map(|t| t.author)
            .collect();
        assert_eq!(
            authors,
            vec![
                Author::Bot,
                Author::Bot,
                Author::User,
                Author::Bot,
                Author::User,
                Author::Bot
            ]
        );
        assert_eq!(session.user_texts(), vec!["1", "Centro"]);
    }

    /// Closing a session drops replies that were still scheduled
    #[tokio::test(start_paused = true)]
    async fn test_dispose_cancels_pending_utterances() {
        let mut session = TestSession::builder()
            .pacing(Duration::from_millis(500))
            .build();

        // greeting lands at 500ms, the menu would land at 1000ms
        tokio::time::sleep(Duration::from_millis(750)).await;
        session.transcript.dispose();
        session.cancel.cancel();

        assert!(session.wait_for_closed(Duration::from_secs(5)).await);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(session.bot_texts(), vec![prompts::greeting().content]);
        assert!(session.transcript.is_disposed());
    }

    #[tokio::test]
    async fn test_stale_provider_is_revalidated() {
        let mut session = TestSession::builder().build();
        session.say("1").await;
        session.say("Centro").await;
        assert!(session.wait_for_state("show_providers", WAIT).await);

        session.catalog.set_available("p-2", false);
        session.say("2").await;
        assert!(session.wait_for_state("show_providers", WAIT).await);
        assert!(session.wait_for_bot_turns(6, WAIT).await);

        let ConvState::ShowProviders { shown, .. } = session.state() else {
            panic!("expected the provider list");
        };
        assert_eq!(shown.len(), 2);
        assert!(shown.iter().all(|p| p.id != "p-2"));
        assert!(session
            .bot_texts()
            .contains(&prompts::stale_selection().content));
        assert!(session.sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_catalog_failure_reads_as_empty() {
        let catalog = StaticCatalog::demo();
        catalog.set_failing(true);
        let mut session = TestSession::builder().catalog(catalog).build();

        session.say("3").await;
        session.say("Coyoacán").await;
        assert!(session.wait_for_state("prices_location", WAIT).await);
        assert!(session.wait_for_state("main_menu", WAIT).await);
        assert!(session.wait_for_bot_turns(5, WAIT).await);

        let bot = session.bot_texts();
        assert!(bot[3].contains("no hay proveedores"));
        assert_eq!(session.catalog.call_count(), 1);
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_block_confirmation() {
        let mut session = TestSession::builder()
            .sink(RecordingSink::failing())
            .build();
        for input in ["2", "1", "Calle Ermita 45", "3", "muchos"] {
            session.say(input).await;
        }

        assert!(session.wait_for_state("report_confirmed", WAIT).await);
        assert!(session.wait_for_state("main_menu", WAIT).await);
        assert!(session.wait_for_bot_turns(9, WAIT).await);

        let all = session.bot_texts().join("\n");
        assert!(all.contains("REP-"));
        assert!(all.contains("1 hogar(es)"));
        assert!(session.sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_option_press_shows_label() {
        let mut session = TestSession::builder().build();
        session.press("2").await;
        assert!(session.wait_for_state("report_type", WAIT).await);
        assert_eq!(session.user_texts(), vec!["Reportar un problema"]);
    }

    #[tokio::test]
    async fn test_subsidy_is_applied_to_orders() {
        let mut session = TestSession::builder().subsidy_percent(20).build();
        for input in ["1", "Tlalpan", "3", "sí"] {
            session.say(input).await;
        }
        assert!(session.wait_for_state("order_confirmed", WAIT).await);
        assert!(session.sink.wait_for_records(1, WAIT).await);

        let records = session.sink.records();
        let FinalizedRecord::WaterOrder(order) = &records[0] else {
            panic!("expected a water order");
        };
        assert_eq!(order.subsidy_applied, Money::from_cents(8_000));
        assert_eq!(order.total_price, Money::from_cents(32_000));
    }

    // ------------------------------------------------------------------
    // Session manager
    // ------------------------------------------------------------------

    fn manager() -> (SessionManager, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let manager = SessionManager::new(
            Arc::new(StaticCatalog::demo()),
            sink.clone(),
            SessionSettings {
                pacing: Duration::ZERO,
                ..SessionSettings::default()
            },
        );
        (manager, sink)
    }

    #[tokio::test]
    async fn test_manager_routes_input_and_snapshots() {
        let (manager, sink) = manager();
        let id = manager.create_session().await;
        let (_snapshot, mut events) = manager.subscribe(&id).await.unwrap();

        for input in ["2", "4", "Col. Doctores", "1", "3"] {
            manager
                .send_input(&id, UserInput::Text(input.to_string()))
                .await
                .unwrap();
        }

        let deadline = tokio::time::Instant::now() + WAIT;
        let mut record = None;
        while record.is_none() && tokio::time::Instant::now() < deadline {
            if let Ok(Ok(SessionEvent::Record { record: r })) =
                tokio::time::timeout(Duration::from_millis(50), events.recv()).await
            {
                record = Some(r);
            }
        }
        let record = record.expect("record event");
        assert_eq!(record["record"], "incident_report");
        assert_eq!(record["type"], "other");
        assert_eq!(record["affected_households"], 3);

        assert!(sink.wait_for_records(1, WAIT).await);
        let snapshot = manager.snapshot(&id).await.unwrap();
        assert_eq!(snapshot.session_id, id);
        assert!(snapshot.turns.len() >= 7);
    }

    #[tokio::test]
    async fn test_manager_close_forgets_session() {
        let (manager, _sink) = manager();
        let id = manager.create_session().await;
        assert!(manager.snapshot(&id).await.is_ok());

        manager.close(&id).await.unwrap();
        assert!(manager.snapshot(&id).await.is_err());
        assert_eq!(
            manager
                .send_input(&id, UserInput::Text("1".to_string()))
                .await,
            Err(SessionError::NotFound(id.clone()))
        );
        assert_eq!(manager.close(&id).await, Err(SessionError::NotFound(id)));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let (manager, _sink) = manager();
        let a = manager.create_session().await;
        let b = manager.create_session().await;

        manager
            .send_input(&a, UserInput::Text("2".to_string()))
            .await
            .unwrap();

        let deadline = tokio::time::Instant::now() + WAIT;
        while tokio::time::Instant::now() < deadline {
            let a_state = manager.snapshot(&a).await.unwrap().state;
            let b_state = manager.snapshot(&b).await.unwrap().state;
            if a_state == ConvState::ReportType && b_state == ConvState::MainMenu {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(manager.snapshot(&a).await.unwrap().state, ConvState::ReportType);
        assert_eq!(manager.snapshot(&b).await.unwrap().state, ConvState::MainMenu);
    }
}
