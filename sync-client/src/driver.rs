//! Session driver - the foreground task.
//!
//! [`SessionDriver`] owns the [`SyncSession`], the [`ConnectionManager`] and
//! the [`Presenter`], and is the only place any of them is touched. It
//! consumes [`Command`]s and bus messages in arrival order and interprets the
//! session's [`Effect`]s.
//!
//! A render's field notifications are classified by the session before the
//! next effect runs, so guard arming and guard checking share one context.
//!
//! # Example
//!
//! ```ignore
//! let bus = MessageBus::new(config.bus.capacity);
//! let (driver, handle) = SessionDriver::new(config, transport, presenter, settings, bus)?;
//! tokio::spawn(driver.run());
//!
//! handle.submit_address("5")?;      // 192.168.1.5
//! handle.local_change(FieldValue::Content("Hello".into()))?;
//! handle.shutdown()?;
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use sync_core::{
    normalize, ConnectionEvent, Effect, SyncSession, ValidAddress, ViewState,
};
use sync_types::Message;
use tokio::sync::mpsc;

use crate::bus::{MessageBus, Subscription};
use crate::command::{ClientError, Command, SessionHandle};
use crate::config::ClientConfig;
use crate::connection::ConnectionManager;
use crate::heartbeat::spawn_heartbeat;
use crate::presenter::Presenter;
use crate::settings::SettingsStore;
use crate::transport::Transport;

/// Runs one sync session.
pub struct SessionDriver<T: Transport + 'static, P: Presenter> {
    config: ClientConfig,
    session: SyncSession,
    connection: ConnectionManager<T>,
    presenter: P,
    settings: Arc<dyn SettingsStore>,
    commands: mpsc::UnboundedReceiver<Command>,
    handle: SessionHandle,
    messages: Subscription<Message>,
    /// Last successfully connected address, for the prompt.
    remembered: Option<ValidAddress>,
    /// Address to reconnect to: the last one submitted, else the remembered one.
    submitted: Option<ValidAddress>,
}

impl<T: Transport + 'static, P: Presenter> SessionDriver<T, P> {
    /// Create a driver and the handle that feeds it.
    ///
    /// Subscribes to `bus` immediately, so messages published from here on
    /// reach the session.
    pub fn new(
        config: ClientConfig,
        transport: Arc<T>,
        presenter: P,
        settings: Arc<dyn SettingsStore>,
        bus: MessageBus,
    ) -> Result<(Self, SessionHandle), ClientError> {
        config.validate()?;

        let (tx, commands) = mpsc::unbounded_channel();
        let handle = SessionHandle::new(tx.clone());
        let messages = bus.subscribe::<Message>();
        let connection = ConnectionManager::new(
            transport,
            Arc::clone(&settings),
            bus,
            config.connection.port,
            tx,
        );

        let driver = Self {
            config,
            session: SyncSession::new(),
            connection,
            presenter,
            settings,
            commands,
            handle: handle.clone(),
            messages,
            remembered: None,
            submitted: None,
        };
        Ok((driver, handle))
    }

    /// Run until [`SessionHandle::shutdown`] is called.
    ///
    /// Returns the presenter so callers can inspect or reuse it.
    pub async fn run(mut self) -> P {
        self.remembered = match self.settings.last_address().await {
            Ok(address) => address,
            Err(e) => {
                tracing::warn!("Could not read remembered address: {}", e);
                None
            }
        };

        let heartbeat = spawn_heartbeat(self.config.heartbeat.interval(), self.handle.clone());
        self.show_prompt();
        tracing::info!("Session started");

        if self.config.heartbeat.auto_reconnect {
            if let Some(address) = self.remembered.clone() {
                tracing::info!("Connecting to remembered address {}", address);
                self.submitted = Some(address.clone());
                let events = self.connection.connect(address);
                self.notify(&events);
            }
        }

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                message = self.messages.recv() => match message {
                    Some(message) => self.on_message(message),
                    None => break,
                },
            }
        }

        heartbeat.abort();
        let events = self.connection.dispose();
        self.notify(&events);
        tracing::info!("Session stopped");

        let Self { presenter, .. } = self;
        presenter
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::SubmitAddress(raw) => match normalize(&raw) {
                Ok(address) => {
                    self.submitted = Some(address.clone());
                    let events = self.connection.connect(address);
                    self.notify(&events);
                }
                Err(e) => tracing::debug!("Ignoring address {:?}: {}", raw, e),
            },
            Command::LocalChange(value) => {
                let effects = self
                    .session
                    .on_local_change(value, self.connection.is_active());
                self.execute(effects);
            }
            Command::HeartbeatTick => {
                let is_active = self.connection.is_active();
                let effects = self.session.on_heartbeat(is_active);
                self.execute(effects);
                if !is_active {
                    self.maybe_reconnect();
                }
            }
            Command::ConnectCompleted(outcome) => {
                let events = self.connection.on_outcome(outcome);
                self.notify(&events);
            }
            Command::Shutdown => {}
        }
    }

    fn on_message(&mut self, message: Message) {
        if self.messages.take_skipped() > 0 {
            self.resync();
        }
        if self.connection.is_superseded(&message) {
            tracing::debug!("Ignoring loss of a replaced channel");
            return;
        }
        let effects = self.session.on_remote_message(message);
        self.execute(effects);
    }

    /// Recover from lost bus messages. Liveness is read from the transport;
    /// document updates are only recovered by the next snapshot.
    fn resync(&mut self) {
        if !self.connection.is_active() {
            let effects = self.session.on_heartbeat(false);
            self.execute(effects);
        }
    }

    /// Carry out effects in order. Notifications fired by a render are
    /// classified and their effects run before the rest of the batch.
    fn execute(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Render(document) => {
                    let fired = self.presenter.render(&document);
                    let mut follow_up = Vec::new();
                    for value in fired {
                        let is_active = self.connection.is_active();
                        follow_up.extend(self.session.on_local_change(value, is_active));
                    }
                    for effect in follow_up.into_iter().rev() {
                        queue.push_front(effect);
                    }
                }
                Effect::SetWindowTitle(title) => self.presenter.set_window_title(&title),
                Effect::ShowView(view) => {
                    tracing::debug!("View: {:?}", view);
                    self.presenter.show_view(view);
                    if view == ViewState::AwaitingConnection {
                        self.prefill();
                    }
                }
                Effect::Transmit(document) => self.connection.send_document(&document),
                Effect::Ping => self.connection.ping(),
                Effect::ChannelLost => {
                    let events = self.connection.channel_lost();
                    self.notify(&events);
                }
            }
        }
    }

    fn show_prompt(&mut self) {
        self.presenter.show_view(self.session.view());
        self.presenter
            .set_window_title(&self.session.window_title());
        self.prefill();
    }

    fn prefill(&mut self) {
        if let Some(address) = &self.remembered {
            self.presenter.prefill_address(address.as_str());
        }
    }

    fn maybe_reconnect(&mut self) {
        if !self.config.heartbeat.auto_reconnect || self.connection.state().address().is_some() {
            return;
        }
        if let Some(address) = self.submitted.clone() {
            tracing::debug!("Auto-reconnecting to {}", address);
            let events = self.connection.connect(address);
            self.notify(&events);
        }
    }

    fn notify(&mut self, events: &[ConnectionEvent]) {
        for event in events {
            if let ConnectionEvent::Connected { address } = event {
                self.remembered = Some(address.clone());
            }
            self.presenter.connection_changed(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;
    use crate::transport::MockTransport;
    use std::sync::Mutex;
    use std::time::Duration;
    use sync_core::{ConnectionState, Document, FieldValue, DEFAULT_WINDOW_TITLE};
    use sync_types::{ArticleMessage, ChannelActive, Frame, Selection, WordCountMessage};
    use tokio::task::JoinHandle;

    // ===========================================
    // Test presenter
    // ===========================================

    #[derive(Debug, Default)]
    struct Screen {
        view: Option<ViewState>,
        title: String,
        document: Document,
        prefilled: Option<String>,
        renders: usize,
        events: Vec<ConnectionEvent>,
    }

    /// Records what the session shows; fires every field on render.
    #[derive(Debug, Clone, Default)]
    struct RecordingPresenter {
        screen: Arc<Mutex<Screen>>,
    }

    impl RecordingPresenter {
        fn view(&self) -> Option<ViewState> {
            self.screen.lock().unwrap().view
        }

        fn title(&self) -> String {
            self.screen.lock().unwrap().title.clone()
        }

        fn document(&self) -> Document {
            self.screen.lock().unwrap().document.clone()
        }

        fn prefilled(&self) -> Option<String> {
            self.screen.lock().unwrap().prefilled.clone()
        }

        fn events(&self) -> Vec<ConnectionEvent> {
            self.screen.lock().unwrap().events.clone()
        }
    }

    impl Presenter for RecordingPresenter {
        fn show_view(&mut self, view: ViewState) {
            self.screen.lock().unwrap().view = Some(view);
        }

        fn set_window_title(&mut self, title: &str) {
            self.screen.lock().unwrap().title = title.to_string();
        }

        fn render(&mut self, document: &Document) -> Vec<FieldValue> {
            let mut screen = self.screen.lock().unwrap();
            screen.document = document.clone();
            screen.renders += 1;
            // Content first, like an editor that notifies the body before the title
            let [title, content, selection] = document.field_values();
            vec![content, title, selection]
        }

        fn prefill_address(&mut self, address: &str) {
            self.screen.lock().unwrap().prefilled = Some(address.to_string());
        }

        fn connection_changed(&mut self, event: &ConnectionEvent) {
            self.screen.lock().unwrap().events.push(event.clone());
        }
    }

    // ===========================================
    // Harness
    // ===========================================

    struct Harness {
        transport: MockTransport,
        presenter: RecordingPresenter,
        settings: Arc<MemorySettings>,
        handle: SessionHandle,
        task: JoinHandle<RecordingPresenter>,
    }

    fn config(heartbeat_ms: u64, auto_reconnect: bool) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.heartbeat.interval_ms = heartbeat_ms;
        config.heartbeat.auto_reconnect = auto_reconnect;
        config
    }

    fn start(config: ClientConfig, settings: MemorySettings) -> Harness {
        let transport = MockTransport::new();
        let presenter = RecordingPresenter::default();
        let settings = Arc::new(settings);
        let (driver, handle) = SessionDriver::new(
            config,
            Arc::new(transport.clone()),
            presenter.clone(),
            settings.clone(),
            MessageBus::new(64),
        )
        .unwrap();
        let task = tokio::spawn(driver.run());
        Harness {
            transport,
            presenter,
            settings,
            handle,
            task,
        }
    }

    /// Session with a quiet heartbeat.
    fn quiet() -> Harness {
        start(config(60_000, false), MemorySettings::new())
    }

    /// Driver that is stepped by hand instead of running.
    fn standalone(
        config: ClientConfig,
        bus: MessageBus,
    ) -> (
        SessionDriver<MockTransport, RecordingPresenter>,
        MockTransport,
        RecordingPresenter,
    ) {
        let transport = MockTransport::new();
        let presenter = RecordingPresenter::default();
        let (driver, _handle) = SessionDriver::new(
            config,
            Arc::new(transport.clone()),
            presenter.clone(),
            Arc::new(MemorySettings::new()),
            bus,
        )
        .unwrap();
        (driver, transport, presenter)
    }

    async fn next_command<T: Transport + 'static, P: Presenter>(
        driver: &mut SessionDriver<T, P>,
    ) -> Command {
        tokio::time::timeout(Duration::from_secs(2), driver.commands.recv())
            .await
            .expect("command should arrive")
            .expect("command channel open")
    }

    async fn eventually(what: &str, check: impl Fn() -> bool) {
        for _ in 0..400 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {}", what);
    }

    fn articles(transport: &MockTransport) -> Vec<Frame> {
        transport
            .sent_frames()
            .into_iter()
            .filter(|f| matches!(f, Frame::Article { .. }))
            .collect()
    }

    impl Harness {
        async fn connect(&self, raw: &str) {
            self.handle.submit_address(raw).unwrap();
            let presenter = self.presenter.clone();
            eventually("connected", || {
                presenter
                    .events()
                    .iter()
                    .any(|e| matches!(e, ConnectionEvent::Connected { .. }))
            })
            .await;
        }

        async fn receive_article(&self, title: &str, content: &str, start: u32, end: u32) {
            self.transport
                .queue_frame(&Frame::article(title, content, Selection::new(start, end)))
                .unwrap();
            let presenter = self.presenter.clone();
            let content = content.to_string();
            eventually("article rendered", move || {
                presenter.view() == Some(ViewState::Editing)
                    && presenter.document().content == content
            })
            .await;
        }

        async fn stop(self) -> RecordingPresenter {
            self.handle.shutdown().unwrap();
            tokio::time::timeout(Duration::from_secs(2), self.task)
                .await
                .expect("driver should stop")
                .unwrap()
        }
    }

    // ===========================================
    // Startup and Address Tests
    // ===========================================

    #[tokio::test]
    async fn starts_on_prompt_with_remembered_address() {
        let remembered = normalize("10.0.0.7").unwrap();
        let h = start(config(60_000, false), MemorySettings::with_address(remembered));

        let presenter = h.presenter.clone();
        eventually("prompt shown", || {
            presenter.view() == Some(ViewState::AwaitingConnection)
        })
        .await;
        assert_eq!(h.presenter.title(), DEFAULT_WINDOW_TITLE);
        assert_eq!(h.presenter.prefilled().as_deref(), Some("10.0.0.7"));

        // Auto-reconnect is off for this session
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.transport.connect_count(), 0);
        h.stop().await;
    }

    #[tokio::test]
    async fn remembered_address_connects_on_startup() {
        let remembered = normalize("10.0.0.7").unwrap();
        let h = start(config(60_000, true), MemorySettings::with_address(remembered));

        let presenter = h.presenter.clone();
        eventually("connected", || {
            presenter.events().iter().any(|e| {
                matches!(e, ConnectionEvent::Connected { address } if address.as_str() == "10.0.0.7")
            })
        })
        .await;
        assert_eq!(h.transport.connect_count(), 1);
        assert_eq!(h.transport.connected_address().as_deref(), Some("10.0.0.7"));
        h.stop().await;
    }

    #[tokio::test]
    async fn invalid_address_never_connects() {
        let h = quiet();
        h.handle.submit_address("999.1.1.1").unwrap();
        h.handle.submit_address("   ").unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(h.transport.connect_count(), 0);
        h.stop().await;
    }

    #[tokio::test]
    async fn short_address_fails_twice_and_is_not_persisted() {
        let h = quiet();
        h.transport.fail_next_connect("refused");
        h.transport.fail_next_connect("refused");

        h.handle.submit_address("1").unwrap();

        let presenter = h.presenter.clone();
        eventually("give up", || {
            presenter
                .events()
                .iter()
                .any(|e| matches!(e, ConnectionEvent::ConnectFailed { .. }))
        })
        .await;

        let events = h.presenter.events();
        assert!(matches!(
            &events[..],
            [
                ConnectionEvent::RetryScheduled { attempt: 2, .. },
                ConnectionEvent::ConnectFailed { address, .. },
            ] if address.as_str() == "192.168.1.1"
        ));
        assert_eq!(h.transport.connect_count(), 2);
        assert!(h.settings.last_address().await.unwrap().is_none());
        h.stop().await;
    }

    #[tokio::test]
    async fn repeated_submission_dispatches_once() {
        let h = quiet();
        h.transport.hold_connects();

        h.handle.submit_address("5").unwrap();
        h.handle.submit_address("192.168.1.5").unwrap();
        h.handle.submit_address(" 192。168。1。5 ").unwrap();

        let transport = h.transport.clone();
        eventually("attempt", || transport.connect_count() == 1).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.transport.connect_count(), 1);

        h.transport.release_connects();
        h.stop().await;
    }

    #[tokio::test]
    async fn successful_connect_is_remembered() {
        let h = quiet();
        h.connect("5").await;

        let settings = h.settings.clone();
        for _ in 0..400 {
            if settings.last_address().await.unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            settings.last_address().await.unwrap(),
            Some(normalize("192.168.1.5").unwrap())
        );
        h.stop().await;
    }

    // ===========================================
    // Echo Suppression Tests
    // ===========================================

    #[tokio::test]
    async fn remote_article_is_not_echoed() {
        let h = quiet();
        h.connect("5").await;
        h.receive_article("T", "Content", 2, 4).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(articles(&h.transport).is_empty());
        assert_eq!(h.presenter.title(), "T");
        assert_eq!(h.presenter.document().selection, Selection::new(2, 4));
        h.stop().await;
    }

    #[tokio::test]
    async fn local_edit_sent_exactly_once() {
        let h = quiet();
        h.connect("5").await;
        h.receive_article("T", "C", 0, 0).await;

        h.handle
            .local_change(FieldValue::Content("C!".into()))
            .unwrap();

        let transport = h.transport.clone();
        eventually("edit sent", || !articles(&transport).is_empty()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            articles(&h.transport),
            vec![Frame::article("T", "C!", Selection::caret(0))]
        );
        h.stop().await;
    }

    #[tokio::test]
    async fn local_edit_while_disconnected_shows_prompt() {
        let h = quiet();
        h.handle
            .local_change(FieldValue::Content("typed offline".into()))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(h.presenter.view(), Some(ViewState::AwaitingConnection));
        assert!(h.transport.sent_messages().is_empty());
        h.stop().await;
    }

    // ===========================================
    // View Tests
    // ===========================================

    #[tokio::test]
    async fn empty_article_then_article() {
        let h = quiet();
        h.connect("5").await;
        h.receive_article("T", "C", 0, 0).await;

        h.transport.queue_frame(&Frame::EmptyArticle).unwrap();
        let presenter = h.presenter.clone();
        eventually("empty view", || presenter.view() == Some(ViewState::Empty)).await;
        assert_eq!(h.presenter.title(), DEFAULT_WINDOW_TITLE);
        assert_eq!(h.presenter.document(), Document::empty());

        h.receive_article("Again", "Back", 0, 0).await;
        assert_eq!(h.presenter.title(), "Again");
        assert!(articles(&h.transport).is_empty());
        h.stop().await;
    }

    #[tokio::test]
    async fn word_count_updates_title() {
        let h = quiet();
        h.connect("5").await;
        h.receive_article("", "one two", 0, 0).await;

        h.transport
            .queue_frame(&Frame::WordCount {
                text: "2 words".into(),
            })
            .unwrap();
        let presenter = h.presenter.clone();
        eventually("title", || presenter.title() == "Untitled · 2 words").await;
        h.stop().await;
    }

    #[tokio::test]
    async fn peer_disconnect_returns_to_prompt() {
        let h = quiet();
        h.connect("5").await;
        h.receive_article("T", "C", 0, 0).await;

        h.transport.simulate_disconnect();

        let presenter = h.presenter.clone();
        eventually("prompt", || {
            presenter.view() == Some(ViewState::AwaitingConnection)
        })
        .await;
        assert_eq!(h.presenter.document(), Document::empty());
        assert_eq!(h.presenter.title(), DEFAULT_WINDOW_TITLE);
        assert_eq!(h.presenter.prefilled().as_deref(), Some("192.168.1.5"));
        assert!(articles(&h.transport).is_empty());

        // The same address can be submitted again
        let before = h.transport.connect_count();
        h.handle.submit_address("5").unwrap();
        let transport = h.transport.clone();
        eventually("reconnect", || transport.connect_count() == before + 1).await;
        h.stop().await;
    }

    // ===========================================
    // Heartbeat Tests
    // ===========================================

    #[tokio::test]
    async fn heartbeat_pings_live_channel() {
        let h = start(config(20, false), MemorySettings::new());
        h.connect("5").await;

        let transport = h.transport.clone();
        eventually("ping", || transport.sent_frames().contains(&Frame::Ping)).await;
        h.stop().await;
    }

    #[tokio::test]
    async fn heartbeat_without_channel_sends_nothing() {
        let h = start(config(10, false), MemorySettings::new());
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(h.presenter.view(), Some(ViewState::AwaitingConnection));
        assert!(h.transport.sent_messages().is_empty());
        assert_eq!(h.transport.connect_count(), 0);
        h.stop().await;
    }

    #[tokio::test]
    async fn auto_reconnect_resubmits_last_address() {
        let h = start(config(10, true), MemorySettings::new());
        h.connect("5").await;

        h.transport.simulate_disconnect();

        let transport = h.transport.clone();
        eventually("reconnect attempt", || transport.connect_count() >= 2).await;
        h.stop().await;
    }

    #[tokio::test]
    async fn reconnects_to_remembered_after_liveness_loss() {
        let remembered = normalize("10.0.0.7").unwrap();
        let h = start(config(10, true), MemorySettings::with_address(remembered));

        let transport = h.transport.clone();
        eventually("startup connect", || transport.is_connected()).await;
        h.transport.simulate_disconnect();

        eventually("reconnect attempt", || transport.connect_count() >= 2).await;
        assert_eq!(h.transport.connected_address().as_deref(), Some("10.0.0.7"));
        h.stop().await;
    }

    // ===========================================
    // Bus Delivery Tests
    // ===========================================

    #[tokio::test]
    async fn loss_of_replaced_channel_keeps_new_connection() {
        let (mut driver, transport, presenter) =
            standalone(config(60_000, false), MessageBus::new(64));

        for raw in ["1", "2"] {
            driver.on_command(Command::SubmitAddress(raw.into()));
            let completed = next_command(&mut driver).await;
            driver.on_command(completed);
        }
        assert_eq!(
            driver.connection.state(),
            &ConnectionState::Connected {
                address: normalize("192.168.1.2").unwrap()
            }
        );

        // Channel signals of both connections are handled only now
        while let Some(message) = driver.messages.try_recv() {
            driver.on_message(message);
        }

        assert!(driver.connection.is_active());
        assert_eq!(transport.close_count(), 1);
        assert!(!presenter.events().iter().any(|e| {
            matches!(e, ConnectionEvent::Disconnected { address } if address.as_str() == "192.168.1.2")
        }));
    }

    #[tokio::test]
    async fn lost_bus_messages_resync_liveness() {
        let bus = MessageBus::new(1);
        let (mut driver, _transport, presenter) = standalone(config(60_000, false), bus.clone());

        driver.on_message(Message::Article(ArticleMessage {
            title: "T".into(),
            content: "C".into(),
            selection_start: 0,
            selection_end: 0,
        }));
        assert_eq!(presenter.view(), Some(ViewState::Editing));

        // The inactive signal is pushed out by later messages
        bus.publish(ChannelActive {
            active: false,
            channel: 0,
        });
        bus.publish(WordCountMessage { text: "1".into() });
        bus.publish(WordCountMessage { text: "2".into() });

        let message = driver.messages.try_recv().unwrap();
        assert_eq!(message.kind(), "word_count");
        driver.on_message(message);

        assert_eq!(presenter.view(), Some(ViewState::AwaitingConnection));
        assert_eq!(presenter.document(), Document::empty());
    }

    // ===========================================
    // Shutdown Tests
    // ===========================================

    #[tokio::test]
    async fn shutdown_disposes_connection() {
        let h = quiet();
        h.connect("5").await;

        let transport = h.transport.clone();
        let handle = h.handle.clone();
        let presenter = h.stop().await;

        assert!(presenter
            .events()
            .iter()
            .any(|e| matches!(e, ConnectionEvent::Disconnected { .. })));
        eventually("closed", || transport.close_count() >= 1).await;
        assert!(handle.is_closed());
    }
}
