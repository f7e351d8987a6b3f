//! Composition root: one chat widget instance with its own store, timers and
//! in-flight flag.
//!
//! All timers are tokio tasks, so `open()`, `notify_activity()` and the
//! submit calls must run inside a tokio runtime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::config::WidgetConfig;
use crate::debounce::ActivityDebouncer;
use crate::error::{ChatError, Result};
use crate::fallback::FallbackSource;
use crate::input::{InputBox, KeyAction, KeyPress};
use crate::message::Message;
use crate::pipeline::{ConversationSink, Exchange, SendPipeline};
use crate::render::{Frame, MessageRow};
use crate::session::{SessionController, SessionStatus};
use crate::store::MessageStore;
use crate::transport::Transport;
use crate::window::WindowedRenderer;

struct Shared {
    session: SessionController,
    store: MessageStore,
    window: WindowedRenderer,
    /// Bumped whenever the conversation is discarded by a timeout or teardown.
    epoch: u64,
    shut_down: bool,
}

impl Shared {
    fn sync_window(&mut self) {
        self.window.sync(&self.store);
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Appends into the conversation an exchange started in, if it still exists.
struct EpochSink {
    shared: Weak<Mutex<Shared>>,
    epoch: u64,
}

impl ConversationSink for EpochSink {
    fn append(&self, message: Message) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let mut guard = lock(&shared);
        if guard.epoch != self.epoch {
            return false;
        }
        guard.store.append(message);
        guard.sync_window();
        true
    }
}

pub struct ChatWidget {
    title: String,
    shared: Arc<Mutex<Shared>>,
    pipeline: SendPipeline,
    input: Mutex<InputBox>,
    activity: ActivityDebouncer,
    watchdog: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ChatWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatWidget")
            .field("title", &self.title)
            .field("status", &self.status())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}

impl ChatWidget {
    /// Builds an Idle widget. Nothing is scheduled until [`Self::open`].
    pub fn new(
        config: WidgetConfig,
        transport: Arc<dyn Transport>,
        fallback: Arc<dyn FallbackSource>,
    ) -> Self {
        let shared = Arc::new(Mutex::new(Shared {
            session: SessionController::new(config.session_settings(), Instant::now()),
            store: MessageStore::with_capacity(config.max_messages),
            window: WindowedRenderer::new(config.batch_size),
            epoch: 0,
            shut_down: false,
        }));

        let immediate = {
            let weak = Arc::downgrade(&shared);
            move || {
                if let Some(shared) = weak.upgrade() {
                    lock(&shared).session.clear_timeout_flag();
                }
            }
        };
        let debounced = {
            let weak = Arc::downgrade(&shared);
            move || {
                if let Some(shared) = weak.upgrade() {
                    lock(&shared).session.record_activity(Instant::now());
                }
            }
        };

        Self {
            title: config.title.clone(),
            pipeline: SendPipeline::new(transport, fallback, config.max_message_length),
            input: Mutex::new(InputBox::new(config.max_message_length)),
            activity: ActivityDebouncer::new(config.debounce_window(), immediate, debounced),
            watchdog: Mutex::new(None),
            shared,
        }
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> SessionStatus {
        self.shared().session.status()
    }

    pub fn greeting(&self) -> String {
        self.shared().session.greeting().to_string()
    }

    pub fn timed_out(&self) -> bool {
        self.shared().session.timed_out()
    }

    pub fn is_loading(&self) -> bool {
        self.pipeline.is_in_flight()
    }

    /// Starts an Active period: greeting, optional seed message and the
    /// inactivity watchdog. Returns false when already active or shut down.
    pub fn open(&self) -> bool {
        let (epoch, period) = {
            let mut guard = self.shared();
            if guard.shut_down {
                return false;
            }
            let Some(activation) = guard.session.activate(Instant::now()) else {
                return false;
            };
            if let Some(seed) = activation.seed {
                if guard.store.is_empty() {
                    guard.store.append(seed);
                }
            }
            guard.sync_window();
            tracing::info!(title = %self.title, "chat session opened");
            (guard.epoch, guard.session.check_interval())
        };

        let handle = spawn_watchdog(Arc::downgrade(&self.shared), epoch, period);
        if let Some(previous) = self
            .watchdog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            previous.abort();
        }
        true
    }

    pub fn notify_activity(&self) {
        self.activity.notify();
    }

    fn current_epoch(&self) -> Result<u64> {
        let guard = self.shared();
        if guard.shut_down || !guard.session.is_active() {
            return Err(ChatError::SessionClosed);
        }
        Ok(guard.epoch)
    }

    /// Sends one message. Rejected with [`ChatError::SessionClosed`] unless
    /// the session is active.
    /// Rejected input leaves the session untouched; an accepted message and
    /// the reply that lands for it both count as activity.
    pub async fn submit(&self, text: &str) -> Result<Exchange> {
        let epoch = self.current_epoch()?;
        self.pipeline.validate(text)?;
        self.notify_activity();
        let sink = EpochSink {
            shared: Arc::downgrade(&self.shared),
            epoch,
        };
        let exchange = self.pipeline.submit(text, &sink).await?;
        if exchange.applied {
            self.notify_activity();
        }
        Ok(exchange)
    }

    /// Sends the current draft, clearing it once it has been accepted.
    pub async fn submit_input(&self) -> Result<Exchange> {
        self.current_epoch()?;
        let draft = self
            .input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .value()
            .to_string();
        self.pipeline.validate(&draft)?;
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.submit(&draft).await
    }

    /// Replaces the draft. Edits over the length limit are ignored; accepted
    /// edits count as activity.
    pub fn set_input(&self, value: impl Into<String>) -> bool {
        let accepted = self
            .input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_value(value);
        if accepted {
            self.notify_activity();
        }
        accepted
    }

    pub fn input_value(&self) -> String {
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .value()
            .to_string()
    }

    pub fn input_counter(&self) -> Option<String> {
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .counter_label()
    }

    pub fn can_send(&self) -> bool {
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .can_send(self.is_loading())
    }

    pub fn on_key(&self, key: KeyPress) -> KeyAction {
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_key(key)
    }

    /// Pages one batch further back. Returns false when nothing older exists.
    pub fn scroll_to_top(&self) -> bool {
        let mut guard = self.shared();
        guard.sync_window();
        guard.window.on_scroll_to_top()
    }

    pub fn take_scroll_request(&self) -> bool {
        self.shared().window.take_scroll_request()
    }

    pub fn visible_messages(&self) -> Vec<Message> {
        let guard = self.shared();
        guard
            .window
            .visible(&guard.store)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn rows(&self) -> Vec<MessageRow> {
        self.frame().rows
    }

    /// Everything the view needs for one paint.
    pub fn frame(&self) -> Frame {
        let guard = self.shared();
        Frame::build(
            guard.window.visible(&guard.store),
            self.pipeline.is_in_flight(),
            guard.window.has_older(),
        )
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.shared().store.snapshot()
    }

    /// The clear action is only offered once there is something to clear.
    pub fn can_clear(&self) -> bool {
        self.shared().store.len() >= 2
    }

    /// Empties the log. While active with seeding enabled the greeting is put
    /// back as the first message. Does nothing and returns false while
    /// [`Self::can_clear`] is false.
    pub fn clear_conversation(&self) -> bool {
        let mut guard = self.shared();
        if guard.store.len() < 2 {
            return false;
        }
        guard.store.clear();
        if guard.session.is_active() && guard.session.settings().seed_greeting {
            let greeting = Message::greeting(guard.session.greeting());
            guard.store.append(greeting);
        }
        guard.sync_window();
        tracing::debug!("conversation cleared");
        true
    }

    /// Cancels every timer and discards replies still in flight. Idempotent.
    pub fn shutdown(&self) {
        self.activity.cancel();
        if let Some(handle) = self
            .watchdog
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        let mut guard = self.shared();
        if !guard.shut_down {
            guard.shut_down = true;
            guard.epoch += 1;
            tracing::debug!("chat widget shut down");
        }
    }
}

impl Drop for ChatWidget {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_watchdog(
    weak: Weak<Mutex<Shared>>,
    epoch: u64,
    period: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(shared) = weak.upgrade() else {
                break;
            };
            let mut guard = lock(&shared);
            if guard.epoch != epoch {
                break;
            }
            if guard.session.check_timeout(Instant::now()) {
                guard.store.clear();
                guard.sync_window();
                guard.epoch += 1;
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::{NoFallback, StaticFallback};
    use crate::message::MessageId;
    use crate::transport::{StubReply, StubTransport};
    use std::time::Duration;
    use tokio::time::sleep;

    fn config(timeout_ms: u64) -> WidgetConfig {
        WidgetConfig {
            inactivity_timeout_ms: timeout_ms,
            initial_message: Some("Welcome aboard!".into()),
            ..WidgetConfig::default()
        }
    }

    fn widget(cfg: WidgetConfig, replies: Vec<StubReply>) -> ChatWidget {
        ChatWidget::new(
            cfg,
            Arc::new(StubTransport::new(replies)),
            Arc::new(NoFallback),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn opening_seeds_the_greeting_once() {
        let widget = widget(config(3_000), vec![]);
        assert_eq!(widget.status(), SessionStatus::Idle);
        assert!(widget.greeting().is_empty());

        assert!(widget.open());
        assert!(!widget.open());

        assert_eq!(widget.status(), SessionStatus::Active);
        assert_eq!(widget.greeting(), "Welcome aboard!");
        let snapshot = widget.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), &MessageId::greeting());
        assert!(widget.take_scroll_request());
    }

    #[tokio::test(start_paused = true)]
    async fn seeding_can_be_disabled() {
        let widget = widget(
            WidgetConfig {
                seed_greeting: false,
                ..config(3_000)
            },
            vec![],
        );
        widget.open();
        assert!(widget.snapshot().is_empty());
        assert_eq!(widget.greeting(), "Welcome aboard!");
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_exactly_once() {
        let widget = widget(config(3_000), vec![]);
        widget.open();

        sleep(Duration::from_millis(2_999)).await;
        assert_eq!(widget.status(), SessionStatus::Active);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(widget.status(), SessionStatus::TimedOut);
        assert!(widget.snapshot().is_empty());
        assert!(widget.greeting().is_empty());
        assert!(widget.timed_out());

        sleep(Duration::from_secs(30)).await;
        assert_eq!(widget.status(), SessionStatus::TimedOut);
        assert!(widget.timed_out());

        widget.notify_activity();
        assert!(!widget.timed_out());

        assert!(widget.open());
        assert_eq!(widget.status(), SessionStatus::Active);
        assert_eq!(widget.snapshot().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_activity_extends_the_session() {
        let widget = widget(config(3_000), vec![]);
        widget.open();

        sleep(Duration::from_millis(1_000)).await;
        for _ in 0..5 {
            widget.notify_activity();
        }

        sleep(Duration::from_millis(2_500)).await;
        assert_eq!(widget.status(), SessionStatus::Active);

        sleep(Duration::from_millis(2_600)).await;
        assert_eq!(widget.status(), SessionStatus::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_submissions_outside_an_active_session() {
        let widget = widget(config(3_000), vec![StubReply::Text("hi".into())]);
        assert!(matches!(
            widget.submit("hello").await,
            Err(ChatError::SessionClosed)
        ));
        assert!(widget.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn submits_and_renders_the_exchange() {
        let transport = StubTransport::new(vec![StubReply::Text("Two rides are open.".into())])
            .with_delay(Duration::from_millis(120));
        let widget = ChatWidget::new(
            config(180_000),
            Arc::new(transport),
            Arc::new(NoFallback),
        );
        widget.open();
        widget.take_scroll_request();

        let exchange = widget.submit("what is open?").await.unwrap();
        assert!(exchange.applied);

        let rows = widget.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[2].footer.as_deref(),
            Some("We took ⏱ 120ms to answer")
        );
        assert!(widget.take_scroll_request());
        assert!(!widget.is_loading());
        assert!(widget.can_clear());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_replies_are_discarded_after_a_timeout() {
        let transport = StubTransport::new(vec![StubReply::Text("too late".into())])
            .with_delay(Duration::from_secs(10));
        let widget = Arc::new(ChatWidget::new(
            config(3_000),
            Arc::new(transport),
            Arc::new(StaticFallback::bundled()),
        ));
        widget.open();

        let pending = tokio::spawn({
            let widget = Arc::clone(&widget);
            async move { widget.submit("anyone there?").await }
        });

        sleep(Duration::from_secs(7)).await;
        assert_eq!(widget.status(), SessionStatus::TimedOut);
        assert!(widget.snapshot().is_empty());

        let exchange = pending.await.unwrap().unwrap();
        assert!(!exchange.applied);
        assert!(widget.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_reseeds_the_greeting() {
        let widget = widget(config(180_000), vec![StubReply::Text("ok".into())]);
        widget.open();
        widget.submit("hello").await.unwrap();
        assert_eq!(widget.snapshot().len(), 3);

        assert!(widget.clear_conversation());

        let snapshot = widget.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].text(), "Welcome aboard!");
        assert!(!widget.can_clear());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_needs_at_least_two_messages() {
        let widget = widget(config(180_000), vec![]);
        widget.open();
        let before = widget.snapshot();

        assert!(!widget.clear_conversation());
        assert_eq!(widget.snapshot(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_submissions_do_not_count_as_activity() {
        let widget = widget(config(3_000), vec![]);
        widget.open();
        let opened_at = widget.shared().session.last_activity_at();

        sleep(Duration::from_millis(1_500)).await;
        assert!(matches!(
            widget.submit("   ").await,
            Err(ChatError::EmptyMessage)
        ));

        sleep(Duration::from_millis(1_100)).await;
        assert_eq!(widget.shared().session.last_activity_at(), opened_at);

        sleep(Duration::from_millis(500)).await;
        assert_eq!(widget.status(), SessionStatus::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn a_late_reply_restarts_the_inactivity_clock() {
        let transport = StubTransport::new(vec![StubReply::Text("finally".into())])
            .with_delay(Duration::from_secs(110));
        let widget = ChatWidget::new(
            config(120_000),
            Arc::new(transport),
            Arc::new(NoFallback),
        );
        widget.open();

        let exchange = widget.submit("slow question").await.unwrap();
        assert!(exchange.applied);

        sleep(Duration::from_secs(115)).await;
        assert_eq!(widget.status(), SessionStatus::Active);
        assert_eq!(widget.snapshot().len(), 3);

        sleep(Duration::from_secs(20)).await;
        assert_eq!(widget.status(), SessionStatus::TimedOut);
        assert!(widget.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn submitting_the_draft_clears_it() {
        let widget = widget(config(180_000), vec![StubReply::Text("ok".into())]);
        widget.open();

        assert!(!widget.can_send());
        assert!(widget.set_input("hello"));
        assert_eq!(widget.input_counter().as_deref(), Some("5/1000"));
        assert!(widget.can_send());
        assert_eq!(
            widget.on_key(KeyPress {
                enter: true,
                shift: false
            }),
            KeyAction::Submit
        );

        widget.submit_input().await.unwrap();
        assert!(widget.input_value().is_empty());
        assert_eq!(widget.snapshot()[1].text(), "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn blank_drafts_are_kept_and_rejected() {
        let widget = widget(config(180_000), vec![]);
        widget.open();
        widget.set_input("   ");

        assert!(matches!(
            widget.submit_input().await,
            Err(ChatError::EmptyMessage)
        ));
        assert_eq!(widget.input_value(), "   ");
        assert_eq!(widget.snapshot().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pages_back_through_older_messages() {
        let replies = (0..15).map(|i| StubReply::Text(format!("reply {i}"))).collect();
        let widget = widget(config(180_000), replies);
        widget.open();
        for i in 0..15 {
            widget.submit(&format!("question {i}")).await.unwrap();
        }

        // greeting + 30 messages
        assert_eq!(widget.snapshot().len(), 31);
        assert_eq!(widget.visible_messages().len(), 20);
        assert!(widget.frame().has_older);

        widget.take_scroll_request();
        assert!(widget.scroll_to_top());
        assert_eq!(widget.visible_messages().len(), 31);
        assert!(!widget.take_scroll_request());
        assert!(!widget.scroll_to_top());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_discards_in_flight_replies() {
        let transport = StubTransport::new(vec![StubReply::Text("late".into())])
            .with_delay(Duration::from_secs(1));
        let widget = Arc::new(ChatWidget::new(
            config(180_000),
            Arc::new(transport),
            Arc::new(NoFallback),
        ));
        widget.open();

        let pending = tokio::spawn({
            let widget = Arc::clone(&widget);
            async move { widget.submit("hello").await }
        });
        while !widget.is_loading() {
            tokio::task::yield_now().await;
        }
        widget.shutdown();

        let exchange = pending.await.unwrap().unwrap();
        assert!(!exchange.applied);
        assert_eq!(widget.snapshot().len(), 2);
        assert!(!widget.open());
        assert!(matches!(
            widget.submit("again").await,
            Err(ChatError::SessionClosed)
        ));
    }
}
