//! Async driver for [`SyncEngine`].
//!
//! One tokio task owns the engine. It multiplexes user commands, the refresh
//! and message-poll timers, and finished backend calls; each backend call
//! runs in its own task inside a [`JoinSet`] so a slow request never blocks
//! the loop. After every step the current [`ChatSnapshot`] is published on a
//! `watch` channel and events are forwarded to the presentation layer.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use support_chat_core::{Admin, AdminId, Message, UnreadCounts};

use crate::api::{ApiError, ChatBackend};
use crate::config::ClientConfig;
use crate::store::ChatSnapshot;
use crate::sync::{ChatEvent, Effect, PollTicket, Request, SyncEngine};

/// Errors returned by [`ChatHandle`].
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime task has exited.
    #[error("chat runtime has stopped")]
    Closed,

    /// The runtime task panicked.
    #[error("chat runtime task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// User intent forwarded to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Refresh,
    SelectAdmin(AdminId),
    ClearSelection,
    SetSearchTerm(String),
    SetDraft(String),
    Send,
    SetVisibility(bool),
    SetNearBottom(bool),
    SetNarrow(bool),
    SetSidebarVisible(bool),
    Shutdown,
}

/// Timer periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncIntervals {
    /// Conversation poll while an admin is selected.
    pub message_poll: Duration,
    /// Admin list and unread summary refresh.
    pub refresh: Duration,
}

impl Default for SyncIntervals {
    fn default() -> Self {
        Self {
            message_poll: Duration::from_secs(5),
            refresh: Duration::from_secs(30),
        }
    }
}

impl From<&ClientConfig> for SyncIntervals {
    fn from(config: &ClientConfig) -> Self {
        Self {
            message_poll: config.message_poll_interval,
            refresh: config.refresh_interval,
        }
    }
}

/// Sending half of the command channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<Command>,
}

impl CommandSender {
    /// Queue a command.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Closed` if the runtime has exited.
    pub fn send(&self, command: Command) -> Result<(), RuntimeError> {
        self.tx.send(command).map_err(|_| RuntimeError::Closed)
    }
}

/// Handle to a running chat runtime.
///
/// Fields are public so a UI loop can await `events` and `snapshots` while
/// sending on `commands`.
#[derive(Debug)]
pub struct ChatHandle {
    pub commands: CommandSender,
    pub snapshots: watch::Receiver<ChatSnapshot>,
    pub events: mpsc::UnboundedReceiver<ChatEvent>,
    task: JoinHandle<()>,
}

impl ChatHandle {
    /// Latest published state.
    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Stop the runtime and wait for it to exit. In-flight requests are
    /// aborted.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::Join` if the runtime task panicked.
    pub async fn shutdown(self) -> Result<(), RuntimeError> {
        // Already stopped is fine; the join below reports a panic.
        let _ = self.commands.send(Command::Shutdown);
        self.task.await?;
        Ok(())
    }
}

/// Start the runtime on the current tokio runtime.
///
/// The initial admin list and unread summary are requested immediately.
pub fn spawn<B: ChatBackend>(engine: SyncEngine, backend: B, intervals: SyncIntervals) -> ChatHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(engine.store().snapshot());

    let runtime = Runtime {
        engine,
        backend,
        intervals,
        snapshots: snapshot_tx,
        events: event_tx,
        tasks: JoinSet::new(),
        refresh: delayed_interval(intervals.refresh),
        poll: None,
    };
    let task = tokio::spawn(runtime.run(command_rx));

    ChatHandle {
        commands: CommandSender { tx: command_tx },
        snapshots: snapshot_rx,
        events: event_rx,
        task,
    }
}

/// Result of a finished backend call.
enum Completion {
    Admins(Result<Vec<Admin>, ApiError>),
    Unread(Result<UnreadCounts, ApiError>),
    Messages(PollTicket, Result<Vec<Message>, ApiError>),
    Sent(PollTicket, Result<Message, ApiError>),
    MarkedRead(AdminId, Result<(), ApiError>),
}

struct Runtime<B> {
    engine: SyncEngine,
    backend: B,
    intervals: SyncIntervals,
    snapshots: watch::Sender<ChatSnapshot>,
    events: mpsc::UnboundedSender<ChatEvent>,
    tasks: JoinSet<Completion>,
    refresh: Interval,
    /// Only armed while an admin is selected.
    poll: Option<Interval>,
}

impl<B: ChatBackend> Runtime<B> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        info!(
            message_poll_secs = self.intervals.message_poll.as_secs(),
            refresh_secs = self.intervals.refresh.as_secs(),
            "Chat runtime started"
        );
        let effects = self.engine.start();
        self.apply(effects);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle(command),
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                    Ok(completion) => self.complete(completion),
                    Err(e) => error!(error = %e, "Backend request task failed"),
                },
                _ = self.refresh.tick() => {
                    let effects = self.engine.refresh();
                    self.apply(effects);
                }
                _ = tick(self.poll.as_mut()) => {
                    let effects = self.engine.poll();
                    self.apply(effects);
                }
            }
            self.publish();
        }

        self.tasks.abort_all();
        info!("Chat runtime stopped");
    }

    fn handle(&mut self, command: Command) {
        debug!(?command, "Handling command");
        let effects = match command {
            Command::Refresh => self.engine.refresh(),
            Command::SelectAdmin(admin) => {
                self.poll = Some(delayed_interval(self.intervals.message_poll));
                self.engine.select_admin(admin)
            }
            Command::ClearSelection => {
                self.poll = None;
                self.engine.clear_selection();
                Vec::new()
            }
            Command::SetSearchTerm(term) => {
                self.engine.set_search_term(term);
                Vec::new()
            }
            Command::SetDraft(draft) => {
                self.engine.set_draft(draft);
                Vec::new()
            }
            Command::Send => self.engine.send(),
            Command::SetVisibility(visible) => self.engine.set_visibility(visible),
            Command::SetNearBottom(near_bottom) => {
                self.engine.set_near_bottom(near_bottom);
                Vec::new()
            }
            Command::SetNarrow(narrow) => {
                self.engine.set_narrow(narrow);
                Vec::new()
            }
            Command::SetSidebarVisible(visible) => {
                self.engine.set_sidebar_visible(visible);
                Vec::new()
            }
            Command::Shutdown => Vec::new(),
        };
        self.apply(effects);
    }

    fn complete(&mut self, completion: Completion) {
        let effects = match completion {
            Completion::Admins(result) => self.engine.on_admins(result),
            Completion::Unread(result) => {
                self.engine.on_unread_summary(result);
                Vec::new()
            }
            Completion::Messages(ticket, result) => self.engine.on_messages(&ticket, result),
            Completion::Sent(ticket, result) => self.engine.on_sent(&ticket, result),
            Completion::MarkedRead(admin, result) => {
                self.engine.on_marked_read(&admin, result);
                Vec::new()
            }
        };
        self.apply(effects);
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Dispatch(request) => self.dispatch(request),
                Effect::Emit(event) => {
                    if self.events.send(event).is_err() {
                        debug!("Event receiver dropped");
                    }
                }
            }
        }
    }

    fn dispatch(&mut self, request: Request) {
        let backend = self.backend.clone();
        self.tasks.spawn(async move {
            match request {
                Request::Admins => Completion::Admins(backend.list_admins().await),
                Request::UnreadSummary => Completion::Unread(backend.unread_summary().await),
                Request::Messages(ticket) => {
                    let result = backend.list_messages().await;
                    Completion::Messages(ticket, result)
                }
                Request::Send { ticket, content } => {
                    let result = backend.send_message(&ticket.admin, &content).await;
                    Completion::Sent(ticket, result)
                }
                Request::MarkRead(admin) => {
                    let result = backend.mark_read(&admin).await;
                    Completion::MarkedRead(admin, result)
                }
            }
        });
    }

    fn publish(&self) {
        let next = self.engine.store().snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

/// Interval whose first tick is one period from now.
fn delayed_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use support_chat_core::{MessageId, ParticipantId, SenderType, UserId};

    use super::*;
    use crate::storage::{MemoryStorage, UnreadLedger};
    use crate::store::ConversationStore;
    use crate::sync::{Notice, NoticeLevel};

    const USER: &str = "u1";

    #[derive(Debug, Default)]
    struct FakeState {
        admins: Vec<Admin>,
        messages: Vec<Message>,
        unread: UnreadCounts,
        sent: Vec<(AdminId, String)>,
        marked: Vec<AdminId>,
        message_fetches: usize,
        fail_send: bool,
    }

    #[derive(Debug, Clone, Default)]
    struct FakeBackend {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeBackend {
        fn with_admins() -> Self {
            let backend = Self::default();
            backend.state.lock().unwrap().admins = vec![
                Admin {
                    id: AdminId::new("a1"),
                    name: "Linh".to_string(),
                    email: "linh@support.example".to_string(),
                },
                Admin {
                    id: AdminId::new("a2"),
                    name: "Minh".to_string(),
                    email: "minh@support.example".to_string(),
                },
            ];
            backend
        }

        fn push_admin_message(&self, id: &str) {
            let mut state = self.state.lock().unwrap();
            let minute = i64::try_from(state.messages.len()).unwrap();
            state.messages.push(Message {
                id: MessageId::new(id),
                sender_id: ParticipantId::new("a1"),
                sender_type: SenderType::Admin,
                receiver_id: ParticipantId::new(USER),
                content: format!("reply {id}"),
                created_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
                    + ChronoDuration::minutes(minute),
            });
        }

        fn fetches(&self) -> usize {
            self.state.lock().unwrap().message_fetches
        }
    }

    impl ChatBackend for FakeBackend {
        async fn list_admins(&self) -> Result<Vec<Admin>, ApiError> {
            Ok(self.state.lock().unwrap().admins.clone())
        }

        async fn list_messages(&self) -> Result<Vec<Message>, ApiError> {
            let mut state = self.state.lock().unwrap();
            state.message_fetches += 1;
            Ok(state.messages.clone())
        }

        async fn send_message(&self, receiver: &AdminId, content: &str) -> Result<Message, ApiError> {
            let mut state = self.state.lock().unwrap();
            if state.fail_send {
                return Err(ApiError::Api {
                    status: 500,
                    message: "down".to_string(),
                });
            }
            state.sent.push((receiver.clone(), content.to_string()));
            let message = Message {
                id: MessageId::new(format!("s{}", state.sent.len())),
                sender_id: ParticipantId::new(USER),
                sender_type: SenderType::User,
                receiver_id: ParticipantId::new(receiver.as_str()),
                content: content.to_string(),
                created_at: Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap(),
            };
            state.messages.push(message.clone());
            Ok(message)
        }

        async fn unread_summary(&self) -> Result<UnreadCounts, ApiError> {
            Ok(self.state.lock().unwrap().unread.clone())
        }

        async fn mark_read(&self, admin: &AdminId) -> Result<(), ApiError> {
            self.state.lock().unwrap().marked.push(admin.clone());
            Ok(())
        }
    }

    fn start(backend: &FakeBackend) -> ChatHandle {
        let store = ConversationStore::new(UnreadLedger::open(MemoryStorage::new()));
        let engine = SyncEngine::new(store, Some(UserId::new(USER)));
        spawn(engine, backend.clone(), SyncIntervals::default())
    }

    async fn wait_until_loaded(handle: &mut ChatHandle) {
        handle
            .snapshots
            .wait_for(|s| s.selected.is_some() && !s.loading)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_load_publishes_admins() {
        let backend = FakeBackend::with_admins();
        let mut handle = start(&backend);

        let snapshot = handle.snapshots.wait_for(|s| s.rows.len() == 2).await.unwrap().clone();
        assert_eq!(snapshot.rows[0].admin.name, "Linh");
        assert!(snapshot.selected.is_none());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_page_gets_notified_of_admin_reply() {
        let backend = FakeBackend::with_admins();
        let mut handle = start(&backend);
        handle.snapshots.wait_for(|s| s.rows.len() == 2).await.unwrap();

        handle.commands.send(Command::SetVisibility(false)).unwrap();
        handle.commands.send(Command::SelectAdmin(AdminId::new("a1"))).unwrap();
        wait_until_loaded(&mut handle).await;

        backend.push_admin_message("m1");

        // The paused clock advances to the next poll on its own.
        let event = handle.events.recv().await.unwrap();
        assert_eq!(
            event,
            ChatEvent::Notice(Notice {
                level: NoticeLevel::Info,
                text: "You have 1 new message from Linh".to_string(),
            })
        );
        let snapshot = handle.snapshots.wait_for(|s| s.messages.len() == 1).await.unwrap().clone();
        assert_eq!(snapshot.unread.get(&AdminId::new("a1")), 1);
        assert!(backend.state.lock().unwrap().marked.is_empty());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_appends_and_clears_draft() {
        let backend = FakeBackend::with_admins();
        let mut handle = start(&backend);

        handle.commands.send(Command::SelectAdmin(AdminId::new("a1"))).unwrap();
        wait_until_loaded(&mut handle).await;
        handle.commands.send(Command::SetDraft("hello".to_string())).unwrap();
        handle.commands.send(Command::Send).unwrap();

        assert_eq!(handle.events.recv().await.unwrap(), ChatEvent::ScrollToLatest);
        let snapshot = handle
            .snapshots
            .wait_for(|s| s.messages.len() == 1)
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.draft, "");
        assert_eq!(snapshot.messages[0].content, "hello");

        let state = backend.state.lock().unwrap();
        assert_eq!(state.sent, vec![(AdminId::new("a1"), "hello".to_string())]);
        assert_eq!(state.marked, vec![AdminId::new("a1")]);
        drop(state);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_keeps_draft() {
        let backend = FakeBackend::with_admins();
        backend.state.lock().unwrap().fail_send = true;
        let mut handle = start(&backend);

        handle.commands.send(Command::SelectAdmin(AdminId::new("a1"))).unwrap();
        wait_until_loaded(&mut handle).await;
        handle.commands.send(Command::SetDraft("hello".to_string())).unwrap();
        handle.commands.send(Command::Send).unwrap();

        let ChatEvent::Notice(notice) = handle.events.recv().await.unwrap() else {
            panic!("expected a notice");
        };
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(handle.snapshot().draft, "hello");

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_when_selection_cleared() {
        let backend = FakeBackend::with_admins();
        let mut handle = start(&backend);

        handle.commands.send(Command::SelectAdmin(AdminId::new("a1"))).unwrap();
        wait_until_loaded(&mut handle).await;
        tokio::time::sleep(Duration::from_secs(11)).await;
        let polled = backend.fetches();
        assert!(polled >= 3);

        handle.commands.send(Command::ClearSelection).unwrap();
        handle.snapshots.wait_for(|s| s.selected.is_none()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(backend.fetches(), polled);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_after_shutdown_is_closed() {
        let backend = FakeBackend::with_admins();
        let handle = start(&backend);
        let commands = handle.commands.clone();
        handle.shutdown().await.unwrap();
        assert!(matches!(commands.send(Command::Refresh), Err(RuntimeError::Closed)));
    }
}
