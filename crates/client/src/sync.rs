//! Sync engine: reconciles local chat state with the backend.
//!
//! The engine is a synchronous state machine. Every input (a user action, a
//! timer tick, or a backend response) returns a list of [`Effect`]s: requests
//! the runtime should dispatch and events the presentation layer should
//! handle. Nothing here awaits, so the whole unread/notification logic is
//! testable without a runtime or a network.
//!
//! # Conversation polling
//!
//! While an admin is selected, the runtime calls [`SyncEngine::poll`] on a
//! fixed interval. Each fetch is tagged with a [`PollTicket`]; responses whose
//! ticket no longer matches the current selection are dropped. For a current
//! response:
//!
//! 1. The first fetch after selection sets the baseline message count.
//! 2. A fetch that did not grow the conversation changes nothing.
//! 3. A fetch that grew it counts the admin-originated messages in the new
//!    segment, adds them to the durable unread counter, and notifies the user
//!    if the page is hidden.
//! 4. Finally, a selected conversation on a visible page has its counter
//!    cleared.

use tracing::{debug, error, info, warn};

use support_chat_core::{Admin, AdminId, Message, UnreadCounts, UserId, conversation_with};

use crate::api::ApiError;
use crate::storage::StorageError;
use crate::store::ConversationStore;

/// Tag identifying which selection a request was dispatched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTicket {
    pub admin: AdminId,
    pub generation: u64,
}

/// Backend call the runtime should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Admins,
    UnreadSummary,
    Messages(PollTicket),
    Send { ticket: PollTicket, content: String },
    MarkRead(AdminId),
}

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient notification for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Side effect the presentation layer handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Notice(Notice),
    /// Scroll the conversation to the newest message.
    ScrollToLatest,
}

/// Output of an engine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Dispatch(Request),
    Emit(ChatEvent),
}

/// Client-side chat state machine.
#[derive(Debug)]
pub struct SyncEngine {
    store: ConversationStore,
    user_id: Option<UserId>,
    generation: u64,
}

impl SyncEngine {
    #[must_use]
    pub const fn new(store: ConversationStore, user_id: Option<UserId>) -> Self {
        Self {
            store,
            user_id,
            generation: 0,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &ConversationStore {
        &self.store
    }

    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    /// Initial load: admin list and unread summary.
    #[must_use]
    pub fn start(&mut self) -> Vec<Effect> {
        self.refresh()
    }

    /// Periodic refresh of the admin list and unread summary.
    #[must_use]
    pub fn refresh(&mut self) -> Vec<Effect> {
        vec![
            Effect::Dispatch(Request::Admins),
            Effect::Dispatch(Request::UnreadSummary),
        ]
    }

    /// Conversation poll tick. Idle (nothing selected) polls nothing.
    #[must_use]
    pub fn poll(&mut self) -> Vec<Effect> {
        let Some(ticket) = self.current_ticket() else {
            return Vec::new();
        };

        let has_baseline = self
            .store
            .conversation(&ticket.admin)
            .is_some_and(|conversation| conversation.observed.is_some());
        if !has_baseline {
            self.store.set_loading(true);
        }

        vec![Effect::Dispatch(Request::Messages(ticket))]
    }

    /// Select an admin: start a fresh poll generation, mark the conversation
    /// read when the page is visible, and fetch immediately.
    #[must_use]
    pub fn select_admin(&mut self, admin: AdminId) -> Vec<Effect> {
        self.generation += 1;
        self.store.select_admin(admin.clone());
        info!(admin = %admin, generation = self.generation, "Admin selected");

        let mut effects = Vec::new();
        if self.store.viewport().visible {
            effects.push(Effect::Dispatch(Request::MarkRead(admin)));
        }
        effects.extend(self.poll());
        effects
    }

    /// Return to idle. In-flight responses for the old selection are dropped.
    pub fn clear_selection(&mut self) {
        self.generation += 1;
        self.store.clear_selection();
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.store.set_search_term(term);
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.store.set_draft(draft);
    }

    pub const fn set_near_bottom(&mut self, near_bottom: bool) {
        self.store.viewport_mut().near_bottom = near_bottom;
    }

    pub const fn set_narrow(&mut self, narrow: bool) {
        self.store.viewport_mut().narrow = narrow;
    }

    pub const fn set_sidebar_visible(&mut self, visible: bool) {
        self.store.set_sidebar_visible(visible);
    }

    /// Page moved to the foreground or background.
    ///
    /// Coming back to the foreground with a conversation open counts as
    /// viewing it: the counter is cleared and the backend told.
    #[must_use]
    pub fn set_visibility(&mut self, visible: bool) -> Vec<Effect> {
        let was_visible = self.store.viewport().visible;
        self.store.viewport_mut().visible = visible;

        if !visible || was_visible {
            return Vec::new();
        }

        let Some(admin) = self.store.selected().cloned() else {
            return Vec::new();
        };
        self.clear_unread(&admin);
        vec![Effect::Dispatch(Request::MarkRead(admin))]
    }

    /// Send the current draft to the selected admin.
    ///
    /// A blank draft or an idle engine issues nothing.
    #[must_use]
    pub fn send(&mut self) -> Vec<Effect> {
        let content = self.store.draft().to_string();
        if content.trim().is_empty() {
            return Vec::new();
        }
        let Some(ticket) = self.current_ticket() else {
            debug!("Send ignored: no admin selected");
            return Vec::new();
        };

        vec![Effect::Dispatch(Request::Send { ticket, content })]
    }

    /// Apply an admin list response.
    #[must_use]
    pub fn on_admins(&mut self, result: Result<Vec<Admin>, ApiError>) -> Vec<Effect> {
        match result {
            Ok(admins) => {
                debug!(count = admins.len(), "Admin list updated");
                let known = admins.clone();
                self.store.set_admins(admins);
                log_storage(
                    self.store
                        .unread_ledger()
                        .update(|counts| counts.retain_known(&known)),
                );
                Vec::new()
            }
            Err(e) => {
                error!(error = %e, "Error fetching admin list");
                vec![Effect::Emit(ChatEvent::Notice(Notice::error(
                    "Could not load the admin list",
                )))]
            }
        }
    }

    /// Apply an unread summary response. Failures are logged only.
    pub fn on_unread_summary(&mut self, result: Result<UnreadCounts, ApiError>) {
        let mut summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Error fetching unread summary");
                return;
            }
        };

        if !self.store.admins().is_empty() {
            summary.retain_known(self.store.admins());
        }
        if self.store.viewport().visible {
            if let Some(selected) = self.store.selected() {
                summary.remove(selected);
            }
        }

        log_storage(self.store.unread_ledger().replace(summary));
    }

    /// Apply a conversation fetch.
    #[must_use]
    pub fn on_messages(
        &mut self,
        ticket: &PollTicket,
        result: Result<Vec<Message>, ApiError>,
    ) -> Vec<Effect> {
        if !self.is_current(ticket) {
            debug!(
                admin = %ticket.admin,
                generation = ticket.generation,
                "Discarding stale message response"
            );
            return Vec::new();
        }
        self.store.set_loading(false);

        let all = match result {
            Ok(all) => all,
            Err(e) => {
                error!(admin = %ticket.admin, error = %e, "Error fetching messages");
                return vec![Effect::Emit(ChatEvent::Notice(Notice::error(
                    "Could not load messages",
                )))];
            }
        };

        let admin = &ticket.admin;
        let fetched = self
            .user_id
            .as_ref()
            .map(|user| conversation_with(&all, user, admin))
            .unwrap_or_default();
        let viewport = self.store.viewport();
        let observed = self
            .store
            .conversation(admin)
            .and_then(|conversation| conversation.observed);

        let mut effects = Vec::new();
        match observed {
            None => {
                let has_messages = !fetched.is_empty();
                self.store.replace_messages(admin, fetched);
                if has_messages {
                    effects.push(Effect::Emit(ChatEvent::ScrollToLatest));
                }
            }
            Some(previous) if fetched.len() > previous => {
                let from_admin = fetched
                    .iter()
                    .skip(previous)
                    .filter(|message| message.is_from_admin())
                    .count();
                let newest_from_admin = fetched.last().is_some_and(Message::is_from_admin);

                if from_admin > 0 {
                    let delta = u32::try_from(from_admin).unwrap_or(u32::MAX);
                    log_storage(self.store.unread_ledger().increment(admin, delta));
                    info!(admin = %admin, new = delta, "New messages from admin");

                    if !viewport.visible {
                        let name = self
                            .store
                            .admin(admin)
                            .map_or("Admin", |a| a.display_name())
                            .to_string();
                        effects.push(Effect::Emit(ChatEvent::Notice(Notice::info(format!(
                            "You have {delta} new message{} from {name}",
                            if delta == 1 { "" } else { "s" }
                        )))));
                    }
                }

                self.store.replace_messages(admin, fetched);

                if newest_from_admin && viewport.near_bottom {
                    effects.push(Effect::Emit(ChatEvent::ScrollToLatest));
                }
            }
            Some(_) => {}
        }

        if viewport.visible && self.store.is_selected(admin) {
            self.clear_unread(admin);
        }

        effects
    }

    /// Apply a send response.
    #[must_use]
    pub fn on_sent(
        &mut self,
        ticket: &PollTicket,
        result: Result<Message, ApiError>,
    ) -> Vec<Effect> {
        match result {
            Ok(message) => {
                self.store.append_message(&ticket.admin, message);
                if !self.store.is_selected(&ticket.admin) {
                    return Vec::new();
                }
                self.store.set_draft("");
                vec![Effect::Emit(ChatEvent::ScrollToLatest)]
            }
            Err(e) => {
                error!(admin = %ticket.admin, error = %e, "Error sending message");
                vec![Effect::Emit(ChatEvent::Notice(Notice::error(
                    "Could not send the message",
                )))]
            }
        }
    }

    /// Apply a mark-read acknowledgement. Failures are logged only.
    pub fn on_marked_read(&mut self, admin: &AdminId, result: Result<(), ApiError>) {
        match result {
            Ok(()) => self.clear_unread(admin),
            Err(e) => warn!(admin = %admin, error = %e, "Error marking messages as read"),
        }
    }

    fn current_ticket(&self) -> Option<PollTicket> {
        self.store.selected().map(|admin| PollTicket {
            admin: admin.clone(),
            generation: self.generation,
        })
    }

    fn is_current(&self, ticket: &PollTicket) -> bool {
        ticket.generation == self.generation && self.store.is_selected(&ticket.admin)
    }

    fn clear_unread(&mut self, admin: &AdminId) {
        log_storage(self.store.unread_ledger().clear(admin));
    }
}

fn log_storage(result: Result<bool, StorageError>) {
    if let Err(e) = result {
        error!(error = %e, "Failed to persist unread counters");
    }
}
