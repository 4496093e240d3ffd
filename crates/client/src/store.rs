//! Conversation state store.
//!
//! Single source of truth for what the presentation layer shows: admin list
//! and search filter, selection, cached conversations, unread counters, and
//! the few viewport facts the sync engine needs (page visibility, scroll
//! position, layout width).
//!
//! The store does no I/O besides the unread ledger's write-through; all
//! decisions about *when* to mutate belong to [`crate::sync::SyncEngine`].

use std::collections::HashMap;

use support_chat_core::{Admin, AdminId, Message, UnreadCounts, filter_admins};

use crate::storage::UnreadLedger;

/// Messages exchanged with one admin, plus sync bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    /// Messages ordered by `created_at` ascending.
    pub messages: Vec<Message>,
    /// Message count seen on the last applied fetch. `None` until the first
    /// fetch after selection, which only establishes the baseline.
    pub observed: Option<usize>,
}

impl Conversation {
    /// Newest message, if any.
    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Facts about the rendering surface reported by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// The page is in the foreground.
    pub visible: bool,
    /// The conversation is scrolled to (or near) the latest message.
    pub near_bottom: bool,
    /// Narrow layout: the sidebar and conversation do not fit side by side.
    pub narrow: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            visible: true,
            near_bottom: true,
            narrow: false,
        }
    }
}

/// One row of the admin sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRow {
    pub admin: Admin,
    pub unread: u32,
    pub last_message: Option<Message>,
    pub selected: bool,
}

/// Immutable copy of store state for rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSnapshot {
    /// Sidebar rows, already filtered by the search term.
    pub rows: Vec<AdminRow>,
    pub search_term: String,
    pub selected: Option<Admin>,
    /// Conversation with the selected admin.
    pub messages: Vec<Message>,
    pub unread: UnreadCounts,
    pub loading: bool,
    pub sidebar_visible: bool,
    pub draft: String,
}

/// In-memory chat state.
#[derive(Debug)]
pub struct ConversationStore {
    admins: Vec<Admin>,
    filtered: Vec<Admin>,
    search_term: String,
    selected: Option<AdminId>,
    conversations: HashMap<AdminId, Conversation>,
    unread: UnreadLedger,
    loading: bool,
    sidebar_visible: bool,
    draft: String,
    viewport: Viewport,
}

impl ConversationStore {
    #[must_use]
    pub fn new(unread: UnreadLedger) -> Self {
        Self {
            admins: Vec::new(),
            filtered: Vec::new(),
            search_term: String::new(),
            selected: None,
            conversations: HashMap::new(),
            unread,
            loading: false,
            sidebar_visible: true,
            draft: String::new(),
            viewport: Viewport::default(),
        }
    }

    /// Replace the admin list and re-derive the filtered list.
    ///
    /// Conversations of admins seen before keep their sync bookkeeping;
    /// newly seen admins start untracked.
    pub fn set_admins(&mut self, admins: Vec<Admin>) {
        self.admins = admins;
        self.filtered = filter_admins(&self.admins, &self.search_term);
    }

    /// Update the search term and re-filter.
    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
        self.filtered = filter_admins(&self.admins, &self.search_term);
    }

    /// Select an admin and reset that conversation's observed count.
    ///
    /// Hides the sidebar on narrow layouts.
    pub fn select_admin(&mut self, admin: AdminId) {
        self.conversations.entry(admin.clone()).or_default().observed = None;
        self.selected = Some(admin);
        if self.viewport.narrow {
            self.sidebar_visible = false;
        }
    }

    /// Return to the idle state with nothing selected.
    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.loading = false;
        self.sidebar_visible = true;
    }

    /// Append one message to an admin's conversation.
    ///
    /// A message already present (a poll may have fetched it first) is not
    /// added twice.
    pub fn append_message(&mut self, admin: &AdminId, message: Message) {
        let messages = &mut self.conversations.entry(admin.clone()).or_default().messages;
        if messages.iter().all(|existing| existing.id != message.id) {
            messages.push(message);
        }
    }

    /// Replace an admin's conversation with a fresh fetch result.
    pub fn replace_messages(&mut self, admin: &AdminId, messages: Vec<Message>) {
        let conversation = self.conversations.entry(admin.clone()).or_default();
        conversation.observed = Some(messages.len());
        conversation.messages = messages;
    }

    #[must_use]
    pub fn admins(&self) -> &[Admin] {
        &self.admins
    }

    #[must_use]
    pub fn filtered_admins(&self) -> &[Admin] {
        &self.filtered
    }

    #[must_use]
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// Look up a known admin.
    #[must_use]
    pub fn admin(&self, id: &AdminId) -> Option<&Admin> {
        self.admins.iter().find(|admin| &admin.id == id)
    }

    #[must_use]
    pub const fn selected(&self) -> Option<&AdminId> {
        self.selected.as_ref()
    }

    #[must_use]
    pub fn is_selected(&self, admin: &AdminId) -> bool {
        self.selected.as_ref() == Some(admin)
    }

    #[must_use]
    pub fn conversation(&self, admin: &AdminId) -> Option<&Conversation> {
        self.conversations.get(admin)
    }

    /// Messages of the selected conversation (empty when idle).
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.selected
            .as_ref()
            .and_then(|admin| self.conversations.get(admin))
            .map(|conversation| conversation.messages.as_slice())
            .unwrap_or_default()
    }

    /// Newest cached message exchanged with an admin.
    #[must_use]
    pub fn last_message(&self, admin: &AdminId) -> Option<&Message> {
        self.conversations
            .get(admin)
            .and_then(Conversation::last_message)
    }

    #[must_use]
    pub const fn unread(&self) -> &UnreadCounts {
        self.unread.counts()
    }

    pub const fn unread_ledger(&mut self) -> &mut UnreadLedger {
        &mut self.unread
    }

    #[must_use]
    pub const fn loading(&self) -> bool {
        self.loading
    }

    pub const fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    #[must_use]
    pub const fn sidebar_visible(&self) -> bool {
        self.sidebar_visible
    }

    pub const fn set_sidebar_visible(&mut self, visible: bool) {
        self.sidebar_visible = visible;
    }

    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = draft.into();
    }

    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub const fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    /// Copy the state the presentation layer renders.
    #[must_use]
    pub fn snapshot(&self) -> ChatSnapshot {
        let rows = self
            .filtered
            .iter()
            .map(|admin| AdminRow {
                admin: admin.clone(),
                unread: self.unread().get(&admin.id),
                last_message: self.last_message(&admin.id).cloned(),
                selected: self.is_selected(&admin.id),
            })
            .collect();

        ChatSnapshot {
            rows,
            search_term: self.search_term.clone(),
            selected: self.selected.as_ref().map(|id| {
                self.admin(id).cloned().unwrap_or_else(|| Admin {
                    id: id.clone(),
                    name: String::new(),
                    email: String::new(),
                })
            }),
            messages: self.messages().to_vec(),
            unread: self.unread().clone(),
            loading: self.loading,
            sidebar_visible: self.sidebar_visible,
            draft: self.draft.clone(),
        }
    }
}
