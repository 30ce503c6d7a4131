//! In-memory per-user conversation state.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tokio::sync::Mutex;

use crate::compare::{ComparisonBasket, DailyQuota};
use crate::paper::Paper;
use crate::paper::query::SearchFilters;

/// Voice transcriptions kept per user for the Retry / Edit / Search buttons.
const MAX_VOICE_QUERIES: usize = 20;

/// The single text input a session is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Awaiting {
    SimpleSearch,
    FilterDateFrom,
    FilterDateTo,
    FilterAuthor,
    JournalName,
    NotificationKeyword,
    NotificationTime,
    /// Replacement text for the voice query sent as `message_id`.
    VoiceEdit { message_id: i32 },
    AdminRestrict,
    AdminBlock,
    AdminUnrestrict,
    AdminAddAdmin,
    AdminRemoveAdmin,
    /// The next message of any kind is the broadcast content.
    Broadcast,
}

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub query: String,
    pub papers: Vec<Paper>,
    pub cursor: usize,
}

impl SearchState {
    pub fn new(query: String, papers: Vec<Paper>) -> Self {
        Self { query, papers, cursor: 0 }
    }

    pub fn current(&self) -> Option<&Paper> {
        self.papers.get(self.cursor)
    }

    /// Move to the next result. `None` once past the end.
    pub fn advance(&mut self) -> Option<&Paper> {
        if self.cursor < self.papers.len() {
            self.cursor += 1;
        }
        self.papers.get(self.cursor)
    }

    /// Results left after the current one.
    pub fn remaining(&self) -> usize {
        self.papers.len().saturating_sub(self.cursor + 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceQuery {
    pub file_id: String,
    pub mime_type: String,
    /// Last transcription, or the user's edited text.
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastTarget {
    All,
    /// Active in the last 24 hours.
    Active,
    Selected,
}

impl BroadcastTarget {
    pub fn code(&self) -> &'static str {
        match self {
            BroadcastTarget::All => "all",
            BroadcastTarget::Active => "active",
            BroadcastTarget::Selected => "sel",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "all" => Some(BroadcastTarget::All),
            "active" => Some(BroadcastTarget::Active),
            "sel" => Some(BroadcastTarget::Selected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BroadcastDraft {
    pub target: BroadcastTarget,
    pub selected: BTreeSet<i64>,
}

impl BroadcastDraft {
    pub fn new(target: BroadcastTarget) -> Self {
        Self { target, selected: BTreeSet::new() }
    }

    pub fn toggle(&mut self, user_id: i64) -> bool {
        if self.selected.remove(&user_id) {
            false
        } else {
            self.selected.insert(user_id);
            true
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub awaiting: Option<Awaiting>,
    pub filters: SearchFilters,
    pub search: Option<SearchState>,
    /// Target of free-text questions.
    pub current_paper: Option<Paper>,
    pub basket: ComparisonBasket,
    pub quota: DailyQuota,
    voice: BTreeMap<i32, VoiceQuery>,
    pub chat_mode: bool,
    pub broadcast: Option<BroadcastDraft>,
}

impl Session {
    pub fn new(daily_comparison_limit: u32) -> Self {
        Self {
            awaiting: None,
            filters: SearchFilters::default(),
            search: None,
            current_paper: None,
            basket: ComparisonBasket::default(),
            quota: DailyQuota::new(daily_comparison_limit),
            voice: BTreeMap::new(),
            chat_mode: false,
            broadcast: None,
        }
    }

    /// Remember a voice query, evicting the oldest beyond the limit.
    pub fn remember_voice(&mut self, message_id: i32, query: VoiceQuery) {
        self.voice.insert(message_id, query);
        while self.voice.len() > MAX_VOICE_QUERIES {
            self.voice.pop_first();
        }
    }

    pub fn voice(&self, message_id: i32) -> Option<&VoiceQuery> {
        self.voice.get(&message_id)
    }

    pub fn voice_mut(&mut self, message_id: i32) -> Option<&mut VoiceQuery> {
        self.voice.get_mut(&message_id)
    }

    /// Drop any pending input and wizard state.
    pub fn cancel(&mut self) {
        self.awaiting = None;
        self.filters = SearchFilters::default();
        self.broadcast = None;
    }
}

/// All live sessions, keyed by user id.
pub struct Sessions {
    inner: Mutex<HashMap<i64, Session>>,
    daily_comparison_limit: u32,
}

impl Sessions {
    pub fn new(daily_comparison_limit: u32) -> Self {
        Self { inner: Mutex::new(HashMap::new()), daily_comparison_limit }
    }

    /// Run `f` against the user's session, creating it on first use.
    pub async fn with<R>(&self, user_id: i64, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.inner.lock().await;
        let session = sessions
            .entry(user_id)
            .or_insert_with(|| Session::new(self.daily_comparison_limit));
        f(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::sample_paper;

    #[test]
    fn test_search_state_cursor() {
        let mut state = SearchState::new(
            "q".into(),
            vec![sample_paper("1", "a", "x"), sample_paper("2", "b", "y")],
        );
        assert_eq!(state.current().unwrap().short_id, "1");
        assert_eq!(state.remaining(), 1);
        assert_eq!(state.advance().unwrap().short_id, "2");
        assert_eq!(state.remaining(), 0);
        assert!(state.advance().is_none());
        assert!(state.advance().is_none());
        assert!(state.current().is_none());
    }

    #[test]
    fn test_voice_queries_are_bounded() {
        let mut session = Session::new(10);
        for id in 0..(MAX_VOICE_QUERIES as i32 + 5) {
            session.remember_voice(id, VoiceQuery { file_id: format!("f{id}"), mime_type: "audio/ogg".into(), text: None });
        }
        assert!(session.voice(0).is_none());
        assert!(session.voice(4).is_none());
        assert_eq!(session.voice(5).unwrap().file_id, "f5");
        assert!(session.voice(MAX_VOICE_QUERIES as i32 + 4).is_some());
    }

    #[test]
    fn test_broadcast_toggle_and_codes() {
        let mut draft = BroadcastDraft::new(BroadcastTarget::Selected);
        assert!(draft.toggle(7));
        assert!(!draft.toggle(7));
        assert!(draft.selected.is_empty());
        for t in [BroadcastTarget::All, BroadcastTarget::Active, BroadcastTarget::Selected] {
            assert_eq!(BroadcastTarget::from_code(t.code()), Some(t));
        }
    }

    #[tokio::test]
    async fn test_sessions_are_per_user() {
        let sessions = Sessions::new(3);
        sessions.with(1, |s| s.chat_mode = true).await;
        assert!(sessions.with(1, |s| s.chat_mode).await);
        assert!(!sessions.with(2, |s| s.chat_mode).await);
    }

    #[test]
    fn test_cancel_clears_pending_input() {
        let mut session = Session::new(3);
        session.awaiting = Some(Awaiting::FilterAuthor);
        session.filters.author = Some("Hinton".into());
        session.chat_mode = true;
        session.cancel();
        assert!(session.awaiting.is_none());
        assert!(session.filters.is_empty());
        assert!(session.chat_mode);
    }
}
