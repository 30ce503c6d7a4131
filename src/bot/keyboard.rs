//! Typed callback data.
//!
//! Telegram limits callback data to 64 bytes, so actions use short
//! `prefix:arg` codes. Journals and keywords are referenced by index,
//! voice queries by the id of the voice message.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::paper::query::{AuthorMode, DatePreset, FieldGroup};
use crate::session::BroadcastTarget;
use crate::store::notifications::Frequency;

pub const MAX_CALLBACK_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SearchOptions,
    SearchSimple,
    SearchAdvanced,
    Summarize(String),
    Download(String),
    AddToCompare(String),
    MoreResults,
    CompareRun,
    CompareClear,
    Filter(FilterAction),
    Settings(SettingsAction),
    Notify(NotifyAction),
    Voice(VoiceAction),
    EndChat,
    Admin(AdminAction),
    CheckSubscription,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterAction {
    Menu,
    Date,
    Preset(DatePreset),
    CustomDate,
    Author,
    AuthorMode(AuthorMode),
    Citations,
    MinCitations(u64),
    Categories,
    Toggle(FieldGroup),
    Execute,
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsAction {
    Menu,
    MaxResults,
    SetMaxResults(u32),
    Journals,
    AddJournal,
    RemoveJournal(usize),
    Categories,
    /// Index into the category catalog.
    Field(usize),
    ToggleCategory(String),
    AutoDownload,
    Reset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotifyAction {
    Menu,
    Toggle,
    Frequency(Frequency),
    Keywords,
    AddKeyword,
    RemoveKeyword(usize),
    Time,
    Categories,
    ToggleCategory(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceAction {
    Retry(i32),
    Edit(i32),
    Search(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdminAction {
    Menu,
    Stats,
    Users(usize),
    Restrictions(usize),
    Restrict,
    Block,
    Unrestrict,
    Admins,
    AddAdmin,
    RemoveAdmin,
    Broadcast,
    BroadcastTarget(BroadcastTarget),
    BroadcastPage(usize),
    BroadcastToggle(i64, usize),
    BroadcastConfirm,
    BroadcastCancel,
}

impl Action {
    pub fn encode(&self) -> String {
        match self {
            Action::SearchOptions => "s:opts".into(),
            Action::SearchSimple => "s:simple".into(),
            Action::SearchAdvanced => "s:adv".into(),
            Action::Summarize(id) => format!("sum:{id}"),
            Action::Download(id) => format!("dl:{id}"),
            Action::AddToCompare(id) => format!("cmp:{id}"),
            Action::MoreResults => "more".into(),
            Action::CompareRun => "cmp_go".into(),
            Action::CompareClear => "cmp_clr".into(),
            Action::Filter(f) => format!("f:{}", f.encode()),
            Action::Settings(s) => format!("set:{}", s.encode()),
            Action::Notify(n) => format!("n:{}", n.encode()),
            Action::Voice(v) => match v {
                VoiceAction::Retry(id) => format!("v:retry:{id}"),
                VoiceAction::Edit(id) => format!("v:edit:{id}"),
                VoiceAction::Search(id) => format!("v:go:{id}"),
            },
            Action::EndChat => "chat:end".into(),
            Action::Admin(a) => format!("a:{}", a.encode()),
            Action::CheckSubscription => "sub:check".into(),
            Action::Noop => "noop".into(),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "s:opts" => return Some(Action::SearchOptions),
            "s:simple" => return Some(Action::SearchSimple),
            "s:adv" => return Some(Action::SearchAdvanced),
            "more" => return Some(Action::MoreResults),
            "cmp_go" => return Some(Action::CompareRun),
            "cmp_clr" => return Some(Action::CompareClear),
            "chat:end" => return Some(Action::EndChat),
            "sub:check" => return Some(Action::CheckSubscription),
            "noop" => return Some(Action::Noop),
            _ => {}
        }
        let (prefix, rest) = data.split_once(':')?;
        match prefix {
            "sum" => non_empty(rest).map(Action::Summarize),
            "dl" => non_empty(rest).map(Action::Download),
            "cmp" => non_empty(rest).map(Action::AddToCompare),
            "f" => FilterAction::parse(rest).map(Action::Filter),
            "set" => SettingsAction::parse(rest).map(Action::Settings),
            "n" => NotifyAction::parse(rest).map(Action::Notify),
            "v" => {
                let (kind, id) = rest.split_once(':')?;
                let id = id.parse().ok()?;
                match kind {
                    "retry" => Some(Action::Voice(VoiceAction::Retry(id))),
                    "edit" => Some(Action::Voice(VoiceAction::Edit(id))),
                    "go" => Some(Action::Voice(VoiceAction::Search(id))),
                    _ => None,
                }
            }
            "a" => AdminAction::parse(rest).map(Action::Admin),
            _ => None,
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

impl FilterAction {
    fn encode(&self) -> String {
        match self {
            FilterAction::Menu => "menu".into(),
            FilterAction::Date => "date".into(),
            FilterAction::Preset(p) => format!("p:{}", p.code()),
            FilterAction::CustomDate => "custom".into(),
            FilterAction::Author => "author".into(),
            FilterAction::AuthorMode(AuthorMode::Exact) => "am:exact".into(),
            FilterAction::AuthorMode(AuthorMode::LastName) => "am:last".into(),
            FilterAction::Citations => "cit".into(),
            FilterAction::MinCitations(n) => format!("c:{n}"),
            FilterAction::Categories => "cat".into(),
            FilterAction::Toggle(g) => format!("t:{}", g.code()),
            FilterAction::Execute => "go".into(),
            FilterAction::Clear => "clear".into(),
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "menu" => FilterAction::Menu,
            "date" => FilterAction::Date,
            "custom" => FilterAction::CustomDate,
            "author" => FilterAction::Author,
            "am:exact" => FilterAction::AuthorMode(AuthorMode::Exact),
            "am:last" => FilterAction::AuthorMode(AuthorMode::LastName),
            "cit" => FilterAction::Citations,
            "cat" => FilterAction::Categories,
            "go" => FilterAction::Execute,
            "clear" => FilterAction::Clear,
            _ => {
                let (kind, arg) = s.split_once(':')?;
                match kind {
                    "p" => FilterAction::Preset(DatePreset::from_code(arg)?),
                    "c" => FilterAction::MinCitations(arg.parse().ok()?),
                    "t" => FilterAction::Toggle(FieldGroup::from_code(arg)?),
                    _ => return None,
                }
            }
        })
    }
}

impl SettingsAction {
    fn encode(&self) -> String {
        match self {
            SettingsAction::Menu => "menu".into(),
            SettingsAction::MaxResults => "max".into(),
            SettingsAction::SetMaxResults(n) => format!("max:{n}"),
            SettingsAction::Journals => "j".into(),
            SettingsAction::AddJournal => "jadd".into(),
            SettingsAction::RemoveJournal(i) => format!("jrm:{i}"),
            SettingsAction::Categories => "cats".into(),
            SettingsAction::Field(i) => format!("fld:{i}"),
            SettingsAction::ToggleCategory(code) => format!("cat:{code}"),
            SettingsAction::AutoDownload => "auto".into(),
            SettingsAction::Reset => "reset".into(),
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "menu" => SettingsAction::Menu,
            "max" => SettingsAction::MaxResults,
            "j" => SettingsAction::Journals,
            "jadd" => SettingsAction::AddJournal,
            "cats" => SettingsAction::Categories,
            "auto" => SettingsAction::AutoDownload,
            "reset" => SettingsAction::Reset,
            _ => {
                let (kind, arg) = s.split_once(':')?;
                match kind {
                    "max" => SettingsAction::SetMaxResults(arg.parse().ok()?),
                    "jrm" => SettingsAction::RemoveJournal(arg.parse().ok()?),
                    "fld" => SettingsAction::Field(arg.parse().ok()?),
                    "cat" => SettingsAction::ToggleCategory(non_empty(arg)?),
                    _ => return None,
                }
            }
        })
    }
}

impl NotifyAction {
    fn encode(&self) -> String {
        match self {
            NotifyAction::Menu => "menu".into(),
            NotifyAction::Toggle => "toggle".into(),
            NotifyAction::Frequency(Frequency::Daily) => "freq:daily".into(),
            NotifyAction::Frequency(Frequency::Weekly) => "freq:weekly".into(),
            NotifyAction::Keywords => "kw".into(),
            NotifyAction::AddKeyword => "kwadd".into(),
            NotifyAction::RemoveKeyword(i) => format!("kwrm:{i}"),
            NotifyAction::Time => "time".into(),
            NotifyAction::Categories => "cats".into(),
            NotifyAction::ToggleCategory(code) => format!("cat:{code}"),
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "menu" => NotifyAction::Menu,
            "toggle" => NotifyAction::Toggle,
            "freq:daily" => NotifyAction::Frequency(Frequency::Daily),
            "freq:weekly" => NotifyAction::Frequency(Frequency::Weekly),
            "kw" => NotifyAction::Keywords,
            "kwadd" => NotifyAction::AddKeyword,
            "time" => NotifyAction::Time,
            "cats" => NotifyAction::Categories,
            _ => {
                let (kind, arg) = s.split_once(':')?;
                match kind {
                    "kwrm" => NotifyAction::RemoveKeyword(arg.parse().ok()?),
                    "cat" => NotifyAction::ToggleCategory(non_empty(arg)?),
                    _ => return None,
                }
            }
        })
    }
}

impl AdminAction {
    fn encode(&self) -> String {
        match self {
            AdminAction::Menu => "menu".into(),
            AdminAction::Stats => "stats".into(),
            AdminAction::Users(page) => format!("users:{page}"),
            AdminAction::Restrictions(page) => format!("rs:{page}"),
            AdminAction::Restrict => "restrict".into(),
            AdminAction::Block => "block".into(),
            AdminAction::Unrestrict => "unrestrict".into(),
            AdminAction::Admins => "admins".into(),
            AdminAction::AddAdmin => "add".into(),
            AdminAction::RemoveAdmin => "rm".into(),
            AdminAction::Broadcast => "bc".into(),
            AdminAction::BroadcastTarget(t) => format!("bct:{}", t.code()),
            AdminAction::BroadcastPage(page) => format!("bcp:{page}"),
            AdminAction::BroadcastToggle(user, page) => format!("bcx:{user}:{page}"),
            AdminAction::BroadcastConfirm => "bcgo".into(),
            AdminAction::BroadcastCancel => "bcno".into(),
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "menu" => AdminAction::Menu,
            "stats" => AdminAction::Stats,
            "restrict" => AdminAction::Restrict,
            "block" => AdminAction::Block,
            "unrestrict" => AdminAction::Unrestrict,
            "admins" => AdminAction::Admins,
            "add" => AdminAction::AddAdmin,
            "rm" => AdminAction::RemoveAdmin,
            "bc" => AdminAction::Broadcast,
            "bcgo" => AdminAction::BroadcastConfirm,
            "bcno" => AdminAction::BroadcastCancel,
            _ => {
                let (kind, arg) = s.split_once(':')?;
                match kind {
                    "users" => AdminAction::Users(arg.parse().ok()?),
                    "rs" => AdminAction::Restrictions(arg.parse().ok()?),
                    "bct" => AdminAction::BroadcastTarget(BroadcastTarget::from_code(arg)?),
                    "bcp" => AdminAction::BroadcastPage(arg.parse().ok()?),
                    "bcx" => {
                        let (user, page) = arg.split_once(':')?;
                        AdminAction::BroadcastToggle(user.parse().ok()?, page.parse().ok()?)
                    }
                    _ => return None,
                }
            }
        })
    }
}

/// Inline button carrying an encoded action.
pub fn button(text: impl Into<String>, action: Action) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, action.encode())
}

/// Link button; falls back to a no-op button if the URL does not parse.
pub fn link(text: impl Into<String>, url: &str) -> InlineKeyboardButton {
    match reqwest::Url::parse(url) {
        Ok(url) => InlineKeyboardButton::url(text, url),
        Err(_) => button(text, Action::Noop),
    }
}

pub fn markup(rows: Vec<Vec<InlineKeyboardButton>>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows)
}

/// Two buttons per row.
pub fn pairs(buttons: Vec<InlineKeyboardButton>) -> Vec<Vec<InlineKeyboardButton>> {
    buttons.chunks(2).map(|c| c.to_vec()).collect()
}

/// `⬅️ Prev` / `page/pages` / `Next ➡️` row, empty when there is one page.
pub fn pager(page: usize, pages: usize, to: impl Fn(usize) -> Action) -> Vec<InlineKeyboardButton> {
    if pages <= 1 {
        return Vec::new();
    }
    let mut row = Vec::new();
    if page > 0 {
        row.push(button("⬅️ Prev", to(page - 1)));
    }
    row.push(button(format!("{}/{}", page + 1, pages), Action::Noop));
    if page + 1 < pages {
        row.push(button("Next ➡️", to(page + 1)));
    }
    row
}

/// Callback data of every button, row by row.
#[cfg(test)]
pub(crate) fn callback_data(kb: &InlineKeyboardMarkup) -> Vec<String> {
    use teloxide::types::InlineKeyboardButtonKind;
    kb.inline_keyboard
        .iter()
        .flatten()
        .filter_map(|b| match &b.kind {
            InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_actions() -> Vec<Action> {
        vec![
            Action::SearchOptions,
            Action::SearchSimple,
            Action::SearchAdvanced,
            Action::Summarize("2301.07041v2".into()),
            Action::Download("math.AG/0601001v1".into()),
            Action::AddToCompare("2301.07041".into()),
            Action::MoreResults,
            Action::CompareRun,
            Action::CompareClear,
            Action::Filter(FilterAction::Preset(DatePreset::Month)),
            Action::Filter(FilterAction::AuthorMode(AuthorMode::LastName)),
            Action::Filter(FilterAction::MinCitations(100)),
            Action::Filter(FilterAction::Toggle(FieldGroup::Biology)),
            Action::Filter(FilterAction::Execute),
            Action::Settings(SettingsAction::SetMaxResults(20)),
            Action::Settings(SettingsAction::RemoveJournal(3)),
            Action::Settings(SettingsAction::ToggleCategory("physics.data-an".into())),
            Action::Settings(SettingsAction::Field(4)),
            Action::Notify(NotifyAction::Frequency(Frequency::Weekly)),
            Action::Notify(NotifyAction::RemoveKeyword(0)),
            Action::Notify(NotifyAction::ToggleCategory("q-bio.NC".into())),
            Action::Voice(VoiceAction::Retry(42)),
            Action::Voice(VoiceAction::Edit(42)),
            Action::Voice(VoiceAction::Search(42)),
            Action::EndChat,
            Action::Admin(AdminAction::Users(3)),
            Action::Admin(AdminAction::BroadcastTarget(BroadcastTarget::Active)),
            Action::Admin(AdminAction::BroadcastToggle(-1001234567890, 2)),
            Action::CheckSubscription,
            Action::Noop,
        ]
    }

    #[test]
    fn test_encoded_actions_parse_back_and_fit() {
        for action in all_actions() {
            let data = action.encode();
            assert!(data.len() <= MAX_CALLBACK_LEN, "{data} too long");
            assert_eq!(Action::parse(&data), Some(action), "{data}");
        }
    }

    #[test]
    fn test_rejects_garbage() {
        for data in ["", "sum:", "f:p:decade", "v:retry:x", "a:bcx:1", "zzz:1", "set:max:lots"] {
            assert_eq!(Action::parse(data), None, "{data}");
        }
    }

    #[test]
    fn test_pager() {
        assert!(pager(0, 1, |p| Action::Admin(AdminAction::Users(p))).is_empty());
        let row = pager(0, 3, |p| Action::Admin(AdminAction::Users(p)));
        assert_eq!(row.len(), 2);
        let row = pager(1, 3, |p| Action::Admin(AdminAction::Users(p)));
        assert_eq!(row.len(), 3);
    }
}
