//! Advanced search filter wizard.
//!
//! The menu message is edited in place as the user moves between the date,
//! author, citation and category screens. Free-text steps (custom dates,
//! author name) set the session's awaiting mode and reply with a fresh menu.

use chrono::{NaiveDate, Utc};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use tracing::{info, warn};

use super::keyboard::{Action, FilterAction, button, markup, pairs};
use super::{BotState, Ctx, search};
use crate::error::Result;
use crate::paper::citations::filter_by_citations;
use crate::paper::query::{AuthorMode, DatePreset, FieldGroup, SearchFilters};
use crate::paper::{Paper, SortBy};
use crate::session::Awaiting;
use crate::store::admin::ActionKind;
use crate::text::escape;

pub const CITATION_PRESETS: [u64; 4] = [10, 50, 100, 500];

const CATEGORIES_TEXT: &str =
    "<b>Select Categories</b> 🔖\n\nTap a category to toggle it:\n✅ = selected\n⭕️ = not selected";

pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}

fn back_row() -> Vec<InlineKeyboardButton> {
    vec![button("« Back", Action::Filter(FilterAction::Menu))]
}

pub fn menu_text(filters: &SearchFilters) -> String {
    format!(
        "🔬 <b>Advanced Search</b>\n\n<b>Active filters:</b>\n{}\n\nPick a filter to set, then run the search.",
        filters.summary()
    )
}

pub fn menu_keyboard() -> InlineKeyboardMarkup {
    markup(vec![
        vec![
            button("📅 Date Range", Action::Filter(FilterAction::Date)),
            button("👤 Author", Action::Filter(FilterAction::Author)),
        ],
        vec![
            button("📊 Citations", Action::Filter(FilterAction::Citations)),
            button("🔖 Categories", Action::Filter(FilterAction::Categories)),
        ],
        vec![
            button("🔍 Execute Search", Action::Filter(FilterAction::Execute)),
            button("🗑 Clear", Action::Filter(FilterAction::Clear)),
        ],
        vec![button("« Back", Action::SearchOptions)],
    ])
}

pub fn categories_keyboard(filters: &SearchFilters) -> InlineKeyboardMarkup {
    let toggles: Vec<_> = FieldGroup::ALL
        .into_iter()
        .map(|g| {
            let mark = if filters.categories.contains(&g) { "✅" } else { "⭕️" };
            button(format!("{mark} {}", g.label()), Action::Filter(FilterAction::Toggle(g)))
        })
        .collect();
    let mut rows = pairs(toggles);
    rows.push(back_row());
    markup(rows)
}

pub async fn show_menu(state: &BotState, ctx: &Ctx, origin: Option<MessageId>) -> Result<()> {
    let filters = state
        .sessions
        .with(ctx.uid(), |s| {
            s.awaiting = None;
            s.filters.clone()
        })
        .await;
    state.show(ctx, origin, &menu_text(&filters), menu_keyboard()).await
}

/// Button presses inside the wizard. Returns a toast for the callback answer.
pub async fn handle(
    state: &BotState,
    ctx: &Ctx,
    origin: Option<MessageId>,
    action: FilterAction,
) -> Result<Option<String>> {
    match action {
        FilterAction::Menu => show_menu(state, ctx, origin).await?,
        FilterAction::Date => {
            let filters = state.sessions.with(ctx.uid(), |s| s.filters.clone()).await;
            let current = match (filters.date_from, filters.date_to) {
                (Some(from), Some(to)) => format!("\nCurrent: {from} to {to}"),
                _ => String::new(),
            };
            let text = format!(
                "<b>Select Date Range</b> 📅{current}\n\n\
                 Choose a predefined range or select Custom to enter specific dates."
            );
            let kb = markup(vec![
                vec![
                    button("Last Week", Action::Filter(FilterAction::Preset(DatePreset::Week))),
                    button("Last Month", Action::Filter(FilterAction::Preset(DatePreset::Month))),
                ],
                vec![
                    button("Last Year", Action::Filter(FilterAction::Preset(DatePreset::Year))),
                    button("Custom", Action::Filter(FilterAction::CustomDate)),
                ],
                back_row(),
            ]);
            state.show(ctx, origin, &text, kb).await?;
        }
        FilterAction::Preset(preset) => {
            let today = Utc::now().date_naive();
            state.sessions.with(ctx.uid(), |s| s.filters.apply_preset(preset, today)).await;
            show_menu(state, ctx, origin).await?;
        }
        FilterAction::CustomDate => {
            state
                .sessions
                .with(ctx.uid(), |s| {
                    s.filters.date_from = None;
                    s.filters.date_to = None;
                    s.awaiting = Some(Awaiting::FilterDateFrom);
                })
                .await;
            let text = "<b>Enter Start Date</b> 📅\n\nPlease enter the start date in YYYY-MM-DD format:\nExample: <code>2024-01-01</code>";
            state.show(ctx, origin, text, markup(vec![back_row()])).await?;
        }
        FilterAction::Author => {
            let text = "<b>Choose Author Search Type</b> 👤\n\n\
                        • <b>Exact Match:</b> search for the full author name\n\
                        • <b>Last Name:</b> search by last name only";
            let kb = markup(vec![
                vec![
                    button("Exact Match", Action::Filter(FilterAction::AuthorMode(AuthorMode::Exact))),
                    button("Last Name", Action::Filter(FilterAction::AuthorMode(AuthorMode::LastName))),
                ],
                back_row(),
            ]);
            state.show(ctx, origin, text, kb).await?;
        }
        FilterAction::AuthorMode(mode) => {
            state
                .sessions
                .with(ctx.uid(), |s| {
                    s.filters.author_mode = mode;
                    s.awaiting = Some(Awaiting::FilterAuthor);
                })
                .await;
            let label = match mode {
                AuthorMode::Exact => "Exact",
                AuthorMode::LastName => "Last name",
            };
            let text = format!("<b>Enter Author Name</b> 👤\n\nType: {label}\nPlease enter the author name:");
            state.show(ctx, origin, &text, markup(vec![back_row()])).await?;
        }
        FilterAction::Citations => {
            let mut presets: Vec<_> = CITATION_PRESETS
                .iter()
                .map(|&n| button(format!("{n}+"), Action::Filter(FilterAction::MinCitations(n))))
                .collect();
            presets.push(button("Any", Action::Filter(FilterAction::MinCitations(0))));
            let mut rows = pairs(presets);
            rows.push(back_row());
            let text = "<b>Minimum Citations</b> 📊\n\nOnly papers cited at least this often are shown.";
            state.show(ctx, origin, text, markup(rows)).await?;
        }
        FilterAction::MinCitations(n) => {
            state
                .sessions
                .with(ctx.uid(), |s| s.filters.min_citations = (n > 0).then_some(n))
                .await;
            show_menu(state, ctx, origin).await?;
        }
        FilterAction::Categories => {
            let filters = state.sessions.with(ctx.uid(), |s| s.filters.clone()).await;
            state.show(ctx, origin, CATEGORIES_TEXT, categories_keyboard(&filters)).await?;
        }
        FilterAction::Toggle(group) => {
            let filters = state
                .sessions
                .with(ctx.uid(), |s| {
                    s.filters.toggle_category(group);
                    s.filters.clone()
                })
                .await;
            state.show(ctx, origin, CATEGORIES_TEXT, categories_keyboard(&filters)).await?;
        }
        FilterAction::Clear => {
            state.sessions.with(ctx.uid(), |s| s.filters = SearchFilters::default()).await;
            show_menu(state, ctx, origin).await?;
            return Ok(Some("🗑 Filters cleared".into()));
        }
        FilterAction::Execute => return execute(state, ctx, origin).await,
    }
    Ok(None)
}

/// Text typed while the wizard awaits a date or an author name.
pub async fn on_text(state: &BotState, ctx: &Ctx, awaiting: Awaiting, text: &str) -> Result<()> {
    match awaiting {
        Awaiting::FilterDateFrom => {
            let Some(date) = parse_date(text) else {
                return reprompt_date(state, ctx).await;
            };
            state
                .sessions
                .with(ctx.uid(), |s| {
                    s.filters.date_from = Some(date);
                    s.awaiting = Some(Awaiting::FilterDateTo);
                })
                .await;
            let text = "<b>Enter End Date</b> 📅\n\nPlease enter the end date in YYYY-MM-DD format:\nExample: <code>2024-01-31</code>";
            state.telegram.send(ctx.chat, text, Some(markup(vec![back_row()]))).await?;
        }
        Awaiting::FilterDateTo => {
            let Some(date) = parse_date(text) else {
                return reprompt_date(state, ctx).await;
            };
            let from = state.sessions.with(ctx.uid(), |s| s.filters.date_from).await;
            if from.is_some_and(|from| date < from) {
                state
                    .telegram
                    .send(ctx.chat, "❌ The end date must not be before the start date. Please enter the end date again.", Some(markup(vec![back_row()])))
                    .await?;
                return Ok(());
            }
            state.sessions.with(ctx.uid(), |s| s.filters.date_to = Some(date)).await;
            show_menu(state, ctx, None).await?;
        }
        Awaiting::FilterAuthor => {
            let author = text.trim();
            if author.is_empty() {
                state.telegram.send_text(ctx.chat, "❌ Please enter a valid author name").await?;
                return Ok(());
            }
            let author = author.to_string();
            state.sessions.with(ctx.uid(), |s| s.filters.author = Some(author)).await;
            show_menu(state, ctx, None).await?;
        }
        _ => {}
    }
    Ok(())
}

async fn reprompt_date(state: &BotState, ctx: &Ctx) -> Result<()> {
    state
        .telegram
        .send(
            ctx.chat,
            "❌ Invalid date format! Please use YYYY-MM-DD format.\nExample: <code>2024-01-01</code>",
            Some(markup(vec![back_row()])),
        )
        .await?;
    Ok(())
}

async fn execute(state: &BotState, ctx: &Ctx, origin: Option<MessageId>) -> Result<Option<String>> {
    let filters = state
        .sessions
        .with(ctx.uid(), |s| {
            s.awaiting = None;
            s.filters.clone()
        })
        .await;

    let Some(query) = filters.to_query() else {
        let text = if filters.min_citations.is_some() {
            "❌ The citation filter narrows other filters. Please also set a date, author or category."
        } else {
            "❌ Please set at least one filter before searching!\n\nUse the buttons below to set your search filters."
        };
        state.show(ctx, origin, text, markup(vec![back_row()])).await?;
        return Ok(None);
    };

    info!("🔬 Advanced search by {}: {query}", ctx.uid());
    let text = format!(
        "🔍 <b>Processing Advanced Search</b>\n\n<b>Active filters:</b>\n{}\n\nQuery: <code>{}</code>\n\nPlease wait...",
        filters.summary(),
        escape(&query)
    );
    match origin {
        Some(id) => state.telegram.edit(ctx.chat, id, &text, None).await?,
        None => {
            state.telegram.send_text(ctx.chat, &text).await?;
        }
    }

    let max_results = state.preferences.get(ctx.uid())?.max_results;
    let mut papers = state.papers.search(&query, max_results, SortBy::Relevance).await?;
    if let Some(min) = filters.min_citations {
        papers = apply_citation_threshold(state, papers, min).await;
    }
    state.admin.record_activity(ctx.uid(), ctx.username.as_deref(), Some(ActionKind::Search), Utc::now())?;

    if papers.is_empty() {
        state
            .telegram
            .send(ctx.chat, "❌ No papers matched these filters. Try widening them.", Some(markup(vec![back_row()])))
            .await?;
        return Ok(None);
    }
    search::present(state, ctx, query, papers).await?;
    Ok(None)
}

/// Keep papers with at least `min` citations. Lookup failures keep everything.
async fn apply_citation_threshold(state: &BotState, papers: Vec<Paper>, min: u64) -> Vec<Paper> {
    let Some(citations) = state.citations.as_ref() else {
        warn!("Citation filter requested but no citation source is configured");
        return papers;
    };
    let ids: Vec<String> = papers.iter().map(|p| p.short_id.clone()).collect();
    match citations.citation_counts(&ids).await {
        Ok(counts) => filter_by_citations(papers, &counts, min),
        Err(e) => {
            warn!("Citation lookup failed, keeping unfiltered results: {e}");
            papers
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::keyboard::callback_data;

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date(" 2024-02-29 "), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(parse_date("2023-02-29"), None);
        assert_eq!(parse_date("01/02/2024"), None);
    }

    #[test]
    fn test_categories_keyboard_marks_selection() {
        let mut filters = SearchFilters::default();
        filters.toggle_category(FieldGroup::Mathematics);
        let kb = categories_keyboard(&filters);
        let labels: Vec<&str> = kb.inline_keyboard.iter().flatten().map(|b| b.text.as_str()).collect();
        assert!(labels.contains(&"✅ 📐 Mathematics"));
        assert!(labels.contains(&"⭕️ ⚛️ Physics"));
        assert_eq!(callback_data(&kb).last().map(String::as_str), Some("f:menu"));
    }

    #[test]
    fn test_menu_text_shows_summary() {
        let mut filters = SearchFilters::default();
        assert!(menu_text(&filters).contains("No filters set yet."));
        filters.author = Some("Noether".into());
        assert!(menu_text(&filters).contains("Noether"));
    }
}
