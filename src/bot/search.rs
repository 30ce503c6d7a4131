//! Simple search, result browsing and `/latest`.

use chrono::Utc;
use teloxide::types::{InlineKeyboardMarkup, MessageId};
use tracing::info;

use super::keyboard::{Action, button, link, markup};
use super::{BotState, Ctx};
use crate::error::Result;
use crate::paper::query::with_preferences;
use crate::paper::{Paper, SortBy};
use crate::session::{Awaiting, SearchState};
use crate::store::admin::ActionKind;
use crate::text::escape;

const LATEST_COUNT: u32 = 5;

/// `/search` without terms.
pub async fn show_options(state: &BotState, ctx: &Ctx, origin: Option<MessageId>) -> Result<()> {
    let text = "<b>arXiv Paper Search</b>\n\n\
                Choose your search method:\n\n\
                🔍 <b>Simple Search</b>: search by keywords\n\
                🔬 <b>Advanced Search</b>: filter by date, author, citations and categories";
    let kb = markup(vec![vec![
        button("🔍 Simple Search", Action::SearchSimple),
        button("🔬 Advanced Search", Action::SearchAdvanced),
    ]]);
    state.show(ctx, origin, text, kb).await
}

pub async fn prompt_simple(state: &BotState, ctx: &Ctx) -> Result<()> {
    state.sessions.with(ctx.uid(), |s| s.awaiting = Some(Awaiting::SimpleSearch)).await;
    state
        .telegram
        .send_text(ctx.chat, "🔍 Send me your search terms.\nExample: <code>quantum error correction</code>")
        .await?;
    Ok(())
}

/// Free-text search narrowed by the user's preferences.
pub async fn run_simple(state: &BotState, ctx: &Ctx, terms: &str) -> Result<()> {
    let terms = terms.trim();
    if terms.is_empty() {
        state
            .telegram
            .send_text(ctx.chat, "❌ Please provide a search query!\nExample: <code>/search machine learning</code>")
            .await?;
        return Ok(());
    }

    let prefs = state.preferences.get(ctx.uid())?;
    let query = with_preferences(terms, &prefs.specific_journals, &prefs.preferred_categories);
    info!("🔍 Search by {}: {query}", ctx.uid());

    let loading = state.telegram.send_text(ctx.chat, "🔍 Searching papers... Please wait...").await?;
    let papers = state.papers.search(&query, prefs.max_results, SortBy::Relevance).await;
    state.telegram.delete(ctx.chat, loading.id).await;
    let papers = papers?;
    state.admin.record_activity(ctx.uid(), ctx.username.as_deref(), Some(ActionKind::Search), Utc::now())?;

    if papers.is_empty() {
        let text = no_results(terms, &prefs.preferred_categories, &prefs.specific_journals);
        state.telegram.send_text(ctx.chat, &text).await?;
        return Ok(());
    }
    present(state, ctx, query, papers).await
}

/// Store fresh results in the session and show the first one.
pub async fn present(state: &BotState, ctx: &Ctx, query: String, papers: Vec<Paper>) -> Result<()> {
    let total = papers.len();
    let search = SearchState::new(query, papers);
    let Some(first) = search.current().cloned() else {
        return Ok(());
    };
    let has_more = search.remaining() > 0;
    state.sessions.with(ctx.uid(), |s| s.search = Some(search)).await;

    let text = format!("🔍 Found {total} papers! Showing result 1/{total}:\n\n{}", first.card());
    state.telegram.send(ctx.chat, &text, Some(result_keyboard(&first, has_more))).await?;
    Ok(())
}

/// Advance to the next result, editing the result message in place.
pub async fn more(state: &BotState, ctx: &Ctx, origin: Option<MessageId>) -> Result<Option<String>> {
    let next = state
        .sessions
        .with(ctx.uid(), |s| {
            let search = s.search.as_mut()?;
            let total = search.papers.len();
            let paper = search.advance()?.clone();
            Some((paper, search.cursor, total, search.remaining() > 0))
        })
        .await;

    let Some((paper, cursor, total, has_more)) = next else {
        return Ok(Some("🏁 You've reached the end of results!".into()));
    };
    let text = format!("📚 Result {}/{total}:\n\n{}", cursor + 1, paper.card());
    state.show(ctx, origin, &text, result_keyboard(&paper, has_more)).await?;
    Ok(None)
}

/// `/latest`: the newest submissions for the configured query.
pub async fn latest(state: &BotState, ctx: &Ctx) -> Result<()> {
    let loading = state.telegram.send_text(ctx.chat, "🔄 Fetching latest papers... Please wait...").await?;
    let papers = state
        .papers
        .search(&state.config.latest_query, LATEST_COUNT, SortBy::SubmittedDate)
        .await;
    state.telegram.delete(ctx.chat, loading.id).await;
    let papers = papers?;
    state.admin.record_activity(ctx.uid(), ctx.username.as_deref(), Some(ActionKind::Search), Utc::now())?;

    if papers.is_empty() {
        state.telegram.send_text(ctx.chat, "❌ Could not fetch latest papers.").await?;
        return Ok(());
    }
    present(state, ctx, state.config.latest_query.clone(), papers).await
}

pub fn result_keyboard(paper: &Paper, has_more: bool) -> InlineKeyboardMarkup {
    let id = paper.short_id.clone();
    let mut rows = vec![
        vec![
            link("📚 Read Paper", &paper.abs_url()),
            button("🤖 Summarize", Action::Summarize(id.clone())),
        ],
        vec![
            button("📥 Download PDF", Action::Download(id.clone())),
            button("➕ Add to Compare", Action::AddToCompare(id)),
        ],
    ];
    if has_more {
        rows.push(vec![button("➡️ More Results", Action::MoreResults)]);
    }
    markup(rows)
}

pub fn no_results(terms: &str, categories: &[String], journals: &[String]) -> String {
    let list = |items: &[String]| {
        if items.is_empty() { "None".to_string() } else { escape(&items.join(", ")) }
    };
    format!(
        "❌ No papers found matching your query and preferences.\n\n\
         Try:\n\
         • Using different search terms\n\
         • Adjusting your category preferences\n\
         • Removing some filters\n\n\
         Search query: {}\n\
         Categories: {}\n\
         Journals: {}",
        escape(terms),
        list(categories),
        list(journals),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::keyboard::callback_data as callbacks;
    use crate::paper::sample_paper;

    #[test]
    fn test_result_keyboard() {
        let paper = sample_paper("2301.07041v2", "t", "s");
        let with_more = callbacks(&result_keyboard(&paper, true));
        assert_eq!(with_more, vec!["sum:2301.07041v2", "dl:2301.07041v2", "cmp:2301.07041v2", "more"]);
        let last = callbacks(&result_keyboard(&paper, false));
        assert!(!last.contains(&"more".to_string()));
    }

    #[test]
    fn test_no_results_lists_filters() {
        let text = no_results("graphs & trees", &["cs.LG".into()], &[]);
        assert!(text.contains("Search query: graphs &amp; trees"));
        assert!(text.contains("Categories: cs.LG"));
        assert!(text.contains("Journals: None"));
    }
}
