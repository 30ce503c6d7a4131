//! Comparison basket and report delivery.

use chrono::Utc;
use teloxide::types::InlineKeyboardMarkup;
use tracing::info;

use super::keyboard::{Action, button, markup};
use super::paper_actions::find_paper;
use super::{BotState, Ctx};
use crate::compare::{StageOutcome, render};
use crate::error::Result;
use crate::text::escape;

fn basket_keyboard(count: usize) -> InlineKeyboardMarkup {
    let mut row = Vec::new();
    if count >= 2 {
        row.push(button("🔍 Generate Comparison", Action::CompareRun));
    }
    row.push(button("🧹 Clear", Action::CompareClear));
    markup(vec![row])
}

pub fn added_message(title: &str, count: usize, max: usize) -> String {
    let next = if count < max {
        format!("Add {} more or use /compare to see the comparison!", max - count)
    } else {
        "Ready to compare! Use /compare to see the analysis.".to_string()
    };
    format!("📑 Paper added to comparison ({count}/{max})\n\n<b>Title:</b> {}\n\n{next}", escape(title))
}

/// `/compare`: basket status, with a generate button once two papers are staged.
pub async fn status(state: &BotState, ctx: &Ctx) -> Result<()> {
    let max = state.config.max_papers_to_compare;
    let titles: Vec<String> = state
        .sessions
        .with(ctx.uid(), |s| s.basket.papers().iter().map(|p| p.title.clone()).collect())
        .await;

    if titles.is_empty() {
        let text = format!(
            "🔄 <b>Paper Comparison Mode</b>\n\n\
             You can compare up to {max} papers.\n\n\
             <b>How to use:</b>\n\
             1. Search for papers with /search\n\
             2. Tap \"➕ Add to Compare\" on the papers you want\n\
             3. Tap \"🔍 Generate Comparison\" when ready\n\n\
             Use /cancel_compare to empty the list."
        );
        state.telegram.send_text(ctx.chat, &text).await?;
        return Ok(());
    }

    let mut text = format!("📚 <b>Papers selected ({}/{max})</b>\n\n", titles.len());
    for (i, title) in titles.iter().enumerate() {
        text.push_str(&format!("{}. {}\n", i + 1, escape(title)));
    }
    if titles.len() < 2 {
        text.push_str("\nAdd at least one more paper to compare.");
    }
    state.telegram.send(ctx.chat, &text, Some(basket_keyboard(titles.len()))).await?;
    Ok(())
}

/// "Add to Compare" button. Returns the callback toast.
pub async fn add(state: &BotState, ctx: &Ctx, id: &str) -> Result<Option<String>> {
    let Some(paper) = find_paper(state, ctx, id).await? else {
        return Ok(Some("❌ Paper not found".into()));
    };
    let max = state.config.max_papers_to_compare;
    let title = paper.title.clone();
    let outcome = state.sessions.with(ctx.uid(), |s| s.basket.stage(paper, max)).await;

    match outcome {
        StageOutcome::Duplicate => Ok(Some("❌ This paper is already in your comparison list!".into())),
        StageOutcome::Full => Ok(Some(format!("❌ You can compare at most {max} papers. Generate or clear first."))),
        StageOutcome::Added(count) => {
            state
                .telegram
                .send(ctx.chat, &added_message(&title, count, max), Some(basket_keyboard(count)))
                .await?;
            Ok(Some("✅ Paper added to comparison list!".into()))
        }
    }
}

pub async fn run(state: &BotState, ctx: &Ctx) -> Result<()> {
    let now = Utc::now();
    let (allowed, papers) = state
        .sessions
        .with(ctx.uid(), |s| (s.quota.can_consume(now), s.basket.papers().to_vec()))
        .await;

    if !allowed {
        state
            .telegram
            .send_text(ctx.chat, "📊 You've reached your daily comparison limit. Try again tomorrow!")
            .await?;
        return Ok(());
    }
    if papers.is_empty() {
        state
            .telegram
            .send_text(ctx.chat, "❌ No papers selected for comparison. Use /search to find papers and add them to compare!")
            .await?;
        return Ok(());
    }
    if papers.len() < 2 {
        state.telegram.send_text(ctx.chat, "❌ Please add at least 2 papers to compare!").await?;
        return Ok(());
    }

    let processing = state.telegram.send_text(ctx.chat, "🧠 Analyzing papers... please wait...").await?;
    let result = state.comparator.compare(&papers, now).await;
    state.telegram.delete(ctx.chat, processing.id).await;
    let result = result?;

    state.telegram.send_parts(ctx.chat, &render(&result)).await?;
    state
        .sessions
        .with(ctx.uid(), |s| {
            s.quota.record(now);
            s.basket.clear();
        })
        .await;
    info!("🔄 Compared {} papers for {}", papers.len(), ctx.uid());
    Ok(())
}

/// `/clear_comparison`, `/cancel_compare` and the Clear button.
pub async fn clear(state: &BotState, ctx: &Ctx) -> Result<()> {
    state.sessions.with(ctx.uid(), |s| s.basket.clear()).await;
    state
        .telegram
        .send_text(ctx.chat, "🧹 Comparison list cleared! You can start a new comparison.")
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::keyboard::callback_data;

    #[test]
    fn test_added_message() {
        let text = added_message("A & B", 1, 3);
        assert!(text.contains("(1/3)"));
        assert!(text.contains("A &amp; B"));
        assert!(text.contains("Add 2 more"));
        assert!(added_message("x", 3, 3).contains("Ready to compare!"));
    }

    #[test]
    fn test_basket_keyboard_needs_two() {
        assert_eq!(callback_data(&basket_keyboard(1)), vec!["cmp_clr"]);
        assert_eq!(callback_data(&basket_keyboard(2)), vec!["cmp_go", "cmp_clr"]);
    }
}
