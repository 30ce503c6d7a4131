//! Summary, Q&A and PDF download for a single paper.

use chrono::Utc;
use tracing::info;

use super::{BotState, Ctx};
use crate::ai::prompts;
use crate::error::Result;
use crate::paper::Paper;
use crate::store::admin::ActionKind;
use crate::text::{TELEGRAM_MAX_LEN, escape, sanitize_filename};

/// Look the paper up in the user's current results, then in the index.
pub async fn find_paper(state: &BotState, ctx: &Ctx, id: &str) -> Result<Option<Paper>> {
    let cached = state
        .sessions
        .with(ctx.uid(), |s| {
            s.search
                .as_ref()
                .and_then(|search| search.papers.iter().find(|p| p.short_id == id).cloned())
        })
        .await;
    if cached.is_some() {
        return Ok(cached);
    }
    Ok(state.papers.fetch(id).await?)
}

pub fn summary_message(paper: &Paper, summary: &str) -> String {
    format!(
        "<b>PaperPilot Summary</b> 🤖\n\n{}\n\n\
         <b>Paper Details:</b>\n\
         📄 <a href=\"{}\">{}</a>\n\
         👥 Authors: {}\n\
         📅 Published: {}\n\n\
         💡 <b>Ask me anything about this paper!</b>\n\
         Just type your question below and I'll answer based on the paper's content.",
        escape(summary.trim()),
        escape(&paper.pdf_url),
        escape(&paper.title),
        escape(&paper.author_line()),
        paper.published.format("%Y-%m-%d"),
    )
}

pub fn answer_message(question: &str, answer: &str) -> String {
    format!(
        "💭 <b>You:</b>\n{}\n\n🤖 <b>PaperPilot:</b>\n{}\n\n<i>Ask another question or use /search to find more papers!</i>",
        escape(question.trim()),
        escape(answer.trim()),
    )
}

pub async fn summarize(state: &BotState, ctx: &Ctx, id: &str) -> Result<()> {
    let processing = state
        .telegram
        .send_text(ctx.chat, "🧠 PaperPilot is analyzing the paper... Please wait...")
        .await?;

    let Some(paper) = find_paper(state, ctx, id).await? else {
        state.telegram.edit(ctx.chat, processing.id, "❌ Paper not found.", None).await?;
        return Ok(());
    };

    let summary = match state.model.generate(&prompts::summary(&paper)).await {
        Ok(summary) => summary,
        Err(e) => {
            state.telegram.delete(ctx.chat, processing.id).await;
            return Err(e.into());
        }
    };
    info!("📝 Summarized {} for {}", paper.short_id, ctx.uid());

    state.sessions.with(ctx.uid(), |s| s.current_paper = Some(paper.clone())).await;
    state.admin.record_activity(ctx.uid(), ctx.username.as_deref(), Some(ActionKind::Summary), Utc::now())?;

    state.telegram.delete(ctx.chat, processing.id).await;
    state.telegram.send_parts(ctx.chat, &summary_message(&paper, &summary)).await?;

    if state.preferences.get(ctx.uid())?.auto_download {
        send_pdf(state, ctx, &paper).await?;
    }
    Ok(())
}

/// Free text while a paper is selected.
pub async fn ask(state: &BotState, ctx: &Ctx, question: &str) -> Result<()> {
    let paper = state.sessions.with(ctx.uid(), |s| s.current_paper.clone()).await;
    let Some(paper) = paper else {
        state
            .telegram
            .send_text(ctx.chat, "💡 Summarize a paper first, then ask me questions about it. Use /search to find one.")
            .await?;
        return Ok(());
    };

    state.telegram.typing(ctx.chat).await;
    let analyzing = state
        .telegram
        .send_text(ctx.chat, "🧠 Analyzing paper to answer your question...")
        .await?;

    let answer = match state.model.generate(&prompts::question(&paper, question)).await {
        Ok(answer) => answer,
        Err(e) => {
            state.telegram.delete(ctx.chat, analyzing.id).await;
            return Err(e.into());
        }
    };

    let text = answer_message(question, &answer);
    if text.chars().count() <= TELEGRAM_MAX_LEN {
        state.telegram.edit(ctx.chat, analyzing.id, &text, None).await
    } else {
        state.telegram.delete(ctx.chat, analyzing.id).await;
        state.telegram.send_parts(ctx.chat, &text).await
    }
}

pub async fn download(state: &BotState, ctx: &Ctx, id: &str) -> Result<()> {
    let loading = state.telegram.send_text(ctx.chat, "⏳ Downloading PDF... Please wait...").await?;
    let paper = find_paper(state, ctx, id).await;
    state.telegram.delete(ctx.chat, loading.id).await;

    let Some(paper) = paper? else {
        state.telegram.send_text(ctx.chat, "❌ Paper not found.").await?;
        return Ok(());
    };
    send_pdf(state, ctx, &paper).await
}

async fn send_pdf(state: &BotState, ctx: &Ctx, paper: &Paper) -> Result<()> {
    let data = state.papers.download_pdf(paper).await?;
    let caption = format!(
        "📥 <b>Downloaded:</b> {}\n👥 Authors: {}\n📅 Published: {}",
        escape(&paper.title),
        escape(&paper.author_line()),
        paper.published.format("%Y-%m-%d"),
    );
    state
        .telegram
        .send_pdf(ctx.chat, data, &sanitize_filename(&paper.title), &caption)
        .await?;
    state.admin.record_activity(ctx.uid(), ctx.username.as_deref(), Some(ActionKind::Download), Utc::now())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::sample_paper;

    #[test]
    fn test_summary_message_escapes() {
        let paper = sample_paper("2401.1", "Less <is> more", "abs");
        let text = summary_message(&paper, "  uses a < b  ");
        assert!(text.starts_with("<b>PaperPilot Summary</b>"));
        assert!(text.contains("uses a &lt; b\n"));
        assert!(text.contains(">Less &lt;is&gt; more</a>"));
        assert!(text.contains("2024-03-01"));
    }

    #[test]
    fn test_answer_message() {
        let text = answer_message("why?", "because");
        assert!(text.contains("💭 <b>You:</b>\nwhy?"));
        assert!(text.contains("🤖 <b>PaperPilot:</b>\nbecause"));
    }
}
