//! Paper comparison: similarity metrics, AI analysis, per-session limits.

pub mod cache;
pub mod similarity;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::ai::{GeminiError, TextModel, prompts};
use crate::paper::Paper;
use crate::text::escape;

use cache::ComparisonCache;

const TOPICS_PER_PAPER: usize = 5;
const BAR_CELLS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("need at least 2 papers to compare")]
    TooFewPapers,
    #[error(transparent)]
    Model(#[from] GeminiError),
}

/// Title and id of a compared paper, enough to render the result.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperDigest {
    pub title: String,
    pub short_id: String,
}

#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub papers: Vec<PaperDigest>,
    /// Mean pairwise abstract similarity in `[0, 1]`.
    pub similarity: f64,
    pub common_topics: Vec<String>,
    /// Per paper, in input order.
    pub unique_topics: Vec<Vec<String>>,
    pub analysis: String,
}

/// Similarity and topic metrics without the model analysis.
pub fn analyze(papers: &[Paper]) -> Result<ComparisonResult, CompareError> {
    if papers.len() < 2 {
        return Err(CompareError::TooFewPapers);
    }
    let abstracts: Vec<&str> = papers.iter().map(|p| p.summary.as_str()).collect();
    let topics: Vec<Vec<String>> = abstracts
        .iter()
        .map(|a| similarity::extract_topics(&a.to_lowercase(), TOPICS_PER_PAPER))
        .collect();

    Ok(ComparisonResult {
        papers: papers
            .iter()
            .map(|p| PaperDigest { title: p.title.clone(), short_id: p.short_id.clone() })
            .collect(),
        similarity: similarity::mean_similarity(&abstracts),
        common_topics: similarity::common_topics(&topics),
        unique_topics: similarity::unique_topics(&topics),
        analysis: String::new(),
    })
}

/// Runs comparisons through the model, memoized by paper set.
pub struct Comparator {
    model: Arc<dyn TextModel>,
    cache: Mutex<ComparisonCache>,
}

impl Comparator {
    pub fn new(model: Arc<dyn TextModel>, max_age: Duration) -> Self {
        Self { model, cache: Mutex::new(ComparisonCache::new(max_age)) }
    }

    pub async fn compare(&self, papers: &[Paper], now: DateTime<Utc>) -> Result<ComparisonResult, CompareError> {
        let ids: Vec<&str> = papers.iter().map(|p| p.entry_id.as_str()).collect();
        let key = ComparisonCache::key(&ids);

        if let Some(hit) = self.cache_lock().get(&key, now) {
            info!("📦 Comparison cache hit for {key}");
            return Ok(hit);
        }

        let mut result = analyze(papers)?;
        result.analysis = self.model.generate(&prompts::comparison(papers)).await?;
        self.cache_lock().insert(key, result.clone(), now);
        Ok(result)
    }

    fn cache_lock(&self) -> std::sync::MutexGuard<'_, ComparisonCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// `██████▒▒▒▒` for 0.6.
pub fn similarity_bar(score: f64) -> String {
    let filled = ((score.clamp(0.0, 1.0) * BAR_CELLS as f64) as usize).min(BAR_CELLS);
    format!("{}{}", "█".repeat(filled), "▒".repeat(BAR_CELLS - filled))
}

/// HTML report for a finished comparison.
pub fn render(result: &ComparisonResult) -> String {
    const PAPER_MARKS: [&str; 3] = ["📘", "📗", "📙"];
    const ASPECT_MARKS: [&str; 3] = ["🔵", "🟢", "🟡"];

    let mut out = String::from("<b>PaperPilot Advanced Analysis</b>\n\n📚 <b>Papers Under Review</b>\n");
    for (i, paper) in result.papers.iter().enumerate() {
        out.push_str(&format!(
            "{} <b>Paper {}:</b> {}\n",
            PAPER_MARKS[i % PAPER_MARKS.len()],
            i + 1,
            escape(&paper.title)
        ));
    }

    out.push_str(&format!(
        "\n🎯 <b>Similarity Analysis</b>\n<code>{}</code> {:.2}%\n",
        similarity_bar(result.similarity),
        result.similarity * 100.0
    ));

    out.push_str("\n🌟 <b>Common Research Themes</b>\n");
    if result.common_topics.is_empty() {
        out.push_str("None found\n");
    }
    for topic in &result.common_topics {
        out.push_str(&format!("⭐️ {}\n", escape(topic)));
    }

    out.push_str("\n🔍 <b>Unique Contributions</b>\n");
    for (i, topics) in result.unique_topics.iter().enumerate() {
        let mark = ASPECT_MARKS.get(i).copied().unwrap_or("📌");
        out.push_str(&format!("{mark} <b>Paper {}</b>\n   {}\n", i + 1, escape(&topics.join(", "))));
    }

    out.push_str(&format!(
        "\n📊 <b>Detailed Analysis</b>\n{}\n\n━━━━━━━━━━━━━━━\n🔄 Use /clear_comparison to start fresh!",
        escape(result.analysis.trim())
    ));
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// Staged; carries the new basket size.
    Added(usize),
    Duplicate,
    Full,
}

/// Papers a user has staged for the next comparison.
#[derive(Debug, Default, Clone)]
pub struct ComparisonBasket {
    papers: Vec<Paper>,
}

impl ComparisonBasket {
    pub fn stage(&mut self, paper: Paper, max: usize) -> StageOutcome {
        if self.papers.iter().any(|p| p.entry_id == paper.entry_id) {
            return StageOutcome::Duplicate;
        }
        if self.papers.len() >= max {
            return StageOutcome::Full;
        }
        self.papers.push(paper);
        StageOutcome::Added(self.papers.len())
    }

    pub fn papers(&self) -> &[Paper] {
        &self.papers
    }

    pub fn len(&self) -> usize {
        self.papers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.papers.is_empty()
    }

    pub fn clear(&mut self) {
        self.papers.clear();
    }
}

/// Comparisons per rolling day. The count resets once a full day has passed
/// since the last recorded comparison.
#[derive(Debug, Clone)]
pub struct DailyQuota {
    count: u32,
    last_activity: Option<DateTime<Utc>>,
    limit: u32,
}

impl DailyQuota {
    pub fn new(limit: u32) -> Self {
        Self { count: 0, last_activity: None, limit }
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        if let Some(last) = self.last_activity
            && now - last >= Duration::days(1)
        {
            self.count = 0;
        }
    }

    pub fn can_consume(&mut self, now: DateTime<Utc>) -> bool {
        self.roll(now);
        self.count < self.limit
    }

    pub fn record(&mut self, now: DateTime<Utc>) {
        self.roll(now);
        self.count += 1;
        self.last_activity = Some(now);
    }

    pub fn remaining(&mut self, now: DateTime<Utc>) -> u32 {
        self.roll(now);
        self.limit.saturating_sub(self.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::sample_paper;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TextModel for CountingModel {
        async fn generate(&self, _prompt: &str) -> Result<String, GeminiError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("analysis #{n}"))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn pair() -> Vec<Paper> {
        vec![
            sample_paper("2401.00001", "Graph networks", "Graph neural molecule graph."),
            sample_paper("2401.00002", "Graph vision", "Graph neural vision graph."),
        ]
    }

    #[test]
    fn test_analyze_requires_two_papers() {
        let one = vec![sample_paper("1", "a", "b")];
        assert!(matches!(analyze(&one), Err(CompareError::TooFewPapers)));
    }

    #[test]
    fn test_analyze_topics() {
        let result = analyze(&pair()).unwrap();
        assert_eq!(result.papers.len(), 2);
        assert!(result.common_topics.contains(&"graph".to_string()));
        assert!(result.unique_topics[0].contains(&"molecule".to_string()));
        assert!(result.unique_topics[1].contains(&"vision".to_string()));
        assert!(result.similarity > 0.0 && result.similarity < 1.0);
    }

    #[tokio::test]
    async fn test_compare_uses_cache_regardless_of_order() {
        let model = Arc::new(CountingModel { calls: AtomicUsize::new(0) });
        let comparator = Comparator::new(model.clone(), Duration::hours(24));
        let papers = pair();

        let first = comparator.compare(&papers, now()).await.unwrap();
        let reversed: Vec<Paper> = papers.iter().rev().cloned().collect();
        let second = comparator.compare(&reversed, now() + Duration::hours(1)).await.unwrap();
        assert_eq!(first.analysis, "analysis #1");
        assert_eq!(second.analysis, "analysis #1");
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);

        let third = comparator.compare(&papers, now() + Duration::hours(25)).await.unwrap();
        assert_eq!(third.analysis, "analysis #2");
    }

    #[test]
    fn test_similarity_bar() {
        assert_eq!(similarity_bar(0.0), "▒▒▒▒▒▒▒▒▒▒");
        assert_eq!(similarity_bar(0.61), "██████▒▒▒▒");
        assert_eq!(similarity_bar(1.0), "██████████");
    }

    #[test]
    fn test_render_escapes_and_lists() {
        let mut result = analyze(&pair()).unwrap();
        result.papers[0].title = "A <b> & C".into();
        result.analysis = "Both use graphs.".into();
        let html = render(&result);
        assert!(html.contains("A &lt;b&gt; &amp; C"));
        assert!(html.contains("⭐️ graph"));
        assert!(html.contains("🟢 <b>Paper 2</b>"));
        assert!(html.contains("Both use graphs."));
    }

    #[test]
    fn test_basket_limits() {
        let mut basket = ComparisonBasket::default();
        assert_eq!(basket.stage(sample_paper("1", "a", "x"), 2), StageOutcome::Added(1));
        assert_eq!(basket.stage(sample_paper("1", "a", "x"), 2), StageOutcome::Duplicate);
        assert_eq!(basket.stage(sample_paper("2", "b", "x"), 2), StageOutcome::Added(2));
        assert_eq!(basket.stage(sample_paper("3", "c", "x"), 2), StageOutcome::Full);
        basket.clear();
        assert!(basket.is_empty());
    }

    #[test]
    fn test_quota_resets_after_a_day() {
        let mut quota = DailyQuota::new(2);
        quota.record(now());
        quota.record(now() + Duration::hours(1));
        assert!(!quota.can_consume(now() + Duration::hours(2)));
        // Measured from the last comparison, not the first
        assert!(!quota.can_consume(now() + Duration::hours(24)));
        assert!(quota.can_consume(now() + Duration::hours(25)));
        assert_eq!(quota.remaining(now() + Duration::hours(25)), 2);
    }
}
