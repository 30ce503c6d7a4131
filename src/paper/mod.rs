//! Paper records and the literature sources that produce them.

pub mod arxiv;
pub mod citations;
pub mod query;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::text::{escape, truncate};

pub use arxiv::ArxivClient;
pub use citations::{CitationSource, SemanticScholar};

/// Errors from a paper source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse feed: {0}")]
    Parse(String),
}

/// Metadata for one indexed paper.
#[derive(Debug, Clone, PartialEq)]
pub struct Paper {
    /// Full entry URL, e.g. `http://arxiv.org/abs/2301.07041v2`.
    pub entry_id: String,
    /// Identifier without host, e.g. `2301.07041v2`.
    pub short_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub categories: Vec<String>,
    pub primary_category: String,
    pub published: DateTime<Utc>,
    pub pdf_url: String,
}

impl Paper {
    pub fn abs_url(&self) -> String {
        format!("https://arxiv.org/abs/{}", self.short_id)
    }

    /// Up to three authors, with `...` when there are more.
    pub fn author_line(&self) -> String {
        let shown = self.authors.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
        if self.authors.len() > 3 {
            format!("{shown} ...")
        } else {
            shown
        }
    }

    /// HTML card shown for a single search result.
    pub fn card(&self) -> String {
        format!(
            "📄 <b>Title:</b> {}\n\
             👥 <b>Authors:</b> {}\n\
             📅 <b>Published:</b> {}\n\
             🏷️ <b>Categories:</b> {}\n\n\
             📝 <b>Abstract:</b>\n{}\n\n\
             🔗 <a href=\"{}\">Read Full Paper</a>",
            escape(&self.title),
            escape(&self.author_line()),
            self.published.format("%Y-%m-%d"),
            escape(&self.primary_category),
            escape(&truncate(&self.summary, 300)),
            escape(&self.pdf_url),
        )
    }
}

/// Result ordering supported by the search API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Relevance,
    SubmittedDate,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Relevance => "relevance",
            SortBy::SubmittedDate => "submittedDate",
        }
    }
}

/// A searchable literature index.
#[async_trait]
pub trait PaperSource: Send + Sync {
    async fn search(&self, query: &str, max_results: u32, sort: SortBy) -> Result<Vec<Paper>, SourceError>;

    /// Look up one paper by identifier. `Ok(None)` when the index has no such paper.
    async fn fetch(&self, id: &str) -> Result<Option<Paper>, SourceError>;

    async fn download_pdf(&self, paper: &Paper) -> Result<Vec<u8>, SourceError>;
}

#[cfg(test)]
pub(crate) fn sample_paper(id: &str, title: &str, summary: &str) -> Paper {
    use chrono::TimeZone;
    Paper {
        entry_id: format!("http://arxiv.org/abs/{id}"),
        short_id: id.to_string(),
        title: title.to_string(),
        authors: vec!["Ada Lovelace".to_string()],
        summary: summary.to_string(),
        categories: vec!["cs.LG".to_string()],
        primary_category: "cs.LG".to_string(),
        published: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        pdf_url: format!("https://arxiv.org/pdf/{id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_line() {
        let mut paper = sample_paper("1", "t", "s");
        assert_eq!(paper.author_line(), "Ada Lovelace");
        paper.authors = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        assert_eq!(paper.author_line(), "A, B, C ...");
    }

    #[test]
    fn test_card_escapes_and_truncates() {
        let paper = sample_paper("2301.07041", "Bounds <for> & against", &"x".repeat(400));
        let card = paper.card();
        assert!(card.contains("Bounds &lt;for&gt; &amp; against"));
        assert!(card.contains(&format!("{}...", "x".repeat(300))));
        assert!(!card.contains(&"x".repeat(301)));
        assert!(card.contains("2024-03-01"));
        assert_eq!(paper.abs_url(), "https://arxiv.org/abs/2301.07041");
    }
}
