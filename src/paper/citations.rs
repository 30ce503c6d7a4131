//! Citation counts from Semantic Scholar.
//!
//! arXiv carries no citation data, so the advanced search's citation
//! threshold is applied to results after the search.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Paper, SourceError};

const BATCH_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/batch?fields=citationCount";

#[async_trait]
pub trait CitationSource: Send + Sync {
    /// Citation counts keyed by arXiv id (without version). Unknown papers are absent.
    async fn citation_counts(&self, arxiv_ids: &[String]) -> Result<HashMap<String, u64>, SourceError>;
}

pub struct SemanticScholar {
    client: reqwest::Client,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct BatchRequest {
    ids: Vec<String>,
}

#[derive(Deserialize)]
struct BatchPaper {
    #[serde(rename = "citationCount")]
    citation_count: Option<u64>,
}

impl SemanticScholar {
    pub fn new(api_key: Option<String>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, api_key })
    }
}

#[async_trait]
impl CitationSource for SemanticScholar {
    async fn citation_counts(&self, arxiv_ids: &[String]) -> Result<HashMap<String, u64>, SourceError> {
        if arxiv_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<String> = arxiv_ids.iter().map(|id| strip_version(id).to_string()).collect();
        let body = BatchRequest { ids: ids.iter().map(|id| format!("arXiv:{id}")).collect() };

        let mut request = self.client.post(BATCH_URL).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(SourceError::Api { status: status.as_u16(), body: text });
        }

        let counts = parse_batch(&ids, &text)?;
        debug!("Citation counts for {} of {} papers", counts.len(), ids.len());
        Ok(counts)
    }
}

/// The batch endpoint answers with one entry per requested id, in order, `null` when unknown.
fn parse_batch(ids: &[String], body: &str) -> Result<HashMap<String, u64>, SourceError> {
    let entries: Vec<Option<BatchPaper>> =
        serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;
    Ok(ids
        .iter()
        .zip(entries)
        .filter_map(|(id, entry)| Some((id.clone(), entry?.citation_count?)))
        .collect())
}

/// `2301.07041v2` → `2301.07041`
pub fn strip_version(id: &str) -> &str {
    match id.rfind('v') {
        Some(pos) if pos > 0 && id[pos + 1..].chars().all(|c| c.is_ascii_digit()) && pos + 1 < id.len() => &id[..pos],
        _ => id,
    }
}

/// Keep papers with at least `min` citations. Papers without a known count are dropped.
pub fn filter_by_citations(papers: Vec<Paper>, counts: &HashMap<String, u64>, min: u64) -> Vec<Paper> {
    papers
        .into_iter()
        .filter(|p| counts.get(strip_version(&p.short_id)).is_some_and(|&n| n >= min))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::sample_paper;

    #[test]
    fn test_strip_version() {
        assert_eq!(strip_version("2301.07041v2"), "2301.07041");
        assert_eq!(strip_version("2301.07041"), "2301.07041");
        assert_eq!(strip_version("hep-th/9901001v1"), "hep-th/9901001");
        assert_eq!(strip_version("solv-int/9901001"), "solv-int/9901001");
    }

    #[test]
    fn test_parse_batch_with_nulls() {
        let ids = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let body = r#"[{"paperId":"a","citationCount":12}, null, {"paperId":"c","citationCount":null}]"#;
        let counts = parse_batch(&ids, body).unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts["1"], 12);
    }

    #[test]
    fn test_filter_by_citations() {
        let papers = vec![
            sample_paper("2401.00001v1", "cited", ""),
            sample_paper("2401.00002v1", "obscure", ""),
            sample_paper("2401.00003v1", "unknown", ""),
        ];
        let counts = HashMap::from([("2401.00001".to_string(), 150), ("2401.00002".to_string(), 3)]);
        let kept = filter_by_citations(papers, &counts, 100);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "cited");
    }
}
