//! arXiv Atom API client.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use feed_rs::parser;
use regex::Regex;
use tracing::{debug, info};

use super::{Paper, PaperSource, SortBy, SourceError};
use crate::text::squash_whitespace;

const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";
const ARXIV_PDF_URL: &str = "https://arxiv.org/pdf";

static ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{4}\.\d{4,5}|[a-z][a-z\-]*(?:\.[A-Z]{2})?/\d{7})(?:v\d+)?$").expect("static regex")
});

pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivClient {
    pub fn new() -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("paperpilot/0.1")
            .build()?;
        Ok(Self { client, base_url: ARXIV_API_URL.to_string() })
    }

    async fn query(&self, url: &str) -> Result<Vec<Paper>, SourceError> {
        debug!("arXiv request: {url}");
        let response = self
            .client
            .get(url)
            .header("Accept", "application/atom+xml")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Api { status: status.as_u16(), body });
        }

        let bytes = response.bytes().await?;
        parse_feed(&bytes)
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    async fn search(&self, query: &str, max_results: u32, sort: SortBy) -> Result<Vec<Paper>, SourceError> {
        let url = format!(
            "{}?search_query={}&start=0&max_results={}&sortBy={}&sortOrder=descending",
            self.base_url,
            urlencoding::encode(query),
            max_results,
            sort.as_str(),
        );
        let papers = self.query(&url).await?;
        info!("🔎 arXiv search \"{}\" → {} result(s)", query, papers.len());
        Ok(papers)
    }

    async fn fetch(&self, id: &str) -> Result<Option<Paper>, SourceError> {
        let url = format!("{}?id_list={}", self.base_url, urlencoding::encode(id));
        Ok(self.query(&url).await?.into_iter().next())
    }

    async fn download_pdf(&self, paper: &Paper) -> Result<Vec<u8>, SourceError> {
        info!("📥 Downloading PDF {}", paper.pdf_url);
        let response = self.client.get(&paper.pdf_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Api { status: status.as_u16(), body: String::new() });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Parse an arXiv Atom response. Error entries the API returns for bad ids are skipped.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<Paper>, SourceError> {
    let feed = parser::parse(bytes).map_err(|e| SourceError::Parse(e.to_string()))?;
    Ok(feed.entries.iter().filter_map(parse_entry).collect())
}

fn parse_entry(entry: &feed_rs::model::Entry) -> Option<Paper> {
    let short_id = entry.id.split("/abs/").nth(1)?.trim().to_string();
    if short_id.is_empty() {
        return None;
    }

    let title = entry
        .title
        .as_ref()
        .map(|t| squash_whitespace(&t.content))
        .unwrap_or_default();
    let summary = entry
        .summary
        .as_ref()
        .map(|s| squash_whitespace(&s.content))
        .unwrap_or_default();
    let authors = entry.authors.iter().map(|a| a.name.clone()).collect();
    let categories: Vec<String> = entry.categories.iter().map(|c| c.term.clone()).collect();
    let primary_category = categories.first().cloned().unwrap_or_default();

    let pdf_url = entry
        .links
        .iter()
        .find(|l| l.title.as_deref() == Some("pdf") || l.media_type.as_deref() == Some("application/pdf"))
        .map(|l| l.href.clone())
        .unwrap_or_else(|| format!("{}/{}", ARXIV_PDF_URL, short_id));

    Some(Paper {
        entry_id: entry.id.clone(),
        short_id,
        title,
        authors,
        summary,
        categories,
        primary_category,
        published: entry.published.or(entry.updated).unwrap_or_else(Utc::now),
        pdf_url,
    })
}

/// Normalize user input (bare id, abs or pdf URL) to an arXiv identifier.
pub fn parse_paper_id(input: &str) -> Option<String> {
    let mut id = input.trim();
    for prefix in ["https://", "http://", "www.", "arxiv.org/abs/", "arxiv.org/pdf/", "arXiv:", "arxiv:"] {
        id = id.strip_prefix(prefix).unwrap_or(id);
    }
    let id = id.strip_suffix(".pdf").unwrap_or(id);
    ID_RE.is_match(id).then(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=all:transformers</title>
  <id>http://arxiv.org/api/abc</id>
  <updated>2024-03-02T00:00:00-05:00</updated>
  <entry>
    <id>http://arxiv.org/abs/2403.00001v2</id>
    <updated>2024-03-02T10:00:00Z</updated>
    <published>2024-03-01T09:30:00Z</published>
    <title>Sparse Attention
      for Long Documents</title>
    <summary>  We study sparse attention.
      It works.</summary>
    <author><name>Grace Hopper</name></author>
    <author><name>Alan Turing</name></author>
    <link href="http://arxiv.org/abs/2403.00001v2" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2403.00001v2" rel="related" type="application/pdf"/>
    <arxiv:primary_category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/api/errors#incorrect_id_format_for_bogus</id>
    <title>Error</title>
    <summary>incorrect id format for bogus</summary>
    <updated>2024-03-02T00:00:00-05:00</updated>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_feed() {
        let papers = parse_feed(FEED.as_bytes()).unwrap();
        assert_eq!(papers.len(), 1);
        let paper = &papers[0];
        assert_eq!(paper.short_id, "2403.00001v2");
        assert_eq!(paper.title, "Sparse Attention for Long Documents");
        assert_eq!(paper.summary, "We study sparse attention. It works.");
        assert_eq!(paper.authors, vec!["Grace Hopper", "Alan Turing"]);
        assert_eq!(paper.categories, vec!["cs.CL", "cs.LG"]);
        assert_eq!(paper.primary_category, "cs.CL");
        assert_eq!(paper.pdf_url, "http://arxiv.org/pdf/2403.00001v2");
        assert_eq!(paper.published.day(), 1);
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_feed(b"not xml at all"), Err(SourceError::Parse(_))));
    }

    #[test]
    fn test_parse_paper_id() {
        assert_eq!(parse_paper_id("2301.07041").as_deref(), Some("2301.07041"));
        assert_eq!(parse_paper_id(" 2301.07041v3 ").as_deref(), Some("2301.07041v3"));
        assert_eq!(parse_paper_id("https://arxiv.org/abs/2301.07041").as_deref(), Some("2301.07041"));
        assert_eq!(parse_paper_id("arxiv.org/pdf/2301.07041v1.pdf").as_deref(), Some("2301.07041v1"));
        assert_eq!(parse_paper_id("math.AG/0601001").as_deref(), Some("math.AG/0601001"));
        assert_eq!(parse_paper_id("hep-th/9901001v2").as_deref(), Some("hep-th/9901001v2"));
        assert_eq!(parse_paper_id("not an id"), None);
        assert_eq!(parse_paper_id("2301.07"), None);
    }
}
