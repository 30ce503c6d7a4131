//! arXiv query construction.
//!
//! Three shapes are built here: a free-text search narrowed by the user's
//! saved preferences, the combined query produced by the advanced filter
//! wizard, and the keyword query behind notification digests.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};

use crate::text::escape;

/// Narrow a free-text query with the user's journals and categories.
///
/// `(base) AND (jr:"J1" OR jr:"J2") AND (cat:a OR cat:b)`, omitting empty parts.
pub fn with_preferences(base: &str, journals: &[String], categories: &[String]) -> String {
    let mut parts = vec![format!("({})", sanitize(base))];
    if !journals.is_empty() {
        let clause = journals
            .iter()
            .map(|j| format!("jr:\"{}\"", sanitize(j)))
            .collect::<Vec<_>>()
            .join(" OR ");
        parts.push(format!("({clause})"));
    }
    if let Some(clause) = category_clause(categories) {
        parts.push(clause);
    }
    parts.join(" AND ")
}

/// Digest query: every keyword, restricted to the given categories.
/// Categories alone are searched as-is; `None` when both are empty.
pub fn notification_query(keywords: &[String], categories: &[String]) -> Option<String> {
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| sanitize(k))
        .filter(|k| !k.is_empty())
        .map(|k| format!("all:\"{k}\""))
        .collect();
    let categories = category_clause(categories);
    match (keywords.is_empty(), categories) {
        (true, None) => None,
        (true, Some(cats)) => Some(cats),
        (false, None) => Some(format!("({})", keywords.join(" AND "))),
        (false, Some(cats)) => Some(format!("({}) AND {cats}", keywords.join(" AND "))),
    }
}

fn category_clause(categories: &[String]) -> Option<String> {
    let cats: Vec<String> = categories
        .iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .map(|c| format!("cat:{c}"))
        .collect();
    (!cats.is_empty()).then(|| format!("({})", cats.join(" OR ")))
}

/// Drop characters that break arXiv's query grammar.
fn sanitize(s: &str) -> String {
    s.replace(['"', '\''], "").trim().to_string()
}

/// How the author filter matches names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorMode {
    /// The full name as a phrase.
    #[default]
    Exact,
    /// Only the last word of the name.
    LastName,
}

/// Broad subject groups offered by the filter wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldGroup {
    Physics,
    ComputerScience,
    Mathematics,
    Biology,
}

impl FieldGroup {
    pub const ALL: [FieldGroup; 4] =
        [FieldGroup::Physics, FieldGroup::ComputerScience, FieldGroup::Mathematics, FieldGroup::Biology];

    /// Short code used in callback data.
    pub fn code(&self) -> &'static str {
        match self {
            FieldGroup::Physics => "physics",
            FieldGroup::ComputerScience => "cs",
            FieldGroup::Mathematics => "math",
            FieldGroup::Biology => "biology",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.code() == code)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FieldGroup::Physics => "⚛️ Physics",
            FieldGroup::ComputerScience => "💻 Computer Science",
            FieldGroup::Mathematics => "📐 Mathematics",
            FieldGroup::Biology => "🧬 Biology",
        }
    }

    fn arxiv_term(&self) -> &'static str {
        match self {
            FieldGroup::Physics => "cat:physics.*",
            FieldGroup::ComputerScience => "cat:cs.*",
            FieldGroup::Mathematics => "cat:math.*",
            FieldGroup::Biology => "cat:q-bio.*",
        }
    }
}

/// Date presets of the filter wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePreset {
    Week,
    Month,
    Year,
}

impl DatePreset {
    pub fn days(&self) -> i64 {
        match self {
            DatePreset::Week => 7,
            DatePreset::Month => 30,
            DatePreset::Year => 365,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DatePreset::Week => "week",
            DatePreset::Month => "month",
            DatePreset::Year => "year",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        [DatePreset::Week, DatePreset::Month, DatePreset::Year]
            .into_iter()
            .find(|p| p.code() == code)
    }
}

/// Constraints accumulated by the advanced search wizard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchFilters {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub author: Option<String>,
    pub author_mode: AuthorMode,
    pub min_citations: Option<u64>,
    pub categories: BTreeSet<FieldGroup>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        *self == SearchFilters::default()
    }

    /// Set the range to the last `preset.days()` days ending today.
    pub fn apply_preset(&mut self, preset: DatePreset, today: NaiveDate) {
        self.date_from = Some(today - Duration::days(preset.days()));
        self.date_to = Some(today);
    }

    /// Toggle a subject group, returning whether it is now selected.
    pub fn toggle_category(&mut self, group: FieldGroup) -> bool {
        if self.categories.remove(&group) {
            false
        } else {
            self.categories.insert(group);
            true
        }
    }

    /// Combined arXiv query, or `None` when no searchable filter is set.
    ///
    /// The citation threshold is not part of the query: arXiv has no citation
    /// data, so it is applied to the results afterwards.
    pub fn to_query(&self) -> Option<String> {
        let mut parts = Vec::new();

        if self.date_from.is_some() || self.date_to.is_some() {
            let from = self
                .date_from
                .map(|d| format!("{}0000", d.format("%Y%m%d")))
                .unwrap_or_else(|| "000001010000".to_string());
            let to = self
                .date_to
                .map(|d| format!("{}2359", d.format("%Y%m%d")))
                .unwrap_or_else(|| "999912312359".to_string());
            parts.push(format!("submittedDate:[{from} TO {to}]"));
        }

        if let Some(author) = self.author.as_deref().map(sanitize).filter(|a| !a.is_empty()) {
            match self.author_mode {
                AuthorMode::Exact => parts.push(format!("au:\"{author}\"")),
                AuthorMode::LastName => {
                    let last = author.split_whitespace().last().unwrap_or(&author).to_string();
                    parts.push(format!("au:{last}"));
                }
            }
        }

        if !self.categories.is_empty() {
            let clause = self
                .categories
                .iter()
                .map(|g| g.arxiv_term())
                .collect::<Vec<_>>()
                .join(" OR ");
            parts.push(format!("({clause})"));
        }

        (!parts.is_empty()).then(|| parts.join(" AND "))
    }

    /// HTML summary of the active filters.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        match (self.date_from, self.date_to) {
            (None, None) => {}
            (from, to) => lines.push(format!(
                "📅 <b>Date:</b> {} → {}",
                from.map(|d| d.to_string()).unwrap_or_else(|| "any".into()),
                to.map(|d| d.to_string()).unwrap_or_else(|| "any".into()),
            )),
        }
        if let Some(author) = &self.author {
            let mode = match self.author_mode {
                AuthorMode::Exact => "exact",
                AuthorMode::LastName => "last name",
            };
            lines.push(format!("👤 <b>Author:</b> {} ({mode})", escape(author)));
        }
        if let Some(n) = self.min_citations {
            lines.push(format!("📊 <b>Min citations:</b> {n}"));
        }
        if !self.categories.is_empty() {
            let labels = self.categories.iter().map(|g| g.label()).collect::<Vec<_>>().join(", ");
            lines.push(format!("🏷️ <b>Categories:</b> {labels}"));
        }
        if lines.is_empty() {
            "No filters set yet.".to_string()
        } else {
            lines.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_with_preferences_plain() {
        assert_eq!(with_preferences("graph neural nets", &[], &[]), "(graph neural nets)");
    }

    #[test]
    fn test_with_preferences_full() {
        let q = with_preferences(
            "diffusion",
            &["Nature".to_string(), "JMLR".to_string()],
            &["cs.CV".to_string(), "cs.LG".to_string()],
        );
        assert_eq!(q, "(diffusion) AND (jr:\"Nature\" OR jr:\"JMLR\") AND (cat:cs.CV OR cat:cs.LG)");
    }

    #[test]
    fn test_with_preferences_strips_quotes() {
        assert_eq!(with_preferences("\"quoted\" it's", &[], &[]), "(quoted its)");
    }

    #[test]
    fn test_notification_query() {
        assert_eq!(notification_query(&[], &[]), None);
        assert_eq!(notification_query(&[], &["cs.AI".to_string()]).as_deref(), Some("(cat:cs.AI)"));
        assert_eq!(
            notification_query(&["llm".to_string(), "rlhf".to_string()], &[]).as_deref(),
            Some("(all:\"llm\" AND all:\"rlhf\")")
        );
        assert_eq!(
            notification_query(&["graph".to_string(), "transformer".to_string()], &["cs.LG".to_string()])
                .as_deref(),
            Some("(all:\"graph\" AND all:\"transformer\") AND (cat:cs.LG)")
        );
        assert_eq!(
            notification_query(&["llm".to_string()], &["cs.CL".to_string()]).as_deref(),
            Some("(all:\"llm\") AND (cat:cs.CL)")
        );
    }

    #[test]
    fn test_empty_filters_have_no_query() {
        let filters = SearchFilters::default();
        assert!(filters.is_empty());
        assert_eq!(filters.to_query(), None);
        assert_eq!(filters.summary(), "No filters set yet.");
    }

    #[test]
    fn test_citations_alone_have_no_query() {
        let filters = SearchFilters { min_citations: Some(50), ..Default::default() };
        assert!(!filters.is_empty());
        assert_eq!(filters.to_query(), None);
    }

    #[test]
    fn test_full_filter_query() {
        let mut filters = SearchFilters::default();
        filters.apply_preset(DatePreset::Week, date("2024-03-15"));
        filters.author = Some("Yoshua Bengio".to_string());
        filters.toggle_category(FieldGroup::ComputerScience);
        filters.toggle_category(FieldGroup::Mathematics);
        assert_eq!(
            filters.to_query().unwrap(),
            "submittedDate:[202403080000 TO 202403152359] AND au:\"Yoshua Bengio\" AND (cat:cs.* OR cat:math.*)"
        );
    }

    #[test]
    fn test_last_name_mode() {
        let filters = SearchFilters {
            author: Some("Geoffrey E. Hinton".to_string()),
            author_mode: AuthorMode::LastName,
            ..Default::default()
        };
        assert_eq!(filters.to_query().unwrap(), "au:Hinton");
    }

    #[test]
    fn test_open_ended_date_range() {
        let filters = SearchFilters { date_from: Some(date("2023-01-01")), ..Default::default() };
        assert_eq!(filters.to_query().unwrap(), "submittedDate:[202301010000 TO 999912312359]");
    }

    #[test]
    fn test_toggle_category() {
        let mut filters = SearchFilters::default();
        assert!(filters.toggle_category(FieldGroup::Biology));
        assert!(!filters.toggle_category(FieldGroup::Biology));
        assert!(filters.categories.is_empty());
    }

    #[test]
    fn test_presets() {
        let today = date("2024-12-31");
        for (preset, from) in [
            (DatePreset::Week, "2024-12-24"),
            (DatePreset::Month, "2024-12-01"),
            (DatePreset::Year, "2024-01-01"),
        ] {
            let mut filters = SearchFilters::default();
            filters.apply_preset(preset, today);
            assert_eq!(filters.date_from, Some(date(from)), "{preset:?}");
            assert_eq!(filters.date_to, Some(today));
        }
    }

    #[test]
    fn test_summary_lists_filters() {
        let mut filters = SearchFilters {
            author: Some("Curie".to_string()),
            min_citations: Some(100),
            ..Default::default()
        };
        filters.toggle_category(FieldGroup::Physics);
        let summary = filters.summary();
        assert!(summary.contains("Curie (exact)"));
        assert!(summary.contains("Min citations:</b> 100"));
        assert!(summary.contains("Physics"));
    }
}
