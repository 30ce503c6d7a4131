//! Text similarity and topic extraction for paper comparison.

use std::collections::{HashMap, HashSet};

/// Function words long enough to survive the length cut but carrying no topic.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "about", "above", "after",
    "again", "among", "being", "between", "could", "other", "should", "their", "there", "these",
    "those", "through", "where", "which", "while", "within", "without", "would",
];

/// Ratcliff/Obershelp similarity in `[0, 1]`: twice the number of matching
/// characters over the total length, where matches are found by repeatedly
/// taking the longest common block and recursing on both sides of it.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut stack = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = stack.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            stack.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            stack.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(start_a, start_b, len)`.
fn longest_match(a: &[char], b: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];
    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo + 1;
            cur[col] = if a[i] == b[j] { prev[col - 1] + 1 } else { 0 };
            if cur[col] > best.2 {
                let k = cur[col];
                best = (i + 1 - k, j + 1 - k, k);
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    best
}

/// Mean pairwise similarity of lower-cased texts. A single text scores 1.0.
pub fn mean_similarity(texts: &[&str]) -> f64 {
    let lowered: Vec<String> = texts.iter().map(|t| t.to_lowercase()).collect();
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for i in 0..lowered.len() {
        for j in i + 1..lowered.len() {
            sum += ratio(&lowered[i], &lowered[j]);
            pairs += 1;
        }
    }
    if pairs == 0 { 1.0 } else { sum / pairs as f64 }
}

/// The `n` most frequent words longer than four characters, excluding stop
/// words. Ties are broken alphabetically.
pub fn extract_topics(text: &str, n: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for word in text.split_whitespace() {
        let word = word
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if word.chars().count() > 4 && !STOP_WORDS.contains(&word.as_str()) {
            *counts.entry(word).or_default() += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(w, _)| w).collect()
}

/// Topics present in every list, in the order of the first list.
pub fn common_topics(lists: &[Vec<String>]) -> Vec<String> {
    let Some((first, rest)) = lists.split_first() else {
        return Vec::new();
    };
    first
        .iter()
        .filter(|t| rest.iter().all(|l| l.contains(t)))
        .cloned()
        .collect()
}

/// For each list, the topics no other list contains.
pub fn unique_topics(lists: &[Vec<String>]) -> Vec<Vec<String>> {
    (0..lists.len())
        .map(|i| {
            let others: HashSet<&String> = lists
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .flat_map(|(_, l)| l.iter())
                .collect();
            lists[i].iter().filter(|t| !others.contains(t)).cloned().collect()
        })
        .collect()
}
