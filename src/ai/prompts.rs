//! Prompt builders.

use crate::paper::Paper;

pub fn summary(paper: &Paper) -> String {
    format!(
        "Summarize this research paper clearly and engagingly.\n\n\
         Title: {}\n\
         Authors: {}\n\n\
         Abstract:\n{}\n\n\
         Cover:\n\
         1. The main research objective\n\
         2. The key methodology\n\
         3. The most important findings\n\
         4. Real-world impact\n\
         5. What is novel about it\n\n\
         Keep it informative but accessible to a general audience. \
         Use plain text with simple bullet points, no markdown headings.",
        paper.title,
        paper.authors.join(", "),
        paper.summary,
    )
}

pub fn question(paper: &Paper, question: &str) -> String {
    format!(
        "You are answering a question about this research paper.\n\n\
         Title: {}\n\
         Abstract: {}\n\n\
         Question: {}\n\n\
         Rules:\n\
         1. Be accurate and specific.\n\
         2. Prefer information from the paper. If the paper does not answer it, \
         answer from general knowledge but stay within the paper's ideas and say so.\n\
         3. Use simple language without losing technical accuracy.\n\
         4. Quote the abstract when it helps.\n\
         5. Keep a friendly, professional tone.",
        paper.title, paper.summary, question,
    )
}

pub fn comparison(papers: &[Paper]) -> String {
    let mut prompt = String::from("Compare the following research papers.\n");
    for (i, paper) in papers.iter().enumerate() {
        prompt.push_str(&format!(
            "\nPaper {}:\nTitle: {}\nAuthors: {}\nPublished: {}\nCategory: {}\nAbstract: {}\n",
            i + 1,
            paper.title,
            paper.authors.join(", "),
            paper.published.format("%Y-%m-%d"),
            paper.primary_category,
            paper.summary,
        ));
    }
    prompt.push_str(
        "\nCover, in clear sections with bullet points:\n\
         1. Methodology: the methods each paper uses, how they differ or align, what is innovative.\n\
         2. Key findings: the main results and how they compare.\n\
         3. Impact: significance, applications, how each advances the field.\n\
         4. Strengths and limitations, including suggested future work.\n\n\
         Keep the whole answer under 4000 characters and focus on what matters most. \
         Use plain text, no markdown headings.",
    );
    prompt
}

/// Expects a bare `YES` or `NO` answer.
pub fn topic_relevance(message: &str) -> String {
    format!(
        "Decide whether this message is about an academic, scientific or research topic.\n\
         Message: \"{message}\"\n\n\
         Reply with only YES if it is, or NO if it is not."
    )
}

pub fn academic_chat(message: &str) -> String {
    format!(
        "You are PaperPilot, a research-focused assistant. Respond to:\n\n{message}\n\n\
         Guidelines:\n\
         - Be scientifically accurate.\n\
         - Keep a scholarly but engaging tone.\n\
         - Bring in relevant scientific concepts and general academic knowledge.\n\
         - Be clear and educational, and admit uncertainty.\n\
         Use plain text, no markdown headings."
    )
}

/// Interpret the relevance classifier's answer.
pub fn is_yes(answer: &str) -> bool {
    answer
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .eq_ignore_ascii_case("yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paper::sample_paper;

    #[test]
    fn test_is_yes() {
        assert!(is_yes("YES"));
        assert!(is_yes(" yes.\n"));
        assert!(!is_yes("NO"));
        assert!(!is_yes("Yes, because it is about physics"));
    }

    #[test]
    fn test_comparison_numbers_papers() {
        let papers = vec![sample_paper("1", "First", "a"), sample_paper("2", "Second", "b")];
        let prompt = comparison(&papers);
        assert!(prompt.contains("Paper 1:\nTitle: First"));
        assert!(prompt.contains("Paper 2:\nTitle: Second"));
        assert!(prompt.contains("under 4000 characters"));
    }

    #[test]
    fn test_question_includes_context() {
        let paper = sample_paper("1", "Graph Nets", "We propose graph nets.");
        let prompt = question(&paper, "What is proposed?");
        assert!(prompt.contains("Graph Nets"));
        assert!(prompt.contains("We propose graph nets."));
        assert!(prompt.contains("Question: What is proposed?"));
    }
}
