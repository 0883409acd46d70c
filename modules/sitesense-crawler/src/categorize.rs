//! Fast page categorization from URL patterns and keyword matches.
//!
//! Assigns each fetched page to one of the fixed [`PageCategory`] variants
//! with a confidence in [0, 1]. URL path patterns carry most of the weight;
//! keyword hits in the title and body refine the score. Pages matching
//! nothing are left uncategorized.

use std::sync::LazyLock;

use regex::Regex;

use sitesense_core::PageCategory;

static URL_PATTERNS: LazyLock<Vec<(PageCategory, Regex)>> = LazyLock::new(|| {
    let table: [(PageCategory, &str); 4] = [
        (
            PageCategory::Content,
            r"/(blog|article|post|news|story|video|podcast|case-stud|product|service|solution|about|team|press|resources|guide|tutorial|insight)",
        ),
        (
            PageCategory::Hub,
            r"(^/$|/(home|index|archive|category|tag|topic|sitemap|directory|browse|search|landing|welcome))",
        ),
        (
            PageCategory::Recruitment,
            r"/(career|job|position|vacanc|opening|apply|hiring|recruit|join-us|culture|benefits)",
        ),
        (
            PageCategory::Interactable,
            r"/(contact|support|help|faq|checkout|cart|signup|register|login|account|dashboard|tool|calculator|form|survey|quote|demo|trial|subscribe|newsletter)",
        ),
    ];
    table
        .into_iter()
        .map(|(cat, pattern)| (cat, Regex::new(pattern).expect("valid regex")))
        .collect()
});

const KEYWORDS: [(PageCategory, &[&str]); 4] = [
    (
        PageCategory::Content,
        &[
            "blog", "article", "news", "case study", "product", "service", "guide", "tutorial",
            "whitepaper", "insight", "learn",
        ],
    ),
    (
        PageCategory::Hub,
        &[
            "home", "archive", "sitemap", "directory", "browse", "category", "navigation",
            "overview",
        ],
    ),
    (
        PageCategory::Recruitment,
        &[
            "career", "job", "hiring", "vacancy", "apply", "benefits", "culture", "join our team",
            "recruitment",
        ],
    ),
    (
        PageCategory::Interactable,
        &[
            "contact", "support", "faq", "checkout", "sign up", "register", "login", "subscribe",
            "newsletter", "get a quote",
        ],
    ),
];

/// Classify a page. Returns the winning category and its confidence, or
/// `None` when neither the URL nor the text matches anything.
pub fn categorize(url: &str, title: &str, markdown: &str) -> Option<(PageCategory, f32)> {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_default();
    let text = format!("{} {}", title, markdown).to_lowercase();

    let mut best: Option<(PageCategory, f32)> = None;

    for (category, pattern) in URL_PATTERNS.iter() {
        let url_hit = pattern.is_match(&path);
        let keyword_hits = KEYWORDS
            .iter()
            .find(|(cat, _)| cat == category)
            .map(|(_, words)| words.iter().filter(|w| text.contains(**w)).count())
            .unwrap_or(0);

        let url_score = if url_hit { 1.0 } else { 0.0 };
        let keyword_score = (keyword_hits as f32 / 3.0).min(1.0);
        let confidence = 0.6 * url_score + 0.4 * keyword_score;

        if confidence > 0.0 && best.map_or(true, |(_, c)| confidence > c) {
            best = Some((*category, confidence));
        }
    }

    best
}
