use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse page classification, stored alongside each page record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageCategory {
    /// Articles, product/service pages, media
    Content,
    /// Home pages, archives, navigation and landing pages
    Hub,
    /// Careers, job listings, company culture
    Recruitment,
    /// Forms, checkouts, tools, account surfaces
    Interactable,
}

impl PageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Hub => "hub",
            Self::Recruitment => "recruitment",
            Self::Interactable => "interactable",
        }
    }

    pub const ALL: [PageCategory; 4] = [
        Self::Content,
        Self::Hub,
        Self::Recruitment,
        Self::Interactable,
    ];
}

impl std::fmt::Display for PageCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PageCategory {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "content" => Ok(Self::Content),
            "hub" => Ok(Self::Hub),
            "recruitment" => Ok(Self::Recruitment),
            "interactable" => Ok(Self::Interactable),
            _ => Err(anyhow::anyhow!("Unknown page category: {}", s)),
        }
    }
}

/// A freshly crawled page, ready for upsert. `url` is canonical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPage {
    pub url: String,
    pub title: Option<String>,
    /// Clean markdown text from the scrape oracle.
    pub clean_text: String,
    /// Raw markup as returned by the oracle.
    pub raw_html: Option<String>,
    /// Opaque metadata blob from the oracle.
    pub metadata: serde_json::Value,
    pub category: Option<PageCategory>,
    pub category_confidence: Option<f32>,
}

impl NewPage {
    pub fn new(url: impl Into<String>, clean_text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            clean_text: clean_text.into(),
            raw_html: None,
            metadata: serde_json::Value::Null,
            category: None,
            category_confidence: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_raw_html(mut self, html: impl Into<String>) -> Self {
        self.raw_html = Some(html.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_category(mut self, category: PageCategory, confidence: f32) -> Self {
        self.category = Some(category);
        self.category_confidence = Some(confidence);
        self
    }
}

/// What an upsert did with a page record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First time this URL was seen
    Created,
    /// Content fingerprint changed; record rewritten
    Updated,
    /// Fingerprint identical; only last_seen bumped
    Unchanged,
}

/// A page the embed phase still has to process.
#[derive(Debug, Clone)]
pub struct EmbedTarget {
    pub url: String,
    pub clean_text: String,
    pub checksum_changed_at: Option<DateTime<Utc>>,
    pub embedded_at: Option<DateTime<Utc>>,
}

/// One chunk of a page with its vector, ready for bulk insert.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk_index: i32,
    pub text: String,
    pub vector: Vec<f32>,
}

/// A ranked similarity-search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub url: String,
    pub snippet: String,
    /// Normalized similarity in [0, 1]; 1.0 is an exact match.
    pub score: f64,
}

/// Index-wide counts for the `stats` command.
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    pub total_pages: i64,
    pub embedded_pages: i64,
    pub total_chunks: i64,
    pub categories: Vec<CategoryCount>,
}

#[derive(Debug, Clone)]
pub struct CategoryCount {
    pub category: String,
    pub pages: i64,
    pub avg_confidence: Option<f64>,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Index Status ===")?;
        writeln!(f, "Total pages:    {}", self.total_pages)?;
        writeln!(f, "Embedded pages: {}", self.embedded_pages)?;
        writeln!(f, "Total chunks:   {}", self.total_chunks)?;
        if !self.categories.is_empty() {
            writeln!(f, "\nCategories:")?;
            for c in &self.categories {
                match c.avg_confidence {
                    Some(conf) => writeln!(
                        f,
                        "  {:<14} {} pages (avg confidence {:.2})",
                        c.category, c.pages, conf
                    )?,
                    None => writeln!(f, "  {:<14} {} pages", c.category, c.pages)?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn category_round_trips_through_str() {
        for cat in PageCategory::ALL {
            assert_eq!(PageCategory::from_str(cat.as_str()).unwrap(), cat);
        }
        assert!(PageCategory::from_str("blog").is_err());
    }

    #[test]
    fn new_page_builders() {
        let page = NewPage::new("https://example.com", "# Hi")
            .with_title("Hi")
            .with_category(PageCategory::Content, 0.8);
        assert_eq!(page.title.as_deref(), Some("Hi"));
        assert_eq!(page.category, Some(PageCategory::Content));
        assert_eq!(page.category_confidence, Some(0.8));
    }
}
