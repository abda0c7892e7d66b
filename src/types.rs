use std::{
    collections::{BTreeSet, HashSet},
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("navigation: could not load {url}: {reason}")]
    Navigation { url: String, reason: String },
    #[error("extraction: {0}")]
    Extraction(String),
    #[error("capture: {0}")]
    Capture(String),
    #[error("checkpoint_io: {path:?}: {source}")]
    CheckpointIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("conversion: {0}")]
    Conversion(String),
    #[error("early_termination")]
    EarlyTermination,
}

impl ScraperError {
    pub fn navigation(url: &str, reason: impl ToString) -> ScraperError {
        ScraperError::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn checkpoint_io(path: &Path, source: std::io::Error) -> ScraperError {
        ScraperError::CheckpointIo {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Only navigation failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScraperError::Navigation { .. })
    }
}

/// A named screenshot target on a detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    Full,
    Hero,
    Content,
    Features,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Full, Region::Hero, Region::Content, Region::Features];

    pub fn suffix(&self) -> &'static str {
        match self {
            Region::Full => "full",
            Region::Hero => "hero",
            Region::Content => "content",
            Region::Features => "features",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshots {
    pub full: Option<String>,
    pub content: Option<String>,
    pub features: Option<String>,
    pub hero: Option<String>,
}

impl Screenshots {
    pub fn get(&self, region: Region) -> Option<&String> {
        match region {
            Region::Full => self.full.as_ref(),
            Region::Hero => self.hero.as_ref(),
            Region::Content => self.content.as_ref(),
            Region::Features => self.features.as_ref(),
        }
    }

    pub fn set(&mut self, region: Region, path: Option<String>) {
        match region {
            Region::Full => self.full = path,
            Region::Hero => self.hero = path,
            Region::Content => self.content = path,
            Region::Features => self.features = path,
        }
    }

    /// The screenshot that best represents the tool, hero banner first.
    pub fn representative(&self) -> Option<String> {
        [Region::Hero, Region::Full, Region::Content, Region::Features]
            .iter()
            .find_map(|r| self.get(*r).cloned())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    pub name: String,
    pub category: String,
    pub full_description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub social_links: BTreeSet<String>,
    pub pricing_link: Option<String>,
    pub logo_url: Option<String>,
    pub img_url: Option<String>,
    #[serde(default)]
    pub screenshots: Screenshots,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_traffic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointState {
    #[serde(default)]
    pub processed_ids: HashSet<String>,
    #[serde(default)]
    pub failed_ids: BTreeSet<String>,
    #[serde(default)]
    pub last_page: u32,
    #[serde(default)]
    pub results: Vec<ToolRecord>,
    pub saved_at: DateTime<Utc>,
}

impl Default for CheckpointState {
    fn default() -> Self {
        CheckpointState {
            processed_ids: HashSet::new(),
            failed_ids: BTreeSet::new(),
            last_page: 0,
            results: vec![],
            saved_at: Utc::now(),
        }
    }
}

impl CheckpointState {
    pub fn is_processed(&self, id: &str) -> bool {
        self.processed_ids.contains(id)
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.results.iter().any(|r| r.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Full,
    Test,
    Resume,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    // records in the final output, including ones carried over from a checkpoint
    pub count: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failures: Vec<ToolFailure>,
    pub duration: Duration,
    pub interrupted: bool,
    // a listing page after the first never loaded, later pages were not visited
    pub incomplete: bool,
    pub last_page: u32,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_navigation_is_retryable() {
        assert!(ScraperError::navigation("https://a.b", "timeout").is_retryable());
        assert!(!ScraperError::Extraction("no name".into()).is_retryable());
        assert!(!ScraperError::Capture("hero".into()).is_retryable());
    }

    #[test]
    fn representative_prefers_hero() {
        let mut s = Screenshots::default();
        assert_eq!(s.representative(), None);
        s.set(Region::Full, Some("a_full.png".into()));
        assert_eq!(s.representative().as_deref(), Some("a_full.png"));
        s.set(Region::Hero, Some("a_hero.png".into()));
        assert_eq!(s.representative().as_deref(), Some("a_hero.png"));
    }

    #[test]
    fn optional_supplements_are_omitted_from_json() {
        let r = ToolRecord {
            name: "Foo".into(),
            category: "SEO Tools".into(),
            ..Default::default()
        };
        let v = serde_json::to_value(&r).unwrap();
        assert!(v.get("support_email").is_none());
        assert!(v.get("rating").is_none());
        assert!(v.get("pricing_link").unwrap().is_null());
        assert!(v["screenshots"]["hero"].is_null());
    }

    #[test]
    fn checkpoint_tolerates_missing_fields() {
        let s: CheckpointState =
            serde_json::from_str(r#"{"saved_at":"2024-01-01T00:00:00Z","last_page":3}"#).unwrap();
        assert_eq!(s.last_page, 3);
        assert!(s.processed_ids.is_empty());
        assert!(s.failed_ids.is_empty());
    }
}
