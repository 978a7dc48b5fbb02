//! Core type definitions for ranked session building

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::SessionConfig;

const SYNTHETIC_PREFIX: &str = "url:";

/// Identity of a video, either supplied by the page or derived from its canonical URL
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum VideoKey {
    Known(String),
    Synthetic(String), // canonical URL
}

impl VideoKey {
    pub fn known(id: impl Into<String>) -> Self {
        VideoKey::Known(id.into())
    }

    pub fn synthetic(canonical_url: impl Into<String>) -> Self {
        VideoKey::Synthetic(canonical_url.into())
    }

    /// Key for an id published by a page, falling back to the canonical URL.
    /// Ids that would collide with the synthetic namespace are not trusted.
    pub fn from_page(id: Option<&str>, canonical_url: &str) -> Self {
        match id.map(str::trim).filter(|id| Self::is_stable_id(id)) {
            Some(id) => VideoKey::Known(id.to_string()),
            None => VideoKey::Synthetic(canonical_url.to_string()),
        }
    }

    pub fn is_stable_id(id: &str) -> bool {
        !id.is_empty() && !id.starts_with(SYNTHETIC_PREFIX)
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, VideoKey::Synthetic(_))
    }

    /// Primary key used by the store
    pub fn storage_key(&self) -> String {
        match self {
            VideoKey::Known(id) => id.clone(),
            VideoKey::Synthetic(url) => format!("{}{}", SYNTHETIC_PREFIX, url),
        }
    }

    pub fn from_storage_key(key: &str) -> Self {
        match key.strip_prefix(SYNTHETIC_PREFIX) {
            Some(url) => VideoKey::Synthetic(url.to_string()),
            None => VideoKey::Known(key.to_string()),
        }
    }
}

impl fmt::Display for VideoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

impl From<VideoKey> for String {
    fn from(key: VideoKey) -> Self {
        key.storage_key()
    }
}

impl From<String> for VideoKey {
    fn from(key: String) -> Self {
        VideoKey::from_storage_key(&key)
    }
}

/// Persisted video metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub video_id: String,
    pub secondary_id: Option<String>,
    pub url: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub related: f64,
    pub sim: f64,
    pub div: f64,
    pub novelty: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            related: 0.45,
            sim: 0.45,
            div: 0.35,
            novelty: 0.15,
        }
    }
}

/// Score components computed for one candidate in one step
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub score: f64,
    pub freq: u32,      // raw related-link frequency this session
    pub freq_norm: f64, // normalized across the step's batch
    pub sim: f64,
    pub div: f64,
    pub novelty: f64,
}

/// A discovered, not-yet-picked video with its scores
#[derive(Debug, Clone)]
pub struct Candidate {
    pub key: VideoKey,
    pub url: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub secondary_id: Option<String>,
    pub breakdown: ScoreBreakdown,
}

impl Candidate {
    pub fn score(&self) -> f64 {
        self.breakdown.score
    }
}

/// Why an item ended up in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Explain {
    /// The seed page, never scored
    Seed { tags: Vec<String> },
    /// Chosen by the exploration policy in the previous step
    Chosen {
        tags: Vec<String>,
        breakdown: ScoreBreakdown,
    },
}

impl Explain {
    pub fn breakdown(&self) -> Option<&ScoreBreakdown> {
        match self {
            Explain::Seed { .. } => None,
            Explain::Chosen { breakdown, .. } => Some(breakdown),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub seed_url: String,
    pub created_at: String,
    pub config: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionItem {
    pub idx: usize,
    pub video_id: String,
    pub url: String,
    pub title: Option<String>,
    pub explain: Explain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub session_id: String,
    pub video_id: String,
    pub action: String,
    pub created_at: String,
}

/// Request to build one session
#[derive(Debug, Clone, Deserialize)]
pub struct SessionRequest {
    pub seed_url: String,
    pub n: Option<usize>,
    #[serde(default = "default_profile")]
    pub profile: String,
}

fn default_profile() -> String {
    "discovery".to_string()
}

impl SessionRequest {
    pub fn new(seed_url: impl Into<String>, n: Option<usize>) -> Self {
        Self {
            seed_url: seed_url.into(),
            n,
            profile: default_profile(),
        }
    }
}

/// One entry of the produced session
#[derive(Debug, Clone, Serialize)]
pub struct SessionResultItem {
    pub idx: usize,
    pub id: String,
    pub secondary_id: Option<String>,
    pub url: String,
    pub play_url: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub creator: Option<String>,
    pub score: Option<f64>,
    pub freq: Option<u32>,
    pub sim: Option<f64>,
    pub div: Option<f64>,
    pub novelty: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionDiagnostics {
    pub tag_entropy: f64,
    pub creator_dominance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub session_id: String,
    pub seed_url: String,
    pub created_at: String,
    pub profile: String,
    pub items: Vec<SessionResultItem>,
    pub metrics: SessionDiagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_ids_never_enter_the_synthetic_namespace() {
        let key = VideoKey::from_page(Some("url:https://x.test/a"), "https://x.test/b");
        assert_eq!(key, VideoKey::synthetic("https://x.test/b"));
        assert!(key.is_synthetic());

        assert_eq!(VideoKey::from_page(Some(" 42 "), "https://x.test/b"), VideoKey::known("42"));
        assert_eq!(VideoKey::from_page(Some(""), "https://x.test/b").storage_key(), "url:https://x.test/b");
        assert_eq!(VideoKey::from_page(None, "https://x.test/b").storage_key(), "url:https://x.test/b");
    }

    #[test]
    fn test_storage_key_round_trip() {
        for key in [VideoKey::known("42"), VideoKey::synthetic("https://x.test/a?b=1")] {
            assert_eq!(VideoKey::from_storage_key(&key.storage_key()), key);
        }
    }
}
