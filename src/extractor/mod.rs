//! Page extraction boundary: turns a visited URL into identity, tags, title and related links

pub mod http;
pub mod normalize;

pub use http::HttpExtractor;
pub use normalize::{canonicalize_url, origin, resolve_href};

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Stable identity published by the page itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoIdentity {
    pub id: String,
    pub secondary_id: Option<String>,
}

/// A related-item card found on a page. `url` is absolute and canonical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedLink {
    pub url: String,
    pub title: Option<String>,
    pub video_id: Option<String>,
    pub secondary_id: Option<String>,
}

/// Everything extracted from one visit. Missing elements come back empty/None.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    pub identity: Option<VideoIdentity>,
    pub tags: Vec<String>,
    pub title: Option<String>,
    pub creator: Option<String>,
    pub related: Vec<RelatedLink>,
}

/// Pluggable page extractor. The only suspension point of a session build.
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Load `url` and extract it. Fails only when the page cannot be loaded.
    async fn visit(&self, url: &str) -> Result<PageSnapshot>;
}

pub type SharedExtractor = Arc<dyn Extractor>;

/// Trim, lowercase and de-duplicate, keeping first-seen order
pub fn normalize_tags<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tag in raw {
        let tag = tag.as_ref().trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.clone()) {
            out.push(tag);
        }
    }
    out
}

/// De-duplicate related cards by id, then url, keeping first-seen order
pub fn dedup_related(links: Vec<RelatedLink>) -> Vec<RelatedLink> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| {
            let key = link.video_id.clone().unwrap_or_else(|| link.url.clone());
            seen.insert(key)
        })
        .collect()
}
