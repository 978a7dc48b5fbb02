//! Persisted candidate graph: videos, weighted related edges, visit counts,
//! the global taste profile, and session/feedback logs.
//!
//! Every operation is atomic on its own. Nothing spans an engine iteration, so
//! concurrent sessions may interleave edge and seen-count increments.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::types::{Explain, FeedbackEntry, SessionItem, SessionRecord, Video};
use std::collections::HashMap;
use std::sync::Arc;

/// Storage abstraction injected into the session engine
pub trait GraphStore: Send + Sync {
    /// Create the row if absent. Otherwise `url` always replaces, `title` only
    /// when `Some`, `tags` only when non-empty.
    fn upsert_video(&self, video_id: &str, url: &str, title: Option<&str>, tags: &[String]) -> Result<()>;

    /// Record a secondary id for an existing video; never clears one.
    fn set_secondary_id(&self, video_id: &str, secondary_id: &str) -> Result<()>;

    fn get_video(&self, video_id: &str) -> Result<Option<Video>>;

    fn incr_edge(&self, from_id: &str, to_id: &str, inc: u64) -> Result<()>;

    fn get_edge_weight(&self, from_id: &str, to_id: &str) -> Result<u64>;

    /// Sum of edge weights into `to_id` from any of `from_ids`
    fn get_incoming_weight(&self, to_id: &str, from_ids: &[String]) -> Result<u64>;

    fn incr_seen(&self, video_id: &str, inc: u64) -> Result<()>;

    fn get_seen_count(&self, video_id: &str) -> Result<u64>;

    fn get_taste(&self) -> Result<HashMap<String, f64>>;

    /// Add `amount` to every listed tag. No-op for an empty list.
    fn bump_taste(&self, tags: &[String], amount: f64) -> Result<()>;

    fn create_session(&self, session_id: &str, seed_url: &str, config: &SessionConfig) -> Result<()>;

    fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    fn add_session_item(
        &self,
        session_id: &str,
        idx: usize,
        video_id: &str,
        url: &str,
        title: Option<&str>,
        explain: &Explain,
    ) -> Result<()>;

    /// Items ordered by `idx`
    fn list_session_items(&self, session_id: &str) -> Result<Vec<SessionItem>>;

    fn add_feedback(&self, session_id: &str, video_id: &str, action: &str) -> Result<()>;

    fn list_feedback(&self, session_id: &str) -> Result<Vec<FeedbackEntry>>;
}

pub type SharedStore = Arc<dyn GraphStore>;

pub(crate) fn utcnow() -> String {
    chrono::Utc::now().to_rfc3339()
}
