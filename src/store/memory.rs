//! In-process store with the same merge semantics as the SQLite one

use super::{utcnow, GraphStore};
use crate::config::SessionConfig;
use crate::error::{RankError, Result};
use crate::types::{Explain, FeedbackEntry, SessionItem, SessionRecord, Video};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    videos: HashMap<String, Video>,
    edges: HashMap<(String, String), u64>,
    seen: HashMap<String, u64>,
    taste: HashMap<String, f64>,
    sessions: HashMap<String, SessionRecord>,
    items: HashMap<String, BTreeMap<usize, SessionItem>>,
    feedback: Vec<FeedbackEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| RankError::Lock)
    }
}

impl GraphStore for MemoryStore {
    fn upsert_video(&self, video_id: &str, url: &str, title: Option<&str>, tags: &[String]) -> Result<()> {
        let mut inner = self.inner()?;
        let video = inner.videos.entry(video_id.to_string()).or_insert_with(|| Video {
            video_id: video_id.to_string(),
            secondary_id: None,
            url: url.to_string(),
            title: None,
            tags: vec![],
        });
        video.url = url.to_string();
        if let Some(title) = title {
            video.title = Some(title.to_string());
        }
        if !tags.is_empty() {
            video.tags = tags.to_vec();
        }
        Ok(())
    }

    fn set_secondary_id(&self, video_id: &str, secondary_id: &str) -> Result<()> {
        if let Some(video) = self.inner()?.videos.get_mut(video_id) {
            video.secondary_id = Some(secondary_id.to_string());
        }
        Ok(())
    }

    fn get_video(&self, video_id: &str) -> Result<Option<Video>> {
        Ok(self.inner()?.videos.get(video_id).cloned())
    }

    fn incr_edge(&self, from_id: &str, to_id: &str, inc: u64) -> Result<()> {
        *self
            .inner()?
            .edges
            .entry((from_id.to_string(), to_id.to_string()))
            .or_insert(0) += inc;
        Ok(())
    }

    fn get_edge_weight(&self, from_id: &str, to_id: &str) -> Result<u64> {
        let inner = self.inner()?;
        Ok(inner
            .edges
            .get(&(from_id.to_string(), to_id.to_string()))
            .copied()
            .unwrap_or(0))
    }

    fn get_incoming_weight(&self, to_id: &str, from_ids: &[String]) -> Result<u64> {
        let inner = self.inner()?;
        Ok(from_ids
            .iter()
            .filter_map(|from| inner.edges.get(&(from.clone(), to_id.to_string())))
            .sum())
    }

    fn incr_seen(&self, video_id: &str, inc: u64) -> Result<()> {
        *self.inner()?.seen.entry(video_id.to_string()).or_insert(0) += inc;
        Ok(())
    }

    fn get_seen_count(&self, video_id: &str) -> Result<u64> {
        Ok(self.inner()?.seen.get(video_id).copied().unwrap_or(0))
    }

    fn get_taste(&self) -> Result<HashMap<String, f64>> {
        Ok(self.inner()?.taste.clone())
    }

    fn bump_taste(&self, tags: &[String], amount: f64) -> Result<()> {
        let mut inner = self.inner()?;
        for tag in tags {
            *inner.taste.entry(tag.clone()).or_insert(0.0) += amount;
        }
        Ok(())
    }

    fn create_session(&self, session_id: &str, seed_url: &str, config: &SessionConfig) -> Result<()> {
        let mut inner = self.inner()?;
        if inner.sessions.contains_key(session_id) {
            return Err(RankError::InvalidRequest(format!("session {} already exists", session_id)));
        }
        inner.sessions.insert(
            session_id.to_string(),
            SessionRecord {
                session_id: session_id.to_string(),
                seed_url: seed_url.to_string(),
                created_at: utcnow(),
                config: config.clone(),
            },
        );
        Ok(())
    }

    fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.inner()?.sessions.get(session_id).cloned())
    }

    fn add_session_item(
        &self,
        session_id: &str,
        idx: usize,
        video_id: &str,
        url: &str,
        title: Option<&str>,
        explain: &Explain,
    ) -> Result<()> {
        let mut inner = self.inner()?;
        let items = inner.items.entry(session_id.to_string()).or_default();
        if items.contains_key(&idx) {
            return Err(RankError::InvalidRequest(format!(
                "session {} already has an item at idx {}",
                session_id, idx
            )));
        }
        items.insert(
            idx,
            SessionItem {
                idx,
                video_id: video_id.to_string(),
                url: url.to_string(),
                title: title.map(str::to_string),
                explain: explain.clone(),
            },
        );
        Ok(())
    }

    fn list_session_items(&self, session_id: &str) -> Result<Vec<SessionItem>> {
        Ok(self
            .inner()?
            .items
            .get(session_id)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default())
    }

    fn add_feedback(&self, session_id: &str, video_id: &str, action: &str) -> Result<()> {
        self.inner()?.feedback.push(FeedbackEntry {
            session_id: session_id.to_string(),
            video_id: video_id.to_string(),
            action: action.to_string(),
            created_at: utcnow(),
        });
        Ok(())
    }

    fn list_feedback(&self, session_id: &str) -> Result<Vec<FeedbackEntry>> {
        Ok(self
            .inner()?
            .feedback
            .iter()
            .filter(|f| f.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tags_never_erase() {
        let store = MemoryStore::new();
        store.upsert_video("v", "https://a.test/v", Some("T"), &["a".to_string()]).unwrap();
        store.upsert_video("v", "https://a.test/v2", None, &[]).unwrap();
        let v = store.get_video("v").unwrap().unwrap();
        assert_eq!(v.tags, vec!["a".to_string()]);
        assert_eq!(v.title.as_deref(), Some("T"));
        assert_eq!(v.url, "https://a.test/v2");
    }

    #[test]
    fn test_incoming_weight_sums_sources() {
        let store = MemoryStore::new();
        store.incr_edge("a", "x", 2).unwrap();
        store.incr_edge("b", "x", 3).unwrap();
        store.incr_edge("c", "x", 7).unwrap();
        let from = vec!["a".to_string(), "b".to_string(), "zz".to_string()];
        assert_eq!(store.get_incoming_weight("x", &from).unwrap(), 5);
    }
}
