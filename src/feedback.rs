//! Feedback intake: log the event, then shift the taste profile

use crate::error::{RankError, Result};
use crate::store::GraphStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackAction {
    Like,
    Skip,
    Block,
}

impl FeedbackAction {
    /// Amount added to each of the video's tags
    pub fn taste_delta(self) -> f64 {
        match self {
            FeedbackAction::Like => 1.0,
            FeedbackAction::Skip => -0.25,
            FeedbackAction::Block => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackAction::Like => "like",
            FeedbackAction::Skip => "skip",
            FeedbackAction::Block => "block",
        }
    }
}

impl fmt::Display for FeedbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackAction {
    type Err = RankError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "like" => Ok(FeedbackAction::Like),
            "skip" => Ok(FeedbackAction::Skip),
            "block" => Ok(FeedbackAction::Block),
            other => Err(RankError::InvalidFeedbackAction(other.to_string())),
        }
    }
}

/// Append to the feedback log and bump every tag of the referenced video.
/// A video the store has never seen contributes no tags.
pub fn apply_feedback(
    store: &dyn GraphStore,
    session_id: &str,
    video_id: &str,
    action: FeedbackAction,
) -> Result<()> {
    store.add_feedback(session_id, video_id, action.as_str())?;

    let tags = store.get_video(video_id)?.map(|v| v.tags).unwrap_or_default();
    if tags.is_empty() {
        debug!("Feedback {} on {} carries no tags", action, video_id);
        return Ok(());
    }

    store.bump_taste(&tags, action.taste_delta())?;
    info!(
        "Applied {} feedback on {} ({} tags, delta {:+})",
        action,
        video_id,
        tags.len(),
        action.taste_delta()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .upsert_video("v1", "https://a.test/1", None, &["a".to_string(), "b".to_string()])
            .unwrap();
        store
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!(" LIKE ".parse::<FeedbackAction>().unwrap(), FeedbackAction::Like);
        assert_eq!("skip".parse::<FeedbackAction>().unwrap(), FeedbackAction::Skip);
        assert!(matches!(
            "love".parse::<FeedbackAction>(),
            Err(RankError::InvalidFeedbackAction(_))
        ));
    }

    #[test]
    fn test_like_accumulates() {
        let store = seeded_store();
        apply_feedback(&store, "s", "v1", FeedbackAction::Like).unwrap();
        apply_feedback(&store, "s", "v1", FeedbackAction::Like).unwrap();
        let taste = store.get_taste().unwrap();
        assert_eq!(taste["a"], 2.0);
        assert_eq!(taste["b"], 2.0);
        assert_eq!(store.list_feedback("s").unwrap().len(), 2);
    }

    #[test]
    fn test_skip_and_block_deltas() {
        let store = seeded_store();
        apply_feedback(&store, "s", "v1", FeedbackAction::Skip).unwrap();
        assert_eq!(store.get_taste().unwrap()["a"], -0.25);
        apply_feedback(&store, "s", "v1", FeedbackAction::Block).unwrap();
        assert_eq!(store.get_taste().unwrap()["a"], -1.25);
    }

    #[test]
    fn test_unknown_video_is_logged_only() {
        let store = seeded_store();
        apply_feedback(&store, "s", "ghost", FeedbackAction::Like).unwrap();
        assert!(store.get_taste().unwrap().is_empty());
        assert_eq!(store.list_feedback("s").unwrap()[0].video_id, "ghost");
    }
}
