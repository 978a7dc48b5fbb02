//! ranked-channel - crawl-driven ranked sessions
//!
//! Builds a ranked sequence of content items by walking a live site:
//! - Persistent weighted graph of related-item links, visit counts and taste
//! - Multi-signal scoring (related frequency, taste similarity, diversity, novelty)
//! - Temperature-controlled softmax exploration over the top-M candidates
//! - Score explanations recorded with every session item

pub mod config;
pub mod error;
pub mod extractor;
pub mod feedback;
pub mod metrics;
pub mod player_url;
pub mod policy;
pub mod scoring;
pub mod server;
pub mod session_engine;
pub mod store;
pub mod types;

pub use config::{SessionConfig, Settings};
pub use error::{RankError, Result};
pub use extractor::{Extractor, HttpExtractor, PageSnapshot, RelatedLink, VideoIdentity};
pub use feedback::{apply_feedback, FeedbackAction};
pub use policy::ExplorationPolicy;
pub use session_engine::{SessionEngine, SharedSessionEngine};
pub use store::{GraphStore, MemoryStore, SqliteStore};
pub use types::*;
