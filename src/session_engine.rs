//! Core SessionEngine: walks a site from a seed page and builds a ranked session

use crate::config::Settings;
use crate::error::{RankError, Result};
use crate::extractor::{canonicalize_url, PageSnapshot, RelatedLink, SharedExtractor};
use crate::metrics::{creator_dominance, entropy};
use crate::player_url::PlayerUrlResolver;
use crate::policy::ExplorationPolicy;
use crate::scoring::{combined_score, diversity_penalty, normalize01, novelty_bonus, sat_log1p, sim_from_taste};
use crate::store::SharedStore;
use crate::types::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

/// Best-known metadata for a discovered video
#[derive(Debug, Clone)]
struct CandidateInfo {
    url: String,
    title: Option<String>,
    tags: Vec<String>,
    secondary_id: Option<String>,
    creator: Option<String>,
}

impl CandidateInfo {
    /// Merge newer observations. Empty tags and missing fields never erase what we know.
    fn merge(&mut self, incoming: CandidateInfo) {
        if !incoming.tags.is_empty() {
            self.tags = incoming.tags;
        }
        if incoming.secondary_id.is_some() {
            self.secondary_id = incoming.secondary_id;
        }
        if incoming.title.is_some() {
            self.title = incoming.title;
        }
        if incoming.creator.is_some() {
            self.creator = incoming.creator;
        }
    }
}

/// Call-scoped state of one session build. Never shared between sessions.
struct Walk {
    order: Vec<VideoKey>, // discovery order, keeps sampling reproducible
    candidates: HashMap<VideoKey, CandidateInfo>,
    related_freq: HashMap<VideoKey, u32>,
    picked: HashSet<VideoKey>,
    recent_tags: Vec<HashSet<String>>,
    window: usize,
}

impl Walk {
    fn new(window: usize) -> Self {
        Self {
            order: Vec::new(),
            candidates: HashMap::new(),
            related_freq: HashMap::new(),
            picked: HashSet::new(),
            recent_tags: Vec::new(),
            window,
        }
    }

    fn merge(&mut self, key: &VideoKey, info: CandidateInfo) {
        match self.candidates.get_mut(key) {
            Some(existing) => existing.merge(info),
            None => {
                self.order.push(key.clone());
                self.candidates.insert(key.clone(), info);
            }
        }
    }

    fn pick(&mut self, key: &VideoKey, tags: &[String]) {
        self.picked.insert(key.clone());
        self.recent_tags.push(tags.iter().cloned().collect());
        while self.recent_tags.len() > self.window {
            self.recent_tags.remove(0);
        }
    }

    fn bump_related(&mut self, key: &VideoKey) {
        *self.related_freq.entry(key.clone()).or_insert(0) += 1;
    }

    fn info(&self, key: &VideoKey) -> Option<&CandidateInfo> {
        self.candidates.get(key)
    }
}

/// Main session engine (thread-safe via Arc)
pub struct SessionEngine {
    store: SharedStore,
    extractor: SharedExtractor,
    settings: Settings,
    player_urls: PlayerUrlResolver,
}

pub type SharedSessionEngine = Arc<SessionEngine>;

impl SessionEngine {
    pub fn new(store: SharedStore, extractor: SharedExtractor, settings: Settings) -> SharedSessionEngine {
        let player_urls =
            PlayerUrlResolver::with_embed(settings.embed_host.as_deref(), settings.embed_template.as_deref());
        Arc::new(Self {
            store,
            extractor,
            settings,
            player_urls,
        })
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Build a session with a freshly seeded RNG
    pub async fn build_session_random(&self, req: SessionRequest) -> Result<SessionResult> {
        let mut rng = StdRng::from_entropy();
        self.build_session(req, &mut rng).await
    }

    /// Main entry point: walk from the seed and return the full ordered session.
    ///
    /// A dead end ends the session early. A navigation failure aborts it; items
    /// recorded before the failure stay persisted.
    pub async fn build_session<R: Rng + Send>(&self, req: SessionRequest, rng: &mut R) -> Result<SessionResult> {
        let n = req.n.unwrap_or(self.settings.default_session_len);
        if n == 0 {
            return Err(RankError::InvalidRequest("session length must be at least 1".to_string()));
        }
        let seed_url = canonicalize_url(&req.seed_url);
        if url::Url::parse(&seed_url).is_err() {
            return Err(RankError::InvalidRequest(format!("seed_url is not an absolute URL: '{}'", req.seed_url)));
        }

        let start = Instant::now();
        let session_id = Uuid::new_v4().simple().to_string();
        info!(
            "Building session {}: seed='{}', n={}, profile='{}', extractor={}",
            session_id,
            seed_url,
            n,
            req.profile,
            self.extractor.name()
        );

        self.store.create_session(&session_id, &seed_url, &self.settings.session_config(&req.profile))?;

        // Taste is read once; feedback arriving mid-session is not observed
        let taste = self.store.get_taste()?;
        let weights = self.settings.weights();
        let policy = ExplorationPolicy::new(self.settings.temperature, self.settings.sample_top_m);
        let throttle = Duration::from_millis(self.settings.throttle_ms);

        let mut walk = Walk::new(self.settings.diversity_window_k);
        let mut current_url = seed_url.clone();
        let mut chosen: Option<(VideoKey, ScoreBreakdown)> = None;

        let mut idx = 0;
        while idx < n {
            // Step 1: Visit and extract
            if idx > 0 && !throttle.is_zero() {
                tokio::time::sleep(throttle).await;
            }
            let page = self.extractor.visit(&current_url).await?;
            let key = VideoKey::from_page(
                page.identity.as_ref().map(|i| i.id.as_str()),
                &canonicalize_url(&current_url),
            );
            if key.is_synthetic() {
                debug!("No stable identity on {}, using {}", current_url, key);
            }

            // An alias URL can land on a video this session already holds
            if let Some((chosen_key, _)) = &chosen {
                if *chosen_key != key && walk.picked.contains(&key) {
                    info!("{} resolved to already picked {}, choosing again", chosen_key, key);
                    walk.picked.insert(chosen_key.clone());
                    let candidates = self.score_candidates(&walk, &taste, &weights)?;
                    if candidates.is_empty() {
                        info!("Session {} hit a dead end after {} items", session_id, idx);
                        break;
                    }
                    let next = policy.sample(&candidates, rng)?;
                    current_url = next.url.clone();
                    chosen = Some((next.key.clone(), next.breakdown));
                    continue;
                }
            }
            let video_id = key.storage_key();

            // Step 2: Persist and fold into the walk
            self.persist_visit(&video_id, &current_url, &page)?;
            walk.merge(
                &key,
                CandidateInfo {
                    url: current_url.clone(),
                    title: page.title.clone(),
                    tags: page.tags.clone(),
                    secondary_id: page.identity.as_ref().and_then(|i| i.secondary_id.clone()),
                    creator: page.creator.clone(),
                },
            );
            walk.pick(&key, &page.tags);
            if let Some((chosen_key, _)) = &chosen {
                // The page may reveal a stable id for a candidate we only knew by URL
                walk.picked.insert(chosen_key.clone());
            }

            // Step 3: Related links grow the graph and the candidate pool
            for link in &page.related {
                let to = VideoKey::from_page(link.video_id.as_deref(), &link.url);
                let info = self.related_info(&to, link, walk.info(&to).is_none())?;
                walk.merge(&to, info);
                self.store.incr_edge(&video_id, &to.storage_key(), 1)?;
                walk.bump_related(&to);
            }

            // Step 4: Score every unpicked candidate
            let candidates = self.score_candidates(&walk, &taste, &weights)?;

            // Step 5: Record the visited item with what justified it
            let explain = match chosen.take() {
                None => Explain::Seed { tags: page.tags.clone() },
                Some((_, breakdown)) => Explain::Chosen {
                    tags: page.tags.clone(),
                    breakdown,
                },
            };
            let title = page.title.clone().or_else(|| walk.info(&key).and_then(|i| i.title.clone()));
            self.store
                .add_session_item(&session_id, idx, &video_id, &current_url, title.as_deref(), &explain)?;

            debug!(
                "Visited idx={} id={} tags={} related={} candidates={}",
                idx,
                video_id,
                page.tags.len(),
                page.related.len(),
                candidates.len()
            );

            if idx + 1 == n {
                break;
            }
            if candidates.is_empty() {
                info!("Session {} hit a dead end after {} items", session_id, idx + 1);
                break;
            }

            // Step 6: Sample the next page
            let next = policy.sample(&candidates, rng)?;
            current_url = next.url.clone();
            chosen = Some((next.key.clone(), next.breakdown));
            idx += 1;
        }

        let result = self.assemble_result(&session_id, &seed_url, &req.profile, &walk)?;
        info!(
            "Session {} complete: {} items in {}ms",
            session_id,
            result.items.len(),
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    fn persist_visit(&self, video_id: &str, url: &str, page: &PageSnapshot) -> Result<()> {
        self.store.upsert_video(video_id, url, page.title.as_deref(), &page.tags)?;
        if let Some(secondary) = page.identity.as_ref().and_then(|i| i.secondary_id.as_deref()) {
            self.store.set_secondary_id(video_id, secondary)?;
        }
        self.store.incr_seen(video_id, 1)
    }

    /// Metadata for a related card. On first sighting, whatever earlier sessions
    /// persisted about the video (tags above all) seeds the entry.
    fn related_info(&self, key: &VideoKey, link: &RelatedLink, first_sighting: bool) -> Result<CandidateInfo> {
        let mut info = CandidateInfo {
            url: link.url.clone(),
            title: link.title.clone(),
            tags: vec![],
            secondary_id: link.secondary_id.clone(),
            creator: None,
        };
        if first_sighting {
            if let Some(stored) = self.store.get_video(&key.storage_key())? {
                info.tags = stored.tags;
                info.title = info.title.or(stored.title);
                info.secondary_id = info.secondary_id.or(stored.secondary_id);
            }
        }
        Ok(info)
    }

    /// One normalization pass over the whole batch, then per-candidate terms
    fn score_candidates(
        &self,
        walk: &Walk,
        taste: &HashMap<String, f64>,
        weights: &ScoreWeights,
    ) -> Result<Vec<Candidate>> {
        let pending: Vec<(&VideoKey, &CandidateInfo, u32)> = walk
            .order
            .iter()
            .filter(|key| !walk.picked.contains(*key))
            .filter_map(|key| {
                let info = walk.candidates.get(key)?;
                Some((key, info, walk.related_freq.get(key).copied().unwrap_or(0)))
            })
            .collect();

        let freq_vals: Vec<f64> = pending.iter().map(|(_, _, freq)| sat_log1p(*freq as f64)).collect();
        let freq_norms = normalize01(&freq_vals);

        let mut candidates = Vec::with_capacity(pending.len());
        for ((key, info, freq), freq_norm) in pending.into_iter().zip(freq_norms) {
            // Unvisited candidates usually have no tags yet
            let sim = sim_from_taste(&info.tags, taste);
            let div = diversity_penalty(&info.tags, &walk.recent_tags);
            let novelty = novelty_bonus(self.store.get_seen_count(&key.storage_key())?);
            let score = combined_score(weights, freq_norm, sim, div, novelty);

            candidates.push(Candidate {
                key: key.clone(),
                url: info.url.clone(),
                title: info.title.clone(),
                tags: info.tags.clone(),
                secondary_id: info.secondary_id.clone(),
                breakdown: ScoreBreakdown {
                    score,
                    freq,
                    freq_norm,
                    sim,
                    div,
                    novelty,
                },
            });
        }
        Ok(candidates)
    }

    /// Persisted items enriched with tags, playback URL and score breakdown
    fn assemble_result(&self, session_id: &str, seed_url: &str, profile: &str, walk: &Walk) -> Result<SessionResult> {
        let created_at = self
            .store
            .get_session(session_id)?
            .map(|s| s.created_at)
            .unwrap_or_default();

        let mut items = Vec::new();
        for item in self.store.list_session_items(session_id)? {
            let stored = self.store.get_video(&item.video_id)?;
            let info = walk.info(&VideoKey::from_storage_key(&item.video_id));

            let tags = stored
                .as_ref()
                .map(|v| v.tags.clone())
                .filter(|t| !t.is_empty())
                .or_else(|| info.map(|i| i.tags.clone()))
                .unwrap_or_default();
            let secondary_id = stored
                .as_ref()
                .and_then(|v| v.secondary_id.clone())
                .or_else(|| info.and_then(|i| i.secondary_id.clone()));
            let play_url = self.player_urls.resolve(&item.url, secondary_id.as_deref());
            let breakdown = item.explain.breakdown().copied();

            items.push(SessionResultItem {
                idx: item.idx,
                id: item.video_id,
                secondary_id,
                url: item.url,
                play_url,
                title: item.title,
                tags,
                creator: info.and_then(|i| i.creator.clone()),
                score: breakdown.map(|b| b.score),
                freq: breakdown.map(|b| b.freq),
                sim: breakdown.map(|b| b.sim),
                div: breakdown.map(|b| b.div),
                novelty: breakdown.map(|b| b.novelty),
            });
        }

        let tag_window: Vec<Vec<String>> = items.iter().map(|i| i.tags.clone()).collect();
        let creators: Vec<Option<String>> = items.iter().map(|i| i.creator.clone()).collect();

        Ok(SessionResult {
            session_id: session_id.to_string(),
            seed_url: seed_url.to_string(),
            created_at,
            profile: profile.to_string(),
            items,
            metrics: SessionDiagnostics {
                tag_entropy: entropy(&tag_window),
                creator_dominance: creator_dominance(&creators),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(tags: &[&str], title: Option<&str>, secondary: Option<&str>) -> CandidateInfo {
        CandidateInfo {
            url: "https://videos.test/v/a".to_string(),
            title: title.map(str::to_string),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            secondary_id: secondary.map(str::to_string),
            creator: None,
        }
    }

    #[test]
    fn test_merge_keeps_known_fields_against_empty_sightings() {
        let mut known = info(&["jazz", "live"], Some("Set"), Some("e1"));
        known.merge(info(&[], None, None));
        assert_eq!(known.tags, vec!["jazz", "live"]);
        assert_eq!(known.title.as_deref(), Some("Set"));
        assert_eq!(known.secondary_id.as_deref(), Some("e1"));

        known.merge(info(&["blues"], Some("Encore"), None));
        assert_eq!(known.tags, vec!["blues"]);
        assert_eq!(known.title.as_deref(), Some("Encore"));
        assert_eq!(known.secondary_id.as_deref(), Some("e1"));
    }

    #[test]
    fn test_walk_window_evicts_oldest_tag_set() {
        let mut walk = Walk::new(2);
        for (id, tag) in [("a", "x"), ("b", "y"), ("c", "z")] {
            walk.pick(&VideoKey::known(id), &[tag.to_string()]);
        }
        assert_eq!(walk.recent_tags.len(), 2);
        assert!(walk.recent_tags[0].contains("y"));
        assert!(walk.picked.contains(&VideoKey::known("a")));
    }
}
