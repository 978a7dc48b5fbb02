//! Runtime settings, overridable through `RC_`-prefixed environment variables

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::ScoreWeights;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    // Page visits
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
    #[serde(default = "default_wait_after_load_ms")]
    pub wait_after_load_ms: u64,
    /// Politeness pause between consecutive page visits
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // Ranking knobs
    #[serde(default = "default_w_related")]
    pub w_related: f64,
    #[serde(default = "default_w_sim")]
    pub w_sim: f64,
    #[serde(default = "default_w_div")]
    pub w_div: f64,
    #[serde(default = "default_w_novelty")]
    pub w_novelty: f64,
    #[serde(default = "default_diversity_window_k")]
    pub diversity_window_k: usize,

    // Exploration policy
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_sample_top_m")]
    pub sample_top_m: usize,

    #[serde(default = "default_session_len")]
    pub default_session_len: usize,

    // Optional secondary-id embed rule, e.g. host "example.com" and
    // template "https://www.example.com/embedframe/{id}"
    #[serde(default)]
    pub embed_host: Option<String>,
    #[serde(default)]
    pub embed_template: Option<String>,

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_db_path() -> String {
    "ranked_channel.sqlite3".to_string()
}
fn default_navigation_timeout_ms() -> u64 {
    25_000
}
fn default_wait_after_load_ms() -> u64 {
    500
}
fn default_throttle_ms() -> u64 {
    400
}
fn default_user_agent() -> String {
    concat!("ranked-channel/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_w_related() -> f64 {
    0.45
}
fn default_w_sim() -> f64 {
    0.45
}
fn default_w_div() -> f64 {
    0.35
}
fn default_w_novelty() -> f64 {
    0.15
}
fn default_diversity_window_k() -> usize {
    6
}
fn default_temperature() -> f64 {
    0.85
}
fn default_sample_top_m() -> usize {
    40
}
fn default_session_len() -> usize {
    30
}
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            wait_after_load_ms: default_wait_after_load_ms(),
            throttle_ms: default_throttle_ms(),
            user_agent: default_user_agent(),
            w_related: default_w_related(),
            w_sim: default_w_sim(),
            w_div: default_w_div(),
            w_novelty: default_w_novelty(),
            diversity_window_k: default_diversity_window_k(),
            temperature: default_temperature(),
            sample_top_m: default_sample_top_m(),
            default_session_len: default_session_len(),
            embed_host: None,
            embed_template: None,
            bind_addr: default_bind_addr(),
        }
    }
}

impl Settings {
    /// Load settings from `.env` (if present) and `RC_*` environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let settings: Settings = envy::prefixed("RC_").from_env()?;
        Ok(settings)
    }

    pub fn weights(&self) -> ScoreWeights {
        ScoreWeights {
            related: self.w_related,
            sim: self.w_sim,
            div: self.w_div,
            novelty: self.w_novelty,
        }
    }

    /// Snapshot of the knobs that shaped a session, stored with it
    pub fn session_config(&self, profile: &str) -> SessionConfig {
        SessionConfig {
            profile: profile.to_string(),
            w_related: self.w_related,
            w_sim: self.w_sim,
            w_div: self.w_div,
            w_novelty: self.w_novelty,
            temperature: self.temperature,
            diversity_window_k: self.diversity_window_k,
            sample_top_m: self.sample_top_m,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub profile: String,
    pub w_related: f64,
    pub w_sim: f64,
    pub w_div: f64,
    pub w_novelty: f64,
    pub temperature: f64,
    pub diversity_window_k: usize,
    pub sample_top_m: usize,
}
