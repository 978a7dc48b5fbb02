//! Per-source playback URL rules

use tracing::debug;
use url::Url;

/// Maps a canonical page URL (plus optional secondary id) to an embeddable player URL
pub trait PlayUrlRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn play_url(&self, page: &Url, secondary_id: Option<&str>) -> Option<String>;
}

/// youtube.com/watch, /embed, /shorts and youtu.be links
pub struct YoutubeEmbedRule;

impl YoutubeEmbedRule {
    fn video_id(page: &Url) -> Option<String> {
        let host = page.host_str()?.to_ascii_lowercase();
        let path = page.path();

        if host.ends_with("youtu.be") {
            let id = path.trim_start_matches('/');
            return (!id.is_empty()).then(|| id.to_string());
        }

        if host.ends_with("youtube.com") {
            if path == "/watch" {
                return page
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned())
                    .filter(|v| !v.is_empty());
            }
            for prefix in ["/embed/", "/shorts/"] {
                if let Some(rest) = path.strip_prefix(prefix) {
                    let id = rest.split('/').next().unwrap_or_default();
                    return (!id.is_empty()).then(|| id.to_string());
                }
            }
        }
        None
    }
}

impl PlayUrlRule for YoutubeEmbedRule {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn play_url(&self, page: &Url, _secondary_id: Option<&str>) -> Option<String> {
        Self::video_id(page).map(|id| format!("https://www.youtube.com/embed/{}", id))
    }
}

/// Host-keyed template that needs the page's secondary id, e.g. `https://host/embedframe/{id}`
pub struct SecondaryIdEmbedRule {
    host: String,
    template: String,
}

impl SecondaryIdEmbedRule {
    pub fn new(host: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
            template: template.into(),
        }
    }
}

impl PlayUrlRule for SecondaryIdEmbedRule {
    fn name(&self) -> &'static str {
        "secondary_id_embed"
    }

    fn play_url(&self, page: &Url, secondary_id: Option<&str>) -> Option<String> {
        let host = page.host_str()?.to_ascii_lowercase();
        let secondary = secondary_id.filter(|s| !s.is_empty())?;
        if host == self.host || host.ends_with(&format!(".{}", self.host)) {
            Some(self.template.replace("{id}", secondary))
        } else {
            None
        }
    }
}

/// Ordered rule list with a canonical-URL fallback
pub struct PlayerUrlResolver {
    rules: Vec<Box<dyn PlayUrlRule>>,
}

impl Default for PlayerUrlResolver {
    fn default() -> Self {
        Self::new(vec![Box::new(YoutubeEmbedRule)])
    }
}

impl PlayerUrlResolver {
    pub fn new(rules: Vec<Box<dyn PlayUrlRule>>) -> Self {
        Self { rules }
    }

    /// Default rules plus an optional configured secondary-id rule, tried first
    pub fn with_embed(host: Option<&str>, template: Option<&str>) -> Self {
        let mut rules: Vec<Box<dyn PlayUrlRule>> = Vec::new();
        if let (Some(host), Some(template)) = (host, template) {
            rules.push(Box::new(SecondaryIdEmbedRule::new(host, template)));
        }
        rules.push(Box::new(YoutubeEmbedRule));
        Self::new(rules)
    }

    pub fn resolve(&self, url: &str, secondary_id: Option<&str>) -> String {
        let Ok(parsed) = Url::parse(url) else {
            return url.to_string();
        };
        self.rules
            .iter()
            .find_map(|rule| {
                let play = rule.play_url(&parsed, secondary_id)?;
                debug!("{} rule: {} -> {}", rule.name(), url, play);
                Some(play)
            })
            .unwrap_or_else(|| url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_forms() {
        let r = PlayerUrlResolver::default();
        let embed = "https://www.youtube.com/embed/abc123";
        assert_eq!(r.resolve("https://www.youtube.com/watch?v=abc123&t=4", None), embed);
        assert_eq!(r.resolve("https://youtu.be/abc123", None), embed);
        assert_eq!(r.resolve("https://youtube.com/shorts/abc123", None), embed);
        assert_eq!(r.resolve("https://www.youtube.com/embed/abc123", None), embed);
    }

    #[test]
    fn test_fallback_is_canonical_url() {
        let r = PlayerUrlResolver::default();
        assert_eq!(r.resolve("https://videos.test/v/1", Some("x")), "https://videos.test/v/1");
        assert_eq!(r.resolve("not a url", None), "not a url");
    }

    #[test]
    fn test_secondary_id_rule_needs_id_and_host() {
        let r = PlayerUrlResolver::with_embed(
            Some("videos.test"),
            Some("https://www.videos.test/embedframe/{id}"),
        );
        assert_eq!(
            r.resolve("https://www.videos.test/video-9/x", Some("k9f")),
            "https://www.videos.test/embedframe/k9f"
        );
        assert_eq!(r.resolve("https://www.videos.test/video-9/x", None), "https://www.videos.test/video-9/x");
        assert_eq!(r.resolve("https://other.test/v", Some("k9f")), "https://other.test/v");
    }
}
