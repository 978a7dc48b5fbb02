//! HTTP page extractor: fetches the page with reqwest and pulls fields out of the markup

use super::{dedup_related, normalize_tags, origin, resolve_href, Extractor, PageSnapshot, RelatedLink, VideoIdentity};
use crate::config::Settings;
use crate::error::{RankError, Result};
use crate::types::VideoKey;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex"))
}

fn id_video_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    re(&CELL, r#""id_video"\s*:\s*"?(\d+)"?"#)
}

fn id_video_encoded_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    re(&CELL, r#""id_video_encoded"\s*:\s*"([^"]+)""#)
}

fn title_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    re(&CELL, r"(?is)<title[^>]*>(.*?)</title>")
}

fn meta_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    re(&CELL, r"(?is)<meta\b([^>]*)>")
}

fn attr_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    re(&CELL, r#"(?s)([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
}

fn card_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    re(&CELL, r#"(?is)<(?:div|li|article)\b([^>]*\bdata-id\s*=\s*["'][^"']+["'][^>]*)>"#)
}

fn anchor_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    re(&CELL, r"(?is)<a\b([^>]*)>(.*?)</a>")
}

fn tag_strip_re() -> &'static Regex {
    static CELL: OnceLock<Regex> = OnceLock::new();
    re(&CELL, r"(?s)<[^>]*>")
}

/// Attribute name (lowercased) -> value pairs of one tag
fn attrs(tag_body: &str) -> Vec<(String, String)> {
    attr_re()
        .captures_iter(tag_body)
        .map(|c| {
            let value = c.get(2).or_else(|| c.get(3)).map(|m| m.as_str()).unwrap_or_default();
            (c[1].to_ascii_lowercase(), decode_entities(value))
        })
        .collect()
}

fn attr<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn decode_entities(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn text_of(fragment: &str) -> Option<String> {
    let text = decode_entities(&tag_strip_re().replace_all(fragment, " "));
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Best-effort extraction from raw HTML. Never fails.
pub fn extract_from_html(page_url: &str, html: &str) -> PageSnapshot {
    let identity = id_video_re()
        .captures(html)
        .map(|c| c[1].to_string())
        .filter(|id| VideoKey::is_stable_id(id))
        .map(|id| VideoIdentity {
            id,
            secondary_id: id_video_encoded_re().captures(html).map(|e| e[1].to_string()),
        });

    let title = title_re().captures(html).and_then(|c| text_of(&c[1]));

    let mut raw_tags: Vec<String> = Vec::new();
    let mut creator = None;
    for m in meta_re().captures_iter(html) {
        let a = attrs(&m[1]);
        let key = attr(&a, "name").or_else(|| attr(&a, "property")).unwrap_or_default();
        let Some(content) = attr(&a, "content") else {
            continue;
        };
        match key.to_ascii_lowercase().as_str() {
            "keywords" => raw_tags.extend(content.split(',').map(str::to_string)),
            "video:tag" | "og:video:tag" => raw_tags.push(content.to_string()),
            "author" | "video:creator" if creator.is_none() => {
                creator = Some(content.trim().to_string()).filter(|c| !c.is_empty());
            }
            _ => {}
        }
    }

    PageSnapshot {
        identity,
        tags: normalize_tags(raw_tags),
        title,
        creator,
        related: extract_related(page_url, html),
    }
}

/// The card's title link if it has one, else its first anchor with an href.
/// Uploader and channel links usually come first in the markup.
fn card_anchor(body: &str) -> Option<(Vec<(String, String)>, String)> {
    let anchors: Vec<_> = anchor_re()
        .captures_iter(body)
        .map(|c| (attrs(&c[1]), c[2].to_string()))
        .filter(|(a, _)| attr(a, "href").is_some())
        .collect();

    let titled_class = |a: &[(String, String)]| {
        attr(a, "class").is_some_and(|class| class.split_whitespace().any(|c| c.to_ascii_lowercase().contains("title")))
    };
    let pos = anchors
        .iter()
        .position(|(a, _)| titled_class(a))
        .or_else(|| anchors.iter().position(|(a, _)| attr(a, "title").is_some()))
        .unwrap_or(0);
    anchors.into_iter().nth(pos)
}

/// Related cards: elements carrying `data-id`, linked through their title anchor
fn extract_related(page_url: &str, html: &str) -> Vec<RelatedLink> {
    let cards: Vec<_> = card_re().captures_iter(html).collect();
    let mut links = Vec::new();

    for (i, card) in cards.iter().enumerate() {
        let open = card.get(0).map(|m| m.end()).unwrap_or_default();
        let close = cards
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(html.len());
        let card_attrs = attrs(&card[1]);
        let body = &html[open..close];

        let Some((anchor_attrs, anchor_text)) = card_anchor(body) else {
            continue;
        };
        let Some(url) = attr(&anchor_attrs, "href").and_then(|href| resolve_href(page_url, href)) else {
            continue;
        };

        let title = attr(&anchor_attrs, "title")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| text_of(&anchor_text));

        links.push(RelatedLink {
            url,
            title,
            video_id: attr(&card_attrs, "data-id")
                .map(|id| id.trim().to_string())
                .filter(|id| VideoKey::is_stable_id(id)),
            secondary_id: attr(&card_attrs, "data-eid").map(str::to_string).filter(|s| !s.is_empty()),
        });
    }

    dedup_related(links)
}

pub struct HttpExtractor {
    client: reqwest::Client,
    wait_after_load: Duration,
}

impl HttpExtractor {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.navigation_timeout_ms))
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            wait_after_load: Duration::from_millis(settings.wait_after_load_ms),
        })
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn visit(&self, url: &str) -> Result<PageSnapshot> {
        debug!("Fetching {}", url);

        let navigation = |reason: String| RankError::Navigation {
            url: url.to_string(),
            reason,
        };

        let response = self.client.get(url).send().await.map_err(|e| navigation(e.to_string()))?;
        if !response.status().is_success() {
            return Err(navigation(format!("HTTP {}", response.status())));
        }
        // Resolve relative links against where we actually landed
        let final_url = response.url().to_string();
        if origin(url) != origin(&final_url) {
            debug!("Redirected across origins: {} -> {}", url, final_url);
        }
        let body = response.text().await.map_err(|e| navigation(e.to_string()))?;

        if !self.wait_after_load.is_zero() {
            tokio::time::sleep(self.wait_after_load).await;
        }

        let snapshot = extract_from_html(&final_url, &body);
        if snapshot.identity.is_none() {
            warn!("No stable identity on {}", url);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><head>
  <title> Night Drive &amp; Synths </title>
  <meta name="keywords" content="Synthwave, Retro, synthwave, ">
  <meta property="video:tag" content="Driving">
  <meta name="author" content="Neon Garage">
  <script>var cfg = {"id_video": 4411, "id_video_encoded": "kx9zq"};</script>
</head><body>
  <div class="thumb-block" data-id="501" data-eid="e501">
    <a href="/video-501/first?utm_source=rel#t" title="First Pick">thumb</a>
  </div>
  <div class="thumb-block" data-id="502">
    <a class="title" href="https://videos.test/video-502/second"><b>Second</b> One</a>
  </div>
  <div class="thumb-block" data-id="501">
    <a href="/video-501/first">dup</a>
  </div>
  <div class="thumb-block" data-id="503"><span>no link</span></div>
</body></html>
"#;

    #[test]
    fn test_extracts_identity_title_tags_creator() {
        let snap = extract_from_html("https://videos.test/video-4411/night", PAGE);
        assert_eq!(
            snap.identity,
            Some(VideoIdentity {
                id: "4411".to_string(),
                secondary_id: Some("kx9zq".to_string()),
            })
        );
        assert_eq!(snap.title.as_deref(), Some("Night Drive & Synths"));
        assert_eq!(snap.tags, vec!["synthwave", "retro", "driving"]);
        assert_eq!(snap.creator.as_deref(), Some("Neon Garage"));
    }

    #[test]
    fn test_extracts_related_cards() {
        let snap = extract_from_html("https://videos.test/video-4411/night", PAGE);
        assert_eq!(snap.related.len(), 2);

        let first = &snap.related[0];
        assert_eq!(first.url, "https://videos.test/video-501/first");
        assert_eq!(first.title.as_deref(), Some("First Pick"));
        assert_eq!(first.video_id.as_deref(), Some("501"));
        assert_eq!(first.secondary_id.as_deref(), Some("e501"));

        let second = &snap.related[1];
        assert_eq!(second.title.as_deref(), Some("Second One"));
        assert_eq!(second.secondary_id, None);
    }

    #[test]
    fn test_card_prefers_title_link_over_uploader_link() {
        let html = r#"
  <div class="thumb-block" data-id="601">
    <a class="uploader" href="/channel/neon">Neon Garage</a>
    <a class="thumb-title" href="/video-601/third">Third</a>
  </div>
  <div class="thumb-block" data-id="602">
    <a href="/channel/neon">Neon Garage</a>
    <a href="/video-602/fourth" title="Fourth">thumb</a>
  </div>
  <div class="thumb-block" data-id="603">
    <a name="anchor-only">x</a>
    <a href="/video-603/fifth">Fifth</a>
  </div>"#;
        let snap = extract_from_html("https://videos.test/video-1/x", html);
        let urls: Vec<&str> = snap.related.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://videos.test/video-601/third",
                "https://videos.test/video-602/fourth",
                "https://videos.test/video-603/fifth",
            ]
        );
        assert_eq!(snap.related[0].title.as_deref(), Some("Third"));
    }

    #[test]
    fn test_reserved_card_id_is_dropped() {
        let html = r#"<div data-id="url:https://videos.test/v/a"><a href="/v/b">b</a></div>"#;
        let snap = extract_from_html("https://videos.test/v/s", html);
        assert_eq!(snap.related.len(), 1);
        assert_eq!(snap.related[0].video_id, None);
        assert_eq!(snap.related[0].url, "https://videos.test/v/b");
    }

    #[test]
    fn test_bare_page_degrades_to_empty() {
        let snap = extract_from_html("https://videos.test/x", "<html><body>nothing here</body></html>");
        assert_eq!(snap, PageSnapshot::default());
    }

    #[test]
    fn test_unreachable_page_is_navigation_error() {
        let settings = Settings {
            navigation_timeout_ms: 2_000,
            ..Settings::default()
        };
        let ex = HttpExtractor::new(&settings).unwrap();
        let err = tokio_test::block_on(ex.visit("http://127.0.0.1:1/video-1/x")).unwrap_err();
        assert!(matches!(err, RankError::Navigation { ref url, .. } if url == "http://127.0.0.1:1/video-1/x"));
    }
}
