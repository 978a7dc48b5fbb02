//! URL canonicalization

use url::Url;

/// Query parameters that only track where a click came from
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "ref",
    "ref_src",
    "feature",
    "si",
];

/// Strip the fragment and tracking parameters. Unparseable input is returned trimmed.
pub fn canonicalize_url(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    url.to_string()
}

/// `scheme://host[:port]` of a URL
pub fn origin(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    match url.origin() {
        origin @ url::Origin::Tuple(..) => Some(origin.ascii_serialization()),
        url::Origin::Opaque(_) => None,
    }
}

/// Resolve an href found on `base` into an absolute canonical URL
pub fn resolve_href(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let base = Url::parse(base).ok()?;
    let joined = base.join(href).ok()?;
    match joined.scheme() {
        "http" | "https" => Some(canonicalize_url(joined.as_str())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_strips_fragment_and_tracking() {
        assert_eq!(
            canonicalize_url("https://videos.test/watch?v=1&utm_source=x&t=30#comments"),
            "https://videos.test/watch?v=1&t=30"
        );
        assert_eq!(
            canonicalize_url("https://videos.test/v/9?si=abc&feature=share"),
            "https://videos.test/v/9"
        );
        assert_eq!(canonicalize_url("  not a url "), "not a url");
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let once = canonicalize_url("https://videos.test/a?b=1&ref=home#x");
        assert_eq!(canonicalize_url(&once), once);
    }

    #[test]
    fn test_origin() {
        assert_eq!(origin("https://videos.test:8443/a/b?c").as_deref(), Some("https://videos.test:8443"));
        assert_eq!(origin("mailto:x@y.z"), None);
    }

    #[test]
    fn test_resolve_href() {
        let base = "https://videos.test/video-1/some-title";
        assert_eq!(
            resolve_href(base, "/video-2/other#top").as_deref(),
            Some("https://videos.test/video-2/other")
        );
        assert_eq!(
            resolve_href(base, "https://cdn.test/v?utm_medium=a").as_deref(),
            Some("https://cdn.test/v")
        );
        assert_eq!(resolve_href(base, "#"), None);
        assert_eq!(resolve_href(base, "javascript:void(0)"), None);
    }
}
