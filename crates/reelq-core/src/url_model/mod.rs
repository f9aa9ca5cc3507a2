//! Content references: extraction from free text and classification.
//!
//! A `ContentRef` is a validated `http`/`https` URL plus the kind of content it
//! points at. Instagram post/reel/story links are recognised by host and path;
//! any other host is treated as a direct media link.

mod filename;

pub use filename::{media_filename, sanitize_filename};

use std::fmt;
use std::str::FromStr;
use url::Url;

const INSTAGRAM_HOSTS: &[&str] = &[
    "instagram.com",
    "www.instagram.com",
    "instagr.am",
    "www.instagr.am",
];

/// What a content reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Post,
    Reel,
    Story,
    /// Direct link to a media file on any other host.
    Media,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Post => "post",
            ContentKind::Reel => "reel",
            ContentKind::Story => "story",
            ContentKind::Media => "media",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("invalid URL: {0}")]
    Malformed(#[from] url::ParseError),
    #[error("unsupported scheme `{0}` (expected http or https)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("not a post, reel or story link: {0}")]
    UnsupportedPath(String),
}

/// A validated reference to content that a fetcher can resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    url: Url,
    kind: ContentKind,
}

impl ContentRef {
    /// Parse and classify a single URL.
    pub fn parse(input: &str) -> Result<Self, ReferenceError> {
        let url = Url::parse(input.trim())?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(ReferenceError::UnsupportedScheme(other.to_string())),
        }
        let host = url
            .host_str()
            .ok_or(ReferenceError::MissingHost)?
            .to_ascii_lowercase();

        if !INSTAGRAM_HOSTS.contains(&host.as_str()) {
            return Ok(ContentRef {
                url,
                kind: ContentKind::Media,
            });
        }

        let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());
        let section = segments.next();
        let id = segments.next();
        let kind = match (section, id) {
            (Some("p"), Some(_)) => ContentKind::Post,
            (Some("reel") | Some("reels"), Some(_)) => ContentKind::Reel,
            (Some("stories"), Some(_)) => ContentKind::Story,
            _ => return Err(ReferenceError::UnsupportedPath(url.path().to_string())),
        };
        Ok(ContentRef { url, kind })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// Post or reel identifier (`/p/<id>`, `/reel/<id>`); None for stories and direct media.
    pub fn shortcode(&self) -> Option<&str> {
        match self.kind {
            ContentKind::Post | ContentKind::Reel => self
                .url
                .path_segments()?
                .filter(|s| !s.is_empty())
                .nth(1),
            ContentKind::Story | ContentKind::Media => None,
        }
    }

    /// Host the content is served from, used in delivery captions.
    pub fn source(&self) -> &str {
        self.url.host_str().unwrap_or("unknown")
    }
}

impl FromStr for ContentRef {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentRef::parse(s)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Returns the first supported content reference found in `text`.
///
/// Tokens are split on whitespace; anything that is not an http(s) URL, or is
/// an Instagram URL with an unsupported path, is skipped.
pub fn extract_reference(text: &str) -> Option<ContentRef> {
    text.split_whitespace()
        .filter(|token| token.starts_with("http://") || token.starts_with("https://"))
        .find_map(|token| ContentRef::parse(token).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_instagram_links() {
        let post = ContentRef::parse("https://www.instagram.com/p/ABC123/").unwrap();
        assert_eq!(post.kind(), ContentKind::Post);
        assert_eq!(post.shortcode(), Some("ABC123"));

        let reel = ContentRef::parse("https://instagram.com/reel/XYZ789/?igsh=1").unwrap();
        assert_eq!(reel.kind(), ContentKind::Reel);
        assert_eq!(reel.shortcode(), Some("XYZ789"));

        let reels = ContentRef::parse("https://instagr.am/reels/Q1").unwrap();
        assert_eq!(reels.kind(), ContentKind::Reel);

        let story = ContentRef::parse("https://www.instagram.com/stories/someone/123/").unwrap();
        assert_eq!(story.kind(), ContentKind::Story);
        assert_eq!(story.shortcode(), None);
    }

    #[test]
    fn instagram_profile_link_is_rejected() {
        let err = ContentRef::parse("https://www.instagram.com/someone/").unwrap_err();
        assert!(matches!(err, ReferenceError::UnsupportedPath(_)));
        assert!(ContentRef::parse("https://www.instagram.com/p/").is_err());
    }

    #[test]
    fn other_hosts_are_direct_media() {
        let r = ContentRef::parse("https://cdn.example.com/v/clip.mp4").unwrap();
        assert_eq!(r.kind(), ContentKind::Media);
        assert_eq!(r.source(), "cdn.example.com");
        assert_eq!(r.shortcode(), None);
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        assert!(matches!(
            ContentRef::parse("ftp://example.com/a.mp4"),
            Err(ReferenceError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            ContentRef::parse("not a url"),
            Err(ReferenceError::Malformed(_))
        ));
    }

    #[test]
    fn extract_finds_first_supported_url_in_text() {
        let text = "look at this https://www.instagram.com/someone/ and \
                    https://www.instagram.com/reel/XYZ789/ thanks";
        let r = extract_reference(text).unwrap();
        assert_eq!(r.kind(), ContentKind::Reel);
        assert_eq!(r.shortcode(), Some("XYZ789"));
    }

    #[test]
    fn extract_returns_none_without_urls() {
        assert!(extract_reference("/ig please").is_none());
        assert!(extract_reference("").is_none());
    }

    #[test]
    fn from_str_and_display_agree() {
        let r: ContentRef = "https://example.com/a.jpg".parse().unwrap();
        assert_eq!(r.to_string(), "https://example.com/a.jpg");
        assert_eq!(r.as_str(), r.url().as_str());
    }
}
