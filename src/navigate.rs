//! The consumer side of the JSON artifacts: the same contract the browser
//! widget (`assets/keyword-navigation.js`) implements, expressed in Rust so it
//! can back the `related` command and be tested.
//!
//! A [`Navigator`] loads both artifacts. If either one is missing or invalid,
//! it degrades silently into an inert navigator on which no keyword is
//! clickable. Otherwise clicking a shared keyword opens an [`Overlay`] that
//! lists the related posts. There is at most one overlay at a time:
//!
//! ```text
//! Closed --click(shared)--> Open --dismiss(outside | Escape | close)--> Closed
//!                           Open --click(shared)--> Open (replaced)
//! ```
//!
//! The `related` command only needs [`Navigator::related`]. The overlay state
//! machine ([`Navigator::click`], [`Navigator::dismiss`],
//! [`Navigator::overlay`], [`Overlay::to_html`]) models the widget's behavior
//! so it can be checked in tests; the browser asset has no test harness of its
//! own.

use crate::annotate::escape_attribute;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::fs;
use std::path::Path;
use tracing::debug;

/// How many of a related post's keywords the overlay shows.
pub const OVERLAY_KEYWORD_LIMIT: usize = 5;

#[derive(Deserialize, Debug)]
struct IndexArtifact {
    keywords: HashMap<String, Vec<String>>,
    posts: HashMap<String, PostMetadata>,
}

#[derive(Deserialize, Debug)]
struct PostMetadata {
    title: String,
    slug: String,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct FrequencyArtifact {
    shared: Vec<SharedKeyword>,
}

#[derive(Deserialize, Debug)]
struct SharedKeyword {
    keyword: String,
}

/// The ways an open overlay can be dismissed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dismissal {
    /// A click on the backdrop outside the overlay content.
    OutsideClick,
    Escape,
    CloseButton,
}

/// A link to a related post, as listed in an [`Overlay`].
#[derive(Clone, Debug, PartialEq)]
pub struct RelatedLink {
    pub href: String,
    pub title: String,

    /// Up to [`OVERLAY_KEYWORD_LIMIT`] of the post's keywords.
    pub keywords: Vec<String>,
}

/// The "related posts" overlay for one keyword.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub keyword: String,
    pub links: Vec<RelatedLink>,
}

impl Overlay {
    /// Renders the overlay markup. The browser widget builds the same
    /// structure.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        html.push_str(r#"<div class="keyword-modal" role="dialog" aria-modal="true">"#);
        html.push_str(r#"<div class="keyword-modal-content">"#);
        html.push_str(r#"<button class="keyword-modal-close" aria-label="Close">&times;</button>"#);
        html.push_str(&format!("<h2>Posts about: {}</h2>", escape_attribute(&self.keyword)));
        html.push_str(&format!(
            r#"<p class="keyword-count">{} post{}</p>"#,
            self.links.len(),
            if self.links.len() == 1 { "" } else { "s" }
        ));
        html.push_str(r#"<div class="related-posts-list">"#);
        for link in self.links.iter() {
            html.push_str(&format!(
                r#"<a href="{}" class="related-post-item"><h3>{}</h3><div class="related-post-keywords">"#,
                escape_attribute(&link.href),
                escape_attribute(&link.title)
            ));
            for keyword in link.keywords.iter() {
                html.push_str(&format!(
                    r#"<span class="mini-keyword-tag">{}</span>"#,
                    escape_attribute(keyword)
                ));
            }
            html.push_str("</div></a>");
        }
        html.push_str("</div></div></div>");
        html
    }
}

struct Artifacts {
    index: IndexArtifact,
    shared: HashSet<String>,
}

/// Resolves keyword clicks into related-post overlays. See the module
/// documentation.
pub struct Navigator {
    /// `None` when loading failed; the navigator is then inert.
    artifacts: Option<Artifacts>,

    /// The URL prefix of post pages (e.g., `/posts/`).
    posts_url: String,

    overlay: Option<Overlay>,
}

impl Navigator {
    /// Builds a navigator from the two artifact sources. A failed source or an
    /// artifact that doesn't parse yields an inert navigator rather than an
    /// error.
    pub fn load<E1: Display, E2: Display>(
        index: std::result::Result<String, E1>,
        frequency: std::result::Result<String, E2>,
        posts_url: &str,
    ) -> Navigator {
        let artifacts = match (index, frequency) {
            (Ok(index), Ok(frequency)) => parse_artifacts(&index, &frequency),
            (Err(err), _) => {
                debug!(%err, "keyword index unavailable");
                None
            }
            (_, Err(err)) => {
                debug!(%err, "keyword frequency table unavailable");
                None
            }
        };
        Navigator {
            artifacts,
            posts_url: posts_url.to_owned(),
            overlay: None,
        }
    }

    /// Loads the artifacts from disk. See [`Navigator::load`].
    pub fn from_files(index_file: &Path, frequency_file: &Path, posts_url: &str) -> Navigator {
        Navigator::load(
            fs::read_to_string(index_file),
            fs::read_to_string(frequency_file),
            posts_url,
        )
    }

    /// Reports whether both artifacts loaded.
    pub fn is_interactive(&self) -> bool {
        self.artifacts.is_some()
    }

    /// Reports whether a click handler exists for `keyword`: the keyword is
    /// shared and the index lists its posts.
    pub fn is_clickable(&self, keyword: &str) -> bool {
        match &self.artifacts {
            None => false,
            Some(artifacts) => {
                artifacts.shared.contains(keyword) && artifacts.index.keywords.contains_key(keyword)
            }
        }
    }

    /// Handles a click on the span for `keyword`. Opens (or replaces) the
    /// overlay and returns it if the keyword is clickable; otherwise nothing
    /// happens.
    pub fn click(&mut self, keyword: &str) -> Option<&Overlay> {
        if !self.is_clickable(keyword) {
            return None;
        }
        let overlay = self.related(keyword)?;
        self.overlay = Some(overlay);
        self.overlay.as_ref()
    }

    /// Closes the open overlay. Returns whether one was open.
    pub fn dismiss(&mut self, how: Dismissal) -> bool {
        debug!(?how, "dismissing overlay");
        self.overlay.take().is_some()
    }

    /// The open overlay, if any.
    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    /// Builds the overlay for `keyword` without opening it. Posts missing from
    /// the reverse map are skipped.
    pub fn related(&self, keyword: &str) -> Option<Overlay> {
        let artifacts = self.artifacts.as_ref()?;
        let posts = artifacts.index.keywords.get(keyword)?;
        Some(Overlay {
            keyword: keyword.to_owned(),
            links: posts
                .iter()
                .filter_map(|file_name| artifacts.index.posts.get(file_name))
                .map(|post| RelatedLink {
                    href: format!("{}{}.html", self.posts_url, post.slug),
                    title: post.title.clone(),
                    keywords: post
                        .keywords
                        .iter()
                        .take(OVERLAY_KEYWORD_LIMIT)
                        .cloned()
                        .collect(),
                })
                .collect(),
        })
    }
}

fn parse_artifacts(index: &str, frequency: &str) -> Option<Artifacts> {
    let index: IndexArtifact = match serde_json::from_str(index) {
        Ok(index) => index,
        Err(err) => {
            debug!(%err, "keyword index is invalid");
            return None;
        }
    };
    let frequency: FrequencyArtifact = match serde_json::from_str(frequency) {
        Ok(frequency) => frequency,
        Err(err) => {
            debug!(%err, "keyword frequency table is invalid");
            return None;
        }
    };
    Some(Artifacts {
        index,
        shared: frequency.shared.into_iter().map(|s| s.keyword).collect(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    const INDEX: &str = r#"{
        "keywords": { "tantra": ["A.html", "B.html"], "chakra": ["A.html"] },
        "posts": {
            "A.html": { "title": "Alpha", "slug": "A", "keywords": ["Tantra", "Chakra"] },
            "B.html": { "title": "Beta", "slug": "B", "keywords": ["Tantra"] }
        }
    }"#;

    const FREQUENCY: &str = r#"{
        "shared": [{ "keyword": "tantra", "count": 2, "posts": ["A.html", "B.html"] }],
        "unique": [{ "keyword": "chakra", "posts": ["A.html"] }],
        "map": { "tantra": ["A.html", "B.html"], "chakra": ["A.html"] },
        "totalPosts": 2,
        "generatedAt": "2026-10-18T09:30:00.000Z"
    }"#;

    fn loaded() -> Navigator {
        Navigator::load::<String, String>(Ok(INDEX.to_owned()), Ok(FREQUENCY.to_owned()), "/posts/")
    }

    #[test]
    fn test_click_shared_keyword_lists_related_posts() {
        let mut navigator = loaded();
        let overlay = navigator.click("tantra").cloned().unwrap();

        let titles: Vec<&str> = overlay.links.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(vec!["Alpha", "Beta"], titles);
        assert_eq!("/posts/A.html", overlay.links[0].href);

        let html = overlay.to_html();
        assert_eq!(2, html.matches(r#"class="related-post-item""#).count());
        assert!(html.contains("<h3>Alpha</h3>"));
        assert!(html.contains("<h3>Beta</h3>"));
        assert!(html.contains("2 posts"));
    }

    #[test]
    fn test_unique_keywords_have_no_handler() {
        let mut navigator = loaded();
        assert!(!navigator.is_clickable("chakra"));
        assert!(navigator.click("chakra").is_none());
        assert!(navigator.overlay().is_none());
    }

    #[test]
    fn test_overlay_state_machine() {
        let mut navigator = loaded();
        assert!(!navigator.dismiss(Dismissal::Escape));

        navigator.click("tantra");
        assert!(navigator.overlay().is_some());
        assert!(navigator.dismiss(Dismissal::OutsideClick));
        assert!(navigator.overlay().is_none());

        navigator.click("tantra");
        navigator.click("tantra");
        assert!(navigator.dismiss(Dismissal::CloseButton));
        assert!(!navigator.dismiss(Dismissal::Escape));
    }

    #[test]
    fn test_failed_load_is_inert() {
        let failures = vec![
            Navigator::load::<&str, &str>(Err("500 Internal Server Error"), Ok(FREQUENCY.to_owned()), "/posts/"),
            Navigator::load::<&str, &str>(Ok(INDEX.to_owned()), Err("500 Internal Server Error"), "/posts/"),
            Navigator::load::<String, String>(Ok(String::from("<html>")), Ok(FREQUENCY.to_owned()), "/posts/"),
        ];
        for mut navigator in failures {
            assert!(!navigator.is_interactive());
            assert!(!navigator.is_clickable("tantra"));
            assert!(navigator.click("tantra").is_none());
        }
    }

    #[test]
    fn test_missing_files_are_inert() {
        let dir = tempfile::tempdir().unwrap();
        let navigator = Navigator::from_files(
            &dir.path().join("keyword-index.json"),
            &dir.path().join("keyword-frequency.json"),
            "/posts/",
        );
        assert!(!navigator.is_interactive());
    }

    #[test]
    fn test_overlay_escapes_markup() {
        let overlay = Overlay {
            keyword: String::from("kali & tara"),
            links: vec![RelatedLink {
                href: String::from("/posts/a.html"),
                title: String::from("<b>Bold</b>"),
                keywords: vec![String::from("Kali & Tara")],
            }],
        };
        let html = overlay.to_html();
        assert!(html.contains("Posts about: kali &amp; tara"));
        assert!(html.contains("<h3>&lt;b&gt;Bold&lt;/b&gt;</h3>"));
        assert!(html.contains("1 post<"));
    }
}
