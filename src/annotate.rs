//! Rewrites keyword markup inside post files so that shared keywords are
//! clickable and unique keywords are plain, and injects the navigation
//! widget's `<script>` tag.
//!
//! Rewriting works on elements rather than on text patterns. The document is
//! tokenized just far enough to find `span` start tags (comments, `<script>`
//! and `<style>` bodies are skipped), each start tag is parsed into a
//! [`StartTag`] with its ordered attributes, the `class` list and the
//! `data-keyword` attribute are updated as values, and the tag is serialized
//! again only when it actually changed. Attribute values and span text are
//! decoded by [`scraper`], the same way [`crate::parser`] reads them, so both
//! sides agree on every keyword key. Every other byte of the document is
//! copied through untouched, which makes a second pass a no-op.

use crate::index::{Classification, KeywordIndex};
use crate::keyword::Keyword;
use crate::util::overwrite;
use regex::Regex;
use scraper::node::Element;
use scraper::{Html, Selector};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// The class every keyword span carries.
pub const KEYWORD_CLASS: &str = "keyword-tag";

/// The class marking a shared keyword as clickable.
pub const CLICKABLE_CLASS: &str = "clickable-keyword";

/// The class marking a unique keyword as plain text.
pub const PLAIN_CLASS: &str = "plain-keyword";

/// The attribute holding a keyword's normalized key.
pub const KEYWORD_ATTR: &str = "data-keyword";

const TOKEN_PATTERN: &str = r#"(?is)<!--.*?-->|<script\b.*?</script\s*>|<style\b.*?</style\s*>|<span\b(?:[^>"']|"[^"]*"|'[^']*')*>"#;
const ATTRIBUTE_PATTERN: &str =
    r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#;
const SPAN_END_PATTERN: &str = r"(?i)</span\s*>";
const BODY_END_PATTERN: &str = r"(?i)</body\s*>";

/// Counts of what happened to the keyword spans of one document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Keyword spans that are (now) marked clickable.
    pub clickable: usize,

    /// Keyword spans that are (now) marked plain.
    pub plain: usize,

    /// Keyword spans whose keyword the index doesn't know. These are left
    /// alone.
    pub unknown: usize,

    /// Start tags that had to be rewritten.
    pub rewritten: usize,
}

impl std::ops::AddAssign for Stats {
    fn add_assign(&mut self, other: Stats) {
        self.clickable += other.clickable;
        self.plain += other.plain;
        self.unknown += other.unknown;
        self.rewritten += other.rewritten;
    }
}

/// The outcome of [`Annotator::annotate`].
#[derive(Debug)]
pub struct Annotated {
    /// The rewritten document.
    pub html: String,
    pub stats: Stats,
}

impl Annotated {
    pub fn changed(&self) -> bool {
        self.stats.rewritten > 0
    }
}

/// Applies the classification of a [`KeywordIndex`] to keyword markup.
pub struct Annotator<'a> {
    index: &'a KeywordIndex,
    token: Regex,
    attribute: Regex,
    span_end: Regex,
    span: Selector,
}

impl<'a> Annotator<'a> {
    pub fn new(index: &'a KeywordIndex) -> Annotator<'a> {
        // The patterns are constants, so compiling them can't fail.
        Annotator {
            index,
            token: Regex::new(TOKEN_PATTERN).unwrap(),
            attribute: Regex::new(ATTRIBUTE_PATTERN).unwrap(),
            span_end: Regex::new(SPAN_END_PATTERN).unwrap(),
            span: Selector::parse("span").unwrap(),
        }
    }

    /// Rewrites the keyword spans of `html`. Spans of shared keywords get the
    /// clickable marker, spans of unique keywords get the plain marker, and
    /// both get a `data-keyword` holding the keyword's key. Spans whose
    /// keyword isn't in the index are not touched.
    pub fn annotate(&self, html: &str) -> Annotated {
        let mut out = String::with_capacity(html.len() + 64);
        let mut stats = Stats::default();
        let mut copied = 0;

        for token in self.token.find_iter(html) {
            let source = token.as_str();
            if !source.get(..5).map_or(false, |s| s.eq_ignore_ascii_case("<span")) {
                continue;
            }

            let end = self
                .span_end
                .find(&html[token.end()..])
                .map_or(token.end(), |m| token.end() + m.end());
            let fragment = Html::parse_fragment(&html[token.start()..end]);
            let element = match fragment.select(&self.span).next() {
                Some(element) => element,
                None => continue,
            };

            let tag = StartTag::parse(&self.attribute, source, element.value());
            if !tag.is_keyword_tag() {
                continue;
            }

            let text: String = element.text().collect();
            let keyword = match Keyword::with_key(&text, &tag.keyword_attr().unwrap_or_default()) {
                Some(keyword) => keyword,
                None => continue,
            };
            let classification = match self.index.classify(&keyword.key) {
                Some(classification) => classification,
                None => {
                    stats.unknown += 1;
                    continue;
                }
            };
            match classification {
                Classification::Shared => stats.clickable += 1,
                Classification::Unique => stats.plain += 1,
            }

            if let Some(rewritten) = tag.rewrite(classification, &keyword.key) {
                out.push_str(&html[copied..token.start()]);
                out.push_str(&rewritten);
                copied = token.end();
                stats.rewritten += 1;
            }
        }
        out.push_str(&html[copied..]);

        Annotated { html: out, stats }
    }

    /// Reads, annotates, and (if anything changed) rewrites the post at
    /// `path`.
    pub fn annotate_file(&self, path: &Path) -> Result<Stats> {
        let html = fs::read_to_string(path).map_err(|err| Error::Read {
            path: path.to_owned(),
            err,
        })?;
        let annotated = self.annotate(&html);
        if annotated.changed() {
            overwrite(path, annotated.html.as_bytes()).map_err(|err| Error::Write {
                path: path.to_owned(),
                err,
            })?;
        }
        Ok(annotated.stats)
    }
}

/// A parsed `span` start tag.
#[derive(Debug)]
struct StartTag<'s> {
    attributes: Vec<Attribute<'s>>,
    self_closing: bool,
}

#[derive(Debug)]
struct Attribute<'s> {
    /// The attribute name, lowercased.
    name: String,

    /// The decoded value; empty for an attribute written without one.
    value: Option<String>,

    /// The attribute exactly as written, for untouched attributes.
    source: &'s str,
}

impl<'s> StartTag<'s> {
    /// Splits `source` into its attributes. Values come from `element`, the
    /// same tag as parsed by scraper.
    fn parse(attribute: &Regex, source: &'s str, element: &Element) -> StartTag<'s> {
        // `source` is `<span ...>`; skip the tag name and the closing `>`.
        let mut inner = &source[5..source.len() - 1];
        let self_closing = inner.trim_end().ends_with('/');
        if self_closing {
            inner = inner.trim_end().trim_end_matches('/');
        }

        let attributes = attribute
            .captures_iter(inner)
            .map(|captures| {
                let name = captures[1].to_ascii_lowercase();
                Attribute {
                    value: element.attr(&name).map(String::from),
                    name,
                    // Group 0 always participates in a match.
                    source: captures.get(0).map_or("", |m| m.as_str()),
                }
            })
            .collect();

        StartTag {
            attributes,
            self_closing,
        }
    }

    fn get(&self, name: &str) -> Option<&Attribute<'s>> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    fn classes(&self) -> Vec<&str> {
        self.get("class")
            .and_then(|attr| attr.value.as_deref())
            .map(|value| value.split_whitespace().collect())
            .unwrap_or_default()
    }

    fn keyword_attr(&self) -> Option<String> {
        self.get(KEYWORD_ATTR).and_then(|attr| attr.value.clone())
    }

    fn is_keyword_tag(&self) -> bool {
        self.get(KEYWORD_ATTR).is_some() || self.classes().contains(&KEYWORD_CLASS)
    }

    /// Returns the serialized start tag carrying the markers for
    /// `classification`, or `None` if the tag already carries them.
    fn rewrite(&self, classification: Classification, key: &str) -> Option<String> {
        let current = self.classes();
        let (add, remove) = match classification {
            Classification::Shared => (CLICKABLE_CLASS, PLAIN_CLASS),
            Classification::Unique => (PLAIN_CLASS, CLICKABLE_CLASS),
        };

        let mut classes: Vec<&str> = Vec::with_capacity(current.len() + 2);
        for class in current.iter().copied().chain([KEYWORD_CLASS, add].iter().copied()) {
            if class != remove && !classes.contains(&class) {
                classes.push(class);
            }
        }

        if classes == current && self.keyword_attr().as_deref() == Some(key) {
            return None;
        }

        let class_attr = format!(r#"class="{}""#, escape_attribute(&classes.join(" ")));
        let keyword_attr = format!(r#"{}="{}""#, KEYWORD_ATTR, escape_attribute(key));

        let mut out = String::from("<span");
        let (mut wrote_class, mut wrote_keyword) = (false, false);
        for attr in self.attributes.iter() {
            out.push(' ');
            match attr.name.as_str() {
                "class" if !wrote_class => {
                    out.push_str(&class_attr);
                    wrote_class = true;
                }
                KEYWORD_ATTR if !wrote_keyword => {
                    out.push_str(&keyword_attr);
                    wrote_keyword = true;
                }
                // duplicates of a rewritten attribute
                "class" | KEYWORD_ATTR => {
                    out.pop();
                }
                _ => out.push_str(attr.source),
            }
        }
        if !wrote_class {
            out.push(' ');
            out.push_str(&class_attr);
        }
        if !wrote_keyword {
            out.push(' ');
            out.push_str(&keyword_attr);
        }
        if self.self_closing {
            out.push_str(" /");
        }
        out.push('>');
        Some(out)
    }
}

/// The outcome of [`inject_script`].
#[derive(Debug, PartialEq)]
pub enum Injection {
    /// The tag was inserted; carries the new document.
    Injected(String),

    /// The document already references the script.
    AlreadyPresent,

    /// The document has no `</body>` to insert before.
    NoBody,
}

/// Inserts `script_tag` before the closing `</body>` of `html` unless the
/// document already mentions `marker` (normally the script's file name).
pub fn inject_script(html: &str, script_tag: &str, marker: &str) -> Injection {
    if html.contains(marker) {
        return Injection::AlreadyPresent;
    }
    let body_end = Regex::new(BODY_END_PATTERN).unwrap(); // constant pattern
    match body_end.find_iter(html).last() {
        None => Injection::NoBody,
        Some(m) => Injection::Injected(format!(
            "{}    {}\n{}",
            &html[..m.start()],
            script_tag,
            &html[m.start()..]
        )),
    }
}

/// Escapes text for use inside a double-quoted attribute value.
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// The result of a fallible annotation operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error annotating a post file.
#[derive(Debug)]
pub enum Error {
    /// Returned when a post can't be read.
    Read { path: PathBuf, err: std::io::Error },

    /// Returned when a post can't be written back.
    Write { path: PathBuf, err: std::io::Error },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Read { path, err } => {
                write!(f, "reading post `{}`: {}", path.display(), err)
            }
            Error::Write { path, err } => {
                write!(f, "writing post `{}`: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Read { path: _, err } => Some(err),
            Error::Write { path: _, err } => Some(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::extract_keywords;
    use crate::post::Post;

    fn index_of(posts: &[(&str, &str)]) -> KeywordIndex {
        let posts: Vec<Post> = posts
            .iter()
            .map(|(slug, html)| Post {
                slug: slug.to_string(),
                title: slug.to_string(),
                file_path: PathBuf::from(format!("{}.html", slug)),
                keywords: extract_keywords(html),
            })
            .collect();
        KeywordIndex::build(&posts)
    }

    const POST_A: &str = r#"<html><body>
<div class="keyword-cloud">
    <span class="keyword-tag">Tantra</span>
    <span class="keyword-tag clickable-keyword" data-keyword="chakra">Chakra</span>
    <span class="keyword-tag" id="k3" title='a "quote"'>Kali &amp; Tara</span>
</div>
</body></html>"#;

    const POST_B: &str = r#"<html><body>
<div class="keyword-cloud"><span class="keyword-tag">tantra</span><span class="keyword-tag">Kali &amp; Tara</span></div>
</body></html>"#;

    #[test]
    fn test_annotate_marks_shared_and_unique() {
        let index = index_of(&[("a", POST_A), ("b", POST_B)]);
        let annotated = Annotator::new(&index).annotate(POST_A);

        assert!(annotated
            .html
            .contains(r#"<span class="keyword-tag clickable-keyword" data-keyword="tantra">Tantra</span>"#));
        assert!(annotated
            .html
            .contains(r#"<span class="keyword-tag plain-keyword" data-keyword="chakra">Chakra</span>"#));
        assert!(annotated.html.contains(
            r#"<span class="keyword-tag clickable-keyword" id="k3" title='a "quote"' data-keyword="kali &amp; tara">Kali &amp; Tara</span>"#
        ));
        assert_eq!(
            Stats {
                clickable: 2,
                plain: 1,
                unknown: 0,
                rewritten: 3,
            },
            annotated.stats
        );
    }

    #[test]
    fn test_annotate_preserves_surrounding_markup() {
        let index = index_of(&[("a", POST_A), ("b", POST_B)]);
        let annotated = Annotator::new(&index).annotate(POST_A);
        let strip = |html: &str| Regex::new(r"<span[^>]*>").unwrap().replace_all(html, "<span>").into_owned();
        assert_eq!(strip(POST_A), strip(&annotated.html));
    }

    #[test]
    fn test_annotate_is_idempotent() {
        let index = index_of(&[("a", POST_A), ("b", POST_B)]);
        let annotator = Annotator::new(&index);
        let first = annotator.annotate(POST_A);
        let second = annotator.annotate(&first.html);
        assert!(first.changed());
        assert!(!second.changed());
        assert_eq!(first.html, second.html);
    }

    #[test]
    fn test_annotate_keeps_extracted_keywords() {
        let index = index_of(&[("a", POST_A), ("b", POST_B)]);
        let annotated = Annotator::new(&index).annotate(POST_A);
        assert_eq!(extract_keywords(POST_A), extract_keywords(&annotated.html));
    }

    #[test]
    fn test_annotate_removes_duplicate_and_stale_markers() {
        let html = r#"<span class="keyword-tag clickable-keyword clickable-keyword" data-keyword="nyasa">Nyasa</span>"#;
        let index = index_of(&[("a", html)]);
        let annotated = Annotator::new(&index).annotate(html);
        assert_eq!(
            r#"<span class="keyword-tag plain-keyword" data-keyword="nyasa">Nyasa</span>"#,
            annotated.html
        );
    }

    #[test]
    fn test_annotate_leaves_unknown_keywords_untouched() {
        let index = index_of(&[("a", r#"<span class="keyword-tag">Known</span>"#)]);
        let html = r#"<p><span class="keyword-tag">Stranger</span><span class="note">x</span></p>"#;
        let annotated = Annotator::new(&index).annotate(html);
        assert_eq!(html, annotated.html);
        assert_eq!(1, annotated.stats.unknown);
        assert!(!annotated.changed());
    }

    #[test]
    fn test_annotate_skips_comments_and_scripts() {
        let html = r#"<!-- <span class="keyword-tag">Tantra</span> -->
<script>document.write('<span class="keyword-tag">Tantra</span>');</script>
<span class="keyword-tag">Tantra</span>"#;
        let index = index_of(&[("a", html), ("b", html)]);
        let annotated = Annotator::new(&index).annotate(html);
        assert_eq!(1, annotated.stats.rewritten);
        assert!(annotated.html.starts_with(r#"<!-- <span class="keyword-tag">Tantra</span> -->"#));
    }

    #[test]
    fn test_annotate_decodes_named_entities_like_the_parser() {
        let html = r#"<p><span class="keyword-tag">Shiva&rsquo;s Dance</span><span class="keyword-tag" data-keyword="caf&eacute; &mdash; talks">Caf&eacute; Talks</span></p>"#;
        let index = index_of(&[("a", html), ("b", html)]);
        let annotated = Annotator::new(&index).annotate(html);

        assert_eq!(
            Stats {
                clickable: 2,
                plain: 0,
                unknown: 0,
                rewritten: 2,
            },
            annotated.stats
        );
        assert!(annotated.html.contains(
            "<span class=\"keyword-tag clickable-keyword\" data-keyword=\"shiva\u{2019}s dance\">Shiva&rsquo;s Dance</span>"
        ));
        assert!(annotated
            .html
            .contains("data-keyword=\"caf\u{e9} \u{2014} talks\">Caf&eacute; Talks</span>"));
        assert!(!Annotator::new(&index).annotate(&annotated.html).changed());
    }

    #[test]
    fn test_annotate_file_writes_only_on_change() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.html");
        let b = dir.path().join("b.html");
        fs::write(&a, POST_A).unwrap();
        fs::write(&b, POST_B).unwrap();
        let index = index_of(&[("a", POST_A), ("b", POST_B)]);
        let annotator = Annotator::new(&index);

        let first = annotator.annotate_file(&a)?;
        let after_first = fs::read_to_string(&a).unwrap();
        let second = annotator.annotate_file(&a)?;
        assert_eq!(3, first.rewritten);
        assert_eq!(0, second.rewritten);
        assert_eq!(after_first, fs::read_to_string(&a).unwrap());
        Ok(())
    }

    #[test]
    fn test_inject_script() {
        let tag = r#"<script src="/keyword-navigation.js" defer></script>"#;
        let html = "<html><body>\n<p>post</p>\n</body></html>";
        let injected = match inject_script(html, tag, "keyword-navigation.js") {
            Injection::Injected(html) => html,
            other => panic!("expected injection, got {:?}", other),
        };
        assert_eq!(
            "<html><body>\n<p>post</p>\n    <script src=\"/keyword-navigation.js\" defer></script>\n</body></html>",
            injected
        );
        assert_eq!(
            Injection::AlreadyPresent,
            inject_script(&injected, tag, "keyword-navigation.js")
        );
        assert_eq!(
            Injection::NoBody,
            inject_script("<p>fragment</p>", tag, "keyword-navigation.js")
        );
    }
}
