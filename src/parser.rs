//! Defines the [`Parser`] and [`Error`] types along with the keyword
//! extraction functions. Posts are parsed into a DOM with [`scraper`] and the
//! keyword cloud is read off the `span` elements that carry keyword-tag
//! markup (see [`extract_keywords`]).

use std::{
    collections::HashSet,
    fmt,
    fs,
    path::{Path, PathBuf},
};

use scraper::{Html, Selector};
use tracing::debug;
use walkdir::WalkDir;

use crate::keyword::Keyword;
use crate::post::{Post, HTML_EXTENSION};

/// Matches keyword-tag spans: anything with the `keyword-tag` class, or any
/// span that carries a `data-keyword` attribute.
const KEYWORD_SELECTOR: &str = "span.keyword-tag, span[data-keyword]";

/// Parses [`Post`] objects from the post store.
pub struct Parser<'a> {
    /// `title_suffix` is removed from the end of every post title (e.g.,
    /// `" | My Blog"` for documents titled `"Hello | My Blog"`).
    title_suffix: Option<&'a str>,
}

impl<'a> Parser<'a> {
    /// Constructs a new parser. See fields on [`Parser`] for argument
    /// descriptions.
    pub fn new(title_suffix: Option<&'a str>) -> Parser<'a> {
        Parser { title_suffix }
    }

    /// Parses a single [`Post`] from its slug, its location, and its HTML.
    /// This never fails; a document without keyword markup simply yields a
    /// post with no keywords.
    pub fn parse_str(&self, slug: &str, file_path: &Path, html: &str) -> Post {
        let document = Html::parse_document(html);
        Post {
            slug: slug.to_owned(),
            title: title_of(&document, self.title_suffix)
                .unwrap_or_else(|| slug.to_owned()),
            file_path: file_path.to_owned(),
            keywords: keywords_of(&document),
        }
    }

    /// Reads and parses the post at `file_path`. The slug is the file name
    /// less its extension.
    pub fn parse_post(&self, file_path: &Path) -> Result<Post> {
        let slug = file_path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(HTML_EXTENSION))
            .ok_or_else(|| Error::InvalidFileName(file_path.to_owned()))?;
        let html = fs::read_to_string(file_path).map_err(|err| Error::Read {
            path: file_path.to_owned(),
            err,
        })?;
        let post = self.parse_str(slug, file_path, &html);
        debug!(
            slug = %post.slug,
            keywords = post.keywords.len(),
            "parsed post"
        );
        Ok(post)
    }

    /// Searches `posts_directory` for post files and returns the parsed posts
    /// in scan order. The scan is not recursive and is sorted by file name so
    /// that repeated runs see the posts in the same order. Post files are
    /// files ending in `.html`, excluding dot-files and `index.html`.
    pub fn parse_posts(&self, posts_directory: &Path) -> Result<Vec<Post>> {
        if !posts_directory.is_dir() {
            return Err(Error::MissingPostsDirectory(posts_directory.to_owned()));
        }

        let mut posts = Vec::new();
        for result in WalkDir::new(posts_directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = result?;
            if entry.file_type().is_file() && is_post_file_name(&entry.file_name().to_string_lossy())
            {
                posts.push(self.parse_post(entry.path())?);
            }
        }
        Ok(posts)
    }
}

/// Reports whether a file in the post directory is a post.
pub fn is_post_file_name(file_name: &str) -> bool {
    file_name.ends_with(HTML_EXTENSION) && !file_name.starts_with('.') && file_name != "index.html"
}

/// Returns the keywords declared in `html` in first-seen order without
/// duplicates. Spans with neither text nor a `data-keyword` value are
/// skipped.
pub fn extract_keywords(html: &str) -> Vec<Keyword> {
    keywords_of(&Html::parse_document(html))
}

/// Returns the post title: the `<title>` text less `suffix`, or the first
/// `<h1>` when there is no usable `<title>`.
pub fn extract_title(html: &str, suffix: Option<&str>) -> Option<String> {
    title_of(&Html::parse_document(html), suffix)
}

fn keywords_of(document: &Html) -> Vec<Keyword> {
    let selector = Selector::parse(KEYWORD_SELECTOR).unwrap(); // constant selector

    let mut seen: HashSet<Keyword> = HashSet::new();
    let mut keywords = Vec::new();
    for span in document.select(&selector) {
        let text: String = span.text().collect();
        let attr = span.value().attr("data-keyword").unwrap_or_default();
        if let Some(keyword) = Keyword::with_key(&text, attr) {
            if seen.insert(keyword.clone()) {
                keywords.push(keyword);
            }
        }
    }
    keywords
}

fn title_of(document: &Html, suffix: Option<&str>) -> Option<String> {
    for tag in ["title", "h1"].iter() {
        let selector = Selector::parse(tag).unwrap(); // constant selector
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<String>();
            let mut title = text.trim();
            if let Some(suffix) = suffix {
                title = title.strip_suffix(suffix).unwrap_or(title).trim_end();
            }
            if !title.is_empty() {
                return Some(title.to_owned());
            }
        }
    }
    None
}

/// Represents the result of a [`Post`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error scanning the post store.
#[derive(Debug)]
pub enum Error {
    /// Returned when the post directory doesn't exist or isn't a directory.
    MissingPostsDirectory(PathBuf),

    /// Returned when a post's file name isn't valid UTF-8 or lacks the
    /// `.html` extension.
    InvalidFileName(PathBuf),

    /// Returned when a post file can't be read.
    Read { path: PathBuf, err: std::io::Error },

    /// Returned for WalkDir I/O errors.
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingPostsDirectory(path) => {
                write!(f, "post directory `{}` does not exist", path.display())
            }
            Error::InvalidFileName(path) => {
                write!(f, "invalid file name: {:?}", path)
            }
            Error::Read { path, err } => {
                write!(f, "reading post `{}`: {}", path.display(), err)
            }
            Error::WalkDir(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MissingPostsDirectory(_) => None,
            Error::InvalidFileName(_) => None,
            Error::Read { path: _, err } => Some(err),
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator while walking the post directory.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
