//! Stitches the pipeline stages together: scanning the post store
//! ([`crate::parser`]), indexing ([`crate::index`]), writing the JSON
//! artifacts ([`crate::write`]), annotating posts ([`crate::annotate`]), and
//! installing the navigation widget.
//!
//! Every stage rebuilds the index from the current state of the post store, so
//! any stage can be re-run from scratch after a failure.

use crate::annotate::{
    escape_attribute, inject_script, Annotator, Error as AnnotateError, Injection, Stats,
};
use crate::config::Config;
use crate::index::KeywordIndex;
use crate::navigate::{Navigator, Overlay};
use crate::parser::{Error as ParseError, Parser};
use crate::post::Post;
use crate::util::overwrite;
use crate::write::{Error as WriteError, Writer};
use chrono::Utc;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// The browser widget, bundled into the binary.
pub const WIDGET_SCRIPT: &str = include_str!("../assets/keyword-navigation.js");

/// How many of the most shared keywords the run summary lists.
const SUMMARY_TOP_KEYWORDS: usize = 10;

/// Scans the post store and indexes it. Fails if the post directory is
/// missing or holds no posts.
pub fn scan(config: &Config) -> Result<(Vec<Post>, KeywordIndex)> {
    let parser = Parser::new(config.title_suffix.as_deref());
    let posts = parser.parse_posts(&config.posts_directory)?;
    if posts.is_empty() {
        return Err(Error::NoPosts(config.posts_directory.clone()));
    }
    let index = KeywordIndex::build(&posts);
    log_summary(&index);
    Ok((posts, index))
}

/// Scans, indexes, and writes both JSON artifacts.
pub fn write_index(config: &Config) -> Result<KeywordIndex> {
    let (_, index) = scan(config)?;
    write_artifacts(config, &index)?;
    Ok(index)
}

/// Scans, indexes, and annotates every post's keyword markup.
pub fn annotate_posts(config: &Config) -> Result<Stats> {
    let (posts, index) = scan(config)?;
    annotate(&posts, &index)
}

/// Writes the widget script and injects its `<script>` tag into every post.
/// Returns the number of posts that gained the tag.
pub fn install_widget(config: &Config) -> Result<usize> {
    let (posts, _) = scan(config)?;
    install(config, &posts)
}

/// Runs every stage against a single scan: artifacts, annotation, widget.
pub fn build_all(config: &Config) -> Result<()> {
    let (posts, index) = scan(config)?;
    write_artifacts(config, &index)?;
    annotate(&posts, &index)?;
    install(config, &posts)?;
    Ok(())
}

/// Resolves the posts related to `keyword` the way the browser widget does.
/// Missing or invalid artifacts and keywords that aren't shared yield `None`.
pub fn related(config: &Config, keyword: &str) -> Option<Overlay> {
    let mut navigator =
        Navigator::from_files(&config.index_file, &config.frequency_file, &config.posts_url);
    let key = crate::keyword::normalize(keyword);
    navigator.click(&key).cloned()
}

fn write_artifacts(config: &Config, index: &KeywordIndex) -> Result<()> {
    Writer {
        index_file: &config.index_file,
        frequency_file: &config.frequency_file,
    }
    .write_artifacts(index, Utc::now())?;
    info!(path = %config.index_file.display(), "wrote keyword index");
    info!(path = %config.frequency_file.display(), "wrote keyword frequency table");
    Ok(())
}

fn annotate(posts: &[Post], index: &KeywordIndex) -> Result<Stats> {
    let annotator = Annotator::new(index);
    let mut total = Stats::default();
    let mut updated = 0;
    for post in posts {
        let stats = annotator.annotate_file(&post.file_path)?;
        if stats.rewritten > 0 {
            updated += 1;
            info!(slug = %post.slug, rewritten = stats.rewritten, "annotated post");
        } else {
            debug!(slug = %post.slug, "post already up to date");
        }
        if stats.unknown > 0 {
            warn!(slug = %post.slug, unknown = stats.unknown, "post has keywords missing from the index");
        }
        total += stats;
    }
    info!(
        updated,
        clickable = total.clickable,
        plain = total.plain,
        "annotation complete"
    );
    Ok(total)
}

fn install(config: &Config, posts: &[Post]) -> Result<usize> {
    overwrite(&config.widget_file, WIDGET_SCRIPT.as_bytes()).map_err(|err| Error::Io {
        path: config.widget_file.clone(),
        err,
    })?;
    info!(path = %config.widget_file.display(), "wrote navigation widget");

    let tag = script_tag(config);
    let marker = script_file_name(&config.script_url);
    let mut injected = 0;
    for post in posts {
        let html = fs::read_to_string(&post.file_path).map_err(|err| Error::Io {
            path: post.file_path.clone(),
            err,
        })?;
        match inject_script(&html, &tag, marker) {
            Injection::Injected(html) => {
                overwrite(&post.file_path, html.as_bytes()).map_err(|err| Error::Io {
                    path: post.file_path.clone(),
                    err,
                })?;
                injected += 1;
                debug!(slug = %post.slug, "added navigation script");
            }
            Injection::AlreadyPresent => {}
            Injection::NoBody => {
                warn!(slug = %post.slug, "post has no </body>; navigation script not added")
            }
        }
    }
    info!(injected, "navigation script installed");
    Ok(injected)
}

/// The `<script>` tag that loads the widget and tells it where the artifacts
/// live.
pub fn script_tag(config: &Config) -> String {
    format!(
        r#"<script src="{}" data-index="{}" data-frequency="{}" data-posts="{}" defer></script>"#,
        escape_attribute(&config.script_url),
        escape_attribute(&config.index_url),
        escape_attribute(&config.frequency_url),
        escape_attribute(&config.posts_url),
    )
}

fn script_file_name(script_url: &str) -> &str {
    script_url.rsplit('/').next().unwrap_or(script_url)
}

fn log_summary(index: &KeywordIndex) {
    let shared = index.shared().count();
    info!(
        posts = index.total_posts(),
        keywords = index.entries().len(),
        shared,
        unique = index.entries().len() - shared,
        "indexed post store"
    );
    for (rank, entry) in index.shared().take(SUMMARY_TOP_KEYWORDS).enumerate() {
        info!(
            "  {}. \"{}\" - {} posts",
            rank + 1,
            entry.keyword.key,
            entry.count()
        );
    }
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for running the pipeline. Errors can come from scanning,
/// writing artifacts, annotating posts, and other I/O.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors scanning the post store.
    Parse(ParseError),

    /// Returned when the post directory holds no posts.
    NoPosts(PathBuf),

    /// Returned for errors writing the JSON artifacts.
    Write(WriteError),

    /// Returned for errors annotating posts.
    Annotate(AnnotateError),

    /// Returned for other I/O errors.
    Io { path: PathBuf, err: std::io::Error },
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse(err) => fmt::Display::fmt(err, f),
            Error::NoPosts(path) => {
                write!(f, "no posts found in `{}`", path.display())
            }
            Error::Write(err) => fmt::Display::fmt(err, f),
            Error::Annotate(err) => fmt::Display::fmt(err, f),
            Error::Io { path, err } => {
                write!(f, "`{}`: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(err) => Some(err),
            Error::NoPosts(_) => None,
            Error::Write(err) => Some(err),
            Error::Annotate(err) => Some(err),
            Error::Io { path: _, err } => Some(err),
        }
    }
}

impl From<ParseError> for Error {
    /// Converts [`ParseError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl From<WriteError> for Error {
    /// Converts [`WriteError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: WriteError) -> Error {
        Error::Write(err)
    }
}

impl From<AnnotateError> for Error {
    /// Converts [`AnnotateError`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: AnnotateError) -> Error {
        Error::Annotate(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::parser::extract_keywords;
    use std::path::Path;

    fn post_html(title: &str, keywords: &[&str]) -> String {
        let spans: Vec<String> = keywords
            .iter()
            .map(|k| format!(r#"        <span class="keyword-tag">{}</span>"#, k))
            .collect();
        format!(
            "<!DOCTYPE html>\n<html>\n<head><title>{} | Blog</title></head>\n<body>\n    <article>{}</article>\n    <div class=\"keyword-cloud\">\n{}\n    </div>\n</body>\n</html>\n",
            title,
            title,
            spans.join("\n")
        )
    }

    fn project(dir: &Path) -> Config {
        let posts = dir.join("posts");
        fs::create_dir_all(&posts).unwrap();
        fs::write(posts.join("a.html"), post_html("Alpha", &["Tantra", "Chakra"])).unwrap();
        fs::write(posts.join("b.html"), post_html("Beta", &["tantra"])).unwrap();
        fs::write(posts.join("c.html"), post_html("Gamma", &["Breathwork"])).unwrap();
        fs::write(
            dir.join(crate::config::PROJECT_FILE),
            "title_suffix: \" | Blog\"\n",
        )
        .unwrap();
        Config::from_directory(dir).unwrap()
    }

    fn read_posts(config: &Config) -> Vec<String> {
        ["a.html", "b.html", "c.html"]
            .iter()
            .map(|name| fs::read_to_string(config.posts_directory.join(name)).unwrap())
            .collect()
    }

    #[test]
    fn test_build_all() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        build_all(&config)?;

        let posts = read_posts(&config);
        assert!(posts[0].contains(
            r#"<span class="keyword-tag clickable-keyword" data-keyword="tantra">Tantra</span>"#
        ));
        assert!(posts[0].contains(
            r#"<span class="keyword-tag plain-keyword" data-keyword="chakra">Chakra</span>"#
        ));
        assert!(posts[2].contains(r#"<script src="/keyword-navigation.js""#));
        assert_eq!(WIDGET_SCRIPT, fs::read_to_string(&config.widget_file).unwrap());

        let overlay = related(&config, "Tantra").unwrap();
        let titles: Vec<&str> = overlay.links.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(vec!["Alpha", "Beta"], titles);
        assert!(related(&config, "chakra").is_none());
        Ok(())
    }

    #[test]
    fn test_build_all_twice_is_idempotent() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        build_all(&config)?;
        let first = read_posts(&config);
        build_all(&config)?;
        assert_eq!(first, read_posts(&config));
        Ok(())
    }

    #[test]
    fn test_index_round_trips_through_posts() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        let index = write_index(&config)?;
        annotate_posts(&config)?;

        for entry in index.entries() {
            for file_name in entry.posts.iter() {
                let html = fs::read_to_string(config.posts_directory.join(file_name)).unwrap();
                assert!(
                    extract_keywords(&html).contains(&entry.keyword),
                    "`{}` should declare `{}`",
                    file_name,
                    entry.keyword
                );
            }
        }
        Ok(())
    }

    #[test]
    fn test_related_without_artifacts_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let config = project(dir.path());
        assert!(related(&config, "tantra").is_none());
    }

    #[test]
    fn test_missing_and_empty_post_directories_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_directory(dir.path()).unwrap();
        match scan(&config) {
            Err(Error::Parse(ParseError::MissingPostsDirectory(_))) => {}
            other => panic!("expected a missing directory, got {:?}", other.map(|_| ())),
        }

        fs::create_dir_all(&config.posts_directory).unwrap();
        match scan(&config) {
            Err(Error::NoPosts(_)) => {}
            other => panic!("expected no posts, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_script_tag() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_directory(dir.path()).unwrap();
        assert_eq!(
            r#"<script src="/keyword-navigation.js" data-index="/keyword-index.json" data-frequency="/keyword-frequency.json" data-posts="/posts/" defer></script>"#,
            script_tag(&config)
        );
        assert_eq!("keyword-navigation.js", script_file_name(&config.script_url));
    }
}
