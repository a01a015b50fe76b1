//! Serializes a [`KeywordIndex`] into the two JSON artifacts consumed by the
//! navigation widget:
//!
//! * the inverted index (`keyword-index.json` by default), mapping keywords to
//!   post file names plus a reverse map from post file name to title and
//!   keywords;
//! * the frequency table (`keyword-frequency.json` by default), listing shared
//!   and unique keywords with their posts.
//!
//! JSON object keys are emitted in first-seen order rather than sorted. Both
//! artifacts are whole-file overwrites (see [`crate::util::overwrite`]).

use crate::index::{Entry, KeywordIndex, PostEntry};
use crate::util::overwrite;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Responsible for writing the JSON artifacts for a [`KeywordIndex`].
pub struct Writer<'a> {
    /// The destination of the inverted-index artifact.
    pub index_file: &'a Path,

    /// The destination of the frequency-table artifact.
    pub frequency_file: &'a Path,
}

impl Writer<'_> {
    /// Writes both artifacts. `generated_at` is recorded in the frequency
    /// table.
    pub fn write_artifacts(&self, index: &KeywordIndex, generated_at: DateTime<Utc>) -> Result<()> {
        write_file(self.index_file, &index_json(index)?)?;
        write_file(self.frequency_file, &frequency_json(index, generated_at)?)?;
        Ok(())
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    overwrite(path, contents).map_err(|err| Error::Io {
        path: path.to_owned(),
        err,
    })
}

/// Renders the inverted-index artifact.
pub fn index_json(index: &KeywordIndex) -> Result<Vec<u8>> {
    to_json(&IndexDocument {
        keywords: KeywordMap(index.entries()),
        posts: PostMap(index.posts()),
    })
}

/// Renders the frequency-table artifact.
pub fn frequency_json(index: &KeywordIndex, generated_at: DateTime<Utc>) -> Result<Vec<u8>> {
    to_json(&FrequencyDocument {
        shared: index
            .shared()
            .map(|entry| SharedKeyword {
                keyword: &entry.keyword.key,
                count: entry.count(),
                posts: &entry.posts,
            })
            .collect(),
        unique: index
            .unique()
            .map(|entry| UniqueKeyword {
                keyword: &entry.keyword.key,
                posts: &entry.posts,
            })
            .collect(),
        map: KeywordMap(index.entries()),
        total_posts: index.total_posts(),
        generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut json = serde_json::to_vec_pretty(value)?;
    json.push(b'\n');
    Ok(json)
}

#[derive(Serialize)]
struct IndexDocument<'a> {
    keywords: KeywordMap<'a>,
    posts: PostMap<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FrequencyDocument<'a> {
    shared: Vec<SharedKeyword<'a>>,
    unique: Vec<UniqueKeyword<'a>>,
    map: KeywordMap<'a>,
    total_posts: usize,
    generated_at: String,
}

#[derive(Serialize)]
struct SharedKeyword<'a> {
    keyword: &'a str,
    count: usize,
    posts: &'a [String],
}

#[derive(Serialize)]
struct UniqueKeyword<'a> {
    keyword: &'a str,
    posts: &'a [String],
}

#[derive(Serialize)]
struct PostMetadata<'a> {
    title: &'a str,
    slug: &'a str,
    keywords: &'a [String],
}

/// Serializes entries as a `{ key: [post, ...] }` object in entry order.
struct KeywordMap<'a>(&'a [Entry]);

impl Serialize for KeywordMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in self.0 {
            map.serialize_entry(&entry.keyword.key, &entry.posts)?;
        }
        map.end()
    }
}

/// Serializes post metadata as a `{ file_name: {...} }` object in scan order.
struct PostMap<'a>(&'a [PostEntry]);

impl Serialize for PostMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for post in self.0 {
            map.serialize_entry(
                &post.file_name,
                &PostMetadata {
                    title: &post.title,
                    slug: &post.slug,
                    keywords: &post.keywords,
                },
            )?;
        }
        map.end()
    }
}

/// The result of a fallible artifact-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error writing an artifact.
#[derive(Debug)]
pub enum Error {
    /// An error serializing an artifact.
    Json(serde_json::Error),

    /// An error writing an artifact to disk.
    Io { path: PathBuf, err: std::io::Error },
}

impl From<serde_json::Error> for Error {
    /// Converts a [`serde_json::Error`] into an [`Error`]. This allows us to
    /// use the `?` operator for serialization.
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Json(err) => fmt::Display::fmt(err, f),
            Error::Io { path, err } => {
                write!(f, "writing `{}`: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(err) => Some(err),
            Error::Io { path: _, err } => Some(err),
        }
    }
}
