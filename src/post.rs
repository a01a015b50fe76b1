//! Defines the [`Post`] type, the in-memory form of one HTML file in the post
//! store.

use crate::keyword::Keyword;
use std::path::PathBuf;

/// The file extension of post files.
pub const HTML_EXTENSION: &str = ".html";

/// Represents a single blog post as scanned from the post store.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    /// The post's slug: its file name less the `.html` extension.
    pub slug: String,

    /// The post's title, taken from the document's `<title>` (see
    /// [`crate::parser::extract_title`]).
    pub title: String,

    /// The location of the post's HTML file on disk.
    pub file_path: PathBuf,

    /// The keywords declared by the post's keyword cloud in first-seen order
    /// without duplicates.
    pub keywords: Vec<Keyword>,
}

impl Post {
    /// The post's file name (`{slug}.html`). This is the identifier used in
    /// the JSON artifacts.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.slug, HTML_EXTENSION)
    }
}
