//! Builds the keyword index for a set of [`Post`]s. The index is a derived
//! cache: it's rebuilt from scratch on every run by [`KeywordIndex::build`] and
//! is never edited afterwards.
//!
//! A [`KeywordIndex`] holds three views of the same scan:
//!
//! 1. The inverted index: keyword key to the posts that declare it, in the
//!    order the keywords were first seen.
//! 2. The frequency table: the keywords partitioned into *shared* (declared by
//!    two or more posts) and *unique* (declared by exactly one post).
//! 3. The post metadata used for reverse lookups (title and keyword labels per
//!    post).

use crate::keyword::Keyword;
use crate::post::Post;
use std::collections::HashMap;

/// The minimum number of posts that must declare a keyword for it to be
/// shared.
pub const SHARED_THRESHOLD: usize = 2;

/// An inverted-index entry: one keyword and every post that declares it.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    /// The keyword as it was first seen during the scan.
    pub keyword: Keyword,

    /// The file names (`{slug}.html`) of the posts that declare the keyword,
    /// in scan order.
    pub posts: Vec<String>,
}

impl Entry {
    /// The number of distinct posts that declare the keyword.
    pub fn count(&self) -> usize {
        self.posts.len()
    }
}

/// Reverse-lookup metadata for a post that declares at least one keyword.
#[derive(Clone, Debug, PartialEq)]
pub struct PostEntry {
    pub file_name: String,
    pub slug: String,
    pub title: String,

    /// The keyword labels declared by the post, in document order.
    pub keywords: Vec<String>,
}

/// The frequency class of a keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Declared by [`SHARED_THRESHOLD`] or more posts. Rendered clickable.
    Shared,

    /// Declared by exactly one post. Rendered plain.
    Unique,
}

/// The result of indexing a post store. See the module documentation.
#[derive(Clone, Debug, Default)]
pub struct KeywordIndex {
    entries: Vec<Entry>,
    positions: HashMap<String, usize>,
    shared: Vec<usize>,
    unique: Vec<usize>,
    posts: Vec<PostEntry>,
    total_posts: usize,
}

impl KeywordIndex {
    /// Indexes `posts`, which must be in scan order. Keywords are grouped by
    /// exact key equality; a keyword repeated within a post counts once.
    pub fn build(posts: &[Post]) -> KeywordIndex {
        let mut entries: Vec<Entry> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut post_entries = Vec::new();

        for post in posts {
            if post.keywords.is_empty() {
                continue;
            }
            let file_name = post.file_name();
            for keyword in post.keywords.iter() {
                match positions.get(&keyword.key) {
                    None => {
                        positions.insert(keyword.key.clone(), entries.len());
                        entries.push(Entry {
                            keyword: keyword.clone(),
                            posts: vec![file_name.clone()],
                        });
                    }
                    Some(&i) => {
                        let entry = &mut entries[i];
                        if entry.posts.last() != Some(&file_name) {
                            entry.posts.push(file_name.clone());
                        }
                    }
                }
            }
            post_entries.push(PostEntry {
                file_name,
                slug: post.slug.clone(),
                title: post.title.clone(),
                keywords: post.keywords.iter().map(|k| k.label.clone()).collect(),
            });
        }

        let (mut shared, unique): (Vec<usize>, Vec<usize>) =
            (0..entries.len()).partition(|&i| entries[i].count() >= SHARED_THRESHOLD);
        // `sort_by` is stable, so ties stay in first-seen order.
        shared.sort_by(|&a, &b| entries[b].count().cmp(&entries[a].count()));

        KeywordIndex {
            entries,
            positions,
            shared,
            unique,
            posts: post_entries,
            total_posts: posts.len(),
        }
    }

    /// All inverted-index entries in first-seen order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Looks up the entry for a keyword. `key` is normalized first, so any
    /// casing of the keyword finds its entry.
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.positions
            .get(&crate::keyword::normalize(key))
            .map(|&i| &self.entries[i])
    }

    /// Classifies a keyword. Returns `None` for keywords no post declares.
    pub fn classify(&self, key: &str) -> Option<Classification> {
        self.get(key).map(|entry| match entry.count() >= SHARED_THRESHOLD {
            true => Classification::Shared,
            false => Classification::Unique,
        })
    }

    /// The shared keywords sorted by descending post count, ties broken by
    /// first-seen order.
    pub fn shared(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.shared.iter().map(move |&i| &self.entries[i])
    }

    /// The unique keywords in first-seen order.
    pub fn unique(&self) -> impl Iterator<Item = &Entry> + '_ {
        self.unique.iter().map(move |&i| &self.entries[i])
    }

    /// Metadata for every post that declares at least one keyword, in scan
    /// order.
    pub fn posts(&self) -> &[PostEntry] {
        &self.posts
    }

    /// The number of posts scanned, including posts without keywords.
    pub fn total_posts(&self) -> usize {
        self.total_posts
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
