//! Defines the [`Keyword`] type, which represents one entry in a post's
//! keyword cloud.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Represents a keyword declared by a [`crate::post::Post`]. A keyword has two
/// forms: the `label`, which is the text as it was first seen and is used for
/// display, and the `key`, which is the normalized form used for indexing,
/// grouping, and the `data-keyword` attribute.
#[derive(Clone, Debug)]
pub struct Keyword {
    /// The keyword's display text with surrounding whitespace trimmed and
    /// internal runs of whitespace collapsed. Casing is preserved.
    pub label: String,

    /// The keyword's normalized form (see [`normalize`]). `Tantra` and
    /// `tantra` share the key `tantra`.
    pub key: String,
}

impl Keyword {
    /// Builds a keyword from its display text. Returns `None` if the text is
    /// blank.
    pub fn new(label: &str) -> Option<Keyword> {
        Keyword::with_key(label, label)
    }

    /// Builds a keyword whose key comes from a separate source (typically the
    /// `data-keyword` attribute). A blank `key_source` falls back to the
    /// label, and a blank label falls back to the key source. Returns `None`
    /// if both are blank.
    pub fn with_key(label: &str, key_source: &str) -> Option<Keyword> {
        let label = collapse_whitespace(label);
        let key_source = collapse_whitespace(key_source);
        let key = match key_source.is_empty() {
            false => normalize(&key_source),
            true => normalize(&label),
        };
        if key.is_empty() {
            return None;
        }
        Some(Keyword {
            label: match label.is_empty() {
                false => label,
                true => key_source,
            },
            key,
        })
    }
}

impl Hash for Keyword {
    /// Implements [`Hash`] for [`Keyword`] by delegating directly to the `key`
    /// field.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state)
    }
}

impl PartialEq for Keyword {
    /// Implements [`PartialEq`] and [`Eq`] for [`Keyword`] by delegating
    /// directly to the `key` field.
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for Keyword {}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// Normalizes keyword text into an index key: trims, collapses whitespace, and
/// lowercases. No stemming; `yoga` and `kundalini yoga` are different keys.
pub fn normalize(text: &str) -> String {
    collapse_whitespace(text).to_lowercase()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}
