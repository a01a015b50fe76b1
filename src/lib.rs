//! The library code for `keyweave`, which indexes the keyword clouds of a
//! static blog. The architecture breaks down into a batch pipeline and the
//! consumer of its output:
//!
//! 1. Scanning posts from the post directory and extracting their keywords
//!    ([`crate::parser`], [`crate::keyword`])
//! 2. Building the inverted index and the shared/unique frequency table
//!    ([`crate::index`])
//! 3. Writing both as JSON artifacts ([`crate::write`])
//! 4. Rewriting each post's keyword markup so shared keywords are clickable and
//!    unique keywords are plain ([`crate::annotate`])
//! 5. Resolving keyword clicks into "related posts" overlays from the
//!    artifacts ([`crate::navigate`]), which is what the bundled browser
//!    widget does on the live site
//!
//! The index is a cache: it's rebuilt from the posts on every run and nothing
//! merges with a previous run's output. [`crate::build`] ties the stages
//! together.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod annotate;
pub mod build;
pub mod config;
pub mod index;
pub mod keyword;
pub mod navigate;
pub mod parser;
pub mod post;
pub mod write;

mod util;
