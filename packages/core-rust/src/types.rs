use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a post identifier in bytes.
pub const MAX_POST_ID_LEN: usize = 256;

/// Rejected post identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidPostId {
    /// The identifier was empty or only whitespace.
    #[error("post id must not be empty")]
    Empty,
    /// The identifier exceeded [`MAX_POST_ID_LEN`] bytes.
    #[error("post id is {len} bytes, limit is {MAX_POST_ID_LEN}")]
    TooLong { len: usize },
}

/// Validated identifier of a post.
///
/// Surrounding whitespace is trimmed on construction, so `" abc "` and
/// `"abc"` name the same post. Serializes as a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostId(String);

impl PostId {
    /// Validates and wraps a post identifier.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPostId`] if the trimmed id is empty or too long.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, InvalidPostId> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(InvalidPostId::Empty);
        }
        if trimmed.len() > MAX_POST_ID_LEN {
            return Err(InvalidPostId::TooLong { len: trimmed.len() });
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PostId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PostId {
    type Error = InvalidPostId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for PostId {
    type Error = InvalidPostId;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PostId> for String {
    fn from(id: PostId) -> Self {
        id.0
    }
}

/// Immutable snapshot of pending view increments taken by one drain.
///
/// Never holds zero counts. Entries iterate in post id order so sinks
/// that write row by row always lock rows in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushBatch {
    increments: BTreeMap<PostId, u64>,
}

impl FlushBatch {
    /// Builds a batch from `(post, increment)` pairs, summing duplicates
    /// and dropping zero increments.
    pub fn from_counts(counts: impl IntoIterator<Item = (PostId, u64)>) -> Self {
        let mut increments = BTreeMap::new();
        for (post, count) in counts {
            if count > 0 {
                let slot = increments.entry(post).or_insert(0u64);
                *slot = slot.saturating_add(count);
            }
        }
        Self { increments }
    }

    /// Number of distinct posts in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.increments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.increments.is_empty()
    }

    /// Increment recorded for `post`, if any.
    #[must_use]
    pub fn get(&self, post: &str) -> Option<u64> {
        self.increments.get(post).copied()
    }

    /// Iterates `(post, increment)` pairs in post id order.
    pub fn iter(&self) -> impl Iterator<Item = (&PostId, u64)> + '_ {
        self.increments.iter().map(|(post, count)| (post, *count))
    }

    /// Sum of all increments in the batch.
    #[must_use]
    pub fn total_views(&self) -> u64 {
        self.increments
            .values()
            .fold(0u64, |acc, count| acc.saturating_add(*count))
    }
}

impl IntoIterator for FlushBatch {
    type Item = (PostId, u64);
    type IntoIter = std::collections::btree_map::IntoIter<PostId, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.increments.into_iter()
    }
}
