//! Resource tags

use serde::{Deserialize, Serialize};

/// Tag key marking the user that launched a cluster
pub const CREATOR_TAG: &str = "creator";

/// Tag key protecting a cluster from teardown without `--force`
pub const KEEP_ALIVE_TAG: &str = "keep_alive";

/// A single key/value tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Ordered set of tags applied to every created resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(Vec<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a tag, replacing any existing tag with the same key
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let tag = Tag::new(key, value);
        match self.0.iter_mut().find(|existing| existing.key == tag.key) {
            Some(existing) => existing.value = tag.value,
            None => self.0.push(tag),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|tag| tag.key == key)
            .map(|tag| tag.value.as_str())
    }

    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.get(key) == Some(value)
    }

    /// Whether the keep-alive protection is switched on
    pub fn is_keep_alive(&self) -> bool {
        self.contains(KEEP_ALIVE_TAG, "true")
    }

    pub fn is_created_by(&self, username: &str) -> bool {
        self.contains(CREATOR_TAG, username)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        iter.into_iter()
            .fold(TagSet::new(), |set, tag| set.with(tag.key, tag.value))
    }
}
