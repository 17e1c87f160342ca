//! Event tags.
//!
//! A tag addresses one event and doubles as its subdomain, so it must be a
//! valid DNS label: 1-63 bytes of `[a-z0-9-]`, no leading or trailing `-`.

use std::fmt;
use thiserror::Error;

const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("tag is empty")]
    Empty,

    #[error("tag is {0} bytes long, the limit is 63")]
    TooLong(usize),

    #[error("tag contains invalid character {0:?}")]
    InvalidChar(char),

    #[error("tag may not start or end with '-'")]
    EdgeHyphen,
}

/// Identifier of one running event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
    pub fn new(tag: impl Into<String>) -> Result<Self, TagError> {
        let tag = tag.into();
        validate_label(&tag)?;
        Ok(Self(tag))
    }

    /// Build a tag from a host label, ignoring ASCII case.
    pub fn from_label(label: &str) -> Result<Self, TagError> {
        Self::new(label.to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Tag {
    type Error = TagError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

/// Check one DNS label (lowercase form).
pub(crate) fn validate_label(label: &str) -> Result<(), TagError> {
    if label.is_empty() {
        return Err(TagError::Empty);
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(TagError::TooLong(label.len()));
    }
    if let Some(c) = label
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(TagError::InvalidChar(c));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(TagError::EdgeHyphen);
    }
    Ok(())
}
