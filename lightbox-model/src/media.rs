use std::borrow::Borrow;
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::bytes::ByteSize;
use crate::error::{ModelError, Result};

/// Opaque identifier of a remote resource, normally its URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ModelError::EmptyKey);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl From<String> for CacheKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Broad media category; only images are fetched into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "&'static str")
)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn is_image(self) -> bool {
        matches!(self, MediaKind::Image)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts bare kinds (`image`) as well as MIME types (`image/jpeg`).
impl FromStr for MediaKind {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        if lowered.starts_with("image") {
            Ok(MediaKind::Image)
        } else if lowered.starts_with("video") {
            Ok(MediaKind::Video)
        } else {
            Err(ModelError::UnknownMediaKind(raw.to_owned()))
        }
    }
}

impl TryFrom<String> for MediaKind {
    type Error = ModelError;

    fn try_from(raw: String) -> Result<Self> {
        raw.parse()
    }
}

impl From<MediaKind> for &'static str {
    fn from(kind: MediaKind) -> Self {
        kind.as_str()
    }
}

/// One entry of an opened gallery. Immutable for the life of the gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaItem {
    #[cfg_attr(feature = "serde", serde(rename = "url"))]
    pub key: CacheKey,
    #[cfg_attr(feature = "serde", serde(default))]
    pub title: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: MediaKind,
    #[cfg_attr(
        feature = "serde",
        serde(rename = "size", default, skip_serializing_if = "Option::is_none")
    )]
    pub declared_size: Option<ByteSize>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub thumbnail: Option<CacheKey>,
}

impl MediaItem {
    pub fn new(
        key: impl Into<CacheKey>,
        title: impl Into<String>,
        kind: MediaKind,
    ) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            kind,
            declared_size: None,
            thumbnail: None,
        }
    }

    pub fn image(key: impl Into<CacheKey>, title: impl Into<String>) -> Self {
        Self::new(key, title, MediaKind::Image)
    }

    pub fn video(key: impl Into<CacheKey>, title: impl Into<String>) -> Self {
        Self::new(key, title, MediaKind::Video)
    }

    pub fn with_declared_size(mut self, size: ByteSize) -> Self {
        self.declared_size = Some(size);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<CacheKey>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// Key the thumbnail strip should display, falling back to the full
    /// resource.
    pub fn thumbnail_key(&self) -> &CacheKey {
        self.thumbnail.as_ref().unwrap_or(&self.key)
    }
}
