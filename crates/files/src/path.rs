//! Client path validation
//!
//! Every location inside the base directory is addressed by a [`RelativePath`]. Validation
//! is purely structural and touches no filesystem: a path is accepted only when it is
//! relative and each of its `/`-separated segments is already in the canonical form a
//! secure-filename sanitiser would produce. A segment such as `..`, `C:`, `.ssh`,
//! `a\b` or `résumé.pdf` changes under sanitisation and is therefore rejected rather than
//! silently rewritten.

use crate::{FilesError, FilesResult, SIDECAR_EXTENSION};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;

/// Device names Windows reserves regardless of extension.
const RESERVED_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// A validated path relative to the base directory.
///
/// Stored as its segments joined by `/`. Joining a `RelativePath` to any directory
/// yields a path inside that directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(String);

impl RelativePath {
    /// Validates a client-supplied path.
    ///
    /// Empty segments and `.` segments are dropped (`a//b/./c` is `a/b/c`).
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidPath`] if the input:
    /// - is empty, or only consists of separators and `.` segments
    /// - is absolute (leading `/` or `\`)
    /// - contains a segment that differs from its canonical safe form
    pub fn parse(raw: &str) -> FilesResult<Self> {
        if raw.starts_with('/') || raw.starts_with('\\') {
            return Err(FilesError::InvalidPath(format!(
                "path must be relative: '{}'",
                raw.escape_debug()
            )));
        }

        let mut segments = Vec::new();
        for segment in raw.split('/') {
            if segment.is_empty() || segment == "." {
                continue;
            }
            if canonical_segment(segment) != segment {
                return Err(FilesError::InvalidPath(format!(
                    "unsafe path segment '{}'",
                    segment.escape_debug()
                )));
            }
            segments.push(segment);
        }

        if segments.is_empty() {
            return Err(FilesError::InvalidPath("path cannot be empty".into()));
        }

        Ok(Self(segments.join("/")))
    }

    /// Builds the destination of an extracted archive entry.
    ///
    /// Entries follow the same rule as client paths: every normal component must already
    /// be in canonical form, so each returned path parses back to itself.
    pub(crate) fn join_entry(prefix: Option<&RelativePath>, entry: &Path) -> FilesResult<Self> {
        let mut segments: Vec<&str> = prefix.map(|p| p.segments().collect()).unwrap_or_default();
        let before = segments.len();

        for component in entry.components() {
            match component {
                Component::Normal(os) => {
                    let segment = os.to_str().ok_or_else(|| {
                        FilesError::InvalidPath(format!(
                            "archive entry is not valid UTF-8: {}",
                            entry.display()
                        ))
                    })?;
                    if canonical_segment(segment) != segment {
                        return Err(FilesError::InvalidPath(format!(
                            "unsafe archive entry name: '{}'",
                            segment.escape_debug()
                        )));
                    }
                    segments.push(segment);
                }
                Component::CurDir => {}
                _ => {
                    return Err(FilesError::InvalidPath(format!(
                        "archive entry escapes extraction root: {}",
                        entry.display()
                    )));
                }
            }
        }

        if segments.len() == before {
            return Err(FilesError::InvalidPath(format!(
                "archive entry has no file name: {}",
                entry.display()
            )));
        }

        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the path's segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// Returns the final segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Returns the containing path, or `None` for a top-level entry.
    pub fn parent(&self) -> Option<RelativePath> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| Self(parent.to_owned()))
    }

    /// Returns true if the final segment ends in `.<ext>`, ignoring case.
    pub fn extension_is(&self, ext: &str) -> bool {
        Path::new(self.file_name())
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Path of the checksum sidecar that accompanies this file.
    pub fn sidecar(&self) -> RelativePath {
        Self(format!("{}.{}", self.0, SIDECAR_EXTENSION))
    }

    /// Resolves this path under `base`.
    pub fn to_path(&self, base: &Path) -> PathBuf {
        let mut path = base.to_path_buf();
        path.extend(self.segments());
        path
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for RelativePath {
    type Err = FilesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for RelativePath {
    type Error = FilesError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl serde::Serialize for RelativePath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for RelativePath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RelativePath::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Reduces a single path segment to its filesystem-safe form.
///
/// The segment is NFKD-decomposed and what is left outside ASCII is dropped, so `ü`
/// becomes `u`. Separators become whitespace, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9_.-]` is removed and leading/trailing `.`/`_` are stripped.
/// Reserved device names get a `_` prefix.
pub(crate) fn canonical_segment(segment: &str) -> String {
    let ascii: String = segment
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_ascii_whitespace().collect::<Vec<_>>().join("_");

    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = filtered.trim_matches(|c| c == '.' || c == '_');

    if is_reserved_device_name(trimmed) {
        format!("_{trimmed}")
    } else {
        trimmed.to_owned()
    }
}

fn is_reserved_device_name(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or(name);
    RESERVED_DEVICE_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
}
