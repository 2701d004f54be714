//! Validated value types shared across the filing crates.
//!
//! - [`ScanPath`]: a location inside a Nextcloud instance (a user id or a folder)
//! - [`Sha256Hex`]: a SHA-256 digest in canonical lowercase hex form

use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing a [`ScanPath`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScanPathError {
    /// Nothing but whitespace and separators was given
    #[error("Nextcloud path cannot be empty")]
    Empty,

    /// A segment was `.` or `..`, empty, or contained a control character
    #[error("invalid Nextcloud path segment '{0}'")]
    Segment(String),
}

/// Errors that can occur when parsing a hex digest.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DigestError {
    /// The input did not have exactly 64 characters
    #[error("SHA-256 digest must be 64 hex characters, got {0}")]
    Length(usize),

    /// The input contained a character outside `0-9a-fA-F`
    #[error("SHA-256 digest contains non-hex characters")]
    NotHex,
}

/// A `/`-separated location inside a Nextcloud instance.
///
/// Surrounding whitespace and slashes are stripped, so `/uploads/` and `uploads` are the
/// same folder. The value is interpolated into the `--path` argument of `occ files:scan`
/// and therefore may not step outside the user's files with `..`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPath(String);

impl ScanPath {
    /// Parses a user id or folder.
    ///
    /// # Errors
    ///
    /// Returns [`ScanPathError::Empty`] for blank input, and [`ScanPathError::Segment`] for
    /// an empty, `.` or `..` segment or one containing a control character.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, ScanPathError> {
        let trimmed = input.as_ref().trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(ScanPathError::Empty);
        }

        if let Some(bad) = trimmed.split('/').find(|segment| {
            segment.is_empty()
                || *segment == "."
                || *segment == ".."
                || segment.chars().any(char::is_control)
        }) {
            return Err(ScanPathError::Segment(bad.escape_debug().to_string()));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// True when the path is a single name, as a user id must be.
    pub fn is_single_segment(&self) -> bool {
        !self.0.contains('/')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ScanPath {
    type Err = ScanPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A SHA-256 digest as 64 lowercase hexadecimal characters.
///
/// Digests supplied by clients may use either case; parsing normalises them so that
/// two values compare equal whenever they describe the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sha256Hex(String);

impl Sha256Hex {
    /// Builds the hex form of a raw 32-byte digest.
    pub fn from_digest(bytes: &[u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Parses a hex digest in either case.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError`] if the input is not exactly 64 hex characters.
    pub fn parse(input: &str) -> Result<Self, DigestError> {
        if input.len() != 64 {
            return Err(DigestError::Length(input.len()));
        }
        if !input.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DigestError::NotHex);
        }
        Ok(Self(input.to_ascii_lowercase()))
    }

    /// Returns true if `expected` names the same digest, ignoring case.
    ///
    /// Malformed input never matches.
    pub fn matches(&self, expected: &str) -> bool {
        self.0.eq_ignore_ascii_case(expected.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Sha256Hex {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Sha256Hex {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for Sha256Hex {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Sha256Hex {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Sha256Hex::parse(&s).map_err(serde::de::Error::custom)
    }
}
