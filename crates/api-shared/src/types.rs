use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Files written by one upload, keyed by their path relative to the upload directory.
///
/// Serialises as `{ "<path>": [size, sha256], ... }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploadRes(#[schema(value_type = Object)] BTreeMap<String, (u64, String)>);

impl UploadRes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, size: u64, sha256: impl Into<String>) {
        self.0.insert(path.into(), (size, sha256.into()));
    }

}

impl<P: Into<String>, D: Into<String>> FromIterator<(P, u64, D)> for UploadRes {
    fn from_iter<I: IntoIterator<Item = (P, u64, D)>>(iter: I) -> Self {
        let mut res = Self::new();
        for (path, size, sha256) in iter {
            res.insert(path, size, sha256);
        }
        res
    }
}
