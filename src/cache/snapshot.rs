//! Cache snapshots and their attachment to asset attributes
//!
//! A [`CacheSnapshot`] records when a cached resource was last confirmed fresh
//! and which invalidation generation was active at that moment. Snapshots are
//! immutable: a refresh replaces the snapshot, it never edits one.
//!
//! The storage layer owns a free-form attribute bag per asset. Snapshots live
//! in a nested sub-map under [`CACHE_ATTRIBUTES_KEY`]:
//!
//! ```json
//! { "cache": { "last_verified": 1700000000000, "cache_token": "18c5..." } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Free-form per-asset attributes owned by the storage collaborator
pub type AttributeBag = Map<String, Value>;

/// Key of the nested cache sub-map inside an [`AttributeBag`]
pub const CACHE_ATTRIBUTES_KEY: &str = "cache";

/// Sub-map key holding the last verification time (millis since epoch)
pub const LAST_VERIFIED_KEY: &str = "last_verified";

/// Sub-map key holding the generation token
pub const CACHE_TOKEN_KEY: &str = "cache_token";

/// Opaque identifier of an invalidation epoch
///
/// Rendered as lowercase hex so it survives any attribute store as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationToken(u64);

impl GenerationToken {
    /// Wrap a raw token value
    #[must_use]
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw token value
    #[must_use]
    #[inline]
    pub const fn get(&self) -> u64 {
        self.0
    }

    /// Parse the hex form produced by `Display`
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        u64::from_str_radix(s, 16).ok().map(Self)
    }
}

impl fmt::Display for GenerationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Freshness record of one cached resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheSnapshot {
    last_verified: u64,
    token: Option<GenerationToken>,
}

impl CacheSnapshot {
    /// Create a snapshot verified at `last_verified_millis` under `token`
    #[must_use]
    pub const fn new(last_verified_millis: u64, token: Option<GenerationToken>) -> Self {
        Self {
            last_verified: last_verified_millis,
            token,
        }
    }

    /// When the resource was last confirmed fresh (millis since epoch)
    #[must_use]
    #[inline]
    pub const fn last_verified(&self) -> u64 {
        self.last_verified
    }

    /// Generation active when the snapshot was taken, if any
    #[must_use]
    #[inline]
    pub const fn token(&self) -> Option<GenerationToken> {
        self.token
    }

    /// Read the snapshot stored in an asset's attributes
    ///
    /// Returns `None` when the asset was never cached under this scheme or the
    /// sub-map is malformed (a malformed snapshot is treated as absent so the
    /// resource gets re-verified).
    #[must_use]
    pub fn extract_from(attributes: &AttributeBag) -> Option<Self> {
        let cache = attributes.get(CACHE_ATTRIBUTES_KEY)?.as_object()?;
        let last_verified = cache.get(LAST_VERIFIED_KEY)?.as_u64()?;
        let token = match cache.get(CACHE_TOKEN_KEY) {
            None | Some(Value::Null) => None,
            Some(value) => Some(GenerationToken::parse(value.as_str()?)?),
        };
        Some(Self::new(last_verified, token))
    }

    /// Write this snapshot into an asset's attributes, replacing any previous one
    pub fn apply_to(&self, attributes: &mut AttributeBag) {
        let mut cache = Map::new();
        cache.insert(LAST_VERIFIED_KEY.to_owned(), Value::from(self.last_verified));
        if let Some(token) = self.token {
            cache.insert(CACHE_TOKEN_KEY.to_owned(), Value::from(token.to_string()));
        }
        attributes.insert(CACHE_ATTRIBUTES_KEY.to_owned(), Value::Object(cache));
    }
}

impl fmt::Display for CacheSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.token {
            Some(token) => write!(f, "verified@{} gen={}", self.last_verified, token),
            None => write!(f, "verified@{} gen=none", self.last_verified),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_from_empty_bag_is_none() {
        assert!(CacheSnapshot::extract_from(&AttributeBag::new()).is_none());
    }

    #[test]
    fn apply_then_extract() {
        let snapshot = CacheSnapshot::new(1_234, Some(GenerationToken::new(0xabc)));
        let mut bag = AttributeBag::new();
        snapshot.apply_to(&mut bag);

        assert_eq!(bag["cache"]["last_verified"], json!(1_234));
        assert_eq!(bag["cache"]["cache_token"], json!("abc"));
        assert_eq!(CacheSnapshot::extract_from(&bag), Some(snapshot));
    }

    #[test]
    fn apply_without_token_omits_key() {
        let snapshot = CacheSnapshot::new(5, None);
        let mut bag = AttributeBag::new();
        snapshot.apply_to(&mut bag);

        assert!(bag["cache"].get("cache_token").is_none());
        assert_eq!(CacheSnapshot::extract_from(&bag), Some(snapshot));
    }

    #[test]
    fn apply_overwrites_previous_snapshot() {
        let mut bag = AttributeBag::new();
        CacheSnapshot::new(1, Some(GenerationToken::new(1))).apply_to(&mut bag);
        CacheSnapshot::new(2, None).apply_to(&mut bag);

        assert_eq!(
            CacheSnapshot::extract_from(&bag),
            Some(CacheSnapshot::new(2, None))
        );
    }

    #[test]
    fn apply_leaves_other_attributes_alone() {
        let mut bag = AttributeBag::new();
        bag.insert("etag".to_owned(), json!("v1"));
        CacheSnapshot::new(1, None).apply_to(&mut bag);

        assert_eq!(bag["etag"], json!("v1"));
    }

    #[test]
    fn malformed_snapshot_is_treated_as_absent() {
        let mut bag = AttributeBag::new();
        bag.insert("cache".to_owned(), json!({ "last_verified": "yesterday" }));
        assert!(CacheSnapshot::extract_from(&bag).is_none());

        bag.insert(
            "cache".to_owned(),
            json!({ "last_verified": 1, "cache_token": "not-hex" }),
        );
        assert!(CacheSnapshot::extract_from(&bag).is_none());

        bag.insert("cache".to_owned(), json!("flat"));
        assert!(CacheSnapshot::extract_from(&bag).is_none());
    }

    #[test]
    fn generation_token_hex_round_trip() {
        let token = GenerationToken::new(u64::MAX);
        assert_eq!(GenerationToken::parse(&token.to_string()), Some(token));
    }
}
