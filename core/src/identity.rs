//! Content-addressed identity types for codeintel entities.
//!
//! Every ID in this crate is derived from a SHA-256 hash of the entity's
//! content-bearing fields, truncated to 16 hex characters (8 bytes). Two
//! entities with identical inputs always receive identical IDs; this is what
//! lets reindexing the same unchanged file produce byte-identical span IDs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

/// Width, in bytes, of a truncated content digest. Hex-encoded this is 16
/// characters, matching the spec's stated ID width.
pub const DIGEST_BYTES: usize = 8;

/// Trait for type-safe, content-addressed entity IDs.
///
/// Mirrors the compile-time safety of a UUID newtype scheme, but the
/// underlying value is a truncated content hash rather than a random or
/// time-ordered value: identical inputs always produce the identical ID.
pub trait ContentIdType:
    Copy
    + Clone
    + Eq
    + PartialEq
    + Hash
    + fmt::Debug
    + fmt::Display
    + FromStr
    + Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// The name of the entity type (e.g. "span", "chunk").
    const ENTITY_NAME: &'static str;

    /// Wrap a raw digest into this ID type.
    fn from_digest(digest: [u8; DIGEST_BYTES]) -> Self;

    /// The underlying digest bytes.
    fn as_digest(&self) -> [u8; DIGEST_BYTES];

    /// The all-zero digest, used as a sentinel "no ID" value.
    fn nil() -> Self {
        Self::from_digest([0u8; DIGEST_BYTES])
    }
}

/// Error returned when a content ID fails to parse from its hex string form.
#[derive(Debug, Clone)]
pub struct ContentIdParseError {
    pub entity_name: &'static str,
    pub input: String,
    pub reason: &'static str,
}

impl fmt::Display for ContentIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to parse {} ID from '{}': {}",
            self.entity_name, self.input, self.reason
        )
    }
}

impl std::error::Error for ContentIdParseError {}

fn parse_digest(s: &str) -> Result<[u8; DIGEST_BYTES], &'static str> {
    if s.len() != DIGEST_BYTES * 2 {
        return Err("expected 16 hex characters");
    }
    let bytes = hex::decode(s).map_err(|_| "not valid hex")?;
    let mut digest = [0u8; DIGEST_BYTES];
    digest.copy_from_slice(&bytes);
    Ok(digest)
}

/// Defines a type-safe, content-addressed ID newtype backed by an 8-byte
/// truncated SHA-256 digest, hex-encoded for `Display`/serde.
macro_rules! define_content_id {
    ($name:ident, $entity:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        pub struct $name([u8; DIGEST_BYTES]);

        impl ContentIdType for $name {
            const ENTITY_NAME: &'static str = $entity;

            fn from_digest(digest: [u8; DIGEST_BYTES]) -> Self {
                Self(digest)
            }

            fn as_digest(&self) -> [u8; DIGEST_BYTES] {
                self.0
            }
        }

        impl $name {
            /// Derive this ID from already-canonicalized field bytes.
            pub fn from_fields(fields: &[(&str, serde_json::Value)]) -> Self {
                Self(hash_fields(fields))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = ContentIdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_digest(s).map(Self).map_err(|reason| ContentIdParseError {
                    entity_name: Self::ENTITY_NAME,
                    input: s.to_string(),
                    reason,
                })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

define_content_id!(SpanId, "span", "Content-addressed ID for a source span.");
define_content_id!(ChunkId, "chunk", "Content-addressed ID for a retrieval chunk.");
define_content_id!(
    QueryFingerprint,
    "query_fingerprint",
    "Deterministic fingerprint over a query's cache-relevant inputs."
);
define_content_id!(
    BundleSignature,
    "bundle_signature",
    "Content signature of an assembled bundle, used for cache invalidation."
);
define_content_id!(
    CacheKey,
    "cache_key",
    "Opaque content-addressed key for a cache fabric entry."
);

/// Timestamp type used throughout the crate.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Duration in milliseconds, used for TTL and timeout values.
pub type DurationMs = i64;

/// Full (untruncated) SHA-256 content hash, used for file/content integrity.
pub type ContentHash = [u8; 32];

/// Compute the full SHA-256 hash of a byte slice.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Hex-encode a full content hash for storage/display.
pub fn content_hash_hex(hash: &ContentHash) -> String {
    hex::encode(hash)
}

/// Sentinel JSON value substituted for a field that is absent, distinguishing
/// "field not supplied" from "field present and null" in the canonicalized
/// input tuple.
fn null_sentinel() -> serde_json::Value {
    serde_json::Value::String("\u{0}__codeintel_null__\u{0}".to_string())
}

/// JSON value to use in a hash input for an `Option<T>` field: the sentinel
/// when absent, the serialized value when present.
pub fn optional_field<T: Serialize>(value: &Option<T>) -> serde_json::Value {
    match value {
        Some(v) => serde_json::to_value(v).unwrap_or_else(|_| null_sentinel()),
        None => null_sentinel(),
    }
}

/// Canonicalize a field tuple to a deterministic JSON string (sorted keys,
/// since `serde_json::Map` without the `preserve_order` feature is a
/// `BTreeMap`) and hash it, truncating to [`DIGEST_BYTES`].
pub fn hash_fields(fields: &[(&str, serde_json::Value)]) -> [u8; DIGEST_BYTES] {
    let mut map = serde_json::Map::new();
    for (key, value) in fields {
        map.insert((*key).to_string(), value.clone());
    }
    let canonical =
        serde_json::to_string(&serde_json::Value::Object(map)).expect("map serialization cannot fail");
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; DIGEST_BYTES];
    out.copy_from_slice(&digest[..DIGEST_BYTES]);
    out
}
