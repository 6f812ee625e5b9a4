//! Core data types shared across Skystats

use serde::{Deserialize, Serialize};

/// Collection NSID of a Bluesky post record
pub const POST_COLLECTION: &str = "app.bsky.feed.post";

/// Session credentials issued by the identity service
///
/// Serialized with the camelCase keys the AT Protocol uses, which is also the
/// on-disk format of the credential cache.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub did: String,
    pub access_jwt: String,
    pub refresh_jwt: String,
    pub handle: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("did", &self.did)
            .field("handle", &self.handle)
            .field("access_jwt", &"[REDACTED]")
            .field("refresh_jwt", &"[REDACTED]")
            .finish()
    }
}

/// Subset of `app.bsky.actor.defs#profileViewDetailed` the bot reads
///
/// The counters are optional in the lexicon even though the server always
/// fills them for an existing account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub did: String,
    pub handle: String,
    pub posts_count: Option<i64>,
    pub follows_count: Option<i64>,
    pub followers_count: Option<i64>,
}

/// Body of an `app.bsky.feed.post` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub text: String,
    /// RFC 3339 UTC timestamp with millisecond precision
    pub created_at: String,
}

impl PostRecord {
    pub fn new(text: String, created_at: String) -> Self {
        Self { text, created_at }
    }
}

/// Reference to a record returned by `com.atproto.repo.createRecord`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub uri: String,
}
