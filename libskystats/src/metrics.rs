//! Profile counters and how they are read

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkystatsError};
use crate::session::AuthenticatedClient;
use crate::types::Profile;

/// Point-in-time reading of the three profile counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub posts: i64,
    pub follows: i64,
    pub followers: i64,
}

impl Snapshot {
    pub fn new(posts: i64, follows: i64, followers: i64) -> Self {
        Self {
            posts,
            follows,
            followers,
        }
    }

    /// Extract the counters from a profile view
    ///
    /// # Errors
    ///
    /// `SkystatsError::MissingField` naming the first absent counter.
    pub fn from_profile(profile: &Profile) -> Result<Self> {
        let posts = profile
            .posts_count
            .ok_or_else(|| SkystatsError::MissingField("postsCount".to_string()))?;
        let follows = profile
            .follows_count
            .ok_or_else(|| SkystatsError::MissingField("followsCount".to_string()))?;
        let followers = profile
            .followers_count
            .ok_or_else(|| SkystatsError::MissingField("followersCount".to_string()))?;

        Ok(Self::new(posts, follows, followers))
    }
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "posts={} follows={} followers={}",
            self.posts, self.follows, self.followers
        )
    }
}

/// Fetch the authenticated account's current counters
pub async fn fetch(client: &AuthenticatedClient) -> Result<Snapshot> {
    let profile = client.get_own_profile().await?;
    let snapshot = Snapshot::from_profile(&profile)?;
    tracing::debug!("Fetched snapshot for {}: {}", client.handle(), snapshot);
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::types::Session;
    use crate::xrpc::mock::{MockXrpc, MOCK_DID};
    use std::sync::Arc;

    fn client_for(mock: &MockXrpc) -> AuthenticatedClient {
        AuthenticatedClient::new(
            Arc::new(mock.clone()),
            Session {
                did: MOCK_DID.to_string(),
                access_jwt: "access".to_string(),
                refresh_jwt: "refresh".to_string(),
                handle: "mock.bsky.social".to_string(),
            },
        )
    }

    fn profile(posts: Option<i64>, follows: Option<i64>, followers: Option<i64>) -> Profile {
        Profile {
            did: MOCK_DID.to_string(),
            handle: "mock.bsky.social".to_string(),
            posts_count: posts,
            follows_count: follows,
            followers_count: followers,
        }
    }

    #[test]
    fn test_from_profile_all_present() {
        let snapshot = Snapshot::from_profile(&profile(Some(100), Some(10), Some(50))).unwrap();
        assert_eq!(snapshot, Snapshot::new(100, 10, 50));
    }

    #[test]
    fn test_from_profile_names_missing_counter() {
        let cases = [
            (profile(None, Some(1), Some(1)), "postsCount"),
            (profile(Some(1), None, Some(1)), "followsCount"),
            (profile(Some(1), Some(1), None), "followersCount"),
        ];

        for (input, expected) in cases {
            match Snapshot::from_profile(&input) {
                Err(SkystatsError::MissingField(field)) => assert_eq!(field, expected),
                other => panic!("Expected MissingField({}), got {:?}", expected, other),
            }
        }
    }

    #[test]
    fn test_snapshot_display() {
        assert_eq!(
            Snapshot::new(1, 2, 3).to_string(),
            "posts=1 follows=2 followers=3"
        );
    }

    #[tokio::test]
    async fn test_fetch_reads_counts() {
        let mock = MockXrpc::default();
        mock.set_counts(105, 10, 48);

        let snapshot = fetch(&client_for(&mock)).await.unwrap();
        assert_eq!(snapshot, Snapshot::new(105, 10, 48));
        assert_eq!(mock.get_profile_calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_upstream_failure() {
        let mock = MockXrpc::default();
        mock.set_profile(None);

        assert!(matches!(
            fetch(&client_for(&mock)).await,
            Err(SkystatsError::Api(ApiError::Network(_)))
        ));
    }

    #[tokio::test]
    async fn test_fetch_missing_field() {
        let mock = MockXrpc::default();
        mock.set_profile(Some(profile(Some(3), None, Some(4))));

        assert!(matches!(
            fetch(&client_for(&mock)).await,
            Err(SkystatsError::MissingField(_))
        ));
    }
}
