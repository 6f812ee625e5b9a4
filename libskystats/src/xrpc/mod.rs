//! Seam between the bot and the remote AT Protocol services
//!
//! The bot consumes exactly four procedures:
//!
//! | NSID                                 | Service        |
//! |--------------------------------------|----------------|
//! | `com.atproto.server.createSession`   | identity       |
//! | `com.atproto.server.refreshSession`  | identity       |
//! | `app.bsky.actor.getProfile`          | social graph   |
//! | `com.atproto.repo.createRecord`      | content        |
//!
//! [`XrpcApi`] abstracts them so the session manager and the tick handler can
//! run against [`bsky::BskyXrpc`] in production and [`mock::MockXrpc`] in
//! tests. Implementations hold the active session themselves: a successful
//! `create_session` or `refresh_session` authenticates every later call.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::error::{ApiError, Result};
use crate::types::{PostRecord, Profile, RecordRef, Session};

pub mod bsky;

// Mock is available for all builds (not just tests) to support integration tests
pub mod mock;

pub const CREATE_SESSION: &str = "com.atproto.server.createSession";
pub const REFRESH_SESSION: &str = "com.atproto.server.refreshSession";
pub const GET_PROFILE: &str = "app.bsky.actor.getProfile";
pub const CREATE_RECORD: &str = "com.atproto.repo.createRecord";

/// Run `fut` under a deadline; expiry is reported as `ApiError::Timeout`
pub async fn with_deadline<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ApiError::Timeout(timeout).into()),
    }
}

/// The remote procedures the bot depends on
///
/// Failures surface as `SkystatsError::Api`; callers decide whether an error
/// is fatal (session bootstrap) or only aborts the current tick.
#[async_trait]
pub trait XrpcApi: Send + Sync {
    /// Full authentication with handle (or email) and password
    async fn create_session(&self, identifier: &str, password: &str) -> Result<Session>;

    /// Resume `cached` and exchange its refresh token for a fresh session
    async fn refresh_session(&self, cached: &Session) -> Result<Session>;

    async fn get_profile(&self, actor: &str) -> Result<Profile>;

    /// Create an `app.bsky.feed.post` record in the session's repo
    async fn create_record(&self, record: &PostRecord) -> Result<RecordRef>;
}
