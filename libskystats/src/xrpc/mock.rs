//! Mock XRPC implementation for testing
//!
//! A configurable stand-in for the remote services. It counts calls, records
//! what was posted and can be scripted to fail or stall, so session bootstrap
//! and tick behaviour can be verified without network access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{ApiError, Result};
use crate::types::{PostRecord, Profile, RecordRef, Session, POST_COLLECTION};
use crate::xrpc::XrpcApi;

pub const MOCK_DID: &str = "did:plc:mockuser";

/// Configuration for mock behaviour
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub handle: String,

    /// Password accepted by `create_session`
    pub password: String,

    /// Whether `refresh_session` accepts the presented token
    pub refresh_succeeds: bool,

    /// Counters returned by `get_profile`; `None` fails the call
    pub profile: Option<Profile>,

    /// Whether `create_record` succeeds
    pub post_succeeds: bool,

    /// Delay before every call completes (simulates a slow upstream)
    pub delay: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            handle: "mock.bsky.social".to_string(),
            password: "mock-password".to_string(),
            refresh_succeeds: true,
            profile: Some(Profile {
                did: MOCK_DID.to_string(),
                handle: "mock.bsky.social".to_string(),
                posts_count: Some(0),
                follows_count: Some(0),
                followers_count: Some(0),
            }),
            post_succeeds: true,
            delay: Duration::from_millis(0),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    create_session_calls: usize,
    refresh_session_calls: usize,
    get_profile_calls: usize,
    create_record_calls: usize,
    refresh_tokens_seen: Vec<String>,
    active: Option<Session>,
    posted: Vec<(String, PostRecord)>,
}

/// Mock XRPC endpoint
///
/// Cloning shares the call counters and the scripted behaviour, so a test can
/// keep a handle while the client under test owns another.
#[derive(Debug, Clone)]
pub struct MockXrpc {
    config: Arc<Mutex<MockConfig>>,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockXrpc {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl MockXrpc {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Mock whose refresh endpoint rejects every token
    pub fn rejecting_refresh() -> Self {
        Self::new(MockConfig {
            refresh_succeeds: false,
            ..Default::default()
        })
    }

    /// Set the counters returned by the next profile reads
    pub fn set_counts(&self, posts: i64, follows: i64, followers: i64) {
        let mut config = self.config.lock().unwrap();
        let handle = config.handle.clone();
        config.profile = Some(Profile {
            did: MOCK_DID.to_string(),
            handle,
            posts_count: Some(posts),
            follows_count: Some(follows),
            followers_count: Some(followers),
        });
    }

    /// Set the raw profile returned by the next reads, `None` to fail them
    pub fn set_profile(&self, profile: Option<Profile>) {
        self.config.lock().unwrap().profile = profile;
    }

    pub fn set_post_succeeds(&self, succeeds: bool) {
        self.config.lock().unwrap().post_succeeds = succeeds;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.config.lock().unwrap().delay = delay;
    }

    pub fn create_session_calls(&self) -> usize {
        self.state.lock().unwrap().create_session_calls
    }

    pub fn refresh_session_calls(&self) -> usize {
        self.state.lock().unwrap().refresh_session_calls
    }

    pub fn get_profile_calls(&self) -> usize {
        self.state.lock().unwrap().get_profile_calls
    }

    pub fn create_record_calls(&self) -> usize {
        self.state.lock().unwrap().create_record_calls
    }

    /// Refresh tokens presented to `refresh_session`, in call order
    pub fn refresh_tokens_seen(&self) -> Vec<String> {
        self.state.lock().unwrap().refresh_tokens_seen.clone()
    }

    /// Session the mock currently signs calls with
    pub fn active_session(&self) -> Option<Session> {
        self.state.lock().unwrap().active.clone()
    }

    /// Records successfully created, paired with the repo they went to
    pub fn posted(&self) -> Vec<(String, PostRecord)> {
        self.state.lock().unwrap().posted.clone()
    }

    async fn simulate_latency(&self) {
        let delay = self.config.lock().unwrap().delay;
        if !delay.is_zero() {
            sleep(delay).await;
        }
    }

    fn issue_session(&self, prefix: &str, serial: usize) -> Session {
        let handle = self.config.lock().unwrap().handle.clone();
        let session = Session {
            did: MOCK_DID.to_string(),
            access_jwt: format!("{}-access-{}", prefix, serial),
            refresh_jwt: format!("{}-refresh-{}", prefix, serial),
            handle,
        };
        self.state.lock().unwrap().active = Some(session.clone());
        session
    }

    /// Repo of the active session; a client built around a cached session
    /// without a login posts as the mock account
    fn repo(&self) -> String {
        self.state
            .lock()
            .unwrap()
            .active
            .as_ref()
            .map(|session| session.did.clone())
            .unwrap_or_else(|| MOCK_DID.to_string())
    }
}

#[async_trait]
impl XrpcApi for MockXrpc {
    async fn create_session(&self, identifier: &str, password: &str) -> Result<Session> {
        let serial = {
            let mut state = self.state.lock().unwrap();
            state.create_session_calls += 1;
            state.create_session_calls
        };
        self.simulate_latency().await;

        let accepted = {
            let config = self.config.lock().unwrap();
            identifier == config.handle && password == config.password
        };
        if !accepted {
            return Err(ApiError::Authentication(
                "AuthenticationRequired: Invalid identifier or password".to_string(),
            )
            .into());
        }

        Ok(self.issue_session("created", serial))
    }

    async fn refresh_session(&self, cached: &Session) -> Result<Session> {
        let serial = {
            let mut state = self.state.lock().unwrap();
            state.refresh_session_calls += 1;
            state.refresh_tokens_seen.push(cached.refresh_jwt.clone());
            state.refresh_session_calls
        };
        self.simulate_latency().await;

        if !self.config.lock().unwrap().refresh_succeeds {
            return Err(ApiError::Authentication(
                "ExpiredToken: Token has expired".to_string(),
            )
            .into());
        }

        Ok(self.issue_session("refreshed", serial))
    }

    async fn get_profile(&self, _actor: &str) -> Result<Profile> {
        self.state.lock().unwrap().get_profile_calls += 1;
        self.simulate_latency().await;

        self.config
            .lock()
            .unwrap()
            .profile
            .clone()
            .ok_or_else(|| ApiError::Network("Mock profile read failed".to_string()).into())
    }

    async fn create_record(&self, record: &PostRecord) -> Result<RecordRef> {
        let serial = {
            let mut state = self.state.lock().unwrap();
            state.create_record_calls += 1;
            state.create_record_calls
        };
        self.simulate_latency().await;

        if !self.config.lock().unwrap().post_succeeds {
            return Err(ApiError::Network("Mock post failed".to_string()).into());
        }

        let repo = self.repo();
        let uri = format!("at://{}/{}/mock{}", repo, POST_COLLECTION, serial);
        self.state.lock().unwrap().posted.push((repo, record.clone()));

        Ok(RecordRef { uri })
    }
}
