//! Bluesky XRPC client backed by `bsky-sdk`

use async_trait::async_trait;
use bsky_sdk::agent::config::Config as AgentConfig;
use bsky_sdk::BskyAgent;
use std::time::Duration;

use crate::error::{ApiError, Result};
use crate::types::{PostRecord, Profile, RecordRef, Session};
use crate::xrpc::{with_deadline, XrpcApi, CREATE_RECORD, CREATE_SESSION, GET_PROFILE, REFRESH_SESSION};

const GET_SESSION: &str = "com.atproto.server.getSession";

/// Whether `text` carries one of `codes` as a standalone number
///
/// Ports and other longer digit runs (`:40123`) never count as a status.
fn has_status(text: &str, codes: &[&str]) -> bool {
    text.split(|c: char| !c.is_ascii_digit())
        .any(|run| codes.contains(&run))
}

/// Map bsky-sdk / XRPC errors onto `ApiError`
///
/// The SDK's error types are generic per procedure, so classification looks
/// at the rendered error: HTTP statuses and AT Protocol error codes.
pub(crate) fn map_bluesky_error<E: std::fmt::Display + std::fmt::Debug>(
    error: E,
    nsid: &str,
) -> ApiError {
    let error_msg = format!("{}", error);
    let debug_msg = format!("{:?}", error);
    let summary = format!("{} failed: {}", nsid, error_msg);

    let mentions = |patterns: &[&str]| {
        patterns
            .iter()
            .any(|p| error_msg.contains(p) || debug_msg.contains(p))
    };
    let status = |codes: &[&str]| has_status(&error_msg, codes) || has_status(&debug_msg, codes);

    if status(&["401", "403"])
        || mentions(&[
            "AuthenticationRequired",
            "InvalidToken",
            "ExpiredToken",
            "AccountTakedown",
            "InvalidCredentials",
            "AccountNotFound",
            "Unauthorized",
            "Forbidden",
        ])
    {
        return ApiError::Authentication(summary);
    }

    if status(&["429"]) || mentions(&["RateLimitExceeded", "TooManyRequests"]) {
        return ApiError::RateLimit(summary);
    }

    if status(&["400"]) || mentions(&["InvalidRequest", "InvalidRecord", "BadRequest"]) {
        return ApiError::Rejected(summary);
    }

    if mentions(&["UnexpectedResponseType", "SerdeJson", "unexpected response type"]) {
        return ApiError::Decode(summary);
    }

    let lower = format!("{} {}", error_msg, debug_msg).to_lowercase();
    if status(&["500", "502", "503", "504"])
        || ["connect", "network", "timed out", "dns", "unreachable", "error sending request"]
            .iter()
            .any(|p| lower.contains(p))
    {
        return ApiError::Network(summary);
    }

    ApiError::Rejected(summary)
}

/// `XrpcApi` over a [`BskyAgent`]
///
/// The agent keeps the active session and signs every call with it. Each
/// procedure runs under `timeout`.
pub struct BskyXrpc {
    agent: BskyAgent,
    endpoint: String,
    timeout: Duration,
}

impl std::fmt::Debug for BskyXrpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BskyXrpc")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BskyXrpc {
    /// Create a client for the PDS at `host`
    pub async fn connect(host: &str, timeout: Duration) -> Result<Self> {
        let endpoint = host.trim().trim_end_matches('/').to_string();

        let agent = BskyAgent::builder()
            .config(AgentConfig {
                endpoint: endpoint.clone(),
                ..Default::default()
            })
            .build()
            .await
            .map_err(|e| map_bluesky_error(e, "agent setup"))?;

        Ok(Self {
            agent,
            endpoint,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Make `session` the agent's active session
    ///
    /// The SDK validates it with `getSession` before adopting it.
    async fn resume(&self, session: &Session) -> Result<()> {
        let stored = serde_json::to_value(session)
            .and_then(serde_json::from_value)
            .map_err(|e| ApiError::Decode(format!("cached session: {}", e)))?;

        self.agent
            .resume_session(stored)
            .await
            .map_err(|e| map_bluesky_error(e, GET_SESSION))?;
        Ok(())
    }
}

#[async_trait]
impl XrpcApi for BskyXrpc {
    async fn create_session(&self, identifier: &str, password: &str) -> Result<Session> {
        tracing::debug!("Creating Bluesky session for {}", identifier);

        with_deadline(self.timeout, async {
            let session = self
                .agent
                .login(identifier, password)
                .await
                .map_err(|e| map_bluesky_error(e, CREATE_SESSION))?;

            Ok(Session {
                did: session.did.as_str().to_string(),
                access_jwt: session.access_jwt.clone(),
                refresh_jwt: session.refresh_jwt.clone(),
                handle: session.handle.as_str().to_string(),
            })
        })
        .await
    }

    async fn refresh_session(&self, cached: &Session) -> Result<Session> {
        tracing::debug!("Refreshing Bluesky session for {}", cached.did);

        with_deadline(self.timeout, async {
            self.resume(cached).await?;

            let output = self
                .agent
                .api
                .com
                .atproto
                .server
                .refresh_session()
                .await
                .map_err(|e| map_bluesky_error(e, REFRESH_SESSION))?;

            let refreshed = Session {
                did: output.did.as_str().to_string(),
                access_jwt: output.access_jwt.clone(),
                refresh_jwt: output.refresh_jwt.clone(),
                handle: output.handle.as_str().to_string(),
            };

            // The agent still signs with the cached tokens until it adopts these
            self.resume(&refreshed).await?;
            Ok(refreshed)
        })
        .await
    }

    async fn get_profile(&self, actor: &str) -> Result<Profile> {
        use bsky_sdk::api::app::bsky::actor::get_profile;
        use bsky_sdk::api::types::string::AtIdentifier;

        let at_identifier: AtIdentifier = actor
            .parse()
            .map_err(|e| ApiError::Rejected(format!("invalid actor '{}': {}", actor, e)))?;

        with_deadline(self.timeout, async {
            let output = self
                .agent
                .api
                .app
                .bsky
                .actor
                .get_profile(
                    get_profile::ParametersData {
                        actor: at_identifier,
                    }
                    .into(),
                )
                .await
                .map_err(|e| map_bluesky_error(e, GET_PROFILE))?;

            Ok(Profile {
                did: output.did.as_str().to_string(),
                handle: output.handle.as_str().to_string(),
                posts_count: output.posts_count,
                follows_count: output.follows_count,
                followers_count: output.followers_count,
            })
        })
        .await
    }

    async fn create_record(&self, record: &PostRecord) -> Result<RecordRef> {
        use bsky_sdk::api::app::bsky::feed::post::RecordData;
        use bsky_sdk::api::types::string::Datetime;

        let created_at: Datetime = record.created_at.parse().map_err(|e| {
            ApiError::Rejected(format!("invalid createdAt '{}': {}", record.created_at, e))
        })?;

        tracing::debug!("Posting to Bluesky: {} characters", record.text.chars().count());

        let data = RecordData {
            created_at,
            embed: None,
            entities: None,
            facets: None,
            labels: None,
            langs: None,
            reply: None,
            tags: None,
            text: record.text.clone(),
        };

        with_deadline(self.timeout, async {
            let output = self
                .agent
                .create_record(data)
                .await
                .map_err(|e| map_bluesky_error(e, CREATE_RECORD))?;

            Ok(RecordRef {
                uri: output.uri.to_string(),
            })
        })
        .await
    }
}
