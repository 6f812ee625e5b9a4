//! Session bootstrap
//!
//! Produces the [`AuthenticatedClient`] used for the lifetime of the process.
//! Bootstrap runs once at startup and is a two-way decision:
//!
//! - no cached credentials: create a session with handle + password and
//!   persist it
//! - cached credentials: refresh them; if the refresh fails for any reason,
//!   create a fresh session and persist it
//!
//! A successful refresh is only written back to the cache when
//! `persist_refreshed_session` is enabled.

use secrecy::ExposeSecret;
use std::sync::Arc;

use crate::config::Config;
use crate::credentials::{derive_key, SessionStore};
use crate::error::{Result, SkystatsError};
use crate::types::{PostRecord, Profile, RecordRef, Session};
use crate::xrpc::XrpcApi;

/// Which branch of the bootstrap produced the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPath {
    /// No cache existed; a session was created and saved
    Created,
    /// Cached refresh token was accepted
    Refreshed,
    /// Cached refresh token was rejected; a session was created and saved
    Recreated,
}

/// An XRPC client bound to an authenticated session
///
/// The api signs calls with its active session; `session` records which one
/// that is.
pub struct AuthenticatedClient {
    api: Arc<dyn XrpcApi>,
    session: Session,
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("session", &self.session)
            .finish()
    }
}

impl AuthenticatedClient {
    pub fn new(api: Arc<dyn XrpcApi>, session: Session) -> Self {
        Self { api, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn did(&self) -> &str {
        &self.session.did
    }

    pub fn handle(&self) -> &str {
        &self.session.handle
    }

    /// Read the profile of the authenticated account
    pub async fn get_own_profile(&self) -> Result<Profile> {
        self.api.get_profile(&self.session.handle).await
    }

    /// Create a record in the authenticated account's repo
    pub async fn create_record(&self, record: &PostRecord) -> Result<RecordRef> {
        self.api.create_record(record).await
    }
}

pub struct SessionManager<'a> {
    config: &'a Config,
    api: Arc<dyn XrpcApi>,
    store: &'a dyn SessionStore,
}

impl<'a> SessionManager<'a> {
    pub fn new(config: &'a Config, api: Arc<dyn XrpcApi>, store: &'a dyn SessionStore) -> Self {
        Self { config, api, store }
    }

    /// Produce an authenticated client; every error is fatal for startup
    pub async fn obtain_client(&self) -> Result<AuthenticatedClient> {
        let (client, _) = self.bootstrap().await?;
        Ok(client)
    }

    /// Like [`obtain_client`](Self::obtain_client), also reporting the branch taken
    pub async fn bootstrap(&self) -> Result<(AuthenticatedClient, BootstrapPath)> {
        let key = derive_key(&self.config.host, &self.config.handle);

        if !self.store.exists(&key) {
            tracing::info!("No cached session for {}, logging in", self.config.handle);
            let session = self.create_and_save(&key).await?;
            return Ok((self.client(session), BootstrapPath::Created));
        }

        let cached = self.store.load(&key)?;
        tracing::debug!("Found cached session for {}", cached.did);

        match self.api.refresh_session(&cached).await {
            Ok(refreshed) => {
                tracing::info!("Refreshed cached session for {}", refreshed.handle);
                if self.config.persist_refreshed_session {
                    self.store.save(&key, &refreshed)?;
                }
                Ok((self.client(refreshed), BootstrapPath::Refreshed))
            }
            Err(e) => {
                tracing::warn!("Session refresh failed ({}), logging in again", e);
                let session = self.create_and_save(&key).await?;
                Ok((self.client(session), BootstrapPath::Recreated))
            }
        }
    }

    async fn create_and_save(&self, key: &str) -> Result<Session> {
        let session = self
            .api
            .create_session(&self.config.handle, self.config.password.expose_secret())
            .await
            .map_err(|e| {
                SkystatsError::Auth(format!(
                    "could not create a session for {}: {}",
                    self.config.handle, e
                ))
            })?;

        self.store.save(key, &session)?;
        tracing::info!("Created session for {} ({})", session.handle, session.did);
        Ok(session)
    }

    fn client(&self, session: Session) -> AuthenticatedClient {
        AuthenticatedClient::new(self.api.clone(), session)
    }
}
