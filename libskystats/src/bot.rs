//! The daily tick: fetch, diff, render, publish
//!
//! [`BotContext`] is the whole cross-tick state of the daemon: the
//! authenticated client and the baseline snapshot. Each tick moves through
//! `Fetching -> Computing -> Rendering -> Publishing` and ends either in
//! success, where the fetched snapshot becomes the new baseline, or aborted,
//! where the baseline is left untouched for the next tick.

use chrono::{DateTime, Local, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::credentials::{derive_key, write_file_atomic};
use crate::error::{CredentialError, Result};
use crate::metrics::{self, Snapshot};
use crate::report::{compute_delta_on, render, validate_post_text};
use crate::session::AuthenticatedClient;
use crate::types::{PostRecord, RecordRef};
use crate::xrpc::with_deadline;

/// `createdAt` format: UTC with millisecond precision
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn format_created_at(now: &DateTime<Utc>) -> String {
    now.format(CREATED_AT_FORMAT).to_string()
}

/// On-disk copy of the last published snapshot
#[derive(Debug, Clone)]
pub struct BaselineStore {
    path: PathBuf,
}

impl BaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `baseline_<key>.json` next to the credential cache
    pub fn for_account(dir: &Path, host: &str, handle: &str) -> Self {
        Self::new(dir.join(format!("baseline_{}.json", derive_key(host, handle))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read(&self.path).map_err(CredentialError::Io)?;
        let snapshot = serde_json::from_slice(&content).map_err(CredentialError::Decode)?;
        Ok(Some(snapshot))
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let content = serde_json::to_vec(snapshot).map_err(CredentialError::Decode)?;
        write_file_atomic(&self.path, &content)
    }
}

/// Result of a tick that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Published {
        record: RecordRef,
        text: String,
        snapshot: Snapshot,
    },
    /// Rendered but not published; the baseline did not move
    DryRun { text: String, snapshot: Snapshot },
}

/// Application state carried from one tick to the next
pub struct BotContext {
    client: AuthenticatedClient,
    baseline: Snapshot,
    timeout: Duration,
    baseline_store: Option<BaselineStore>,
    dry_run: bool,
}

impl BotContext {
    pub fn new(client: AuthenticatedClient, baseline: Snapshot, timeout: Duration) -> Self {
        Self {
            client,
            baseline,
            timeout,
            baseline_store: None,
            dry_run: false,
        }
    }

    pub fn with_baseline_store(mut self, store: BaselineStore) -> Self {
        self.baseline_store = Some(store);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Build the context at startup
    ///
    /// With `persist_baseline` on, a saved baseline is preferred over a fresh
    /// read; otherwise the startup snapshot is fetched. A failed fetch here is
    /// fatal for the caller.
    pub async fn initialize(client: AuthenticatedClient, config: &Config) -> Result<Self> {
        let timeout = config.request_timeout();
        let store = config
            .persist_baseline
            .then(|| BaselineStore::for_account(&config.cache_path(), &config.host, &config.handle));

        let saved = match &store {
            Some(store) => match store.load() {
                Ok(saved) => saved,
                Err(e) => {
                    tracing::warn!(
                        "Ignoring unreadable baseline {}: {}",
                        store.path().display(),
                        e
                    );
                    None
                }
            },
            None => None,
        };

        let baseline = match saved {
            Some(snapshot) => {
                tracing::info!("Resuming from saved baseline: {}", snapshot);
                snapshot
            }
            None => {
                let snapshot = with_deadline(timeout, metrics::fetch(&client)).await?;
                tracing::info!("Startup snapshot: {}", snapshot);
                snapshot
            }
        };

        let mut context = Self::new(client, baseline, timeout);
        context.baseline_store = store;
        Ok(context)
    }

    pub fn baseline(&self) -> Snapshot {
        self.baseline
    }

    pub fn client(&self) -> &AuthenticatedClient {
        &self.client
    }

    /// Run one tick against the current local date and UTC clock
    pub async fn run_tick(&mut self) -> Result<TickOutcome> {
        self.run_tick_at(Local::now().date_naive(), Utc::now()).await
    }

    /// Run one tick with explicit clocks
    ///
    /// Any error aborts the tick and leaves the baseline as it was.
    pub async fn run_tick_at(&mut self, today: NaiveDate, now: DateTime<Utc>) -> Result<TickOutcome> {
        tracing::debug!("Tick: fetching");
        let snapshot = with_deadline(self.timeout, metrics::fetch(&self.client)).await?;

        tracing::debug!("Tick: computing against baseline {}", self.baseline);
        let params = compute_delta_on(&self.baseline, &snapshot, today);

        tracing::debug!("Tick: rendering");
        let text = render(&params);
        validate_post_text(&text)?;

        if self.dry_run {
            tracing::info!("Dry run, not publishing");
            return Ok(TickOutcome::DryRun { text, snapshot });
        }

        tracing::debug!("Tick: publishing");
        let record = PostRecord::new(text.clone(), format_created_at(&now));
        let created = with_deadline(self.timeout, self.client.create_record(&record)).await?;

        tracing::info!("Posted stats for {}: {}", params.date, created.uri);
        self.advance_baseline(snapshot);

        Ok(TickOutcome::Published {
            record: created,
            text,
            snapshot,
        })
    }

    fn advance_baseline(&mut self, snapshot: Snapshot) {
        self.baseline = snapshot;

        if let Some(store) = &self.baseline_store {
            // The post is already out; a failed save only costs continuity after a restart
            if let Err(e) = store.save(&snapshot) {
                tracing::warn!(
                    "Failed to save baseline to {}: {}",
                    store.path().display(),
                    e
                );
            }
        }
    }
}
