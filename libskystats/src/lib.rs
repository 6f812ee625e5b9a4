//! Skystats - daily profile statistics for AT Protocol accounts
//!
//! This library holds everything the `skystats-daemon` binary needs: session
//! bootstrap against the PDS, reading the profile counters, rendering the
//! day-over-day report and publishing it as a post.

pub mod bot;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod scheduling;
pub mod session;
pub mod types;
pub mod xrpc;

// Re-export commonly used types
pub use bot::{BotContext, TickOutcome};
pub use config::Config;
pub use credentials::{FileSessionStore, SessionStore};
pub use error::{Result, SkystatsError};
pub use metrics::Snapshot;
pub use session::{AuthenticatedClient, SessionManager};
pub use types::Session;
