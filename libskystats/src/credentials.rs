//! Session credential cache for Skystats
//!
//! Credentials live in a single JSON file per `(host, handle)` pair:
//!
//! - Location: the configured `cache_dir`
//! - Naming: `auth_{sha256(host + "_" + handle) as hex}.json`
//! - Permissions: 600 (owner read/write only) on Unix systems
//!
//! # Example
//!
//! ```no_run
//! use libskystats::credentials::{derive_key, FileSessionStore, SessionStore};
//!
//! # fn example() -> libskystats::error::Result<()> {
//! let store = FileSessionStore::new("/var/lib/skystats");
//! let key = derive_key("https://bsky.social", "alice.bsky.social");
//!
//! if store.exists(&key) {
//!     let session = store.load(&key)?;
//!     println!("Cached session for {}", session.did);
//! }
//! # Ok(())
//! # }
//! ```

use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{CredentialError, Result};
use crate::types::Session;

/// Derive the cache key for a `(host, handle)` pair
///
/// Lowercase hex of `sha256("{host}_{handle}")`, always 64 characters.
pub fn derive_key(host: &str, handle: &str) -> String {
    let digest = Sha256::digest(format!("{}_{}", host, handle).as_bytes());
    format!("{:x}", digest)
}

/// Storage backend for cached sessions
///
/// Absence of a cached session is a valid state, so `exists` cannot fail.
pub trait SessionStore: Send + Sync {
    fn exists(&self, key: &str) -> bool;

    /// Load a cached session
    ///
    /// # Errors
    ///
    /// - `CredentialError::Io` if the file is present but unreadable
    /// - `CredentialError::Decode` if the content is not a valid session
    fn load(&self, key: &str) -> Result<Session>;

    /// Replace the cached session in full
    fn save(&self, key: &str, session: &Session) -> Result<()>;
}

/// File-backed session store
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("auth_{}.json", key))
    }
}

impl SessionStore for FileSessionStore {
    fn exists(&self, key: &str) -> bool {
        self.path_for(key).exists()
    }

    fn load(&self, key: &str) -> Result<Session> {
        let file_path = self.path_for(key);

        validate_not_symlink(&file_path)?;

        let content = std::fs::read(&file_path).map_err(CredentialError::Io)?;
        let session: Session = serde_json::from_slice(&content).map_err(CredentialError::Decode)?;

        tracing::debug!("Loaded cached session for {} from {:?}", session.did, file_path);
        Ok(session)
    }

    fn save(&self, key: &str, session: &Session) -> Result<()> {
        let file_path = self.path_for(key);
        let content = serde_json::to_vec(session).map_err(CredentialError::Decode)?;

        write_file_atomic(&file_path, &content)?;

        tracing::debug!("Stored session for {} at {:?}", session.did, file_path);
        Ok(())
    }
}

/// Refuse to read credential files that are symbolic links
pub fn validate_not_symlink(path: &Path) -> Result<()> {
    let metadata = std::fs::symlink_metadata(path).map_err(|e| {
        CredentialError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read metadata for '{}': {}", path.display(), e),
        ))
    })?;

    if metadata.is_symlink() {
        return Err(CredentialError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!(
                "Credential file '{}' is a symbolic link; a regular file is required",
                path.display()
            ),
        ))
        .into());
    }

    Ok(())
}

/// Write `content` to a temp sibling, then rename it over `path`
///
/// Parent directories are created as needed. On Unix the file is created
/// with mode 600.
pub(crate) fn write_file_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(CredentialError::Io)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&tmp_path).map_err(CredentialError::Io)?;
    file.write_all(content).map_err(CredentialError::Io)?;
    file.sync_all().map_err(CredentialError::Io)?;
    drop(file);

    std::fs::rename(&tmp_path, path).map_err(CredentialError::Io)?;
    Ok(())
}
