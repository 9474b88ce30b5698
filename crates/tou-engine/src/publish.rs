//! Change detection and the publish gate.
//!
//! The serialized tariff document is fingerprinted with SHA-256. The controller
//! is only updated when the fingerprint differs from the last one successfully
//! published, or when an update is forced. The stored fingerprint is replaced
//! only after the controller accepted the update, so a failed publish is retried
//! by the next run.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

/// Hex-encoded SHA-256 of `payload`.
pub fn fingerprint(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// State that survives between runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublishState {
    pub last_fingerprint: Option<String>,
}

impl PublishState {
    pub fn new(last_fingerprint: impl Into<String>) -> Self {
        Self {
            last_fingerprint: Some(last_fingerprint.into()),
        }
    }

    fn matches(&self, fingerprint: &str) -> bool {
        self.last_fingerprint.as_deref() == Some(fingerprint)
    }
}

/// Where [`PublishState`] is persisted.
pub trait StateStore {
    fn load(&self) -> Result<PublishState>;
    fn save(&self, state: &PublishState) -> Result<()>;
}

/// The controller-update collaborator.
pub trait Publisher {
    /// Send `payload` to the controller.
    ///
    /// # Errors
    /// Implementations return `ScheduleError::Publish` when the controller
    /// rejects or fails the update.
    fn publish(&self, payload: &str) -> Result<()>;
}

/// Single-line fingerprint file.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    /// A missing or empty file means nothing has been published yet.
    fn load(&self) -> Result<PublishState> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let line = contents.lines().next().unwrap_or("").trim();
                if line.is_empty() {
                    Ok(PublishState::default())
                } else {
                    debug!(fingerprint = line, "read last published fingerprint");
                    Ok(PublishState::new(line))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no fingerprint file yet, will create");
                Ok(PublishState::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Written to a temporary file in the same directory and renamed into place.
    fn save(&self, state: &PublishState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut file = NamedTempFile::new_in(dir)?;
        if let Some(fingerprint) = &state.last_fingerprint {
            writeln!(file, "{}", fingerprint)?;
        }
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Flags controlling the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PublishOptions {
    /// Publish even when the fingerprint is unchanged.
    pub force: bool,
    /// Decide, but never call the publisher or write state. Wins over `force`.
    pub read_only: bool,
}

/// What the gate did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishDecision {
    /// Fingerprint matched and no force flag: nothing sent.
    Unchanged,
    /// The controller accepted the new schedule and state was updated.
    Published,
    /// An update was due but read-only mode suppressed it.
    WouldPublish,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub decision: PublishDecision,
    pub fingerprint: String,
    pub previous: Option<String>,
}

/// Publish `payload` if its fingerprint changed (or `force` is set).
///
/// # Errors
/// Propagates state-store failures and `ScheduleError::Publish` from the
/// publisher. State is left untouched when publishing fails.
pub fn publish_if_changed<S, P>(
    payload: &str,
    store: &S,
    publisher: &P,
    options: PublishOptions,
) -> Result<PublishOutcome>
where
    S: StateStore + ?Sized,
    P: Publisher + ?Sized,
{
    let state = store.load()?;
    let new_fingerprint = fingerprint(payload);
    debug!(old = ?state.last_fingerprint, new = %new_fingerprint, "comparing fingerprints");

    let changed = !state.matches(&new_fingerprint);
    let decision = if !changed && !options.force {
        info!("no change in slots, nothing to publish");
        PublishDecision::Unchanged
    } else if options.read_only {
        info!(changed, "read-only mode, controller update suppressed");
        PublishDecision::WouldPublish
    } else {
        info!(changed, forced = options.force, "publishing schedule to controller");
        if let Err(e) = publisher.publish(payload) {
            error!(error = %e, "controller update failed, fingerprint not stored");
            return Err(e);
        }
        store.save(&PublishState::new(new_fingerprint.clone()))?;
        info!("controller schedule updated");
        PublishDecision::Published
    };

    Ok(PublishOutcome {
        decision,
        fingerprint: new_fingerprint,
        previous: state.last_fingerprint,
    })
}
