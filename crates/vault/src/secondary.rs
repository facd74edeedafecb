//! Secondary (synced) location discovery.
//!
//! The probe runs in the background from engine construction. The first load
//! or save that needs the answer awaits it; nothing proceeds without it.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::{
    sync::{Mutex, OnceCell},
    task::JoinHandle,
};

use crate::options::SyncPolicy;

/// Resolves the directory holding the synced copy, if one is reachable.
#[async_trait::async_trait]
pub trait SecondaryLocator: Send + Sync {
    async fn probe(&self) -> Option<PathBuf>;
}

/// Uses a fixed directory when it exists.
#[derive(Debug, Clone)]
pub struct DirectoryLocator {
    dir: PathBuf,
}

impl DirectoryLocator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl SecondaryLocator for DirectoryLocator {
    async fn probe(&self) -> Option<PathBuf> {
        match tokio::fs::metadata(&self.dir).await {
            Ok(meta) if meta.is_dir() => Some(self.dir.clone()),
            Ok(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(path = %self.dir.display(), "secondary location is not a directory");
                None
            },
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(path = %self.dir.display(), error = %_e, "secondary location unreachable");
                None
            },
        }
    }
}

/// Never resolves a secondary location.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecondary;

#[async_trait::async_trait]
impl SecondaryLocator for NoSecondary {
    async fn probe(&self) -> Option<PathBuf> {
        None
    }
}

/// Locator implied by a policy: the configured directory, or nothing.
pub fn locator_for(policy: &SyncPolicy) -> Arc<dyn SecondaryLocator> {
    match &policy.secondary_dir {
        Some(dir) if policy.enabled => Arc::new(DirectoryLocator::new(dir.clone())),
        _ => Arc::new(NoSecondary),
    }
}

/// A probe started at construction and joined on first use.
pub(crate) struct SecondaryLocation {
    pending: Mutex<Option<JoinHandle<Option<PathBuf>>>>,
    resolved: OnceCell<Option<PathBuf>>,
}

impl SecondaryLocation {
    /// Start probing. With sync disabled the location resolves to `None`
    /// immediately and the locator is never called.
    pub(crate) fn spawn(locator: Arc<dyn SecondaryLocator>, policy: &SyncPolicy) -> Self {
        if !policy.enabled {
            return Self {
                pending: Mutex::new(None),
                resolved: OnceCell::new_with(Some(None)),
            };
        }

        let handle = tokio::spawn(async move { locator.probe().await });
        Self {
            pending: Mutex::new(Some(handle)),
            resolved: OnceCell::new(),
        }
    }

    /// Wait for the probe and return the resolved directory.
    pub(crate) async fn dir(&self) -> Option<&Path> {
        self.resolved
            .get_or_init(|| async {
                let Some(handle) = self.pending.lock().await.take() else {
                    return None;
                };
                match handle.await {
                    Ok(dir) => {
                        #[cfg(feature = "tracing")]
                        {
                            if let Some(path) = &dir {
                                tracing::info!(path = %path.display(), "secondary location resolved");
                            } else {
                                tracing::info!("secondary location unavailable, using local copy only");
                            }
                        }
                        dir
                    },
                    Err(_e) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(error = %_e, "secondary location probe did not complete");
                        None
                    },
                }
            })
            .await
            .as_deref()
    }
}
