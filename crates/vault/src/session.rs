//! In-memory session key.

use tokio::sync::{RwLock, RwLockReadGuard};

use crate::kdf::{Key, Salt};

/// The key the current session seals with, plus the salt it was derived with.
///
/// Never persisted. The key bytes are zeroed when the value is dropped.
pub struct SessionKey {
    key: Key,
    salt: Salt,
}

impl SessionKey {
    pub(crate) fn new(key: Key, salt: Salt) -> Self {
        Self { key, salt }
    }

    pub(crate) fn key(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Shared lock state. `None` means locked.
#[derive(Default)]
pub(crate) struct Session {
    current: RwLock<Option<SessionKey>>,
}

impl Session {
    pub(crate) async fn is_unlocked(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, Option<SessionKey>> {
        self.current.read().await
    }

    pub(crate) async fn install(&self, key: SessionKey) {
        *self.current.write().await = Some(key);
    }

    /// Drop the session key. Returns whether a session was active.
    pub(crate) async fn clear(&self) -> bool {
        self.current.write().await.take().is_some()
    }
}
