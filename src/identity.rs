//! Temporary and authenticated user identity.
//!
//! A device starts with a random temporary id kept in a local key/value store. After
//! sign-in the temporary id's remote records are reassigned to the authenticated id, and
//! the local id is cleared only once every domain has synced. Legacy temporary ids are
//! upgraded to the current prefix through a one-shot migration.

use crate::error::{IdentityError, StoreError};
use crate::options::ApiConfig;
use crate::sync::{CrossDomainSyncCoordinator, RemoteStore, SyncResult};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const TEMPORARY_PREFIX: &str = "temporary_";
pub const LEGACY_PREFIXES: [&str; 2] = ["user_anon_", "anonymous_"];
pub const GUEST_DISPLAY_NAME: &str = "Guest User";

pub fn is_temporary_id(id: &str) -> bool {
    id.starts_with(TEMPORARY_PREFIX) || needs_upgrade(id)
}

/// Ids minted by older clients that should move to the current prefix.
pub fn needs_upgrade(id: &str) -> bool {
    LEGACY_PREFIXES.iter().any(|p| id.starts_with(p))
}

pub fn new_temporary_id() -> String {
    format!("{}{}", TEMPORARY_PREFIX, uuid::Uuid::new_v4())
}

/// Local durable string storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.map.lock().map_err(|_| StoreError::Unavailable("memory store poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// A JSON object on disk. Writes go to a sibling temp file that is renamed into place.
pub struct FileStore {
    path: PathBuf,
    io: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), io: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(s) if s.trim().is_empty() => Ok(HashMap::new()),
            Ok(s) => Ok(serde_json::from_str(&s)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec(map)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn with_map<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, String>) -> (T, bool),
    ) -> Result<T, StoreError> {
        let _guard = self
            .io
            .lock()
            .map_err(|_| StoreError::Unavailable("file store poisoned".to_string()))?;
        let mut map = self.read_map()?;
        let (out, dirty) = f(&mut map);
        if dirty {
            self.write_map(&map)?;
        }
        Ok(out)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_map(|m| (m.get(key).cloned(), false))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.with_map(|m| {
            let previous = m.insert(key.to_string(), value.to_string());
            ((), previous.as_deref() != Some(value))
        })
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.with_map(|m| ((), m.remove(key).is_some()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub current_user_id: String,
    pub is_temporary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    fn authenticated(id: &str) -> Self {
        Self {
            current_user_id: id.to_string(),
            is_temporary: false,
            display_name: None,
            email: None,
        }
    }

    fn temporary(id: String) -> Self {
        Self {
            current_user_id: id,
            is_temporary: true,
            display_name: Some(GUEST_DISPLAY_NAME.to_string()),
            email: None,
        }
    }

    /// Guests are prompted to sign in.
    pub fn needs_upgrade(&self) -> bool {
        self.is_temporary
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolverState {
    Uninitialized,
    Authenticated,
    Temporary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdUpgrade {
    pub old_id: String,
    pub new_id: String,
    pub migrated: bool,
}

/// Everything one resolution did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub identity: Identity,
    /// Present when a temporary id was reconciled with the authenticated one.
    pub sync: Option<SyncResult>,
    /// Present when a legacy temporary id was due for upgrade.
    pub upgrade: Option<IdUpgrade>,
    /// A fresh temporary id was minted and persisted.
    pub generated: bool,
}

/// Decides the effective user id and drives reconciliation.
///
/// Resolutions are serialized: the stored id is read, possibly replaced, and written
/// back while holding one async lock, so concurrent callers never mint two ids.
pub struct IdentityResolver {
    store: Arc<dyn KeyValueStore>,
    remote: Arc<dyn RemoteStore>,
    coordinator: CrossDomainSyncCoordinator,
    key: String,
    state: tokio::sync::Mutex<ResolverState>,
}

impl IdentityResolver {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteStore>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            store,
            coordinator: CrossDomainSyncCoordinator::new(remote.clone()),
            remote,
            key: key.into(),
            state: tokio::sync::Mutex::new(ResolverState::Uninitialized),
        }
    }

    /// Resolver keyed by `config.identity_key`.
    pub fn from_config(
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteStore>,
        config: &ApiConfig,
    ) -> Self {
        Self::new(store, remote, config.identity_key.clone())
    }

    pub async fn state(&self) -> ResolverState {
        *self.state.lock().await
    }

    pub async fn resolve(&self, authenticated_id: Option<&str>) -> Result<Identity, IdentityError> {
        Ok(self.resolve_detailed(authenticated_id).await?.identity)
    }

    pub async fn resolve_detailed(
        &self,
        authenticated_id: Option<&str>,
    ) -> Result<Resolution, IdentityError> {
        let mut state = self.state.lock().await;
        let resolution = match authenticated_id {
            Some(auth_id) => self.resolve_authenticated(auth_id).await?,
            None => self.resolve_temporary().await?,
        };
        *state = if resolution.identity.is_temporary {
            ResolverState::Temporary
        } else {
            ResolverState::Authenticated
        };
        Ok(resolution)
    }

    /// The id to attach to API calls.
    pub async fn effective_user_id(
        &self,
        authenticated_id: Option<&str>,
    ) -> Result<String, IdentityError> {
        Ok(self.resolve(authenticated_id).await?.current_user_id)
    }

    pub async fn needs_upgrade_prompt(
        &self,
        authenticated_id: Option<&str>,
    ) -> Result<bool, IdentityError> {
        Ok(self.resolve(authenticated_id).await?.needs_upgrade())
    }

    async fn resolve_authenticated(&self, auth_id: &str) -> Result<Resolution, IdentityError> {
        let stored = self.store.get(&self.key)?;
        let pending = stored.filter(|s| s != auth_id && is_temporary_id(s));

        let sync = match pending {
            Some(temp_id) => {
                tracing::info!(from = %temp_id, to = auth_id, "reconciling temporary identity");
                let result = self.coordinator.sync(&temp_id, auth_id).await;
                if result.all_successful {
                    self.store.delete(&self.key)?;
                    tracing::info!("temporary identity cleared");
                } else {
                    tracing::warn!(
                        temp_id = %temp_id,
                        "keeping temporary identity for a later retry"
                    );
                }
                Some(result)
            }
            None => None,
        };

        Ok(Resolution {
            identity: Identity::authenticated(auth_id),
            sync,
            upgrade: None,
            generated: false,
        })
    }

    async fn resolve_temporary(&self) -> Result<Resolution, IdentityError> {
        let Some(stored) = self.store.get(&self.key)? else {
            let id = new_temporary_id();
            self.store.set(&self.key, &id)?;
            tracing::info!(id = %id, "generated temporary identity");
            return Ok(Resolution {
                identity: Identity::temporary(id),
                sync: None,
                upgrade: None,
                generated: true,
            });
        };

        if !needs_upgrade(&stored) {
            return Ok(Resolution {
                identity: Identity::temporary(stored),
                sync: None,
                upgrade: None,
                generated: false,
            });
        }

        let new_id = new_temporary_id();
        let migrated = match self.remote.migrate_user(&stored, &new_id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    old_id = %stored,
                    error = %e,
                    "identity upgrade failed, keeping legacy id"
                );
                false
            }
        };
        let current = if migrated {
            // persisted only after the backend confirmed the move
            self.store.set(&self.key, &new_id)?;
            tracing::info!(old_id = %stored, new_id = %new_id, "temporary identity upgraded");
            new_id.clone()
        } else {
            stored.clone()
        };
        Ok(Resolution {
            identity: Identity::temporary(current),
            sync: None,
            upgrade: Some(IdUpgrade { old_id: stored, new_id, migrated }),
            generated: false,
        })
    }
}
