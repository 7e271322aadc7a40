use super::*;
use crate::identity::{GUEST_DISPLAY_NAME, ResolverState, is_temporary_id, needs_upgrade};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const KEY: &str = "anonymous_user_id";

#[derive(Default)]
struct FakeRemote {
    failing: Mutex<HashSet<SyncDomain>>,
    calls: Mutex<Vec<(SyncDomain, String, String)>>,
    migrations: Mutex<Vec<(String, String)>>,
    migrate_fails: bool,
    migrate_hangs: bool,
}

impl FakeRemote {
    fn failing(domains: &[SyncDomain]) -> Self {
        Self { failing: Mutex::new(domains.iter().copied().collect()), ..Default::default() }
    }

    fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteStore for FakeRemote {
    async fn reassign(
        &self,
        domain: SyncDomain,
        from_id: &str,
        to_id: &str,
    ) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push((domain, from_id.to_string(), to_id.to_string()));
        if self.failing.lock().unwrap().contains(&domain) {
            return Err(RemoteError::Status(500));
        }
        Ok(())
    }

    async fn migrate_user(&self, old_id: &str, new_id: &str) -> Result<(), RemoteError> {
        if self.migrate_hangs {
            std::future::pending::<()>().await;
        }
        self.migrations.lock().unwrap().push((old_id.to_string(), new_id.to_string()));
        if self.migrate_fails { Err(RemoteError::Network("offline".to_string())) } else { Ok(()) }
    }
}

/// Counts writes so concurrent resolutions can be checked for a single mint.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    sets: AtomicUsize,
}

impl KeyValueStore for CountingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key)
    }
}

struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("disk gone".to_string()))
    }

    fn set(&self, _: &str, _: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk gone".to_string()))
    }

    fn delete(&self, _: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk gone".to_string()))
    }
}

fn store_with(id: &str) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.set(KEY, id).unwrap();
    store
}

fn resolver(store: Arc<dyn KeyValueStore>, remote: Arc<FakeRemote>) -> IdentityResolver {
    IdentityResolver::new(store, remote, KEY)
}

#[test]
fn prefixes() {
    assert!(is_temporary_id("temporary_abc"));
    assert!(is_temporary_id("user_anon_1"));
    assert!(is_temporary_id("anonymous_1"));
    assert!(!is_temporary_id("user_42"));
    assert!(needs_upgrade("anonymous_1"));
    assert!(!needs_upgrade("temporary_abc"));
}

#[tokio::test]
async fn sign_in_reconciles_and_clears_temporary_id() {
    let store = store_with("temporary_abc");
    let remote = Arc::new(FakeRemote::default());
    let r = resolver(store.clone(), remote.clone());

    let res = r.resolve_detailed(Some("user_42")).await.unwrap();
    assert_eq!(res.identity.current_user_id, "user_42");
    assert!(!res.identity.is_temporary);
    assert_eq!(res.sync, Some(SyncResult::new(true, true, true)));
    assert_eq!(store.get(KEY).unwrap(), None);
    assert_eq!(r.state().await, ResolverState::Authenticated);

    let calls = remote.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 3);
    assert!(calls.iter().all(|(_, from, to)| from == "temporary_abc" && to == "user_42"));
}

#[tokio::test]
async fn partial_sync_keeps_id_until_retry_succeeds() {
    let store = store_with("temporary_abc");
    let remote = Arc::new(FakeRemote::failing(&[SyncDomain::Cards]));
    let r = resolver(store.clone(), remote.clone());

    let res = r.resolve_detailed(Some("user_42")).await.unwrap();
    let sync = res.sync.unwrap();
    assert!(sync.progress && !sync.cards && sync.errors);
    assert!(!sync.all_successful);
    assert_eq!(store.get(KEY).unwrap().as_deref(), Some("temporary_abc"));

    remote.heal();
    let res = r.resolve_detailed(Some("user_42")).await.unwrap();
    assert!(res.sync.unwrap().all_successful);
    assert_eq!(store.get(KEY).unwrap(), None);
    assert_eq!(remote.call_count(), 6);
}

#[tokio::test]
async fn guest_resolution_is_stable() {
    let store = Arc::new(MemoryStore::new());
    let r = resolver(store.clone(), Arc::new(FakeRemote::default()));
    assert_eq!(r.state().await, ResolverState::Uninitialized);

    let first = r.resolve_detailed(None).await.unwrap();
    assert!(first.generated);
    assert!(first.identity.current_user_id.starts_with("temporary_"));
    assert_eq!(first.identity.display_name.as_deref(), Some(GUEST_DISPLAY_NAME));
    assert!(first.identity.needs_upgrade());

    let second = r.resolve_detailed(None).await.unwrap();
    assert!(!second.generated);
    assert_eq!(second.identity, first.identity);
    assert_eq!(r.state().await, ResolverState::Temporary);
    assert!(r.needs_upgrade_prompt(None).await.unwrap());
}

#[tokio::test]
async fn concurrent_resolutions_mint_one_id() {
    let store = Arc::new(CountingStore::default());
    let r = Arc::new(resolver(store.clone(), Arc::new(FakeRemote::default())));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let r = r.clone();
            tokio::spawn(async move { r.effective_user_id(None).await.unwrap() })
        })
        .collect();
    let mut ids = HashSet::new();
    for h in handles {
        ids.insert(h.await.unwrap());
    }
    assert_eq!(ids.len(), 1);
    assert_eq!(store.sets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn no_sync_when_stored_id_is_not_pending() {
    for stored in ["user_42", "someone_else"] {
        let store = store_with(stored);
        let remote = Arc::new(FakeRemote::default());
        let r = resolver(store.clone(), remote.clone());
        let res = r.resolve_detailed(Some("user_42")).await.unwrap();
        assert_eq!(res.sync, None);
        assert_eq!(remote.call_count(), 0);
        assert_eq!(store.get(KEY).unwrap().as_deref(), Some(stored));
    }

    let remote = Arc::new(FakeRemote::default());
    let r = resolver(Arc::new(MemoryStore::new()), remote.clone());
    assert_eq!(r.resolve_detailed(Some("user_42")).await.unwrap().sync, None);
    assert!(!r.needs_upgrade_prompt(Some("user_42")).await.unwrap());
}

#[tokio::test]
async fn legacy_id_is_reconciled_on_sign_in() {
    let store = store_with("user_anon_7");
    let remote = Arc::new(FakeRemote::default());
    let r = resolver(store.clone(), remote.clone());
    let res = r.resolve_detailed(Some("user_42")).await.unwrap();
    assert!(res.sync.unwrap().all_successful);
    assert_eq!(res.upgrade, None);
    assert_eq!(store.get(KEY).unwrap(), None);
}

#[tokio::test]
async fn legacy_guest_id_is_upgraded() {
    let store = store_with("anonymous_7");
    let remote = Arc::new(FakeRemote::default());
    let r = resolver(store.clone(), remote.clone());

    let res = r.resolve_detailed(None).await.unwrap();
    let upgrade = res.upgrade.unwrap();
    assert!(upgrade.migrated);
    assert_eq!(upgrade.old_id, "anonymous_7");
    assert!(upgrade.new_id.starts_with("temporary_"));
    assert_eq!(res.identity.current_user_id, upgrade.new_id);
    assert_eq!(store.get(KEY).unwrap(), Some(upgrade.new_id.clone()));
    assert_eq!(
        remote.migrations.lock().unwrap().clone(),
        vec![("anonymous_7".to_string(), upgrade.new_id)]
    );

    // upgraded ids are left alone afterwards
    assert_eq!(r.resolve_detailed(None).await.unwrap().upgrade, None);
}

#[tokio::test]
async fn failed_upgrade_keeps_legacy_id() {
    let store = store_with("anonymous_7");
    let remote = Arc::new(FakeRemote { migrate_fails: true, ..Default::default() });
    let r = resolver(store.clone(), remote);

    let res = r.resolve_detailed(None).await.unwrap();
    assert!(!res.upgrade.unwrap().migrated);
    assert_eq!(res.identity.current_user_id, "anonymous_7");
    assert_eq!(store.get(KEY).unwrap().as_deref(), Some("anonymous_7"));
}

#[tokio::test]
async fn cancelled_upgrade_leaves_old_id() {
    let store = store_with("anonymous_7");
    let remote = Arc::new(FakeRemote { migrate_hangs: true, ..Default::default() });
    let r = resolver(store.clone(), remote);

    let res = tokio::time::timeout(Duration::from_millis(50), r.resolve(None)).await;
    assert!(res.is_err());
    assert_eq!(store.get(KEY).unwrap().as_deref(), Some("anonymous_7"));
    // the lock is released with the dropped future
    assert_eq!(r.state().await, ResolverState::Uninitialized);
}

#[tokio::test]
async fn resolver_uses_configured_key() {
    let store = Arc::new(MemoryStore::new());
    let config = ApiConfig { identity_key: "guest_id".to_string(), ..ApiConfig::default() };
    let r = IdentityResolver::from_config(store.clone(), Arc::new(FakeRemote::default()), &config);
    let id = r.effective_user_id(None).await.unwrap();
    assert_eq!(store.get("guest_id").unwrap(), Some(id));
    assert_eq!(store.get(KEY).unwrap(), None);
}

#[tokio::test]
async fn store_failures_surface() {
    let r = resolver(Arc::new(BrokenStore), Arc::new(FakeRemote::default()));
    assert!(matches!(r.resolve(None).await, Err(IdentityError::Store(StoreError::Unavailable(_)))));
    assert!(r.resolve(Some("user_42")).await.is_err());
}

#[tokio::test]
async fn file_store_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("identity.json");

    let first = {
        let r = resolver(Arc::new(FileStore::new(&path)), Arc::new(FakeRemote::default()));
        r.effective_user_id(None).await.unwrap()
    };
    let store = Arc::new(FileStore::new(&path));
    assert_eq!(store.get(KEY).unwrap(), Some(first.clone()));
    let r = resolver(store.clone(), Arc::new(FakeRemote::default()));
    assert_eq!(r.effective_user_id(None).await.unwrap(), first);

    r.resolve(Some("user_42")).await.unwrap();
    assert_eq!(FileStore::new(&path).get(KEY).unwrap(), None);
}

#[test]
fn corrupt_file_store_reports_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("identity.json");
    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(FileStore::new(&path).get(KEY), Err(StoreError::Corrupt(_))));
}
