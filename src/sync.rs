use crate::error::RemoteError;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Record sets owned by a user id on the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncDomain {
    Progress,
    Cards,
    Errors,
}

impl SyncDomain {
    pub const ALL: [SyncDomain; 3] = [SyncDomain::Progress, SyncDomain::Cards, SyncDomain::Errors];

    /// Path segment of the reassignment endpoint.
    pub fn endpoint(self) -> &'static str {
        match self {
            SyncDomain::Progress => "/sync-progress",
            SyncDomain::Cards => "/sync-cards",
            SyncDomain::Errors => "/sync-errors",
        }
    }
}

impl fmt::Display for SyncDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncDomain::Progress => "progress",
            SyncDomain::Cards => "cards",
            SyncDomain::Errors => "errors",
        })
    }
}

/// Backend operations that move user data between ids. Both are idempotent.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reassign every record of `domain` owned by `from_id` to `to_id`.
    async fn reassign(
        &self,
        domain: SyncDomain,
        from_id: &str,
        to_id: &str,
    ) -> Result<(), RemoteError>;

    /// Move all data of a legacy temporary id to its replacement.
    async fn migrate_user(&self, old_id: &str, new_id: &str) -> Result<(), RemoteError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SyncResult {
    pub progress: bool,
    pub cards: bool,
    pub errors: bool,
    pub all_successful: bool,
}

impl SyncResult {
    pub fn new(progress: bool, cards: bool, errors: bool) -> Self {
        Self { progress, cards, errors, all_successful: progress && cards && errors }
    }

    pub fn failed_domains(&self) -> Vec<SyncDomain> {
        SyncDomain::ALL
            .into_iter()
            .filter(|d| match d {
                SyncDomain::Progress => !self.progress,
                SyncDomain::Cards => !self.cards,
                SyncDomain::Errors => !self.errors,
            })
            .collect()
    }
}

/// Runs the three reassignments for an id change and reports each outcome.
///
/// All three are attempted concurrently and none short-circuits another. Failures never
/// escape `sync`; clearing local identity state is left to the caller.
#[derive(Clone)]
pub struct CrossDomainSyncCoordinator {
    remote: Arc<dyn RemoteStore>,
}

impl CrossDomainSyncCoordinator {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    pub async fn sync(&self, from_id: &str, to_id: &str) -> SyncResult {
        let (progress, cards, errors) = tokio::join!(
            self.reassign(SyncDomain::Progress, from_id, to_id),
            self.reassign(SyncDomain::Cards, from_id, to_id),
            self.reassign(SyncDomain::Errors, from_id, to_id),
        );
        let result = SyncResult::new(progress, cards, errors);
        if result.all_successful {
            tracing::info!(from_id, to_id, "user data synced");
        } else {
            tracing::warn!(
                from_id,
                to_id,
                failed = ?result.failed_domains(),
                "user data sync incomplete"
            );
        }
        result
    }

    async fn reassign(&self, domain: SyncDomain, from_id: &str, to_id: &str) -> bool {
        match self.remote.reassign(domain, from_id, to_id).await {
            Ok(()) => {
                tracing::debug!(%domain, "records reassigned");
                true
            }
            Err(e) => {
                tracing::warn!(%domain, error = %e, "failed to reassign records");
                false
            }
        }
    }
}
