//! Build locking for dependency graph builds
//!
//! Both explicit rebuilds and the implicit first build of a search register
//! here. Two layers:
//! 1. Filesystem locks (cross-process) keep two processes from building the
//!    same project at once
//! 2. In-memory locks (in-process) let concurrent requests share the result of
//!    a single build through a broadcast channel

use super::fs_lock::FsLockGuard;
use crate::types::RebuildResponse;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::sync::broadcast;

/// A build still marked active after this long is assumed to have crashed
const MAX_LOCK_DURATION: Duration = Duration::from_secs(30 * 60);

/// What waiters receive; errors are pre-rendered because they are shared.
///
/// `None` when the graph came from a search's implicit build, which produces
/// no report; it is in the cache once the result arrives.
pub(crate) type SharedBuildResult = Result<Option<RebuildResponse>, String>;

pub(crate) type BuildOps = Arc<RwLock<HashMap<String, BuildOperation>>>;

/// State for an in-progress build
pub(crate) struct BuildOperation {
    pub(crate) result_tx: broadcast::Sender<SharedBuildResult>,
    /// Cleared once the result has been broadcast
    pub(crate) active: Arc<AtomicBool>,
    pub(crate) started_at: Instant,
}

impl BuildOperation {
    pub(crate) fn is_stale(&self) -> bool {
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        self.started_at.elapsed() > MAX_LOCK_DURATION
    }

    fn is_finished(&self) -> bool {
        !self.active.load(Ordering::Acquire)
    }
}

/// Result of trying to acquire a build lock
pub(crate) enum BuildLockResult {
    /// We hold both locks and should build
    Acquired(BuildLockGuard),
    /// Another task in this process is building; wait for its result
    WaitForResult(broadcast::Receiver<SharedBuildResult>),
    /// Another process is building this project
    WaitForFilesystemLock(String),
}

/// Try to register a build for `key`
pub(crate) async fn try_acquire(
    ops: &BuildOps,
    lock_dir: &std::path::Path,
    key: &str,
) -> anyhow::Result<BuildLockResult> {
    let mut map = ops.write().await;

    if let Some(existing) = map.get(key) {
        if existing.is_stale() {
            tracing::warn!("Removing stale build lock for {}", key);
            map.remove(key);
        } else if existing.is_finished() {
            tracing::debug!("Removing finished build lock for {}", key);
            map.remove(key);
        } else {
            tracing::info!("Build already in progress for {}, waiting for result", key);
            return Ok(BuildLockResult::WaitForResult(existing.result_tx.subscribe()));
        }
    }

    let Some(fs_lock) = FsLockGuard::try_acquire(lock_dir, key)? else {
        return Ok(BuildLockResult::WaitForFilesystemLock(key.to_string()));
    };

    // Capacity of 1: a single result is ever sent
    let (result_tx, _) = broadcast::channel(1);
    let active = Arc::new(AtomicBool::new(true));
    map.insert(
        key.to_string(),
        BuildOperation {
            result_tx: result_tx.clone(),
            active: active.clone(),
            started_at: Instant::now(),
        },
    );
    drop(map);

    Ok(BuildLockResult::Acquired(BuildLockGuard {
        key: key.to_string(),
        ops: ops.clone(),
        result_tx,
        active,
        released: false,
        _fs_lock: fs_lock,
    }))
}

/// Guard for a registered build; cleans up the registration when released
pub(crate) struct BuildLockGuard {
    key: String,
    ops: BuildOps,
    result_tx: broadcast::Sender<SharedBuildResult>,
    active: Arc<AtomicBool>,
    released: bool,
    _fs_lock: FsLockGuard,
}

impl BuildLockGuard {
    /// Hand the result to every waiter
    ///
    /// Holds the registry lock so no waiter can subscribe between the send
    /// and the registration being marked finished.
    pub(crate) async fn broadcast_result(&self, result: &SharedBuildResult) {
        let _map = self.ops.write().await;
        self.active.store(false, Ordering::Release);
        // No receivers is fine
        let _ = self.result_tx.send(result.clone());
    }

    /// Remove the registration; call after `broadcast_result`
    pub(crate) async fn release(mut self) {
        let mut map = self.ops.write().await;
        map.remove(&self.key);
        self.released = true;
    }
}

impl Drop for BuildLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        // Waiters must not hang when a build is abandoned
        self.active.store(false, Ordering::Release);
        let _ = self
            .result_tx
            .send(Err("Dependency graph build was interrupted".to_string()));

        tracing::warn!(
            "Build lock for '{}' dropped without release, cleaning up",
            self.key
        );

        let key = self.key.clone();
        let ops = self.ops.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                ops.write().await.remove(&key);
            });
        }
    }
}
