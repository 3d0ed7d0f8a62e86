//! Visitor service — per-browser session stores and idle eviction.
//!
//! DESIGN
//! ======
//! A visitor is registered when a browser first submits a sign-in form:
//! a fresh session store with its own provider subscription. Later
//! requests reuse it and refresh `last_seen`; browsers that never sign in
//! hold nothing here. A background task wakes periodically and drops
//! visitors idle for longer than the configured TTL. Evicted stores are
//! dropped outside the lock; dropping a store unsubscribes it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::session::SessionStore;
use crate::state::{AppState, VisitorState};

/// Upper bound on the time between sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Session store for `visitor_id`, created on first sight.
pub async fn session_for(state: &AppState, visitor_id: Uuid) -> Arc<SessionStore> {
    let mut visitors = state.visitors.write().await;
    let visitor = visitors.entry(visitor_id).or_insert_with(|| {
        debug!(%visitor_id, "new visitor");
        VisitorState { store: Arc::new(state.new_session_store()), last_seen: Instant::now() }
    });
    visitor.last_seen = Instant::now();
    Arc::clone(&visitor.store)
}

/// Session store for an already registered visitor, refreshing `last_seen`.
pub async fn existing(state: &AppState, visitor_id: Uuid) -> Option<Arc<SessionStore>> {
    let mut visitors = state.visitors.write().await;
    let visitor = visitors.get_mut(&visitor_id)?;
    visitor.last_seen = Instant::now();
    Some(Arc::clone(&visitor.store))
}

/// Forget a visitor. Returns `false` if it was not registered.
pub async fn evict(state: &AppState, visitor_id: Uuid) -> bool {
    let removed = state.visitors.write().await.remove(&visitor_id);
    if removed.is_some() {
        debug!(%visitor_id, "visitor evicted");
    }
    removed.is_some()
}

/// Drop visitors not seen since `now - ttl`. Returns how many were dropped.
pub async fn sweep_idle(state: &AppState, now: Instant, ttl: Duration) -> usize {
    // Collect idle stores under the lock, then release before dropping them.
    let idle: Vec<VisitorState> = {
        let mut visitors = state.visitors.write().await;
        let ids: Vec<Uuid> = visitors
            .iter()
            .filter(|(_, v)| now.saturating_duration_since(v.last_seen) > ttl)
            .map(|(id, _)| *id)
            .collect();
        ids.iter().filter_map(|id| visitors.remove(id)).collect()
    };

    if !idle.is_empty() {
        info!(count = idle.len(), "evicted idle visitors");
    }
    idle.len()
}

fn sweep_interval(ttl: Duration) -> Duration {
    ttl.min(SWEEP_INTERVAL).max(MIN_SWEEP_INTERVAL)
}

/// Spawn the background sweep task. Returns a handle for shutdown.
pub fn spawn_sweep_task(state: AppState) -> JoinHandle<()> {
    let ttl = state.config.visitor_idle_ttl;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval(ttl));
        loop {
            interval.tick().await;
            sweep_idle(&state, Instant::now(), ttl).await;
        }
    })
}

#[cfg(test)]
#[path = "visitors_test.rs"]
mod tests;
