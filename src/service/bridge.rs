//! Invalidation bridge: membership mutations force detail refreshes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::UserId;
use crate::port::{DetailView, IdentityProvider};
use crate::service::detail::DetailCache;
use crate::service::membership::MembershipCache;

/// Re-render trigger emitted after a bridge-driven refresh lands.
#[derive(Debug, Clone)]
pub struct RefreshEvent {
    pub view: DetailView,
    pub user: UserId,
    pub rows: usize,
}

/// Write-through invalidation from the membership cache to one detail cache.
///
/// Subscribes to membership mutation events and, on every strict
/// `last_mutated` increase for the current user, invalidates the detail
/// cache and forces one refetch. No polling. A refetch that completes after
/// the user changed is discarded instead of landing in an orphaned cache.
pub struct InvalidationBridge {
    handle: JoinHandle<()>,
}

impl InvalidationBridge {
    pub fn spawn(
        membership: &MembershipCache,
        detail: Arc<DetailCache>,
        identity: Arc<dyn IdentityProvider>,
        render_tx: broadcast::Sender<RefreshEvent>,
    ) -> Self {
        let mut rx = membership.subscribe();
        let handle = tokio::spawn(async move {
            let mut last_seen: Option<DateTime<Utc>> = None;

            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    // Missed events are fine: the next one still triggers a
                    // full refetch, events carry no deltas.
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(view = %detail.view(), skipped, "Bridge lagged behind mutations");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let Some(user) = identity.current_user() else {
                    continue;
                };
                if event.user != user {
                    continue;
                }
                if last_seen.is_some_and(|seen| event.mutated_at <= seen) {
                    continue;
                }
                last_seen = Some(event.mutated_at);

                debug!(view = %detail.view(), %user, "Membership mutated, invalidating detail cache");
                detail.invalidate(&user);
                let rows = detail.get(&user, true).await;

                // The fetch was tagged with `user`; if the session moved on
                // while it was in flight, drop the orphaned entry.
                if identity.current_user() != Some(user) {
                    info!(view = %detail.view(), %user, "User changed mid-refresh, discarding result");
                    detail.discard_if_owner(&user);
                    continue;
                }

                let _ = render_tx.send(RefreshEvent {
                    view: detail.view(),
                    user,
                    rows: rows.len(),
                });
            }
        });

        Self { handle }
    }

    /// Stop the bridge task.
    pub fn abort(&self) {
        self.handle.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for InvalidationBridge {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
