//! Session and credential lifecycle
//!
//! Exclusive owner of the active session: persists it on creation and
//! refresh, erases it on logout, and keeps a single background task that
//! refreshes the token ahead of expiry. A session, if present, is never
//! observed expired: every observation point (login, restore, foreground
//! resume) re-validates before handing the token out.
//!
//! Refresh failures are terminal: a stale token left active risks silent
//! write failures mid-count, so any failed refresh tears the session down
//! instead of retrying.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use barinv_common::auth::hash_password;
use barinv_common::storage::SessionStore;
use barinv_common::types::{OperatorProfile, Session};
use barinv_common::Result;

use crate::gateway::{ApiGateway, TokenCell};

/// Wall-clock source. Tests swap it out to observe a session past its
/// expiry without waiting out a real ttl.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Manages login, logout, persistence, and scheduled token refresh.
pub struct SessionManager {
    gateway: Arc<ApiGateway>,
    store: Arc<dyn SessionStore>,
    token: TokenCell,
    refresh_margin: ChronoDuration,
    clock: Clock,
    state: RwLock<Option<Session>>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// `token` must be the same cell the gateway reads; the manager is its
    /// only writer.
    pub fn new(
        gateway: Arc<ApiGateway>,
        store: Arc<dyn SessionStore>,
        token: TokenCell,
        refresh_margin: Duration,
    ) -> Arc<Self> {
        Self::with_clock(gateway, store, token, refresh_margin, Arc::new(Utc::now))
    }

    /// Construct with an explicit time source.
    pub fn with_clock(
        gateway: Arc<ApiGateway>,
        store: Arc<dyn SessionStore>,
        token: TokenCell,
        refresh_margin: Duration,
        clock: Clock,
    ) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            store,
            token,
            refresh_margin: ChronoDuration::from_std(refresh_margin)
                .unwrap_or_else(|_| ChronoDuration::seconds(300)),
            clock,
            state: RwLock::new(None),
            refresh_task: Mutex::new(None),
        })
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Currently active session, if any.
    pub async fn current(&self) -> Option<Session> {
        self.state.read().await.clone()
    }

    /// Authenticate and establish a session.
    ///
    /// The session is persisted before anything else observes it; a
    /// storage failure aborts the login outright rather than proceeding
    /// with a partial session.
    pub async fn login(
        self: &Arc<Self>,
        operator_id: &str,
        password: &str,
    ) -> Result<Session> {
        self.disarm().await;

        let reply = self
            .gateway
            .login(operator_id, &hash_password(password))
            .await?;

        let profile = OperatorProfile {
            operator_id: operator_id.to_string(),
            user_name: reply.user_name,
            inventory_id: reply.inventory_id,
            news_message: reply.news_message,
            news_color: reply.news_color,
        };
        let session = Session::create(reply.token, reply.ttl_seconds, profile, self.now())?;

        // Persist first; only a durable session becomes active.
        self.store.save(&session)?;
        self.install(session.clone()).await;
        self.arm().await;

        tracing::info!(
            operator = %session.profile.operator_id,
            inventory = %session.profile.inventory_id,
            expires_at = %session.expires_at,
            "logged in"
        );
        Ok(session)
    }

    /// End the session. The remote notification is best-effort; local
    /// state is always erased and a local logout always succeeds.
    pub async fn logout(&self) {
        self.disarm().await;
        self.teardown().await;
    }

    /// Load a previously persisted session on startup. An expired or
    /// absent document leaves the manager logged out.
    pub async fn restore(self: &Arc<Self>) -> Result<Option<Session>> {
        let Some(session) = self.store.load()? else {
            return Ok(None);
        };
        if session.is_expired(self.now()) {
            tracing::info!("persisted session expired; clearing");
            self.store.clear()?;
            return Ok(None);
        }
        self.install(session.clone()).await;
        self.arm().await;
        Ok(Some(session))
    }

    /// Re-validate after the host regains foreground focus. The refresh
    /// timer may have been suspended while backgrounded, so the session is
    /// checked against the wall clock: expired → forced logout; otherwise
    /// an immediate proactive refresh. Returns whether a session remains
    /// active.
    pub async fn resume(self: &Arc<Self>) -> bool {
        let session = { self.state.read().await.clone() };
        let Some(session) = session else {
            return false;
        };

        if session.is_expired(self.now()) {
            tracing::warn!("session expired while backgrounded; forcing logout");
            self.logout().await;
            return false;
        }

        match self.refresh_once().await {
            Ok(()) => {
                self.arm().await;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "foreground refresh failed; forcing logout");
                self.logout().await;
                false
            }
        }
    }

    /// Exchange the current token and persist the renewed session.
    async fn refresh_once(&self) -> Result<()> {
        let new_token = self.gateway.refresh().await?;

        let renewed = {
            let state = self.state.read().await;
            match state.as_ref() {
                Some(session) => session.renewed(new_token, self.now()),
                None => return Ok(()), // logged out in the meantime
            }
        };

        self.store.save(&renewed)?;
        self.install(renewed.clone()).await;
        tracing::info!(expires_at = %renewed.expires_at, "token refreshed");
        Ok(())
    }

    /// Make `session` the active one: state and token cell together, the
    /// token written as a single reference swap.
    async fn install(&self, session: Session) {
        let token = session.token.clone();
        *self.state.write().await = Some(session);
        *self.token.write().await = Some(token);
    }

    /// Erase everything after a best-effort remote logout.
    async fn teardown(&self) {
        let had_session = { self.state.read().await.is_some() };
        if had_session {
            if let Err(e) = self.gateway.logout().await {
                tracing::debug!(error = %e, "remote logout failed (ignored)");
            }
        }
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear persisted session");
        }
        *self.state.write().await = None;
        *self.token.write().await = None;
        tracing::info!("logged out");
    }

    /// Arm the refresh task. Any previously armed task is aborted first,
    /// so at most one is ever live.
    async fn arm(self: &Arc<Self>) {
        let mut slot = self.refresh_task.lock().await;
        if let Some(task) = slot.take() {
            task.abort();
        }
        let manager = Arc::clone(self);
        *slot = Some(tokio::spawn(manager.refresh_loop()));
    }

    async fn disarm(&self) {
        let mut slot = self.refresh_task.lock().await;
        if let Some(task) = slot.take() {
            task.abort();
        }
    }

    /// Background task: sleep until `expires_at − margin`, refresh,
    /// repeat. Any failure tears the session down and ends the task.
    async fn refresh_loop(self: Arc<Self>) {
        loop {
            let due_at = {
                let state = self.state.read().await;
                match state.as_ref() {
                    Some(session) => session.refresh_due_at(self.refresh_margin),
                    None => return,
                }
            };

            let delay = (due_at - self.now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            tracing::debug!(due_in_secs = delay.as_secs(), "refresh timer armed");
            tokio::time::sleep(delay).await;

            if let Err(e) = self.refresh_once().await {
                tracing::warn!(error = %e, "scheduled refresh failed; forcing logout");
                // The task must not abort itself mid-cleanup: clear the
                // handle slot without aborting, then tear down and end.
                {
                    let mut slot = self.refresh_task.lock().await;
                    *slot = None;
                }
                self.teardown().await;
                return;
            }
        }
    }
}
