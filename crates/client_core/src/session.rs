use std::sync::Arc;

use shared::domain::StudentProfile;
use storage::KeyValueStore;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::LogoutTiming;

/// Status the library service uses for "not signed in".
pub const UNAUTHENTICATED_STATUS: u16 = 401;

const SESSION_AUTHENTICATED_KEY: &str = "session.authenticated";
const SESSION_IDENTITY_KEY: &str = "session.identity";
const REMEMBER_STU_ID_KEY: &str = "remember.stu_id";
const REMEMBER_PASSWORD_KEY: &str = "remember.password";

/// Authenticated-identity marker for this client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    authenticated: bool,
    identity: Option<StudentProfile>,
}

impl Session {
    /// Builds a session from raw parts; an inconsistent pair is kept as-is
    /// and simply reports invalid.
    pub fn from_parts(authenticated: bool, identity: Option<StudentProfile>) -> Self {
        Self {
            authenticated,
            identity,
        }
    }

    pub fn signed_in(identity: StudentProfile) -> Self {
        Self::from_parts(true, Some(identity))
    }

    pub fn is_valid(&self) -> bool {
        self.authenticated && self.identity.is_some()
    }

    pub fn identity(&self) -> Option<&StudentProfile> {
        if self.is_valid() {
            self.identity.as_ref()
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.authenticated = false;
        self.identity = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationTarget {
    Entry,
    Main,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationMode {
    Assign,
    Replace,
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, target: NavigationTarget, mode: NavigationMode);
    fn current(&self) -> NavigationTarget;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub stu_id: String,
    pub password: String,
}

pub struct SessionGate {
    session: RwLock<Session>,
    tab_store: Arc<dyn KeyValueStore>,
    durable_store: Arc<dyn KeyValueStore>,
    navigator: Arc<dyn Navigator>,
    logout_timing: LogoutTiming,
}

impl SessionGate {
    /// Rebuilds the session from the tab store.
    pub fn restore(
        tab_store: Arc<dyn KeyValueStore>,
        durable_store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        logout_timing: LogoutTiming,
    ) -> Self {
        let authenticated = tab_store.get(SESSION_AUTHENTICATED_KEY).as_deref() == Some("true");
        let identity = tab_store
            .get(SESSION_IDENTITY_KEY)
            .and_then(|raw| serde_json::from_str::<StudentProfile>(&raw).ok());
        Self {
            session: RwLock::new(Session::from_parts(authenticated, identity)),
            tab_store,
            durable_store,
            navigator,
            logout_timing,
        }
    }

    pub async fn snapshot(&self) -> Session {
        self.session.read().await.clone()
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    /// True iff the session is valid. Otherwise redirects to the entry page;
    /// the caller must stop.
    pub async fn check_login_status(&self) -> bool {
        if self.session.read().await.is_valid() {
            return true;
        }
        info!("session: not signed in; redirecting to entry page");
        self.navigator
            .navigate(NavigationTarget::Entry, NavigationMode::Assign);
        false
    }

    /// `check_login_status` plus the identity to forward to the service.
    pub async fn require_identity(&self) -> Option<StudentProfile> {
        if !self.check_login_status().await {
            return None;
        }
        self.session.read().await.identity().cloned()
    }

    pub(crate) async fn establish(&self, identity: StudentProfile) {
        match serde_json::to_string(&identity) {
            Ok(raw) => {
                if let Err(err) = self.tab_store.set(SESSION_IDENTITY_KEY, &raw) {
                    warn!(%err, "session: failed to persist identity");
                }
            }
            Err(err) => warn!(%err, "session: failed to encode identity"),
        }
        if let Err(err) = self.tab_store.set(SESSION_AUTHENTICATED_KEY, "true") {
            warn!(%err, "session: failed to persist marker");
        }

        info!(stu_id = %identity.stu_id, "session: established");
        *self.session.write().await = Session::signed_in(identity);
    }

    /// Stores the raw identifier and secret for the next visit.
    ///
    /// Known weakness: both values are written in plaintext to durable
    /// storage, exactly as the library portal has always done.
    pub(crate) fn remember(&self, credentials: &Credentials) {
        warn!(
            stu_id = %credentials.stu_id,
            "session: remember-me stores the password in plaintext on disk"
        );
        for (key, value) in [
            (REMEMBER_STU_ID_KEY, credentials.stu_id.as_str()),
            (REMEMBER_PASSWORD_KEY, credentials.password.as_str()),
        ] {
            if let Err(err) = self.durable_store.set(key, value) {
                warn!(%err, key, "session: failed to persist remembered credential");
            }
        }
    }

    pub(crate) fn forget_credentials(&self) {
        for key in [REMEMBER_STU_ID_KEY, REMEMBER_PASSWORD_KEY] {
            if let Err(err) = self.durable_store.remove(key) {
                warn!(%err, key, "session: failed to clear remembered credential");
            }
        }
    }

    pub fn remembered_credentials(&self) -> Option<Credentials> {
        let stu_id = self.durable_store.get(REMEMBER_STU_ID_KEY)?;
        let password = self.durable_store.get(REMEMBER_PASSWORD_KEY)?;
        Some(Credentials { stu_id, password })
    }

    /// Clears the session and remembered credentials, then leaves the
    /// protected page. A second, replacing navigation follows if the first
    /// one has not taken effect within the fallback window.
    pub async fn logout(&self) {
        self.session.write().await.clear();
        for key in [SESSION_AUTHENTICATED_KEY, SESSION_IDENTITY_KEY] {
            if let Err(err) = self.tab_store.remove(key) {
                warn!(%err, key, "session: failed to clear marker");
            }
        }
        self.forget_credentials();
        info!("session: signed out");

        tokio::time::sleep(self.logout_timing.delay).await;
        self.navigator
            .navigate(NavigationTarget::Entry, NavigationMode::Assign);

        tokio::time::sleep(self.logout_timing.fallback).await;
        if self.navigator.current() == NavigationTarget::Main {
            warn!("session: still on main page after logout; replacing location");
            self.navigator
                .navigate(NavigationTarget::Entry, NavigationMode::Replace);
        }
    }

    /// False (after logging out) when `status` is the unauthenticated
    /// sentinel; the caller must then skip every further UI update.
    pub async fn intercept_response(&self, status: u16) -> bool {
        if status != UNAUTHENTICATED_STATUS {
            return true;
        }
        warn!(status, "session: service reports unauthenticated; forcing logout");
        self.logout().await;
        false
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
