//! The bearer credential and the events observers care about.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

/// Views the client can be sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    Members,
    Books,
    Loans,
    LoanChart,
    Fines,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    /// The backend rejected the credential; it has been cleared.
    Expired { redirect: Route },
}

/// Single source of truth for the bearer token.
///
/// Cheap to clone; clones share the same credential.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    token: watch::Sender<Option<String>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("signed_in", &self.is_signed_in())
            .finish()
    }
}

impl Session {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        let (token, _) = watch::channel(token.filter(|t| !t.trim().is_empty()));
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(Inner { token, events }),
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.inner.token.borrow().clone()
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.inner.token.borrow().is_some()
    }

    pub fn set(&self, token: String) {
        self.inner.token.send_replace(Some(token));
        self.emit(SessionEvent::SignedIn);
    }

    /// Sign out deliberately.
    pub fn clear(&self) {
        if self.inner.token.send_replace(None).is_some() {
            info!("signed out");
        }
        self.emit(SessionEvent::SignedOut);
    }

    /// Drop a credential the backend no longer accepts and send observers to login.
    pub fn expire(&self) {
        if self.inner.token.send_replace(None).is_some() {
            warn!("credential rejected by the backend, redirecting to login");
        }
        self.emit(SessionEvent::Expired {
            redirect: Route::Login,
        });
    }

    /// Stream of session events from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Watch the credential itself.
    #[must_use]
    pub fn watch_token(&self) -> watch::Receiver<Option<String>> {
        self.inner.token.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // no receivers is fine; nobody is listening yet
        let _ = self.inner.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_token_is_not_a_session() {
        assert!(!Session::new(Some("   ".into())).is_signed_in());
        assert!(Session::new(Some("abc".into())).is_signed_in());
    }

    #[test]
    fn expire_clears_and_redirects_observers() {
        let session = Session::new(Some("abc".into()));
        let mut events = session.subscribe();
        let clone = session.clone();

        clone.expire();

        assert_eq!(session.token(), None);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Expired {
                redirect: Route::Login
            }
        );
    }

    #[test]
    fn set_notifies_token_watchers() {
        let session = Session::default();
        let watcher = session.watch_token();
        session.set("tok".into());
        assert!(watcher.has_changed().unwrap());
        assert_eq!(watcher.borrow().as_deref(), Some("tok"));
    }
}
