//! Authenticated identity context.
//!
//! The current user is carried as an explicit dependency rather than
//! ambient global state: components that need the identity hold an
//! `AuthContext`, and long-lived components follow sign-in/sign-out
//! transitions through its watch channel.

use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable handle to the current authenticated user.
#[derive(Clone)]
pub struct AuthContext {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl AuthContext {
    /// Create a context with no signed-in user.
    pub fn signed_out() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Create a context already signed in as `user_id`.
    pub fn with_user(user_id: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(Some(user_id.into()));
        Self { tx: Arc::new(tx) }
    }

    /// The current user id, if signed in.
    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Transition to a signed-in state.
    pub fn sign_in(&self, user_id: impl Into<String>) {
        let _ = self.tx.send(Some(user_id.into()));
    }

    /// Transition to a signed-out state.
    pub fn sign_out(&self) {
        let _ = self.tx.send(None);
    }

    /// Receiver that observes identity transitions.
    pub fn changes(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("current", &self.current())
            .finish()
    }
}
