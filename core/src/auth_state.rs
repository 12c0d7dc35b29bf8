// parfum/src/auth_state.rs

//! Holds the current session and broadcasts auth state changes.

use crate::models::Session;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeEvent {
  /// First event every subscriber receives, carrying whatever session exists at subscription time.
  InitialSession,
  SignedIn,
  SignedOut,
  TokenRefreshed,
}

#[derive(Debug, Clone)]
pub struct AuthEvent {
  pub kind: AuthChangeEvent,
  pub session: Option<Session>,
}

#[derive(Debug)]
pub struct SessionStore {
  current: RwLock<Option<Session>>,
  events: broadcast::Sender<AuthEvent>,
}

impl SessionStore {
  pub fn new() -> Self {
    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    Self {
      current: RwLock::new(None),
      events,
    }
  }

  pub fn current(&self) -> Option<Session> {
    self.current.read().clone()
  }

  pub fn is_signed_in(&self) -> bool {
    self.current.read().is_some()
  }

  pub fn set_session(&self, session: Session, kind: AuthChangeEvent) {
    debug!(user_id = %session.user_id(), ?kind, "Storing session.");
    *self.current.write() = Some(session.clone());
    self.publish(AuthEvent {
      kind,
      session: Some(session),
    });
  }

  /// Drops the session. Emits `SignedOut` only if a session was present.
  pub fn clear(&self) -> bool {
    let previous = self.current.write().take();
    if previous.is_some() {
      debug!("Session cleared.");
      self.publish(AuthEvent {
        kind: AuthChangeEvent::SignedOut,
        session: None,
      });
    }
    previous.is_some()
  }

  pub fn subscribe(&self) -> AuthSubscription {
    // Subscribe before reading so no change slips between the snapshot and the stream.
    let receiver = self.events.subscribe();
    AuthSubscription {
      initial: Some(AuthEvent {
        kind: AuthChangeEvent::InitialSession,
        session: self.current(),
      }),
      receiver,
    }
  }

  fn publish(&self, event: AuthEvent) {
    // No receivers is fine.
    let _ = self.events.send(event);
  }
}

impl Default for SessionStore {
  fn default() -> Self {
    Self::new()
  }
}

/// A stream of auth events starting with `InitialSession`.
#[derive(Debug)]
pub struct AuthSubscription {
  initial: Option<AuthEvent>,
  receiver: broadcast::Receiver<AuthEvent>,
}

impl AuthSubscription {
  /// Next event, or `None` once the store is gone.
  pub async fn next(&mut self) -> Option<AuthEvent> {
    if let Some(initial) = self.initial.take() {
      return Some(initial);
    }
    loop {
      match self.receiver.recv().await {
        Ok(event) => return Some(event),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
          warn!(skipped, "Auth event subscriber lagged; continuing with the newest events.");
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::AuthUser;
  use uuid::Uuid;

  fn session() -> Session {
    Session {
      access_token: "a".to_string(),
      refresh_token: "r".to_string(),
      expires_at: None,
      user: AuthUser { id: Uuid::new_v4(), email: None },
    }
  }

  #[tokio::test]
  async fn subscribers_see_initial_state_then_changes() {
    let store = SessionStore::new();
    let mut events = store.subscribe();

    let first = events.next().await.unwrap();
    assert_eq!(first.kind, AuthChangeEvent::InitialSession);
    assert!(first.session.is_none());

    store.set_session(session(), AuthChangeEvent::SignedIn);
    let second = events.next().await.unwrap();
    assert_eq!(second.kind, AuthChangeEvent::SignedIn);
    assert!(second.session.is_some());

    assert!(store.clear());
    let third = events.next().await.unwrap();
    assert_eq!(third.kind, AuthChangeEvent::SignedOut);
    assert!(third.session.is_none());
  }

  #[test]
  fn clearing_without_session_is_silent() {
    let store = SessionStore::new();
    let mut receiver = store.events.subscribe();
    assert!(!store.clear());
    assert!(receiver.try_recv().is_err());
  }

  #[tokio::test]
  async fn late_subscriber_starts_from_current_session() {
    let store = SessionStore::new();
    let s = session();
    store.set_session(s.clone(), AuthChangeEvent::SignedIn);

    let mut events = store.subscribe();
    let first = events.next().await.unwrap();
    assert_eq!(first.kind, AuthChangeEvent::InitialSession);
    assert_eq!(first.session, Some(s));
  }
}
