// parfum/src/notifier.rs

//! A minimal change-notification primitive for UI bindings.
//!
//! Listeners are no-argument callbacks. They are invoked synchronously, in
//! registration order, after the lock protecting the listener list has been
//! released, so a listener may read the cart or register further listeners.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct Notifier {
  listeners: Mutex<Vec<(ListenerId, Listener)>>,
  next_id: AtomicU64,
}

impl Notifier {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_listener(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
    let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
    self.listeners.lock().push((id, Arc::new(listener)));
    id
  }

  /// Returns `false` if `id` was not registered.
  pub fn remove_listener(&self, id: ListenerId) -> bool {
    let mut listeners = self.listeners.lock();
    let before = listeners.len();
    listeners.retain(|(existing, _)| *existing != id);
    listeners.len() != before
  }

  pub fn listener_count(&self) -> usize {
    self.listeners.lock().len()
  }

  pub fn notify(&self) {
    let snapshot: Vec<Listener> = self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
    tracing::trace!(listeners = snapshot.len(), "Notifying cart listeners.");
    for listener in snapshot {
      listener();
    }
  }
}

impl std::fmt::Debug for Notifier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Notifier").field("listeners", &self.listener_count()).finish()
  }
}
