// parfum/src/manager.rs

//! Defines `CartManager`, the state holder UI bindings observe.
//!
//! The manager keeps a local copy of the user's cart rows, patches it after
//! each remote call and notifies listeners. It never sees backend errors:
//! `RemoteService` turns them into empty or `None` results.
//!
//! Lock guards on the cart state are never held across `.await` points, and
//! listeners always run after the guards are released.

use crate::models::{CartItem, Perfume, Session};
use crate::notifier::{ListenerId, Notifier};
use crate::service::RemoteService;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

type AuthRequiredHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct CartState {
  pub items: Vec<CartItem>,
  pub is_loading: bool,
}

struct CartInner {
  service: Arc<RemoteService>,
  state: RwLock<CartState>,
  notifier: Notifier,
  on_auth_required: RwLock<Option<AuthRequiredHook>>,
  // User whose cart is currently mirrored.
  session_user: Mutex<Option<Uuid>>,
  listener_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for CartInner {
  fn drop(&mut self) {
    if let Some(task) = self.listener_task.get_mut().take() {
      task.abort();
    }
  }
}

/// Cloning yields another handle to the same cart.
#[derive(Clone)]
pub struct CartManager {
  inner: Arc<CartInner>,
}

impl CartManager {
  /// A manager without a session listener. See [`CartManager::start`].
  pub fn new(service: Arc<RemoteService>) -> Self {
    Self {
      inner: Arc::new(CartInner {
        service,
        state: RwLock::new(CartState::default()),
        notifier: Notifier::new(),
        on_auth_required: RwLock::new(None),
        session_user: Mutex::new(None),
        listener_task: Mutex::new(None),
      }),
    }
  }

  /// Creates a manager and attaches the session listener. Must be called inside a Tokio runtime.
  pub fn start(service: Arc<RemoteService>) -> Self {
    let manager = Self::new(service);
    manager.attach_session_listener();
    manager
  }

  /// Follows the service's auth events: a session reloads the cart, no
  /// session empties it locally. Replaces any previously attached listener.
  pub fn attach_session_listener(&self) {
    let mut events = self.inner.service.subscribe();
    let weak: Weak<CartInner> = Arc::downgrade(&self.inner);
    let task = tokio::spawn(async move {
      while let Some(event) = events.next().await {
        let Some(inner) = weak.upgrade() else {
          break;
        };
        debug!(kind = ?event.kind, "Auth state changed.");
        CartManager { inner }.handle_session_change(event.session.as_ref()).await;
      }
      debug!("Cart session listener stopped.");
    });
    if let Some(previous) = self.inner.listener_task.lock().replace(task) {
      previous.abort();
    }
  }

  pub fn service(&self) -> &Arc<RemoteService> {
    &self.inner.service
  }

  // --- Observed state ---

  pub fn items(&self) -> Vec<CartItem> {
    self.inner.state.read().items.clone()
  }

  pub fn snapshot(&self) -> CartState {
    self.inner.state.read().clone()
  }

  pub fn is_loading(&self) -> bool {
    self.inner.state.read().is_loading
  }

  /// Sum of quantities across all lines.
  pub fn total_items(&self) -> i64 {
    self.inner.state.read().items.iter().map(|item| i64::from(item.quantity)).sum()
  }

  pub fn total_price(&self) -> f64 {
    self.inner.state.read().items.iter().map(CartItem::line_total).sum()
  }

  pub fn find_item(&self, cart_item_id: Uuid) -> Option<CartItem> {
    self.inner.state.read().items.iter().find(|item| item.id == cart_item_id).cloned()
  }

  pub fn add_listener(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
    self.inner.notifier.add_listener(listener)
  }

  pub fn remove_listener(&self, id: ListenerId) -> bool {
    self.inner.notifier.remove_listener(id)
  }

  /// Hook invoked when a cart change is attempted without a session.
  pub fn set_on_auth_required(&self, hook: impl Fn() + Send + Sync + 'static) {
    *self.inner.on_auth_required.write() = Some(Arc::new(hook));
  }

  fn notify_listeners(&self) {
    self.inner.notifier.notify();
  }

  fn set_loading(&self, loading: bool) {
    self.inner.state.write().is_loading = loading;
    self.notify_listeners();
  }

  // --- Operations ---

  /// Reloads the cart. A failed fetch keeps the current list.
  #[instrument(name = "cart::fetch_cart_items", skip_all)]
  pub async fn fetch_cart_items(&self) {
    self.set_loading(true);
    match self.inner.service.try_get_cart_items().await {
      Some(items) => {
        debug!(count = items.len(), "Cart reloaded.");
        self.inner.state.write().items = items;
      }
      None => warn!("Cart fetch failed; keeping the current items."),
    }
    self.set_loading(false);
  }

  /// Adds `quantity` of `perfume` in `size`, merging with an existing line.
  #[instrument(name = "cart::add_to_cart", skip_all, fields(product_id = %perfume.id, size = %size, quantity = quantity))]
  pub async fn add_to_cart(&self, perfume: &Perfume, size: &str, quantity: i32) {
    if self.inner.service.current_user().is_none() {
      info!("Add to cart attempted without a session.");
      let hook = self.inner.on_auth_required.read().clone();
      if let Some(hook) = hook {
        hook();
      }
      return;
    }
    if quantity <= 0 {
      warn!("Quantity must be a positive number; nothing added.");
      return;
    }

    match self.inner.service.upsert_cart_item(perfume, size, quantity).await {
      Some(row) => {
        let mut state = self.inner.state.write();
        match state.items.iter().position(|item| item.same_line(&row.product_id, &row.product_size)) {
          Some(index) => state.items[index] = row,
          None => state.items.push(row),
        }
      }
      None => {
        warn!("Upsert returned no row; reloading the cart.");
        self.fetch_cart_items().await;
      }
    }
    self.notify_listeners();
  }

  /// Sets a line's quantity. Zero or less removes the line; unknown ids are ignored.
  #[instrument(name = "cart::update_quantity", skip(self))]
  pub async fn update_quantity(&self, cart_item_id: Uuid, new_quantity: i32) {
    if self.find_item(cart_item_id).is_none() {
      debug!("No such item in the local cart.");
      return;
    }
    if new_quantity > 0 {
      {
        let mut state = self.inner.state.write();
        if let Some(item) = state.items.iter_mut().find(|item| item.id == cart_item_id) {
          item.quantity = new_quantity;
        }
      }
      self
        .inner
        .service
        .update_cart_item_quantity(cart_item_id, new_quantity)
        .await;
    } else {
      self.remove_from_cart(cart_item_id).await;
    }
    self.notify_listeners();
  }

  /// Removes the line locally, then remotely. The local removal stands even if the remote delete fails.
  #[instrument(name = "cart::remove_from_cart", skip(self))]
  pub async fn remove_from_cart(&self, cart_item_id: Uuid) {
    self.inner.state.write().items.retain(|item| item.id != cart_item_id);
    self.inner.service.remove_cart_item(cart_item_id).await;
    self.notify_listeners();
  }

  #[instrument(name = "cart::clear_cart", skip_all)]
  pub async fn clear_cart(&self) {
    self.inner.service.clear_cart().await;
    self.inner.state.write().items.clear();
    self.notify_listeners();
  }

  /// Reacts to a session change: a new user's session reloads the cart once;
  /// no session empties the local list without any remote call.
  ///
  /// Not every event carrying a session reloads. A token refresh for the user
  /// whose cart is already loaded leaves the list alone, so a refresh never
  /// costs a fetch. Local state only drifts from the server through another
  /// device, and the next add or explicit fetch reconciles that.
  #[instrument(name = "cart::handle_session_change", skip_all, fields(signed_in = session.is_some()))]
  pub async fn handle_session_change(&self, session: Option<&Session>) {
    match session {
      Some(session) => {
        let user_id = session.user_id();
        let changed = self.inner.session_user.lock().replace(user_id) != Some(user_id);
        if changed {
          self.fetch_cart_items().await;
        } else {
          debug!("Session refreshed for the same user; cart left as is.");
        }
      }
      None => {
        *self.inner.session_user.lock() = None;
        self.inner.state.write().items.clear();
        self.notify_listeners();
      }
    }
  }
}

impl std::fmt::Debug for CartManager {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let state = self.inner.state.read();
    f.debug_struct("CartManager")
      .field("items", &state.items.len())
      .field("is_loading", &state.is_loading)
      .finish()
  }
}
