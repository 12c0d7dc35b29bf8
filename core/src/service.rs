// parfum/src/service.rs

//! Defines `RemoteService`, the single wrapper the cart talks to.
//!
//! Auth calls report failures as a user-facing `AuthFailure`. Cart calls
//! never fail from the caller's point of view: without a session they do
//! nothing, and backend errors are logged and turned into an empty list,
//! `None`, or a silent no-op. An expired session is refreshed before a cart
//! call goes out.

use crate::auth_state::{AuthChangeEvent, AuthSubscription, SessionStore};
use crate::backend::{AddToCartParams, AuthBackend, CartBackend, SupabaseBackend};
use crate::config::BackendConfig;
use crate::error::{AuthFailure, CartError, Result};
use crate::models::{AuthUser, CartItem, NewCartItem, Perfume, Session};
use chrono::Utc;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

static SHARED: OnceCell<Arc<RemoteService>> = OnceCell::new();

pub struct RemoteService {
  auth: Arc<dyn AuthBackend>,
  cart: Arc<dyn CartBackend>,
  sessions: SessionStore,
}

impl RemoteService {
  pub fn new(auth: Arc<dyn AuthBackend>, cart: Arc<dyn CartBackend>) -> Self {
    Self {
      auth,
      cart,
      sessions: SessionStore::new(),
    }
  }

  /// Uses one object for both auth and cart calls.
  pub fn with_backend<B>(backend: Arc<B>) -> Self
  where
    B: AuthBackend + CartBackend + 'static,
  {
    Self::new(backend.clone(), backend)
  }

  /// Builds a service against the hosted Supabase project described by `config`.
  pub fn from_config(config: BackendConfig) -> Result<Self> {
    Ok(Self::with_backend(Arc::new(SupabaseBackend::new(config)?)))
  }

  /// The process-wide instance. The first call constructs it; later calls
  /// ignore `init` and return the same object.
  pub fn shared(init: impl FnOnce() -> RemoteService) -> Arc<RemoteService> {
    SHARED.get_or_init(|| Arc::new(init())).clone()
  }

  /// Like [`RemoteService::shared`], for constructors that can fail.
  pub fn try_shared(init: impl FnOnce() -> Result<RemoteService>) -> Result<Arc<RemoteService>> {
    SHARED.get_or_try_init(|| init().map(Arc::new)).cloned()
  }

  /// The process-wide instance if one was constructed.
  pub fn get_shared() -> Option<Arc<RemoteService>> {
    SHARED.get().cloned()
  }

  pub fn sessions(&self) -> &SessionStore {
    &self.sessions
  }

  pub fn current_session(&self) -> Option<Session> {
    self.sessions.current()
  }

  pub fn current_user(&self) -> Option<AuthUser> {
    self.sessions.current().map(|s| s.user)
  }

  pub fn subscribe(&self) -> AuthSubscription {
    self.sessions.subscribe()
  }

  // --- Auth ---

  #[instrument(name = "service::sign_up", skip_all)]
  pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthFailure> {
    match self.auth.sign_up(email, password).await {
      Ok(Some(session)) => {
        self.sessions.set_session(session, AuthChangeEvent::SignedIn);
        Ok(())
      }
      Ok(None) => {
        debug!("Account created; waiting for email confirmation before a session exists.");
        Ok(())
      }
      Err(e) => {
        warn!(error = %e, "Sign-up failed.");
        Err(AuthFailure::from(e))
      }
    }
  }

  #[instrument(name = "service::sign_in", skip_all)]
  pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthFailure> {
    match self.auth.sign_in_with_password(email, password).await {
      Ok(session) => {
        self.sessions.set_session(session, AuthChangeEvent::SignedIn);
        Ok(())
      }
      Err(e) => {
        warn!(error = %e, "Sign-in failed.");
        Err(AuthFailure::from(e))
      }
    }
  }

  /// Exchanges the refresh token for a new session.
  #[instrument(name = "service::refresh_session", skip_all)]
  pub async fn refresh_session(&self) -> Result<(), AuthFailure> {
    let Some(current) = self.sessions.current() else {
      return Err(AuthFailure::new("Auth session missing!"));
    };
    match self.auth.refresh_session(&current.refresh_token).await {
      Ok(session) => {
        self.sessions.set_session(session, AuthChangeEvent::TokenRefreshed);
        Ok(())
      }
      Err(e) => {
        warn!(error = %e, "Session refresh failed.");
        Err(AuthFailure::from(e))
      }
    }
  }

  /// Always drops the local session; a failed remote logout is still reported.
  #[instrument(name = "service::sign_out", skip_all)]
  pub async fn sign_out(&self) -> Result<(), AuthFailure> {
    let Some(session) = self.sessions.current() else {
      return Ok(());
    };
    let remote = self.auth.sign_out(&session).await;
    self.sessions.clear();
    remote.map_err(|e| {
      warn!(error = %e, "Remote sign-out failed; local session cleared anyway.");
      AuthFailure::from(e)
    })
  }

  // --- Cart ---

  /// The session for a cart call. An expired access token is refreshed first.
  async fn active_session(&self) -> Result<Session> {
    let session = self.sessions.current().ok_or(CartError::NotAuthenticated)?;
    if !session.is_expired(Utc::now()) {
      return Ok(session);
    }
    debug!("Access token expired; refreshing before the cart call.");
    let refreshed = self.auth.refresh_session(&session.refresh_token).await?;
    self.sessions.set_session(refreshed.clone(), AuthChangeEvent::TokenRefreshed);
    Ok(refreshed)
  }

  /// Like `active_session`, with a failed refresh logged and treated as no session.
  async fn cart_session(&self) -> Option<Session> {
    match self.active_session().await {
      Ok(session) => Some(session),
      Err(CartError::NotAuthenticated) => None,
      Err(e) => {
        error!(error = %e, "Could not refresh the expired session.");
        None
      }
    }
  }

  /// The user's rows oldest first, or an empty list.
  pub async fn get_cart_items(&self) -> Vec<CartItem> {
    self.try_get_cart_items().await.unwrap_or_default()
  }

  /// Distinguishes a failed fetch (`None`) from an empty cart.
  #[instrument(name = "service::get_cart_items", skip_all)]
  pub async fn try_get_cart_items(&self) -> Option<Vec<CartItem>> {
    let session = match self.active_session().await {
      Ok(session) => session,
      Err(CartError::NotAuthenticated) => return Some(Vec::new()),
      Err(e) => {
        error!(error = %e, "Could not refresh the expired session.");
        return None;
      }
    };
    match self.cart.list_cart_items(&session).await {
      Ok(items) => {
        debug!(count = items.len(), "Fetched cart items.");
        Some(items)
      }
      Err(e) => {
        error!(error = %e, "Error fetching cart items.");
        None
      }
    }
  }

  /// Atomically adds `quantity` of `perfume` in `size`. Returns the resulting row.
  #[instrument(name = "service::upsert_cart_item", skip_all, fields(product_id = %perfume.id, size = %size, quantity = quantity))]
  pub async fn upsert_cart_item(&self, perfume: &Perfume, size: &str, quantity: i32) -> Option<CartItem> {
    let session = self.cart_session().await?;
    if !perfume.offers_size(size) {
      let offered: Vec<&str> = perfume.sizes().collect();
      warn!(?offered, "Size is not offered by this product; adding it at price 0.");
    }
    let params = AddToCartParams::for_perfume(perfume, size, quantity);
    match self.cart.add_to_cart(&session, &params).await {
      Ok(row) => row,
      Err(e) => {
        error!(error = %e, "Error upserting cart item.");
        None
      }
    }
  }

  /// Plain insert without quantity merging; fails on an existing line.
  #[instrument(name = "service::add_cart_item", skip_all, fields(product_id = %item.product_id))]
  pub async fn add_cart_item(&self, item: &NewCartItem) -> Option<CartItem> {
    let session = self.cart_session().await?;
    match self.cart.insert_cart_item(&session, item).await {
      Ok(row) => Some(row),
      Err(e) => {
        error!(error = %e, "Error adding cart item.");
        None
      }
    }
  }

  #[instrument(name = "service::update_cart_item_quantity", skip(self))]
  pub async fn update_cart_item_quantity(&self, cart_item_id: Uuid, quantity: i32) {
    let Some(session) = self.cart_session().await else {
      return;
    };
    if let Err(e) = self.cart.update_quantity(&session, cart_item_id, quantity).await {
      error!(error = %e, "Error updating cart item.");
    }
  }

  #[instrument(name = "service::remove_cart_item", skip(self))]
  pub async fn remove_cart_item(&self, cart_item_id: Uuid) {
    let Some(session) = self.cart_session().await else {
      return;
    };
    if let Err(e) = self.cart.delete_cart_item(&session, cart_item_id).await {
      error!(error = %e, "Error removing cart item.");
    }
  }

  #[instrument(name = "service::clear_cart", skip_all)]
  pub async fn clear_cart(&self) {
    let Some(session) = self.cart_session().await else {
      return;
    };
    if let Err(e) = self.cart.delete_user_cart(&session).await {
      error!(error = %e, "Error clearing cart.");
    }
  }
}

impl std::fmt::Debug for RemoteService {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RemoteService")
      .field("signed_in", &self.sessions.is_signed_in())
      .finish_non_exhaustive()
  }
}
