// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use parfum::{
  AddToCartParams, AuthBackend, CartBackend, CartError, CartItem, InMemoryBackend, NewCartItem, Perfume, RemoteService,
  Session,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

pub const SHOPPER_EMAIL: &str = "shopper@example.com";
pub const SHOPPER_PASSWORD: &str = "correct-horse";

// --- Backend wrapper counting remote cart calls, with switchable failures ---

#[derive(Default)]
pub struct CallCounts {
  pub list: AtomicUsize,
  pub upsert: AtomicUsize,
  pub insert: AtomicUsize,
  pub update: AtomicUsize,
  pub delete: AtomicUsize,
  pub clear: AtomicUsize,
}

impl CallCounts {
  fn all(&self) -> [&AtomicUsize; 6] {
    [&self.list, &self.upsert, &self.insert, &self.update, &self.delete, &self.clear]
  }
}

#[derive(Default)]
pub struct FailureSwitches {
  pub list: AtomicBool,
  pub upsert: AtomicBool,
  pub update: AtomicBool,
  pub delete: AtomicBool,
  pub clear: AtomicBool,
  pub sign_out: AtomicBool,
}

#[derive(Default)]
pub struct RecordingBackend {
  pub inner: InMemoryBackend,
  pub calls: CallCounts,
  pub fail: FailureSwitches,
}

impl RecordingBackend {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Total number of cart calls that reached the backend.
  pub fn cart_calls(&self) -> usize {
    self.calls.all().iter().map(|c| c.load(Ordering::SeqCst)).sum()
  }

  pub fn list_calls(&self) -> usize {
    self.calls.list.load(Ordering::SeqCst)
  }

  pub fn reset_counts(&self) {
    for counter in self.calls.all() {
      counter.store(0, Ordering::SeqCst);
    }
  }

  fn outage(switch: &AtomicBool) -> Result<(), CartError> {
    if switch.load(Ordering::SeqCst) {
      return Err(CartError::Api {
        status: 503,
        message: "service unavailable".to_string(),
      });
    }
    Ok(())
  }
}

#[async_trait]
impl AuthBackend for RecordingBackend {
  async fn sign_up(&self, email: &str, password: &str) -> parfum::Result<Option<Session>> {
    self.inner.sign_up(email, password).await
  }

  async fn sign_in_with_password(&self, email: &str, password: &str) -> parfum::Result<Session> {
    self.inner.sign_in_with_password(email, password).await
  }

  async fn refresh_session(&self, refresh_token: &str) -> parfum::Result<Session> {
    self.inner.refresh_session(refresh_token).await
  }

  async fn sign_out(&self, session: &Session) -> parfum::Result<()> {
    Self::outage(&self.fail.sign_out)?;
    self.inner.sign_out(session).await
  }
}

#[async_trait]
impl CartBackend for RecordingBackend {
  async fn list_cart_items(&self, session: &Session) -> parfum::Result<Vec<CartItem>> {
    self.calls.list.fetch_add(1, Ordering::SeqCst);
    Self::outage(&self.fail.list)?;
    self.inner.list_cart_items(session).await
  }

  async fn add_to_cart(&self, session: &Session, params: &AddToCartParams) -> parfum::Result<Option<CartItem>> {
    self.calls.upsert.fetch_add(1, Ordering::SeqCst);
    Self::outage(&self.fail.upsert)?;
    self.inner.add_to_cart(session, params).await
  }

  async fn insert_cart_item(&self, session: &Session, item: &NewCartItem) -> parfum::Result<CartItem> {
    self.calls.insert.fetch_add(1, Ordering::SeqCst);
    self.inner.insert_cart_item(session, item).await
  }

  async fn update_quantity(&self, session: &Session, item_id: Uuid, quantity: i32) -> parfum::Result<()> {
    self.calls.update.fetch_add(1, Ordering::SeqCst);
    Self::outage(&self.fail.update)?;
    self.inner.update_quantity(session, item_id, quantity).await
  }

  async fn delete_cart_item(&self, session: &Session, item_id: Uuid) -> parfum::Result<()> {
    self.calls.delete.fetch_add(1, Ordering::SeqCst);
    Self::outage(&self.fail.delete)?;
    self.inner.delete_cart_item(session, item_id).await
  }

  async fn delete_user_cart(&self, session: &Session) -> parfum::Result<()> {
    self.calls.clear.fetch_add(1, Ordering::SeqCst);
    Self::outage(&self.fail.clear)?;
    self.inner.delete_user_cart(session).await
  }
}

pub fn set(switch: &AtomicBool, on: bool) {
  switch.store(on, Ordering::SeqCst);
}

// --- Fixtures ---

pub fn oud() -> Perfume {
  Perfume::new("oud-royal", "Oud Royal", "Maison Noor")
    .with_image_url("https://cdn.example.com/oud-royal.png")
    .with_price("50ml", 120.0)
    .with_price("100ml", 180.0)
}

pub fn neroli() -> Perfume {
  Perfume::new("neroli-22", "Neroli 22", "Atelier Sud")
    .with_image_url("https://cdn.example.com/neroli.png")
    .with_price("30ml", 55.5)
}

pub fn service_with(backend: &Arc<RecordingBackend>) -> Arc<RemoteService> {
  Arc::new(RemoteService::with_backend(backend.clone()))
}

/// A service with a registered and signed-in shopper.
pub async fn signed_in_service() -> (Arc<RemoteService>, Arc<RecordingBackend>) {
  let backend = RecordingBackend::new();
  let service = service_with(&backend);
  service
    .sign_up(SHOPPER_EMAIL, SHOPPER_PASSWORD)
    .await
    .expect("sign-up should succeed");
  (service, backend)
}

/// Polls `condition` for up to two seconds.
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
  for _ in 0..200 {
    if condition() {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  condition()
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
