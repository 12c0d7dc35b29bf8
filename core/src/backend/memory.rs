// parfum/src/backend/memory.rs

//! In-process backend with the same observable semantics as the hosted one:
//! password accounts, bearer sessions, per-user rows and the additive upsert.
//! Used by the offline demo mode and by tests.

use crate::backend::{AddToCartParams, AuthBackend, CartBackend};
use crate::error::{CartError, Result};
use crate::models::{AuthUser, CartItem, NewCartItem, Session};
use argon2::{
  password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
  Algorithm, Argon2, Params, Version,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, error, instrument};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;
const SESSION_TTL_SECS: i64 = 3600;
// Light parameters: these hashes never leave the process.
const ARGON2_MEMORY_KIB: u32 = 4096;
const ARGON2_ITERATIONS: u32 = 2;

struct StoredUser {
  id: Uuid,
  email: String,
  password_hash: String,
}

#[derive(Default)]
struct MemoryState {
  users: HashMap<String, StoredUser>,
  access_tokens: HashMap<String, Uuid>,
  refresh_tokens: HashMap<String, Uuid>,
  rows: Vec<CartItem>,
}

#[derive(Default)]
pub struct InMemoryBackend {
  state: Mutex<MemoryState>,
}

impl InMemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Server-side rows of `user_id`, oldest first.
  pub fn rows_for(&self, user_id: Uuid) -> Vec<CartItem> {
    let state = self.state.lock();
    let mut rows: Vec<CartItem> = state.rows.iter().filter(|r| r.user_id == user_id).cloned().collect();
    rows.sort_by_key(|r| r.created_at);
    rows
  }

  pub fn row_count(&self) -> usize {
    self.state.lock().rows.len()
  }

  fn hasher() -> Result<Argon2<'static>> {
    let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS, 1, None)
      .map_err(|e| CartError::Internal(format!("Invalid Argon2 parameters: {}", e)))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
  }

  fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Self::hasher()?
      .hash_password(password.as_bytes(), &salt)
      .map(|hash| hash.to_string())
      .map_err(|e| {
        error!(error = %e, "Argon2 password hashing failed.");
        CartError::Internal(format!("Password hashing process failed: {}", e))
      })
  }

  fn verify_password(hash: &str, password: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
      .map_err(|e| CartError::Internal(format!("Invalid stored password hash format: {}", e)))?;
    match Self::hasher()?.verify_password(password.as_bytes(), &parsed) {
      Ok(()) => Ok(true),
      Err(argon2::password_hash::Error::Password) => Ok(false),
      Err(e) => Err(CartError::Internal(format!("Password verification process failed: {}", e))),
    }
  }

  fn issue_session(state: &mut MemoryState, user_id: Uuid, email: &str) -> Session {
    let access_token = Uuid::new_v4().to_string();
    let refresh_token = Uuid::new_v4().to_string();
    state.access_tokens.insert(access_token.clone(), user_id);
    state.refresh_tokens.insert(refresh_token.clone(), user_id);
    Session {
      access_token,
      refresh_token,
      expires_at: Some(Utc::now() + Duration::seconds(SESSION_TTL_SECS)),
      user: AuthUser {
        id: user_id,
        email: Some(email.to_string()),
      },
    }
  }

  /// Resolves the caller the way row-level security would: by token, not by the claimed user.
  fn authorize(state: &MemoryState, session: &Session) -> Result<Uuid> {
    match state.access_tokens.get(&session.access_token) {
      Some(user_id) if *user_id == session.user_id() => Ok(*user_id),
      _ => Err(CartError::Api {
        status: 401,
        message: "JWT expired or invalid".to_string(),
      }),
    }
  }

  fn check_quantity(quantity: i32) -> Result<()> {
    if quantity <= 0 {
      return Err(CartError::Api {
        status: 400,
        message: "new row for relation \"cart_items\" violates check constraint \"cart_items_quantity_check\"".to_string(),
      });
    }
    Ok(())
  }
}

#[async_trait]
impl AuthBackend for InMemoryBackend {
  #[instrument(name = "memory::sign_up", skip_all)]
  async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
      return Err(CartError::Auth("Unable to validate email address: invalid format".to_string()));
    }
    if password.len() < MIN_PASSWORD_LEN {
      return Err(CartError::Auth(format!(
        "Password should be at least {} characters.",
        MIN_PASSWORD_LEN
      )));
    }
    if self.state.lock().users.contains_key(&email) {
      return Err(CartError::Auth("User already registered".to_string()));
    }

    let password_hash = Self::hash_password(password)?;
    let mut state = self.state.lock();
    // Re-check under the lock; hashing ran without it.
    if state.users.contains_key(&email) {
      return Err(CartError::Auth("User already registered".to_string()));
    }
    let id = Uuid::new_v4();
    state.users.insert(
      email.clone(),
      StoredUser {
        id,
        email: email.clone(),
        password_hash,
      },
    );
    debug!(user_id = %id, "Account created.");
    Ok(Some(Self::issue_session(&mut state, id, &email)))
  }

  #[instrument(name = "memory::sign_in", skip_all)]
  async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
    let email = email.trim().to_lowercase();
    let (id, stored_email, hash) = {
      let state = self.state.lock();
      match state.users.get(&email) {
        Some(user) => (user.id, user.email.clone(), user.password_hash.clone()),
        None => return Err(CartError::Auth("Invalid login credentials".to_string())),
      }
    };
    if !Self::verify_password(&hash, password)? {
      return Err(CartError::Auth("Invalid login credentials".to_string()));
    }
    let mut state = self.state.lock();
    Ok(Self::issue_session(&mut state, id, &stored_email))
  }

  async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
    let mut state = self.state.lock();
    let user_id = state
      .refresh_tokens
      .remove(refresh_token)
      .ok_or_else(|| CartError::Auth("Invalid Refresh Token: Refresh Token Not Found".to_string()))?;
    let email = state
      .users
      .values()
      .find(|u| u.id == user_id)
      .map(|u| u.email.clone())
      .ok_or_else(|| CartError::Auth("User not found".to_string()))?;
    Ok(Self::issue_session(&mut state, user_id, &email))
  }

  async fn sign_out(&self, session: &Session) -> Result<()> {
    let mut state = self.state.lock();
    state.access_tokens.remove(&session.access_token);
    state.refresh_tokens.remove(&session.refresh_token);
    Ok(())
  }
}

#[async_trait]
impl CartBackend for InMemoryBackend {
  async fn list_cart_items(&self, session: &Session) -> Result<Vec<CartItem>> {
    let user_id = Self::authorize(&self.state.lock(), session)?;
    Ok(self.rows_for(user_id))
  }

  async fn add_to_cart(&self, session: &Session, params: &AddToCartParams) -> Result<Option<CartItem>> {
    let mut state = self.state.lock();
    let user_id = Self::authorize(&state, session)?;

    // One lock acquisition covers lookup and write, like the single upsert statement.
    let existing = state
      .rows
      .iter_mut()
      .find(|r| r.user_id == user_id && r.same_line(&params.product_id, &params.product_size));
    let row = match existing {
      Some(row) => {
        let quantity = row.quantity.checked_add(params.quantity).ok_or_else(|| CartError::Api {
          status: 400,
          message: "integer out of range".to_string(),
        })?;
        Self::check_quantity(quantity)?;
        row.quantity = quantity;
        row.clone()
      }
      None => {
        Self::check_quantity(params.quantity)?;
        let row = CartItem {
          id: Uuid::new_v4(),
          user_id,
          product_id: params.product_id.clone(),
          product_size: params.product_size.clone(),
          quantity: params.quantity,
          product_name: params.product_name.clone(),
          product_brand: params.product_brand.clone(),
          product_image_url: params.product_image_url.clone(),
          price: params.price,
          created_at: Utc::now(),
        };
        state.rows.push(row.clone());
        row
      }
    };
    Ok(Some(row))
  }

  async fn insert_cart_item(&self, session: &Session, item: &NewCartItem) -> Result<CartItem> {
    let mut state = self.state.lock();
    let user_id = Self::authorize(&state, session)?;
    if item.user_id != user_id {
      return Err(CartError::Api {
        status: 403,
        message: "new row violates row-level security policy for table \"cart_items\"".to_string(),
      });
    }
    Self::check_quantity(item.quantity)?;
    if state
      .rows
      .iter()
      .any(|r| r.user_id == user_id && r.same_line(&item.product_id, &item.product_size))
    {
      return Err(CartError::Api {
        status: 409,
        message: "duplicate key value violates unique constraint \"cart_items_line_key\"".to_string(),
      });
    }
    let row = CartItem {
      id: Uuid::new_v4(),
      user_id,
      product_id: item.product_id.clone(),
      product_size: item.product_size.clone(),
      quantity: item.quantity,
      product_name: item.product_name.clone(),
      product_brand: item.product_brand.clone(),
      product_image_url: item.product_image_url.clone(),
      price: item.price,
      created_at: Utc::now(),
    };
    state.rows.push(row.clone());
    Ok(row)
  }

  async fn update_quantity(&self, session: &Session, item_id: Uuid, quantity: i32) -> Result<()> {
    let mut state = self.state.lock();
    let user_id = Self::authorize(&state, session)?;
    Self::check_quantity(quantity)?;
    // Like a filtered UPDATE, a missing row is not an error.
    if let Some(row) = state.rows.iter_mut().find(|r| r.id == item_id && r.user_id == user_id) {
      row.quantity = quantity;
    }
    Ok(())
  }

  async fn delete_cart_item(&self, session: &Session, item_id: Uuid) -> Result<()> {
    let mut state = self.state.lock();
    let user_id = Self::authorize(&state, session)?;
    state.rows.retain(|r| !(r.id == item_id && r.user_id == user_id));
    Ok(())
  }

  async fn delete_user_cart(&self, session: &Session) -> Result<()> {
    let mut state = self.state.lock();
    let user_id = Self::authorize(&state, session)?;
    state.rows.retain(|r| r.user_id != user_id);
    Ok(())
  }
}
