// parfum/src/lib.rs

//! Parfum: the shopping-cart core of a perfume storefront app.
//!
//! A [`CartManager`] mirrors the signed-in user's cart rows and notifies
//! listeners after every change. It talks to a single shared
//! [`RemoteService`], which wraps:
//!  - authentication (sign-up, sign-in, refresh, sign-out) with user-facing
//!    error messages,
//!  - cart CRUD plus one atomic "add or increment" upsert, delegated to a
//!    backend: hosted Supabase (REST/RPC), Postgres, or in-process.
//!
//! Quantity merging for repeated adds of the same (product, size) line is
//! done by the storage layer in a single conditional write; the client never
//! performs a read-modify-write.

pub mod auth_state;
pub mod backend;
pub mod config;
pub mod error;
pub mod manager;
pub mod models;
pub mod notifier;
pub mod service;

// --- Re-exports for the Public API ---

pub use crate::auth_state::{AuthChangeEvent, AuthEvent, AuthSubscription, SessionStore};
pub use crate::backend::{
  AddToCartParams, AuthBackend, CartBackend, InMemoryBackend, PgCartBackend, SupabaseBackend, ADD_TO_CART_RPC_SQL,
};
pub use crate::config::BackendConfig;
pub use crate::error::{AuthFailure, CartError, Result, GENERIC_AUTH_MESSAGE};
pub use crate::manager::{CartManager, CartState};
pub use crate::models::{AuthUser, CartItem, NewCartItem, Perfume, Session};
pub use crate::notifier::{ListenerId, Notifier};
pub use crate::service::RemoteService;
