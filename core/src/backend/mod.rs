// parfum/src/backend/mod.rs

//! Backend seams. `RemoteService` talks to one `AuthBackend` and one
//! `CartBackend`; the implementations here cover the hosted Supabase
//! project, a direct Postgres connection and an in-process store.

pub mod memory;
pub mod postgres;
pub mod rest;

use crate::error::Result;
use crate::models::{CartItem, NewCartItem, Perfume, Session};
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

pub use memory::InMemoryBackend;
pub use postgres::PgCartBackend;
pub use rest::SupabaseBackend;

/// SQL for the `add_to_cart` function installed in a Supabase project.
pub const ADD_TO_CART_RPC_SQL: &str = include_str!("../../sql/add_to_cart.sql");

#[async_trait]
pub trait AuthBackend: Send + Sync {
  /// Returns `None` when the account was created but no session was issued
  /// (e.g. email confirmation is pending).
  async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>>;

  async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

  async fn refresh_session(&self, refresh_token: &str) -> Result<Session>;

  async fn sign_out(&self, session: &Session) -> Result<()>;
}

/// Row-level cart operations, always scoped to `session`'s user.
#[async_trait]
pub trait CartBackend: Send + Sync {
  /// All rows of the user, oldest first.
  async fn list_cart_items(&self, session: &Session) -> Result<Vec<CartItem>>;

  /// Atomic insert-or-increment keyed on (user, product, size). Returns the resulting row.
  async fn add_to_cart(&self, session: &Session, params: &AddToCartParams) -> Result<Option<CartItem>>;

  async fn insert_cart_item(&self, session: &Session, item: &NewCartItem) -> Result<CartItem>;

  async fn update_quantity(&self, session: &Session, item_id: Uuid, quantity: i32) -> Result<()>;

  async fn delete_cart_item(&self, session: &Session, item_id: Uuid) -> Result<()>;

  async fn delete_user_cart(&self, session: &Session) -> Result<()>;
}

/// Arguments of the `add_to_cart` RPC. Field names follow the SQL function's parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddToCartParams {
  #[serde(rename = "p_product_id")]
  pub product_id: String,
  #[serde(rename = "p_product_size")]
  pub product_size: String,
  #[serde(rename = "p_quantity")]
  pub quantity: i32,
  #[serde(rename = "p_product_name")]
  pub product_name: String,
  #[serde(rename = "p_product_brand")]
  pub product_brand: String,
  #[serde(rename = "p_product_image_url")]
  pub product_image_url: String,
  #[serde(rename = "p_price")]
  pub price: f64,
}

impl AddToCartParams {
  pub fn for_perfume(perfume: &Perfume, size: &str, quantity: i32) -> Self {
    Self {
      product_id: perfume.id.clone(),
      product_size: size.to_string(),
      quantity,
      product_name: perfume.name.clone(),
      product_brand: perfume.brand.clone(),
      product_image_url: perfume.image_url.clone(),
      price: perfume.price_for(size),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rpc_params_use_function_argument_names() {
    let perfume = Perfume::new("amber-01", "Amber Nights", "Lune")
      .with_image_url("https://cdn.example.com/amber.png")
      .with_price("50ml", 95.0);
    let params = AddToCartParams::for_perfume(&perfume, "50ml", 2);

    let json = serde_json::to_value(&params).unwrap();
    assert_eq!(json["p_product_id"], "amber-01");
    assert_eq!(json["p_product_size"], "50ml");
    assert_eq!(json["p_quantity"], 2);
    assert_eq!(json["p_product_brand"], "Lune");
    assert_eq!(json["p_price"], 95.0);
  }

  #[test]
  fn rpc_sql_upserts_on_the_line_key() {
    assert!(ADD_TO_CART_RPC_SQL.contains("on conflict (user_id, product_id, product_size)"));
    assert!(ADD_TO_CART_RPC_SQL.contains("quantity = cart_items.quantity + p_quantity"));
  }
}
