// parfum/src/models/cart_item.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One `cart_items` row. `(user_id, product_id, product_size)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct CartItem {
  pub id: Uuid,
  pub user_id: Uuid,
  pub product_id: String,
  pub product_size: String,
  pub quantity: i32,
  // Display fields are copied from the catalog when the row is created.
  pub product_name: String,
  pub product_brand: String,
  pub product_image_url: String,
  pub price: f64,
  pub created_at: DateTime<Utc>,
}

impl CartItem {
  /// True when this row is the line for `product_id` in `size`.
  pub fn same_line(&self, product_id: &str, size: &str) -> bool {
    self.product_id == product_id && self.product_size == size
  }

  pub fn line_total(&self) -> f64 {
    self.price * f64::from(self.quantity)
  }
}

/// Insert payload for the direct-insert path. The backend assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCartItem {
  pub user_id: Uuid,
  pub product_id: String,
  pub product_size: String,
  pub quantity: i32,
  pub product_name: String,
  pub product_brand: String,
  pub product_image_url: String,
  pub price: f64,
}
