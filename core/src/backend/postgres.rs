// parfum/src/backend/postgres.rs

//! Direct Postgres backend for deployments that own the database.
//! Rows are scoped by the session's user id; authentication stays with
//! whichever `AuthBackend` issued the session.

use crate::backend::{AddToCartParams, CartBackend};
use crate::error::{CartError, Result};
use crate::models::{CartItem, NewCartItem, Session};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, instrument};
use uuid::Uuid;

const UPSERT_SQL: &str = r#"
  INSERT INTO cart_items (user_id, product_id, product_size, quantity, product_name, product_brand, product_image_url, price)
  VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
  ON CONFLICT (user_id, product_id, product_size) DO UPDATE
  SET quantity = cart_items.quantity + EXCLUDED.quantity
  RETURNING *
"#;

const INSERT_SQL: &str = r#"
  INSERT INTO cart_items (user_id, product_id, product_size, quantity, product_name, product_brand, product_image_url, price)
  VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
  RETURNING *
"#;

#[derive(Clone)]
pub struct PgCartBackend {
  pool: PgPool,
}

impl PgCartBackend {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  pub async fn connect(database_url: &str) -> Result<Self> {
    let pool = PgPoolOptions::new().max_connections(5).connect(database_url).await?;
    info!("Successfully connected to the database.");
    Ok(Self::new(pool))
  }

  /// Applies the bundled schema migrations.
  pub async fn migrate(&self) -> Result<()> {
    sqlx::migrate!("./migrations").run(&self.pool).await?;
    Ok(())
  }
}

#[async_trait]
impl CartBackend for PgCartBackend {
  #[instrument(name = "postgres::list_cart_items", skip_all, fields(user_id = %session.user_id()))]
  async fn list_cart_items(&self, session: &Session) -> Result<Vec<CartItem>> {
    let rows = sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE user_id = $1 ORDER BY created_at ASC")
      .bind(session.user_id())
      .fetch_all(&self.pool)
      .await?;
    Ok(rows)
  }

  #[instrument(name = "postgres::add_to_cart", skip_all, fields(user_id = %session.user_id(), product_id = %params.product_id))]
  async fn add_to_cart(&self, session: &Session, params: &AddToCartParams) -> Result<Option<CartItem>> {
    let row = sqlx::query_as::<_, CartItem>(UPSERT_SQL)
      .bind(session.user_id())
      .bind(&params.product_id)
      .bind(&params.product_size)
      .bind(params.quantity)
      .bind(&params.product_name)
      .bind(&params.product_brand)
      .bind(&params.product_image_url)
      .bind(params.price)
      .fetch_optional(&self.pool)
      .await?;
    Ok(row)
  }

  async fn insert_cart_item(&self, session: &Session, item: &NewCartItem) -> Result<CartItem> {
    if item.user_id != session.user_id() {
      return Err(CartError::Api {
        status: 403,
        message: "cart item belongs to another user".to_string(),
      });
    }
    let row = sqlx::query_as::<_, CartItem>(INSERT_SQL)
      .bind(item.user_id)
      .bind(&item.product_id)
      .bind(&item.product_size)
      .bind(item.quantity)
      .bind(&item.product_name)
      .bind(&item.product_brand)
      .bind(&item.product_image_url)
      .bind(item.price)
      .fetch_one(&self.pool)
      .await?;
    Ok(row)
  }

  async fn update_quantity(&self, session: &Session, item_id: Uuid, quantity: i32) -> Result<()> {
    sqlx::query("UPDATE cart_items SET quantity = $1 WHERE id = $2 AND user_id = $3")
      .bind(quantity)
      .bind(item_id)
      .bind(session.user_id())
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn delete_cart_item(&self, session: &Session, item_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
      .bind(item_id)
      .bind(session.user_id())
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn delete_user_cart(&self, session: &Session) -> Result<()> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
      .bind(session.user_id())
      .execute(&self.pool)
      .await?;
    tracing::debug!(rows = result.rows_affected(), "Cleared cart rows.");
    Ok(())
  }
}
