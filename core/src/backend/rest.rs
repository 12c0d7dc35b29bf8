// parfum/src/backend/rest.rs

//! Supabase backend: PostgREST for the `cart_items` table and the
//! `add_to_cart` RPC, GoTrue for authentication.

use crate::backend::{AddToCartParams, AuthBackend, CartBackend};
use crate::config::BackendConfig;
use crate::error::{CartError, Result};
use crate::models::{AuthUser, CartItem, NewCartItem, Session};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

const CART_TABLE: &str = "cart_items";
const ADD_TO_CART_RPC: &str = "rpc/add_to_cart";

pub struct SupabaseBackend {
  client: Client,
  config: BackendConfig,
}

impl SupabaseBackend {
  pub fn new(config: BackendConfig) -> Result<Self> {
    let client = Client::builder().timeout(config.http_timeout).build()?;
    Ok(Self { client, config })
  }

  /// Reuses an already configured client, e.g. one shared with other services.
  pub fn with_client(client: Client, config: BackendConfig) -> Self {
    Self { client, config }
  }

  pub fn config(&self) -> &BackendConfig {
    &self.config
  }

  /// Attaches the project key and the bearer token (the anon key when signed out).
  fn with_auth_headers(&self, builder: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
    builder
      .header("apikey", &self.config.anon_key)
      .bearer_auth(access_token.unwrap_or(&self.config.anon_key))
  }

  fn table(&self, session: &Session, method: reqwest::Method) -> RequestBuilder {
    let builder = self.client.request(method, self.config.rest_url(CART_TABLE));
    self.with_auth_headers(builder, Some(&session.access_token))
  }

  fn list_request(&self, session: &Session) -> RequestBuilder {
    self.table(session, reqwest::Method::GET).query(&[
      ("select", "*".to_string()),
      ("user_id", eq(session.user_id())),
      ("order", "created_at.asc".to_string()),
    ])
  }

  fn add_to_cart_request(&self, session: &Session, params: &AddToCartParams) -> RequestBuilder {
    let builder = self.client.post(self.config.rest_url(ADD_TO_CART_RPC));
    self.with_auth_headers(builder, Some(&session.access_token)).json(params)
  }

  fn insert_request(&self, session: &Session, item: &NewCartItem) -> RequestBuilder {
    self
      .table(session, reqwest::Method::POST)
      .header("Prefer", "return=representation")
      .json(item)
  }

  fn update_quantity_request(&self, session: &Session, item_id: Uuid, quantity: i32) -> RequestBuilder {
    self
      .table(session, reqwest::Method::PATCH)
      .query(&[("id", eq(item_id))])
      .json(&json!({ "quantity": quantity }))
  }

  fn delete_item_request(&self, session: &Session, item_id: Uuid) -> RequestBuilder {
    self.table(session, reqwest::Method::DELETE).query(&[("id", eq(item_id))])
  }

  fn delete_user_cart_request(&self, session: &Session) -> RequestBuilder {
    self
      .table(session, reqwest::Method::DELETE)
      .query(&[("user_id", eq(session.user_id()))])
  }

  fn token_request(&self, grant_type: &str, body: Value) -> RequestBuilder {
    let builder = self
      .client
      .post(self.config.auth_url("token"))
      .query(&[("grant_type", grant_type)]);
    self.with_auth_headers(builder, None).json(&body)
  }
}

/// PostgREST equality filter value.
fn eq(value: impl std::fmt::Display) -> String {
  format!("eq.{}", value)
}

async fn send(builder: RequestBuilder) -> Result<Response> {
  let response = builder.send().await?;
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().await.unwrap_or_default();
  Err(api_error(status, &body))
}

async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
  let response = send(builder).await?;
  let body = response.bytes().await?;
  Ok(serde_json::from_slice(&body)?)
}

async fn send_auth(builder: RequestBuilder) -> Result<Value> {
  send_json::<Value>(builder).await.map_err(auth_error)
}

/// Error for a non-2xx response, preferring the message in the body over the status reason.
pub(crate) fn api_error(status: StatusCode, body: &str) -> CartError {
  let message = error_message(body).unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
  CartError::Api {
    status: status.as_u16(),
    message,
  }
}

/// Auth endpoints report rejected credentials with 4xx; those messages are meant for the user.
pub(crate) fn auth_error(err: CartError) -> CartError {
  match err {
    CartError::Api { status, message } if (400..500).contains(&status) => CartError::Auth(message),
    other => other,
  }
}

/// First row of a `setof cart_items` or `return=representation` body. An empty array is `None`.
pub(crate) fn first_row(body: &[u8]) -> Result<Option<CartItem>> {
  let rows: Vec<CartItem> = serde_json::from_slice(body)?;
  Ok(rows.into_iter().next())
}

/// Extracts a readable message from a GoTrue or PostgREST error body.
pub(crate) fn error_message(body: &str) -> Option<String> {
  let value: Value = serde_json::from_str(body).ok()?;
  ["error_description", "msg", "message", "error"]
    .iter()
    .find_map(|key| value.get(*key).and_then(Value::as_str))
    .filter(|message| !message.is_empty())
    .map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token: String,
  refresh_token: String,
  #[serde(default)]
  expires_in: Option<i64>,
  #[serde(default)]
  expires_at: Option<i64>,
  user: AuthUser,
}

pub(crate) fn session_from_token_response(value: Value, now: DateTime<Utc>) -> Result<Session> {
  let token: TokenResponse = serde_json::from_value(value)?;
  let expires_at = match (token.expires_at, token.expires_in) {
    (Some(at), _) => DateTime::<Utc>::from_timestamp(at, 0),
    (None, Some(seconds)) => Some(now + ChronoDuration::seconds(seconds)),
    (None, None) => None,
  };
  Ok(Session {
    access_token: token.access_token,
    refresh_token: token.refresh_token,
    expires_at,
    user: token.user,
  })
}

#[async_trait]
impl AuthBackend for SupabaseBackend {
  #[instrument(name = "supabase::sign_up", skip_all)]
  async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
    let builder = self.client.post(self.config.auth_url("signup"));
    let builder = self
      .with_auth_headers(builder, None)
      .json(&json!({ "email": email, "password": password }));
    let body = send_auth(builder).await?;

    // With email confirmation enabled the response is the bare user, without tokens.
    if body.get("access_token").is_some() {
      Ok(Some(session_from_token_response(body, Utc::now())?))
    } else {
      debug!("Sign-up accepted without a session; confirmation pending.");
      Ok(None)
    }
  }

  #[instrument(name = "supabase::sign_in", skip_all)]
  async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
    let body = send_auth(self.token_request("password", json!({ "email": email, "password": password }))).await?;
    session_from_token_response(body, Utc::now())
  }

  #[instrument(name = "supabase::refresh_session", skip_all)]
  async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
    let body = send_auth(self.token_request("refresh_token", json!({ "refresh_token": refresh_token }))).await?;
    session_from_token_response(body, Utc::now())
  }

  #[instrument(name = "supabase::sign_out", skip_all, fields(user_id = %session.user_id()))]
  async fn sign_out(&self, session: &Session) -> Result<()> {
    let builder = self.client.post(self.config.auth_url("logout"));
    send(self.with_auth_headers(builder, Some(&session.access_token))).await?;
    Ok(())
  }
}

#[async_trait]
impl CartBackend for SupabaseBackend {
  async fn list_cart_items(&self, session: &Session) -> Result<Vec<CartItem>> {
    send_json(self.list_request(session)).await
  }

  async fn add_to_cart(&self, session: &Session, params: &AddToCartParams) -> Result<Option<CartItem>> {
    // The function returns `setof cart_items`.
    let response = send(self.add_to_cart_request(session, params)).await?;
    first_row(&response.bytes().await?)
  }

  async fn insert_cart_item(&self, session: &Session, item: &NewCartItem) -> Result<CartItem> {
    let response = send(self.insert_request(session, item)).await?;
    first_row(&response.bytes().await?)?.ok_or_else(|| CartError::Decode("insert returned no row".to_string()))
  }

  async fn update_quantity(&self, session: &Session, item_id: Uuid, quantity: i32) -> Result<()> {
    send(self.update_quantity_request(session, item_id, quantity)).await?;
    Ok(())
  }

  async fn delete_cart_item(&self, session: &Session, item_id: Uuid) -> Result<()> {
    send(self.delete_item_request(session, item_id)).await?;
    Ok(())
  }

  async fn delete_user_cart(&self, session: &Session) -> Result<()> {
    send(self.delete_user_cart_request(session)).await?;
    Ok(())
  }
}
