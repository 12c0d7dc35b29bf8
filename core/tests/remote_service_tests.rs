// tests/remote_service_tests.rs
mod common;

use common::*;
use chrono::{Duration, Utc};
use parfum::{AuthChangeEvent, AuthFailure, NewCartItem, RemoteService, GENERIC_AUTH_MESSAGE};
use serial_test::serial;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::test]
async fn test_auth_errors_reach_the_caller_as_messages() {
  setup_tracing();
  let (service, _backend) = signed_in_service().await;
  service.sign_out().await.unwrap();

  let err = service.sign_in(SHOPPER_EMAIL, "wrong-password").await.unwrap_err();
  assert_eq!(err, AuthFailure::new("Invalid login credentials"));

  let err = service.sign_up(SHOPPER_EMAIL, SHOPPER_PASSWORD).await.unwrap_err();
  assert_eq!(err.message, "User already registered");

  let err = service.sign_up("new@example.com", "123").await.unwrap_err();
  assert!(err.message.contains("at least 6 characters"));

  assert!(service.current_user().is_none());
}

#[tokio::test]
async fn test_sign_in_and_out_drive_the_session_store() {
  setup_tracing();
  let (service, _backend) = signed_in_service().await;
  let mut events = service.subscribe();
  let initial = events.next().await.unwrap();
  assert_eq!(initial.kind, AuthChangeEvent::InitialSession);
  assert!(initial.session.is_some());

  service.sign_out().await.unwrap();
  assert_eq!(events.next().await.unwrap().kind, AuthChangeEvent::SignedOut);
  assert!(service.current_session().is_none());

  service.sign_in(SHOPPER_EMAIL, SHOPPER_PASSWORD).await.unwrap();
  let signed_in = events.next().await.unwrap();
  assert_eq!(signed_in.kind, AuthChangeEvent::SignedIn);
  assert_eq!(
    service.current_user().unwrap().email.as_deref(),
    Some(SHOPPER_EMAIL)
  );
}

#[tokio::test]
async fn test_failed_remote_sign_out_still_clears_local_session() {
  setup_tracing();
  let (service, backend) = signed_in_service().await;
  set(&backend.fail.sign_out, true);

  let err = service.sign_out().await.unwrap_err();
  assert_eq!(err.message, GENERIC_AUTH_MESSAGE);
  assert!(service.current_session().is_none());

  // Signing out twice is harmless.
  service.sign_out().await.unwrap();
}

#[tokio::test]
async fn test_refresh_requires_a_session() {
  setup_tracing();
  let backend = RecordingBackend::new();
  let service = service_with(&backend);
  let err = service.refresh_session().await.unwrap_err();
  assert_eq!(err.message, "Auth session missing!");
}

#[tokio::test]
async fn test_refresh_replaces_tokens_for_the_same_user() {
  setup_tracing();
  let (service, _backend) = signed_in_service().await;
  let before = service.current_session().unwrap();
  service.refresh_session().await.unwrap();
  let after = service.current_session().unwrap();

  assert_eq!(before.user_id(), after.user_id());
  assert_ne!(before.access_token, after.access_token);
}

#[tokio::test]
async fn test_expired_session_is_refreshed_before_cart_calls() {
  setup_tracing();
  let (service, backend) = signed_in_service().await;
  service.upsert_cart_item(&oud(), "50ml", 1).await.unwrap();

  let mut expired = service.current_session().unwrap();
  expired.expires_at = Some(Utc::now() - Duration::seconds(5));
  service.sessions().set_session(expired.clone(), AuthChangeEvent::TokenRefreshed);
  let mut events = service.subscribe();
  events.next().await.unwrap();

  assert_eq!(service.get_cart_items().await.len(), 1);

  let current = service.current_session().unwrap();
  assert_ne!(current.access_token, expired.access_token);
  assert!(!current.is_expired(Utc::now()));
  assert_eq!(events.next().await.unwrap().kind, AuthChangeEvent::TokenRefreshed);
  assert_eq!(backend.list_calls(), 1);
}

#[tokio::test]
async fn test_failed_refresh_skips_the_cart_call() {
  setup_tracing();
  let (service, backend) = signed_in_service().await;
  let mut expired = service.current_session().unwrap();
  expired.expires_at = Some(Utc::now() - Duration::seconds(5));
  expired.refresh_token = "revoked".to_string();
  service.sessions().set_session(expired, AuthChangeEvent::TokenRefreshed);
  backend.reset_counts();

  assert!(service.try_get_cart_items().await.is_none());
  assert!(service.upsert_cart_item(&oud(), "50ml", 1).await.is_none());
  service.clear_cart().await;
  assert_eq!(backend.cart_calls(), 0);
}

#[tokio::test]
async fn test_cart_calls_short_circuit_without_session() {
  setup_tracing();
  let backend = RecordingBackend::new();
  let service = service_with(&backend);

  assert!(service.get_cart_items().await.is_empty());
  assert!(service.upsert_cart_item(&oud(), "50ml", 1).await.is_none());
  service.update_cart_item_quantity(uuid::Uuid::new_v4(), 2).await;
  service.remove_cart_item(uuid::Uuid::new_v4()).await;
  service.clear_cart().await;

  assert_eq!(backend.cart_calls(), 0);
}

#[tokio::test]
async fn test_backend_failures_become_benign_results() {
  setup_tracing();
  let (service, backend) = signed_in_service().await;
  service.upsert_cart_item(&oud(), "50ml", 1).await.unwrap();

  set(&backend.fail.list, true);
  set(&backend.fail.upsert, true);
  set(&backend.fail.clear, true);

  assert!(service.get_cart_items().await.is_empty());
  assert!(service.try_get_cart_items().await.is_none());
  assert!(service.upsert_cart_item(&oud(), "50ml", 1).await.is_none());
  service.clear_cart().await;

  set(&backend.fail.list, false);
  assert_eq!(service.get_cart_items().await.len(), 1);
}

#[tokio::test]
async fn test_unknown_size_is_added_at_zero_price() {
  setup_tracing();
  let (service, _backend) = signed_in_service().await;
  let row = service.upsert_cart_item(&oud(), "5ml", 1).await.unwrap();
  assert_eq!(row.product_size, "5ml");
  assert_eq!(row.price, 0.0);
}

#[tokio::test]
async fn test_direct_insert_returns_the_created_row() {
  setup_tracing();
  let (service, backend) = signed_in_service().await;
  let user_id = service.current_user().unwrap().id;
  let item = NewCartItem {
    user_id,
    product_id: "neroli-22".to_string(),
    product_size: "30ml".to_string(),
    quantity: 2,
    product_name: "Neroli 22".to_string(),
    product_brand: "Atelier Sud".to_string(),
    product_image_url: String::new(),
    price: 55.5,
  };

  let row = service.add_cart_item(&item).await.unwrap();
  assert_eq!(row.quantity, 2);
  assert_eq!(row.user_id, user_id);

  // A second plain insert of the same line conflicts and is swallowed.
  assert!(service.add_cart_item(&item).await.is_none());
  assert_eq!(backend.calls.insert.load(Ordering::SeqCst), 2);
}

#[test]
#[serial]
fn test_shared_instance_first_construction_wins() {
  setup_tracing();
  let first_backend = RecordingBackend::new();
  let first = RemoteService::shared(|| RemoteService::with_backend(first_backend.clone()));

  let second = RemoteService::shared(|| panic!("the shared service must only be built once"));
  assert!(Arc::ptr_eq(&first, &second));

  let fallible = RemoteService::try_shared(|| panic!("the shared service must only be built once")).unwrap();
  assert!(Arc::ptr_eq(&first, &fallible));
  assert!(Arc::ptr_eq(&first, &RemoteService::get_shared().unwrap()));
}
