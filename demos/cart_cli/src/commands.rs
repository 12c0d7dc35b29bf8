// demos/cart_cli/src/commands.rs

use anyhow::{anyhow, Context};
use clap::Args;
use parfum::{BackendConfig, CartManager, InMemoryBackend, Perfume, RemoteService};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const DEMO_EMAIL: &str = "demo@parfum.local";
const DEMO_PASSWORD: &str = "demo-password";

#[derive(Args)]
pub struct AddArgs {
  #[arg(long)]
  pub product_id: String,
  #[arg(long)]
  pub name: String,
  #[arg(long)]
  pub brand: String,
  #[arg(long)]
  pub size: String,
  /// Unit price for `size`.
  #[arg(long)]
  pub price: f64,
  #[arg(long, default_value = "")]
  pub image_url: String,
  #[arg(long, default_value_t = 1)]
  pub quantity: i32,
}

impl AddArgs {
  fn perfume(&self) -> Perfume {
    Perfume::new(&self.product_id, &self.name, &self.brand)
      .with_image_url(&self.image_url)
      .with_price(&self.size, self.price)
  }
}

type Credentials = Option<(String, String)>;

pub struct Connection {
  service: Arc<RemoteService>,
  cart: CartManager,
  offline: bool,
}

impl Connection {
  pub fn open(offline: bool) -> anyhow::Result<Self> {
    let service = if offline {
      RemoteService::shared(|| RemoteService::with_backend(Arc::new(InMemoryBackend::new())))
    } else {
      RemoteService::try_shared(|| RemoteService::from_config(BackendConfig::from_env()?))
        .context("Failed to set up the hosted backend")?
    };
    let cart = CartManager::new(service.clone());
    cart.set_on_auth_required(|| println!("Please sign in to add items to your cart."));
    Ok(Self { service, cart, offline })
  }

  /// Signs in and loads the cart. The in-process backend starts empty, so offline runs register first.
  async fn sign_in(&self, credentials: Credentials) -> anyhow::Result<()> {
    let (email, password) = match credentials {
      Some(pair) => pair,
      None if self.offline => (DEMO_EMAIL.to_string(), DEMO_PASSWORD.to_string()),
      None => return Err(anyhow!("--email and --password (or PARFUM_EMAIL / PARFUM_PASSWORD) are required")),
    };
    if self.offline {
      self.service.sign_up(&email, &password).await?;
    } else {
      self.service.sign_in(&email, &password).await?;
    }
    info!(email = %email, "Signed in.");
    self
      .cart
      .handle_session_change(self.service.current_session().as_ref())
      .await;
    Ok(())
  }

  pub async fn sign_up(&self, credentials: Credentials) -> anyhow::Result<()> {
    let (email, password) = credentials.ok_or_else(|| anyhow!("--email and --password are required to sign up"))?;
    self.service.sign_up(&email, &password).await?;
    if self.service.current_session().is_some() {
      println!("Account created for {}; you are signed in.", email);
    } else {
      println!("Account created for {}; confirm your email before signing in.", email);
    }
    Ok(())
  }

  pub async fn list(&self, credentials: Credentials) -> anyhow::Result<()> {
    self.sign_in(credentials).await?;
    print_cart(&self.cart);
    Ok(())
  }

  pub async fn add(&self, credentials: Credentials, args: AddArgs) -> anyhow::Result<()> {
    self.sign_in(credentials).await?;
    self.cart.add_to_cart(&args.perfume(), &args.size, args.quantity).await;
    print_cart(&self.cart);
    Ok(())
  }

  pub async fn set_quantity(&self, credentials: Credentials, item_id: Uuid, quantity: i32) -> anyhow::Result<()> {
    self.sign_in(credentials).await?;
    if self.cart.find_item(item_id).is_none() {
      return Err(anyhow!("No cart line with id {}", item_id));
    }
    self.cart.update_quantity(item_id, quantity).await;
    print_cart(&self.cart);
    Ok(())
  }

  pub async fn remove(&self, credentials: Credentials, item_id: Uuid) -> anyhow::Result<()> {
    self.sign_in(credentials).await?;
    self.cart.remove_from_cart(item_id).await;
    print_cart(&self.cart);
    Ok(())
  }

  pub async fn clear(&self, credentials: Credentials) -> anyhow::Result<()> {
    self.sign_in(credentials).await?;
    self.cart.clear_cart().await;
    print_cart(&self.cart);
    Ok(())
  }

  /// Walks through the cart lifecycle against the configured backend.
  pub async fn demo(&self, credentials: Credentials) -> anyhow::Result<()> {
    let notifications = Arc::new(AtomicUsize::new(0));
    let counter = notifications.clone();
    self.cart.add_listener(move || {
      counter.fetch_add(1, Ordering::Relaxed);
    });

    let oud = Perfume::new("oud-royal", "Oud Royal", "Maison Noor")
      .with_price("50ml", 120.0)
      .with_price("100ml", 180.0);
    let neroli = Perfume::new("neroli-22", "Neroli 22", "Atelier Sud").with_price("30ml", 55.5);

    println!("== Adding before signing in");
    self.cart.add_to_cart(&oud, "50ml", 1).await;

    self.sign_in(credentials).await?;
    println!("== Adding Oud Royal 50ml twice (2 + 3)");
    self.cart.add_to_cart(&oud, "50ml", 2).await;
    self.cart.add_to_cart(&oud, "50ml", 3).await;
    self.cart.add_to_cart(&neroli, "30ml", 1).await;
    print_cart(&self.cart);

    if let Some(line) = self.cart.items().into_iter().find(|i| i.product_id == "neroli-22") {
      println!("== Setting Neroli 22 to 4");
      self.cart.update_quantity(line.id, 4).await;
      print_cart(&self.cart);
      println!("== Setting Neroli 22 to 0");
      self.cart.update_quantity(line.id, 0).await;
      print_cart(&self.cart);
    }

    println!("== Clearing");
    self.cart.clear_cart().await;
    print_cart(&self.cart);

    self.service.sign_out().await?;
    println!("Signed out; {} change notifications delivered.", notifications.load(Ordering::Relaxed));
    Ok(())
  }
}

fn print_cart(cart: &CartManager) {
  let state = cart.snapshot();
  if state.is_loading {
    println!("(cart is still loading)");
  }
  if state.items.is_empty() {
    println!("Your cart is empty.");
    return;
  }
  for item in &state.items {
    println!(
      "{}  {} {} ({})  x{}  @ {:.2}  = {:.2}",
      item.id,
      item.product_brand,
      item.product_name,
      item.product_size,
      item.quantity,
      item.price,
      item.line_total()
    );
  }
  println!("{} items, total {:.2}", cart.total_items(), cart.total_price());
}
