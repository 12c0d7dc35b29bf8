// demos/cart_cli/src/main.rs

//! `parfum-cart`: drives the cart core from a terminal.
//!
//! Against the hosted backend every run signs in with `--email`/`--password`
//! (or `PARFUM_EMAIL`/`PARFUM_PASSWORD`) and reads `SUPABASE_URL` and
//! `SUPABASE_ANON_KEY` from the environment or a `.env` file. `--offline`
//! uses the in-process backend instead, which starts empty on every run.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use commands::{AddArgs, Connection};

#[derive(Parser)]
#[command(name = "parfum-cart", version, about = "Perfume shopping cart client")]
struct Cli {
  /// Use the in-process backend instead of the hosted one.
  #[arg(long, global = true)]
  offline: bool,

  #[arg(long, global = true, env = "PARFUM_EMAIL")]
  email: Option<String>,

  #[arg(long, global = true, env = "PARFUM_PASSWORD", hide_env_values = true)]
  password: Option<String>,

  /// Emit logs as JSON lines.
  #[arg(long, global = true)]
  json_logs: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Create an account.
  Signup,
  /// Show the cart.
  List,
  /// Add a product line, merging with an existing one.
  Add(AddArgs),
  /// Set the quantity of a line; zero or less removes it.
  SetQty {
    item_id: uuid::Uuid,
    #[arg(allow_negative_numbers = true)]
    quantity: i32,
  },
  /// Remove a line.
  Remove { item_id: uuid::Uuid },
  /// Remove every line.
  Clear,
  /// Run a scripted session (best with --offline).
  Demo,
}

fn init_tracing(json: bool) {
  let filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .from_env_lossy(); // Allow RUST_LOG override
  let builder = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_span_events(FmtSpan::CLOSE); // Log when spans close, showing duration
  if json {
    builder.json().init();
  } else {
    builder.init();
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();
  init_tracing(cli.json_logs);

  let connection = Connection::open(cli.offline)?;
  let credentials = cli.email.zip(cli.password);

  match cli.command {
    Commands::Signup => connection.sign_up(credentials).await,
    Commands::List => connection.list(credentials).await,
    Commands::Add(args) => connection.add(credentials, args).await,
    Commands::SetQty { item_id, quantity } => connection.set_quantity(credentials, item_id, quantity).await,
    Commands::Remove { item_id } => connection.remove(credentials, item_id).await,
    Commands::Clear => connection.clear(credentials).await,
    Commands::Demo => connection.demo(credentials).await,
  }
}
