//! Terminal client for the ordering backend: poke at the menu, orders, and
//! the payment-confirmation flow without a browser.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tableside::services::confirmation::PaymentCallback;
use tableside::services::{AuthSession, CartStore, ConfirmationService};
use tableside::storage::{FileStorage, InMemoryStorage, StorageBackend};
use tableside::{config, ApiClient};
use url::Url;

#[derive(Parser)]
#[command(name = "tableside-cli", about = "Restaurant ordering client")]
struct Cli {
    /// Print raw JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the online menu
    Menu,
    /// Show restaurant info
    Settings,
    /// Fetch an order by id (authenticated)
    Order(OrderArgs),
    /// Fetch a public receipt by order id + gateway reference
    Receipt(ReceiptArgs),
    /// List the signed-in customer's order history
    Orders,
    /// Request a login OTP for a phone number
    Login(LoginArgs),
    /// Verify an OTP and store the session token
    Verify(VerifyArgs),
    /// Check delivery-zone coverage for coordinates
    Zone(ZoneArgs),
    /// Reconcile a payment-gateway callback URL
    Confirm(ConfirmArgs),
}

#[derive(Args)]
struct OrderArgs {
    #[arg(long)]
    id: String,
}

#[derive(Args)]
struct ReceiptArgs {
    #[arg(long)]
    order_id: String,
    #[arg(long)]
    ref_id: String,
}

#[derive(Args)]
struct LoginArgs {
    #[arg(long)]
    phone: String,
}

#[derive(Args)]
struct VerifyArgs {
    #[arg(long)]
    phone: String,
    #[arg(long)]
    otp: String,
    #[arg(long)]
    name: Option<String>,
}

#[derive(Args)]
struct ZoneArgs {
    #[arg(long)]
    lat: f64,
    #[arg(long)]
    lng: f64,
}

#[derive(Args)]
struct ConfirmArgs {
    /// Full callback URL, exactly as the gateway redirected to it
    #[arg(long)]
    url: String,
}

struct CliContext {
    client: Arc<ApiClient>,
    storage: Arc<dyn StorageBackend>,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let cfg = config::load_config().context("failed to load configuration")?;
        config::init_tracing(&cfg.log_level, cfg.log_json);

        let storage: Arc<dyn StorageBackend> = match cfg.storage.backend.as_str() {
            "file" => {
                let path = cfg
                    .storage
                    .path
                    .clone()
                    .unwrap_or_else(|| "tableside-state.json".into());
                Arc::new(FileStorage::open(path).context("failed to open state file")?)
            }
            _ => Arc::new(InMemoryStorage::new()),
        };

        let client = Arc::new(
            ApiClient::new(Arc::new(cfg), storage.clone())
                .await
                .context("failed to build API client")?,
        );
        Ok(Self { client, storage })
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::Menu => {
            let items = context.client.menu().await?;
            if cli.json {
                print_json(&items)?;
            } else {
                for item in items {
                    let marker = if item.available { " " } else { "✗" };
                    println!("{} {:<12} {:<30} {}", marker, item.category, item.name, item.price);
                }
            }
        }
        Commands::Settings => {
            let info = context.client.settings_info().await?;
            if cli.json {
                print_json(&info)?;
            } else {
                println!("{}", info.name);
                if let Some(address) = &info.address {
                    println!("{}", address);
                }
                if let Some(hours) = &info.opening_hours {
                    println!("{}", hours);
                }
            }
        }
        Commands::Order(args) => {
            let order = context.client.order_by_id(&args.id).await?;
            if cli.json {
                print_json(&order)?;
            } else {
                print_order(&order);
            }
        }
        Commands::Receipt(args) => {
            let order = context
                .client
                .public_receipt(&args.order_id, &args.ref_id)
                .await?;
            if cli.json {
                print_json(&order)?;
            } else {
                print_order(&order);
            }
        }
        Commands::Orders => {
            let orders = context.client.my_orders().await?;
            if cli.json {
                print_json(&orders)?;
            } else {
                for order in orders {
                    println!(
                        "#{:<10} {:<10} {}",
                        order.display_number(),
                        order.status.map(|s| s.label()).unwrap_or(""),
                        order.total
                    );
                }
            }
        }
        Commands::Login(args) => {
            context.client.request_otp(&args.phone).await?;
            println!("OTP sent to {}", args.phone);
        }
        Commands::Verify(args) => {
            let mut session = AuthSession::new(context.client.clone());
            session
                .login(&args.phone, &args.otp, args.name.as_deref())
                .await?;
            let user = session.current_user().context("login returned no user")?;
            println!("Signed in as {} ({})", user.name.as_deref().unwrap_or("-"), user.phone);
        }
        Commands::Zone(args) => {
            let check = context.client.validate_zone(args.lat, args.lng).await;
            if cli.json {
                print_json(&serde_json::json!({
                    "allowed": check.allowed,
                    "zone": check.zone,
                    "reason": check.reason,
                }))?;
            } else if check.allowed {
                println!("Deliverable{}", check.zone.map(|z| format!(" ({})", z)).unwrap_or_default());
            } else {
                println!("Blocked: {}", check.reason.as_deref().unwrap_or("-"));
            }
        }
        Commands::Confirm(args) => {
            let url = Url::parse(&args.url).context("invalid callback URL")?;
            let callback = PaymentCallback::from_url(&url);
            let mut cart = CartStore::load(context.storage.clone()).await;
            let confirmation =
                ConfirmationService::new(context.client.clone(), context.storage.clone());

            let resolution = confirmation.reconcile(&callback, &mut cart).await;
            println!("Payment outcome: {:?}", resolution.outcome);
            match resolution.order {
                Some(order) => print_order(&order),
                None => println!("Order not found yet; try again shortly."),
            }
        }
    }

    Ok(())
}

fn print_order(order: &tableside::models::OrderRecord) {
    println!("Order #{}", order.display_number());
    if let Some(order_type) = order.order_type {
        println!("{}", order_type.label());
    }
    if let Some(status) = order.status {
        println!("{}", status.label());
    }
    for item in &order.items {
        println!(
            "  {}x {:<30} {}",
            item.quantity,
            item.name,
            item.price_at_time_of_order * rust_decimal::Decimal::from(item.quantity)
        );
    }
    println!("Total: {}", order.total);
}
