//! # Seed Data Generator
//!
//! Populates a database with clients, products and orders for development.
//!
//! ## Usage
//! ```bash
//! # Default sizes into ./orderdesk_dev.db
//! cargo run -p orderdesk-db --bin seed
//!
//! # Custom sizes
//! cargo run -p orderdesk-db --bin seed -- --clients 50 --orders 400
//!
//! # Specify database path
//! cargo run -p orderdesk-db --bin seed -- --db ./data/orderdesk.db
//! ```
//!
//! Everything goes through the unit of work in three commits (catalogue,
//! orders, order lines), since order lines need the identities assigned to
//! orders. Set `RUST_LOG` to change log verbosity.

use chrono::{Duration, TimeZone, Utc};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use orderdesk_core::{Client, EntityId, Money, Order, OrderDetail, Product};
use orderdesk_db::pool::ENV_DB_PATH;
use orderdesk_db::{Database, DbConfig, PendingKey, Session, UnitOfWork};

/// Catalogue: name, description, price in cents.
const PRODUCTS: &[(&str, Option<&str>, i64)] = &[
    ("Ballpoint Pen", Some("Blue ink, medium point"), 150),
    ("Gel Pen", Some("Black ink"), 275),
    ("Pencil HB", None, 80),
    ("A5 Notebook", Some("Ruled, 96 pages"), 650),
    ("A4 Notebook", Some("Squared, 120 pages"), 900),
    ("Sticky Notes", None, 350),
    ("Stapler", Some("Metal, 20 sheets"), 1_450),
    ("Desk Lamp", Some("LED, dimmable"), 5_900),
    ("Office Chair", Some("Mesh back"), 18_900),
    ("Monitor Stand", Some(""), 4_200),
    ("USB-C Cable", None, 1_100),
    ("Wireless Mouse", Some("2.4 GHz"), 2_950),
    ("Keyboard", Some("Mechanical, brown switches"), 8_900),
    ("27in Monitor", Some("1440p IPS"), 32_900),
    ("Paper Ream", Some("500 sheets, 80 g/m2"), 720),
];

const FIRST_NAMES: &[&str] = &[
    "Ana", "Bruno", "Carla", "Diego", "Elena", "Felipe", "Gabriela", "Hugo", "Irene", "Joao",
];

const LAST_NAMES: &[&str] = &["Lima", "Souza", "Costa", "Pereira", "Alves", "Rocha"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut clients: usize = 20;
    let mut orders: usize = 100;
    let mut db_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" => {
                if i + 1 < args.len() {
                    clients = args[i + 1].parse().unwrap_or(clients);
                    i += 1;
                }
            }
            "--orders" | "-o" => {
                if i + 1 < args.len() {
                    orders = args[i + 1].parse().unwrap_or(orders);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("OrderDesk Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("      --clients <N>  Number of clients to generate (default: 20)");
                println!("  -o, --orders <N>   Number of orders to generate (default: 100)");
                println!("  -d, --db <PATH>    Database file path (default: ORDERDESK_DB_PATH or ./orderdesk_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let config = match db_path {
        Some(path) => DbConfig::new(path),
        None if env::var(ENV_DB_PATH).is_ok() => DbConfig::from_env(),
        None => DbConfig::new("./orderdesk_dev.db"),
    };
    let db = Database::new(config).await?;

    let mut uow = db.unit_of_work();

    let existing = uow.clients()?.count().await?;
    if existing > 0 {
        warn!(clients = existing, "Database already seeded, skipping");
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Catalogue
    let mut client_keys = Vec::with_capacity(clients);
    {
        let mut repo = uow.clients()?;
        for n in 0..clients {
            client_keys.push(repo.add(generate_client(n))?);
        }
    }
    let mut product_keys = Vec::with_capacity(PRODUCTS.len());
    {
        let mut repo = uow.products()?;
        for (name, description, cents) in PRODUCTS {
            product_keys.push(repo.add(Product::new(
                *name,
                (*description).map(str::to_string),
                Money::from_cents(*cents),
            ))?);
        }
    }
    uow.save_changes().await?;

    let client_ids = resolve(&uow, &client_keys);
    let product_ids = resolve(&uow, &product_keys);
    info!(
        clients = client_ids.len(),
        products = product_ids.len(),
        "Catalogue seeded"
    );

    if client_ids.is_empty() {
        info!("No clients, skipping orders");
        return Ok(());
    }

    // Orders
    let first_day = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).single().unwrap_or_else(Utc::now);
    let mut order_keys = Vec::with_capacity(orders);
    {
        let mut repo = uow.orders()?;
        for n in 0..orders {
            let client_id = client_ids[(n * 7) % client_ids.len()];
            let placed = first_day + Duration::hours((n * 13) as i64);
            order_keys.push(repo.add(Order::new(client_id, placed))?);
        }
    }
    uow.save_changes().await?;
    let order_ids = resolve(&uow, &order_keys);

    // Order lines
    let mut lines = 0usize;
    {
        let mut repo = uow.order_details()?;
        for (n, order_id) in order_ids.iter().enumerate() {
            for line in 0..(1 + n % 4) {
                let product_id = product_ids[(n * 5 + line * 3) % product_ids.len()];
                let quantity = 1 + ((n + line) % 6) as i32;
                repo.add(OrderDetail::new(*order_id, product_id, quantity))?;
                lines += 1;
            }
        }
    }
    uow.save_changes().await?;

    info!(
        orders = order_ids.len(),
        lines,
        elapsed = ?start.elapsed(),
        "Seed complete"
    );

    let mut reports = uow.reports();
    if let Some(top) = reports.client_with_most_orders().await? {
        info!(
            client = %top.client_name,
            orders = top.order_count,
            "Most active client"
        );
    }
    if let Some(stats) = reports.price_statistics().await? {
        info!(
            average = %stats.average,
            min = %stats.min,
            max = %stats.max,
            "Catalogue prices"
        );
    }

    uow.dispose();
    db.close().await;
    Ok(())
}

/// Sets up the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=orderdesk=trace` - Show trace for orderdesk crates only
/// - Default: INFO, DEBUG for orderdesk crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,orderdesk=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn generate_client(n: usize) -> Client {
    let first = FIRST_NAMES[n % FIRST_NAMES.len()];
    let last = LAST_NAMES[(n / FIRST_NAMES.len()) % LAST_NAMES.len()];

    Client::new(
        format!("{} {}", first, last),
        format!("{}.{}{}@example.com", first, last, n).to_lowercase(),
    )
}

/// Identities assigned to committed keys, in key order.
fn resolve<S: Session>(
    uow: &UnitOfWork<S>,
    keys: &[PendingKey],
) -> Vec<EntityId> {
    keys.iter().filter_map(|k| uow.assigned_id(*k)).collect()
}
