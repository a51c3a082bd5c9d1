//! Grocer CLI - the local-first cart from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Add two packs of paneer as a guest
//! grocer add 100:1 -q 2 --name "Fresh Paneer" --unit g --amount 200 --price 8000
//!
//! # Show the cart and its sync status
//! grocer show
//!
//! # Same cart, signed in (development sign-in must be enabled on the server)
//! grocer --user 7 sync
//!
//! # Flush and go to checkout, then record the order
//! grocer --user 7 checkout --place-order
//! ```
//!
//! The cart is persisted under `--data-dir` between runs. Each invocation is
//! one session: pending changes are pushed when the process exits.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use url::Url;

use grocer_cart::{AuthState, Cart, CartConfig, FileStorage, HttpCartApi, NewLineItem};
use grocer_core::{LineId, Price, UserId};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "grocer")]
#[command(author, version, about = "Grocer cart from the terminal")]
struct Cli {
    /// Storefront base URL (overrides `GROCER_API_URL`)
    #[arg(long, global = true)]
    api_url: Option<Url>,

    /// Directory holding the persisted cart
    #[arg(long, global = true, default_value = ".grocer")]
    data_dir: PathBuf,

    /// Sign in as this user id before running the command
    #[arg(long, global = true)]
    user: Option<UserId>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the cart and its sync status
    Show,
    /// Add units of a product variant
    Add {
        /// Line to add, as `product:variant`
        line: LineId,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Product name shown until the server reprices the line
        #[arg(long)]
        name: Option<String>,

        #[arg(long, default_value = "pcs")]
        unit: String,

        #[arg(long, default_value = "1")]
        amount: Decimal,

        /// Unit price in minor units (paise)
        #[arg(long, default_value_t = 0)]
        price: i64,

        #[arg(long)]
        max_stock: Option<u32>,
    },
    /// Set the quantity of a line (0 or less removes it)
    Update {
        line: LineId,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Remove a line
    Remove { line: LineId },
    /// Empty the cart
    Clear {
        /// Also clear the server copy
        #[arg(long)]
        remote: bool,
    },
    /// Push pending changes now
    Sync,
    /// Flush the cart and report whether checkout can proceed
    Checkout {
        /// Record the order as placed afterwards
        #[arg(long)]
        place_order: bool,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = CartConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config = config.with_api_url(url);
    }

    let storage = Arc::new(FileStorage::new(&cli.data_dir)?);
    let api = match cli.user {
        Some(user) => commands::session::sign_in(&config, user).await?,
        None => HttpCartApi::new(&config)?,
    };

    let cart = Cart::open(&config, api, storage, AuthState::Guest);
    if let Some(user) = cli.user {
        if let Err(e) = cart.login(user).await {
            tracing::warn!(error = %e, "Account cart not synced");
        }
    }

    let mut out = std::io::stdout().lock();
    let result = match cli.command {
        Commands::Show => commands::cart::show(&cart, &mut out),
        Commands::Add {
            line,
            quantity,
            name,
            unit,
            amount,
            price,
            max_stock,
        } => {
            let item = NewLineItem {
                product_id: line.product_id,
                variant_id: line.variant_id,
                product_name: name.unwrap_or_else(|| format!("Product {}", line.product_id)),
                variant_unit: unit,
                variant_amount: amount,
                price: Price::from_minor(price),
                quantity,
                image_url: None,
                max_stock,
            };
            commands::cart::add(&cart, item, &mut out)
        }
        Commands::Update { line, quantity } => {
            commands::cart::update(&cart, line, quantity, &mut out)
        }
        Commands::Remove { line } => commands::cart::remove(&cart, line, &mut out),
        Commands::Clear { remote } => commands::cart::clear(&cart, remote, &mut out).await,
        Commands::Sync => commands::cart::sync(&cart, &mut out).await,
        Commands::Checkout { place_order } => {
            commands::cart::checkout(&cart, place_order, &mut out).await
        }
    };

    // Process exit: push whatever is still pending
    cart.shutdown().await;
    result
}
