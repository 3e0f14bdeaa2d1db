//! Evolv CLI - Database migrations and loyalty management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run loyalty database migrations
//! evolv-cli migrate
//!
//! # Show a customer's loyalty summary
//! evolv-cli account show --customer 42
//!
//! # Replay an order event (same path as POST /api/orders/events)
//! evolv-cli event apply --order 1001 --customer 42 --total 1250.00 --event paid --status paid
//!
//! # Program-wide aggregates
//! evolv-cli stats
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `account show` - Print an account summary as JSON
//! - `event apply` - Apply an order event through the loyalty service
//! - `stats` - Print program statistics as JSON

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use evolv_core::{CustomerId, FinancialStatus, OrderEventType, OrderId};

mod commands;

#[derive(Parser)]
#[command(name = "evolv-cli")]
#[command(author, version, about = "Evolv loyalty CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Inspect loyalty accounts
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Apply order events
    Event {
        #[command(subcommand)]
        action: EventAction,
    },
    /// Print program statistics
    Stats,
}

#[derive(Subcommand)]
enum AccountAction {
    /// Show a customer's loyalty summary
    Show {
        /// Customer ID
        #[arg(short, long)]
        customer: CustomerId,
    },
}

#[derive(Subcommand)]
enum EventAction {
    /// Apply one order event
    Apply {
        /// Order ID
        #[arg(short, long)]
        order: OrderId,

        /// Customer ID
        #[arg(short, long)]
        customer: CustomerId,

        /// Order total
        #[arg(short, long)]
        total: Decimal,

        /// Event type (`placed`, `paid`, `delivered`)
        #[arg(short, long, default_value = "paid")]
        event: OrderEventType,

        /// Financial status of the order
        #[arg(short, long, default_value = "paid")]
        status: FinancialStatus,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Account { action } => match action {
            AccountAction::Show { customer } => commands::account::show(customer).await?,
        },
        Commands::Event { action } => match action {
            EventAction::Apply {
                order,
                customer,
                total,
                event,
                status,
            } => {
                let event = evolv_core::OrderEvent {
                    order_id: order,
                    customer_id: customer,
                    order_total: total,
                    event_type: event,
                    financial_status: status,
                };
                commands::event::apply(event).await?;
            }
        },
        Commands::Stats => commands::stats::show().await?,
    }
    Ok(())
}
