//! Atomic Ledger command line
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌───────────────┐    ┌────────────┐
//! │  Config  │───▶│  Database    │───▶│ PgBalanceStore│───▶│  Services  │
//! │  (YAML)  │    │  (PgPool)    │    │ (FOR UPDATE)  │    │ (JSON out) │
//! └──────────┘    └──────────────┘    └───────────────┘    └────────────┘
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use atomic_ledger::account::{AccountService, NewAccount};
use atomic_ledger::config::AppConfig;
use atomic_ledger::db::Database;
use atomic_ledger::logging::init_logging;
use atomic_ledger::money;
use atomic_ledger::store::PgBalanceStore;
use atomic_ledger::transfer::{TransferRequest, TransferService};

/// Atomic money transfers between account balances
#[derive(Parser, Debug)]
#[command(name = "atomic_ledger")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
#[command(about, long_about = None)]
struct Cli {
    /// Configuration environment, loads config/<ENV>.yaml
    #[arg(short, long, default_value = "dev", global = true)]
    env: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the accounts and transactions tables if missing
    InitSchema,

    /// Open an account with a starting balance
    CreateAccount {
        #[arg(long)]
        id: i64,
        /// Decimal amount, e.g. 1000.00
        #[arg(long, default_value = "0")]
        balance: String,
    },

    /// Show the committed balance of an account
    Balance {
        #[arg(long)]
        id: i64,
    },

    /// Move funds between two accounts
    Transfer {
        #[arg(long)]
        from: i64,
        #[arg(long)]
        to: i64,
        /// Decimal amount, e.g. 250.50
        #[arg(long)]
        amount: String,
        /// Replays with the same key return the original transaction
        #[arg(long)]
        idempotency_key: Option<String>,
    },
}

#[derive(Serialize)]
struct BalanceView {
    id: i64,
    balance: i64,
    balance_display: String,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let app_config = AppConfig::load(&cli.env)?;
    let _log_guard = init_logging(&app_config);

    tracing::info!(env = %cli.env, "Starting atomic_ledger");

    let db = Database::connect(&app_config.database)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db.health_check()
        .await
        .context("PostgreSQL health check failed")?;
    let store = PgBalanceStore::new(db.pool().clone());

    match cli.command {
        Command::InitSchema => {
            store.init_schema().await?;
            tracing::info!("Schema ready");
        }
        Command::CreateAccount { id, balance } => {
            let initial_balance = money::parse_amount(&balance)?;
            let service = AccountService::new(store);
            let account = service
                .create_account(NewAccount::new(id, initial_balance))
                .await?;
            print_json(&account)?;
        }
        Command::Balance { id } => {
            let service = AccountService::new(store);
            let account = service.get_account(id).await?;
            print_json(&BalanceView {
                id: account.id,
                balance: account.balance,
                balance_display: money::format_minor_units(account.balance),
            })?;
        }
        Command::Transfer {
            from,
            to,
            amount,
            idempotency_key,
        } => {
            let amount = money::parse_amount(&amount)?;
            let mut request = TransferRequest::new(from, to, amount);
            if let Some(key) = idempotency_key {
                request = request.with_idempotency_key(key);
            }

            let mut service = TransferService::new(store);
            if let Some(timeout) = app_config.transfer.timeout() {
                service = service.with_timeout(timeout);
            }
            let record = service.transfer(request).await?;
            print_json(&record)?;
        }
    }

    Ok(())
}
