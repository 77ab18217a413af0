//! CLI argument definitions and dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};

use crate::config::LedgerConfig;
use crate::contracts::{CounterStore, LedgerError, SequenceAllocator};
use crate::entity::{Identified, Payment};
use crate::ledger::Ledger;
use crate::sequence::IdFormat;

/// Top-level CLI parser for `salon-ledger`.
#[derive(Debug, Parser)]
#[command(
    name = "salon-ledger",
    version,
    about = "Allocate sequential identifiers for salon records"
)]
pub struct Cli {
    /// RocksDB directory; overrides SALON_DATA_DIR.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Allocate the next value of a sequence.
    Next {
        sequence: String,
        /// Also print the value formatted with this prefix.
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Show the last issued value of a sequence.
    Current { sequence: String },
    /// List every counter.
    Counters,
    /// Manage payments.
    #[command(subcommand)]
    Payment(PaymentCommand),
}

#[derive(Debug, Subcommand)]
pub enum PaymentCommand {
    /// Create a payment and assign it the next PID.
    Create(PaymentArgs),
    /// Find a payment by document id, customer id or PID.
    Get { identifier: String },
    /// List all payments.
    List,
    /// Replace a payment's details. Its PID is kept.
    Update {
        id: String,
        #[command(flatten)]
        fields: PaymentArgs,
    },
    /// Delete a payment by document id.
    Delete { id: String },
}

#[derive(Debug, Args)]
pub struct PaymentArgs {
    #[arg(long)]
    pub cus_id: Option<String>,
    #[arg(long, default_value = "")]
    pub user_name: String,
    #[arg(long, default_value = "")]
    pub payment_date: String,
    #[arg(long, default_value = "")]
    pub package_amount: String,
    #[arg(long, default_value = "")]
    pub total_amount: String,
    #[arg(long, default_value = "")]
    pub method: String,
    #[arg(long, default_value = "")]
    pub email: String,
}

impl From<PaymentArgs> for Payment {
    fn from(args: PaymentArgs) -> Self {
        Payment {
            payment_id: None,
            cus_id: args.cus_id,
            user_name: args.user_name,
            payment_date: args.payment_date,
            package_amount: args.package_amount,
            total_amount: args.total_amount,
            method: args.method,
            email: args.email,
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, LedgerError> {
    serde_json::to_value(value).map_err(|e| LedgerError::Serialization(e.to_string()))
}

/// Runs a parsed command against the environment's config and returns its JSON output.
pub async fn run(cli: Cli) -> Result<Value, LedgerError> {
    run_with_config(cli, LedgerConfig::from_env()).await
}

pub async fn run_with_config(cli: Cli, mut config: LedgerConfig) -> Result<Value, LedgerError> {
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    let ledger = Ledger::open(&config)?;

    match cli.command {
        Command::Next { sequence, prefix } => {
            let allocation = ledger.allocator().allocate(&sequence).await?;
            let mut out = to_json(&allocation)?;
            if let Some(prefix) = prefix {
                out["id"] = Value::String(IdFormat::new(prefix).format(allocation.value));
            }
            Ok(out)
        }
        Command::Current { sequence } => {
            let value = ledger.allocator().current_value(&sequence)?;
            Ok(json!({ "sequence": sequence, "value": value }))
        }
        Command::Counters => to_json(&ledger.store().list_counters()?),
        Command::Payment(command) => run_payment(&ledger, command).await,
    }
}

async fn run_payment(ledger: &Ledger, command: PaymentCommand) -> Result<Value, LedgerError> {
    let repository = ledger.repository();
    match command {
        PaymentCommand::Create(args) => to_json(&repository.create(Payment::from(args)).await?),
        PaymentCommand::Get { identifier } => {
            to_json(&repository.lookup::<Payment>(&identifier)?)
        }
        PaymentCommand::List => to_json(&repository.list::<Payment>()?),
        PaymentCommand::Update { id, fields } => {
            to_json(&repository.update(&id, Payment::from(fields)).await?)
        }
        PaymentCommand::Delete { id } => {
            let deleted = repository.delete::<Payment>(&id)?;
            Ok(json!({
                "deleted": deleted.id,
                (Payment::ID_FIELD): deleted.entity.payment_id,
            }))
        }
    }
}
