use crate::chain::rpc::{Commitment, DEVNET_ENDPOINTS};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Group payment pacts settled on Solana", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct Config {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true, env = "PACTPAY_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// RPC endpoints in order of preference.
    #[arg(
        long = "rpc-url",
        global = true,
        env = "PACTPAY_RPC_URLS",
        value_delimiter = ',',
        default_values_t = DEVNET_ENDPOINTS.map(String::from)
    )]
    pub rpc_urls: Vec<String>,

    #[arg(long, global = true, env = "PACTPAY_COMMITMENT", default_value_t = Commitment::Confirmed)]
    pub commitment: Commitment,

    /// Delay between confirmation polls.
    #[arg(long, global = true, env = "PACTPAY_POLL_INTERVAL_MS", default_value_t = 500)]
    pub poll_interval_ms: u64,

    /// How long to keep polling while the RPC gives no answer after a broadcast.
    #[arg(long, global = true, env = "PACTPAY_CONFIRMATION_TIMEOUT_SECS", default_value_t = 120)]
    pub confirmation_timeout_secs: u64,

    /// Timeout for each HTTP request, in seconds.
    #[arg(long, global = true, env = "PACTPAY_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, env = "PACTPAY_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// CSV file with `email,wallet` rows used to resolve participants.
    #[arg(long, global = true, env = "PACTPAY_DIRECTORY")]
    pub directory: Option<PathBuf>,

    /// Base URL of the invitation service. Invitations are only logged when unset.
    #[arg(long, global = true, env = "PACTPAY_NOTIFY_URL")]
    pub notify_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a pact and print one payment link per participant.
    Create(CreateArgs),
    /// Show a pact and its settlement state.
    Show { pact_id: String },
    /// Print the payment links of a pact as CSV.
    Links { pact_id: String },
    /// Render a participant's payment link as a QR code.
    Qr {
        pact_id: String,
        index: usize,
        /// Write an SVG here instead of printing to the terminal.
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = crate::payment::qr::DEFAULT_QR_SIZE)]
        size: u32,
    },
    /// List pacts, newest first.
    List {
        #[arg(long, conflicts_with = "participant", required_unless_present = "participant")]
        creator: Option<String>,
        #[arg(long)]
        participant: Option<String>,
    },
    /// Pay a participant's share with a local keypair file.
    Pay {
        pact_id: String,
        index: usize,
        /// Solana CLI keypair file (JSON array of 64 bytes).
        #[arg(long)]
        keypair: PathBuf,
    },
    /// Record payments already on-chain for unpaid participants.
    Sync { pact_id: String },
    /// Show a wallet's native or token balance.
    Balance {
        wallet: String,
        #[arg(long)]
        token_mint: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub name: String,

    /// Amount owed by each participant, in whole units of the asset.
    #[arg(long)]
    pub amount: Decimal,

    /// Wallet that receives every payment.
    #[arg(long)]
    pub receiver: String,

    /// RFC 3339 timestamp, e.g. 2026-12-31T23:59:59Z.
    #[arg(long)]
    pub due: DateTime<Utc>,

    /// Organizer identity recorded on the pact.
    #[arg(long)]
    pub creator: String,

    /// SPL token mint; omit for native SOL.
    #[arg(long, requires = "token_decimals")]
    pub token_mint: Option<String>,

    #[arg(long, requires = "token_mint")]
    pub token_decimals: Option<u8>,

    /// Email or wallet address; repeatable.
    #[arg(long = "participant")]
    pub participants: Vec<String>,

    /// CSV file with an `identity` column.
    #[arg(long)]
    pub participants_csv: Option<PathBuf>,
}
