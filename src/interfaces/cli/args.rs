use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulated point-of-sale payments with polling clients", long_about = None)]
pub struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    #[command(flatten)]
    pub engine: EngineArgs,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// HMAC secret used to sign tokens.
    #[arg(long, env = "PAYPOLL_SECRET", default_value = crate::config::DEV_SECRET, hide_env_values = true, global = true)]
    pub secret: String,

    /// Lifetime of tokens and transactions, in seconds.
    #[arg(long, env = "PAYPOLL_TOKEN_TTL_SECONDS", default_value_t = 300, global = true)]
    pub token_ttl_seconds: u64,

    /// Sojor rate applied to new transactions.
    #[arg(long, env = "PAYPOLL_SOJOR_PERCENT", default_value = "1.5", global = true)]
    pub sojor_percent: Decimal,

    /// Require a POS token to clear transactions.
    #[arg(long, env = "PAYPOLL_CLEAR_REQUIRES_AUTH", global = true)]
    pub clear_requires_auth: bool,

    /// Reject tokens whose role was inferred from the subject id.
    #[arg(long, env = "PAYPOLL_STRICT_ROLES", global = true)]
    pub strict_roles: bool,

    /// Prefix of the preview reference returned by `create`.
    #[arg(long, env = "PAYPOLL_PREVIEW_BASE", default_value = crate::config::DEFAULT_PREVIEW_BASE, global = true)]
    pub preview_base: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Issue a short-lived role token.
    Token {
        #[arg(long)]
        subject: String,
        /// `client` or `pos`. Inferred from the subject id when omitted.
        #[arg(long)]
        role: Option<String>,
    },
    /// Show the claims of a token.
    Whoami {
        #[arg(long)]
        token: String,
    },
    /// Create a transaction (client token).
    Create {
        #[arg(long)]
        token: String,
        #[arg(long)]
        source: String,
        #[arg(long)]
        destination: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        buyer_float_percent: Option<Decimal>,
    },
    /// Read a transaction (any role token, or its transaction token).
    Status {
        id: String,
        #[arg(long)]
        token: String,
    },
    /// List WAITING transactions (POS token).
    Pending {
        #[arg(long)]
        token: String,
    },
    /// List READY_FOR_AUTH transactions (POS token).
    Ready {
        #[arg(long)]
        token: String,
    },
    /// WAITING -> READY_FOR_AUTH (POS token).
    Confirm {
        id: String,
        #[arg(long)]
        token: String,
    },
    /// READY_FOR_AUTH -> SETTLED (POS token).
    Authorize {
        id: String,
        #[arg(long)]
        token: String,
    },
    /// Cancel a transaction that is not yet authorized.
    Cancel {
        id: String,
        #[arg(long)]
        token: String,
    },
    /// Delete a transaction.
    Clear {
        id: String,
        #[arg(long)]
        token: Option<String>,
    },
    /// Poll a transaction until it is confirmed, settled or cancelled.
    Watch {
        id: String,
        #[arg(long)]
        token: String,
        #[command(flatten)]
        poll: PollArgs,
        /// Stop polling after this many seconds.
        #[arg(long)]
        ttl_seconds: Option<u64>,
    },
    /// Run a full client/POS exchange against one ledger.
    Demo {
        #[arg(long, default_value = "1000")]
        amount: Decimal,
        #[arg(long, default_value = "2.5")]
        buyer_float_percent: Decimal,
        #[command(flatten)]
        poll: PollArgs,
    },
}

#[derive(Args, Debug, Clone, Copy)]
pub struct PollArgs {
    /// Polling interval in milliseconds.
    #[arg(long, default_value_t = 2000, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: u64,
}
