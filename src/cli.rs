use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "chainlens",
    version,
    about = "chainlens: event scans, account history, contract introspection and permit relays for EVM networks"
)]
pub struct Cli {
    /// Network name from the config file or a preset (kaia, ethereum)
    #[arg(long, global = true)]
    pub network: Option<String>,

    /// JSON-RPC endpoint overriding the network's configured one (http(s):// or ws(s)://)
    #[arg(long, global = true)]
    pub rpc: Option<String>,

    /// Write list results as CSV instead of JSON
    #[arg(long, global = true)]
    pub csv: bool,

    /// Also save the output under the data directory's exports/
    #[arg(long, global = true)]
    pub save: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a contract's events over a block range
    Scan(ScanArgs),

    /// Paginated transaction history of an address
    History {
        address: String,
        /// First page to load (1-based)
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Number of consecutive pages to load
        #[arg(long, default_value_t = 1)]
        pages: u32,
        /// Without an indexer: how many recent blocks to walk instead
        #[arg(long, default_value_t = 10)]
        depth: u64,
    },

    /// Describe the contract at an address
    Describe { address: String },

    /// Native and token balances of an address
    Address { address: String },

    /// Block header and its transactions ("latest" or a number)
    Block {
        #[arg(default_value = "latest")]
        number: String,
    },

    /// Transaction by hash
    Tx {
        hash: String,
        /// Also fetch the receipt
        #[arg(long)]
        receipt: bool,
    },

    /// Gas price, block time, latest block and pending count
    Stats {
        /// Keep refreshing until interrupted
        #[arg(long)]
        watch: bool,
        /// Refresh interval in seconds
        #[arg(long, default_value_t = 10)]
        interval: u64,
    },

    /// Sign an EIP-2612 permit and relay permit + transferFrom through a fee payer
    Relay(RelayArgs),

    /// Inspect the relay journal
    Journal {
        /// Only entries with this status (pending, completed, partial, failed, resolved)
        #[arg(long)]
        status: Option<String>,
        /// Mark a partial entry as resolved
        #[arg(long, value_name = "ID")]
        resolve: Option<i64>,
        /// Note stored with --resolve
        #[arg(long, default_value = "resolved manually")]
        note: String,
    },

    /// List known networks
    Networks,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Contract address
    #[arg(long)]
    pub contract: String,

    /// Event name or full signature, e.g. Transfer or Transfer(address,address,uint256)
    #[arg(long, default_value = "Transfer")]
    pub event: String,

    #[arg(long)]
    pub from: u64,

    /// Defaults to the latest block
    #[arg(long)]
    pub to: Option<u64>,

    #[arg(long, default_value_t = 100)]
    pub max: usize,

    /// Field filter, e.g. "from=0xabc...,to=0xdef..."
    #[arg(long)]
    pub filter: Option<String>,

    /// Override the configured window size
    #[arg(long)]
    pub window_size: Option<u64>,

    /// Override the configured token decimals used for amounts
    #[arg(long)]
    pub decimals: Option<u8>,
}

#[derive(Debug, Args)]
pub struct RelayArgs {
    #[arg(long)]
    pub token: String,

    /// Decimal amount, e.g. 1.5
    #[arg(long)]
    pub amount: String,

    #[arg(long)]
    pub recipient: String,

    /// Spender; defaults to the fee payer's address
    #[arg(long)]
    pub spender: Option<String>,

    /// Fee payer private key (falls back to CHAINLENS_FEE_PAYER_KEY)
    #[arg(long)]
    pub fee_payer_key: Option<String>,

    /// Owner private key (falls back to CHAINLENS_OWNER_KEY)
    #[arg(long)]
    pub owner_key: Option<String>,

    /// Sign without asking for confirmation
    #[arg(long)]
    pub yes: bool,

    /// Do not record the attempt in the relay journal
    #[arg(long)]
    pub no_journal: bool,
}
