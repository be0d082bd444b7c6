use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kalefarm",
    about = "KALE holder leaderboard, price feed and farming client for Stellar"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the local REST API (default)
    Serve,

    /// Print the top KALE holders
    Holders {
        #[arg(short = 'l', long = "limit", help = "Number of holders, defaults to TOP_LIMIT")]
        limit: Option<usize>,
    },

    /// Print the current KALE price
    Price,

    /// Search for a proof of work nonce offline
    Solve {
        #[arg(long = "index", help = "Farm round index")]
        index: u32,

        #[arg(long = "entropy", help = "Round entropy, 32 bytes as hex")]
        entropy: String,

        #[arg(long = "farmer", help = "Farmer account, G...")]
        farmer: String,

        #[arg(long = "max-attempts", help = "Nonce budget, defaults to KALE_POW_MAX_ATTEMPTS")]
        max_attempts: Option<u64>,
    },

    /// Check the RPC node and the farm contract
    Health,
}

/// Decode 32 bytes of hex entropy.
pub fn parse_entropy(value: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = hex::decode(value.trim().trim_start_matches("0x"))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("entropy must be 32 bytes, got {}", b.len()))
}
