//! Veilroom relay daemon.

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use veilroom::prelude::*;
use veilroom::DEFAULT_BIND_ADDR;

/// Veilroom - relay for end-to-end encrypted group chat.
#[derive(Parser, Debug)]
#[command(name = "veilroom")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, value_name = "ADDR", default_value = DEFAULT_BIND_ADDR)]
    bind: String,

    /// Which message contents are accepted and how they are routed
    #[arg(long, value_enum, default_value = "addressed")]
    relay_mode: ModeArg,

    /// How public keys are exchanged when someone joins a room
    #[arg(long, value_enum, default_value = "push")]
    key_strategy: StrategyArg,

    /// Reject identities announced without a public key
    #[arg(long)]
    require_public_key: bool,

    /// Longest accepted line, in bytes; longer lines drop the connection
    #[arg(long, value_name = "N", default_value_t = 64 * 1024)]
    max_line_bytes: usize,

    /// Serve WebSocket frames instead of newline-delimited TCP
    #[cfg(feature = "websocket")]
    #[arg(long)]
    websocket: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ModeArg {
    /// Plain text plus addressed and directed ciphertext
    Addressed,
    /// Plain text only
    Broadcast,
}

impl From<ModeArg> for RelayMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Addressed => RelayMode::Addressed,
            ModeArg::Broadcast => RelayMode::Broadcast,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum StrategyArg {
    /// Exchange keys between the newcomer and each member
    Push,
    /// Resend every member every other member's key
    FanOut,
}

impl From<StrategyArg> for KeyStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Push => KeyStrategy::Push,
            StrategyArg::FanOut => KeyStrategy::FanOut,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), RelayError> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let builder = VeilroomServer::builder()
        .bind(&cli.bind)
        .relay_mode(cli.relay_mode.into())
        .key_strategy(cli.key_strategy.into())
        .require_public_key(cli.require_public_key)
        .max_line_bytes(cli.max_line_bytes);

    #[cfg(feature = "websocket")]
    if cli.websocket {
        return builder.build_websocket().await?.run().await;
    }

    builder.build().await?.run().await
}
