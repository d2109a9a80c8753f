use crate::cmd::{deploy::DeployArgs, deposit::DepositArgs};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bridge")]
#[command(version, about = "Provision two-chain bridge environments and relay test deposits", long_about = None)]
pub(crate) struct BridgeCli {
    #[command(subcommand)]
    pub(crate) cmd: BridgeSubcommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum BridgeSubcommand {
    /// Deploy and wire the bridge contracts on both chains
    Deploy(DeployArgs),

    /// Submit a deposit from the source chain and optionally wait for execution
    Deposit(DepositArgs),
}
