use clap::{Parser, Subcommand};
use lending_ops::utils::Network;
use rust_decimal::Decimal;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(long, env = "OPS_NETWORK", default_value = "mainnet", help = "Target network (mainnet, optimism, arbitrum, base)")]
    pub network: Network,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every locally defined operation with its fingerprint.
    Fingerprints,

    /// Compare the deployed operations registry with the local definitions.
    Validate {
        #[clap(long, help = "Write one CSV row per operation to this file")]
        report: Option<PathBuf>,
    },

    /// Register every operation the deployed registry lacks.
    Push {
        #[clap(long, help = "Write the pushed operations to this CSV file")]
        report: Option<PathBuf>,
    },

    /// Solve a leverage change for a target collateralization ratio.
    Solve {
        #[clap(long, help = "Reduce leverage instead of increasing it")]
        decrease: bool,

        #[clap(long, help = "Oracle price of collateral in debt tokens")]
        oracle_price: Decimal,

        #[clap(long, help = "Market price of collateral in debt tokens")]
        market_price: Decimal,

        #[clap(long, default_value = "0", help = "Swap fee as a fraction, e.g. 0.002")]
        oazo_fee: Decimal,

        #[clap(long, default_value = "0", help = "Flashloan fee as a fraction")]
        flashloan_fee: Decimal,

        #[clap(long, help = "Current collateral amount")]
        collateral: Decimal,

        #[clap(long, help = "Current debt amount")]
        debt: Decimal,

        #[clap(long, help = "Target collateralization ratio, e.g. 1.5")]
        target_ratio: Decimal,

        #[clap(long, default_value = "0.005", help = "Slippage tolerance as a fraction")]
        slippage: Decimal,

        #[clap(long, default_value = "0", help = "Debt tokens added by the user")]
        debt_top_up: Decimal,

        #[clap(long, default_value = "0", help = "Collateral added by the user")]
        collateral_top_up: Decimal,
    },
}

pub fn parse_cli_args() -> Args {
    Args::parse()
}
