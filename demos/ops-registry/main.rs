pub mod cli;
pub mod report;

use cli::Command;
use lending_ops::builders::RegistryValidatorBuilder;
use lending_ops::config::RegistryConfig;
use lending_ops::errors::Result;
use lending_ops::leverage::{
    solve_decrease_position, solve_increase_position, DecreasePositionInput, IncreasePositionInput,
};
use lending_ops::registry::{OperationsDatabase, ValidationReport};
use lending_ops::utils::Network;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ops_registry=info".parse().map_err(|e| anyhow::anyhow!("{}", e))?)
                .add_directive("lending_ops=info".parse().map_err(|e| anyhow::anyhow!("{}", e))?),
        )
        .pretty()
        .compact()
        .with_file(false)
        .with_line_number(false)
        .with_target(false)
        .init();

    let args = cli::parse_cli_args();
    let network = args.network;

    match args.command {
        Command::Fingerprints => {
            let database = OperationsDatabase::for_network(network);
            for definition in database.operations() {
                println!("{:<48} {}", definition.name, definition.fingerprint());
            }
        }
        Command::Validate { report } => {
            let reports = validate(network).await?;
            summarize(&reports);
            if let Some(path) = report {
                report::write_report(&path, network, &reports)?;
            }
        }
        Command::Push { report } => {
            let config = RegistryConfig::from_env(network)?;
            let validator = RegistryValidatorBuilder::from_config(&config).build()?;
            let pushed = validator.push_missing().await?;
            tracing::info!(network = %network, pushed = pushed.len(), "Push finished");
            if let Some(path) = report {
                report::write_report(&path, network, &pushed)?;
            }
        }
        Command::Solve {
            decrease,
            oracle_price,
            market_price,
            oazo_fee,
            flashloan_fee,
            collateral,
            debt,
            target_ratio,
            slippage,
            debt_top_up,
            collateral_top_up,
        } => {
            if decrease {
                let output = solve_decrease_position(&DecreasePositionInput {
                    oracle_price,
                    market_price,
                    oazo_fee,
                    flashloan_fee,
                    current_collateral: collateral,
                    current_debt: debt,
                    required_coll_ratio: target_ratio,
                    slippage,
                })?;
                println!("debt to repay:      {}", output.debt_to_repay.round_dp(8));
                println!("collateral to sell: {}", output.collateral_to_sell.round_dp(8));
            } else {
                let output = solve_increase_position(&IncreasePositionInput {
                    oracle_price,
                    market_price,
                    oazo_fee,
                    flashloan_fee,
                    current_collateral: collateral,
                    current_debt: debt,
                    required_coll_ratio: target_ratio,
                    slippage,
                    debt_top_up,
                    collateral_top_up,
                })?;
                println!("required debt:         {}", output.required_debt.round_dp(8));
                println!("additional collateral: {}", output.additional_collateral.round_dp(8));
                println!("top-up collateral:     {}", output.pre_increase_top_up.round_dp(8));
            }
        }
    }

    Ok(())
}

async fn validate(network: Network) -> Result<Vec<ValidationReport>> {
    let config = RegistryConfig::from_env(network)?;
    tracing::info!(network = %network, rpc = %mask_url(&config.rpc_url), "Validating operations registry");
    let validator = RegistryValidatorBuilder::from_config(&config).build()?;
    Ok(validator.validate_all().await)
}

fn summarize(reports: &[ValidationReport]) {
    for report in reports {
        if report.outcome.is_configured() {
            tracing::info!(operation = %report.operation, "{}", report.outcome);
        } else {
            tracing::warn!(operation = %report.operation, "{}", report.outcome);
        }
    }
    let configured = reports.iter().filter(|report| report.outcome.is_configured()).count();
    tracing::info!(configured, total = reports.len(), "Validation finished");
}

/// Hide API keys embedded in RPC URLs.
fn mask_url(url: &url::Url) -> String {
    format!("{}://{}/**masked**", url.scheme(), url.host_str().unwrap_or("unknown"))
}
