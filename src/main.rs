//! Flash liquidation runner
//!
//! Loads a fork snapshot, wires the operator to it and runs one `operate`
//! call as a single transaction. The request comes from the environment:
//! - `COLLATERAL`, `DEBT`: asset symbols from the registry or addresses
//! - `BORROWER`: account to liquidate
//! - `DEBT_TO_COVER`: raw debt units, `0` or unset for a full close
//! - `RECEIVE_AS_COLLATERAL`: `true` to keep profit in the collateral token

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flashliq_chain::{count_liquidations, liquidations_of};
use flashliq_core::{OperationRequest, OperatorConfig, ProfitAsset};
use flashliq_fork::ForkSnapshot;

/// Environment variable names.
mod env {
    pub const FORK_SNAPSHOT: &str = "FORK_SNAPSHOT";
    pub const OPERATOR_ADDRESS: &str = "OPERATOR_ADDRESS";
    pub const CALLER: &str = "CALLER";
    pub const COLLATERAL: &str = "COLLATERAL";
    pub const DEBT: &str = "DEBT";
    pub const BORROWER: &str = "BORROWER";
    pub const DEBT_TO_COVER: &str = "DEBT_TO_COVER";
    pub const RECEIVE_AS_COLLATERAL: &str = "RECEIVE_AS_COLLATERAL";
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,flashliq_core=debug,flashliq_fork=debug")),
        )
        .init();

    let config = OperatorConfig::from_env()?;

    let snapshot_path = get_env(env::FORK_SNAPSHOT)?;
    let fork = ForkSnapshot::from_file(&snapshot_path)?.build()?;
    info!(path = %snapshot_path, "Fork ready");

    // The fork decides where the collaborators live
    let operator_address = match std::env::var(env::OPERATOR_ADDRESS) {
        Ok(raw) => parse_address(env::OPERATOR_ADDRESS, &raw)?,
        Err(_) => config.contracts.operator,
    };
    let config = config.with_contracts(fork.contracts(operator_address));
    config.log_config();

    let request = load_request(&config)?;
    let caller = match std::env::var(env::CALLER) {
        Ok(raw) => parse_address(env::CALLER, &raw)?,
        Err(_) => operator_address,
    };

    let operator = fork.operator(config)?;
    let receipt = match fork.ledger.transact(|| operator.operate(caller, request.clone())) {
        Ok(receipt) => receipt,
        Err(err) => {
            error!(kind = err.kind(), error = %err, "Operation reverted");
            return Err(err.into());
        }
    };

    let result = &receipt.output;
    let pool = operator.config().contracts.lending_pool;
    info!(
        liquidations = count_liquidations(&receipt.logs, pool),
        for_borrower = liquidations_of(&receipt.logs, pool, request.borrower).len(),
        logs = receipt.logs.len(),
        "Operation committed"
    );
    if let ProfitAsset::Token(token) = result.asset {
        if let Some(asset) = operator.config().asset_by_address(token) {
            info!(profit = %asset.format_amount(result.amount), "Profit");
        }
    }

    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

fn load_request(config: &OperatorConfig) -> Result<OperationRequest> {
    let collateral = config.resolve_asset(&get_env(env::COLLATERAL)?)?;
    let debt = config.resolve_asset(&get_env(env::DEBT)?)?;
    let borrower = parse_address(env::BORROWER, &get_env(env::BORROWER)?)?;

    let debt_to_cover = match std::env::var(env::DEBT_TO_COVER) {
        Ok(raw) => raw
            .parse::<U256>()
            .with_context(|| format!("Invalid amount for {}: {}", env::DEBT_TO_COVER, raw))?,
        Err(_) => U256::ZERO,
    };
    let receive_as_collateral = std::env::var(env::RECEIVE_AS_COLLATERAL)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    Ok(OperationRequest::new(
        collateral,
        debt,
        debt_to_cover,
        borrower,
        receive_as_collateral,
    ))
}

fn get_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("Missing env var: {}", name))
}

fn parse_address(name: &str, raw: &str) -> Result<Address> {
    raw.parse()
        .map_err(|e| anyhow::anyhow!("Invalid address for {}: {}", name, e))
}
