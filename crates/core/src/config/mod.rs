//! Operator configuration.
//!
//! - Runtime profiles and execution thresholds
//! - Contract addresses injected into the operator
//! - Asset registry for symbol resolution and display

mod asset_config;
mod operator;

pub use asset_config::AssetConfig;
pub use operator::{ContractsConfig, ExecutionConfig, OperatorConfig};
