use std::process::ExitCode;

use btc_trade_flow::api::BankClient;
use btc_trade_flow::core::config::{env_lookup, load_dotenv, log_level_from_env};
use btc_trade_flow::core::logging::init_logging;
use btc_trade_flow::trading::run_trade_flow;

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();
    init_logging(&log_level_from_env());

    tracing::info!("🚀 BTC trade flow starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match run_trade_flow(env_lookup, |config| BankClient::new(&config.bank)).await {
        Ok(report) => {
            tracing::info!(
                "✅ Trade {} {} for customer {}: {} balance {} (expected {})",
                report.trade_guid,
                report.trade_state,
                report.customer_guid,
                report.asset,
                report.observed_balance,
                report.expected_balance
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(
                "Exiting with code {} ({:?} error at {})",
                e.exit_code(),
                e.category(),
                e.step()
            );
            ExitCode::from(e.exit_code())
        }
    }
}
