pub mod error;
pub mod flow;
pub mod poll;
pub mod verification;

pub use error::{ErrorCategory, FlowError, FlowResult, Step};
pub use flow::{run_trade_flow, FlowReport, FlowState, TradeFlow};
