use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use crate::api::{ApiError, Asset, TradeState};
use crate::core::ConfigError;

/// Position in the fixed purchase sequence; used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    LoadConfig,
    Connect,
    Authenticate,
    CreateCustomer,
    CreateAccount,
    CreateQuote,
    ExecuteTrade,
    VerifyBalance,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::LoadConfig => "load_config",
            Step::Connect => "connect",
            Step::Authenticate => "authenticate",
            Step::CreateCustomer => "create_customer",
            Step::CreateAccount => "create_account",
            Step::CreateQuote => "create_quote",
            Step::ExecuteTrade => "execute_trade",
            Step::VerifyBalance => "verify_balance",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Authentication,
    Upstream,
    Verification,
}

impl ErrorCategory {
    pub fn exit_code(&self) -> u8 {
        match self {
            ErrorCategory::Configuration => 2,
            ErrorCategory::Authentication => 3,
            ErrorCategory::Upstream => 4,
            ErrorCategory::Verification => 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("authentication failed: {0}")]
    Authentication(#[source] ApiError),

    #[error("{step} failed: {source}")]
    Upstream {
        step: Step,
        #[source]
        source: ApiError,
    },

    #[error("{step} failed: {resource} ended in state {state}")]
    UnexpectedState {
        step: Step,
        resource: String,
        state: String,
    },

    #[error("quote {quote} expired at {expired_at}")]
    QuoteExpired {
        quote: String,
        expired_at: DateTime<Utc>,
    },

    #[error("trade {trade} did not complete: state {state}{}", code_suffix(.failure_code))]
    TradeFailed {
        trade: String,
        state: TradeState,
        failure_code: Option<String>,
    },

    #[error("balance mismatch: expected {expected} {asset}, observed {observed} {asset}")]
    Verification {
        expected: Decimal,
        observed: Decimal,
        asset: Asset,
    },
}

impl FlowError {
    pub fn upstream(step: Step) -> impl FnOnce(ApiError) -> FlowError {
        move |source| FlowError::Upstream { step, source }
    }

    pub fn step(&self) -> Step {
        match self {
            FlowError::Configuration(_) => Step::LoadConfig,
            FlowError::Authentication(_) => Step::Authenticate,
            FlowError::Upstream { step, .. } | FlowError::UnexpectedState { step, .. } => *step,
            FlowError::QuoteExpired { .. } => Step::CreateQuote,
            FlowError::TradeFailed { .. } => Step::ExecuteTrade,
            FlowError::Verification { .. } => Step::VerifyBalance,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            FlowError::Configuration(_) => ErrorCategory::Configuration,
            FlowError::Authentication(_) => ErrorCategory::Authentication,
            FlowError::Upstream { .. }
            | FlowError::UnexpectedState { .. }
            | FlowError::QuoteExpired { .. }
            | FlowError::TradeFailed { .. } => ErrorCategory::Upstream,
            FlowError::Verification { .. } => ErrorCategory::Verification,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.category().exit_code()
    }
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|c| format!(" ({})", c))
        .unwrap_or_default()
}

pub type FlowResult<T> = Result<T, FlowError>;
