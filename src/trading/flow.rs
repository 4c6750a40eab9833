use chrono::Utc;
use rust_decimal::Decimal;
use std::fmt;
use tracing::Instrument;
use uuid::Uuid;

use super::error::{FlowError, FlowResult, Step};
use super::poll::{wait_for, PollStatus};
use super::verification::{expected_balance, verify_balance};
use crate::api::types::CUSTOMER_TYPE_INDIVIDUAL;
use crate::api::{
    AccessToken, Account, AccountRequest, AccountState, ApiResult, Asset, BankApi, Credentials,
    Customer, CustomerState, Quote, QuoteRequest, Trade, TradeState, VerificationOutcome,
    VerificationState,
};
use crate::core::Config;

/// Progress through the purchase sequence. Transitions only move forward.
///
/// There is no `Failed` variant: a failed run ends in `Err(FlowError)`, whose
/// [`FlowError::step`] names the step that failed and whose message carries
/// the reason. The last state reached is logged alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FlowState {
    Unconfigured,
    Authenticated,
    CustomerCreated,
    AccountCreated,
    QuoteObtained,
    TradeExecuted,
    Verified,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct FlowReport {
    pub run_id: Uuid,
    pub bank_guid: String,
    pub customer_guid: String,
    pub account_guid: String,
    pub quote_guid: String,
    pub trade_guid: String,
    pub trade_state: TradeState,
    pub price: Option<Decimal>,
    pub asset: Asset,
    pub expected_balance: Decimal,
    pub observed_balance: Decimal,
    pub state: FlowState,
}

/// Runs the fixed purchase sequence against a bank API.
pub struct TradeFlow<'a, A: BankApi + ?Sized> {
    api: &'a A,
    config: &'a Config,
}

impl<'a, A: BankApi + ?Sized> TradeFlow<'a, A> {
    pub fn new(api: &'a A, config: &'a Config) -> Self {
        Self { api, config }
    }

    pub async fn run(&self) -> FlowResult<FlowReport> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("trade_flow", run_id = %run_id);
        let mut state = FlowState::Unconfigured;

        let result = self.execute(run_id, &mut state).instrument(span).await;

        if let Err(e) = &result {
            tracing::error!(
                "❌ Trade flow failed at {} (last state: {}): {}",
                e.step(),
                state,
                e
            );
        }

        result
    }

    async fn execute(&self, run_id: Uuid, state: &mut FlowState) -> FlowResult<FlowReport> {
        let trade_config = &self.config.trade;
        let asset = trade_config.base_asset()?;

        tracing::info!(
            "🚀 Starting {} {} {} for bank {}",
            trade_config.side,
            trade_config.amount,
            trade_config.symbol,
            self.config.bank.bank_guid
        );

        let token = self.authenticate().await?;
        advance(state, FlowState::Authenticated);

        let customer = self.create_customer(&token).await?;
        advance(state, FlowState::CustomerCreated);

        let account = self.create_account(&token, &customer, asset, run_id).await?;
        let opening_balance = account.platform_balance;
        advance(state, FlowState::AccountCreated);

        let quote = self.create_quote(&token, &customer).await?;
        advance(state, FlowState::QuoteObtained);

        let trade = self.execute_trade(&token, &quote).await?;
        advance(state, FlowState::TradeExecuted);

        let expected = expected_balance(opening_balance, trade_config.side, trade_config.amount);
        let observed = self.verify(&token, &account.guid, expected, asset).await?;
        advance(state, FlowState::Verified);

        Ok(FlowReport {
            run_id,
            bank_guid: self.config.bank.bank_guid.clone(),
            customer_guid: customer.guid,
            account_guid: account.guid,
            quote_guid: quote.guid.clone(),
            trade_guid: trade.guid,
            trade_state: trade.state,
            price: quote.price(),
            asset,
            expected_balance: expected,
            observed_balance: observed,
            state: *state,
        })
    }

    async fn authenticate(&self) -> FlowResult<AccessToken> {
        let credentials = Credentials::new(
            self.config.bank.client_id.clone(),
            self.config.bank.client_secret.clone(),
        );

        let token = self
            .api
            .authenticate(&credentials)
            .await
            .map_err(|e| {
                if e.rejects_credentials() {
                    FlowError::Authentication(e)
                } else {
                    FlowError::upstream(Step::Authenticate)(e)
                }
            })?;

        tracing::info!("🔑 Authenticated as client {}", credentials.client_id);
        Ok(token)
    }

    /// Creates an individual customer and drives it through sandbox KYC.
    async fn create_customer(&self, token: &AccessToken) -> FlowResult<Customer> {
        let step = Step::CreateCustomer;
        let polling = &self.config.polling;

        tracing::info!("Creating customer...");
        let customer = self
            .api
            .create_customer(token, CUSTOMER_TYPE_INDIVIDUAL)
            .await
            .map_err(FlowError::upstream(step))?;
        tracing::info!("Created customer: {}", customer.guid);

        let guid = customer.guid.clone();
        let customer = wait_for(
            step,
            polling,
            customer,
            || self.api.get_customer(token, &guid),
            |c: &Customer| match c.state {
                CustomerState::Unverified | CustomerState::Verified => PollStatus::Done,
                CustomerState::Rejected | CustomerState::Frozen => PollStatus::Failed,
                _ => PollStatus::Pending,
            },
        )
        .await?;

        if customer.state == CustomerState::Verified {
            return Ok(customer);
        }

        let verification = self
            .api
            .create_identity_verification(token, &guid)
            .await
            .map_err(FlowError::upstream(step))?;
        tracing::info!("Created identity verification: {}", verification.guid);

        let verification_guid = verification.guid.clone();
        let verification = wait_for(
            step,
            polling,
            verification,
            || self.api.get_identity_verification(token, &verification_guid),
            |v| match v.state {
                VerificationState::Completed => PollStatus::Done,
                VerificationState::Expired => PollStatus::Failed,
                _ => PollStatus::Pending,
            },
        )
        .await?;

        if let Some(inquiry) = &verification.persona_inquiry_id {
            tracing::debug!("Persona inquiry id: {}", inquiry);
        }
        if verification.outcome != Some(VerificationOutcome::Passed) {
            return Err(FlowError::UnexpectedState {
                step,
                resource: format!("identity verification {}", verification.guid),
                state: format!(
                    "completed with outcome {}",
                    verification
                        .outcome
                        .map(|o| o.to_string())
                        .unwrap_or_else(|| "none".to_string())
                ),
            });
        }

        wait_for(
            step,
            polling,
            customer,
            || self.api.get_customer(token, &guid),
            |c| match c.state {
                CustomerState::Verified => PollStatus::Done,
                CustomerState::Rejected | CustomerState::Frozen => PollStatus::Failed,
                _ => PollStatus::Pending,
            },
        )
        .await
    }

    async fn create_account(
        &self,
        token: &AccessToken,
        customer: &Customer,
        asset: Asset,
        run_id: Uuid,
    ) -> FlowResult<Account> {
        let step = Step::CreateAccount;
        let request = AccountRequest {
            customer_guid: customer.guid.clone(),
            asset,
            name: format!("{} account for {} ({})", asset, customer.guid, run_id),
        };

        tracing::info!(
            "Creating trading account for asset {} and owner: {}",
            asset,
            customer.guid
        );
        let account = self
            .api
            .create_account(token, &request)
            .await
            .map_err(FlowError::upstream(step))?;
        tracing::info!("Created trading account: {}", account.guid);

        let guid = account.guid.clone();
        wait_for(
            step,
            &self.config.polling,
            account,
            || self.api.get_account(token, &guid),
            |a| match a.state {
                AccountState::Created => PollStatus::Done,
                _ => PollStatus::Pending,
            },
        )
        .await
    }

    async fn create_quote(&self, token: &AccessToken, customer: &Customer) -> FlowResult<Quote> {
        let trade_config = &self.config.trade;
        let request = QuoteRequest {
            customer_guid: customer.guid.clone(),
            symbol: trade_config.symbol.clone(),
            side: trade_config.side,
            amount: trade_config.amount,
        };

        tracing::info!(
            "Creating trading quote for {} of {}",
            request.symbol,
            request.amount
        );
        let quote = self
            .api
            .create_quote(token, &request)
            .await
            .map_err(FlowError::upstream(Step::CreateQuote))?;

        if quote.base_amount() != request.amount {
            tracing::warn!(
                "Quote {} moves {} instead of the requested {}",
                quote.guid,
                quote.base_amount(),
                request.amount
            );
        }

        tracing::info!(
            "📊 Quote {}: receive {} for {} (fee {} {}, price {}, expires {})",
            quote.guid,
            quote.receive_amount,
            quote.deliver_amount,
            quote.fee,
            quote.counter_asset,
            quote
                .price()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "n/a".to_string()),
            quote
                .expires_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string())
        );

        Ok(quote)
    }

    async fn execute_trade(&self, token: &AccessToken, quote: &Quote) -> FlowResult<Trade> {
        let step = Step::ExecuteTrade;

        if quote.is_expired_at(Utc::now()) {
            return Err(FlowError::QuoteExpired {
                quote: quote.guid.clone(),
                expired_at: quote.expires_at.unwrap_or_else(Utc::now),
            });
        }

        tracing::info!("Creating trade for quote {}", quote.guid);
        let trade = self
            .api
            .create_trade(token, &quote.guid)
            .await
            .map_err(FlowError::upstream(step))?;
        tracing::info!("Created trade {}", trade.guid);

        let guid = trade.guid.clone();
        let trade = wait_for(
            step,
            &self.config.polling,
            trade,
            || self.api.get_trade(token, &guid),
            |t| {
                if t.state.is_success() || t.state.is_failure() {
                    PollStatus::Done
                } else {
                    PollStatus::Pending
                }
            },
        )
        .await?;

        if trade.state.is_failure() {
            return Err(FlowError::TradeFailed {
                trade: trade.guid,
                state: trade.state,
                failure_code: trade.failure_code,
            });
        }

        Ok(trade)
    }

    async fn verify(
        &self,
        token: &AccessToken,
        account_guid: &str,
        expected: Decimal,
        asset: Asset,
    ) -> FlowResult<Decimal> {
        let account = self
            .api
            .get_account(token, account_guid)
            .await
            .map_err(FlowError::upstream(Step::VerifyBalance))?;

        tracing::info!(
            "Balance in the trading account: {} {} (available {})",
            account.platform_balance,
            asset,
            account.platform_available
        );

        verify_balance(
            expected,
            account.platform_balance,
            self.config.trade.balance_tolerance,
            asset,
        )?;

        Ok(account.platform_balance)
    }
}

fn advance(state: &mut FlowState, next: FlowState) {
    debug_assert!(next > *state);
    tracing::debug!("{} -> {}", state, next);
    *state = next;
}

/// Loads configuration, connects, and runs the flow.
///
/// `connect` is only invoked once the configuration is complete, so a missing
/// setting never results in network traffic.
pub async fn run_trade_flow<L, C, A>(lookup: L, connect: C) -> FlowResult<FlowReport>
where
    L: Fn(&str) -> Option<String>,
    C: FnOnce(&Config) -> ApiResult<A>,
    A: BankApi,
{
    let config = Config::from_lookup(lookup)?;
    tracing::debug!("Loaded configuration: {:?}", config);

    let api = connect(&config).map_err(FlowError::upstream(Step::Connect))?;

    TradeFlow::new(&api, &config).run().await
}
