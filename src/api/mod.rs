pub mod auth;
pub mod bank;
pub mod error;
pub mod models;
pub mod types;

use async_trait::async_trait;

pub use auth::{AccessToken, Credentials};
pub use bank::BankClient;
pub use error::{ApiError, ApiResult};
pub use models::*;

/// Operations the trade flow needs from the bank platform.
///
/// Every call except [`BankApi::authenticate`] is made on behalf of the bank
/// identified by the token.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BankApi: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> ApiResult<AccessToken>;

    async fn create_customer(&self, token: &AccessToken, customer_type: &str)
        -> ApiResult<Customer>;

    async fn get_customer(&self, token: &AccessToken, guid: &str) -> ApiResult<Customer>;

    /// Starts a KYC verification that the sandbox resolves without user interaction.
    async fn create_identity_verification(
        &self,
        token: &AccessToken,
        customer_guid: &str,
    ) -> ApiResult<IdentityVerification>;

    async fn get_identity_verification(
        &self,
        token: &AccessToken,
        guid: &str,
    ) -> ApiResult<IdentityVerification>;

    async fn create_account(
        &self,
        token: &AccessToken,
        request: &AccountRequest,
    ) -> ApiResult<Account>;

    async fn get_account(&self, token: &AccessToken, guid: &str) -> ApiResult<Account>;

    async fn create_quote(&self, token: &AccessToken, request: &QuoteRequest) -> ApiResult<Quote>;

    async fn create_trade(&self, token: &AccessToken, quote_guid: &str) -> ApiResult<Trade>;

    async fn get_trade(&self, token: &AccessToken, guid: &str) -> ApiResult<Trade>;
}
