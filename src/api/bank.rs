use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::auth::{self, AccessToken, Credentials};
use super::error::{ApiError, ApiResult};
use super::models::*;
use super::types::*;
use super::BankApi;
use crate::core::config::BankConfig;

/// HTTP client for the bank platform.
pub struct BankClient {
    client: Client,
    identity_url: String,
    bank_url: String,
}

impl BankClient {
    pub fn new(config: &BankConfig) -> ApiResult<Self> {
        let client = Client::builder().timeout(config.http_timeout).build()?;

        Ok(Self::with_urls(client, config.identity_url(), config.bank_url()))
    }

    /// Builds a client against explicit hosts instead of deriving them from the base URL.
    pub fn with_urls(
        client: Client,
        identity_url: impl Into<String>,
        bank_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            identity_url: identity_url.into().trim_end_matches('/').to_string(),
            bank_url: bank_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn request<B, T>(
        &self,
        method: Method,
        endpoint: &str,
        token: &AccessToken,
        body: Option<&B>,
    ) -> ApiResult<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.bank_url, endpoint);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(token.secret())
            .header("Accept", "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Bank API error: {} {} -> {} - {}", method, endpoint, status, error_text);
            return Err(ApiError::from_status(status, ErrorBody::describe(&error_text)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::decode(format!("{} {}: {}", method, endpoint, e)))
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, token: &AccessToken) -> ApiResult<T> {
        self.request::<(), T>(Method::GET, endpoint, token, None)
            .await
    }

    async fn post<B, T>(&self, endpoint: &str, token: &AccessToken, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.request(Method::POST, endpoint, token, Some(body)).await
    }
}

#[async_trait]
impl BankApi for BankClient {
    async fn authenticate(&self, credentials: &Credentials) -> ApiResult<AccessToken> {
        auth::request_token(&self.client, &self.identity_url, credentials).await
    }

    async fn create_customer(
        &self,
        token: &AccessToken,
        customer_type: &str,
    ) -> ApiResult<Customer> {
        let body = PostCustomer { customer_type };
        let customer: CustomerResponse = self.post("/api/customers", token, &body).await?;
        Ok(customer.into())
    }

    async fn get_customer(&self, token: &AccessToken, guid: &str) -> ApiResult<Customer> {
        let customer: CustomerResponse = self
            .get(&format!("/api/customers/{}", guid), token)
            .await?;
        Ok(customer.into())
    }

    async fn create_identity_verification(
        &self,
        token: &AccessToken,
        customer_guid: &str,
    ) -> ApiResult<IdentityVerification> {
        let body = PostIdentityVerification {
            verification_type: VERIFICATION_TYPE_KYC,
            method: VERIFICATION_METHOD_ID_AND_SELFIE,
            customer_guid,
            // The sandbox cannot drive the interactive document flow
            expected_behaviours: vec![EXPECTED_BEHAVIOUR_PASSED_IMMEDIATELY],
        };
        let verification: IdentityVerificationResponse = self
            .post("/api/identity_verifications", token, &body)
            .await?;
        Ok(verification.into())
    }

    async fn get_identity_verification(
        &self,
        token: &AccessToken,
        guid: &str,
    ) -> ApiResult<IdentityVerification> {
        let verification: IdentityVerificationResponse = self
            .get(&format!("/api/identity_verifications/{}", guid), token)
            .await?;
        Ok(verification.into())
    }

    async fn create_account(
        &self,
        token: &AccessToken,
        request: &AccountRequest,
    ) -> ApiResult<Account> {
        let body = PostAccount {
            account_type: ACCOUNT_TYPE_TRADING,
            customer_guid: &request.customer_guid,
            asset: request.asset.code,
            name: request.name.clone(),
        };
        let account: AccountResponse = self.post("/api/accounts", token, &body).await?;
        account.try_into()
    }

    async fn get_account(&self, token: &AccessToken, guid: &str) -> ApiResult<Account> {
        let account: AccountResponse = self
            .get(&format!("/api/accounts/{}", guid), token)
            .await?;
        account.try_into()
    }

    async fn create_quote(&self, token: &AccessToken, request: &QuoteRequest) -> ApiResult<Quote> {
        let (receive_asset, deliver_asset, _) = leg_assets(&request.symbol, request.side)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let base_asset = match request.side {
            TradeSide::Buy => receive_asset,
            TradeSide::Sell => deliver_asset,
        };
        let units = base_asset.to_base_units(request.amount).ok_or_else(|| {
            ApiError::InvalidRequest(format!(
                "{} {} is not representable in {} base units",
                request.amount, base_asset, base_asset
            ))
        })?;

        let (receive_amount, deliver_amount) = match request.side {
            TradeSide::Buy => (Some(units), None),
            TradeSide::Sell => (None, Some(units)),
        };

        let body = PostQuote {
            product_type: QUOTE_PRODUCT_TYPE_TRADING,
            customer_guid: &request.customer_guid,
            symbol: &request.symbol,
            side: request.side,
            receive_amount,
            deliver_amount,
        };
        let quote: QuoteResponse = self.post("/api/quotes", token, &body).await?;
        quote.try_into()
    }

    async fn create_trade(&self, token: &AccessToken, quote_guid: &str) -> ApiResult<Trade> {
        let body = PostTrade { quote_guid };
        let trade: TradeResponse = self.post("/api/trades", token, &body).await?;
        trade.try_into()
    }

    async fn get_trade(&self, token: &AccessToken, guid: &str) -> ApiResult<Trade> {
        let trade: TradeResponse = self
            .get(&format!("/api/trades/{}", guid), token)
            .await?;
        trade.try_into()
    }
}
