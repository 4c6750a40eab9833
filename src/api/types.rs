use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiResult};
use super::models::{
    Account, AccountState, Asset, Customer, CustomerState, IdentityVerification, Quote, Trade,
    TradeSide, TradeState, VerificationOutcome, VerificationState,
};

pub const CUSTOMER_TYPE_INDIVIDUAL: &str = "individual";
pub const ACCOUNT_TYPE_TRADING: &str = "trading";
pub const QUOTE_PRODUCT_TYPE_TRADING: &str = "trading";
pub const VERIFICATION_TYPE_KYC: &str = "kyc";
pub const VERIFICATION_METHOD_ID_AND_SELFIE: &str = "id_and_selfie";
pub const EXPECTED_BEHAVIOUR_PASSED_IMMEDIATELY: &str = "passed_immediately";

#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    pub grant_type: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub scope: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
}

/// Error envelope returned by the bank API on 4xx/5xx.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    pub status: Option<u16>,
    pub error_message: Option<String>,
    pub message_code: Option<String>,
}

impl ErrorBody {
    /// Human readable message, falling back to the raw body when it is not the
    /// standard envelope.
    pub fn describe(raw: &str) -> String {
        match serde_json::from_str::<ErrorBody>(raw) {
            Ok(ErrorBody {
                error_message: Some(message),
                message_code,
                ..
            }) => match message_code {
                Some(code) => format!("{} ({})", message, code),
                None => message,
            },
            _ => raw.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostCustomer<'a> {
    #[serde(rename = "type")]
    pub customer_type: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerResponse {
    pub guid: String,
    #[serde(rename = "type")]
    pub customer_type: String,
    pub state: CustomerState,
}

impl From<CustomerResponse> for Customer {
    fn from(r: CustomerResponse) -> Self {
        Customer {
            guid: r.guid,
            customer_type: r.customer_type,
            state: r.state,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostIdentityVerification<'a> {
    #[serde(rename = "type")]
    pub verification_type: &'a str,
    pub method: &'a str,
    pub customer_guid: &'a str,
    pub expected_behaviours: Vec<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityVerificationResponse {
    pub guid: String,
    pub customer_guid: Option<String>,
    pub state: VerificationState,
    pub outcome: Option<VerificationOutcome>,
    pub persona_inquiry_id: Option<String>,
}

impl From<IdentityVerificationResponse> for IdentityVerification {
    fn from(r: IdentityVerificationResponse) -> Self {
        IdentityVerification {
            guid: r.guid,
            customer_guid: r.customer_guid,
            state: r.state,
            outcome: r.outcome,
            persona_inquiry_id: r.persona_inquiry_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostAccount<'a> {
    #[serde(rename = "type")]
    pub account_type: &'a str,
    pub customer_guid: &'a str,
    pub asset: &'a str,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub guid: String,
    pub customer_guid: Option<String>,
    pub asset: String,
    pub state: AccountState,
    /// Base units; absent while the account is still being stored.
    pub platform_balance: Option<i64>,
    pub platform_available: Option<i64>,
}

impl TryFrom<AccountResponse> for Account {
    type Error = ApiError;

    fn try_from(r: AccountResponse) -> ApiResult<Self> {
        let asset = Asset::from_code(&r.asset)
            .ok_or_else(|| ApiError::decode(format!("account {} has unknown asset {}", r.guid, r.asset)))?;

        Ok(Account {
            platform_balance: asset.from_base_units(r.platform_balance.unwrap_or(0)),
            platform_available: asset.from_base_units(r.platform_available.unwrap_or(0)),
            guid: r.guid,
            customer_guid: r.customer_guid,
            asset,
            state: r.state,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostQuote<'a> {
    pub product_type: &'a str,
    pub customer_guid: &'a str,
    pub symbol: &'a str,
    pub side: TradeSide,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receive_amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deliver_amount: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteResponse {
    pub guid: String,
    pub symbol: String,
    pub side: TradeSide,
    pub receive_amount: i64,
    pub deliver_amount: i64,
    #[serde(default)]
    pub fee: i64,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<QuoteResponse> for Quote {
    type Error = ApiError;

    fn try_from(r: QuoteResponse) -> ApiResult<Self> {
        let (receive_asset, deliver_asset, counter) = leg_assets(&r.symbol, r.side)?;

        Ok(Quote {
            receive_amount: receive_asset.from_base_units(r.receive_amount),
            deliver_amount: deliver_asset.from_base_units(r.deliver_amount),
            fee: counter.from_base_units(r.fee),
            counter_asset: counter,
            guid: r.guid,
            symbol: r.symbol,
            side: r.side,
            issued_at: r.issued_at,
            expires_at: r.expires_at,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PostTrade<'a> {
    pub quote_guid: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeResponse {
    pub guid: String,
    pub quote_guid: String,
    pub symbol: String,
    pub side: TradeSide,
    pub state: TradeState,
    pub receive_amount: i64,
    pub deliver_amount: i64,
    #[serde(default)]
    pub fee: i64,
    pub failure_code: Option<String>,
}

impl TryFrom<TradeResponse> for Trade {
    type Error = ApiError;

    fn try_from(r: TradeResponse) -> ApiResult<Self> {
        let (receive_asset, deliver_asset, counter) = leg_assets(&r.symbol, r.side)?;

        Ok(Trade {
            receive_amount: receive_asset.from_base_units(r.receive_amount),
            deliver_amount: deliver_asset.from_base_units(r.deliver_amount),
            fee: counter.from_base_units(r.fee),
            guid: r.guid,
            quote_guid: r.quote_guid,
            symbol: r.symbol,
            side: r.side,
            state: r.state,
            failure_code: r.failure_code,
        })
    }
}

/// Splits a `BASE-COUNTER` symbol into (receive, deliver, counter) assets for
/// the given side.
pub fn leg_assets(symbol: &str, side: TradeSide) -> ApiResult<(Asset, Asset, Asset)> {
    let (base, counter) = symbol
        .split_once('-')
        .and_then(|(b, c)| Some((Asset::from_code(b)?, Asset::from_code(c)?)))
        .ok_or_else(|| ApiError::decode(format!("unsupported symbol {}", symbol)))?;

    Ok(match side {
        TradeSide::Buy => (base, counter, counter),
        TradeSide::Sell => (counter, base, counter),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    #[test]
    fn test_quote_response_converts_base_units() {
        let raw = json!({
            "guid": "Q1",
            "symbol": "BTC-USD",
            "side": "buy",
            "receive_amount": 100000,
            "deliver_amount": 5150,
            "fee": 150,
            "issued_at": "2026-10-16T12:00:00Z",
            "expires_at": "2026-10-16T12:00:30Z"
        });
        let quote: Quote = serde_json::from_value::<QuoteResponse>(raw)
            .unwrap()
            .try_into()
            .unwrap();

        assert_eq!(quote.receive_amount, Decimal::new(1, 3));
        assert_eq!(quote.deliver_amount, Decimal::new(5150, 2));
        assert_eq!(quote.fee, Decimal::new(150, 2));
        assert_eq!(quote.price(), Some(Decimal::new(50_000, 0)));
        assert!(quote.expires_at.is_some());
    }

    #[test]
    fn test_unknown_states_do_not_fail_decoding() {
        let raw = json!({
            "guid": "T1",
            "quote_guid": "Q1",
            "symbol": "BTC-USD",
            "side": "buy",
            "state": "reticulating",
            "receive_amount": 100000,
            "deliver_amount": 5000
        });
        let trade: Trade = serde_json::from_value::<TradeResponse>(raw)
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(trade.state, TradeState::Unknown);
        assert_eq!(trade.fee, Decimal::ZERO);
    }

    #[test]
    fn test_account_with_unknown_asset_is_rejected() {
        let raw = json!({
            "guid": "A1",
            "asset": "XYZ",
            "state": "created",
            "platform_balance": 0
        });
        let result: ApiResult<Account> = serde_json::from_value::<AccountResponse>(raw)
            .unwrap()
            .try_into();
        assert!(matches!(result, Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_error_body_description() {
        let raw = r#"{"status":422,"error_message":"Quote has expired","message_code":"expired_quote"}"#;
        assert_eq!(ErrorBody::describe(raw), "Quote has expired (expired_quote)");
        assert_eq!(ErrorBody::describe("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn test_post_quote_omits_unset_amount() {
        let body = PostQuote {
            product_type: QUOTE_PRODUCT_TYPE_TRADING,
            customer_guid: "C1",
            symbol: "BTC-USD",
            side: TradeSide::Buy,
            receive_amount: Some(100_000),
            deliver_amount: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["side"], "buy");
        assert_eq!(value["receive_amount"], 100_000);
        assert!(value.get("deliver_amount").is_none());
    }
}
