//! Value objects returned by the bank API.
//!
//! Amounts are carried as [`Decimal`] in whole units of their asset (BTC, USD).
//! The wire format uses integer base units; see [`Asset`] for the conversion.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Asset {
    pub code: &'static str,
    /// Decimal places of one base unit (satoshi for BTC, cent for USD).
    pub decimals: u32,
}

impl Asset {
    pub const BTC: Asset = Asset { code: "BTC", decimals: 8 };
    pub const USD: Asset = Asset { code: "USD", decimals: 2 };
    pub const USDC: Asset = Asset { code: "USDC", decimals: 6 };

    const ALL: [Asset; 3] = [Asset::BTC, Asset::USD, Asset::USDC];

    pub fn from_code(code: &str) -> Option<Asset> {
        Self::ALL
            .iter()
            .find(|asset| asset.code.eq_ignore_ascii_case(code))
            .copied()
    }

    pub fn from_base_units(&self, units: i64) -> Decimal {
        Decimal::new(units, self.decimals)
    }

    /// Converts a whole-unit amount into base units. Returns `None` when the
    /// amount has more precision than the asset supports or does not fit.
    pub fn to_base_units(&self, amount: Decimal) -> Option<i64> {
        let scaled = amount.checked_mul(Decimal::from(10_i64.checked_pow(self.decimals)?))?;
        if scaled.fract() != Decimal::ZERO {
            return None;
        }
        scaled.trunc().to_i64()
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            other => Err(format!("unknown trade side '{}', expected buy or sell", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerState {
    Storing,
    Unverified,
    Verified,
    Rejected,
    Frozen,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    Storing,
    Waiting,
    Pending,
    Reviewing,
    Expired,
    Completed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Passed,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountState {
    Storing,
    Created,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeState {
    Storing,
    Pending,
    Executing,
    Settling,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl TradeState {
    /// `settling` is terminal in sandbox; production trades continue to `completed`.
    pub fn is_success(&self) -> bool {
        matches!(self, TradeState::Settling | TradeState::Completed)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TradeState::Failed | TradeState::Cancelled)
    }
}

macro_rules! impl_state_display {
    ($($ty:ty),+) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    let rendered = serde_json::to_value(self)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_owned))
                        .unwrap_or_else(|| format!("{:?}", self));
                    f.write_str(&rendered)
                }
            }
        )+
    };
}

impl_state_display!(
    CustomerState,
    VerificationState,
    VerificationOutcome,
    AccountState,
    TradeState
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub guid: String,
    pub customer_type: String,
    pub state: CustomerState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityVerification {
    pub guid: String,
    pub customer_guid: Option<String>,
    pub state: VerificationState,
    pub outcome: Option<VerificationOutcome>,
    pub persona_inquiry_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub guid: String,
    pub customer_guid: Option<String>,
    pub asset: Asset,
    pub state: AccountState,
    pub platform_balance: Decimal,
    pub platform_available: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub guid: String,
    pub symbol: String,
    pub side: TradeSide,
    pub receive_amount: Decimal,
    pub deliver_amount: Decimal,
    /// Charged in the counter asset.
    pub fee: Decimal,
    pub counter_asset: Asset,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Quote {
    /// Amount of the base asset moved by the quote.
    pub fn base_amount(&self) -> Decimal {
        match self.side {
            TradeSide::Buy => self.receive_amount,
            TradeSide::Sell => self.deliver_amount,
        }
    }

    /// Unit price in the counter asset, net of fee.
    pub fn price(&self) -> Option<Decimal> {
        let base = self.base_amount();
        if base.is_zero() {
            return None;
        }
        let counter = match self.side {
            TradeSide::Buy => self.deliver_amount - self.fee,
            TradeSide::Sell => self.receive_amount + self.fee,
        };
        counter
            .checked_div(base)
            .map(|p| p.round_dp(self.counter_asset.decimals))
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expiry| expiry <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub guid: String,
    pub quote_guid: String,
    pub symbol: String,
    pub side: TradeSide,
    pub state: TradeState,
    pub receive_amount: Decimal,
    pub deliver_amount: Decimal,
    pub fee: Decimal,
    pub failure_code: Option<String>,
}

/// Parameters for opening an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRequest {
    pub customer_guid: String,
    pub asset: Asset,
    pub name: String,
}

/// Parameters for a trading quote. `amount` is always expressed in the base
/// asset of `symbol`: received on a buy, delivered on a sell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub customer_guid: String,
    pub symbol: String,
    pub side: TradeSide,
    pub amount: Decimal,
}
