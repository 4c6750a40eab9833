use rust_decimal::Decimal;

use super::error::{FlowError, FlowResult};
use crate::api::{Asset, TradeSide};

/// Balance the trading account should hold once the trade has settled.
///
/// Fees are charged in the counter asset, so the base-asset balance moves by
/// exactly the traded amount.
pub fn expected_balance(opening: Decimal, side: TradeSide, amount: Decimal) -> Decimal {
    match side {
        TradeSide::Buy => opening + amount,
        TradeSide::Sell => opening - amount,
    }
}

/// Compares the observed balance with the expectation. A zero tolerance
/// requires an exact match.
pub fn verify_balance(
    expected: Decimal,
    observed: Decimal,
    tolerance: Decimal,
    asset: Asset,
) -> FlowResult<()> {
    let difference = (observed - expected).abs();

    if difference > tolerance {
        tracing::error!(
            "❌ Balance mismatch: expected {} {}, observed {} {} (tolerance {})",
            expected,
            asset,
            observed,
            asset,
            tolerance
        );
        return Err(FlowError::Verification {
            expected,
            observed,
            asset,
        });
    }

    if !difference.is_zero() {
        tracing::warn!(
            "Balance differs from expectation by {} {} (within tolerance {})",
            difference,
            asset,
            tolerance
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc(units: i64) -> Decimal {
        Asset::BTC.from_base_units(units)
    }

    #[test]
    fn test_expected_balance_by_side() {
        assert_eq!(expected_balance(Decimal::ZERO, TradeSide::Buy, btc(100_000)), btc(100_000));
        assert_eq!(expected_balance(btc(300_000), TradeSide::Sell, btc(100_000)), btc(200_000));
    }

    #[test]
    fn test_exact_match_required_by_default() {
        assert!(verify_balance(btc(100_000), btc(100_000), Decimal::ZERO, Asset::BTC).is_ok());

        let err = verify_balance(btc(100_000), btc(90_000), Decimal::ZERO, Asset::BTC).unwrap_err();
        assert!(matches!(err, FlowError::Verification { .. }));

        // Scale differences are not mismatches
        assert!(verify_balance(Decimal::new(1, 3), Decimal::new(100, 5), Decimal::ZERO, Asset::BTC).is_ok());
    }

    #[test]
    fn test_tolerance_is_inclusive_and_symmetric() {
        let tolerance = Decimal::new(1, 4);

        assert!(verify_balance(btc(100_000), btc(90_000), tolerance, Asset::BTC).is_ok());
        assert!(verify_balance(btc(100_000), btc(110_000), tolerance, Asset::BTC).is_ok());
        assert!(verify_balance(btc(100_000), btc(80_000), tolerance, Asset::BTC).is_err());
    }
}
