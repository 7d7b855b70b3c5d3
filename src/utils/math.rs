//! Mathematical utility functions

use alloy::primitives::U256;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::str::FromStr;

pub fn pow10(n: i32) -> Decimal {
    match n {
        0 => dec!(1),
        6 => dec!(1_000_000),
        18 => dec!(1_000_000_000_000_000_000),
        _ => {
            let mut result = dec!(1);
            if n > 0 {
                for _ in 0..n {
                    result *= dec!(10);
                }
            } else {
                for _ in 0..(-n) {
                    result /= dec!(10);
                }
            }
            result
        }
    }
}

/// Human amount to integer base units, truncating dust below one unit.
/// `None` for negative amounts or on overflow.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Option<U256> {
    if amount.is_sign_negative() {
        return None;
    }
    let scaled = amount.checked_mul(pow10(decimals as i32))?.trunc();
    U256::from_str(&scaled.normalize().to_string()).ok()
}

/// Integer base units to a human amount. `None` when the value does not fit a `Decimal`.
pub fn from_base_units(value: U256, decimals: u8) -> Option<Decimal> {
    let raw = Decimal::from_str(&value.to_string()).ok()?;
    raw.checked_div(pow10(decimals as i32))
}

/// `value * (1 - fraction)` in base units, rounding down.
pub fn apply_slippage(value: U256, fraction: Decimal) -> U256 {
    let keep_bps = ((dec!(1) - fraction.clamp(dec!(0), dec!(1))) * dec!(10000))
        .trunc()
        .to_u64()
        .unwrap_or(0);
    value.saturating_mul(U256::from(keep_bps)) / U256::from(10_000u64)
}
