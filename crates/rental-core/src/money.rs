//! # Money
//!
//! Amounts are Colombian pesos held as exact decimals. Rounding only
//! happens when an amount is rendered for display.

use rust_decimal::{Decimal, RoundingStrategy};

/// IVA applied to every quote (19%).
pub const IVA_RATE: Decimal = Decimal::from_parts(19, 0, 0, false, 2);

/// Round to whole pesos, half away from zero.
pub fn round_cop(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount the way the storefront shows prices (`es-CO`, no
/// fraction digits), e.g. `$ 1.041.250`.
pub fn format_cop(amount: Decimal) -> String {
    let rounded = round_cop(amount);
    let digits = rounded.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-$ {}", grouped)
    } else {
        format!("$ {}", grouped)
    }
}
