use bigdecimal::num_bigint::BigInt;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Quantize a monetary value to 2 decimal places, ties to even.
pub fn normalize_scale(value: &BigDecimal) -> BigDecimal {
    // with_scale truncates toward zero
    let truncated = value.with_scale(2);
    let remainder = (value - &truncated).abs();
    let half_cent = BigDecimal::new(BigInt::from(5), 3);
    let round_away = match remainder.cmp(&half_cent) {
        Ordering::Less => false,
        Ordering::Greater => true,
        Ordering::Equal => {
            let (cents, _) = truncated.as_bigint_and_exponent();
            &cents % BigInt::from(2) != BigInt::from(0)
        }
    };
    if !round_away {
        return truncated;
    }
    let cent = BigDecimal::new(BigInt::from(1), 2);
    if *value < BigDecimal::from(0) {
        truncated - cent
    } else {
        truncated + cent
    }
}

/// One cart line as priced at recompute time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub price: BigDecimal,
    /// Percentage off the unit price; `None` and zero both mean no discount.
    pub discount_pct: Option<BigDecimal>,
    pub quantity: u32,
}

impl LineItem {
    pub fn total(&self) -> BigDecimal {
        line_total(&self.price, self.discount_pct.as_ref(), self.quantity)
    }
}

/// `price * (1 - discount / 100) * quantity`, normalized.
pub fn line_total(price: &BigDecimal, discount_pct: Option<&BigDecimal>, quantity: u32) -> BigDecimal {
    let factor = match discount_pct {
        Some(pct) => BigDecimal::from(1) - pct / BigDecimal::from(100),
        None => BigDecimal::from(1),
    };
    normalize_scale(&(price * factor * BigDecimal::from(quantity)))
}

/// Sum of normalized line totals, normalized again. An empty cart totals `0.00`.
pub fn cart_total<'a, I>(lines: I) -> BigDecimal
where
    I: IntoIterator<Item = &'a LineItem>,
{
    let sum = lines
        .into_iter()
        .fold(BigDecimal::from(0), |acc, line| acc + line.total());
    normalize_scale(&sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn normalize_pads_and_rounds() {
        assert_eq!(normalize_scale(&dec("12")).to_string(), "12.00");
        assert_eq!(normalize_scale(&dec("12.3456")).to_string(), "12.35");
        assert_eq!(normalize_scale(&dec("12.3449")).to_string(), "12.34");
    }

    #[test]
    fn ties_go_to_even_cent() {
        assert_eq!(normalize_scale(&dec("2.675")).to_string(), "2.68");
        assert_eq!(normalize_scale(&dec("2.665")).to_string(), "2.66");
        assert_eq!(normalize_scale(&dec("-1.005")).to_string(), "-1.00");
        assert_eq!(normalize_scale(&dec("-1.015")).to_string(), "-1.02");
    }

    #[test]
    fn discounted_line_total() {
        assert_eq!(line_total(&dec("10.00"), None, 2).to_string(), "20.00");
        assert_eq!(line_total(&dec("20.00"), Some(&dec("25")), 2).to_string(), "30.00");
        assert_eq!(line_total(&dec("9.99"), Some(&dec("0")), 3).to_string(), "29.97");
    }

    #[test]
    fn cart_total_sums_lines() {
        let lines = vec![
            LineItem { price: dec("10.00"), discount_pct: None, quantity: 1 },
            LineItem { price: dec("20.00"), discount_pct: Some(dec("50")), quantity: 1 },
        ];
        assert_eq!(cart_total(&lines).to_string(), "20.00");
        assert_eq!(cart_total(&[]).to_string(), "0.00");
    }
}
