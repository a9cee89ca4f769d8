use crate::error::BotError;
use crate::Result;

/// Round a quantity down to a multiple of the lot step
pub fn round_to_lot_step(quantity: f64, lot_step: f64) -> f64 {
    (quantity / lot_step).floor() * lot_step
}

/// Fractional digits needed to print quantities at this lot step
///
/// A step of 0.001 needs three decimals; a step of 1.0 needs none.
/// Steps finer than 1e-8 are clamped to eight digits, the finest
/// precision the exchange accepts.
pub fn step_precision(lot_step: f64) -> usize {
    let formatted = format!("{lot_step:.8}");
    let trimmed = formatted.trim_end_matches('0');
    match trimmed.split_once('.') {
        Some((_, frac)) => frac.len(),
        None => 0,
    }
}

/// Format a quantity the way the order endpoint expects it
pub fn format_quantity(quantity: f64, lot_step: f64) -> String {
    format!("{quantity:.prec$}", prec = step_precision(lot_step))
}

/// Quantity for a market buy
///
/// Buys spend a fixed, operator-chosen quantity; no balance lookup
/// is involved.
pub fn size_buy(fixed_quantity: f64) -> f64 {
    fixed_quantity
}

/// Quantity for a market sell: the full balance, floored to the lot step
///
/// Fails when the floored quantity is not positive, which covers both
/// a zero balance and dust below one lot step.
pub fn size_sell(available: f64, lot_step: f64) -> Result<f64> {
    let quantity = round_to_lot_step(available, lot_step);
    if quantity <= 0.0 {
        return Err(BotError::InsufficientBalance {
            available,
            lot_step,
        });
    }
    Ok(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_lot_step_exact_multiple() {
        assert_eq!(round_to_lot_step(0.1023, 0.0001), 0.1023);
    }

    #[test]
    fn test_round_to_lot_step_floors_remainder() {
        assert_eq!(round_to_lot_step(0.10236, 0.0001), 0.1023);
    }

    #[test]
    fn test_size_sell_full_balance() {
        assert_eq!(size_sell(0.1023, 0.0001).unwrap(), 0.1023);
    }

    #[test]
    fn test_size_sell_dust_below_step_fails() {
        let err = size_sell(0.00003, 0.0001).unwrap_err();
        assert!(matches!(err, BotError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_size_sell_zero_balance_fails() {
        assert!(size_sell(0.0, 0.0001).is_err());
    }

    #[test]
    fn test_size_sell_error_carries_inputs() {
        let err = size_sell(0.00003, 0.0001).unwrap_err();
        match err {
            BotError::InsufficientBalance {
                available,
                lot_step,
            } => {
                assert_eq!(available, 0.00003);
                assert_eq!(lot_step, 0.0001);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_size_buy_is_passthrough() {
        assert_eq!(size_buy(0.0013), 0.0013);
    }

    #[test]
    fn test_step_precision() {
        assert_eq!(step_precision(0.0001), 4);
        assert_eq!(step_precision(0.001), 3);
        assert_eq!(step_precision(0.1), 1);
        assert_eq!(step_precision(1.0), 0);
        assert_eq!(step_precision(0.00000001), 8);
    }

    #[test]
    fn test_format_quantity_matches_step() {
        assert_eq!(format_quantity(0.1023, 0.0001), "0.1023");
        assert_eq!(format_quantity(0.0013, 0.00001), "0.00130");
        assert_eq!(format_quantity(5.0, 1.0), "5");
    }

    #[test]
    fn test_format_quantity_truncates_not_rounds_up_display() {
        // The quantity is already floored to the step before
        // formatting, so printing never reintroduces dust.
        let qty = size_sell(0.10236, 0.0001).unwrap();
        assert_eq!(format_quantity(qty, 0.0001), "0.1023");
    }
}
