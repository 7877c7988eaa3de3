//! Fixed point values and the fee formula governing all payouts. Everything
//! here is pure; persistence and validation live in the service layer.

/// Paid to the uploader the first time each other account views a worksheet.
pub const VIEW_REWARD: i64 = 100;

/// Paid to the quiz creator on every play by a non-creator.
pub const QUIZ_PLAY_REWARD: i64 = 100;

/// Paid once per completed week to the top quiz scorer.
pub const WEEKLY_QUIZ_REWARD: i64 = 1000;

/// Largest accepted transfer amount. Anything above this is rejected before
/// the fee math runs, so `amount + fee` stays well inside `i64`.
pub const MAX_TRANSFER_AMOUNT: i64 = 1_000_000_000_000;

/// 8% transfer fee, rounded up. Integer math only: `amount * 0.08` is exactly
/// `amount * 8 / 100`, so the ceiling is taken over that quotient. The
/// intermediate product is widened to `i128` so the function is total over
/// `i64` even though callers cap the amount first.
pub fn transfer_fee(amount: i64) -> i64 {
    debug_assert!(amount > 0);
    ((amount as i128 * 8 + 99) / 100) as i64
}

/// What actually leaves the sender's balance: the transferred amount plus the
/// fee, which is burned rather than credited anywhere.
pub fn transfer_debit(amount: i64) -> i64 {
    amount.saturating_add(transfer_fee(amount))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fee_is_ceiling_of_eight_percent() {
        assert_eq!(transfer_fee(100), 8);
        assert_eq!(transfer_fee(1000), 80);

        // rounds up, never down
        assert_eq!(transfer_fee(1), 1);
        assert_eq!(transfer_fee(12), 1);
        assert_eq!(transfer_fee(13), 2);
        assert_eq!(transfer_fee(25), 2);
        assert_eq!(transfer_fee(99), 8);
    }

    #[test]
    fn test_fee_matches_float_ceiling() {
        for amount in 1..=10_000i64 {
            let expected = (amount as f64 * 0.08).ceil() as i64;
            assert_eq!(transfer_fee(amount), expected, "amount {amount}");
        }
    }

    #[test]
    fn test_debit_includes_fee() {
        // send 100, pay 108
        assert_eq!(transfer_debit(100), 108);
        assert_eq!(transfer_debit(1000), 1080);
    }

    #[test]
    fn test_fee_never_overflows_or_goes_negative() {
        // the 64-bit product would overflow here; the widened math must not
        let huge = i64::MAX / 8 + 1;
        assert_eq!(transfer_fee(huge), ((huge as i128 * 8 + 99) / 100) as i64);
        assert!(transfer_fee(huge) > 0);
        assert!(transfer_fee(i64::MAX) > 0);
        assert!(transfer_debit(i64::MAX) > 0);
    }

    #[test]
    fn test_fee_at_max_accepted_amount() {
        assert_eq!(transfer_fee(MAX_TRANSFER_AMOUNT), 80_000_000_000);
        assert_eq!(
            transfer_debit(MAX_TRANSFER_AMOUNT),
            MAX_TRANSFER_AMOUNT + 80_000_000_000
        );
    }
}
