//! Loan Calculator
//!
//! Pure math for loan sizing, fees, and collateral requirements.
//! No I/O - just calculations. Every function is deterministic so the
//! amount-entry form can recompute on each keystroke.

use aurum_core::{GoldUnits, Rupiah};

use crate::constants::{fees, ltv};
use crate::state::LoanCalculation;

/// Parse the raw amount-entry string into rupiah.
///
/// Thousand separators ('.' and ',') are tolerated; an empty field means
/// zero ("not yet entered"); anything else non-numeric is unparseable.
pub fn parse_loan_input(raw: &str) -> Option<Rupiah> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '.' && *c != ',')
        .collect();

    if cleaned.is_empty() {
        return Some(0);
    }
    cleaned.parse().ok()
}

/// Compute the full loan quote for the current inputs.
///
/// `collateral_spot_price` is rupiah per gold base unit and must be the
/// latest posted oracle value. `ltv_percent` must already be clamped to
/// the supported range.
pub fn compute_loan(
    loan_amount: Rupiah,
    ltv_percent: u8,
    collateral_spot_price: Rupiah,
    fee_bps: u32,
    available_collateral: GoldUnits,
) -> LoanCalculation {
    debug_assert!(
        (ltv::MIN_PERCENT..=ltv::MAX_PERCENT).contains(&ltv_percent),
        "LTV must be clamped before computing"
    );

    let max_loan = max_loan_for(available_collateral, ltv_percent, collateral_spot_price);

    if loan_amount == 0 {
        // Nothing entered yet: invalid but not an error
        return LoanCalculation {
            loan_amount: 0,
            collateral_required: 0,
            collateral_value: 0,
            fee: 0,
            amount_received: 0,
            max_loan,
            is_valid: false,
            error_message: None,
        };
    }

    if collateral_spot_price == 0 {
        return LoanCalculation {
            loan_amount,
            collateral_required: 0,
            collateral_value: 0,
            fee: 0,
            amount_received: 0,
            max_loan,
            is_valid: false,
            error_message: Some("Collateral price unavailable".to_string()),
        };
    }

    // Collateral value that must back the loan at the chosen LTV, then the
    // token units delivering at least that value. Both round up so the
    // backing invariant holds after integer division.
    let required_value = div_ceil(loan_amount as u128 * 100, ltv_percent as u128);
    let collateral_required = div_ceil(required_value, collateral_spot_price as u128) as GoldUnits;
    let collateral_value = collateral_required as u128 * collateral_spot_price as u128;

    let fee = (loan_amount as u128 * fee_bps as u128 / fees::BPS_DENOMINATOR as u128) as Rupiah;
    let amount_received = loan_amount - fee;

    let error_message = if loan_amount < fees::MIN_LOAN {
        Some(format!("Minimum loan is {} rupiah", fees::MIN_LOAN))
    } else if loan_amount > max_loan {
        Some(format!(
            "Amount exceeds your maximum loan of {} rupiah",
            max_loan
        ))
    } else {
        None
    };

    LoanCalculation {
        loan_amount,
        collateral_required,
        collateral_value: collateral_value as Rupiah,
        fee,
        amount_received,
        max_loan,
        is_valid: error_message.is_none(),
        error_message,
    }
}

/// Largest principal the user's collateral supports at the given LTV
pub fn max_loan_for(
    available_collateral: GoldUnits,
    ltv_percent: u8,
    collateral_spot_price: Rupiah,
) -> Rupiah {
    (available_collateral as u128 * collateral_spot_price as u128 * ltv_percent as u128 / 100)
        as Rupiah
}

/// Repayment estimate for an outstanding principal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepayBreakdown {
    pub principal: Rupiah,
    pub admin_fee: Rupiah,
    pub total_due: Rupiah,
}

/// Total owed to close a position, principal plus the flat admin fee
pub fn repay_estimate(principal: Rupiah) -> RepayBreakdown {
    let admin_fee = (principal as u128 * fees::REPAY_ADMIN_FEE_BPS as u128
        / fees::BPS_DENOMINATOR as u128) as Rupiah;
    RepayBreakdown {
        principal,
        admin_fee,
        total_due: principal + admin_fee,
    }
}

fn div_ceil(numerator: u128, denominator: u128) -> u128 {
    (numerator + denominator - 1) / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICE: Rupiah = 1_000; // rupiah per gold base unit
    const BALANCE: GoldUnits = 1_000_000;

    #[test]
    fn test_scenario_ten_million_at_thirty_percent() {
        let calc = compute_loan(10_000_000, 30, PRICE, 50, BALANCE);

        // (10_000_000 / 0.30) / 1000, rounded up
        assert_eq!(calc.collateral_required, 33_334);
        assert_eq!(calc.fee, 50_000);
        assert_eq!(calc.amount_received, 9_950_000);
        assert!(calc.is_valid);
        assert!(calc.error_message.is_none());
    }

    #[test]
    fn test_received_plus_fee_equals_principal() {
        for amount in [10_000u64, 123_457, 10_000_000, 249_999_999] {
            let calc = compute_loan(amount, 50, PRICE, 50, u64::MAX / PRICE);
            assert_eq!(calc.amount_received + calc.fee, amount);
        }
    }

    #[test]
    fn test_backing_invariant_holds_when_valid() {
        for ltv in [10u8, 25, 30, 50, 75] {
            let calc = compute_loan(10_000_000, ltv, PRICE, 50, BALANCE);
            if calc.is_valid {
                assert!(
                    calc.collateral_value as u128 * ltv as u128 / 100 >= calc.loan_amount as u128,
                    "backing too thin at LTV {}",
                    ltv
                );
            }
        }
    }

    #[test]
    fn test_max_loan_monotone_in_ltv() {
        let mut last = 0;
        for ltv in 10u8..=75 {
            let max = max_loan_for(BALANCE, ltv, PRICE);
            assert!(max >= last, "max loan decreased at LTV {}", ltv);
            last = max;
        }
    }

    #[test]
    fn test_zero_amount_is_invalid_without_error() {
        let calc = compute_loan(0, 50, PRICE, 50, BALANCE);
        assert!(!calc.is_valid);
        assert!(calc.error_message.is_none());
        assert_eq!(calc.max_loan, max_loan_for(BALANCE, 50, PRICE));
    }

    #[test]
    fn test_exceeding_max_loan_is_invalid_with_message() {
        let max = max_loan_for(BALANCE, 50, PRICE);
        let calc = compute_loan(max + 1, 50, PRICE, 50, BALANCE);
        assert!(!calc.is_valid);
        assert!(calc.error_message.is_some());
    }

    #[test]
    fn test_below_minimum_is_invalid() {
        let calc = compute_loan(5_000, 50, PRICE, 50, BALANCE);
        assert!(!calc.is_valid);
        assert!(calc
            .error_message
            .as_deref()
            .unwrap()
            .contains("Minimum loan"));
    }

    #[test]
    fn test_deterministic_for_identical_inputs() {
        let a = compute_loan(12_345_678, 30, PRICE, 50, BALANCE);
        let b = compute_loan(12_345_678, 30, PRICE, 50, BALANCE);
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_loan_input() {
        assert_eq!(parse_loan_input(""), Some(0));
        assert_eq!(parse_loan_input("  "), Some(0));
        assert_eq!(parse_loan_input("10000000"), Some(10_000_000));
        assert_eq!(parse_loan_input("10.000.000"), Some(10_000_000));
        assert_eq!(parse_loan_input("1,500,000"), Some(1_500_000));
        assert_eq!(parse_loan_input("abc"), None);
        assert_eq!(parse_loan_input("-5"), None);
    }

    #[test]
    fn test_repay_estimate() {
        let breakdown = repay_estimate(10_000_000);
        assert_eq!(breakdown.admin_fee, 25_000);
        assert_eq!(breakdown.total_due, 10_025_000);
    }

    #[test]
    fn test_zero_price_is_invalid() {
        let calc = compute_loan(10_000_000, 50, 0, 50, BALANCE);
        assert!(!calc.is_valid);
        assert!(calc
            .error_message
            .as_deref()
            .unwrap()
            .contains("price unavailable"));
    }
}
