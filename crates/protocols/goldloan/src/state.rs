//! Loan Flow State Types
//!
//! Data structures for the borrow-then-redeem wizard: the live quote, the
//! per-session wizard state, and the flow lifecycle states.

use serde::{Deserialize, Serialize};

use aurum_core::{FlowError, GoldUnits, Rupiah};

use crate::constants::{bank_account, get_bank, ltv};

/// Live loan quote, recomputed on every input change. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanCalculation {
    /// Requested principal in rupiah
    pub loan_amount: Rupiah,
    /// Gold base units that must be locked as collateral
    pub collateral_required: GoldUnits,
    /// The locked collateral priced in rupiah
    pub collateral_value: Rupiah,
    /// Origination fee deducted from the principal
    pub fee: Rupiah,
    /// What actually lands in the user's hands
    pub amount_received: Rupiah,
    /// Largest principal the user's collateral balance supports
    pub max_loan: Rupiah,
    pub is_valid: bool,
    /// Present iff invalid for a reason worth showing (zero input is not)
    pub error_message: Option<String>,
}

/// Which page of the wizard the user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    AmountEntry,
    BankDetails,
}

/// Lifecycle state of one borrow-then-redeem flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowState {
    AmountEntry,
    /// Allowance below the collateral requirement; approval must confirm
    /// and a fresh allowance read must show sufficiency before borrowing
    ApprovalPending,
    Borrowing,
    BorrowConfirmed,
    BankDetails,
    Burning,
    BackendSubmitting,
    Success {
        reference: Option<String>,
    },
    /// Terminal but recoverable: retry returns to the confirm step, close
    /// abandons the session. Confirmed on-chain effects stay committed.
    Failed {
        message: String,
    },
}

impl FlowState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AmountEntry => "amount_entry",
            Self::ApprovalPending => "approval_pending",
            Self::Borrowing => "borrowing",
            Self::BorrowConfirmed => "borrow_confirmed",
            Self::BankDetails => "bank_details",
            Self::Burning => "burning",
            Self::BackendSubmitting => "backend_submitting",
            Self::Success { .. } => "success",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Failed { .. })
    }
}

/// Destination bank details captured in step 2
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
}

impl BankDetails {
    /// Validate the form: known bank, 10-12 digit numeric account number,
    /// non-empty trimmed account name. Pure, no I/O.
    pub fn validate(&self) -> Result<(), FlowError> {
        if get_bank(&self.bank_code).is_none() {
            return Err(FlowError::InvalidBankDetails {
                message: format!("Unknown bank code: {}", self.bank_code),
            });
        }

        let digits = self.account_number.len();
        if !(bank_account::MIN_DIGITS..=bank_account::MAX_DIGITS).contains(&digits) {
            return Err(FlowError::InvalidBankDetails {
                message: format!(
                    "Account number must be {}-{} digits",
                    bank_account::MIN_DIGITS,
                    bank_account::MAX_DIGITS
                ),
            });
        }
        if !self.account_number.chars().all(|c| c.is_ascii_digit()) {
            return Err(FlowError::InvalidBankDetails {
                message: "Account number must be numeric".to_string(),
            });
        }

        if self.account_name.trim().is_empty() {
            return Err(FlowError::InvalidBankDetails {
                message: "Account name is required".to_string(),
            });
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Display name of the selected bank
    pub fn bank_name(&self) -> &'static str {
        get_bank(&self.bank_code).map(|b| b.name).unwrap_or("")
    }
}

/// Immutable snapshot captured when the borrow confirms.
///
/// Step 2 reads this instead of live balances: on-chain state keeps moving
/// after the transaction, the loan the user took does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedLoan {
    pub loan_amount: Rupiah,
    pub amount_received: Rupiah,
}

/// In-memory state for one wizard session.
///
/// Created when the flow starts; discarded on close or when the final
/// submission succeeds and the success screen dismisses.
#[derive(Debug, Clone)]
pub struct WizardSession {
    pub step: WizardStep,
    pub loan_input: String,
    pub selected_ltv: u8,
    pub bank_details: Option<BankDetails>,
    /// Set exactly once, when the borrow transaction confirms
    pub completed_loan: Option<CompletedLoan>,
}

impl WizardSession {
    pub fn new() -> Self {
        Self {
            step: WizardStep::AmountEntry,
            loan_input: String::new(),
            selected_ltv: ltv::DEFAULT_PERCENT,
            bank_details: None,
            completed_loan: None,
        }
    }
}

impl Default for WizardSession {
    fn default() -> Self {
        Self::new()
    }
}
