//! Gold Loan Protocol Constants
//!
//! Vault contract addresses, loan parameters, and the supported bank
//! directory. All defined as configuration data for easy extension.

use aurum_core::Rupiah;

/// Loan-to-value bounds and presets (integer percent)
pub mod ltv {
    pub const MIN_PERCENT: u8 = 10;
    pub const MAX_PERCENT: u8 = 75;
    pub const DEFAULT_PERCENT: u8 = 50;

    /// Presets offered by the amount-entry form
    pub const PRESETS: &[u8] = &[10, 25, 50, 75];

    /// Clamp a requested LTV into the supported range.
    ///
    /// Out-of-range values are a caller bug; the calculator assumes its
    /// input is already clamped.
    pub fn clamp(percent: u8) -> u8 {
        percent.clamp(MIN_PERCENT, MAX_PERCENT)
    }
}

/// Fee configuration
pub mod fees {
    use super::Rupiah;

    /// Origination fee in basis points, deducted from the principal
    pub const LOAN_FEE_BPS: u32 = 50;

    /// Flat administration fee applied to repayment estimates
    pub const REPAY_ADMIN_FEE_BPS: u32 = 25;

    pub const BPS_DENOMINATOR: u64 = 10_000;

    /// Minimum principal accepted by the protocol
    pub const MIN_LOAN: Rupiah = aurum_core::constants::MIN_LOAN_RUPIAH;
}

/// Bank-detail form bounds
pub mod bank_account {
    pub const MIN_DIGITS: usize = 10;
    pub const MAX_DIGITS: usize = 12;
}

/// Redemption timing contracts
pub mod timing {
    use std::time::Duration;

    /// Success screen auto-dismiss countdown
    pub const SUCCESS_DISMISS: Duration = Duration::from_secs(3);

    /// Debounce window before a preview-quote refresh fires
    pub const QUOTE_DEBOUNCE: Duration = Duration::from_millis(250);

    /// Treasury-assisted settlement SLA, for display only
    pub const TREASURY_SETTLEMENT_HOURS: u64 = 24;
}

/// A supported destination bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankInfo {
    pub code: &'static str,
    pub name: &'static str,
}

/// Supported destination banks (national clearing codes)
pub const BANKS: &[BankInfo] = &[
    BankInfo { code: "002", name: "BRI" },
    BankInfo { code: "008", name: "Mandiri" },
    BankInfo { code: "009", name: "BNI" },
    BankInfo { code: "013", name: "Permata" },
    BankInfo { code: "014", name: "BCA" },
    BankInfo { code: "022", name: "CIMB Niaga" },
];

/// Look up a bank by clearing code
pub fn get_bank(code: &str) -> Option<&'static BankInfo> {
    BANKS.iter().find(|b| b.code == code)
}

/// Vault and token contract addresses for one deployment
#[derive(Debug, Clone)]
pub struct VaultContracts {
    /// Tokenized gold (the collateral token)
    pub gold_token: &'static str,
    /// Rupiah cash token (minted on borrow, burned on redemption)
    pub cash_token: &'static str,
    /// Lending vault (the approval spender and borrow counterparty)
    pub vault: &'static str,
}

/// Mainnet deployment
pub mod mainnet {
    use super::VaultContracts;

    pub const CONTRACTS: VaultContracts = VaultContracts {
        gold_token: "0x7a9fe22691c811ea339d9b73150e6911a5343dca",
        cash_token: "0x41b60c4d0e6c9d90b1ac0cb3fe5b04e2d0c52be1",
        vault: "0x9c1d3f8a5be27c8f43a1edb45b08a0a2e8f6ac19",
    };
}

/// Get the active deployment (mainnet only for now)
pub fn get_contracts() -> &'static VaultContracts {
    &mainnet::CONTRACTS
}
