//! Borrow-then-redeem flow
//!
//! Drives one user session through amount entry, approval gating, the
//! deposit-and-borrow transaction, bank-detail capture, the cash-token burn,
//! and the backend redemption submission.
//!
//! The flow is single-writer: every mutating action takes `&mut self` and
//! sets a busy flag for its async span, so triggers stay disabled while
//! their operation is in flight. Progression past the approval step is
//! gated on a fresh allowance read, never on the approval transaction's
//! success flag alone. A confirmed burn hash is kept across backend
//! failures so a retry resubmits without burning twice.

use serde::Serialize;
use tokio::sync::mpsc;

use aurum_core::{Address, ChainError, FlowError, Rupiah, TokenId, TxHash};
use chain_client::{await_confirmed, ChainGateway, TxPhase, WalletSession};
use redemption_client::{RedeemRequest, RedemptionBackend};

use crate::calculator::{compute_loan, parse_loan_input};
use crate::constants::{fees, ltv, VaultContracts};
use crate::state::{
    BankDetails, CompletedLoan, FlowState, LoanCalculation, WizardSession, WizardStep,
};

/// Which operation an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Approve,
    Borrow,
    Burn,
    Submit,
}

/// Events emitted on the channel handed out at construction.
///
/// This is the flow's only notification surface; the presentation layer
/// subscribes instead of reading ambient state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum FlowEvent {
    State { state: FlowState },
    TxPhase { op: OpKind, phase: TxPhase },
    InlineError { op: OpKind, message: String },
    SessionClosed,
}

/// Result of an approve action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproveOutcome {
    /// Fresh allowance covers the collateral requirement
    Ready,
    /// Approval confirmed but the re-read still shows the old allowance;
    /// progression stays blocked until a later read sees the new value
    AllowanceStale,
}

/// Result of a borrow action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowOutcome {
    /// Allowance below the requirement; routed to the approval step
    ApprovalRequired,
    Confirmed(CompletedLoan),
}

/// Serializable view of the flow for the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct FlowSnapshot {
    pub state: FlowState,
    pub step: WizardStep,
    pub calculation: LoanCalculation,
    pub needs_approval: bool,
    pub busy: bool,
    pub selected_ltv: u8,
    pub burn_tx: Option<TxHash>,
    pub completed_loan: Option<CompletedLoan>,
}

/// One borrow-then-redeem session over a chain gateway and the redemption
/// backend.
pub struct LoanFlow<C, B> {
    chain: C,
    backend: B,
    wallet: Address,
    gold_token: TokenId,
    cash_token: TokenId,
    vault: Address,
    fee_bps: u32,

    session: WizardSession,
    state: FlowState,

    /// Latest oracle price, rupiah per gold base unit
    spot_price: Rupiah,
    /// Last fetched gold balance of the wallet
    collateral_balance: u64,
    /// Last fetched vault allowance; approval need is derived from this,
    /// never stored as its own flag
    allowance: u64,

    burn_tx: Option<TxHash>,
    busy: bool,
    events: mpsc::UnboundedSender<FlowEvent>,
}

impl<C, B> LoanFlow<C, B>
where
    C: ChainGateway,
    B: RedemptionBackend,
{
    /// Create a flow for a connected wallet. Returns the flow and the
    /// receiving end of its event channel.
    pub fn new(
        chain: C,
        backend: B,
        wallet: &WalletSession,
        contracts: &VaultContracts,
    ) -> Result<(Self, mpsc::UnboundedReceiver<FlowEvent>), FlowError> {
        let address = wallet.address().ok_or(FlowError::NotConnected)?.clone();
        let (events, rx) = mpsc::unbounded_channel();

        Ok((
            Self {
                chain,
                backend,
                wallet: address,
                gold_token: TokenId::new(contracts.gold_token),
                cash_token: TokenId::new(contracts.cash_token),
                vault: Address::new(contracts.vault),
                fee_bps: fees::LOAN_FEE_BPS,
                session: WizardSession::new(),
                state: FlowState::AmountEntry,
                spot_price: 0,
                collateral_balance: 0,
                allowance: 0,
                burn_tx: None,
                busy: false,
                events,
            },
            rx,
        ))
    }

    // ─── Read surface ────────────────────────────────────────────────────

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn step(&self) -> WizardStep {
        self.session.step
    }

    pub fn busy(&self) -> bool {
        self.busy
    }

    pub fn burn_tx(&self) -> Option<&TxHash> {
        self.burn_tx.as_ref()
    }

    pub fn completed_loan(&self) -> Option<CompletedLoan> {
        self.session.completed_loan
    }

    /// Recompute the live quote from the current inputs. Pure; safe to call
    /// on every keystroke.
    pub fn calculation(&self) -> LoanCalculation {
        match parse_loan_input(&self.session.loan_input) {
            Some(amount) => compute_loan(
                amount,
                self.session.selected_ltv,
                self.spot_price,
                self.fee_bps,
                self.collateral_balance,
            ),
            None => LoanCalculation {
                loan_amount: 0,
                collateral_required: 0,
                collateral_value: 0,
                fee: 0,
                amount_received: 0,
                max_loan: 0,
                is_valid: false,
                error_message: Some("Amount must be a number".to_string()),
            },
        }
    }

    /// Derived, recomputed against the last fetched allowance
    pub fn needs_approval(&self) -> bool {
        let calc = self.calculation();
        calc.is_valid && self.allowance < calc.collateral_required
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            state: self.state.clone(),
            step: self.session.step,
            calculation: self.calculation(),
            needs_approval: self.needs_approval(),
            busy: self.busy,
            selected_ltv: self.session.selected_ltv,
            burn_tx: self.burn_tx.clone(),
            completed_loan: self.session.completed_loan,
        }
    }

    // ─── Step 1: amount entry ────────────────────────────────────────────

    /// Refresh oracle price, collateral balance, and allowance
    pub async fn refresh_market(&mut self) -> Result<(), FlowError> {
        self.spot_price = self.chain.gold_spot_price().await.map_err(chain_err)?;
        self.collateral_balance = self
            .chain
            .balance_of(&self.gold_token, &self.wallet)
            .await
            .map_err(chain_err)?;
        self.allowance = self
            .chain
            .allowance(&self.gold_token, &self.wallet, &self.vault)
            .await
            .map_err(chain_err)?;
        Ok(())
    }

    pub fn set_loan_input(&mut self, raw: &str) -> Result<LoanCalculation, FlowError> {
        self.guard_amount_editable("set_amount")?;
        self.session.loan_input = raw.to_string();
        // Approval need must be re-derived for the new size
        self.transition(FlowState::AmountEntry);
        Ok(self.calculation())
    }

    pub fn set_ltv(&mut self, percent: u8) -> Result<LoanCalculation, FlowError> {
        self.guard_amount_editable("set_ltv")?;
        self.session.selected_ltv = ltv::clamp(percent);
        self.transition(FlowState::AmountEntry);
        Ok(self.calculation())
    }

    /// Issue the collateral approval. Only reachable from the approval
    /// step; idempotently retryable.
    pub async fn approve(&mut self) -> Result<ApproveOutcome, FlowError> {
        self.guard_not_busy()?;
        if self.state != FlowState::ApprovalPending {
            return Err(self.not_allowed("approve"));
        }

        let calc = self.calculation();
        if !calc.is_valid {
            return Err(invalid_amount(&calc));
        }

        self.busy = true;
        let result = self.run_approve(calc.collateral_required).await;
        self.busy = false;

        match result {
            Ok(()) => {
                // Source of truth, not the tx success flag: re-read before
                // progression is allowed
                self.allowance = self
                    .chain
                    .allowance(&self.gold_token, &self.wallet, &self.vault)
                    .await
                    .map_err(chain_err)?;

                if self.allowance >= calc.collateral_required {
                    Ok(ApproveOutcome::Ready)
                } else {
                    tracing::warn!(
                        allowance = self.allowance,
                        required = calc.collateral_required,
                        "allowance read lags the confirmed approval"
                    );
                    Ok(ApproveOutcome::AllowanceStale)
                }
            }
            Err(e) => {
                self.inline_error(OpKind::Approve, &e);
                Err(e)
            }
        }
    }

    async fn run_approve(&mut self, amount: u64) -> Result<(), FlowError> {
        let hash = self
            .chain
            .approve(&self.gold_token, &self.wallet, &self.vault, amount)
            .await
            .map_err(chain_err)?;

        self.await_tx(OpKind::Approve, &hash).await
    }

    /// Deposit collateral and draw the loan. Routes through the approval
    /// step first when the fresh allowance is short. This is the point of
    /// highest irreversibility: once confirmed, collateral is locked and
    /// debt exists.
    pub async fn borrow(&mut self) -> Result<BorrowOutcome, FlowError> {
        self.guard_not_busy()?;
        if !matches!(
            self.state,
            FlowState::AmountEntry | FlowState::ApprovalPending
        ) {
            return Err(self.not_allowed("borrow"));
        }

        let calc = self.calculation();
        if !calc.is_valid {
            // Invalid input must not move the machine
            return Err(invalid_amount(&calc));
        }

        // Fresh read; a stale post-approval value keeps us here
        self.allowance = self
            .chain
            .allowance(&self.gold_token, &self.wallet, &self.vault)
            .await
            .map_err(chain_err)?;

        if self.allowance < calc.collateral_required {
            self.transition(FlowState::ApprovalPending);
            return Ok(BorrowOutcome::ApprovalRequired);
        }

        self.busy = true;
        self.transition(FlowState::Borrowing);
        let result = self.run_borrow(&calc).await;
        self.busy = false;

        match result {
            Ok(()) => {
                let completed = CompletedLoan {
                    loan_amount: calc.loan_amount,
                    amount_received: calc.amount_received,
                };
                self.session.completed_loan = Some(completed);
                self.transition(FlowState::BorrowConfirmed);
                Ok(BorrowOutcome::Confirmed(completed))
            }
            Err(e) => {
                // Nothing committed on-chain; back to the form, retryable
                self.transition(FlowState::AmountEntry);
                self.inline_error(OpKind::Borrow, &e);
                Err(e)
            }
        }
    }

    async fn run_borrow(&mut self, calc: &LoanCalculation) -> Result<(), FlowError> {
        let hash = self
            .chain
            .deposit_and_borrow(&self.wallet, calc.collateral_required, calc.loan_amount)
            .await
            .map_err(chain_err)?;

        self.await_tx(OpKind::Borrow, &hash).await
    }

    // ─── Step 2: bank details and redemption ─────────────────────────────

    pub fn continue_to_bank_details(&mut self) -> Result<(), FlowError> {
        if self.state != FlowState::BorrowConfirmed {
            return Err(self.not_allowed("continue"));
        }
        self.session.step = WizardStep::BankDetails;
        self.transition(FlowState::BankDetails);
        Ok(())
    }

    /// Store the destination details. Validation is pure; the stored value
    /// is kept even when invalid so the form round-trips.
    pub fn set_bank_details(&mut self, details: BankDetails) -> Result<(), FlowError> {
        if self.session.step != WizardStep::BankDetails
            || !matches!(self.state, FlowState::BankDetails)
        {
            return Err(self.not_allowed("set_bank_details"));
        }
        let validity = details.validate();
        self.session.bank_details = Some(details);
        validity
    }

    /// Burn the cash token and submit the redemption.
    ///
    /// A burn hash confirmed in an earlier attempt is reused: the retry
    /// path resubmits to the backend without burning again.
    pub async fn submit(&mut self) -> Result<Option<String>, FlowError> {
        self.guard_not_busy()?;
        if self.state != FlowState::BankDetails {
            return Err(self.not_allowed("submit"));
        }

        let details = self
            .session
            .bank_details
            .clone()
            .ok_or_else(|| FlowError::InvalidBankDetails {
                message: "Bank details are required".to_string(),
            })?;
        details.validate()?;

        let completed = self
            .session
            .completed_loan
            .ok_or_else(|| self.not_allowed("submit"))?;

        self.busy = true;
        let result = self.run_submit(&details, completed).await;
        self.busy = false;

        match result {
            Ok(reference) => {
                self.transition(FlowState::Success {
                    reference: reference.clone(),
                });
                Ok(reference)
            }
            Err(e) => {
                self.transition(FlowState::Failed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_submit(
        &mut self,
        details: &BankDetails,
        completed: CompletedLoan,
    ) -> Result<Option<String>, FlowError> {
        let burn_hash = match self.burn_tx.clone() {
            Some(hash) => hash,
            None => {
                self.transition(FlowState::Burning);
                let hash = self
                    .chain
                    .burn_with_memo(
                        &self.cash_token,
                        &self.wallet,
                        completed.amount_received,
                        &details.account_number,
                    )
                    .await
                    .map_err(chain_err)?;
                self.await_tx(OpKind::Burn, &hash).await?;
                self.burn_tx = Some(hash.clone());
                hash
            }
        };

        self.transition(FlowState::BackendSubmitting);

        let request = RedeemRequest::after_burn(
            completed.amount_received,
            details.bank_code.clone(),
            details.bank_name(),
            details.account_number.clone(),
            details.account_name.trim(),
            self.wallet.clone(),
            burn_hash,
        );

        let result = self
            .backend
            .submit(&request)
            .await
            .map_err(|e| FlowError::SubmissionFailed {
                message: e.to_string(),
            })?;

        Ok(result.reference)
    }

    /// From the error panel, back to the confirm step. A confirmed burn
    /// stays recorded so the next submit skips the burn.
    pub fn retry(&mut self) -> Result<(), FlowError> {
        if !matches!(self.state, FlowState::Failed { .. }) {
            return Err(self.not_allowed("retry"));
        }
        self.session.step = WizardStep::BankDetails;
        self.transition(FlowState::BankDetails);
        Ok(())
    }

    /// Abandon or complete the session: wizard state, loan snapshot, and
    /// burn hash are discarded and the flow returns to a fresh form.
    pub fn close(&mut self) {
        self.session = WizardSession::new();
        self.burn_tx = None;
        self.busy = false;
        self.state = FlowState::AmountEntry;
        let _ = self.events.send(FlowEvent::SessionClosed);
    }

    // ─── Internals ───────────────────────────────────────────────────────

    async fn await_tx(&self, op: OpKind, hash: &TxHash) -> Result<(), FlowError> {
        let events = self.events.clone();
        await_confirmed(&self.chain, hash, |phase| {
            let _ = events.send(FlowEvent::TxPhase { op, phase });
        })
        .await
        .map_err(chain_err)
    }

    fn transition(&mut self, next: FlowState) {
        if self.state != next {
            tracing::debug!(from = self.state.name(), to = next.name(), "flow transition");
            self.state = next;
            let _ = self.events.send(FlowEvent::State {
                state: self.state.clone(),
            });
        }
    }

    fn inline_error(&self, op: OpKind, error: &FlowError) {
        let _ = self.events.send(FlowEvent::InlineError {
            op,
            message: error.to_string(),
        });
    }

    fn guard_not_busy(&self) -> Result<(), FlowError> {
        if self.busy {
            Err(FlowError::Busy)
        } else {
            Ok(())
        }
    }

    fn guard_amount_editable(&self, action: &str) -> Result<(), FlowError> {
        if self.busy {
            return Err(FlowError::Busy);
        }
        if !matches!(
            self.state,
            FlowState::AmountEntry | FlowState::ApprovalPending
        ) {
            return Err(FlowError::ActionNotAllowed {
                state: self.state.name().to_string(),
                action: action.to_string(),
            });
        }
        Ok(())
    }

    fn not_allowed(&self, action: &str) -> FlowError {
        FlowError::ActionNotAllowed {
            state: self.state.name().to_string(),
            action: action.to_string(),
        }
    }
}

fn chain_err(e: ChainError) -> FlowError {
    FlowError::TxFailed {
        message: e.to_string(),
    }
}

fn invalid_amount(calc: &LoanCalculation) -> FlowError {
    FlowError::InvalidAmount {
        message: calc
            .error_message
            .clone()
            .unwrap_or_else(|| "Enter an amount".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use chain_client::MockChain;
    use redemption_client::{RedeemMode, SubmissionResult};

    const PRICE: Rupiah = 1_000;

    fn wallet_address() -> Address {
        Address::new("0x2aE4e9CBce0a2ea8371c2f0c1d16b552a4262a91")
    }

    fn contracts() -> &'static VaultContracts {
        crate::constants::get_contracts()
    }

    fn gold() -> TokenId {
        TokenId::new(contracts().gold_token)
    }

    fn vault() -> Address {
        Address::new(contracts().vault)
    }

    /// Scripted backend double: pops the next result per submission and
    /// records every request it saw.
    struct ScriptedBackend {
        results: Mutex<Vec<Result<SubmissionResult, String>>>,
        seen: Mutex<Vec<RedeemRequest>>,
    }

    impl ScriptedBackend {
        fn accepting(reference: Option<&str>) -> Self {
            Self::with_results(vec![Ok(SubmissionResult {
                ok: true,
                reference: reference.map(|s| s.to_string()),
                message: None,
            })])
        }

        fn with_results(results: Vec<Result<SubmissionResult, String>>) -> Self {
            Self {
                results: Mutex::new(results),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<RedeemRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<'a> RedemptionBackend for &'a ScriptedBackend {
        async fn submit(
            &self,
            request: &RedeemRequest,
        ) -> redemption_client::Result<SubmissionResult> {
            self.seen.lock().unwrap().push(request.clone());
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                return Ok(SubmissionResult {
                    ok: true,
                    reference: None,
                    message: None,
                });
            }
            results
                .remove(0)
                .map_err(|message| aurum_core::BackendError::Rejected { message })
        }
    }

    async fn flow_with<'a>(
        chain: &MockChain,
        backend: &'a ScriptedBackend,
    ) -> (
        LoanFlow<MockChain, &'a ScriptedBackend>,
        mpsc::UnboundedReceiver<FlowEvent>,
    ) {
        let session = WalletSession::connected(wallet_address());
        let (mut flow, rx) =
            LoanFlow::new(chain.clone(), backend, &session, contracts()).unwrap();
        flow.refresh_market().await.unwrap();
        (flow, rx)
    }

    /// Chain primed with enough gold for a mid-size loan and a posted price
    async fn funded_chain() -> MockChain {
        let chain = MockChain::new();
        chain.set_spot_price(PRICE).await;
        chain.set_balance(&gold(), &wallet_address(), 1_000_000).await;
        chain
            .set_allowance(&gold(), &wallet_address(), &vault(), u64::MAX)
            .await;
        chain
    }

    fn valid_details() -> BankDetails {
        BankDetails {
            bank_code: "014".to_string(),
            account_number: "1234567890".to_string(),
            account_name: "Siti Rahayu".to_string(),
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<FlowEvent>) -> Vec<FlowEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_requires_connected_wallet() {
        let backend = ScriptedBackend::accepting(None);
        let err = LoanFlow::new(
            MockChain::new(),
            &backend,
            &WalletSession::disconnected(),
            contracts(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, FlowError::NotConnected));
    }

    #[tokio::test]
    async fn test_borrow_with_invalid_amount_does_not_transition() {
        let chain = funded_chain().await;
        let backend = ScriptedBackend::accepting(None);
        let (mut flow, _rx) = flow_with(&chain, &backend).await;

        // Nothing entered
        let err = flow.borrow().await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidAmount { .. }));
        assert_eq!(*flow.state(), FlowState::AmountEntry);

        // Exceeds max loan
        flow.set_loan_input("999999999999").unwrap();
        let err = flow.borrow().await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidAmount { .. }));
        assert_eq!(*flow.state(), FlowState::AmountEntry);
        assert!(chain.loans().await.is_empty());
    }

    #[tokio::test]
    async fn test_borrow_routes_through_approval_when_allowance_short() {
        let chain = funded_chain().await;
        chain.set_allowance(&gold(), &wallet_address(), &vault(), 0).await;
        let backend = ScriptedBackend::accepting(None);
        let (mut flow, _rx) = flow_with(&chain, &backend).await;

        flow.set_loan_input("10000000").unwrap();
        flow.set_ltv(30).unwrap();

        let outcome = flow.borrow().await.unwrap();
        assert_eq!(outcome, BorrowOutcome::ApprovalRequired);
        assert_eq!(*flow.state(), FlowState::ApprovalPending);
        assert!(flow.needs_approval());
        assert!(chain.loans().await.is_empty());
    }

    #[tokio::test]
    async fn test_stale_allowance_after_approval_blocks_borrow() {
        let chain = funded_chain().await;
        chain.set_allowance(&gold(), &wallet_address(), &vault(), 0).await;
        chain.set_allowance_lag(2).await;
        let backend = ScriptedBackend::accepting(None);
        let (mut flow, _rx) = flow_with(&chain, &backend).await;

        flow.set_loan_input("10000000").unwrap();
        flow.set_ltv(30).unwrap();
        assert_eq!(flow.borrow().await.unwrap(), BorrowOutcome::ApprovalRequired);

        // Approval confirms but the re-read still sees the old value
        let outcome = flow.approve().await.unwrap();
        assert_eq!(outcome, ApproveOutcome::AllowanceStale);
        assert_eq!(*flow.state(), FlowState::ApprovalPending);

        // Next read is still stale; the flow must stay out of Borrowing
        assert_eq!(flow.borrow().await.unwrap(), BorrowOutcome::ApprovalRequired);
        assert!(chain.loans().await.is_empty());

        // A later read finally sees the fresh value and the borrow runs
        match flow.borrow().await.unwrap() {
            BorrowOutcome::Confirmed(loan) => assert_eq!(loan.loan_amount, 10_000_000),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(*flow.state(), FlowState::BorrowConfirmed);
    }

    #[tokio::test]
    async fn test_full_flow_self_service_success() {
        let chain = funded_chain().await;
        let backend = ScriptedBackend::accepting(Some("CRN-42"));
        let (mut flow, mut rx) = flow_with(&chain, &backend).await;

        flow.set_loan_input("10000000").unwrap();
        flow.set_ltv(30).unwrap();

        match flow.borrow().await.unwrap() {
            BorrowOutcome::Confirmed(loan) => {
                assert_eq!(loan.loan_amount, 10_000_000);
                assert_eq!(loan.amount_received, 9_950_000);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // The snapshot is immutable even if live balances move afterwards
        chain.set_balance(&gold(), &wallet_address(), 1).await;
        assert_eq!(
            flow.completed_loan().unwrap().amount_received,
            9_950_000
        );

        flow.continue_to_bank_details().unwrap();
        flow.set_bank_details(valid_details()).unwrap();
        let reference = flow.submit().await.unwrap();
        assert_eq!(reference.as_deref(), Some("CRN-42"));
        assert_eq!(
            *flow.state(),
            FlowState::Success {
                reference: Some("CRN-42".to_string())
            }
        );

        // Burn carries the destination account as memo, for the full
        // received amount
        let burns = chain.burns().await;
        assert_eq!(burns.len(), 1);
        assert_eq!(burns[0].amount, 9_950_000);
        assert_eq!(burns[0].memo, "1234567890");

        // The backend saw the confirmed burn hash and self-service sizing
        let seen = backend.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].tx_hash, *flow.burn_tx().unwrap());
        assert_eq!(seen[0].mode(), RedeemMode::SelfService);

        // Both async stages of the borrow were reported distinctly
        let phases: Vec<TxPhase> = drain(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                FlowEvent::TxPhase {
                    op: OpKind::Borrow,
                    phase,
                } => Some(phase),
                _ => None,
            })
            .collect();
        assert!(phases.contains(&TxPhase::Pending));
        assert!(phases.contains(&TxPhase::Confirming));
        assert!(phases.contains(&TxPhase::Confirmed));
    }

    #[tokio::test]
    async fn test_backend_failure_preserves_burn_for_retry() {
        let chain = funded_chain().await;
        let backend = ScriptedBackend::with_results(vec![
            Err("connection reset by peer".to_string()),
            Ok(SubmissionResult {
                ok: true,
                reference: Some("CRN-7".to_string()),
                message: None,
            }),
        ]);
        let (mut flow, _rx) = flow_with(&chain, &backend).await;

        flow.set_loan_input("10000000").unwrap();
        flow.borrow().await.unwrap();
        flow.continue_to_bank_details().unwrap();
        flow.set_bank_details(valid_details()).unwrap();

        let err = flow.submit().await.unwrap_err();
        assert!(matches!(err, FlowError::SubmissionFailed { .. }));
        assert!(matches!(flow.state(), FlowState::Failed { .. }));
        let first_burn = flow.burn_tx().cloned().expect("burn hash kept");

        // Try again: back to the confirm step, then resubmit
        flow.retry().unwrap();
        assert_eq!(*flow.state(), FlowState::BankDetails);
        let reference = flow.submit().await.unwrap();
        assert_eq!(reference.as_deref(), Some("CRN-7"));

        // No second burn; both submissions carried the same hash
        assert_eq!(chain.burns().await.len(), 1);
        let seen = backend.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].tx_hash, first_burn);
        assert_eq!(seen[1].tx_hash, first_burn);
    }

    #[tokio::test]
    async fn test_burn_failure_goes_terminal_without_burn_hash() {
        let chain = funded_chain().await;
        let backend = ScriptedBackend::accepting(None);
        let (mut flow, _rx) = flow_with(&chain, &backend).await;

        flow.set_loan_input("10000000").unwrap();
        flow.borrow().await.unwrap();
        flow.continue_to_bank_details().unwrap();
        flow.set_bank_details(valid_details()).unwrap();

        chain.fail_next_tx("execution reverted").await;
        let err = flow.submit().await.unwrap_err();
        assert!(matches!(err, FlowError::TxFailed { .. }));
        assert!(matches!(flow.state(), FlowState::Failed { .. }));
        assert!(flow.burn_tx().is_none());
        assert!(backend.seen().is_empty());

        // Retry burns again from scratch and completes
        flow.retry().unwrap();
        flow.submit().await.unwrap();
        assert_eq!(chain.burns().await.len(), 2);
    }

    #[tokio::test]
    async fn test_treasury_mode_above_threshold_without_reference() {
        let chain = funded_chain().await;
        chain
            .set_balance(&gold(), &wallet_address(), 10_000_000)
            .await;
        let backend = ScriptedBackend::accepting(None);
        let (mut flow, _rx) = flow_with(&chain, &backend).await;
        flow.refresh_market().await.unwrap();

        flow.set_loan_input("300000000").unwrap();
        flow.set_ltv(75).unwrap();
        flow.borrow().await.unwrap();
        flow.continue_to_bank_details().unwrap();
        flow.set_bank_details(valid_details()).unwrap();

        let reference = flow.submit().await.unwrap();
        assert!(reference.is_none());
        assert_eq!(*flow.state(), FlowState::Success { reference: None });

        let seen = backend.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].mode(), RedeemMode::TreasuryAssisted);
    }

    #[tokio::test]
    async fn test_borrow_rejection_returns_to_form_retryable() {
        let chain = funded_chain().await;
        let backend = ScriptedBackend::accepting(None);
        let (mut flow, mut rx) = flow_with(&chain, &backend).await;

        flow.set_loan_input("10000000").unwrap();
        chain.reject_next_submission("user rejected in wallet").await;

        let err = flow.borrow().await.unwrap_err();
        assert!(matches!(err, FlowError::TxFailed { .. }));
        assert_eq!(*flow.state(), FlowState::AmountEntry);
        assert!(flow.completed_loan().is_none());

        let inline_errors: Vec<FlowEvent> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, FlowEvent::InlineError { .. }))
            .collect();
        assert_eq!(inline_errors.len(), 1);

        // Second attempt goes through
        flow.borrow().await.unwrap();
        assert_eq!(*flow.state(), FlowState::BorrowConfirmed);
    }

    #[tokio::test]
    async fn test_actions_refused_outside_their_states() {
        let chain = funded_chain().await;
        let backend = ScriptedBackend::accepting(None);
        let (mut flow, _rx) = flow_with(&chain, &backend).await;

        assert!(matches!(
            flow.approve().await.unwrap_err(),
            FlowError::ActionNotAllowed { .. }
        ));
        assert!(matches!(
            flow.continue_to_bank_details().unwrap_err(),
            FlowError::ActionNotAllowed { .. }
        ));
        assert!(matches!(
            flow.submit().await.unwrap_err(),
            FlowError::ActionNotAllowed { .. }
        ));
        assert!(matches!(
            flow.retry().unwrap_err(),
            FlowError::ActionNotAllowed { .. }
        ));

        // After the borrow confirms, amount edits are refused
        flow.set_loan_input("10000000").unwrap();
        flow.borrow().await.unwrap();
        assert!(matches!(
            flow.set_loan_input("5").unwrap_err(),
            FlowError::ActionNotAllowed { .. }
        ));
        assert!(matches!(
            flow.borrow().await.unwrap_err(),
            FlowError::ActionNotAllowed { .. }
        ));
    }

    #[tokio::test]
    async fn test_invalid_bank_details_block_submit() {
        let chain = funded_chain().await;
        let backend = ScriptedBackend::accepting(None);
        let (mut flow, _rx) = flow_with(&chain, &backend).await;

        flow.set_loan_input("10000000").unwrap();
        flow.borrow().await.unwrap();
        flow.continue_to_bank_details().unwrap();

        let mut details = valid_details();
        details.account_number = "12345".to_string();
        assert!(flow.set_bank_details(details).is_err());

        let err = flow.submit().await.unwrap_err();
        assert!(matches!(err, FlowError::InvalidBankDetails { .. }));
        assert!(chain.burns().await.is_empty());
    }

    #[tokio::test]
    async fn test_close_discards_the_session() {
        let chain = funded_chain().await;
        let backend = ScriptedBackend::accepting(Some("CRN-1"));
        let (mut flow, mut rx) = flow_with(&chain, &backend).await;

        flow.set_loan_input("10000000").unwrap();
        flow.borrow().await.unwrap();
        flow.continue_to_bank_details().unwrap();
        flow.set_bank_details(valid_details()).unwrap();
        flow.submit().await.unwrap();

        flow.close();
        assert_eq!(*flow.state(), FlowState::AmountEntry);
        assert_eq!(flow.step(), WizardStep::AmountEntry);
        assert!(flow.burn_tx().is_none());
        assert!(flow.completed_loan().is_none());

        let closed = drain(&mut rx)
            .into_iter()
            .any(|e| matches!(e, FlowEvent::SessionClosed));
        assert!(closed);
    }
}
