//! Deterministic in-process gateway for tests and dry runs
//!
//! Scripted collaborator implementing [`ChainGateway`] without a network.
//! Submitted transactions advance pending -> confirming -> confirmed across
//! successive status polls. Failure injection covers both rejection at
//! submission time and failure after inclusion, and allowance reads can be
//! configured to lag behind a confirmed approval to exercise stale-read
//! handling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use aurum_core::{Address, ChainError, GoldUnits, Rupiah, TokenId, TxHash};

use crate::{ChainGateway, Result, TxPhase, TxStatus};

#[derive(Debug, Clone)]
struct MockTx {
    polls: u32,
    failure: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RecordedBurn {
    pub token: TokenId,
    pub owner: Address,
    pub amount: u64,
    pub memo: String,
}

#[derive(Debug, Clone)]
pub struct RecordedLoan {
    pub owner: Address,
    pub collateral: GoldUnits,
    pub principal: Rupiah,
}

#[derive(Default)]
struct Inner {
    balances: HashMap<(TokenId, Address), u64>,
    /// Effective allowance visible to reads
    allowances: HashMap<(TokenId, Address, Address), u64>,
    /// Allowance staged by a submitted approval, gated behind stale reads
    staged: HashMap<(TokenId, Address, Address), (u64, u32)>,
    txs: HashMap<TxHash, MockTx>,
    burns: Vec<RecordedBurn>,
    loans: Vec<RecordedLoan>,
    fail_next_tx: Option<String>,
    reject_next_submission: Option<String>,
    /// Number of allowance reads that still see the old value after approval
    allowance_lag: u32,
    spot_price: Rupiah,
}

/// In-memory gateway double with failure injection
#[derive(Clone)]
pub struct MockChain {
    tx_counter: Arc<AtomicU64>,
    inner: Arc<Mutex<Inner>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            tx_counter: Arc::new(AtomicU64::new(1)),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub async fn set_spot_price(&self, price: Rupiah) {
        self.inner.lock().await.spot_price = price;
    }

    pub async fn set_balance(&self, token: &TokenId, owner: &Address, amount: u64) {
        let mut inner = self.inner.lock().await;
        inner
            .balances
            .insert((token.clone(), owner.clone()), amount);
    }

    pub async fn set_allowance(
        &self,
        token: &TokenId,
        owner: &Address,
        spender: &Address,
        amount: u64,
    ) {
        let mut inner = self.inner.lock().await;
        inner
            .allowances
            .insert((token.clone(), owner.clone(), spender.clone()), amount);
    }

    /// The next submitted transaction is accepted but fails on-chain
    pub async fn fail_next_tx(&self, reason: impl Into<String>) {
        self.inner.lock().await.fail_next_tx = Some(reason.into());
    }

    /// The next write is rejected before submission (e.g. user rejection)
    pub async fn reject_next_submission(&self, reason: impl Into<String>) {
        self.inner.lock().await.reject_next_submission = Some(reason.into());
    }

    /// After an approval confirms, this many allowance reads still return
    /// the pre-approval value before the fresh value becomes visible.
    pub async fn set_allowance_lag(&self, reads: u32) {
        self.inner.lock().await.allowance_lag = reads;
    }

    pub async fn burns(&self) -> Vec<RecordedBurn> {
        self.inner.lock().await.burns.clone()
    }

    pub async fn loans(&self) -> Vec<RecordedLoan> {
        self.inner.lock().await.loans.clone()
    }

    fn next_hash(&self) -> TxHash {
        let id = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        TxHash::new(format!("0x{:064x}", id))
    }

    async fn submit(&self) -> Result<TxHash> {
        let mut inner = self.inner.lock().await;
        if let Some(reason) = inner.reject_next_submission.take() {
            return Err(ChainError::TxRejected { reason });
        }
        let hash = self.next_hash();
        let failure = inner.fail_next_tx.take();
        inner.txs.insert(
            hash.clone(),
            MockTx { polls: 0, failure },
        );
        Ok(hash)
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainGateway for MockChain {
    async fn gold_spot_price(&self) -> Result<Rupiah> {
        Ok(self.inner.lock().await.spot_price)
    }

    async fn balance_of(&self, token: &TokenId, owner: &Address) -> Result<u64> {
        let inner = self.inner.lock().await;
        Ok(inner
            .balances
            .get(&(token.clone(), owner.clone()))
            .copied()
            .unwrap_or(0))
    }

    async fn allowance(
        &self,
        token: &TokenId,
        owner: &Address,
        spender: &Address,
    ) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let key = (token.clone(), owner.clone(), spender.clone());

        if let Some((staged_value, remaining)) = inner.staged.get(&key).copied() {
            if remaining == 0 {
                inner.staged.remove(&key);
                inner.allowances.insert(key.clone(), staged_value);
            } else {
                inner.staged.insert(key.clone(), (staged_value, remaining - 1));
            }
        }

        Ok(inner.allowances.get(&key).copied().unwrap_or(0))
    }

    async fn approve(
        &self,
        token: &TokenId,
        owner: &Address,
        spender: &Address,
        amount: u64,
    ) -> Result<TxHash> {
        let hash = self.submit().await?;
        let mut inner = self.inner.lock().await;
        let key = (token.clone(), owner.clone(), spender.clone());
        let lag = inner.allowance_lag;
        if lag == 0 {
            inner.allowances.insert(key, amount);
        } else {
            inner.staged.insert(key, (amount, lag));
        }
        Ok(hash)
    }

    async fn deposit_and_borrow(
        &self,
        owner: &Address,
        collateral: GoldUnits,
        principal: Rupiah,
    ) -> Result<TxHash> {
        let hash = self.submit().await?;
        let mut inner = self.inner.lock().await;
        inner.loans.push(RecordedLoan {
            owner: owner.clone(),
            collateral,
            principal,
        });
        Ok(hash)
    }

    async fn burn_with_memo(
        &self,
        token: &TokenId,
        owner: &Address,
        amount: u64,
        memo: &str,
    ) -> Result<TxHash> {
        let hash = self.submit().await?;
        let mut inner = self.inner.lock().await;
        inner.burns.push(RecordedBurn {
            token: token.clone(),
            owner: owner.clone(),
            amount,
            memo: memo.to_string(),
        });
        Ok(hash)
    }

    async fn tx_status(&self, hash: &TxHash) -> Result<TxStatus> {
        let mut inner = self.inner.lock().await;
        let tx = inner.txs.get_mut(hash).ok_or_else(|| ChainError::TxNotFound {
            tx_hash: hash.to_string(),
        })?;

        tx.polls += 1;

        if let Some(reason) = &tx.failure {
            return Ok(TxStatus {
                phase: TxPhase::Failed,
                error: Some(reason.clone()),
            });
        }

        let phase = match tx.polls {
            1 => TxPhase::Confirming,
            _ => TxPhase::Confirmed,
        };

        Ok(TxStatus { phase, error: None })
    }
}
