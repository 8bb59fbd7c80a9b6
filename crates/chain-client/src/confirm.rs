//! Confirmation polling for submitted transactions
//!
//! Drives a submitted transaction through its pending and confirming stages
//! by polling the gateway, reporting each stage change to the caller. The
//! two stages must stay observable separately: submission acceptance and
//! block inclusion are different events on this chain.

use std::time::Duration;

use aurum_core::{ChainError, TxHash};

use crate::{ChainGateway, TxPhase};

/// How often the confirmation driver polls the gateway.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Polls older than this give up and surface a retryable error.
const MAX_POLLS: u32 = 240; // 2 minutes at 500ms

/// Poll a transaction until it confirms.
///
/// `on_phase` is invoked whenever the observed phase changes, starting with
/// `Pending` immediately after submission. Returns `Ok(())` once the
/// transaction is confirmed, or an error if it failed on-chain, vanished
/// from the gateway, or the poll budget ran out.
pub async fn await_confirmed<C, F>(
    chain: &C,
    hash: &TxHash,
    mut on_phase: F,
) -> Result<(), ChainError>
where
    C: ChainGateway + ?Sized,
    F: FnMut(TxPhase),
{
    let mut last_phase = TxPhase::Pending;
    on_phase(TxPhase::Pending);

    for _ in 0..MAX_POLLS {
        let status = chain.tx_status(hash).await?;

        if status.phase != last_phase {
            last_phase = status.phase;
            on_phase(status.phase);
        }

        match status.phase {
            TxPhase::Confirmed => return Ok(()),
            TxPhase::Failed => {
                return Err(ChainError::TxRejected {
                    reason: status
                        .error
                        .unwrap_or_else(|| "transaction failed".to_string()),
                })
            }
            TxPhase::Pending | TxPhase::Confirming => {
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        }
    }

    Err(ChainError::ApiError {
        message: format!(
            "gave up waiting for confirmation of {} after {} polls",
            hash, MAX_POLLS
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockChain;
    use aurum_core::{Address, TokenId};

    fn owner() -> Address {
        Address::new("0x2aE4e9CBce0a2ea8371c2f0c1d16b552a4262a91")
    }

    fn token() -> TokenId {
        TokenId::new("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
    }

    #[tokio::test]
    async fn test_reports_pending_then_confirming_then_confirms() {
        let chain = MockChain::new();
        chain.set_balance(&token(), &owner(), 1000).await;

        let hash = chain
            .burn_with_memo(&token(), &owner(), 10, "1234567890")
            .await
            .unwrap();

        let mut phases = Vec::new();
        await_confirmed(&chain, &hash, |p| phases.push(p))
            .await
            .unwrap();

        assert_eq!(
            phases,
            vec![TxPhase::Pending, TxPhase::Confirming, TxPhase::Confirmed]
        );
    }

    #[tokio::test]
    async fn test_failed_tx_surfaces_reason() {
        let chain = MockChain::new();
        chain.fail_next_tx("execution reverted").await;

        let hash = chain
            .burn_with_memo(&token(), &owner(), 10, "1234567890")
            .await
            .unwrap();

        let err = await_confirmed(&chain, &hash, |_| {}).await.unwrap_err();
        match err {
            ChainError::TxRejected { reason } => assert_eq!(reason, "execution reverted"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
