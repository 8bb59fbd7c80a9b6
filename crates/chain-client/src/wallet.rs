//! Wallet session state

use std::time::Instant;

use aurum_core::Address;

/// State of a connected wallet.
///
/// Holds the account address of the user driving the flow; the address is
/// validated at the connection boundary, not here.
#[derive(Clone, Debug)]
pub struct WalletSession {
    address: Option<Address>,
    connected_at: Option<Instant>,
}

impl WalletSession {
    /// A session with no wallet attached
    pub fn disconnected() -> Self {
        Self {
            address: None,
            connected_at: None,
        }
    }

    /// A session for the given connected account
    pub fn connected(address: Address) -> Self {
        Self {
            address: Some(address),
            connected_at: Some(Instant::now()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    /// Seconds since the wallet connected, if it did
    pub fn connected_secs(&self) -> Option<u64> {
        self.connected_at.map(|t| t.elapsed().as_secs())
    }
}
