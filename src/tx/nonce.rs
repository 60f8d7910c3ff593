//! Local nonce sequencing for concurrent sends from one account
//!
//! Handles:
//! - Serialized nonce allocation per (chain id, address)
//! - Rollback of nonces that never reached the pool
//! - Resynchronization with the ledger's pending view

use crate::chain::Ledger;
use crate::error::EvmResult;

use dashmap::DashMap;
use ethers::types::Address;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Per-account nonce state
#[derive(Debug, Default)]
struct NonceSlot {
    /// Next nonce to hand out; `None` until first synced with the ledger
    next: Option<u64>,
}

/// Hands out nonces under a per-account mutex
#[derive(Debug, Default)]
pub struct NonceSequencer {
    slots: DashMap<(u64, Address), Arc<Mutex<NonceSlot>>>,
}

impl NonceSequencer {
    /// Create a new nonce sequencer
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, chain_id: u64, address: Address) -> Arc<Mutex<NonceSlot>> {
        self.slots
            .entry((chain_id, address))
            .or_insert_with(|| Arc::new(Mutex::new(NonceSlot::default())))
            .clone()
    }

    /// Allocate the next nonce, fetching the pending nonce on first use
    pub async fn reserve(
        &self,
        ledger: &dyn Ledger,
        chain_id: u64,
        address: Address,
    ) -> EvmResult<u64> {
        let slot = self.slot(chain_id, address);
        let mut slot = slot.lock().await;

        let nonce = match slot.next {
            Some(n) => n,
            None => ledger.pending_nonce(address).await?,
        };
        slot.next = Some(nonce + 1);

        debug!("Allocated nonce {} for {:?} on chain {}", nonce, address, chain_id);
        Ok(nonce)
    }

    /// Return a nonce whose transaction never reached the pool.
    ///
    /// The most recent allocation rolls back in place. Any older nonce leaves
    /// a gap, so local state is dropped and the next reservation refetches
    /// the ledger's pending nonce.
    pub async fn release(&self, chain_id: u64, address: Address, nonce: u64) {
        let slot = self.slot(chain_id, address);
        let mut slot = slot.lock().await;

        match slot.next {
            Some(next) if next == nonce.saturating_add(1) => {
                slot.next = Some(nonce);
                debug!("Released nonce {} for {:?} on chain {}", nonce, address, chain_id);
            }
            Some(next) if next > nonce => {
                warn!(
                    "Nonce gap on chain {}: released {} for {:?} but next is {}, resyncing",
                    chain_id, nonce, address, next
                );
                slot.next = None;
            }
            _ => {}
        }
    }

    /// Pull the ledger's pending nonce; local state never moves backwards
    pub async fn sync(
        &self,
        ledger: &dyn Ledger,
        chain_id: u64,
        address: Address,
    ) -> EvmResult<u64> {
        let on_chain = ledger.pending_nonce(address).await?;

        let slot = self.slot(chain_id, address);
        let mut slot = slot.lock().await;
        let next = match slot.next {
            Some(local) if local > on_chain => local,
            _ => on_chain,
        };
        slot.next = Some(next);

        Ok(next)
    }

    /// Forget local state; the next reservation refetches from the ledger
    pub async fn reset(&self, chain_id: u64, address: Address) {
        let slot = self.slot(chain_id, address);
        slot.lock().await.next = None;
    }

    /// Next nonce that would be handed out, if known
    pub async fn peek(&self, chain_id: u64, address: Address) -> Option<u64> {
        let slot = self.slot(chain_id, address);
        let next = slot.lock().await.next;
        next
    }
}
