//! Transaction submission with receipt polling, retry and gas bumping

use crate::account::Account;
use crate::chain::Receipt;
use crate::config::{ConfirmationConfig, RetryConfig, Settings};
use crate::error::{ErrorKind, EvmError, EvmResult};
use crate::metrics;
use crate::tx::{GasPlanner, Pricing, SignedTx, TxBuilder};

use ethers::types::H256;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default gas price multiplier (percent) for replacements
const DEFAULT_PRICE_BUMP_PERCENT: u64 = 120;

/// Submits signed transactions and tracks them to a receipt
#[derive(Debug, Clone)]
pub struct TxSender {
    /// Builder used to re-sign replacements
    builder: TxBuilder,
    /// Receipt polling cadence and deadlines
    confirmation: ConfirmationConfig,
    /// Resubmission policy
    retry: RetryConfig,
    /// Price multiplier (percent) for smart-gas replacements
    price_bump_percent: u64,
}

impl Default for TxSender {
    fn default() -> Self {
        Self {
            builder: TxBuilder::default(),
            confirmation: ConfirmationConfig::default(),
            retry: RetryConfig::default(),
            price_bump_percent: DEFAULT_PRICE_BUMP_PERCENT,
        }
    }
}

impl TxSender {
    /// Create a new transaction sender
    pub fn new(builder: TxBuilder, confirmation: ConfirmationConfig, retry: RetryConfig) -> Self {
        Self {
            builder,
            confirmation,
            retry,
            price_bump_percent: DEFAULT_PRICE_BUMP_PERCENT,
        }
    }

    /// Sender configured from the `[gas]`, `[confirmation]` and `[retry]` sections
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            builder: TxBuilder::new(GasPlanner::new(settings.gas.strategy)),
            confirmation: settings.confirmation.clone(),
            retry: settings.retry.clone(),
            price_bump_percent: settings.gas.price_bump_percent,
        }
    }

    pub fn builder(&self) -> &TxBuilder {
        &self.builder
    }

    pub fn confirmation(&self) -> &ConfirmationConfig {
        &self.confirmation
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Submit the raw transaction without waiting.
    ///
    /// A rejection that leaves the nonce unused hands a sequencer nonce back.
    pub async fn submit(&self, account: &Account, signed: &SignedTx) -> EvmResult<H256> {
        match self.submit_raw(account, signed).await {
            Ok(hash) => Ok(hash),
            Err(e) => {
                self.abandon(account, signed, &e).await;
                Err(e)
            }
        }
    }

    async fn submit_raw(&self, account: &Account, signed: &SignedTx) -> EvmResult<H256> {
        let hash = account
            .ledger()
            .send_raw_transaction(signed.raw().clone())
            .await?;

        metrics::record_tx_submitted(signed.variant());
        info!(
            "Transaction sent: {:?} ({}, nonce {})",
            hash,
            signed.variant().as_str(),
            signed.nonce()
        );
        Ok(hash)
    }

    /// Give the nonce of `signed` back when `err` means it never reached the pool
    async fn abandon(&self, account: &Account, signed: &SignedTx, err: &EvmError) {
        if err.kind() == ErrorKind::SubmissionRejected && !err.is_nonce_taken() {
            debug!("Releasing nonce {} of rejected {:?}", signed.nonce(), signed.hash());
            account.release_nonce(signed.nonce()).await;
        }
    }

    /// Submit and wait until mined successfully.
    ///
    /// A failed receipt is `MinedButFailed`; running out of time is
    /// `Timeout` and the transaction may still be pending.
    pub async fn send_tx(&self, account: &Account, signed: &SignedTx) -> EvmResult<H256> {
        let hash = self.submit(account, signed).await?;
        self.wait_for_receipt(account, hash, None).await?;
        Ok(hash)
    }

    /// `send_tx` that also stops when `cancel` fires
    pub async fn send_tx_cancellable(
        &self,
        account: &Account,
        signed: &SignedTx,
        cancel: &CancellationToken,
    ) -> EvmResult<H256> {
        let hash = self.submit(account, signed).await?;
        self.wait_for_receipt(account, hash, Some(cancel)).await?;
        Ok(hash)
    }

    /// Poll for the receipt of `hash` at the configured interval until the
    /// configured deadline
    pub async fn wait_for_receipt(
        &self,
        account: &Account,
        hash: H256,
        cancel: Option<&CancellationToken>,
    ) -> EvmResult<Receipt> {
        let started = Instant::now();
        let deadline = tokio::time::sleep(self.confirmation.timeout());
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval(self.confirmation.poll_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => {
                    metrics::record_tx_timed_out();
                    warn!("Timed out waiting for receipt of {:?}", hash);
                    return Err(EvmError::Timeout {
                        operation: "transaction receipt".to_string(),
                        tx_hash: format!("{:?}", hash),
                    });
                }
                _ = cancelled(cancel) => {
                    return Err(EvmError::Cancelled {
                        operation: "transaction receipt".to_string(),
                        tx_hash: format!("{:?}", hash),
                    });
                }
                _ = ticker.tick() => {
                    match account.ledger().transaction_receipt(hash).await? {
                        None => debug!("Receipt for {:?} not yet available", hash),
                        Some(receipt) => {
                            metrics::record_receipt_latency(started.elapsed().as_secs_f64());
                            return settle(receipt);
                        }
                    }
                }
            }
        }
    }

    /// Wait until the receipt of `hash` is `confirmations` blocks deep
    pub async fn wait_for_confirmations(
        &self,
        account: &Account,
        hash: H256,
        confirmations: u64,
        cancel: Option<&CancellationToken>,
    ) -> EvmResult<Receipt> {
        let deadline = tokio::time::sleep(self.confirmation.multi_timeout());
        tokio::pin!(deadline);
        let mut ticker = tokio::time::interval(self.confirmation.multi_poll_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => {
                    metrics::record_tx_timed_out();
                    return Err(EvmError::Timeout {
                        operation: format!("{} confirmations", confirmations),
                        tx_hash: format!("{:?}", hash),
                    });
                }
                _ = cancelled(cancel) => {
                    return Err(EvmError::Cancelled {
                        operation: format!("{} confirmations", confirmations),
                        tx_hash: format!("{:?}", hash),
                    });
                }
                _ = ticker.tick() => {
                    let Some(receipt) = account.ledger().transaction_receipt(hash).await? else {
                        continue;
                    };
                    if !receipt.is_success() {
                        return settle(receipt);
                    }
                    let head = account.ledger().block_number().await?;
                    let depth = head.saturating_sub(receipt.block_number) + 1;
                    debug!("{:?} has {}/{} confirmations", hash, depth, confirmations);
                    if depth >= confirmations {
                        return Ok(receipt);
                    }
                }
            }
        }
    }

    /// Submit with linear backoff, resubmitting the same signed bytes.
    ///
    /// `max_retries` is the total number of attempts (at least one). A node
    /// answer of "already known" counts as accepted. Failures that cannot
    /// change on resubmission stop the loop.
    pub async fn send_tx_with_retry(
        &self,
        account: &Account,
        signed: &SignedTx,
        max_retries: u32,
    ) -> EvmResult<H256> {
        let attempts = max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = match self.submit_or_adopt(account, signed, attempt > 1).await {
                Ok(hash) => self
                    .wait_for_receipt(account, hash, None)
                    .await
                    .map(|_| hash),
                Err(e) => Err(e),
            };

            match result {
                Ok(hash) => return Ok(hash),
                Err(e) if !e.is_retryable() || attempt >= attempts => {
                    self.abandon(account, signed, &e).await;
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        "Send of {:?} failed (attempt {}/{}): {}",
                        signed.hash(),
                        attempt,
                        attempts,
                        e
                    );
                    let backoff =
                        Duration::from_millis(self.retry.backoff_ms.saturating_mul(attempt as u64));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    /// `send_tx_with_retry` with the configured attempt count
    pub async fn send_tx_with_default_retry(
        &self,
        account: &Account,
        signed: &SignedTx,
    ) -> EvmResult<H256> {
        self.send_tx_with_retry(account, signed, self.retry.max_retries)
            .await
    }

    /// Submit, treating "already known" and, on resubmission, an existing
    /// receipt as acceptance
    async fn submit_or_adopt(
        &self,
        account: &Account,
        signed: &SignedTx,
        resubmission: bool,
    ) -> EvmResult<H256> {
        match self.submit_raw(account, signed).await {
            Ok(hash) => Ok(hash),
            Err(e) if is_already_known(&e) => {
                info!("{:?} already known to the node", signed.hash());
                Ok(signed.hash())
            }
            Err(e) if resubmission && e.kind() == ErrorKind::SubmissionRejected => {
                // An earlier attempt may have been mined meanwhile
                match account.ledger().transaction_receipt(signed.hash()).await {
                    Ok(Some(_)) => Ok(signed.hash()),
                    _ => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Send; if that fails short of a mined revert, re-sign the same nonce at
    /// a bumped price and send once more
    pub async fn send_tx_with_smart_gas(
        &self,
        account: &Account,
        signed: &SignedTx,
    ) -> EvmResult<H256> {
        // The nonce stays reserved for the replacement
        let first = match self.submit_raw(account, signed).await {
            Ok(hash) => self
                .wait_for_receipt(account, hash, None)
                .await
                .map(|_| hash),
            Err(e) => Err(e),
        };
        let first_err = match first {
            Ok(hash) => return Ok(hash),
            Err(e) if e.is_final() => return Err(e),
            Err(e) => e,
        };

        let replacement = match self.replacement(account, signed).await {
            Ok(replacement) => replacement,
            Err(e) => {
                self.abandon(account, signed, &first_err).await;
                return Err(e);
            }
        };
        warn!(
            "Send of {:?} failed ({}), replacing nonce {} with {:?}",
            signed.hash(),
            first_err,
            signed.nonce(),
            replacement.pricing()
        );
        self.send_tx(account, &replacement).await
    }

    /// Re-sign `signed` at the bumped price; legacy bumps from the higher of
    /// its own and the current suggested price
    async fn replacement(&self, account: &Account, signed: &SignedTx) -> EvmResult<SignedTx> {
        let current = match signed.pricing() {
            Pricing::Legacy { gas_price } => {
                let suggested = account.suggest_gas_price().await?;
                Pricing::legacy(std::cmp::max(gas_price, suggested))
            }
            dynamic => dynamic,
        };
        let pricing = GasPlanner::speed_up(&current, self.price_bump_percent)?;

        self.builder
            .build_with_pricing(account, &signed.to_request(), pricing)
            .await
            .map_err(|e| e.context("re-sign with bumped gas"))
    }

    /// Send sequentially; one result per transaction
    pub async fn batch_send(&self, account: &Account, txs: &[SignedTx]) -> Vec<EvmResult<H256>> {
        let mut results = Vec::with_capacity(txs.len());
        for (i, signed) in txs.iter().enumerate() {
            let result = self.send_tx(account, signed).await;
            if let Err(e) = &result {
                warn!("Batch item {} ({:?}) failed: {}", i, signed.hash(), e);
            }
            results.push(result);
        }
        results
    }
}

/// Map a mined receipt onto success or `MinedButFailed`
fn settle(receipt: Receipt) -> EvmResult<Receipt> {
    if receipt.is_success() {
        metrics::record_tx_confirmed();
        info!(
            "Transaction {:?} confirmed in block {}",
            receipt.tx_hash, receipt.block_number
        );
        Ok(receipt)
    } else {
        metrics::record_tx_reverted();
        warn!(
            "Transaction {:?} reverted in block {}",
            receipt.tx_hash, receipt.block_number
        );
        Err(EvmError::MinedButFailed {
            tx_hash: format!("{:?}", receipt.tx_hash),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        })
    }
}

fn is_already_known(err: &EvmError) -> bool {
    match err.root() {
        EvmError::SubmissionRejected { message } => {
            let message = message.to_lowercase();
            message.contains("already known") || message.contains("already imported")
        }
        _ => false,
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
