//! JSON-RPC ledger with multi-endpoint support and automatic failover

use crate::chain::{CallRequest, Ledger, Receipt, ReceiptStatus};
use crate::config::RpcOptions;
use crate::error::{ErrorKind, EvmError, EvmResult};
use crate::metrics;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, Block, BlockId, BlockNumber, Bytes, TransactionReceipt, TransactionRequest, H256,
    U256, U64,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// `Ledger` over one or more HTTP JSON-RPC endpoints
pub struct RpcLedger {
    /// Endpoint URLs, index-aligned with `providers`
    urls: Vec<String>,
    /// HTTP providers (multiple for failover)
    providers: Vec<Provider<Http>>,
    /// Current active provider index
    current: AtomicUsize,
}

impl RpcLedger {
    /// Open providers for every configured URL.
    ///
    /// No request is made here; the starting endpoint is chosen by an RNG
    /// seeded from `rng_seed` when present.
    pub fn connect(options: &RpcOptions) -> EvmResult<Self> {
        let client = build_client(options)?;

        let mut urls = Vec::new();
        let mut providers = Vec::new();
        for url in options.urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| EvmError::Config(format!("invalid RPC URL {}: {}", url, e)))?;
            providers.push(Provider::new(Http::new_with_client(parsed, client.clone())));
            urls.push(url.to_string());
            debug!("Added HTTP provider: {}", url);
        }

        if providers.is_empty() {
            return Err(EvmError::Config("No RPC URLs configured".to_string()));
        }

        let mut rng = match options.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let start = rng.gen_range(0..providers.len());

        Ok(Self {
            urls,
            providers,
            current: AtomicUsize::new(start),
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> &Provider<Http> {
        &self.providers[self.current_index()]
    }

    /// URL of the active provider
    pub fn current_url(&self) -> &str {
        &self.urls[self.current_index()]
    }

    /// Number of configured endpoints
    pub fn endpoint_count(&self) -> usize {
        self.providers.len()
    }

    fn current_index(&self) -> usize {
        self.current.load(Ordering::Relaxed) % self.providers.len()
    }

    /// Switch to next available provider
    pub fn failover(&self) {
        if self.providers.len() < 2 {
            return;
        }
        let next = (self.current_index() + 1) % self.providers.len();
        self.current.store(next, Ordering::Relaxed);
        metrics::record_rpc_failover();
        warn!("RPC failover to {}", self.urls[next]);
    }

    /// Run an idempotent read, moving to the next endpoint on transport errors
    async fn read<T, F, Fut>(&self, operation: &'static str, f: F) -> EvmResult<T>
    where
        F: Fn(Provider<Http>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut last_error = None;
        for _ in 0..self.providers.len() {
            match f(self.http().clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let err = classify(operation, e);
                    if err.kind() != ErrorKind::Transport {
                        return Err(err);
                    }
                    warn!("{} failed on {}: {}", operation, self.current_url(), err);
                    last_error = Some(err);
                    self.failover();
                }
            }
        }

        Err(last_error.unwrap_or_else(|| EvmError::Transport {
            operation: operation.to_string(),
            message: "All providers failed".to_string(),
        }))
    }
}

fn build_client(options: &RpcOptions) -> EvmResult<reqwest::Client> {
    let mut headers = HeaderMap::new();
    for (name, value) in &options.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| EvmError::Config(format!("invalid header name {}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| EvmError::Config(format!("invalid value for header {}: {}", name, e)))?;
        headers.insert(name, value);
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(options.timeout())
        .build()
        .map_err(|e| EvmError::Config(format!("failed to build HTTP client: {}", e)))
}

/// Map a provider failure onto the crate's error kinds.
///
/// A JSON-RPC error object means the node answered: for simulations that is a
/// revert, for submissions a rejection. Anything else is transport.
fn classify(operation: &str, err: ProviderError) -> EvmError {
    match err.as_error_response() {
        Some(rpc) => match operation {
            "eth_sendRawTransaction" => EvmError::SubmissionRejected {
                message: rpc.message.clone(),
            },
            "eth_estimateGas" | "eth_call" => EvmError::SimulationReverted {
                operation: operation.to_string(),
                message: rpc.to_string(),
            },
            _ => EvmError::Transport {
                operation: operation.to_string(),
                message: rpc.to_string(),
            },
        },
        None => EvmError::Transport {
            operation: operation.to_string(),
            message: err.to_string(),
        },
    }
}

fn to_typed(call: &CallRequest) -> TypedTransaction {
    let mut request = TransactionRequest::new()
        .value(call.value)
        .data(call.data.clone());
    if let Some(from) = call.from {
        request = request.from(from);
    }
    if let Some(to) = call.to {
        request = request.to(to);
    }
    request.into()
}

impl From<TransactionReceipt> for Receipt {
    fn from(receipt: TransactionReceipt) -> Self {
        // Pre-Byzantium receipts carry no status field
        let status = match receipt.status {
            Some(s) if s == U64::zero() => ReceiptStatus::Failed,
            _ => ReceiptStatus::Success,
        };
        Receipt {
            tx_hash: receipt.transaction_hash,
            status,
            block_number: receipt.block_number.map(|b| b.as_u64()).unwrap_or_default(),
            gas_used: receipt.gas_used.map(|g| g.low_u64()).unwrap_or_default(),
            effective_gas_price: receipt.effective_gas_price,
        }
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn chain_id(&self) -> EvmResult<u64> {
        let id = self
            .read("eth_chainId", |p| async move { p.get_chainid().await })
            .await?;
        Ok(id.low_u64())
    }

    async fn balance(&self, address: Address) -> EvmResult<U256> {
        self.read("eth_getBalance", |p| async move {
            p.get_balance(address, None).await
        })
        .await
    }

    async fn pending_nonce(&self, address: Address) -> EvmResult<u64> {
        let nonce = self
            .read("eth_getTransactionCount", |p| async move {
                p.get_transaction_count(address, Some(BlockNumber::Pending.into()))
                    .await
            })
            .await?;
        Ok(nonce.low_u64())
    }

    async fn gas_price(&self) -> EvmResult<U256> {
        self.read("eth_gasPrice", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn max_priority_fee(&self) -> EvmResult<U256> {
        self.read("eth_maxPriorityFeePerGas", |p| async move {
            p.request::<_, U256>("eth_maxPriorityFeePerGas", ()).await
        })
        .await
    }

    async fn estimate_gas(&self, call: &CallRequest) -> EvmResult<u64> {
        let tx = to_typed(call);
        let gas = self
            .read("eth_estimateGas", |p| {
                let tx = tx.clone();
                async move { p.estimate_gas(&tx, None).await }
            })
            .await?;
        Ok(gas.low_u64())
    }

    async fn call(&self, call: &CallRequest) -> EvmResult<Bytes> {
        let tx = to_typed(call);
        self.read("eth_call", |p| {
            let tx = tx.clone();
            async move { p.call(&tx, None).await }
        })
        .await
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> EvmResult<H256> {
        // Not retried across endpoints; resubmission is the sender's decision
        let pending = self
            .http()
            .send_raw_transaction(raw)
            .await
            .map_err(|e| classify("eth_sendRawTransaction", e))?;
        Ok(pending.tx_hash())
    }

    async fn transaction_receipt(&self, hash: H256) -> EvmResult<Option<Receipt>> {
        let receipt = self
            .read("eth_getTransactionReceipt", |p| async move {
                p.get_transaction_receipt(hash).await
            })
            .await?;
        Ok(receipt.map(Receipt::from))
    }

    async fn block_number(&self) -> EvmResult<u64> {
        let block = self
            .read("eth_blockNumber", |p| async move { p.get_block_number().await })
            .await?;
        Ok(block.as_u64())
    }

    async fn block(&self, id: BlockId) -> EvmResult<Option<Block<H256>>> {
        self.read("eth_getBlock", |p| async move { p.get_block(id).await })
            .await
    }

    async fn code(&self, address: Address) -> EvmResult<Bytes> {
        self.read("eth_getCode", |p| async move { p.get_code(address, None).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::providers::{HttpClientError, JsonRpcError};

    fn node_error(message: &str) -> ProviderError {
        ProviderError::JsonRpcClientError(Box::new(HttpClientError::JsonRpcError(
            JsonRpcError {
                code: -32000,
                message: message.to_string(),
                data: None,
            },
        )))
    }

    #[test]
    fn test_classify_node_errors() {
        let err = classify("eth_estimateGas", node_error("execution reverted"));
        assert_eq!(err.kind(), ErrorKind::SimulationRevert);

        let err = classify("eth_sendRawTransaction", node_error("nonce too low"));
        assert_eq!(err.kind(), ErrorKind::SubmissionRejected);
        assert!(err.to_string().contains("nonce too low"));
    }

    #[test]
    fn test_classify_transport_errors() {
        let err = classify("eth_call", ProviderError::CustomError("connection refused".into()));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_connect_requires_urls() {
        let opts = RpcOptions {
            urls: vec!["  ".to_string()],
            ..RpcOptions::new("")
        };
        assert!(RpcLedger::connect(&opts).is_err());
        assert!(RpcLedger::connect(&RpcOptions::new("not a url")).is_err());
    }

    #[test]
    fn test_seeded_start_and_failover() {
        let mut opts = RpcOptions::new("http://127.0.0.1:8545").with_seed(11);
        opts.urls.push("http://127.0.0.1:8546".to_string());
        opts.urls.push("http://127.0.0.1:8547".to_string());

        let a = RpcLedger::connect(&opts).unwrap();
        let b = RpcLedger::connect(&opts).unwrap();
        assert_eq!(a.endpoint_count(), 3);
        assert_eq!(a.current_url(), b.current_url());

        let before = a.current_url().to_string();
        a.failover();
        assert_ne!(a.current_url(), before);
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_error() {
        let mut opts = RpcOptions::new("http://127.0.0.1:1");
        opts.timeout_secs = 2;
        let ledger = RpcLedger::connect(&opts).unwrap();

        let err = tokio_test::block_on(ledger.chain_id()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_invalid_header_rejected() {
        let opts = RpcOptions::new("http://127.0.0.1:8545").with_header("bad header", "x");
        assert!(RpcLedger::connect(&opts).is_err());
    }

    #[test]
    fn test_receipt_conversion() {
        let mut raw = TransactionReceipt::default();
        raw.status = Some(U64::zero());
        raw.block_number = Some(U64::from(9));
        raw.gas_used = Some(U256::from(21_000u64));
        let receipt = Receipt::from(raw);
        assert_eq!(receipt.status, ReceiptStatus::Failed);
        assert_eq!(receipt.block_number, 9);
        assert_eq!(receipt.gas_used, 21_000);

        let mut raw = TransactionReceipt::default();
        raw.status = Some(U64::one());
        assert!(Receipt::from(raw).is_success());
    }
}
