//! Error types for account, gas, builder and sender operations

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum EvmError {
    #[error("Invalid {field}: {value}")]
    InvalidInput { field: String, value: String },

    #[error("Key error: {0}")]
    Key(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error during {operation}: {message}")]
    Transport { operation: String, message: String },

    #[error("Simulation reverted during {operation}: {message}")]
    SimulationReverted { operation: String, message: String },

    #[error("Transaction rejected by node: {message}")]
    SubmissionRejected { message: String },

    #[error("Transaction {tx_hash} mined in block {block_number} but reverted (gas used {gas_used})")]
    MinedButFailed {
        tx_hash: String,
        block_number: u64,
        gas_used: u64,
    },

    #[error("Timeout waiting for {operation} ({tx_hash}); the transaction may still be pending")]
    Timeout { operation: String, tx_hash: String },

    #[error("Cancelled while waiting for {operation} ({tx_hash})")]
    Cancelled { operation: String, tx_hash: String },

    #[error("Chain id unknown; refusing to sign without replay protection")]
    ChainIdUnknown,

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<EvmError>,
    },
}

/// Coarse classification of an [`EvmError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputValidation,
    Key,
    Configuration,
    Transport,
    SimulationRevert,
    SubmissionRejected,
    MinedButFailed,
    TimedOut,
    Cancelled,
    ChainIdUnknown,
    Abi,
    Signing,
}

impl EvmError {
    /// Shorthand for an input validation failure
    pub fn invalid(field: impl Into<String>, value: impl Into<String>) -> Self {
        EvmError::InvalidInput {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Wrap this error with operation context
    pub fn context(self, context: impl Into<String>) -> Self {
        EvmError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classify the error, looking through context wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvmError::InvalidInput { .. } => ErrorKind::InputValidation,
            EvmError::Key(_) => ErrorKind::Key,
            EvmError::Config(_) => ErrorKind::Configuration,
            EvmError::Transport { .. } => ErrorKind::Transport,
            EvmError::SimulationReverted { .. } => ErrorKind::SimulationRevert,
            EvmError::SubmissionRejected { .. } => ErrorKind::SubmissionRejected,
            EvmError::MinedButFailed { .. } => ErrorKind::MinedButFailed,
            EvmError::Timeout { .. } => ErrorKind::TimedOut,
            EvmError::Cancelled { .. } => ErrorKind::Cancelled,
            EvmError::ChainIdUnknown => ErrorKind::ChainIdUnknown,
            EvmError::Abi(_) => ErrorKind::Abi,
            EvmError::Signing(_) => ErrorKind::Signing,
            EvmError::Context { source, .. } => source.kind(),
        }
    }

    /// Innermost error, with all context wrappers removed
    pub fn root(&self) -> &EvmError {
        match self {
            EvmError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if resubmitting or re-polling can change the outcome
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::TimedOut)
    }

    /// Check if the transaction outcome is settled on chain
    pub fn is_final(&self) -> bool {
        matches!(self.kind(), ErrorKind::MinedButFailed)
    }

    /// Check if a call or transaction reverted, in simulation or on chain
    pub fn is_revert(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::SimulationRevert | ErrorKind::MinedButFailed
        ) || self.mentions(&["revert", "vm execution error"])
    }

    /// Check if the sender cannot cover value plus fees
    pub fn is_insufficient_funds(&self) -> bool {
        self.mentions(&["insufficient funds"])
    }

    /// Check if the gas limit was too low or above the block limit
    pub fn is_gas_limit_error(&self) -> bool {
        self.mentions(&["gas limit", "out of gas", "intrinsic gas too low"])
    }

    /// Check if the node refused a submission because its nonce is already
    /// mined or held by a pending transaction
    pub fn is_nonce_taken(&self) -> bool {
        self.kind() == ErrorKind::SubmissionRejected
            && self.mentions(&[
                "nonce too low",
                "already known",
                "already imported",
                "replacement transaction underpriced",
            ])
    }

    fn mentions(&self, needles: &[&str]) -> bool {
        let text = self.to_string().to_lowercase();
        needles.iter().any(|needle| text.contains(needle))
    }
}

/// Result type for crate operations
pub type EvmResult<T> = Result<T, EvmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_looks_through_context() {
        let err = EvmError::SimulationReverted {
            operation: "eth_estimateGas".to_string(),
            message: "execution reverted".to_string(),
        }
        .context("estimate gas limit")
        .context("transfer on 0xabc");

        assert_eq!(err.kind(), ErrorKind::SimulationRevert);
        assert!(err.to_string().contains("execution reverted"));
        assert!(matches!(err.root(), EvmError::SimulationReverted { .. }));
    }

    #[test]
    fn test_mined_failure_is_distinct_from_timeout() {
        let mined = EvmError::MinedButFailed {
            tx_hash: "0x01".to_string(),
            block_number: 7,
            gas_used: 21_000,
        };
        let timeout = EvmError::Timeout {
            operation: "receipt".to_string(),
            tx_hash: "0x01".to_string(),
        };

        assert_ne!(mined.kind(), timeout.kind());
        assert!(mined.is_final());
        assert!(!mined.is_retryable());
        assert!(timeout.is_retryable());
        assert!(!timeout.is_final());
    }

    #[test]
    fn test_node_message_classifiers() {
        let funds = EvmError::SubmissionRejected {
            message: "insufficient funds for gas * price + value".to_string(),
        }
        .context("send transfer");
        assert!(funds.is_insufficient_funds());
        assert!(!funds.is_revert());
        assert!(!funds.is_nonce_taken());

        let revert = EvmError::Transport {
            operation: "eth_call".to_string(),
            message: "VM execution error".to_string(),
        };
        assert!(revert.is_revert());

        let gas = EvmError::SubmissionRejected {
            message: "intrinsic gas too low".to_string(),
        };
        assert!(gas.is_gas_limit_error());
        assert!(!gas.is_insufficient_funds());

        let nonce = EvmError::SubmissionRejected {
            message: "nonce too low: next nonce 5, tx nonce 4".to_string(),
        };
        assert!(nonce.is_nonce_taken());

        // Same wording outside a node rejection is not a nonce verdict
        let local = EvmError::invalid("nonce", "nonce too low");
        assert!(!local.is_nonce_taken());
    }
}
