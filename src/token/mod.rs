//! Token module - typed facades over the standard token interfaces
//!
//! Each facade binds an account to a contract address. Reads go through
//! `call_contract_method`, writes through `Account::send_contract_method`.

mod erc1155;
mod erc20;
mod erc721;

pub use erc1155::{Erc1155, ERC1155_ABI};
pub use erc20::{Erc20, ERC20_ABI};
pub use erc721::{Erc721, ERC721_ABI};

use crate::account::Account;
use crate::address::parse_address;
use crate::error::{EvmError, EvmResult};
use crate::tx::{call_contract_method, SignedTx};

use ethers::abi::Token;
use ethers::types::{Address, U256};

/// An account bound to one contract and its ABI
#[derive(Debug, Clone, Copy)]
struct Bound<'a> {
    account: &'a Account,
    contract: Address,
    abi: &'static str,
}

impl<'a> Bound<'a> {
    fn new(account: &'a Account, contract: &str, abi: &'static str) -> EvmResult<Self> {
        Ok(Self {
            account,
            contract: parse_address("token contract", contract)?,
            abi,
        })
    }

    fn contract_hex(&self) -> String {
        format!("{:?}", self.contract)
    }

    async fn read(&self, method: &str, args: &[Token]) -> EvmResult<Vec<Token>> {
        call_contract_method(self.account, &self.contract_hex(), self.abi, method, args).await
    }

    async fn write(&self, method: &str, args: &[Token]) -> EvmResult<SignedTx> {
        self.account
            .send_contract_method(&self.contract_hex(), self.abi, method, U256::zero(), args)
            .await
    }
}

fn address_arg(field: &str, value: &str) -> EvmResult<Token> {
    Ok(Token::Address(parse_address(field, value)?))
}

fn uint_array(values: &[U256]) -> Token {
    Token::Array(values.iter().copied().map(Token::Uint).collect())
}

/// Parallel id/amount lists must be the same non-zero length
fn check_batch(ids: &[U256], amounts: &[U256]) -> EvmResult<()> {
    if ids.is_empty() {
        return Err(EvmError::invalid("token ids", "<empty>"));
    }
    if ids.len() != amounts.len() {
        return Err(EvmError::invalid(
            "token amounts",
            format!("{} amounts for {} ids", amounts.len(), ids.len()),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::chain::{MockLedger, Receipt, ReceiptStatus};

    use ethers::types::{H256, U256};

    /// Ledger expectations for one successful contract write
    pub fn expect_write(ledger: &mut MockLedger) {
        ledger.expect_pending_nonce().returning(|_| Ok(0));
        ledger.expect_estimate_gas().returning(|_| Ok(60_000));
        ledger
            .expect_max_priority_fee()
            .returning(|| Ok(U256::from(1_000_000_000u64)));
        ledger
            .expect_gas_price()
            .returning(|| Ok(U256::from(2_000_000_000u64)));
        ledger
            .expect_send_raw_transaction()
            .returning(|raw| Ok(H256::from(ethers::utils::keccak256(&raw))));
        ledger.expect_transaction_receipt().returning(|hash| {
            Ok(Some(Receipt {
                tx_hash: hash,
                status: ReceiptStatus::Success,
                block_number: 1,
                gas_used: 50_000,
                effective_gas_price: None,
            }))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_batch() {
        let one = [U256::one()];
        assert!(check_batch(&one, &one).is_ok());
        assert!(check_batch(&[], &[]).is_err());
        assert!(check_batch(&one, &[U256::one(), U256::one()]).is_err());
    }

    #[test]
    fn test_abis_parse() {
        for abi in [ERC20_ABI, ERC721_ABI, ERC1155_ABI] {
            assert!(crate::abi::AbiCoder::parse(abi).is_ok());
        }
    }
}
