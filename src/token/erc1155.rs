use super::{address_arg, check_batch, uint_array, Bound};
use crate::abi::{output_bool, output_string, output_uint, output_uint_array};
use crate::account::Account;
use crate::error::{EvmError, EvmResult};
use crate::tx::SignedTx;

use ethers::abi::Token;
use ethers::types::U256;

/// Multi-token interface with the common mint and burn extensions
pub const ERC1155_ABI: &str = r#"[
  {"type":"function","name":"balanceOf","stateMutability":"view","inputs":[{"name":"account","type":"address"},{"name":"id","type":"uint256"}],"outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"balanceOfBatch","stateMutability":"view","inputs":[{"name":"accounts","type":"address[]"},{"name":"ids","type":"uint256[]"}],"outputs":[{"name":"","type":"uint256[]"}]},
  {"type":"function","name":"uri","stateMutability":"view","inputs":[{"name":"id","type":"uint256"}],"outputs":[{"name":"","type":"string"}]},
  {"type":"function","name":"isApprovedForAll","stateMutability":"view","inputs":[{"name":"account","type":"address"},{"name":"operator","type":"address"}],"outputs":[{"name":"","type":"bool"}]},
  {"type":"function","name":"safeTransferFrom","stateMutability":"nonpayable","inputs":[{"name":"from","type":"address"},{"name":"to","type":"address"},{"name":"id","type":"uint256"},{"name":"amount","type":"uint256"},{"name":"data","type":"bytes"}],"outputs":[]},
  {"type":"function","name":"safeBatchTransferFrom","stateMutability":"nonpayable","inputs":[{"name":"from","type":"address"},{"name":"to","type":"address"},{"name":"ids","type":"uint256[]"},{"name":"amounts","type":"uint256[]"},{"name":"data","type":"bytes"}],"outputs":[]},
  {"type":"function","name":"setApprovalForAll","stateMutability":"nonpayable","inputs":[{"name":"operator","type":"address"},{"name":"approved","type":"bool"}],"outputs":[]},
  {"type":"function","name":"mint","stateMutability":"nonpayable","inputs":[{"name":"to","type":"address"},{"name":"id","type":"uint256"},{"name":"amount","type":"uint256"},{"name":"data","type":"bytes"}],"outputs":[]},
  {"type":"function","name":"mintBatch","stateMutability":"nonpayable","inputs":[{"name":"to","type":"address"},{"name":"ids","type":"uint256[]"},{"name":"amounts","type":"uint256[]"},{"name":"data","type":"bytes"}],"outputs":[]},
  {"type":"function","name":"burn","stateMutability":"nonpayable","inputs":[{"name":"from","type":"address"},{"name":"id","type":"uint256"},{"name":"amount","type":"uint256"}],"outputs":[]},
  {"type":"function","name":"burnBatch","stateMutability":"nonpayable","inputs":[{"name":"from","type":"address"},{"name":"ids","type":"uint256[]"},{"name":"amounts","type":"uint256[]"}],"outputs":[]}
]"#;

/// ERC1155 contract bound to an account
#[derive(Debug, Clone, Copy)]
pub struct Erc1155<'a> {
    inner: Bound<'a>,
}

impl<'a> Erc1155<'a> {
    pub fn new(account: &'a Account, contract: &str) -> EvmResult<Self> {
        Ok(Self {
            inner: Bound::new(account, contract, ERC1155_ABI)?,
        })
    }

    pub async fn balance_of(&self, holder: &str, id: U256) -> EvmResult<U256> {
        let args = [address_arg("holder", holder)?, Token::Uint(id)];
        output_uint("balanceOf", self.inner.read("balanceOf", &args).await?)
    }

    /// Balances for pairs `(holders[i], ids[i])`
    pub async fn balance_of_batch(&self, holders: &[&str], ids: &[U256]) -> EvmResult<Vec<U256>> {
        if holders.is_empty() || holders.len() != ids.len() {
            return Err(EvmError::invalid(
                "holders",
                format!("{} holders for {} ids", holders.len(), ids.len()),
            ));
        }
        let holders = holders
            .iter()
            .map(|h| address_arg("holder", h))
            .collect::<EvmResult<Vec<_>>>()?;
        let args = [Token::Array(holders), uint_array(ids)];
        output_uint_array("balanceOfBatch", self.inner.read("balanceOfBatch", &args).await?)
    }

    pub async fn uri(&self, id: U256) -> EvmResult<String> {
        output_string("uri", self.inner.read("uri", &[Token::Uint(id)]).await?)
    }

    pub async fn is_approved_for_all(&self, holder: &str, operator: &str) -> EvmResult<bool> {
        let args = [address_arg("holder", holder)?, address_arg("operator", operator)?];
        output_bool("isApprovedForAll", self.inner.read("isApprovedForAll", &args).await?)
    }

    /// Transfer `amount` of `id`; `data` may be empty
    pub async fn safe_transfer_from(
        &self,
        from: &str,
        to: &str,
        id: U256,
        amount: U256,
        data: &[u8],
    ) -> EvmResult<SignedTx> {
        let args = [
            address_arg("sender", from)?,
            address_arg("recipient", to)?,
            Token::Uint(id),
            Token::Uint(amount),
            Token::Bytes(data.to_vec()),
        ];
        self.inner.write("safeTransferFrom", &args).await
    }

    pub async fn safe_batch_transfer_from(
        &self,
        from: &str,
        to: &str,
        ids: &[U256],
        amounts: &[U256],
        data: &[u8],
    ) -> EvmResult<SignedTx> {
        check_batch(ids, amounts)?;
        let args = [
            address_arg("sender", from)?,
            address_arg("recipient", to)?,
            uint_array(ids),
            uint_array(amounts),
            Token::Bytes(data.to_vec()),
        ];
        self.inner.write("safeBatchTransferFrom", &args).await
    }

    pub async fn set_approval_for_all(&self, operator: &str, approved: bool) -> EvmResult<SignedTx> {
        let args = [address_arg("operator", operator)?, Token::Bool(approved)];
        self.inner.write("setApprovalForAll", &args).await
    }

    pub async fn mint(&self, to: &str, id: U256, amount: U256, data: &[u8]) -> EvmResult<SignedTx> {
        let args = [
            address_arg("recipient", to)?,
            Token::Uint(id),
            Token::Uint(amount),
            Token::Bytes(data.to_vec()),
        ];
        self.inner.write("mint", &args).await
    }

    pub async fn mint_batch(
        &self,
        to: &str,
        ids: &[U256],
        amounts: &[U256],
        data: &[u8],
    ) -> EvmResult<SignedTx> {
        check_batch(ids, amounts)?;
        let args = [
            address_arg("recipient", to)?,
            uint_array(ids),
            uint_array(amounts),
            Token::Bytes(data.to_vec()),
        ];
        self.inner.write("mintBatch", &args).await
    }

    pub async fn burn(&self, from: &str, id: U256, amount: U256) -> EvmResult<SignedTx> {
        let args = [address_arg("holder", from)?, Token::Uint(id), Token::Uint(amount)];
        self.inner.write("burn", &args).await
    }

    pub async fn burn_batch(&self, from: &str, ids: &[U256], amounts: &[U256]) -> EvmResult<SignedTx> {
        check_batch(ids, amounts)?;
        let args = [address_arg("holder", from)?, uint_array(ids), uint_array(amounts)];
        self.inner.write("burnBatch", &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{test_account, TEST_ADDRESS};
    use crate::chain::MockLedger;
    use crate::token::testing::expect_write;

    use ethers::abi::AbiEncode;
    use ethers::types::Bytes;

    const MULTI: &str = "0xD32D26054099DbB5A14387d0cF15Df4452EFE4a9";

    #[tokio::test]
    async fn test_balance_of_batch() {
        let mut ledger = MockLedger::new();
        ledger
            .expect_call()
            .returning(|_| Ok(Bytes::from(vec![U256::from(3u64), U256::from(9u64)].encode())));
        let account = test_account(ledger, 1);
        let multi = Erc1155::new(&account, MULTI).unwrap();

        let balances = multi
            .balance_of_batch(&[TEST_ADDRESS, MULTI], &[U256::one(), U256::from(2u64)])
            .await
            .unwrap();
        assert_eq!(balances, vec![U256::from(3u64), U256::from(9u64)]);

        assert!(multi.balance_of_batch(&[TEST_ADDRESS], &[]).await.is_err());
        assert!(multi
            .balance_of_batch(&["0x1"], &[U256::one()])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_batch_lengths_checked_before_send() {
        let mut ledger = MockLedger::new();
        ledger.expect_send_raw_transaction().never();
        let account = test_account(ledger, 1);
        let multi = Erc1155::new(&account, MULTI).unwrap();

        assert!(multi
            .mint_batch(TEST_ADDRESS, &[U256::one()], &[], &[])
            .await
            .is_err());
        assert!(multi.burn_batch(TEST_ADDRESS, &[], &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_mint_sends_encoded_call() {
        let mut ledger = MockLedger::new();
        expect_write(&mut ledger);
        let account = test_account(ledger, 1);
        let multi = Erc1155::new(&account, MULTI).unwrap();

        let signed = multi
            .mint(TEST_ADDRESS, U256::from(4u64), U256::from(10u64), &[])
            .await
            .unwrap();
        assert_eq!(
            signed.data()[..4],
            ethers::utils::id("mint(address,uint256,uint256,bytes)")[..]
        );
    }
}
