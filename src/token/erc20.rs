use super::{address_arg, Bound};
use crate::abi::{output_string, output_uint};
use crate::account::Account;
use crate::error::{EvmError, EvmResult};
use crate::tx::SignedTx;

use ethers::abi::Token;
use ethers::types::U256;

/// Fungible token interface
pub const ERC20_ABI: &str = r#"[
  {"type":"function","name":"name","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"string"}]},
  {"type":"function","name":"symbol","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"string"}]},
  {"type":"function","name":"decimals","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"uint8"}]},
  {"type":"function","name":"totalSupply","stateMutability":"view","inputs":[],"outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"balanceOf","stateMutability":"view","inputs":[{"name":"owner","type":"address"}],"outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"allowance","stateMutability":"view","inputs":[{"name":"owner","type":"address"},{"name":"spender","type":"address"}],"outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"transfer","stateMutability":"nonpayable","inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]},
  {"type":"function","name":"transferFrom","stateMutability":"nonpayable","inputs":[{"name":"from","type":"address"},{"name":"to","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]},
  {"type":"function","name":"approve","stateMutability":"nonpayable","inputs":[{"name":"spender","type":"address"},{"name":"value","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]}
]"#;

/// ERC20 token bound to an account
#[derive(Debug, Clone, Copy)]
pub struct Erc20<'a> {
    inner: Bound<'a>,
}

impl<'a> Erc20<'a> {
    pub fn new(account: &'a Account, contract: &str) -> EvmResult<Self> {
        Ok(Self {
            inner: Bound::new(account, contract, ERC20_ABI)?,
        })
    }

    pub async fn name(&self) -> EvmResult<String> {
        output_string("name", self.inner.read("name", &[]).await?)
    }

    pub async fn symbol(&self) -> EvmResult<String> {
        output_string("symbol", self.inner.read("symbol", &[]).await?)
    }

    pub async fn decimals(&self) -> EvmResult<u8> {
        let value = output_uint("decimals", self.inner.read("decimals", &[]).await?)?;
        if value > U256::from(u8::MAX) {
            return Err(EvmError::Abi(format!("decimals out of range: {}", value)));
        }
        Ok(value.low_u32() as u8)
    }

    pub async fn total_supply(&self) -> EvmResult<U256> {
        output_uint("totalSupply", self.inner.read("totalSupply", &[]).await?)
    }

    pub async fn balance_of(&self, owner: &str) -> EvmResult<U256> {
        let args = [address_arg("owner", owner)?];
        output_uint("balanceOf", self.inner.read("balanceOf", &args).await?)
    }

    pub async fn allowance(&self, owner: &str, spender: &str) -> EvmResult<U256> {
        let args = [address_arg("owner", owner)?, address_arg("spender", spender)?];
        output_uint("allowance", self.inner.read("allowance", &args).await?)
    }

    /// Move `amount` base units from this account to `to`
    pub async fn transfer(&self, to: &str, amount: U256) -> EvmResult<SignedTx> {
        let args = [address_arg("recipient", to)?, Token::Uint(amount)];
        self.inner.write("transfer", &args).await
    }

    /// Spend an allowance granted by `from`
    pub async fn transfer_from(&self, from: &str, to: &str, amount: U256) -> EvmResult<SignedTx> {
        let args = [
            address_arg("owner", from)?,
            address_arg("recipient", to)?,
            Token::Uint(amount),
        ];
        self.inner.write("transferFrom", &args).await
    }

    pub async fn approve(&self, spender: &str, amount: U256) -> EvmResult<SignedTx> {
        let args = [address_arg("spender", spender)?, Token::Uint(amount)];
        self.inner.write("approve", &args).await
    }
}
