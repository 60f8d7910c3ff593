//! Gas parameter resolution and pricing strategies

use crate::account::Account;
use crate::chain::CallRequest;
use crate::error::{EvmError, EvmResult};
use crate::tx::TxVariant;

use ethers::types::U256;
use serde::Deserialize;
use tracing::debug;

/// Upper bound accepted by `validate_gas_params`
pub const MAX_GAS_LIMIT: u64 = 30_000_000;

/// A parameter the caller either fixes or leaves to the planner.
///
/// `Explicit(0)` is a genuine zero, not a request for auto-resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting<T> {
    Auto,
    Explicit(T),
}

impl<T> Default for Setting<T> {
    fn default() -> Self {
        Setting::Auto
    }
}

impl<T: Copy> Setting<T> {
    /// The fixed value, if any
    pub fn explicit(self) -> Option<T> {
        match self {
            Setting::Auto => None,
            Setting::Explicit(v) => Some(v),
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Setting::Auto)
    }
}

impl<T> From<Option<T>> for Setting<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Setting::Explicit(v),
            None => Setting::Auto,
        }
    }
}

/// Multiplier applied to the node's suggested gas price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasStrategy {
    /// Suggested price verbatim
    #[default]
    Standard,
    /// 1.5x suggested
    Fast,
    /// 0.8x suggested
    Slow,
    /// Suggested plus 10%, never below suggested
    Auto,
}

impl GasStrategy {
    /// Apply the strategy to a suggested price, saturating at `U256::MAX`
    pub fn apply(self, suggested: U256) -> U256 {
        let scaled = |percent: u64| percent_of(suggested, percent).unwrap_or(U256::MAX);
        match self {
            GasStrategy::Standard => suggested,
            GasStrategy::Fast => scaled(150),
            GasStrategy::Slow => scaled(80),
            GasStrategy::Auto => std::cmp::max(suggested, scaled(110)),
        }
    }
}

/// `value * percent / 100`, `None` on overflow
pub fn percent_of(value: U256, percent: u64) -> Option<U256> {
    value.checked_mul(U256::from(percent)).map(|v| v / 100)
}

/// `percent_of` as an input error naming `field`
fn bump(field: &str, value: U256, percent: u64) -> EvmResult<U256> {
    percent_of(value, percent)
        .ok_or_else(|| EvmError::invalid(field, format!("{} x {}% overflows", value, percent)))
}

/// Gas pricing model; exactly one applies to a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pricing {
    Legacy {
        gas_price: U256,
    },
    Dynamic {
        max_priority_fee_per_gas: U256,
        max_fee_per_gas: U256,
    },
}

impl Pricing {
    pub fn legacy(gas_price: U256) -> Self {
        Pricing::Legacy { gas_price }
    }

    /// EIP-1559 fees; a cap below the tip is raised to the tip
    pub fn dynamic(max_priority_fee_per_gas: U256, max_fee_per_gas: U256) -> Self {
        Pricing::Dynamic {
            max_priority_fee_per_gas,
            max_fee_per_gas: std::cmp::max(max_fee_per_gas, max_priority_fee_per_gas),
        }
    }

    /// Transaction format this pricing signs as
    pub fn variant(&self) -> TxVariant {
        match self {
            Pricing::Legacy { .. } => TxVariant::Legacy,
            Pricing::Dynamic { .. } => TxVariant::Dynamic,
        }
    }

    /// Most the sender can pay per gas unit
    pub fn max_price_per_gas(&self) -> U256 {
        match self {
            Pricing::Legacy { gas_price } => *gas_price,
            Pricing::Dynamic { max_fee_per_gas, .. } => *max_fee_per_gas,
        }
    }
}

/// Fully resolved gas parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasParams {
    pub gas_limit: u64,
    pub pricing: Pricing,
}

/// Fills gas limit and price gaps from the ledger
#[derive(Debug, Clone, Copy, Default)]
pub struct GasPlanner {
    /// Strategy applied to auto-resolved legacy prices
    strategy: GasStrategy,
}

impl GasPlanner {
    /// Create a new gas planner
    pub fn new(strategy: GasStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> GasStrategy {
        self.strategy
    }

    /// Resolve legacy gas parameters for `call`.
    ///
    /// An auto gas limit comes from `estimate_gas`, whose failure is
    /// propagated. An auto price is the suggested price under the strategy.
    pub async fn process_gas_params(
        &self,
        account: &Account,
        gas_limit: Setting<u64>,
        gas_price: Setting<U256>,
        call: &CallRequest,
    ) -> EvmResult<GasParams> {
        let gas_limit = self.resolve_gas_limit(account, gas_limit, call).await?;
        let gas_price = self.resolve_gas_price(account, gas_price).await?;

        debug!(
            "Resolved legacy gas: limit {}, price {} ({:?})",
            gas_limit, gas_price, self.strategy
        );
        Ok(GasParams {
            gas_limit,
            pricing: Pricing::legacy(gas_price),
        })
    }

    /// Explicit limit, or the ledger's estimate for `call`
    pub async fn resolve_gas_limit(
        &self,
        account: &Account,
        gas_limit: Setting<u64>,
        call: &CallRequest,
    ) -> EvmResult<u64> {
        match gas_limit {
            Setting::Explicit(limit) => Ok(limit),
            Setting::Auto => account
                .estimate_call(call)
                .await
                .map_err(|e| e.context("estimate gas limit")),
        }
    }

    /// Explicit price, or the suggested price under the strategy
    pub async fn resolve_gas_price(
        &self,
        account: &Account,
        gas_price: Setting<U256>,
    ) -> EvmResult<U256> {
        match gas_price {
            Setting::Explicit(price) => Ok(price),
            Setting::Auto => {
                let suggested = account
                    .suggest_gas_price()
                    .await
                    .map_err(|e| e.context("suggest gas price"))?;
                Ok(self.strategy.apply(suggested))
            }
        }
    }

    /// Resolve EIP-1559 fees.
    ///
    /// Auto tip is the node's suggestion; auto cap is twice the suggested
    /// legacy price. The cap never ends up below the tip.
    pub async fn resolve_dynamic_fees(
        &self,
        account: &Account,
        tip: Setting<U256>,
        fee_cap: Setting<U256>,
    ) -> EvmResult<Pricing> {
        let tip = match tip {
            Setting::Explicit(tip) => tip,
            Setting::Auto => account
                .suggest_gas_tip_cap()
                .await
                .map_err(|e| e.context("suggest gas tip cap"))?,
        };
        let fee_cap = match fee_cap {
            Setting::Explicit(cap) => cap,
            Setting::Auto => account
                .suggest_gas_fee_cap()
                .await
                .map_err(|e| e.context("suggest gas fee cap"))?,
        };

        let pricing = Pricing::dynamic(tip, fee_cap);
        debug!("Resolved dynamic fees: {:?}", pricing);
        Ok(pricing)
    }

    /// Calculate speed-up pricing for a stuck transaction (`percent` of current)
    pub fn speed_up(pricing: &Pricing, percent: u64) -> EvmResult<Pricing> {
        match pricing {
            Pricing::Legacy { gas_price } => {
                Ok(Pricing::legacy(bump("gas price", *gas_price, percent)?))
            }
            Pricing::Dynamic {
                max_priority_fee_per_gas,
                max_fee_per_gas,
            } => Ok(Pricing::dynamic(
                bump("gas tip cap", *max_priority_fee_per_gas, percent)?,
                bump("gas fee cap", *max_fee_per_gas, percent)?,
            )),
        }
    }

    /// Calculate the maximum fee in wei
    pub fn calculate_cost(gas_limit: u64, pricing: &Pricing) -> EvmResult<U256> {
        let price = pricing.max_price_per_gas();
        U256::from(gas_limit).checked_mul(price).ok_or_else(|| {
            EvmError::invalid("gas cost", format!("{} x {} overflows", gas_limit, price))
        })
    }

    /// Value plus maximum fee
    pub fn total_cost(value: U256, params: &GasParams) -> EvmResult<U256> {
        let fee = Self::calculate_cost(params.gas_limit, &params.pricing)?;
        value
            .checked_add(fee)
            .ok_or_else(|| EvmError::invalid("total cost", format!("{} + {} overflows", value, fee)))
    }

    /// Sanity check caller-supplied gas values
    pub fn validate_gas_params(gas_limit: u64, gas_price: U256) -> EvmResult<()> {
        if gas_limit == 0 || gas_limit > MAX_GAS_LIMIT {
            return Err(EvmError::invalid("gas limit", gas_limit.to_string()));
        }
        if gas_price.is_zero() {
            return Err(EvmError::invalid("gas price", "0"));
        }
        Self::calculate_cost(gas_limit, &Pricing::legacy(gas_price))?;
        Ok(())
    }
}
