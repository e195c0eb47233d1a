//! ERC20 operations performed by an operator account. Shared by the
//! settlement and the season reward pipelines.

use {
    crate::{
        domain::eth::{self, Address, OperationKind, TokenAddress, U256},
        infra::{
            blockchain::{
                self,
                Chain,
                contracts::{IBurnable, IERC20},
            },
            observe,
        },
    },
    alloy::sol_types::SolCall,
    dashmap::DashMap,
    serde::Deserialize,
    std::sync::Arc,
};

/// How tokens are taken out of circulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "method")]
pub enum BurnMethod {
    /// Call `burn(amount)` on the token itself.
    Burn,
    /// Transfer to an address nobody controls.
    TransferToSink { sink: Address },
}

pub struct Tokens {
    chain: Arc<dyn Chain>,
    decimals: DashMap<TokenAddress, u8>,
}

impl Tokens {
    pub fn new(chain: Arc<dyn Chain>) -> Self {
        Self {
            chain,
            decimals: Default::default(),
        }
    }

    pub fn chain(&self) -> &dyn Chain {
        self.chain.as_ref()
    }

    pub fn operator(&self) -> Address {
        self.chain.operator()
    }

    /// Balance of the operator account.
    pub async fn balance(&self, token: TokenAddress) -> Result<U256, blockchain::Error> {
        self.chain.balance_of(token, self.operator()).await
    }

    /// Token decimals. Cached since they never change.
    pub async fn decimals(&self, token: TokenAddress) -> Result<u8, blockchain::Error> {
        if let Some(decimals) = self.decimals.get(&token) {
            return Ok(*decimals);
        }
        let decimals = self.chain.decimals(token).await?;
        self.decimals.insert(token, decimals);
        observe::token_decimals(token, decimals);
        Ok(decimals)
    }

    pub async fn approve(
        &self,
        token: TokenAddress,
        spender: Address,
        amount: U256,
    ) -> Result<eth::Receipt, blockchain::Error> {
        let call = IERC20::approveCall { spender, amount };
        self.chain
            .send(eth::Tx::call(
                token.0,
                call.abi_encode(),
                OperationKind::Approve,
            ))
            .await
    }

    /// Grants the spender an unbounded allowance unless the current one
    /// already covers `required`. Returns the approval receipt if one was
    /// sent.
    pub async fn ensure_allowance(
        &self,
        token: TokenAddress,
        spender: Address,
        required: U256,
    ) -> Result<Option<eth::Receipt>, blockchain::Error> {
        let current = self
            .chain
            .allowance(token, self.operator(), spender)
            .await?;
        if current >= required {
            return Ok(None);
        }
        self.approve(token, spender, U256::MAX).await.map(Some)
    }

    pub async fn transfer(
        &self,
        token: TokenAddress,
        to: Address,
        amount: U256,
    ) -> Result<eth::Receipt, blockchain::Error> {
        let call = IERC20::transferCall { to, amount };
        self.chain
            .send(eth::Tx::call(
                token.0,
                call.abi_encode(),
                OperationKind::Transfer,
            ))
            .await
    }

    pub async fn burn(
        &self,
        token: TokenAddress,
        amount: U256,
        method: BurnMethod,
    ) -> Result<eth::Receipt, blockchain::Error> {
        match method {
            BurnMethod::Burn => {
                let call = IBurnable::burnCall { amount };
                let mut tx = eth::Tx::call(token.0, call.abi_encode(), OperationKind::Burn);
                // Burn implementations vary a lot in cost, prefer an estimate
                // over the ceiling when the node can provide one.
                tx.gas = self.chain.estimate_gas(&tx).await.ok();
                self.chain.send(tx).await
            }
            BurnMethod::TransferToSink { sink } => self.transfer(token, sink, amount).await,
        }
    }
}
