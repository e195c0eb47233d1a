use {
    self::contracts::IERC20,
    crate::{
        domain::eth::{self, Address, Gas, GasPrice, TokenAddress, U256},
        infra::observe,
    },
    alloy::{
        network::{EthereumWallet, TransactionBuilder},
        providers::{DynProvider, Provider, ProviderBuilder},
        rpc::types::TransactionRequest,
        signers::local::PrivateKeySigner,
    },
    std::{fmt, time::Duration},
    url::Url,
};

pub mod auction;
pub mod contracts;
pub mod gas;

pub use auction::{AuctionChain, OnchainAuctions};

/// Default time to wait for a transaction to be included.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Access to the chain on behalf of a single operator account.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Chain: Send + Sync {
    /// The account that signs every transaction sent through this client.
    fn operator(&self) -> Address;

    async fn balance_of(&self, token: TokenAddress, owner: Address) -> Result<U256, Error>;

    async fn decimals(&self, token: TokenAddress) -> Result<u8, Error>;

    async fn allowance(
        &self,
        token: TokenAddress,
        owner: Address,
        spender: Address,
    ) -> Result<U256, Error>;

    /// The network's current gas price, before any markup.
    async fn gas_price(&self) -> Result<GasPrice, Error>;

    async fn estimate_gas(&self, tx: &eth::Tx) -> Result<Gas, Error>;

    /// Signs and sends the transaction, then waits for it to be confirmed.
    /// A reverted transaction is an error.
    async fn send(&self, tx: eth::Tx) -> Result<eth::Receipt, Error>;
}

/// An operator key bound to the RPC endpoint its transactions go through.
#[derive(Clone)]
pub struct SignerContext {
    signer: PrivateKeySigner,
    rpc: Url,
}

impl SignerContext {
    pub fn new(
        private_key: &str,
        rpc: Url,
    ) -> Result<Self, alloy::signers::local::LocalSignerError> {
        Ok(Self {
            signer: private_key.trim().parse()?,
            rpc,
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

impl fmt::Debug for SignerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerContext")
            .field("address", &self.address())
            .field("rpc", &self.rpc.as_str())
            .finish()
    }
}

/// The Ethereum client of one operator.
///
/// Transactions are submitted one at a time: the submission lock is held from
/// the moment the nonce gets assigned until the receipt is in, so concurrent
/// callers sharing the operator queue up in FIFO order.
pub struct Ethereum {
    provider: DynProvider,
    operator: Address,
    gas: gas::Policy,
    confirmation_timeout: Duration,
    submission: tokio::sync::Mutex<()>,
}

impl Ethereum {
    pub fn new(context: &SignerContext, gas: gas::Policy, confirmation_timeout: Duration) -> Self {
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(context.signer.clone()))
            .connect_http(context.rpc.clone())
            .erased();
        Self {
            provider,
            operator: context.address(),
            gas,
            confirmation_timeout,
            submission: Default::default(),
        }
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    fn request(&self, tx: &eth::Tx) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.operator)
            .with_to(tx.to)
            .with_input(tx.input.clone())
            .with_value(tx.value)
    }
}

#[async_trait::async_trait]
impl Chain for Ethereum {
    fn operator(&self) -> Address {
        self.operator
    }

    async fn balance_of(&self, token: TokenAddress, owner: Address) -> Result<U256, Error> {
        Ok(IERC20::new(token.0, self.provider.clone())
            .balanceOf(owner)
            .call()
            .await?)
    }

    async fn decimals(&self, token: TokenAddress) -> Result<u8, Error> {
        Ok(IERC20::new(token.0, self.provider.clone())
            .decimals()
            .call()
            .await?)
    }

    async fn allowance(
        &self,
        token: TokenAddress,
        owner: Address,
        spender: Address,
    ) -> Result<U256, Error> {
        Ok(IERC20::new(token.0, self.provider.clone())
            .allowance(owner, spender)
            .call()
            .await?)
    }

    async fn gas_price(&self) -> Result<GasPrice, Error> {
        Ok(GasPrice(self.provider.get_gas_price().await?))
    }

    async fn estimate_gas(&self, tx: &eth::Tx) -> Result<Gas, Error> {
        Ok(Gas(self.provider.estimate_gas(self.request(tx)).await?))
    }

    async fn send(&self, tx: eth::Tx) -> Result<eth::Receipt, Error> {
        let kind = tx.kind;
        let result = self.submit(tx).await;
        observe::transaction(kind, self.operator, &result);
        result
    }
}

impl Ethereum {
    async fn submit(&self, tx: eth::Tx) -> Result<eth::Receipt, Error> {
        let _submission = self.submission.lock().await;

        let gas_price = self.gas.price(self.gas_price().await?);
        let gas_limit = self.gas.limit(tx.gas, tx.kind);
        let request = self
            .request(&tx)
            .with_gas_limit(gas_limit.0)
            .with_gas_price(gas_price.0);

        let pending = self.provider.send_transaction(request).await?;
        let hash = *pending.tx_hash();
        observe::transaction_sent(tx.kind, self.operator, hash, gas_price, gas_limit);

        let receipt = pending
            .with_timeout(Some(self.confirmation_timeout))
            .get_receipt()
            .await
            .map_err(|err| Error::Confirmation(hash, err))?;
        if !receipt.status() {
            return Err(Error::Reverted(hash));
        }
        Ok(eth::Receipt {
            hash,
            gas_used: Gas(receipt.gas_used),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("rpc error: {0}")]
    Rpc(#[from] alloy::transports::TransportError),
    #[error("contract call error: {0}")]
    Call(#[from] alloy::contract::Error),
    #[error("transaction {0} was not confirmed: {1}")]
    Confirmation(eth::TxHash, #[source] alloy::providers::PendingTransactionError),
    #[error("transaction {0} reverted")]
    Reverted(eth::TxHash),
}
