pub use alloy::primitives::{Address, B256, Bytes, U256};

/// Hash of a submitted transaction.
pub type TxHash = B256;

/// Chain ID as defined by EIP-155.
///
/// https://eips.ethereum.org/EIPS/eip-155
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

/// An ERC20 token address.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    derive_more::Display,
    derive_more::From,
    derive_more::Into,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct TokenAddress(pub Address);

/// Gas amount in gas units.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Gas(pub u64);

/// Gas price in wei.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GasPrice(pub u128);

impl From<u128> for GasPrice {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

/// The kind of operation a transaction performs. Determines the gas limit
/// fallback when no estimate is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum OperationKind {
    #[display("approve")]
    Approve,
    #[display("transfer")]
    Transfer,
    #[display("burn")]
    Burn,
    #[display("swap")]
    Swap,
    #[display("end_auction")]
    EndAuction,
}

/// A transaction that an operator signs and sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tx {
    pub to: Address,
    pub input: Bytes,
    pub value: U256,
    /// Gas estimate supplied by whoever built the transaction, if any.
    pub gas: Option<Gas>,
    pub kind: OperationKind,
}

impl Tx {
    /// A call without value and without a gas estimate.
    pub fn call(to: Address, input: impl Into<Bytes>, kind: OperationKind) -> Self {
        Self {
            to,
            input: input.into(),
            value: U256::ZERO,
            gas: None,
            kind,
        }
    }
}

/// A confirmed, successful transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub hash: TxHash,
    pub gas_used: Gas,
}
