use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chain database already exists at {0}")]
    AlreadyExists(String),

    #[error("chain database not found at {0}")]
    ChainNotFound(String),

    #[error("transaction {0} not found")]
    TxNotFound(String),

    #[error("wallet not found for address {0}")]
    WalletNotFound(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("previous transaction {0} missing from reference set")]
    PrevTxMissing(String),

    #[error("signature verification failed for input {0}")]
    InvalidSignature(usize),

    #[error("could not parse pubkey for input {0}")]
    UnknownPubkey(usize),

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },

    #[error("mining exhausted nonce space without finding a valid hash")]
    MiningExhausted,

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("sled transaction error: {0}")]
    SledTransaction(String),

    #[error("block serialization error: {0}")]
    BlockCodec(String),

    #[error("transaction serialization error: {0}")]
    TransactionCodec(String),

    #[error("utxo entry serialization error: {0}")]
    UtxoCodec(String),

    #[error("wallet set serialization error: {0}")]
    WalletCodec(String),

    #[error("keypair generation error: {0}")]
    KeyPairGeneration(String),

    #[error("signing error: {0}")]
    Signing(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
