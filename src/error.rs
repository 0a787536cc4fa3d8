use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProofTreeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Can not add user balances to an existing tree")]
    TreeAlreadyBuilt,

    #[error("Can not build a tree without any balance records")]
    EmptyLeafSet,

    #[error("Amount overflow at level {level}, index {index}")]
    AmountOverflow { level: usize, index: usize },

    #[error("Node not found: {0}")]
    NodeNotFound(usize),

    #[error("Node {0} is not a user leaf")]
    NotAUserLeaf(usize),

    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    #[error("Root mismatch: expected {expected}, got {got}")]
    RootMismatch { expected: String, got: String },

    #[error("Hash mismatch at index {index}: expected {expected}, got {got}")]
    HashMismatch {
        index: usize,
        expected: String,
        got: String,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ProofTreeError>;
