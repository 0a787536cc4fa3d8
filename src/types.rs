use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the published hex hash of every node
pub const HEX_LEN: usize = 16;

/// Operator identifier written into every proof dump line
pub const DEFAULT_ORG_ID: u64 = 6002;

/// Base offset for proof dump ids of assets without an explicit offset
pub const DEFAULT_ID_OFFSET: u64 = 1_000_000;

/// Zero-amount record appended when the number of balances is odd
pub const SENTINEL_RECORD: BalanceRecord = BalanceRecord {
    owner_id: 0,
    nonce: 0,
    amount: 0,
};

/// A single user balance, as parsed from the balance list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub owner_id: i64,

    /// Monotonic sequence number per owner
    pub nonce: i64,

    /// Real amount scaled by 10^8
    pub amount: i64,
}

impl BalanceRecord {
    pub fn new(owner_id: i64, nonce: i64, amount: i64) -> Self {
        Self {
            owner_id,
            nonce,
            amount,
        }
    }
}

impl fmt::Display for BalanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.owner_id, self.nonce, self.amount)
    }
}

/// Hex rendering applied to digests before truncation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HexEncoding {
    /// Each byte rendered without zero padding, matching previously published proofs
    #[default]
    Legacy,
    /// Fixed-width two characters per byte
    ZeroPadded,
}

/// A balance record together with its content hash, ready to become a leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedLeaf {
    pub record: BalanceRecord,
    pub hash: Vec<u8>,
    pub hex_hash: String,
}

impl HashedLeaf {
    pub fn amount(&self) -> i64 {
        self.record.amount
    }
}

/// What a node in the flat array stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Level-0 node carrying a real user balance
    Leaf,
    /// Level-0 node for the zero-amount sentinel record
    Sentinel,
    /// Duplicate of the last node of an odd-sized level
    Padding,
    /// Parent of two nodes one level below
    Internal,
}

/// Role of a node within one user's proof chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofRole {
    #[serde(rename = "SELF")]
    SelfLeaf,
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "RELEVANT")]
    Relevant,
    #[serde(rename = "NODE")]
    Node,
    #[serde(rename = "ROOT")]
    Root,
}

impl fmt::Display for ProofRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofRole::SelfLeaf => write!(f, "SELF"),
            ProofRole::User => write!(f, "USER"),
            ProofRole::Relevant => write!(f, "RELEVANT"),
            ProofRole::Node => write!(f, "NODE"),
            ProofRole::Root => write!(f, "ROOT"),
        }
    }
}

/// A node of the proof tree, addressed by its position in the flat node array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Dense position in the flat node array
    pub index: usize,

    /// 0 for leaves, increasing towards the root
    pub level: usize,

    /// Sum of all leaf amounts below this node (0 for padding nodes)
    pub amount_sum: i64,

    /// Raw digest bytes
    pub hash: Vec<u8>,

    /// Truncated hex rendering of `hash`
    pub hex_hash: String,

    /// Index of the parent node, `None` for the root
    pub parent: Option<usize>,

    pub kind: NodeKind,

    /// Source record, level-0 nodes only
    pub record: Option<BalanceRecord>,
}

impl TreeNode {
    pub(crate) fn leaf(index: usize, leaf: HashedLeaf, kind: NodeKind) -> Self {
        Self {
            index,
            level: 0,
            amount_sum: leaf.amount(),
            hash: leaf.hash,
            hex_hash: leaf.hex_hash,
            parent: None,
            kind,
            record: Some(leaf.record),
        }
    }

    /// Duplicate this node for padding: same level and hash, zero amount
    pub(crate) fn padding(&self, index: usize) -> Self {
        Self {
            index,
            level: self.level,
            amount_sum: 0,
            hash: self.hash.clone(),
            hex_hash: self.hex_hash.clone(),
            parent: None,
            kind: NodeKind::Padding,
            record: None,
        }
    }

    pub fn is_user_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Index of the node paired with this one; levels always start at an even index
    pub fn sibling_index(&self) -> usize {
        self.index ^ 1
    }

    pub fn is_left(&self) -> bool {
        self.index % 2 == 0
    }
}
