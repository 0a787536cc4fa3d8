use crate::error::{ProofTreeError, Result};
use crate::leaf::{hash_node, hash_record, hash_records};
use crate::types::{BalanceRecord, HashedLeaf, HexEncoding, NodeKind, TreeNode, SENTINEL_RECORD};
use rayon::prelude::*;
use tracing::{debug, trace};

/// Merkle sum tree over the balances of one asset.
///
/// All nodes live in one flat array in construction order: every leaf, then
/// every node of level 1, and so on up to the root, which is always the last
/// node. Parents are referenced by index. The tree is write-once: a second
/// build on the same instance fails with [`ProofTreeError::TreeAlreadyBuilt`].
#[derive(Debug, Clone)]
pub struct ProofTree {
    asset: String,
    created: i64,
    encoding: HexEncoding,
    parallel: bool,
    nodes: Vec<TreeNode>,
    /// First flat index of each level
    level_starts: Vec<usize>,
}

impl ProofTree {
    /// Create an empty tree for `asset`, stamped with `created` (ms since epoch)
    pub fn new(asset: impl Into<String>, created: i64) -> Self {
        Self {
            asset: asset.into(),
            created,
            encoding: HexEncoding::default(),
            parallel: false,
            nodes: Vec::new(),
            level_starts: Vec::new(),
        }
    }

    pub fn with_encoding(mut self, encoding: HexEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Hash the pairs of each level on the rayon pool
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Hash `balances` into leaves and build the tree over them
    pub fn init_with_balances(&mut self, balances: &[BalanceRecord]) -> Result<()> {
        if !self.nodes.is_empty() {
            return Err(ProofTreeError::TreeAlreadyBuilt);
        }
        let leaves = hash_records(balances, self.encoding);
        self.build(leaves)
    }

    /// Build the tree over already hashed leaves, in the given order
    pub fn build(&mut self, leaves: Vec<HashedLeaf>) -> Result<()> {
        if !self.nodes.is_empty() {
            return Err(ProofTreeError::TreeAlreadyBuilt);
        }
        if leaves.is_empty() {
            return Err(ProofTreeError::EmptyLeafSet);
        }

        let (nodes, level_starts) = build_levels(leaves, self.encoding, self.parallel)?;

        if let Some(root) = nodes.last() {
            debug!(
                asset = %self.asset,
                nodes = nodes.len(),
                levels = level_starts.len(),
                root = %root.hex_hash,
                amount = root.amount_sum,
                "proof tree built"
            );
        }

        self.nodes = nodes;
        self.level_starts = level_starts;
        Ok(())
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    /// Creation timestamp in milliseconds since epoch
    pub fn created(&self) -> i64 {
        self.created
    }

    pub fn encoding(&self) -> HexEncoding {
        self.encoding
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.nodes.last()
    }

    pub fn root_hash(&self) -> Option<&str> {
        self.root().map(|root| root.hex_hash.as_str())
    }

    /// Sum of all user amounts, 0 for an unbuilt tree
    pub fn total_amount(&self) -> i64 {
        self.root().map(|root| root.amount_sum).unwrap_or(0)
    }

    /// Number of levels including the leaves and the root
    pub fn levels(&self) -> usize {
        self.level_starts.len()
    }

    /// Nodes of one level, padding included
    pub fn level_nodes(&self, level: usize) -> &[TreeNode] {
        let Some(&start) = self.level_starts.get(level) else {
            return &[];
        };
        let end = self
            .level_starts
            .get(level + 1)
            .copied()
            .unwrap_or(self.nodes.len());
        &self.nodes[start..end]
    }

    /// Level-0 nodes carrying a real balance record
    pub fn user_leaves(&self) -> impl Iterator<Item = &TreeNode> {
        self.level_nodes(0).iter().filter(|node| node.is_user_leaf())
    }

    pub fn user_count(&self) -> usize {
        self.user_leaves().count()
    }

    /// Flat index of the leaf holding `owner_id`'s balance at `nonce`
    pub fn leaf_index_of(&self, owner_id: i64, nonce: i64) -> Option<usize> {
        self.user_leaves()
            .find(|node| {
                node.record
                    .map(|r| r.owner_id == owner_id && r.nonce == nonce)
                    .unwrap_or(false)
            })
            .map(|node| node.index)
    }
}

/// Build the flat node array bottom-up and return it with the start index of each level
fn build_levels(
    leaves: Vec<HashedLeaf>,
    encoding: HexEncoding,
    parallel: bool,
) -> Result<(Vec<TreeNode>, Vec<usize>)> {
    let mut nodes: Vec<TreeNode> = leaves
        .into_iter()
        .enumerate()
        .map(|(index, leaf)| TreeNode::leaf(index, leaf, NodeKind::Leaf))
        .collect();

    // Pad the leaves to an even count with the sentinel record
    if nodes.len() % 2 == 1 {
        let sentinel = hash_record(&SENTINEL_RECORD, encoding);
        nodes.push(TreeNode::leaf(nodes.len(), sentinel, NodeKind::Sentinel));
    }

    let mut level_starts = vec![0];
    let mut start = 0;
    let mut level = 0;

    loop {
        let end = nodes.len();
        let new_start = end;
        level += 1;

        let parents = pair_level(&nodes[start..end], new_start, encoding, parallel)?;

        for (offset, (amount_sum, hash, hex_hash)) in parents.into_iter().enumerate() {
            let index = new_start + offset;
            let left = start + 2 * offset;
            nodes[left].parent = Some(index);
            nodes[left + 1].parent = Some(index);

            nodes.push(TreeNode {
                index,
                level,
                amount_sum,
                hash,
                hex_hash,
                parent: None,
                kind: NodeKind::Internal,
                record: None,
            });
        }
        level_starts.push(new_start);

        let produced = nodes.len() - new_start;
        trace!(level, produced, "level paired");
        if produced == 1 {
            break;
        }

        if produced % 2 == 1 {
            let padding = nodes[nodes.len() - 1].padding(nodes.len());
            nodes.push(padding);
        }

        start = new_start;
    }

    Ok((nodes, level_starts))
}

/// Hash every adjacent pair of an even-sized level. `first_index` is the flat
/// index the first parent will take.
fn pair_level(
    level: &[TreeNode],
    first_index: usize,
    encoding: HexEncoding,
    parallel: bool,
) -> Result<Vec<(i64, Vec<u8>, String)>> {
    let hash_pair = |(offset, pair): (usize, &[TreeNode])| -> Result<(i64, Vec<u8>, String)> {
        let (left, right) = (&pair[0], &pair[1]);
        let amount_sum = left.amount_sum.checked_add(right.amount_sum).ok_or(
            ProofTreeError::AmountOverflow {
                level: left.level + 1,
                index: first_index + offset,
            },
        )?;
        let (hash, hex_hash) = hash_node(amount_sum, &left.hex_hash, &right.hex_hash, encoding);
        Ok((amount_sum, hash, hex_hash))
    };

    if parallel {
        level.par_chunks(2).enumerate().map(hash_pair).collect()
    } else {
        level.chunks(2).enumerate().map(hash_pair).collect()
    }
}
