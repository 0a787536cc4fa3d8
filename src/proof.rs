use crate::error::{ProofTreeError, Result};
use crate::leaf::{hash_node, hash_record};
use crate::merkle_tree::ProofTree;
use crate::serialize::FlatNodeRecord;
use crate::types::{BalanceRecord, HexEncoding, ProofRole, TreeNode};
use rayon::prelude::*;

/// A node of the tree as it appears in one user's proof chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofEntry<'a> {
    pub node: &'a TreeNode,
    pub role: ProofRole,
}

/// Ordered path from a user leaf to the root.
///
/// Entries are `SELF`, `USER`, then one `RELEVANT`/`NODE` pair per level
/// (ancestor, ancestor's sibling), ending with the `ROOT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofChain<'a> {
    pub leaf_index: usize,
    pub entries: Vec<ProofEntry<'a>>,
}

impl<'a> ProofChain<'a> {
    pub fn leaf(&self) -> Option<&'a TreeNode> {
        self.entries.first().map(|entry| entry.node)
    }

    pub fn record(&self) -> Option<BalanceRecord> {
        self.leaf().and_then(|leaf| leaf.record)
    }

    pub fn root(&self) -> Option<&'a TreeNode> {
        self.entries
            .last()
            .filter(|entry| entry.role == ProofRole::Root)
            .map(|entry| entry.node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ProofTree {
    /// Proof chain for the user leaf at `leaf_index`
    pub fn proof_chain(&self, leaf_index: usize) -> Result<ProofChain<'_>> {
        let leaf = self
            .node(leaf_index)
            .ok_or(ProofTreeError::NodeNotFound(leaf_index))?;
        if !leaf.is_user_leaf() {
            return Err(ProofTreeError::NotAUserLeaf(leaf_index));
        }

        let mut entries = vec![ProofEntry {
            node: leaf,
            role: ProofRole::SelfLeaf,
        }];
        entries.push(ProofEntry {
            node: self.sibling_of(leaf)?,
            role: ProofRole::User,
        });

        let mut current = leaf.parent;
        while let Some(index) = current {
            let node = self.node(index).ok_or(ProofTreeError::NodeNotFound(index))?;

            if node.is_root() {
                entries.push(ProofEntry {
                    node,
                    role: ProofRole::Root,
                });
                break;
            }

            entries.push(ProofEntry {
                node,
                role: ProofRole::Relevant,
            });
            entries.push(ProofEntry {
                node: self.sibling_of(node)?,
                role: ProofRole::Node,
            });
            current = node.parent;
        }

        Ok(ProofChain {
            leaf_index,
            entries,
        })
    }

    /// Proof chains for every user leaf, in leaf order
    pub fn proof_chains(&self) -> Result<Vec<ProofChain<'_>>> {
        let leaves: Vec<usize> = self.user_leaves().map(|node| node.index).collect();

        if self.is_parallel() {
            leaves
                .par_iter()
                .map(|&index| self.proof_chain(index))
                .collect()
        } else {
            leaves.iter().map(|&index| self.proof_chain(index)).collect()
        }
    }

    fn sibling_of(&self, node: &TreeNode) -> Result<&TreeNode> {
        let index = node.sibling_index();
        self.node(index).ok_or(ProofTreeError::NodeNotFound(index))
    }
}

/// Recompute the root from `record` and the siblings in `chain` and compare
/// it with `root_hash`. Only the record, the published hashing rules and the
/// chain's index/hash/amount values are used.
pub fn verify_proof(
    record: &BalanceRecord,
    chain: &ProofChain<'_>,
    root_hash: &str,
    encoding: HexEncoding,
) -> Result<()> {
    let mut entries = chain.entries.iter();

    let own = next_with_role(&mut entries, ProofRole::SelfLeaf)?;
    let leaf = hash_record(record, encoding);
    if leaf.hex_hash != own.node.hex_hash {
        return Err(ProofTreeError::HashMismatch {
            index: own.node.index,
            expected: own.node.hex_hash.clone(),
            got: leaf.hex_hash,
        });
    }

    let mut index = own.node.index;
    let mut amount = record.amount;
    let mut hex_hash = leaf.hex_hash;
    let mut sibling = next_with_role(&mut entries, ProofRole::User)?;

    loop {
        amount = amount
            .checked_add(sibling.node.amount_sum)
            .ok_or_else(|| ProofTreeError::InvalidProof("amount overflow".to_string()))?;
        let (left, right) = if index % 2 == 0 {
            (&hex_hash, &sibling.node.hex_hash)
        } else {
            (&sibling.node.hex_hash, &hex_hash)
        };
        let (_, parent_hash) = hash_node(amount, left, right, encoding);

        let ancestor = entries
            .next()
            .ok_or_else(|| ProofTreeError::InvalidProof("chain ends below the root".to_string()))?;
        if ancestor.node.hex_hash != parent_hash {
            return Err(ProofTreeError::HashMismatch {
                index: ancestor.node.index,
                expected: ancestor.node.hex_hash.clone(),
                got: parent_hash,
            });
        }
        if ancestor.node.amount_sum != amount {
            return Err(ProofTreeError::InvalidProof(format!(
                "amount mismatch at index {}: expected {}, got {}",
                ancestor.node.index, ancestor.node.amount_sum, amount
            )));
        }

        index = ancestor.node.index;
        hex_hash = parent_hash;

        match ancestor.role {
            ProofRole::Root => break,
            ProofRole::Relevant => sibling = next_with_role(&mut entries, ProofRole::Node)?,
            role => {
                return Err(ProofTreeError::InvalidProof(format!(
                    "unexpected {} entry at index {}",
                    role, index
                )))
            }
        }
    }

    if entries.next().is_some() {
        return Err(ProofTreeError::InvalidProof(
            "entries after the root".to_string(),
        ));
    }
    if hex_hash != root_hash {
        return Err(ProofTreeError::RootMismatch {
            expected: root_hash.to_string(),
            got: hex_hash,
        });
    }

    Ok(())
}

fn next_with_role<'a, 'b>(
    entries: &mut impl Iterator<Item = &'b ProofEntry<'a>>,
    role: ProofRole,
) -> Result<&'b ProofEntry<'a>> {
    match entries.next() {
        Some(entry) if entry.role == role => Ok(entry),
        Some(entry) => Err(ProofTreeError::InvalidProof(format!(
            "expected {} entry, found {}",
            role, entry.role
        ))),
        None => Err(ProofTreeError::InvalidProof(format!(
            "missing {} entry",
            role
        ))),
    }
}

/// Check a flat tree dump: dense indices, even levels below a single root,
/// every internal node re-derived from the pair below it and padding nodes
/// duplicating their neighbour with zero amount. Leaf hashes are taken as given.
pub fn audit_flat_dump(records: &[FlatNodeRecord], encoding: HexEncoding) -> Result<()> {
    if records.is_empty() {
        return Err(ProofTreeError::EmptyLeafSet);
    }

    if let Some((position, record)) = records
        .iter()
        .enumerate()
        .find(|(position, record)| record.index != *position)
    {
        return Err(ProofTreeError::InvalidProof(format!(
            "node {} found at position {}",
            record.index, position
        )));
    }

    let mut levels: Vec<&[FlatNodeRecord]> = Vec::new();
    let mut start = 0;
    for end in 1..=records.len() {
        if end == records.len() || records[end].level != records[start].level {
            if records[start].level != levels.len() {
                return Err(ProofTreeError::InvalidProof(format!(
                    "level {} out of order at index {}",
                    records[start].level, start
                )));
            }
            levels.push(&records[start..end]);
            start = end;
        }
    }

    if levels.len() < 2 {
        return Err(ProofTreeError::InvalidProof(
            "dump must hold leaves below a separate root".to_string(),
        ));
    }

    if levels.last().map(|level| level.len()) != Some(1) {
        return Err(ProofTreeError::InvalidProof(
            "root level must hold exactly one node".to_string(),
        ));
    }

    for window in levels.windows(2) {
        let (below, above) = (window[0], window[1]);
        if below.len() % 2 != 0 {
            return Err(ProofTreeError::InvalidProof(format!(
                "level {} has an odd node count",
                below[0].level
            )));
        }

        let produced = below.len() / 2;
        for (offset, pair) in below.chunks(2).enumerate() {
            let parent = above.get(offset).ok_or_else(|| {
                ProofTreeError::InvalidProof(format!(
                    "missing parent of index {}",
                    pair[0].index
                ))
            })?;

            let amount = pair[0]
                .amount_sum
                .checked_add(pair[1].amount_sum)
                .ok_or(ProofTreeError::AmountOverflow {
                    level: parent.level,
                    index: parent.index,
                })?;
            if amount != parent.amount_sum {
                return Err(ProofTreeError::InvalidProof(format!(
                    "amount mismatch at index {}: expected {}, got {}",
                    parent.index, parent.amount_sum, amount
                )));
            }

            let (_, hex_hash) = hash_node(amount, &pair[0].hex_hash, &pair[1].hex_hash, encoding);
            if hex_hash != parent.hex_hash {
                return Err(ProofTreeError::HashMismatch {
                    index: parent.index,
                    expected: parent.hex_hash.clone(),
                    got: hex_hash,
                });
            }
        }

        let padded = produced > 1 && produced % 2 == 1;
        let expected_len = if padded { produced + 1 } else { produced };
        if above.len() != expected_len {
            return Err(ProofTreeError::InvalidProof(format!(
                "level {} holds {} nodes, expected {}",
                above[0].level,
                above.len(),
                expected_len
            )));
        }
        if padded {
            let (last, padding) = (&above[produced - 1], &above[produced]);
            if padding.amount_sum != 0 || padding.hex_hash != last.hex_hash {
                return Err(ProofTreeError::InvalidProof(format!(
                    "bad padding node at index {}",
                    padding.index
                )));
            }
        }
    }

    Ok(())
}
