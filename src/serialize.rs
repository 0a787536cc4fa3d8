use crate::error::{ProofTreeError, Result};
use crate::merkle_tree::ProofTree;
use crate::proof::{ProofChain, ProofEntry};
use crate::types::{ProofRole, TreeNode};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// One line of the flat tree dump: `level,index,hexHash,amountSum`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatNodeRecord {
    pub level: usize,
    pub index: usize,
    pub hex_hash: String,
    pub amount_sum: i64,
}

impl From<&TreeNode> for FlatNodeRecord {
    fn from(node: &TreeNode) -> Self {
        Self {
            level: node.level,
            index: node.index,
            hex_hash: node.hex_hash.clone(),
            amount_sum: node.amount_sum,
        }
    }
}

/// Nested proof object: each node carries the two nodes one level below it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofJsonNode {
    pub level: usize,
    pub index: usize,
    #[serde(rename = "type")]
    pub role: ProofRole,
    pub hash: String,
    pub amount: i64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<ProofJsonNode>,
}

impl ProofJsonNode {
    fn from_entry(entry: &ProofEntry<'_>, children: Vec<ProofJsonNode>) -> Self {
        Self {
            level: entry.node.level,
            index: entry.node.index,
            role: entry.role,
            hash: entry.node.hex_hash.clone(),
            amount: entry.node.amount_sum,
            children,
        }
    }
}

/// Fold a proof chain into its nested form, rooted at the `ROOT` entry
pub fn proof_json(chain: &ProofChain<'_>) -> Result<ProofJsonNode> {
    let entries = &chain.entries;
    if entries.len() < 3 {
        return Err(ProofTreeError::InvalidProof(format!(
            "chain for leaf {} is too short",
            chain.leaf_index
        )));
    }

    let mut children = vec![
        ProofJsonNode::from_entry(&entries[0], Vec::new()),
        ProofJsonNode::from_entry(&entries[1], Vec::new()),
    ];

    for pair in entries[2..].chunks(2) {
        let ancestor = ProofJsonNode::from_entry(&pair[0], children);
        match pair.get(1) {
            None if pair[0].role == ProofRole::Root => return Ok(ancestor),
            Some(sibling) => {
                children = vec![ancestor, ProofJsonNode::from_entry(sibling, Vec::new())];
            }
            None => break,
        }
    }

    Err(ProofTreeError::InvalidProof(format!(
        "chain for leaf {} does not end at the root",
        chain.leaf_index
    )))
}

/// One line of the per-user proof dump:
/// `id|orgId|ownerId|assetToken|nonce|amount|proofJson|createdTimestamp`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProofDumpLine {
    pub id: u64,
    pub org_id: u64,
    pub owner_id: i64,
    pub asset: String,
    pub nonce: i64,
    pub amount: i64,
    pub proof_json: String,
    pub created: i64,
}

impl ProofTree {
    pub fn to_flat_records(&self) -> Vec<FlatNodeRecord> {
        self.nodes().iter().map(FlatNodeRecord::from).collect()
    }

    /// Write every node in array order as `level,index,hexHash,amountSum`
    pub fn write_flat_dump<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        for node in self.nodes() {
            wtr.serialize(FlatNodeRecord::from(node))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Save the flat dump, replacing any existing file
    pub fn dump_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_flat_dump(File::create(path)?)
    }

    /// Proof dump line for the user leaf at `leaf_index`
    pub fn proof_dump_line(&self, leaf_index: usize, id_offset: u64, org_id: u64) -> Result<ProofDumpLine> {
        let chain = self.proof_chain(leaf_index)?;
        let record = chain
            .record()
            .ok_or(ProofTreeError::NotAUserLeaf(leaf_index))?;
        let proof = proof_json(&chain)?;
        let proof_json =
            serde_json::to_string(&proof).map_err(|e| ProofTreeError::Serialization(e.to_string()))?;

        Ok(ProofDumpLine {
            id: id_offset + leaf_index as u64,
            org_id,
            owner_id: record.owner_id,
            asset: self.asset().to_string(),
            nonce: record.nonce,
            amount: record.amount,
            proof_json,
            created: self.created(),
        })
    }

    /// Proof dump lines for every user leaf, in leaf order
    pub fn proof_dump_lines(&self, id_offset: u64, org_id: u64) -> Result<Vec<ProofDumpLine>> {
        let leaves: Vec<usize> = self.user_leaves().map(|node| node.index).collect();

        if self.is_parallel() {
            leaves
                .par_iter()
                .map(|&index| self.proof_dump_line(index, id_offset, org_id))
                .collect()
        } else {
            leaves
                .iter()
                .map(|&index| self.proof_dump_line(index, id_offset, org_id))
                .collect()
        }
    }

    pub fn write_proof_dump<W: Write>(&self, writer: W, id_offset: u64, org_id: u64) -> Result<()> {
        let lines = self.proof_dump_lines(id_offset, org_id)?;

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(b'|')
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(writer);
        for line in &lines {
            wtr.serialize(line)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Save the per-user proof dump, replacing any existing file
    pub fn dump_to_full_file(&self, path: impl AsRef<Path>, id_offset: u64, org_id: u64) -> Result<()> {
        self.write_proof_dump(File::create(path)?, id_offset, org_id)
    }
}

/// Read a flat tree dump back
pub fn read_flat_dump<P: AsRef<Path>>(path: P) -> Result<Vec<FlatNodeRecord>> {
    read_flat_dump_from_reader(File::open(path)?)
}

pub fn read_flat_dump_from_reader<R: Read>(reader: R) -> Result<Vec<FlatNodeRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    rdr.deserialize()
        .map(|row| row.map_err(|e| ProofTreeError::Deserialization(e.to_string())))
        .collect()
}
