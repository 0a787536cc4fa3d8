//! # Reserve Proof Tree
//!
//! Merkle sum tree commitments over per-user asset balances, with a minimal
//! inclusion proof for every user ("proof of reserves").
//!
//! ## Features
//!
//! - **Sum Tree**: every node commits to the sum of the balances below it
//! - **Deterministic Padding**: odd levels are padded so every pair is binary
//! - **Proof Chains**: leaf-to-root sibling paths that recompute the root
//! - **Published Formats**: flat tree dump and per-user nested JSON proofs
//! - **Parallel Build**: optional rayon pairing and proof rendering
//!
//! ## Quick Start
//!
//! ```
//! use reserve_proof_tree::{verify_proof, BalanceRecord, HexEncoding, ProofTree};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let balances = vec![
//!     BalanceRecord::new(1, 0, 100_000_000),
//!     BalanceRecord::new(2, 0, 200_000_000),
//!     BalanceRecord::new(3, 0, 300_000_000),
//! ];
//!
//! let mut tree = ProofTree::new("btc", 1_586_707_200_000);
//! tree.init_with_balances(&balances)?;
//! assert_eq!(tree.total_amount(), 600_000_000);
//!
//! // Every user can recompute the published root from their own proof
//! let root = tree.root_hash().unwrap_or_default();
//! for chain in tree.proof_chains()? {
//!     let record = chain.record().unwrap_or_default();
//!     verify_proof(&record, &chain, root, HexEncoding::Legacy)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Generating Dumps
//!
//! ```no_run
//! use reserve_proof_tree::{generate_all, GeneratorConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GeneratorConfig::new()
//!     .with_input_dir("./balances")
//!     .with_output_dir("./proofs");
//!
//! for report in generate_all(&config)? {
//!     println!("{}: root {} over {} users", report.token, report.root_hash, report.user_count);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod csv_parser;
pub mod error;
pub mod generate;
pub mod leaf;
pub mod logging;
pub mod merkle_tree;
pub mod proof;
pub mod serialize;
pub mod types;

// Re-export commonly used items
pub use config::{AssetConfig, GeneratorConfig};
pub use csv_parser::{parse_balance_line, read_balances};
pub use error::{ProofTreeError, Result};
pub use generate::{generate_all, generate_asset, GenerationReport};
pub use leaf::{hash_node, hash_record};
pub use merkle_tree::ProofTree;
pub use proof::{audit_flat_dump, verify_proof, ProofChain, ProofEntry};
pub use serialize::{proof_json, read_flat_dump, FlatNodeRecord, ProofDumpLine, ProofJsonNode};
pub use types::{
    BalanceRecord, HashedLeaf, HexEncoding, NodeKind, ProofRole, TreeNode, HEX_LEN,
    SENTINEL_RECORD,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_end_to_end() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let input_dir = temp_dir.path().join("input");
        let output_dir = temp_dir.path().join("output");
        fs::create_dir(&input_dir)?;

        let mut lines = String::from("id,user_id,nonce,amount\n");
        for user in 1..=10 {
            lines.push_str(&format!("{},{},{},{}\n", user, user + 100, 1, user * 100_000_000));
        }
        fs::write(input_dir.join("proof_reserve_usdt.csv"), lines)?;

        let config = GeneratorConfig::new()
            .with_assets(vec![AssetConfig::for_token("usdt")])
            .with_input_dir(&input_dir)
            .with_output_dir(&output_dir)
            .with_created_at(1_586_707_200_000);

        let reports = generate_all(&config)?;
        assert_eq!(reports[0].user_count, 10);
        assert_eq!(reports[0].root_amount, 5_500_000_000);

        // The published flat dump is internally consistent
        let flat = read_flat_dump(output_dir.join("tree_proof_usdt.csv"))?;
        audit_flat_dump(&flat, HexEncoding::Legacy)?;
        assert_eq!(flat.last().unwrap().hex_hash, reports[0].root_hash);

        // Every proof line commits to the published root
        let full = fs::read_to_string(output_dir.join("tree_proof_full_usdt.csv"))?;
        assert_eq!(full.lines().count(), 10);
        for line in full.lines() {
            let fields: Vec<&str> = line.split('|').collect();
            let proof: ProofJsonNode = serde_json::from_str(fields[6]).unwrap();
            assert_eq!(proof.role, ProofRole::Root);
            assert_eq!(proof.hash, reports[0].root_hash);
            assert!(fields[0].parse::<u64>().unwrap() >= 3_000_000);
        }

        Ok(())
    }

    #[test]
    fn test_zero_padded_encoding_changes_hashes() -> Result<()> {
        let balances = vec![BalanceRecord::new(1, 0, 5), BalanceRecord::new(2, 0, 6)];

        let mut legacy = ProofTree::new("btc", 0);
        legacy.init_with_balances(&balances)?;
        let mut padded = ProofTree::new("btc", 0).with_encoding(HexEncoding::ZeroPadded);
        padded.init_with_balances(&balances)?;

        assert_eq!(legacy.total_amount(), padded.total_amount());
        assert_eq!(legacy.node(0).unwrap().hex_hash, "5718684fdc568f62");
        assert_eq!(padded.node(0).unwrap().hex_hash, "05718684fdc568f6");
        assert_ne!(legacy.root_hash(), padded.root_hash());

        let chain = padded.proof_chain(0)?;
        verify_proof(&balances[0], &chain, padded.root_hash().unwrap(), HexEncoding::ZeroPadded)?;
        Ok(())
    }
}
