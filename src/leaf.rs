//! Leaf and node hashing.
//!
//! Every node hash is SHA-256 over a pipe-delimited UTF-8 preimage:
//!
//! - leaves: `"{owner_id}|{nonce}|{amount}"`
//! - internal nodes: `"{amount_sum}|{left_hex}|{right_hex}"`
//!
//! The published `hex_hash` is the first [`HEX_LEN`] characters of the digest
//! rendered per [`HexEncoding`]. With [`HexEncoding::Legacy`] each byte is
//! written without zero padding, so a byte below `0x10` yields one character
//! and the truncation point is not byte aligned.

use crate::types::{BalanceRecord, HashedLeaf, HexEncoding, HEX_LEN};
use sha2::{Digest, Sha256};

/// Fresh SHA-256 over `data`. Stateless, safe to call from any thread.
pub fn digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Render `bytes` as hex and keep the first `len` characters
pub fn encode_hex(bytes: &[u8], len: usize, encoding: HexEncoding) -> String {
    let full = match encoding {
        HexEncoding::Legacy => bytes.iter().map(|b| format!("{:x}", b)).collect::<String>(),
        HexEncoding::ZeroPadded => hex::encode(bytes),
    };
    full.chars().take(len).collect()
}

/// Hash a balance record into a leaf
pub fn hash_record(record: &BalanceRecord, encoding: HexEncoding) -> HashedLeaf {
    let hash = digest(record.to_string().as_bytes());
    let hex_hash = encode_hex(&hash, HEX_LEN, encoding);

    HashedLeaf {
        record: *record,
        hash,
        hex_hash,
    }
}

/// Hash of the parent of two nodes whose amounts add up to `amount_sum`
pub fn hash_node(
    amount_sum: i64,
    left_hex: &str,
    right_hex: &str,
    encoding: HexEncoding,
) -> (Vec<u8>, String) {
    let preimage = format!("{}|{}|{}", amount_sum, left_hex, right_hex);
    let hash = digest(preimage.as_bytes());
    let hex_hash = encode_hex(&hash, HEX_LEN, encoding);
    (hash, hex_hash)
}

/// Hash a whole batch of records, preserving order
pub fn hash_records(records: &[BalanceRecord], encoding: HexEncoding) -> Vec<HashedLeaf> {
    records
        .iter()
        .map(|record| hash_record(record, encoding))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_hash_fixture() {
        let leaf = hash_record(&BalanceRecord::new(1, 0, 100_000_000), HexEncoding::Legacy);
        assert_eq!(
            hex::encode(&leaf.hash),
            "bdaf261cc36822dd1a1c76ce9c9ec74d899e6312c3fc3ea689990b8117426066"
        );
        assert_eq!(leaf.hex_hash, "bdaf261cc36822dd");
    }

    #[test]
    fn test_legacy_encoding_drops_leading_zero() {
        // sha256("1|0|5") starts with 0x05
        let record = BalanceRecord::new(1, 0, 5);
        let legacy = hash_record(&record, HexEncoding::Legacy);
        let padded = hash_record(&record, HexEncoding::ZeroPadded);

        assert_eq!(legacy.hash[0], 0x05);
        assert_eq!(legacy.hex_hash, "5718684fdc568f62");
        assert_eq!(padded.hex_hash, "05718684fdc568f6");
        assert_eq!(legacy.hash, padded.hash);
    }

    #[test]
    fn test_encode_hex_lengths() {
        let bytes = [0x00, 0x0f, 0x10, 0xff];
        assert_eq!(encode_hex(&bytes, 16, HexEncoding::Legacy), "0f10ff");
        assert_eq!(encode_hex(&bytes, 16, HexEncoding::ZeroPadded), "000f10ff");
        assert_eq!(encode_hex(&bytes, 3, HexEncoding::ZeroPadded), "000");
    }

    #[test]
    fn test_node_hash_fixture() {
        let left = hash_record(&BalanceRecord::new(1, 0, 100_000_000), HexEncoding::Legacy);
        let right = hash_record(&BalanceRecord::new(2, 0, 200_000_000), HexEncoding::Legacy);
        let (_, hex_hash) = hash_node(
            300_000_000,
            &left.hex_hash,
            &right.hex_hash,
            HexEncoding::Legacy,
        );
        assert_eq!(hex_hash, "f224ac6aa7aabfe8");
    }

    #[test]
    fn test_hashing_is_deterministic() {
        let record = BalanceRecord::new(77, 3, -1);
        assert_eq!(
            hash_record(&record, HexEncoding::Legacy),
            hash_record(&record, HexEncoding::Legacy)
        );
    }
}
