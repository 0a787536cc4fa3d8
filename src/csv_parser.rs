use crate::error::Result;
use crate::types::BalanceRecord;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Parse one `ignored,owner_id,nonce,amount` line. Returns `None` for malformed lines.
pub fn parse_balance_line(line: &str) -> Option<BalanceRecord> {
    parse_balance_fields(line.split(','))
}

fn parse_balance_fields<'a>(fields: impl Iterator<Item = &'a str>) -> Option<BalanceRecord> {
    let fields: Vec<&str> = fields.collect();
    if fields.len() != 4 {
        return None;
    }

    let owner_id = fields[1].parse().ok()?;
    let nonce = fields[2].parse().ok()?;
    let amount = fields[3].parse().ok()?;

    Some(BalanceRecord::new(owner_id, nonce, amount))
}

/// Read every well-formed balance row from a file, dropping malformed rows anywhere
pub fn read_balances<P: AsRef<Path>>(path: P) -> Result<Vec<BalanceRecord>> {
    let file = File::open(path)?;
    read_balances_from_reader(file)
}

pub fn read_balances_from_reader<R: Read>(reader: R) -> Result<Vec<BalanceRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(reader);

    let mut balances = Vec::new();
    let mut dropped = 0usize;

    for result in rdr.records() {
        match result {
            Ok(row) => match parse_balance_fields(row.iter()) {
                Some(balance) => balances.push(balance),
                None => {
                    dropped += 1;
                    debug!(line = ?row.position().map(|p| p.line()), "dropping malformed balance row");
                }
            },
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                dropped += 1;
                debug!(error = %e, "dropping unreadable balance row");
            }
        }
    }

    if dropped > 0 {
        warn!(dropped, kept = balances.len(), "dropped malformed balance rows");
    }

    Ok(balances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_balance_line() {
        assert_eq!(
            parse_balance_line("9,101,3,250000000"),
            Some(BalanceRecord::new(101, 3, 250_000_000))
        );
        assert_eq!(
            parse_balance_line("x,5,0,-7"),
            Some(BalanceRecord::new(5, 0, -7))
        );
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert_eq!(parse_balance_line("id,user_id,nonce,amount"), None);
        assert_eq!(parse_balance_line("1,2,3"), None);
        assert_eq!(parse_balance_line("1,2,3,4,5"), None);
        assert_eq!(parse_balance_line("1,2,3,1.5"), None);
        assert_eq!(parse_balance_line(""), None);
    }

    #[test]
    fn test_reader_drops_malformed_rows_anywhere() -> Result<()> {
        let data = "id,user_id,nonce,amount\n\
                    1,10,0,100\n\
                    2,11,0,oops\n\
                    3,12,1,300\n\
                    4,13\n\
                    5,14,2,500\n";

        let balances = read_balances_from_reader(data.as_bytes())?;
        assert_eq!(
            balances,
            vec![
                BalanceRecord::new(10, 0, 100),
                BalanceRecord::new(12, 1, 300),
                BalanceRecord::new(14, 2, 500),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_stray_quote_drops_only_its_own_row() -> Result<()> {
        let data = "0,1,0,100\n0,2,0,\"oops\n0,3,0,300\n0,4,0,400\n0,5,0,500\n";

        let balances = read_balances_from_reader(data.as_bytes())?;
        let owners: Vec<i64> = balances.iter().map(|b| b.owner_id).collect();
        assert_eq!(owners, vec![1, 3, 4, 5]);
        assert_eq!(balances.iter().map(|b| b.amount).sum::<i64>(), 1_300);
        Ok(())
    }

    #[test]
    fn test_quoted_fields_are_malformed() -> Result<()> {
        let data = "0,\"7\",0,100\n0,8,0,\"200\"\n0,9,0,300\n";

        let balances = read_balances_from_reader(data.as_bytes())?;
        assert_eq!(balances, vec![BalanceRecord::new(9, 0, 300)]);
        assert_eq!(parse_balance_line("0,\"7\",0,100"), None);
        Ok(())
    }

    #[test]
    fn test_read_balances_from_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("proof_reserve_btc.csv");
        fs::write(&path, "0,1,0,100000000\n0,2,0,200000000\n")?;

        let balances = read_balances(&path)?;
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[1].amount, 200_000_000);
        Ok(())
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let result = read_balances("/nonexistent/proof_reserve_btc.csv");
        assert!(matches!(result, Err(crate::ProofTreeError::Io(_))));
    }
}
