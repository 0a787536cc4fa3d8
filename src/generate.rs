use crate::config::{AssetConfig, GeneratorConfig};
use crate::csv_parser::read_balances;
use crate::error::Result;
use crate::merkle_tree::ProofTree;
use std::fs;
use std::time::{Duration, Instant};
use tracing::info;

/// Summary of one asset's generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub token: String,
    pub user_count: usize,
    pub node_count: usize,
    pub root_hash: String,
    pub root_amount: i64,
    pub elapsed: Duration,
}

impl GenerationReport {
    /// Users processed per second
    pub fn throughput(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64().max(f64::EPSILON);
        (self.user_count as f64 / secs) as u64
    }
}

/// Read the asset's balance list, build its tree and write both dumps
pub fn generate_asset(asset: &AssetConfig, config: &GeneratorConfig) -> Result<GenerationReport> {
    let started = Instant::now();
    info!(
        token = %asset.token,
        at = %chrono::Utc::now().to_rfc3339(),
        "generating proof tree"
    );

    let balances = read_balances(config.balance_file(&asset.token))?;

    let mut tree = ProofTree::new(asset.token.clone(), config.created_millis())
        .with_encoding(config.hex_encoding)
        .with_parallel(config.parallel);
    tree.init_with_balances(&balances)?;

    tree.dump_to_file(config.tree_dump_file(&asset.token))?;
    tree.dump_to_full_file(
        config.proof_dump_file(&asset.token),
        asset.id_offset,
        config.org_id,
    )?;

    let report = GenerationReport {
        token: asset.token.clone(),
        user_count: balances.len(),
        node_count: tree.len(),
        root_hash: tree.root_hash().unwrap_or_default().to_string(),
        root_amount: tree.total_amount(),
        elapsed: started.elapsed(),
    };

    info!(
        token = %report.token,
        at = %chrono::Utc::now().to_rfc3339(),
        users = report.user_count,
        nodes = report.node_count,
        root = %report.root_hash,
        amount = report.root_amount,
        tps = report.throughput(),
        "proof tree generated"
    );

    Ok(report)
}

/// Generate every configured asset, stamping all trees with the same creation time
pub fn generate_all(config: &GeneratorConfig) -> Result<Vec<GenerationReport>> {
    config.validate()?;
    fs::create_dir_all(&config.output_dir)?;

    let config = config.clone().with_created_at(config.created_millis());
    config
        .assets
        .iter()
        .map(|asset| generate_asset(asset, &config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProofTreeError;
    use crate::serialize::read_flat_dump;
    use tempfile::TempDir;

    #[test]
    fn test_generate_asset_writes_dumps() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = GeneratorConfig::new()
            .with_input_dir(temp_dir.path())
            .with_output_dir(temp_dir.path())
            .with_created_at(1_586_707_200_000);
        fs::write(
            config.balance_file("btc"),
            "id,user_id,nonce,amount\n1,1,0,100000000\n2,2,0,200000000\n3,3,0,300000000\n",
        )?;

        let report = generate_asset(&AssetConfig::for_token("btc"), &config)?;
        assert_eq!(report.user_count, 3);
        assert_eq!(report.node_count, 7);
        assert_eq!(report.root_hash, "ac8b90299d79664c");
        assert_eq!(report.root_amount, 600_000_000);

        let flat = read_flat_dump(config.tree_dump_file("btc"))?;
        assert_eq!(flat.len(), 7);

        let full = fs::read_to_string(config.proof_dump_file("btc"))?;
        let first = full.lines().next().unwrap();
        assert!(first.starts_with("1000000|6002|1|btc|0|100000000|{"));
        assert!(first.ends_with("}|1586707200000"));
        Ok(())
    }

    #[test]
    fn test_generate_asset_without_balances_fails() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = GeneratorConfig::new()
            .with_input_dir(temp_dir.path())
            .with_output_dir(temp_dir.path());
        fs::write(config.balance_file("eth"), "header only\n")?;

        let result = generate_asset(&AssetConfig::for_token("eth"), &config);
        assert!(matches!(result, Err(ProofTreeError::EmptyLeafSet)));
        Ok(())
    }

    #[test]
    fn test_generate_all_shares_timestamp() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let output = temp_dir.path().join("out");
        let config = GeneratorConfig::new()
            .with_assets(vec![AssetConfig::new("btc", 1_000_000), AssetConfig::new("eth", 2_000_000)])
            .with_input_dir(temp_dir.path())
            .with_output_dir(&output);
        fs::write(config.balance_file("btc"), "0,1,0,5\n")?;
        fs::write(config.balance_file("eth"), "0,1,0,7\n0,2,0,9\n")?;

        let reports = generate_all(&config)?;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[1].root_amount, 16);

        let stamp = |token: &str| -> Result<String> {
            let full = fs::read_to_string(output.join(format!("tree_proof_full_{}.csv", token)))?;
            Ok(full.lines().next().unwrap().rsplit('|').next().unwrap().to_string())
        };
        assert_eq!(stamp("btc")?, stamp("eth")?);
        Ok(())
    }
}
