use crate::error::{ProofTreeError, Result};
use crate::types::{HexEncoding, DEFAULT_ID_OFFSET, DEFAULT_ORG_ID};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// One asset to generate a tree for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub token: String,

    /// Base added to a leaf's flat index to form its proof dump id
    #[serde(default = "default_id_offset")]
    pub id_offset: u64,
}

fn default_id_offset() -> u64 {
    DEFAULT_ID_OFFSET
}

impl AssetConfig {
    pub fn new(token: impl Into<String>, id_offset: u64) -> Self {
        Self {
            token: token.into(),
            id_offset,
        }
    }

    /// Asset with the offset of the built-in token list, or the default offset
    pub fn for_token(token: impl Into<String>) -> Self {
        let token = token.into();
        let id_offset = default_assets()
            .into_iter()
            .find(|asset| asset.token == token)
            .map(|asset| asset.id_offset)
            .unwrap_or(DEFAULT_ID_OFFSET);
        Self { token, id_offset }
    }
}

fn default_assets() -> Vec<AssetConfig> {
    vec![
        AssetConfig::new("btc", 1_000_000),
        AssetConfig::new("eth", 2_000_000),
        AssetConfig::new("usdt", 3_000_000),
    ]
}

/// Configuration for generating proof trees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub assets: Vec<AssetConfig>,

    /// Operator identifier written into every proof dump line
    pub org_id: u64,

    /// Creation timestamp in ms since epoch; `None` uses the current time
    pub created_at: Option<i64>,

    /// Directory holding `proof_reserve_{token}.csv`
    pub input_dir: PathBuf,

    /// Directory receiving `tree_proof_{token}.csv` and `tree_proof_full_{token}.csv`
    pub output_dir: PathBuf,

    pub hex_encoding: HexEncoding,

    /// Pair levels and render proofs on the rayon pool
    pub parallel: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            assets: default_assets(),
            org_id: DEFAULT_ORG_ID,
            created_at: None,
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            hex_encoding: HexEncoding::Legacy,
            parallel: false,
        }
    }
}

impl GeneratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read(path)?;
        let config: Self = serde_json::from_slice(&data)
            .map_err(|e| ProofTreeError::Deserialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_assets(mut self, assets: Vec<AssetConfig>) -> Self {
        self.assets = assets;
        self
    }

    pub fn with_org_id(mut self, org_id: u64) -> Self {
        self.org_id = org_id;
        self
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_hex_encoding(mut self, encoding: HexEncoding) -> Self {
        self.hex_encoding = encoding;
        self
    }

    pub fn with_parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.assets.is_empty() {
            return Err(ProofTreeError::InvalidConfig("no assets configured".to_string()));
        }

        let mut seen = HashSet::new();
        for asset in &self.assets {
            if asset.token.trim().is_empty() {
                return Err(ProofTreeError::InvalidConfig("empty asset token".to_string()));
            }
            if !seen.insert(asset.token.as_str()) {
                return Err(ProofTreeError::InvalidConfig(format!(
                    "duplicate asset token: {}",
                    asset.token
                )));
            }
        }

        Ok(())
    }

    /// Creation timestamp to stamp trees with
    pub fn created_millis(&self) -> i64 {
        self.created_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis())
    }

    pub fn balance_file(&self, token: &str) -> PathBuf {
        self.input_dir.join(format!("proof_reserve_{}.csv", token))
    }

    pub fn tree_dump_file(&self, token: &str) -> PathBuf {
        self.output_dir.join(format!("tree_proof_{}.csv", token))
    }

    pub fn proof_dump_file(&self, token: &str) -> PathBuf {
        self.output_dir.join(format!("tree_proof_full_{}.csv", token))
    }
}
