use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// ERC-20 token whose balance is shown in address snapshots
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSpec {
    pub address: String,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
}

/// A named EVM network: JSON-RPC node plus optional indexing API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub rpc: String,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default)]
    pub explorer_url: Option<String>,
    /// Etherscan-compatible API base, e.g. `https://api.etherscan.io/v2/api`
    #[serde(default)]
    pub indexer_url: Option<String>,
    /// Environment variable holding the indexer API key
    #[serde(default)]
    pub indexer_key_env: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub window_size: u64,
    pub max_window: u64,
    pub window_delay_ms: u64,
    pub token_decimals: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub page_size: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default_network: Option<String>,

    #[serde(default)]
    pub networks: Vec<NetworkConfig>,

    #[serde(default)]
    pub scanner: ScannerConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub tokens: Vec<TokenSpec>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            window_size: 1_000,
            max_window: 10_000,
            window_delay_ms: 100,
            token_decimals: 18,
        }
    }
}

impl ScannerConfig {
    pub fn window_delay(&self) -> Duration {
        Duration::from_millis(self.window_delay_ms)
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { page_size: 15 }
    }
}

impl TokenSpec {
    pub fn normalized_address(&self) -> String {
        normalize_address(&self.address)
    }

    pub fn display_symbol(&self) -> String {
        self.symbol
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| short_addr(&self.address))
    }
}

impl NetworkConfig {
    /// Resolve the indexer API key from the configured environment variable
    pub fn indexer_key(&self) -> Option<String> {
        self.indexer_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Config {
    /// Find a network by name, configured entries first, then built-in presets
    pub fn network(&self, name: Option<&str>) -> Option<NetworkConfig> {
        let wanted = name
            .map(str::to_string)
            .or_else(|| self.default_network.clone())
            .unwrap_or_else(|| "kaia".to_string());
        self.networks
            .iter()
            .find(|n| n.name.eq_ignore_ascii_case(&wanted))
            .cloned()
            .or_else(|| presets().into_iter().find(|n| n.name.eq_ignore_ascii_case(&wanted)))
    }

    /// Names of every network reachable by `network()`
    pub fn network_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.networks.iter().map(|n| n.name.clone()).collect();
        for preset in presets() {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&preset.name)) {
                names.push(preset.name);
            }
        }
        names
    }
}

/// Networks available without any config file
pub fn presets() -> Vec<NetworkConfig> {
    vec![
        NetworkConfig {
            name: "kaia".to_string(),
            rpc: "https://public-en-kairos.node.kaia.io".to_string(),
            chain_id: Some(1001),
            symbol: "KAIA".to_string(),
            explorer_url: Some("https://kairos.kaiascan.io".to_string()),
            indexer_url: None,
            indexer_key_env: None,
        },
        NetworkConfig {
            name: "ethereum".to_string(),
            rpc: "https://eth.llamarpc.com".to_string(),
            chain_id: Some(1),
            symbol: "ETH".to_string(),
            explorer_url: Some("https://etherscan.io".to_string()),
            indexer_url: Some("https://api.etherscan.io/v2/api".to_string()),
            indexer_key_env: Some("ETHERSCAN_API_KEY".to_string()),
        },
    ]
}

pub fn load() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return Config::default(),
    };
    parse(&content).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), error = %err, "ignoring malformed config");
        Config::default()
    })
}

pub fn parse(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(content)
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("CHAINLENS_CONFIG").map(PathBuf::from) {
        return Some(path);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("chainlens").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".config").join("chainlens").join("config.toml"));
    }

    directories::ProjectDirs::from("io", "chainlens", "chainlens")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

pub fn data_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").map(PathBuf::from) {
        return Some(xdg.join("chainlens"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".local").join("share").join("chainlens"));
    }
    directories::ProjectDirs::from("io", "chainlens", "chainlens")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

pub fn abi_cache_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("abi_cache.sqlite3"))
}

pub fn journal_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("relay_journal.sqlite3"))
}

fn default_symbol() -> String {
    "ETH".to_string()
}

fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    let payload = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    format!("0x{}", payload.to_lowercase())
}

fn short_addr(value: &str) -> String {
    let value = value.trim();
    if value.len() <= 10 {
        return value.to_string();
    }
    let start: String = value.chars().take(6).collect();
    let end: String = value
        .chars()
        .rev()
        .take(4)
        .collect::<String>()
        .chars()
        .rev()
        .collect();
    format!("{}..{}", start, end)
}
