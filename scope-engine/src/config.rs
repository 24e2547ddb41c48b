use crate::error::EngineError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// How long a scope's finished results stay valid before a refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultsTtl {
    /// Results never expire
    #[default]
    None,
    Small,
    Medium,
    Large,
}

/// Timing and navigation behaviour of a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Longest delay between an incomplete chunk and the flush that shows it
    #[serde(default = "default_aggregation_timeout_ms")]
    pub aggregation_timeout_ms: u64,

    /// Every this many milliseconds of search time the aggregation delay
    /// shrinks by another step
    #[serde(default = "default_aggregation_decay_ms")]
    pub aggregation_decay_ms: u64,

    /// Grace period during which a new search still shows the old results
    #[serde(default = "default_clear_timeout_ms")]
    pub clear_timeout_ms: u64,

    #[serde(default = "default_ttl_small_ms")]
    pub ttl_small_ms: u64,

    #[serde(default = "default_ttl_medium_ms")]
    pub ttl_medium_ms: u64,

    #[serde(default = "default_ttl_large_ms")]
    pub ttl_large_ms: u64,

    /// Replaces the TTL of every scope that has one
    #[serde(default)]
    pub ttl_override_ms: Option<u64>,

    /// Hide departments while a search query is entered
    #[serde(default = "default_true")]
    pub navigation_requires_empty_query: bool,
}

fn default_aggregation_timeout_ms() -> u64 {
    110
}

fn default_aggregation_decay_ms() -> u64 {
    150
}

fn default_clear_timeout_ms() -> u64 {
    240
}

fn default_ttl_small_ms() -> u64 {
    30_000 // 30 seconds
}

fn default_ttl_medium_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_ttl_large_ms() -> u64 {
    3_600_000 // 1 hour
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aggregation_timeout_ms: default_aggregation_timeout_ms(),
            aggregation_decay_ms: default_aggregation_decay_ms(),
            clear_timeout_ms: default_clear_timeout_ms(),
            ttl_small_ms: default_ttl_small_ms(),
            ttl_medium_ms: default_ttl_medium_ms(),
            ttl_large_ms: default_ttl_large_ms(),
            ttl_override_ms: None,
            navigation_requires_empty_query: true,
        }
    }
}

impl EngineConfig {
    /// Load a TOML config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate().map_err(EngineError::InvalidConfig)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.aggregation_decay_ms == 0 {
            return Err("aggregation_decay_ms must be > 0".to_string());
        }

        if self.ttl_small_ms == 0 || self.ttl_medium_ms == 0 || self.ttl_large_ms == 0 {
            return Err("results TTLs must be > 0".to_string());
        }

        if self.ttl_small_ms > self.ttl_medium_ms || self.ttl_medium_ms > self.ttl_large_ms {
            return Err(format!(
                "results TTLs must grow from small to large, got {} / {} / {}",
                self.ttl_small_ms, self.ttl_medium_ms, self.ttl_large_ms
            ));
        }

        if self.ttl_override_ms == Some(0) {
            return Err("ttl_override_ms must be > 0 when set".to_string());
        }

        Ok(())
    }

    /// Flush every chunk as soon as it arrives and clear old results at once.
    pub fn immediate() -> Self {
        Self {
            aggregation_timeout_ms: 0,
            clear_timeout_ms: 0,
            ..Default::default()
        }
    }

    /// Show results while searching, departments included.
    pub fn navigation_while_searching() -> Self {
        Self {
            navigation_requires_empty_query: false,
            ..Default::default()
        }
    }

    /// Delay before flushing an incomplete chunk of a search that has been
    /// running for `elapsed`; the longer the search, the shorter the delay.
    pub fn aggregation_delay(&self, elapsed: Duration) -> Duration {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let steps = (elapsed_ms / self.aggregation_decay_ms.max(1)).saturating_add(1);
        Duration::from_millis(self.aggregation_timeout_ms / steps.max(1))
    }

    pub fn clear_timeout(&self) -> Duration {
        Duration::from_millis(self.clear_timeout_ms)
    }

    /// Expiry of finished results for a scope of the given TTL class.
    pub fn results_ttl(&self, kind: ResultsTtl) -> Option<Duration> {
        let ttl_ms = match kind {
            ResultsTtl::None => return None,
            ResultsTtl::Small => self.ttl_small_ms,
            ResultsTtl::Medium => self.ttl_medium_ms,
            ResultsTtl::Large => self.ttl_large_ms,
        };
        Some(Duration::from_millis(self.ttl_override_ms.unwrap_or(ttl_ms)))
    }
}
