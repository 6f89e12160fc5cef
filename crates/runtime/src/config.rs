use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use skein_strategy::{
    DfsStrategy, ExhaustiveDelayBoundingStrategy, PctStrategy, RandomDelayBoundingStrategy,
    RandomStrategy, SchedulingStrategy,
};

use crate::error::RuntimeError;
use crate::runtime::RuntimeOptions;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[default]
    Random,
    Dfs,
    Pct,
    RandomDelay,
    ExhaustiveDelay,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Random,
        StrategyKind::Dfs,
        StrategyKind::Pct,
        StrategyKind::RandomDelay,
        StrategyKind::ExhaustiveDelay,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Random => "random",
            StrategyKind::Dfs => "dfs",
            StrategyKind::Pct => "pct",
            StrategyKind::RandomDelay => "random-delay",
            StrategyKind::ExhaustiveDelay => "exhaustive-delay",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = StrategyKind::ALL.iter().map(|k| k.name()).collect();
                RuntimeError::Config(format!(
                    "unknown strategy '{s}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

/// Flat set of testing options. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub strategy: StrategyKind,
    /// Iteration budget; 0 runs until the strategy is exhausted.
    pub iterations: usize,
    /// Depth bound in scheduling decisions; 0 disables it.
    pub max_steps: usize,
    /// Seed for randomized strategies; derived from the clock when absent.
    pub seed: Option<u64>,
    /// Max delays (delay bounding) or priority change points (pct).
    pub strategy_bound: usize,
    pub enable_race_detection: bool,
    pub depth_bound_is_bug: bool,
    pub stop_at_first_bug: bool,
    pub user_state_hashing: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            strategy: StrategyKind::Random,
            iterations: 100,
            max_steps: 10_000,
            seed: None,
            strategy_bound: 2,
            enable_race_detection: false,
            depth_bound_is_bug: false,
            stop_at_first_bug: false,
            user_state_hashing: false,
        }
    }
}

impl Configuration {
    pub fn from_json(json: &str) -> Result<Self, RuntimeError> {
        serde_json::from_str(json).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, RuntimeError> {
        let json = std::fs::read_to_string(path)?;
        Configuration::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, RuntimeError> {
        serde_json::to_string_pretty(self).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default()
        })
    }

    pub fn build_strategy(&self, seed: u64) -> Box<dyn SchedulingStrategy> {
        let (max_steps, bound) = (self.max_steps, self.strategy_bound);
        match self.strategy {
            StrategyKind::Random => Box::new(RandomStrategy::new(seed, max_steps)),
            StrategyKind::Dfs => Box::new(DfsStrategy::new(max_steps)),
            StrategyKind::Pct => Box::new(PctStrategy::new(seed, max_steps, bound)),
            StrategyKind::RandomDelay => {
                Box::new(RandomDelayBoundingStrategy::random(seed, max_steps, bound))
            }
            StrategyKind::ExhaustiveDelay => {
                Box::new(ExhaustiveDelayBoundingStrategy::exhaustive(seed, max_steps, bound))
            }
        }
    }

    pub fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            race_detection: self.enable_race_detection,
            user_state_hashing: self.user_state_hashing,
            depth_bound_is_bug: self.depth_bound_is_bug,
        }
    }
}
