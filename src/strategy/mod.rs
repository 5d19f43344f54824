//! AI players.
//!
//! Every strategy sees an immutable snapshot of the table and its own rack
//! and answers with a [`Move`]. Strategies never mutate state; the caller
//! runs the move through [`apply_move`](crate::apply_move).

mod candidates;
pub mod greedy;
pub mod mcts;
pub mod random;

pub use greedy::GreedyStrategy;
pub use mcts::{MctsConfig, MctsStrategy, SearchReport};
pub use random::{RandomConfig, RandomStrategy};

use crate::decompose::DecomposeOptions;
use crate::{BoardState, Move, Rack, apply_move};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Iterations used when a budget sets neither an iteration count nor a time limit
pub const DEFAULT_ITERATIONS: u32 = 500;

/// A move-selection policy
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Pick a move for the player holding `rack`. The result is always
    /// accepted by `apply_move` for this board and rack.
    fn choose_move(&self, board: &BoardState, rack: &Rack, budget: &Budget) -> Move;
}

/// Which strategy to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(not(target_arch = "wasm32"), derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Random,
    Greedy,
    Mcts,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::Random => "random",
            StrategyKind::Greedy => "greedy",
            StrategyKind::Mcts => "mcts",
        })
    }
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(StrategyKind::Random),
            "greedy" => Ok(StrategyKind::Greedy),
            "mcts" => Ok(StrategyKind::Mcts),
            _ => Err(ConfigError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Shared stop signal for a running search
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-decision resource limits.
///
/// A search stops at whichever limit is hit first. Hitting a limit is never
/// an error: the best move found so far is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Budget {
    /// Maximum search iterations (MCTS playouts)
    pub iterations: Option<u32>,
    /// Wall-clock limit in milliseconds
    pub time_limit_ms: Option<u64>,
    /// Seed for every random choice made during the decision
    pub seed: u64,
    #[serde(skip)]
    pub cancel: Option<CancelFlag>,
}

impl Default for Budget {
    fn default() -> Self {
        Budget {
            iterations: Some(DEFAULT_ITERATIONS),
            time_limit_ms: None,
            seed: 0,
            cancel: None,
        }
    }
}

impl Budget {
    pub fn iterations(iterations: u32) -> Self {
        Budget {
            iterations: Some(iterations),
            ..Budget::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_time_limit_ms(mut self, limit: u64) -> Self {
        self.time_limit_ms = Some(limit);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }

    /// Iteration cap, falling back to [`DEFAULT_ITERATIONS`] when neither an
    /// iteration count nor a time limit is set. A cancel flag alone does not
    /// bound a search.
    pub fn max_iterations(&self) -> u32 {
        match (self.iterations, self.time_limit_ms) {
            (Some(n), _) => n,
            (None, None) => DEFAULT_ITERATIONS,
            (None, Some(_)) => u32::MAX,
        }
    }

    /// Same limits with a seed derived for a sub-decision
    pub fn derived(&self, stream: u64) -> Budget {
        Budget {
            seed: derive_seed(self.seed, stream),
            ..self.clone()
        }
    }
}

/// Mix a stream index into a seed (SplitMix64 finalizer)
pub(crate) fn derive_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed.wrapping_add(stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Tunables for all strategies, loadable from JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub random: RandomConfig,
    pub mcts: MctsConfig,
    pub decompose: DecomposeOptions,
}

impl StrategyConfig {
    /// Parse and validate a JSON config; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: StrategyConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mcts.validate()?;
        if self.decompose.node_limit == 0 {
            return Err(ConfigError::OutOfRange {
                field: "decompose.node_limit",
                expected: "at least 1",
            });
        }
        Ok(())
    }
}

/// Errors from parsing or validating strategy configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown strategy `{0}`, expected random, greedy or mcts")]
    UnknownStrategy(String),
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{field}` must be {expected}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
    },
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// Instantiate the strategy for `kind`
pub fn build(kind: StrategyKind, config: &StrategyConfig) -> Box<dyn Strategy> {
    match kind {
        StrategyKind::Random => Box::new(RandomStrategy::new(config.random.clone(), config.decompose)),
        StrategyKind::Greedy => Box::new(GreedyStrategy::new(config.decompose)),
        StrategyKind::Mcts => Box::new(MctsStrategy::new(config)),
    }
}

/// Pick a move with the default configuration for `kind`
pub fn choose_move(board: &BoardState, rack: &Rack, kind: StrategyKind, budget: &Budget) -> Move {
    choose_move_with(board, rack, kind, budget, &StrategyConfig::default())
}

/// Pick a move with an explicit configuration.
///
/// A strategy answer that fails validation is logged and replaced by `Draw`.
pub fn choose_move_with(
    board: &BoardState,
    rack: &Rack,
    kind: StrategyKind,
    budget: &Budget,
    config: &StrategyConfig,
) -> Move {
    let mv = build(kind, config).choose_move(board, rack, budget);
    checked(board, rack, kind, mv)
}

pub(crate) fn checked(board: &BoardState, rack: &Rack, kind: StrategyKind, mv: Move) -> Move {
    match apply_move(board, rack, &mv) {
        Ok(_) => mv,
        Err(rejected) => {
            log::error!("{kind} strategy produced a rejected move ({mv}): {rejected}");
            Move::Draw
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_kind_from_str() {
        assert_eq!("MCTS".parse::<StrategyKind>().unwrap(), StrategyKind::Mcts);
        assert_eq!(" greedy".parse::<StrategyKind>().unwrap(), StrategyKind::Greedy);
        assert!(matches!(
            "minimax".parse::<StrategyKind>(),
            Err(ConfigError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config = StrategyConfig::from_json(r#"{"mcts": {"exploration": 2.0}}"#).unwrap();
        assert_eq!(config.mcts.exploration, 2.0);
        assert_eq!(config.mcts.rollouts_per_leaf, MctsConfig::default().rollouts_per_leaf);
        assert_eq!(config.random, RandomConfig::default());
        assert_eq!(config.decompose, DecomposeOptions::default());
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(matches!(
            StrategyConfig::from_json(r#"{"mcts": {"rollouts_per_leaf": 0}}"#),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            StrategyConfig::from_json(r#"{"mcts": {"rollout_policy": "mcts"}}"#),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            StrategyConfig::from_json("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_budget_limits() {
        assert_eq!(Budget::iterations(7).max_iterations(), 7);
        let unbounded = Budget {
            iterations: None,
            ..Budget::default()
        };
        assert_eq!(unbounded.max_iterations(), DEFAULT_ITERATIONS);
        assert_eq!(unbounded.clone().with_time_limit_ms(10).max_iterations(), u32::MAX);
        let cancel_only = unbounded.with_cancel(CancelFlag::new());
        assert_eq!(cancel_only.max_iterations(), DEFAULT_ITERATIONS);

        let cancel = CancelFlag::new();
        let budget = Budget::default().with_cancel(cancel.clone());
        assert!(!budget.is_cancelled());
        cancel.cancel();
        assert!(budget.is_cancelled());
    }

    #[test]
    fn test_derived_seeds_differ() {
        let budget = Budget::default().with_seed(42);
        assert_ne!(budget.derived(0).seed, budget.derived(1).seed);
        assert_eq!(budget.derived(3).seed, budget.derived(3).seed);
    }
}
