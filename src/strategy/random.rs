use super::{Budget, Strategy, StrategyKind};
use crate::clock::Deadline;
use crate::decompose::{DecomposeOptions, decompose_extend_with, decompose_with};
use crate::moves::INITIAL_MELD_POINTS;
use crate::tile_set::MIN_SET_LEN;
use crate::{BoardState, Move, Rack, TileCounts};
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomConfig {
    /// Random subsets tried per decision
    pub trials: u32,
    /// Largest subset drawn from the rack
    pub max_subset: usize,
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self {
            trials: 200,
            max_subset: 6,
        }
    }
}

/// Plays a uniformly chosen legal placement found by sampling rack subsets
#[derive(Debug, Clone)]
pub struct RandomStrategy {
    config: RandomConfig,
    decompose: DecomposeOptions,
}

impl RandomStrategy {
    pub fn new(config: RandomConfig, decompose: DecomposeOptions) -> Self {
        Self { config, decompose }
    }

    /// Turn a subset of the rack into a placement, if it forms one
    fn try_subset(&self, board: &BoardState, rack: &Rack, subset: &TileCounts) -> Option<Move> {
        let after = if rack.has_melded() {
            decompose_extend_with(board, subset, &self.decompose)?
        } else {
            let sets = decompose_with(subset, &self.decompose)?;
            let points: u32 = sets.iter().map(|set| set.points()).sum();
            if points < INITIAL_MELD_POINTS {
                return None;
            }
            board.with_added(sets)
        };
        Move::placement(board, after)
    }
}

impl Strategy for RandomStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Random
    }

    fn choose_move(&self, board: &BoardState, rack: &Rack, budget: &Budget) -> Move {
        let mut rng = Pcg32::seed_from_u64(budget.seed);
        let tiles = rack.tiles().to_vec();
        let min = if rack.has_melded() { 1 } else { MIN_SET_LEN };
        let max = self.config.max_subset.min(tiles.len());
        if min > max {
            return Move::Draw;
        }

        let deadline = Deadline::start(budget.time_limit_ms);
        let mut tried = HashSet::new();
        let mut found = Vec::new();
        for _ in 0..self.config.trials {
            if deadline.is_expired() || budget.is_cancelled() {
                break;
            }
            let size = rng.random_range(min..=max);
            let subset: TileCounts = tiles.choose_multiple(&mut rng, size).copied().collect();
            if !tried.insert(subset.clone()) {
                continue;
            }
            if let Some(mv) = self.try_subset(board, rack, &subset) {
                found.push(mv);
            }
        }

        log::trace!(
            "random: {} distinct subsets, {} placements",
            tried.len(),
            found.len()
        );
        found.choose(&mut rng).cloned().unwrap_or(Move::Draw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TileSet, apply_move, parse_tiles};

    fn set(s: &str) -> TileSet {
        s.parse().unwrap()
    }

    fn strategy() -> RandomStrategy {
        RandomStrategy::new(RandomConfig::default(), DecomposeOptions::default())
    }

    #[test]
    fn test_random_moves_are_legal() {
        let board = BoardState::from_sets([set("r 4 5 6"), set("9 b y k")]);
        let rack = Rack::melded(parse_tiles("r3 r7 r9 b1 b2 b3 y12").unwrap());
        for seed in 0..20 {
            let mv = strategy().choose_move(&board, &rack, &Budget::default().with_seed(seed));
            assert!(mv.is_place(), "seed {seed} found nothing");
            assert!(apply_move(&board, &rack, &mv).is_ok());
        }
    }

    #[test]
    fn test_random_same_seed_same_move() {
        let board = BoardState::from_sets([set("r 4 5 6")]);
        let rack = Rack::melded(parse_tiles("r3 r7 b1 b2 b3 k5 y5").unwrap());
        let budget = Budget::default().with_seed(11);
        assert_eq!(
            strategy().choose_move(&board, &rack, &budget),
            strategy().choose_move(&board, &rack, &budget)
        );
    }

    #[test]
    fn test_random_respects_initial_meld() {
        // Only r1 r2 r3 (6 points) can be laid down: not enough to meld
        let rack = Rack::new(parse_tiles("r1 r2 r3 b7 y11").unwrap());
        let mv = strategy().choose_move(&BoardState::new(), &rack, &Budget::default());
        assert_eq!(mv, Move::Draw);

        let rack = Rack::new(parse_tiles("r10 r11 r12 b2").unwrap());
        let mv = strategy().choose_move(&BoardState::new(), &rack, &Budget::default());
        assert_eq!(mv.tiles_placed(), 3);
    }

    #[test]
    fn test_random_draws_with_small_rack() {
        let rack = Rack::new(parse_tiles("r1 r2").unwrap());
        assert_eq!(
            strategy().choose_move(&BoardState::new(), &rack, &Budget::default()),
            Move::Draw
        );
    }
}
