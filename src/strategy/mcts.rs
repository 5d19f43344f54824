//! Monte Carlo tree search over a determinized game.
//!
//! Opponents' racks and the pile order are unknown, so each decision samples
//! one consistent guess of them and searches that perfect-information game.
//! The tree is an arena of nodes linked by index and is thrown away after
//! the decision.

use super::candidates::candidate_moves;
use super::{
    Budget, ConfigError, GreedyStrategy, RandomConfig, RandomStrategy, Strategy, StrategyConfig,
    StrategyKind, derive_seed,
};
use crate::clock::Deadline;
use crate::decompose::DecomposeOptions;
use crate::game::{GameState, INITIAL_RACK_SIZE, TilePool};
use crate::{BoardState, Move, Rack, TileCounts};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;
#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// The deciding player's seat in the sampled game
const ME: usize = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MctsConfig {
    /// UCB1 exploration constant
    pub exploration: f64,
    /// Playouts run from every new leaf
    pub rollouts_per_leaf: usize,
    /// Turns simulated per playout before it is scored
    pub rollout_turns: u32,
    /// Policy every player follows during playouts
    pub rollout_policy: StrategyKind,
    /// Candidate moves per node, `Draw` included
    pub max_children: usize,
    /// Rack sizes of the opponents, in turn order after the deciding player
    pub opponent_rack_sizes: Vec<usize>,
    /// Whether sampled opponents may rearrange the table
    pub opponents_melded: bool,
    /// Node limit for the greedy search behind the candidates of non-root nodes
    pub expansion_node_limit: usize,
    /// Node limit for decompositions made during playouts
    pub rollout_node_limit: usize,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            exploration: 1.4,
            rollouts_per_leaf: 4,
            rollout_turns: 16,
            rollout_policy: StrategyKind::Greedy,
            max_children: 16,
            opponent_rack_sizes: vec![INITIAL_RACK_SIZE],
            opponents_melded: true,
            expansion_node_limit: 20_000,
            rollout_node_limit: 5_000,
        }
    }
}

impl MctsConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !self.exploration.is_finite() || self.exploration < 0.0 {
            return out_of_range("mcts.exploration", "a non-negative number");
        }
        if self.rollouts_per_leaf == 0 {
            return out_of_range("mcts.rollouts_per_leaf", "at least 1");
        }
        if self.max_children == 0 {
            return out_of_range("mcts.max_children", "at least 1");
        }
        if self.rollout_policy == StrategyKind::Mcts {
            return out_of_range("mcts.rollout_policy", "random or greedy");
        }
        if self.opponent_rack_sizes.is_empty() {
            return out_of_range("mcts.opponent_rack_sizes", "a non-empty list");
        }
        if self.expansion_node_limit == 0 {
            return out_of_range("mcts.expansion_node_limit", "at least 1");
        }
        if self.rollout_node_limit == 0 {
            return out_of_range("mcts.rollout_node_limit", "at least 1");
        }
        Ok(())
    }

    /// Sample one hidden rack per opponent of a `players`-seat game.
    ///
    /// Only the default single-opponent list is resized; an explicit list of
    /// a different length is kept and logged.
    pub fn fit_to_players(&mut self, players: usize) {
        let opponents = players.saturating_sub(1).max(1);
        if self.opponent_rack_sizes == MctsConfig::default().opponent_rack_sizes {
            self.opponent_rack_sizes = vec![INITIAL_RACK_SIZE; opponents];
        } else if self.opponent_rack_sizes.len() != opponents {
            log::warn!(
                "mcts.opponent_rack_sizes lists {} opponents for a {players}-player game",
                self.opponent_rack_sizes.len()
            );
        }
    }
}

fn out_of_range(field: &'static str, expected: &'static str) -> Result<(), ConfigError> {
    Err(ConfigError::OutOfRange { field, expected })
}

/// Statistics for one root child
#[derive(Debug, Clone, Serialize)]
pub struct ChildStats {
    #[serde(rename = "move")]
    pub action: String,
    pub visits: u32,
    pub mean_reward: f64,
}

/// Outcome of one search
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub chosen: Move,
    pub iterations: u32,
    pub root_visits: u32,
    pub elapsed_ms: u64,
    pub children: Vec<ChildStats>,
}

#[derive(Debug, Clone)]
struct Node {
    state: GameState,
    parent: Option<usize>,
    /// Move that led here from the parent
    action: Option<Move>,
    /// Player who made `action`
    mover: usize,
    children: Vec<usize>,
    /// Candidates not expanded yet, in candidate order
    untried: Vec<Move>,
    visits: u32,
    /// Sum of rewards, from the deciding player's point of view
    reward: f64,
}

impl Node {
    fn mean(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.reward / f64::from(self.visits)
        }
    }
}

pub struct MctsStrategy {
    config: MctsConfig,
    /// Search limits for the root's candidates
    decompose: DecomposeOptions,
    /// Search limits for the candidates of every other node
    expansion: DecomposeOptions,
    rollout: Box<dyn Strategy>,
}

impl MctsStrategy {
    pub fn new(config: &StrategyConfig) -> Self {
        let rollout_options = DecomposeOptions {
            node_limit: config.mcts.rollout_node_limit,
        };
        let rollout: Box<dyn Strategy> = match config.mcts.rollout_policy {
            StrategyKind::Random => Box::new(RandomStrategy::new(
                RandomConfig {
                    trials: config.random.trials.min(50),
                    ..config.random.clone()
                },
                rollout_options,
            )),
            StrategyKind::Greedy | StrategyKind::Mcts => Box::new(GreedyStrategy::new(rollout_options)),
        };
        MctsStrategy {
            config: config.mcts.clone(),
            decompose: config.decompose,
            expansion: DecomposeOptions {
                node_limit: config.mcts.expansion_node_limit,
            },
            rollout,
        }
    }

    /// Run a full search and report on it
    pub fn search(&self, board: &BoardState, rack: &Rack, budget: &Budget) -> SearchReport {
        let deadline = Deadline::start(budget.time_limit_ms);
        let max_iterations = budget.max_iterations();
        let mut rng = Pcg32::seed_from_u64(budget.seed);
        let root = self.determinize(board, rack, &mut rng);
        let mut tree = vec![self.node(root, None, None, ME, &self.decompose, &deadline)];
        let fallback = tree[0].untried.first().cloned().unwrap_or(Move::Draw);

        let mut iterations = 0;
        while iterations < max_iterations && !deadline.is_expired() && !budget.is_cancelled() {
            let leaf = self.select(&tree);
            let node = self.expand(&mut tree, leaf, &deadline);
            let seed = derive_seed(budget.seed, u64::from(iterations));
            let (visits, reward) = self.simulate(&tree[node].state, seed, &deadline, budget);
            backpropagate(&mut tree, node, visits, reward);
            iterations += 1;
            log::trace!(
                "iteration {iterations}: leaf {node}, reward {:.3}",
                reward / f64::from(visits)
            );
        }

        let children: Vec<ChildStats> = tree[0]
            .children
            .iter()
            .map(|&child| ChildStats {
                action: tree[child]
                    .action
                    .as_ref()
                    .map_or_else(String::new, Move::to_string),
                visits: tree[child].visits,
                mean_reward: tree[child].mean(),
            })
            .collect();
        let chosen = most_visited(&tree)
            .and_then(|child| tree[child].action.clone())
            .unwrap_or(fallback);

        let report = SearchReport {
            chosen,
            iterations,
            root_visits: tree[0].visits,
            elapsed_ms: deadline.elapsed_ms(),
            children,
        };
        log::debug!(
            "mcts: {} iterations, {} nodes, {} root visits in {} ms, chose {}",
            report.iterations,
            tree.len(),
            report.root_visits,
            report.elapsed_ms,
            report.chosen
        );
        report
    }

    /// Deal the unseen tiles to the opponents and the pile
    fn determinize(&self, board: &BoardState, rack: &Rack, rng: &mut Pcg32) -> GameState {
        let unseen = TileCounts::full_set()
            .saturating_sub(&board.tiles())
            .saturating_sub(rack.tiles());
        let mut unseen = unseen.to_vec();
        unseen.shuffle(rng);

        let mut pool = TilePool::from_order(unseen);
        let mut racks = vec![rack.clone()];
        for &size in &self.config.opponent_rack_sizes {
            let tiles = pool.deal(size);
            racks.push(if self.config.opponents_melded {
                Rack::melded(tiles)
            } else {
                Rack::new(tiles)
            });
        }
        GameState::from_parts(board.clone(), racks, pool, ME)
    }

    fn node(
        &self,
        state: GameState,
        parent: Option<usize>,
        action: Option<Move>,
        mover: usize,
        options: &DecomposeOptions,
        deadline: &Deadline,
    ) -> Node {
        let untried = if state.is_over() {
            Vec::new()
        } else {
            let player = state.current_player();
            candidate_moves(
                state.board(),
                state.rack(player),
                options,
                self.config.max_children,
                deadline,
            )
        };
        Node {
            state,
            parent,
            action,
            mover,
            children: Vec::new(),
            untried,
            visits: 0,
            reward: 0.0,
        }
    }

    /// Descend by UCB1 until a node with untried moves or no children
    fn select(&self, tree: &[Node]) -> usize {
        let mut current = 0;
        while tree[current].untried.is_empty() && !tree[current].children.is_empty() {
            let parent_visits = f64::from(tree[current].visits.max(1));
            let mut best = tree[current].children[0];
            let mut best_score = f64::NEG_INFINITY;
            for &child in &tree[current].children {
                let score = self.ucb1(&tree[child], parent_visits);
                if score > best_score {
                    best = child;
                    best_score = score;
                }
            }
            current = best;
        }
        current
    }

    fn ucb1(&self, node: &Node, parent_visits: f64) -> f64 {
        if node.visits == 0 {
            return f64::INFINITY;
        }
        let mean = if node.mover == ME {
            node.mean()
        } else {
            1.0 - node.mean()
        };
        mean + self.config.exploration * (parent_visits.ln() / f64::from(node.visits)).sqrt()
    }

    /// Add the next untried move of `leaf` as a child; returns the node to simulate from
    fn expand(&self, tree: &mut Vec<Node>, leaf: usize, deadline: &Deadline) -> usize {
        while !tree[leaf].untried.is_empty() {
            let mv = tree[leaf].untried.remove(0);
            let mut state = tree[leaf].state.clone();
            let mover = state.current_player();
            if let Err(rejected) = state.play(&mv) {
                log::warn!("dropping candidate {mv}: {rejected}");
                continue;
            }
            let child = tree.len();
            tree.push(self.node(state, Some(leaf), Some(mv), mover, &self.expansion, deadline));
            tree[leaf].children.push(child);
            return child;
        }
        leaf
    }

    /// Run the leaf's playouts; returns (playouts, summed reward)
    fn simulate(&self, state: &GameState, seed: u64, deadline: &Deadline, budget: &Budget) -> (u32, f64) {
        let runs = self.config.rollouts_per_leaf;
        #[cfg(not(target_arch = "wasm32"))]
        let rewards: Vec<f64> = (0..runs)
            .into_par_iter()
            .map(|i| self.rollout(state, derive_seed(seed, i as u64), deadline, budget))
            .collect();
        #[cfg(target_arch = "wasm32")]
        let rewards: Vec<f64> = (0..runs)
            .map(|i| self.rollout(state, derive_seed(seed, i as u64), deadline, budget))
            .collect();
        (runs as u32, rewards.iter().sum())
    }

    /// Play the sampled game forward and score where it ends up. A playout cut
    /// short by the clock or the cancel flag is scored as it stands.
    fn rollout(&self, state: &GameState, seed: u64, deadline: &Deadline, budget: &Budget) -> f64 {
        let mut state = state.clone();
        let mut rng = Pcg32::seed_from_u64(seed);
        state.pool_mut().shuffle(&mut rng);
        let mut turns = 0;
        while !state.is_over()
            && turns < self.config.rollout_turns
            && !deadline.is_expired()
            && !budget.is_cancelled()
        {
            let turn_budget = Budget {
                iterations: Some(1),
                time_limit_ms: deadline.remaining_ms(),
                seed: derive_seed(seed, u64::from(turns)),
                cancel: budget.cancel.clone(),
            };
            state.play_turn(self.rollout.as_ref(), &turn_budget);
            turns += 1;
        }
        reward(&state)
    }
}

impl Strategy for MctsStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Mcts
    }

    fn choose_move(&self, board: &BoardState, rack: &Rack, budget: &Budget) -> Move {
        self.search(board, rack, budget).chosen
    }
}

/// 1 for a win, 0 for a loss, otherwise how far ahead the deciding player is
/// of the best-placed opponent, mapped into (0, 1).
fn reward(state: &GameState) -> f64 {
    match state.winner() {
        Some(ME) => 1.0,
        Some(_) => 0.0,
        None => {
            let mine = state.rack(ME).len() as f64;
            let opponent = (0..state.players())
                .filter(|&p| p != ME)
                .map(|p| state.rack(p).len())
                .min()
                .unwrap_or(0) as f64;
            if mine + opponent == 0.0 {
                0.5
            } else {
                0.5 + 0.5 * (opponent - mine) / (opponent + mine)
            }
        }
    }
}

fn backpropagate(tree: &mut [Node], from: usize, visits: u32, reward: f64) {
    let mut current = Some(from);
    while let Some(index) = current {
        tree[index].visits += visits;
        tree[index].reward += reward;
        current = tree[index].parent;
    }
}

/// Root child with the most visits; the earliest candidate wins ties
fn most_visited(tree: &[Node]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for &child in &tree[0].children {
        if best.is_none_or(|b| tree[child].visits > tree[b].visits) {
            best = Some(child);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::CancelFlag;
    use crate::{TileSet, apply_move, parse_tiles};

    fn set(s: &str) -> TileSet {
        s.parse().unwrap()
    }

    fn quick_config() -> StrategyConfig {
        StrategyConfig {
            mcts: MctsConfig {
                rollouts_per_leaf: 2,
                rollout_turns: 4,
                max_children: 6,
                ..MctsConfig::default()
            },
            ..StrategyConfig::default()
        }
    }

    fn position() -> (BoardState, Rack) {
        let board = BoardState::from_sets([set("r 4 5 6"), set("9 b y k")]);
        let rack = Rack::melded(parse_tiles("r3 r7 b1 b2 b3 k12 y1 j").unwrap());
        (board, rack)
    }

    #[test]
    fn test_mcts_same_seed_same_search() {
        let (board, rack) = position();
        let mcts = MctsStrategy::new(&quick_config());
        let budget = Budget::iterations(12).with_seed(99);
        let a = mcts.search(&board, &rack, &budget);
        let b = mcts.search(&board, &rack, &budget);
        assert_eq!(a.chosen, b.chosen);
        assert_eq!(a.iterations, b.iterations);
        let visits = |r: &SearchReport| r.children.iter().map(|c| c.visits).collect::<Vec<_>>();
        assert_eq!(visits(&a), visits(&b));
    }

    #[test]
    fn test_mcts_respects_iteration_budget() {
        let (board, rack) = position();
        let mcts = MctsStrategy::new(&quick_config());
        let report = mcts.search(&board, &rack, &Budget::iterations(5));
        assert!(report.iterations <= 5);
        assert_eq!(report.root_visits, 5 * 2);
    }

    #[test]
    fn test_mcts_single_iteration_is_legal() {
        let (board, rack) = position();
        let mcts = MctsStrategy::new(&quick_config());
        let mv = mcts.choose_move(&board, &rack, &Budget::iterations(1).with_seed(4));
        assert!(apply_move(&board, &rack, &mv).is_ok());
    }

    #[test]
    fn test_mcts_cancelled_returns_first_candidate() {
        let (board, rack) = position();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mcts = MctsStrategy::new(&quick_config());
        let report = mcts.search(&board, &rack, &Budget::iterations(100).with_cancel(cancel));
        assert_eq!(report.iterations, 0);
        assert!(report.chosen.is_place());
        assert!(apply_move(&board, &rack, &report.chosen).is_ok());
    }

    #[test]
    fn test_mcts_stops_near_time_limit() {
        // 70 tiles on the table make every full rearrangement search slow
        let mut sets: Vec<TileSet> = ["r", "b", "y", "k"]
            .iter()
            .map(|color| set(&format!("{color} 1 2 3 4 5 6 7 8 9 10 11 12 13")))
            .collect();
        sets.extend((1..=6).map(|number| set(&format!("{number} r b y"))));
        let board = BoardState::from_sets(sets);
        assert_eq!(board.tiles().len(), 70);
        let rack = Rack::melded(parse_tiles("k1 k2 k3 k4 k5 k6 r9 b10 y11 r12 b13 j j").unwrap());

        let mcts = MctsStrategy::new(&StrategyConfig::default());
        let budget = Budget {
            iterations: None,
            ..Budget::default()
        }
        .with_time_limit_ms(100)
        .with_seed(8);
        let report = mcts.search(&board, &rack, &budget);
        assert!(report.elapsed_ms < 100 + 400, "took {} ms", report.elapsed_ms);
        assert!(apply_move(&board, &rack, &report.chosen).is_ok());
    }

    #[test]
    fn test_fit_to_players() {
        let mut config = MctsConfig::default();
        config.fit_to_players(4);
        assert_eq!(config.opponent_rack_sizes, vec![INITIAL_RACK_SIZE; 3]);

        let mut config = MctsConfig {
            opponent_rack_sizes: vec![9, 12],
            ..MctsConfig::default()
        };
        config.fit_to_players(4);
        assert_eq!(config.opponent_rack_sizes, vec![9, 12]);
    }

    #[test]
    fn test_mcts_takes_the_win() {
        let board = BoardState::from_sets([set("k 10 11 12")]);
        let rack = Rack::melded(parse_tiles("k13 r5 b5 y5").unwrap());
        // one playout turn, so only the immediate win scores a full 1.0
        let mut config = quick_config();
        config.mcts.rollout_turns = 1;
        let mcts = MctsStrategy::new(&config);
        let mv = mcts.choose_move(&board, &rack, &Budget::iterations(30).with_seed(1));
        let (_, rest) = apply_move(&board, &rack, &mv).unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn test_mcts_draws_with_nothing_to_place() {
        let board = BoardState::new();
        let rack = Rack::new(parse_tiles("r1 b5").unwrap());
        let mcts = MctsStrategy::new(&quick_config());
        assert_eq!(
            mcts.choose_move(&board, &rack, &Budget::iterations(3)),
            Move::Draw
        );
    }

    #[test]
    fn test_determinize_conserves_tiles() {
        let (board, rack) = position();
        let mcts = MctsStrategy::new(&StrategyConfig::default());
        let state = mcts.determinize(&board, &rack, &mut Pcg32::seed_from_u64(0));
        assert_eq!(state.players(), 2);
        assert_eq!(state.rack(1).len(), 14);
        assert_eq!(state.rack(ME), &rack);
        assert_eq!(state.all_tiles(), TileCounts::full_set());
    }

    #[test]
    fn test_reward() {
        let racks = vec![
            Rack::melded(parse_tiles("r1").unwrap()),
            Rack::melded(parse_tiles("b1 b2 b3").unwrap()),
        ];
        let state = GameState::from_parts(BoardState::new(), racks, TilePool::default(), 0);
        assert_eq!(reward(&state), 0.75);
    }
}
