//! Game harness: draw pile, turn order and a self-play loop.
//!
//! `GameState` is the full perfect-information state of a game. The engine
//! itself never reads opponents' racks; MCTS builds a `GameState` from a
//! sampled guess of them.

use crate::moves::Transaction;
use crate::strategy::{Budget, Strategy, StrategyKind};
use crate::{BoardState, Move, MoveRejected, Rack, Tile, TileCounts};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;
use serde::Serialize;

/// Tiles dealt to each player at the start of a game
pub const INITIAL_RACK_SIZE: usize = 14;

/// Where drawn tiles come from
pub trait TileSource {
    /// The next tile, or None when the pile is empty
    fn draw(&mut self) -> Option<Tile>;

    fn remaining(&self) -> usize;
}

/// A draw pile in a fixed order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TilePool {
    // Drawn from the back
    tiles: Vec<Tile>,
}

impl TilePool {
    /// All 106 tiles, shuffled
    pub fn shuffled(seed: u64) -> Self {
        let mut pool = TilePool::from_order(TileCounts::full_set().to_vec());
        pool.shuffle(&mut Pcg32::seed_from_u64(seed));
        pool
    }

    /// A pile that deals `tiles` front to back
    pub fn from_order(mut tiles: Vec<Tile>) -> Self {
        tiles.reverse();
        TilePool { tiles }
    }

    pub fn shuffle(&mut self, rng: &mut Pcg32) {
        self.tiles.shuffle(rng);
    }

    pub fn tiles(&self) -> TileCounts {
        self.tiles.iter().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Take up to `n` tiles
    pub fn deal(&mut self, n: usize) -> TileCounts {
        (0..n).map_while(|_| self.draw()).collect()
    }
}

impl TileSource for TilePool {
    fn draw(&mut self) -> Option<Tile> {
        self.tiles.pop()
    }

    fn remaining(&self) -> usize {
        self.tiles.len()
    }
}

/// What happened on a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnOutcome {
    Placed { tiles: usize },
    Drew,
    /// Wanted to draw (or passed) with an empty pile
    Passed,
}

/// Turn summary handed to observers
#[derive(Debug, Clone, Serialize)]
pub struct TurnRecord {
    pub turn: u32,
    pub player: usize,
    pub strategy: StrategyKind,
    #[serde(rename = "move")]
    pub action: String,
    pub outcome: TurnOutcome,
    /// Set when the strategy's move was rejected and a draw was played instead
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,
    pub rack_size: usize,
    pub board_sets: usize,
    pub pool_remaining: usize,
}

/// Receives a record after every turn. Observers cannot affect the game.
pub trait TurnObserver {
    fn on_turn(&mut self, record: &TurnRecord);
}

impl<F: FnMut(&TurnRecord)> TurnObserver for F {
    fn on_turn(&mut self, record: &TurnRecord) {
        self(record)
    }
}

/// Full state of a game in progress
#[derive(Debug, Clone)]
pub struct GameState {
    board: BoardState,
    racks: Vec<Rack>,
    pool: TilePool,
    current: usize,
    turn: u32,
    consecutive_passes: usize,
    winner: Option<usize>,
}

impl GameState {
    /// Shuffle a full set and deal [`INITIAL_RACK_SIZE`] tiles to each player
    pub fn deal(players: usize, seed: u64) -> Self {
        let mut pool = TilePool::shuffled(seed);
        let racks = (0..players)
            .map(|_| Rack::new(pool.deal(INITIAL_RACK_SIZE)))
            .collect();
        GameState::from_parts(BoardState::new(), racks, pool, 0)
    }

    pub fn from_parts(board: BoardState, racks: Vec<Rack>, pool: TilePool, current: usize) -> Self {
        let current = if racks.is_empty() { 0 } else { current % racks.len() };
        GameState {
            board,
            racks,
            pool,
            current,
            turn: 0,
            consecutive_passes: 0,
            winner: None,
        }
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn racks(&self) -> &[Rack] {
        &self.racks
    }

    pub fn rack(&self, player: usize) -> &Rack {
        &self.racks[player]
    }

    pub fn players(&self) -> usize {
        self.racks.len()
    }

    pub fn current_player(&self) -> usize {
        self.current
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn pool(&self) -> &TilePool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut TilePool {
        &mut self.pool
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    /// Nobody can move any more: every player passed in a row on an empty pile
    pub fn is_blocked(&self) -> bool {
        self.winner.is_none() && self.consecutive_passes >= self.racks.len()
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some() || self.is_blocked() || self.racks.is_empty()
    }

    /// Play `mv` for the current player and pass the turn on.
    ///
    /// `Draw` on an empty pile is a pass. A rejected placement leaves the
    /// state (and the turn) unchanged.
    pub fn play(&mut self, mv: &Move) -> Result<TurnOutcome, MoveRejected> {
        if self.is_over() {
            log::error!("move {mv} played after the game ended");
            return Err(MoveRejected::InvariantViolation(
                "move played after the game ended".to_string(),
            ));
        }
        let player = self.current;
        let outcome = match mv {
            Move::Place { .. } => {
                let tx = Transaction::begin(&self.board, &self.racks[player]);
                let (board, rack) = tx.commit(mv)?;
                self.board = board;
                self.racks[player] = rack;
                self.consecutive_passes = 0;
                if self.racks[player].is_empty() {
                    self.winner = Some(player);
                }
                TurnOutcome::Placed {
                    tiles: mv.tiles_placed(),
                }
            }
            Move::Draw | Move::Pass => self.draw_or_pass(matches!(mv, Move::Draw)),
        };
        self.turn += 1;
        self.current = (self.current + 1) % self.racks.len();
        Ok(outcome)
    }

    fn draw_or_pass(&mut self, wants_tile: bool) -> TurnOutcome {
        match wants_tile.then(|| self.pool.draw()).flatten() {
            Some(tile) => {
                self.racks[self.current].receive(tile);
                self.consecutive_passes = 0;
                TurnOutcome::Drew
            }
            None => {
                self.consecutive_passes += 1;
                TurnOutcome::Passed
            }
        }
    }

    /// Ask `strategy` for the current player's move and play it. A rejected
    /// move is replaced by a draw so the game always advances.
    pub fn play_turn(&mut self, strategy: &dyn Strategy, budget: &Budget) -> TurnRecord {
        let player = self.current;
        let turn = self.turn;
        let mv = strategy.choose_move(&self.board, &self.racks[player], budget);
        let (outcome, rejected) = match self.play(&mv) {
            Ok(outcome) => (outcome, None),
            Err(rejected) => {
                log::warn!("player {player} move rejected ({rejected}), drawing instead");
                (self.play(&Move::Draw).unwrap_or(TurnOutcome::Passed), Some(rejected.to_string()))
            }
        };
        TurnRecord {
            turn,
            player,
            strategy: strategy.kind(),
            action: mv.to_string(),
            outcome,
            rejected,
            rack_size: self.racks[player].len(),
            board_sets: self.board.len(),
            pool_remaining: self.pool.remaining(),
        }
    }

    /// Every tile in the game: table, racks and pile
    pub fn all_tiles(&self) -> TileCounts {
        self.racks
            .iter()
            .fold(self.board.tiles().union(&self.pool.tiles()), |all, rack| {
                all.union(rack.tiles())
            })
    }
}

/// Final result of a self-play game.
///
/// A blocked game goes to the player holding the fewest penalty points;
/// when several share that total it is a tie.
#[derive(Debug, Clone, Serialize)]
pub struct GameSummary {
    pub winner: Option<usize>,
    pub tie: bool,
    pub blocked: bool,
    pub turns: u32,
    pub rack_sizes: Vec<usize>,
    pub penalty_points: Vec<u32>,
    pub board_sets: usize,
}

impl GameSummary {
    fn of(state: &GameState) -> Self {
        let penalty_points: Vec<u32> = state.racks().iter().map(Rack::penalty_points).collect();
        let blocked = state.is_blocked();
        let (winner, tie) = match state.winner() {
            Some(player) => (Some(player), false),
            None if blocked => match lowest(&penalty_points) {
                Some(player) => (Some(player), false),
                None => (None, !penalty_points.is_empty()),
            },
            None => (None, false),
        };
        GameSummary {
            winner,
            tie,
            blocked,
            turns: state.turn(),
            rack_sizes: state.racks().iter().map(Rack::len).collect(),
            penalty_points,
            board_sets: state.board().len(),
        }
    }
}

// Index of the unique smallest total
fn lowest(points: &[u32]) -> Option<usize> {
    let min = points.iter().min()?;
    let mut holders = points.iter().enumerate().filter(|(_, p)| *p == min);
    let (first, _) = holders.next()?;
    holders.next().is_none().then_some(first)
}

/// Run a game to the end or to `max_turns`, player `i` using `players[i]`.
///
/// Each turn gets `budget` with a seed derived from the turn number, so a
/// game is reproducible from the budget's seed and the deal. A `players`
/// list that does not match the deal's seat count plays no turns.
pub fn play_game(
    mut state: GameState,
    players: &[Box<dyn Strategy>],
    budget: &Budget,
    max_turns: u32,
    observer: &mut dyn TurnObserver,
) -> GameSummary {
    let seated = players.len() == state.players();
    if !seated {
        log::error!(
            "{} strategies for a {}-player game, not playing",
            players.len(),
            state.players()
        );
    }
    while seated && !state.is_over() && state.turn() < max_turns && !budget.is_cancelled() {
        let strategy = &players[state.current_player()];
        let record = state.play_turn(strategy.as_ref(), &budget.derived(u64::from(state.turn())));
        log::debug!(
            "turn {}: player {} ({}) {} -> {} tiles left",
            record.turn,
            record.player,
            record.strategy,
            record.action,
            record.rack_size
        );
        observer.on_turn(&record);
    }

    let summary = GameSummary::of(&state);
    match summary.winner {
        Some(player) if summary.blocked => log::info!(
            "blocked after {} turns, player {player} wins on points {:?}",
            summary.turns,
            summary.penalty_points
        ),
        Some(player) => log::info!("player {player} wins after {} turns", summary.turns),
        None if summary.tie => log::info!("blocked after {} turns, tied on points", summary.turns),
        None => log::info!("no winner after {} turns", summary.turns),
    }
    summary
}
