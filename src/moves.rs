use crate::tile_set::SetError;
use crate::{BoardState, Rack, SlotId, TileCounts, TileSet};
use std::fmt;

/// Points a player's first placement must reach
pub const INITIAL_MELD_POINTS: u32 = 30;

/// A player's action for one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Move {
    /// Replace the table with `board`, which holds the old table plus `consumed` from the rack
    Place {
        board: BoardState,
        consumed: TileCounts,
    },
    /// Take the next tile from the pool
    Draw,
    /// Do nothing (only when no move is possible and the pool is empty)
    Pass,
}

impl Move {
    /// The placement that turns `before` into `after`, or None if `after`
    /// lost tiles or adds none.
    pub fn placement(before: &BoardState, after: BoardState) -> Option<Move> {
        let consumed = after.tiles().checked_sub(&before.tiles())?;
        if consumed.is_empty() {
            return None;
        }
        Some(Move::Place {
            board: after,
            consumed,
        })
    }

    /// Number of rack tiles this move puts on the table
    pub fn tiles_placed(&self) -> usize {
        match self {
            Move::Place { consumed, .. } => consumed.len(),
            Move::Draw | Move::Pass => 0,
        }
    }

    pub fn is_place(&self) -> bool {
        matches!(self, Move::Place { .. })
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Place { consumed, .. } => write!(f, "place {consumed}"),
            Move::Draw => f.write_str("draw"),
            Move::Pass => f.write_str("pass"),
        }
    }
}

/// Why a move was not applied. The board and rack are unchanged in every case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejected {
    #[error("a placement must put at least one tile from the rack on the table")]
    NothingPlaced,
    #[error("initial meld needs {INITIAL_MELD_POINTS} points from the rack, got {points}")]
    InitialMeldNotMet { points: u32 },
    #[error("set in slot {slot} is invalid: {reason}")]
    InvalidSet { slot: SlotId, reason: SetError },
    /// Tiles appeared or vanished. This is a bug in the caller, never a player error.
    #[error("tile conservation violated: {0}")]
    InvariantViolation(String),
}

impl MoveRejected {
    /// Rule violations are the player's fault and may be retried; invariant
    /// violations point at corrupted state.
    pub fn is_rule_violation(&self) -> bool {
        !matches!(self, MoveRejected::InvariantViolation(_))
    }
}

fn invariant_violation(detail: String) -> MoveRejected {
    log::error!("rejecting move: {detail}");
    MoveRejected::InvariantViolation(detail)
}

/// Validate `mv` against the current `board` and `rack` and return the
/// resulting state.
///
/// Checks, in order: at least one tile placed; the initial-meld gate; every
/// set of the new board; tile conservation. Nothing is mutated: on error the
/// caller keeps its old state, on success it swaps in the returned pair.
pub fn apply_move(
    board: &BoardState,
    rack: &Rack,
    mv: &Move,
) -> Result<(BoardState, Rack), MoveRejected> {
    let (new_board, consumed) = match mv {
        Move::Draw | Move::Pass => return Ok((board.clone(), rack.clone())),
        Move::Place { board, consumed } => (board, consumed),
    };

    if consumed.is_empty() {
        return Err(MoveRejected::NothingPlaced);
    }

    if !rack.has_melded() {
        let points = new_tile_points(board, new_board, consumed);
        if points < INITIAL_MELD_POINTS {
            return Err(MoveRejected::InitialMeldNotMet { points });
        }
    }

    for (slot, set) in new_board.slots() {
        TileSet::new(set.tiles().to_vec()).map_err(|reason| MoveRejected::InvalidSet {
            slot: *slot,
            reason,
        })?;
    }

    let Some(remaining) = rack.tiles().checked_sub(consumed) else {
        return Err(invariant_violation(format!(
            "placed tiles {consumed} are not all in the rack {}",
            rack.tiles()
        )));
    };
    let expected = board.tiles().union(consumed);
    let actual = new_board.tiles();
    if actual != expected {
        return Err(invariant_violation(format!(
            "table would hold {actual}, expected {expected}"
        )));
    }

    Ok((new_board.clone(), rack.after_placement(remaining)))
}

/// Points contributed by rack tiles to sets that are new on `after`.
/// Jokers count as the value they assume in their set.
fn new_tile_points(before: &BoardState, after: &BoardState, consumed: &TileCounts) -> u32 {
    let mut unplaced = consumed.clone();
    let mut untouched: Vec<&TileSet> = before.sets().collect();
    let mut points = 0;
    for set in after.sets() {
        if let Some(pos) = untouched.iter().position(|old| *old == set) {
            untouched.swap_remove(pos);
            continue;
        }
        for (tile, assumed) in set.tiles().iter().zip(set.assumed_tiles()) {
            if unplaced.remove(tile) {
                points += u32::from(assumed.number().unwrap_or(0));
            }
        }
    }
    points
}

/// A move against a recorded state that can be committed or rolled back
#[derive(Debug, Clone)]
pub struct Transaction {
    board: BoardState,
    rack: Rack,
}

impl Transaction {
    /// Record the state a move will be applied to
    pub fn begin(board: &BoardState, rack: &Rack) -> Self {
        Transaction {
            board: board.clone(),
            rack: rack.clone(),
        }
    }

    /// Apply `mv` to the recorded state; the record is kept for rollback
    pub fn commit(&self, mv: &Move) -> Result<(BoardState, Rack), MoveRejected> {
        apply_move(&self.board, &self.rack, mv)
    }

    /// The state as it was before the move
    pub fn rollback(self) -> (BoardState, Rack) {
        (self.board, self.rack)
    }
}
