use super::greedy::best_placement_until;
use crate::clock::Deadline;
use crate::decompose::{DecomposeOptions, candidate_sets};
use crate::moves::INITIAL_MELD_POINTS;
use crate::{BoardState, Move, Rack, TileSet};
use std::cmp::Reverse;

/// A short, ordered list of plausible moves for tree expansion.
///
/// Order: the greedy placement, sets made from the rack alone (best points
/// first), single tiles laid off onto one table set, and finally `Draw`,
/// which is always present. At most `max_children` moves are returned.
/// The greedy search stops at `deadline`; the cheaper candidates do not.
pub(crate) fn candidate_moves(
    board: &BoardState,
    rack: &Rack,
    options: &DecomposeOptions,
    max_children: usize,
    deadline: &Deadline,
) -> Vec<Move> {
    let limit = max_children.saturating_sub(1);
    let mut moves: Vec<Move> = Vec::new();
    let push = |moves: &mut Vec<Move>, mv: Option<Move>| match mv {
        Some(mv) if moves.len() < limit && !moves.contains(&mv) => moves.push(mv),
        _ => {}
    };

    push(&mut moves, best_placement_until(board, rack, options, deadline));

    let mut sets = candidate_sets(rack.tiles());
    sets.sort_by_key(|set| (Reverse(set.points()), Reverse(set.len())));
    for set in sets {
        if !rack.has_melded() && set.points() < INITIAL_MELD_POINTS {
            continue;
        }
        push(&mut moves, Move::placement(board, board.with_added([set])));
    }

    if rack.has_melded() {
        for (tile, _) in rack.tiles().iter() {
            for (slot, set) in board.slots() {
                let extended = set.tiles().iter().copied().chain([*tile]);
                let Ok(extended) = TileSet::arrange(extended) else {
                    continue;
                };
                let sets: Vec<TileSet> = board
                    .slots()
                    .iter()
                    .map(|(id, old)| if id == slot { extended.clone() } else { old.clone() })
                    .collect();
                push(&mut moves, Move::placement(board, board.rebuild(sets)));
            }
        }
    }

    moves.push(Move::Draw);
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::greedy::best_placement;
    use crate::{apply_move, parse_tiles};

    fn set(s: &str) -> TileSet {
        s.parse().unwrap()
    }

    fn candidates(board: &BoardState, rack: &Rack, max_children: usize) -> Vec<Move> {
        candidate_moves(
            board,
            rack,
            &DecomposeOptions::default(),
            max_children,
            &Deadline::start(None),
        )
    }

    #[test]
    fn test_candidates_are_legal_and_end_with_draw() {
        let board = BoardState::from_sets([set("r 4 5 6"), set("9 b y k")]);
        let rack = Rack::melded(parse_tiles("r3 r7 r9 b1 b2 b3 j").unwrap());
        let moves = candidates(&board, &rack, 16);
        assert!(moves.len() > 2);
        assert!(moves.len() <= 16);
        assert_eq!(moves.last(), Some(&Move::Draw));
        for mv in &moves {
            assert!(apply_move(&board, &rack, mv).is_ok(), "{mv}");
        }
        // the first candidate is the greedy one
        assert_eq!(
            moves[0],
            best_placement(&board, &rack, &DecomposeOptions::default()).unwrap()
        );
    }

    #[test]
    fn test_candidates_before_initial_meld() {
        let rack = Rack::new(parse_tiles("r1 r2 r3 k10 k11 k12").unwrap());
        let moves = candidates(&BoardState::new(), &rack, 16);
        for mv in &moves {
            assert!(apply_move(&BoardState::new(), &rack, mv).is_ok(), "{mv}");
        }
        let weak = Move::placement(&BoardState::new(), BoardState::from_sets([set("r 1 2 3")]));
        assert!(!moves.contains(&weak.unwrap()));
    }

    #[test]
    fn test_candidates_respect_cap() {
        let rack = Rack::melded(parse_tiles("r1 r2 r3 r4 r5 b3 y3 k3 j").unwrap());
        let moves = candidates(&BoardState::new(), &rack, 4);
        assert_eq!(moves.len(), 4);
        assert_eq!(moves[3], Move::Draw);
    }

    #[test]
    fn test_candidates_after_deadline() {
        let board = BoardState::from_sets([set("r 4 5 6")]);
        let rack = Rack::melded(parse_tiles("r7 b1 b2 b3").unwrap());
        let expired = Deadline::start(Some(0));
        let moves = candidate_moves(&board, &rack, &DecomposeOptions::default(), 16, &expired);
        assert_eq!(moves.last(), Some(&Move::Draw));
        for mv in &moves {
            assert!(apply_move(&board, &rack, mv).is_ok(), "{mv}");
        }
        // lay-offs and rack-only sets do not need the search
        assert!(moves.len() >= 3);
    }
}
