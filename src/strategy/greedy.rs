use super::{Budget, Strategy, StrategyKind};
use crate::clock::Deadline;
use crate::decompose::{DecomposeOptions, Objective, shed_until};
use crate::moves::INITIAL_MELD_POINTS;
use crate::{BoardState, Move, Rack, TileCounts};

/// Plays the placement that sheds the most tiles, then the most points
#[derive(Debug, Clone, Default)]
pub struct GreedyStrategy {
    decompose: DecomposeOptions,
}

impl GreedyStrategy {
    pub fn new(decompose: DecomposeOptions) -> Self {
        Self { decompose }
    }
}

impl Strategy for GreedyStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Greedy
    }

    fn choose_move(&self, board: &BoardState, rack: &Rack, budget: &Budget) -> Move {
        let deadline = Deadline::start(budget.time_limit_ms);
        best_placement_until(board, rack, &self.decompose, &deadline).unwrap_or(Move::Draw)
    }
}

/// The placement that empties the rack the most, if any.
///
/// Before the initial meld only rack tiles may be used and the meld must
/// reach the points threshold. Afterwards the whole table may be rearranged.
pub fn best_placement(board: &BoardState, rack: &Rack, options: &DecomposeOptions) -> Option<Move> {
    best_placement_until(board, rack, options, &Deadline::start(None))
}

/// [`best_placement`] that gives up searching once `deadline` expires
pub(crate) fn best_placement_until(
    board: &BoardState,
    rack: &Rack,
    options: &DecomposeOptions,
    deadline: &Deadline,
) -> Option<Move> {
    if rack.is_empty() {
        return None;
    }
    let from_rack = |objective: Objective| {
        shed_until(&TileCounts::new(), rack.tiles(), objective, options, deadline)
    };

    if !rack.has_melded() {
        // Most tiles if that reaches the threshold, otherwise the most points
        let meld = from_rack(Objective::TilesThenPoints)
            .filter(|meld| meld.points >= INITIAL_MELD_POINTS)
            .or_else(|| from_rack(Objective::PointsThenTiles))?;
        if meld.points < INITIAL_MELD_POINTS {
            return None;
        }
        return Move::placement(board, board.with_added(meld.sets));
    }

    let rearranged = shed_until(
        &board.tiles(),
        rack.tiles(),
        Objective::TilesThenPoints,
        options,
        deadline,
    )
    .filter(|result| !result.placed.is_empty())
    .and_then(|result| Move::placement(board, board.rebuild(result.sets)));
    if rearranged.is_some() {
        return rearranged;
    }

    // A large table can exhaust the node limit; fall back to new sets from the rack alone.
    let appended = from_rack(Objective::TilesThenPoints)?;
    Move::placement(board, board.with_added(appended.sets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TileSet, apply_move, parse_tiles};

    fn set(s: &str) -> TileSet {
        s.parse().unwrap()
    }

    fn greedy(board: &BoardState, rack: &Rack) -> Move {
        GreedyStrategy::default().choose_move(board, rack, &Budget::default())
    }

    #[test]
    fn test_greedy_places_whole_rack() {
        let board = BoardState::new();
        let rack = Rack::melded(parse_tiles("b1 b2 b3 b4 b5 b6 r10 y10 j").unwrap());
        let mv = greedy(&board, &rack);
        assert_eq!(mv.tiles_placed(), 9);
        let (_, rest) = apply_move(&board, &rack, &mv).unwrap();
        assert!(rest.is_empty());
    }

    #[test]
    fn test_greedy_prefers_more_tiles() {
        // r5 goes either into the run r3..r7 or into the 5 group, not both
        let board = BoardState::new();
        let rack = Rack::melded(parse_tiles("r3 r4 r5 r6 r7 b5 y5").unwrap());
        let mv = greedy(&board, &rack);
        assert_eq!(mv.tiles_placed(), 5);
        let (after, rest) = apply_move(&board, &rack, &mv).unwrap();
        assert_eq!(rest.tiles(), &parse_tiles("b5 y5").unwrap());
        assert_eq!(after.sets().collect::<Vec<_>>(), vec![&set("r 3 4 5 6 7")]);
    }

    #[test]
    fn test_greedy_breaks_tile_ties_on_points() {
        // The joker completes r1 r2 (6 points) or the 13 group (39 points)
        let board = BoardState::new();
        let rack = Rack::melded(parse_tiles("r1 r2 k13 y13 j").unwrap());
        let mv = greedy(&board, &rack);
        let (_, rest) = apply_move(&board, &rack, &mv).unwrap();
        assert_eq!(rest.tiles(), &parse_tiles("r1 r2").unwrap());
    }

    #[test]
    fn test_greedy_rearranges_table() {
        // r4 has to leave the run to form the 4 group
        let board = BoardState::from_sets([set("r 4 5 6 7")]);
        let rack = Rack::melded(parse_tiles("b4 y4 r8").unwrap());
        let mv = greedy(&board, &rack);
        assert_eq!(mv.tiles_placed(), 3);
        let (after, rest) = apply_move(&board, &rack, &mv).unwrap();
        assert!(rest.is_empty());
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_greedy_initial_meld_threshold() {
        let board = BoardState::from_sets([set("r 1 2 3")]);
        // 4 + 5 + 6 = 15 even though r4 would extend the table run
        let rack = Rack::new(parse_tiles("r4 k4 k5 k6").unwrap());
        assert_eq!(greedy(&board, &rack), Move::Draw);

        let rack = Rack::new(parse_tiles("k9 k10 k11 r2").unwrap());
        let mv = greedy(&board, &rack);
        let (after, rest) = apply_move(&board, &rack, &mv).unwrap();
        assert_eq!(rest.tiles(), &parse_tiles("r2").unwrap());
        // the table's run is untouched before the initial meld
        assert!(board.diff(&after).removed.is_empty());
    }

    #[test]
    fn test_greedy_initial_meld_prefers_more_tiles() {
        // r10 r11 r12 + b1 b2 j b4 b5 is 8 tiles for 48 points; the 13 group
        // with the joker scores more per tile but sheds only 6 in total
        let board = BoardState::new();
        let rack = Rack::new(parse_tiles("r10 r11 r12 y13 k13 j b1 b2 b4 b5").unwrap());
        let mv = greedy(&board, &rack);
        assert_eq!(mv.tiles_placed(), 8);
        let (after, rest) = apply_move(&board, &rack, &mv).unwrap();
        assert_eq!(rest.tiles(), &parse_tiles("y13 k13").unwrap());
        assert!(rest.has_melded());
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_greedy_initial_meld_falls_back_to_points() {
        // The joker makes either b1 b2 j b4 b5 (5 tiles, 15 points) or
        // r13 y13 j (3 tiles, 39 points); only the group reaches the threshold
        let board = BoardState::new();
        let rack = Rack::new(parse_tiles("b1 b2 b4 b5 r13 y13 j").unwrap());
        let mv = greedy(&board, &rack);
        assert_eq!(mv.tiles_placed(), 3);
        let (_, rest) = apply_move(&board, &rack, &mv).unwrap();
        assert_eq!(rest.tiles(), &parse_tiles("b1 b2 b4 b5").unwrap());
    }

    #[test]
    fn test_greedy_draws_without_placement() {
        let board = BoardState::from_sets([set("r 1 2 3")]);
        let rack = Rack::melded(parse_tiles("b9 k12").unwrap());
        assert_eq!(greedy(&board, &rack), Move::Draw);
    }
}
