use crate::{TileCounts, TileSet};
use std::fmt;

/// Stable identifier of a set's position on the table.
///
/// Slot ids survive rearrangements: a set that is unchanged by a move keeps
/// its id, so two boards can be diffed set by set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The table state: every set currently on the table
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BoardState {
    slots: Vec<(SlotId, TileSet)>,
    next_slot: u32,
}

/// Set-level difference between two boards
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardDiff {
    /// Slots present before and gone (or changed) after
    pub removed: Vec<(SlotId, TileSet)>,
    /// Slots that are new after
    pub added: Vec<(SlotId, TileSet)>,
}

impl BoardDiff {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

impl BoardState {
    /// Create a new empty board
    pub fn new() -> Self {
        BoardState::default()
    }

    /// Create a board holding `sets`, assigning fresh slot ids in order
    pub fn from_sets<I>(sets: I) -> Self
    where
        I: IntoIterator<Item = TileSet>,
    {
        let mut board = BoardState::new();
        for set in sets {
            board.push(set);
        }
        board
    }

    /// Add a set in a fresh slot
    pub fn push(&mut self, set: TileSet) -> SlotId {
        let id = SlotId(self.next_slot);
        self.next_slot += 1;
        self.slots.push((id, set));
        id
    }

    /// A copy of this board with `sets` appended in fresh slots
    pub fn with_added<I>(&self, sets: I) -> Self
    where
        I: IntoIterator<Item = TileSet>,
    {
        let mut board = self.clone();
        for set in sets {
            board.push(set);
        }
        board
    }

    /// Build the board that results from replacing every set with `sets`.
    ///
    /// Sets identical to one already on the table keep that slot id; the rest
    /// get fresh ids. Slot numbering continues from this board so ids are never
    /// reused within a game.
    pub fn rebuild(&self, sets: Vec<TileSet>) -> Self {
        let mut unclaimed: Vec<Option<&(SlotId, TileSet)>> = self.slots.iter().map(Some).collect();
        let mut next_slot = self.next_slot;
        let mut slots = Vec::with_capacity(sets.len());
        for set in sets {
            let reused = unclaimed
                .iter_mut()
                .find(|entry| entry.is_some_and(|(_, old)| *old == set))
                .and_then(Option::take)
                .map(|(id, _)| *id);
            let id = reused.unwrap_or_else(|| {
                let id = SlotId(next_slot);
                next_slot += 1;
                id
            });
            slots.push((id, set));
        }
        slots.sort_by_key(|(id, _)| *id);
        BoardState { slots, next_slot }
    }

    /// All sets on the board with their slot ids
    pub fn slots(&self) -> &[(SlotId, TileSet)] {
        &self.slots
    }

    /// Iterate over the sets
    pub fn sets(&self) -> impl Iterator<Item = &TileSet> {
        self.slots.iter().map(|(_, set)| set)
    }

    /// Look up the set in a slot
    pub fn get(&self, id: SlotId) -> Option<&TileSet> {
        self.slots
            .iter()
            .find(|(slot, _)| *slot == id)
            .map(|(_, set)| set)
    }

    /// Multiset of all tiles on the board
    pub fn tiles(&self) -> TileCounts {
        self.sets().flat_map(|set| set.tiles().iter().copied()).collect()
    }

    /// Number of sets on the board
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the board is empty
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Compare with a later board, slot by slot
    pub fn diff(&self, after: &BoardState) -> BoardDiff {
        let mut diff = BoardDiff::default();
        for (id, set) in &self.slots {
            if after.get(*id) != Some(set) {
                diff.removed.push((*id, set.clone()));
            }
        }
        for (id, set) in &after.slots {
            if self.get(*id) != Some(set) {
                diff.added.push((*id, set.clone()));
            }
        }
        diff
    }
}

impl fmt::Display for BoardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.slots.is_empty() {
            return f.write_str("(empty table)");
        }
        for (i, (id, set)) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{id}: {set}")?;
        }
        Ok(())
    }
}

/// Penalty for a joker left on a rack when the game ends
pub const JOKER_PENALTY: u32 = 30;

/// A player's hand: a multiset of tiles plus the initial-meld flag
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Rack {
    tiles: TileCounts,
    has_melded: bool,
}

impl Rack {
    /// A rack that has not made its initial meld yet
    pub fn new(tiles: TileCounts) -> Self {
        Rack {
            tiles,
            has_melded: false,
        }
    }

    /// A rack that already made its initial meld
    pub fn melded(tiles: TileCounts) -> Self {
        Rack {
            tiles,
            has_melded: true,
        }
    }

    pub fn tiles(&self) -> &TileCounts {
        &self.tiles
    }

    pub fn has_melded(&self) -> bool {
        self.has_melded
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Points still held at the end of a game; a joker counts [`JOKER_PENALTY`]
    pub fn penalty_points(&self) -> u32 {
        self.tiles
            .iter()
            .map(|(tile, &count)| u32::from(count) * tile.number().map_or(JOKER_PENALTY, u32::from))
            .sum()
    }

    /// Receive a drawn tile
    pub fn receive(&mut self, tile: crate::Tile) {
        self.tiles.add(tile);
    }

    // Only `apply_move` changes a rack's tiles or flag after a placement.
    pub(crate) fn after_placement(&self, remaining: TileCounts) -> Rack {
        Rack {
            tiles: remaining,
            has_melded: true,
        }
    }
}
