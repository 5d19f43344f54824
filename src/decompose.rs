use crate::clock::Deadline;
use crate::tile_set::{MAX_GROUP_LEN, MIN_SET_LEN};
use crate::{BoardState, COLOR_COUNT, MAX_NUMBER, TILE_KINDS, Tile, TileCounts, TileSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

const JOKER: usize = TILE_KINDS - 1;
const DEADLINE_CHECK_INTERVAL: usize = 256;

type Counts = [u8; TILE_KINDS];
type Signature = [u8; 2 * TILE_KINDS];

/// Limits for a single decomposition search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecomposeOptions {
    /// Maximum number of search states expanded before giving up
    pub node_limit: usize,
}

impl Default for DecomposeOptions {
    fn default() -> Self {
        Self {
            node_limit: 200_000,
        }
    }
}

/// What a shedding search maximizes over the optional tiles it places
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Most tiles first, then most points
    TilesThenPoints,
    /// Most points first, then most tiles
    PointsThenTiles,
}

impl Objective {
    fn key(self, partial: &Partial) -> (u32, u32) {
        match self {
            Self::TilesThenPoints => (partial.tiles, partial.points),
            Self::PointsThenTiles => (partial.points, partial.tiles),
        }
    }
}

/// Result of a shedding search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shed {
    /// Partition of the required tiles plus the placed optional tiles
    pub sets: Vec<TileSet>,
    /// Optional tiles that ended up in `sets`
    pub placed: TileCounts,
    /// Points of the placed optional tiles, jokers at the value they assume
    pub points: u32,
    /// False if the node limit cut the search short
    pub complete: bool,
}

/// Partition all `tiles` into valid sets.
///
/// Returns `None` when no partition exists (a normal, frequent outcome).
/// Among several partitions the one with the fewest sets wins, then the
/// lexicographically smallest list of sets.
pub fn decompose(tiles: &TileCounts) -> Option<Vec<TileSet>> {
    decompose_with(tiles, &DecomposeOptions::default())
}

/// [`decompose`] with explicit search limits
pub fn decompose_with(tiles: &TileCounts, options: &DecomposeOptions) -> Option<Vec<TileSet>> {
    shed(
        tiles,
        &TileCounts::new(),
        Objective::TilesThenPoints,
        options,
    )
    .map(|result| result.sets)
}

/// Produce a board holding every tile of `board` plus every tile of `offered`.
///
/// If the offered tiles form sets on their own, the existing sets stay where
/// they are and the new sets are appended. Otherwise the whole table is
/// re-partitioned; sets that come out unchanged keep their slot.
pub fn decompose_extend(board: &BoardState, offered: &TileCounts) -> Option<BoardState> {
    decompose_extend_with(board, offered, &DecomposeOptions::default())
}

/// [`decompose_extend`] with explicit search limits
pub fn decompose_extend_with(
    board: &BoardState,
    offered: &TileCounts,
    options: &DecomposeOptions,
) -> Option<BoardState> {
    if offered.is_empty() {
        return Some(board.clone());
    }
    if let Some(sets) = decompose_with(offered, options) {
        return Some(board.with_added(sets));
    }
    let all = board.tiles().union(offered);
    decompose_with(&all, options).map(|sets| board.rebuild(sets))
}

/// Place every `required` tile and the best sub-multiset of `optional` tiles.
///
/// This is the engine behind the AI players: with the board as `required`
/// and the rack as `optional` it finds the placement that sheds the most
/// from the rack. Returns `None` if the required tiles cannot be placed at all.
pub fn shed(
    required: &TileCounts,
    optional: &TileCounts,
    objective: Objective,
    options: &DecomposeOptions,
) -> Option<Shed> {
    shed_until(required, optional, objective, options, &Deadline::start(None))
}

/// [`shed`] that also stops expanding states once `deadline` expires. The
/// result is then the best placement found so far, marked incomplete.
pub fn shed_until(
    required: &TileCounts,
    optional: &TileCounts,
    objective: Objective,
    options: &DecomposeOptions,
    deadline: &Deadline,
) -> Option<Shed> {
    let mut pool = Pool {
        required: required.to_kind_counts(),
        optional: optional.to_kind_counts(),
    };
    let mut search = Search {
        objective,
        node_limit: options.node_limit,
        deadline,
        nodes: 0,
        exhausted: false,
        memo: HashMap::new(),
    };
    let best = search.solve(&mut pool);
    if search.exhausted {
        log::debug!(
            "decomposition stopped after {} nodes ({} required, {} optional tiles)",
            search.nodes,
            required.len(),
            optional.len()
        );
    }
    best.map(|partial| Shed {
        sets: partial.sets.clone(),
        placed: partial.placed.iter().copied().collect(),
        points: partial.points,
        complete: !search.exhausted,
    })
}

/// Every distinct valid set that can be formed from `tiles`, in set order.
pub fn candidate_sets(tiles: &TileCounts) -> Vec<TileSet> {
    let counts = tiles.to_kind_counts();
    let mut sets = BTreeSet::new();
    for kind in (0..JOKER).filter(|&k| counts[k] > 0) {
        for layout in layouts_with_pivot(kind, &counts) {
            if let Ok(set) = TileSet::new(layout) {
                sets.insert(set);
            }
        }
    }
    sets.into_iter().collect()
}

// ============================================================================
// Search
// ============================================================================

/// Remaining tiles, split into those that must be placed and those that may be
#[derive(Debug, Clone)]
struct Pool {
    required: Counts,
    optional: Counts,
}

impl Pool {
    fn available(&self, kind: usize) -> u8 {
        self.required[kind].saturating_add(self.optional[kind])
    }

    fn required_plus_optional(&self) -> Counts {
        let mut counts = [0u8; TILE_KINDS];
        for (kind, count) in counts.iter_mut().enumerate() {
            *count = self.available(kind);
        }
        counts
    }

    fn signature(&self) -> Signature {
        let mut signature = [0u8; 2 * TILE_KINDS];
        signature[..TILE_KINDS].copy_from_slice(&self.required);
        signature[TILE_KINDS..].copy_from_slice(&self.optional);
        signature
    }

    /// Take one tile of `kind`, required copies first. Returns whether the
    /// tile came out of the optional pile.
    fn take(&mut self, kind: usize) -> bool {
        if self.required[kind] > 0 {
            self.required[kind] -= 1;
            false
        } else {
            self.optional[kind] -= 1;
            true
        }
    }

    fn put_back(&mut self, kind: usize, optional: bool) {
        if optional {
            self.optional[kind] += 1;
        } else {
            self.required[kind] += 1;
        }
    }

    fn required_len(&self) -> u32 {
        self.required.iter().map(|&c| u32::from(c)).sum()
    }

    fn total_len(&self) -> u32 {
        self.required_len() + self.optional.iter().map(|&c| u32::from(c)).sum::<u32>()
    }
}

/// Best placement found for some remaining pool
#[derive(Debug, Clone, Default)]
struct Partial {
    tiles: u32,
    points: u32,
    sets: Vec<TileSet>,
    placed: Vec<Tile>,
}

struct Search<'a> {
    objective: Objective,
    node_limit: usize,
    deadline: &'a Deadline,
    nodes: usize,
    exhausted: bool,
    memo: HashMap<Signature, Option<Rc<Partial>>>,
}

impl Search<'_> {
    fn solve(&mut self, pool: &mut Pool) -> Option<Rc<Partial>> {
        let signature = pool.signature();
        if let Some(known) = self.memo.get(&signature) {
            return known.clone();
        }
        if self.exhausted || self.nodes >= self.node_limit || self.past_deadline() {
            self.exhausted = true;
            return None;
        }
        self.nodes += 1;

        let result = self.expand(pool);
        self.memo.insert(signature, result.clone());
        result
    }

    fn expand(&mut self, pool: &mut Pool) -> Option<Rc<Partial>> {
        let Some(pivot) = (0..JOKER).find(|&k| pool.available(k) > 0) else {
            // Only jokers left: optional ones stay on the rack, required ones are stuck.
            return (pool.required[JOKER] == 0).then(|| Rc::new(Partial::default()));
        };

        let required = pool.required_len();
        if required > 0 && pool.total_len() < MIN_SET_LEN as u32 {
            return None;
        }

        let mut best: Option<Rc<Partial>> = None;

        if pool.required[pivot] == 0 {
            // The pivot is optional, so leaving one copy on the rack is an option.
            pool.optional[pivot] -= 1;
            let skipped = self.solve(pool);
            pool.optional[pivot] += 1;
            if let Some(skipped) = skipped {
                self.consider(&mut best, skipped);
            }
        }

        let mut layouts = layouts_with_pivot(pivot, &pool.required_plus_optional());
        layouts.sort_by_key(|layout| std::cmp::Reverse(layout.len()));

        for layout in layouts {
            let Ok(set) = TileSet::new(layout) else {
                continue;
            };
            let sources: Vec<bool> = set
                .tiles()
                .iter()
                .map(|tile| pool.take(tile.kind_index()))
                .collect();

            let rest = self.solve(pool);

            for (tile, &optional) in set.tiles().iter().zip(&sources).rev() {
                pool.put_back(tile.kind_index(), optional);
            }

            if let Some(rest) = rest {
                let combined = combine(set, &sources, &rest);
                self.consider(&mut best, Rc::new(combined));
            }
        }

        best
    }

    // The clock is read every DEADLINE_CHECK_INTERVAL nodes
    fn past_deadline(&self) -> bool {
        self.nodes % DEADLINE_CHECK_INTERVAL == 0 && self.deadline.is_expired()
    }

    fn consider(&self, best: &mut Option<Rc<Partial>>, candidate: Rc<Partial>) {
        let replace = match best {
            None => true,
            Some(current) => self.compare(&candidate, current) == Ordering::Less,
        };
        if replace {
            *best = Some(candidate);
        }
    }

    /// `Less` means `a` is the better placement.
    fn compare(&self, a: &Partial, b: &Partial) -> Ordering {
        self.objective
            .key(b)
            .cmp(&self.objective.key(a))
            .then(a.sets.len().cmp(&b.sets.len()))
            .then_with(|| a.sets.cmp(&b.sets))
    }
}

/// Prepend `set` to a solved remainder, crediting the optional tiles it used
fn combine(set: TileSet, sources: &[bool], rest: &Partial) -> Partial {
    let assumed = set.assumed_tiles();
    let mut tiles = rest.tiles;
    let mut points = rest.points;
    let mut placed = Vec::with_capacity(rest.placed.len() + set.len());
    for ((tile, stands_for), &optional) in set.tiles().iter().zip(&assumed).zip(sources) {
        if optional {
            tiles += 1;
            points += u32::from(stands_for.number().unwrap_or(0));
            placed.push(*tile);
        }
    }
    placed.extend_from_slice(&rest.placed);

    let mut sets = Vec::with_capacity(rest.sets.len() + 1);
    sets.push(set);
    sets.extend(rest.sets.iter().cloned());

    Partial {
        tiles,
        points,
        sets,
        placed,
    }
}

// ============================================================================
// Candidate layouts
// ============================================================================

/// Every run and group layout that contains the `pivot` tile and whose other
/// tiles are available in `counts`, given that no concrete tile lower than the
/// pivot is left (so anything below the pivot in a run must be a joker).
fn layouts_with_pivot(pivot: usize, counts: &Counts) -> Vec<Vec<Tile>> {
    let tile = Tile::from_kind_index(pivot);
    let (Some(color), Some(number)) = (tile.color(), tile.number()) else {
        return Vec::new();
    };
    let jokers = counts[JOKER] as usize;
    let mut layouts = Vec::new();
    group_layouts(color, number, jokers, counts, &mut layouts);
    run_layouts(color, number, jokers, counts, &mut layouts);
    layouts
}

/// Groups containing the pivot, other colors chosen from what is available
fn group_layouts(color: u8, number: u8, jokers: usize, counts: &Counts, out: &mut Vec<Vec<Tile>>) {
    let others: Vec<u8> = (0..COLOR_COUNT)
        .filter(|&c| c != color && counts[Tile::new(c, number).kind_index()] > 0)
        .collect();

    for mask in 0u32..(1 << others.len()) {
        let mut colors: Vec<u8> = others
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, &c)| c)
            .collect();
        colors.push(color);
        colors.sort_unstable();

        for wild in 0..=jokers.min(1) {
            let len = colors.len() + wild;
            if !(MIN_SET_LEN..=MAX_GROUP_LEN).contains(&len) {
                continue;
            }
            let mut layout: Vec<Tile> = colors.iter().map(|&c| Tile::new(c, number)).collect();
            layout.extend(std::iter::repeat_n(Tile::joker(), wild));
            out.push(layout);
        }
    }
}

/// Runs containing the pivot: jokers below it, then each position above filled
/// by the concrete tile (when available) or by a joker
fn run_layouts(color: u8, number: u8, jokers: usize, counts: &Counts, out: &mut Vec<Vec<Tile>>) {
    let max_below = jokers.min(usize::from(number - 1));
    for below in 0..=max_below {
        let mut layout = vec![Tile::joker(); below];
        layout.push(Tile::new(color, number));
        extend_run(color, number + 1, jokers - below, counts, &mut layout, out);
    }
}

fn extend_run(
    color: u8,
    next: u8,
    jokers_left: usize,
    counts: &Counts,
    layout: &mut Vec<Tile>,
    out: &mut Vec<Vec<Tile>>,
) {
    if layout.len() >= MIN_SET_LEN {
        out.push(layout.clone());
    }
    if next > MAX_NUMBER {
        return;
    }

    let tile = Tile::new(color, next);
    if counts[tile.kind_index()] > 0 {
        layout.push(tile);
        extend_run(color, next + 1, jokers_left, counts, layout, out);
        layout.pop();
    }
    if jokers_left > 0 {
        layout.push(Tile::joker());
        extend_run(color, next + 1, jokers_left - 1, counts, layout, out);
        layout.pop();
    }
}
