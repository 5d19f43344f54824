use crate::{
    COLOR_COUNT, MAX_NUMBER, MIN_NUMBER, ParseTileError, Tile, TileCounts, is_joker_token,
    parse_color, parse_number,
};
use std::fmt;
use std::str::FromStr;

/// Smallest legal set.
pub const MIN_SET_LEN: usize = 3;
/// Largest legal group.
pub const MAX_GROUP_LEN: usize = 4;

/// Kind of tile set in Rummikub
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SetKind {
    /// A group: same number, different colors
    Group,
    /// A run: consecutive numbers, same color
    Run,
}

/// Why a sequence of tiles is not a legal set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetError {
    #[error("a set needs at least 3 tiles, got {0}")]
    TooShort(usize),
    #[error("a set needs at least one non-joker tile")]
    NoConcreteTile,
    #[error("a group holds at most 4 tiles, got {0}")]
    GroupTooLong(usize),
    #[error("a group may not repeat a color")]
    RepeatedColor,
    #[error("a group may hold at most one joker")]
    TooManyJokers,
    #[error("a run must be a single color")]
    MixedColors,
    #[error("run tiles are not consecutive")]
    NotConsecutive,
    #[error("run does not fit within 1-13")]
    OutOfRange,
}

/// What a joker stands for inside its set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JokerStandIn {
    /// A specific tile (runs, groups of 4)
    Exactly(Tile),
    /// Either of two tiles (groups of 3)
    EitherOf(Tile, Tile),
}

/// A validated run or group.
///
/// The only constructors are [`TileSet::new`] and [`TileSet::arrange`], both of
/// which reject invalid input, so every `TileSet` value is a legal set.
/// Ordering compares the tile sequences, which is what the decomposition
/// engine uses for deterministic tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileSet {
    tiles: Vec<Tile>,
    kind: SetKind,
}

impl TileSet {
    /// Validate `tiles` in the order given.
    ///
    /// Runs must list their tiles by position (jokers in the slot they fill);
    /// groups may list colors in any order.
    pub fn new(tiles: Vec<Tile>) -> Result<Self, SetError> {
        let kind = classify(&tiles)?;
        Ok(TileSet { tiles, kind })
    }

    /// Build a set from tiles in any order, laying jokers out deterministically:
    /// interior gaps of a run first, then extending upward, then downward.
    pub fn arrange<I>(tiles: I) -> Result<Self, SetError>
    where
        I: IntoIterator<Item = Tile>,
    {
        let mut tiles: Vec<Tile> = tiles.into_iter().collect();
        if tiles.len() < MIN_SET_LEN {
            return Err(SetError::TooShort(tiles.len()));
        }
        tiles.sort();
        let jokers = tiles.iter().filter(|t| t.is_joker()).count();
        let concrete = &tiles[..tiles.len() - jokers];
        let Some(first) = concrete.first() else {
            return Err(SetError::NoConcreteTile);
        };

        if concrete.len() >= 2 && concrete.iter().all(|t| t.number() == first.number()) {
            // Groups keep the sorted order: by color, joker last.
            return TileSet::new(tiles);
        }

        let color = first.color();
        if concrete.iter().any(|t| t.color() != color) {
            return Err(SetError::MixedColors);
        }
        let numbers: Vec<u8> = concrete.iter().filter_map(Tile::number).collect();
        let (low, high) = (numbers[0], numbers[numbers.len() - 1]);
        if numbers.windows(2).any(|w| w[0] == w[1]) {
            return Err(SetError::NotConsecutive);
        }
        let gaps = usize::from(high - low) + 1 - numbers.len();
        if gaps > jokers {
            return Err(SetError::NotConsecutive);
        }
        let spare = jokers - gaps;
        let up = spare.min(usize::from(MAX_NUMBER - high));
        let down = spare - up;
        if down > usize::from(low - MIN_NUMBER) {
            return Err(SetError::OutOfRange);
        }

        let start = low - down as u8;
        let end = high + up as u8;
        let color = color.unwrap_or(0);
        let layout = (start..=end)
            .map(|n| {
                if numbers.binary_search(&n).is_ok() {
                    Tile::new(color, n)
                } else {
                    Tile::joker()
                }
            })
            .collect();
        TileSet::new(layout)
    }

    pub fn kind(&self) -> SetKind {
        self.kind
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tile_counts(&self) -> TileCounts {
        self.tiles.iter().copied().collect()
    }

    pub fn joker_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_joker()).count()
    }

    /// The concrete tile each position stands for. A group joker takes the
    /// first missing color; its number is what matters for scoring.
    pub fn assumed_tiles(&self) -> Vec<Tile> {
        match self.kind {
            SetKind::Run => {
                let (color, start) = self.run_origin();
                (0..self.tiles.len())
                    .map(|i| Tile::new(color, start + i as u8))
                    .collect()
            }
            SetKind::Group => {
                let mut missing = self.missing_group_colors().into_iter();
                let number = self.group_number();
                self.tiles
                    .iter()
                    .map(|&t| {
                        if t.is_joker() {
                            Tile::new(missing.next().unwrap_or(0), number)
                        } else {
                            t
                        }
                    })
                    .collect()
            }
        }
    }

    /// Sum of the values the tiles stand for; jokers count as the value they assume.
    pub fn points(&self) -> u32 {
        match self.kind {
            SetKind::Run => {
                let (_, start) = self.run_origin();
                (0..self.tiles.len() as u32)
                    .map(|i| u32::from(start) + i)
                    .sum()
            }
            SetKind::Group => u32::from(self.group_number()) * self.tiles.len() as u32,
        }
    }

    /// What each joker in the set represents, in position order.
    pub fn joker_assignments(&self) -> Vec<JokerStandIn> {
        match self.kind {
            SetKind::Run => self
                .assumed_tiles()
                .into_iter()
                .zip(&self.tiles)
                .filter(|(_, t)| t.is_joker())
                .map(|(assumed, _)| JokerStandIn::Exactly(assumed))
                .collect(),
            SetKind::Group => {
                let number = self.group_number();
                let missing = self.missing_group_colors();
                let stand_in = match missing.as_slice() {
                    [only] => JokerStandIn::Exactly(Tile::new(*only, number)),
                    [a, b, ..] => {
                        JokerStandIn::EitherOf(Tile::new(*a, number), Tile::new(*b, number))
                    }
                    [] => return Vec::new(),
                };
                vec![stand_in; self.joker_count()]
            }
        }
    }

    // Color and starting number of a run; only called on validated runs.
    fn run_origin(&self) -> (u8, u8) {
        self.tiles
            .iter()
            .enumerate()
            .find_map(|(i, t)| Some((t.color()?, t.number()? - i as u8)))
            .unwrap_or((0, MIN_NUMBER))
    }

    fn group_number(&self) -> u8 {
        self.tiles
            .iter()
            .find_map(Tile::number)
            .unwrap_or(MIN_NUMBER)
    }

    fn missing_group_colors(&self) -> Vec<u8> {
        (0..COLOR_COUNT)
            .filter(|c| !self.tiles.iter().any(|t| t.color() == Some(*c)))
            .collect()
    }
}

/// Classify an ordered tile sequence, or explain why it is not a set.
fn classify(tiles: &[Tile]) -> Result<SetKind, SetError> {
    if tiles.len() < MIN_SET_LEN {
        return Err(SetError::TooShort(tiles.len()));
    }
    let concrete: Vec<Tile> = tiles.iter().copied().filter(|t| !t.is_joker()).collect();
    let Some(first) = concrete.first() else {
        return Err(SetError::NoConcreteTile);
    };
    let jokers = tiles.len() - concrete.len();

    if concrete.len() >= 2 && concrete.iter().all(|t| t.number() == first.number()) {
        if tiles.len() > MAX_GROUP_LEN {
            return Err(SetError::GroupTooLong(tiles.len()));
        }
        if jokers > 1 {
            return Err(SetError::TooManyJokers);
        }
        let mut seen = [false; COLOR_COUNT as usize];
        for color in concrete.iter().filter_map(Tile::color) {
            if std::mem::replace(&mut seen[color as usize], true) {
                return Err(SetError::RepeatedColor);
            }
        }
        return Ok(SetKind::Group);
    }

    if concrete.iter().any(|t| t.color() != first.color()) {
        return Err(SetError::MixedColors);
    }
    // Every concrete tile must agree on where the run starts.
    let mut start: Option<i32> = None;
    for (i, tile) in tiles.iter().enumerate() {
        if let Some(number) = tile.number() {
            let s = i32::from(number) - i as i32;
            match start {
                None => start = Some(s),
                Some(prev) if prev != s => return Err(SetError::NotConsecutive),
                Some(_) => {}
            }
        }
    }
    let start = start.unwrap_or(i32::from(MIN_NUMBER));
    let end = start + tiles.len() as i32 - 1;
    if start < i32::from(MIN_NUMBER) || end > i32::from(MAX_NUMBER) {
        return Err(SetError::OutOfRange);
    }
    Ok(SetKind::Run)
}

impl fmt::Display for TileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tile) in self.tiles.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{tile}")?;
        }
        Ok(())
    }
}

/// Error returned when parsing a set from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseSetError {
    #[error("empty set string")]
    Empty,
    #[error(transparent)]
    Tile(#[from] ParseTileError),
    #[error(transparent)]
    Set(#[from] SetError),
}

/// Parse a set, auto-detecting its kind
/// Formats:
/// - Group: "5 r b k" (number followed by color letters, `j` for a joker)
/// - Run: "y 6 7 8" (color letter followed by numbers, `j` for a joker)
impl FromStr for TileSet {
    type Err = ParseSetError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = input.split_whitespace().collect();
        let Some((head, rest)) = tokens.split_first() else {
            return Err(ParseSetError::Empty);
        };

        let tiles = if let Ok(number) = parse_number(head) {
            rest.iter()
                .map(|token| {
                    if is_joker_token(token) {
                        Ok(Tile::joker())
                    } else {
                        Ok(Tile::new(parse_color(token)?, number))
                    }
                })
                .collect::<Result<Vec<_>, ParseTileError>>()?
        } else {
            let color = parse_color(head)?;
            rest.iter()
                .map(|token| {
                    if is_joker_token(token) {
                        Ok(Tile::joker())
                    } else {
                        Ok(Tile::new(color, parse_number(token)?))
                    }
                })
                .collect::<Result<Vec<_>, ParseTileError>>()?
        };

        Ok(TileSet::new(tiles)?)
    }
}
