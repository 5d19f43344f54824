use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod board;
pub mod clock;
pub mod decompose;
pub mod game;
pub mod moves;
pub mod strategy;
pub mod tile_set;
pub mod wasm_api;

pub use board::{BoardState, Rack, SlotId};
pub use decompose::{decompose, decompose_extend};
pub use moves::{Move, MoveRejected, apply_move};
pub use strategy::{Budget, StrategyKind, choose_move};
pub use tile_set::{SetKind, TileSet};

/// Lowest tile number.
pub const MIN_NUMBER: u8 = 1;
/// Highest tile number.
pub const MAX_NUMBER: u8 = 13;
/// Number of tile colors.
pub const COLOR_COUNT: u8 = 4;
/// Copies of every colored tile in a full game.
pub const COPIES_PER_TILE: u8 = 2;
/// Jokers in a full game.
pub const JOKER_COUNT: u8 = 2;

/// Number of distinct tile kinds (52 colored + joker).
pub const TILE_KINDS: usize = (COLOR_COUNT as usize) * (MAX_NUMBER as usize) + 1;

const COLOR_LETTERS: [char; 4] = ['r', 'b', 'y', 'k'];

/// A tile in Rummikub represented as a u8.
/// - Bits 0-1: Color (00 = Red, 01 = Blue, 10 = Yellow, 11 = Black)
/// - Bits 2-5: Number (1-13)
/// - All 1s (0xFF): Joker
///
/// The derived ordering sorts by number, then color, with the joker last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tile(u8);

impl Tile {
    const COLOR_MASK: u8 = 0b0000_0011;
    const NUMBER_MASK: u8 = 0b0011_1100;
    const NUMBER_SHIFT: u8 = 2;
    const JOKER: u8 = 0xFF;

    /// Create a new tile from color (0-3) and number (1-13)
    pub fn new(color: u8, number: u8) -> Self {
        assert!(color < COLOR_COUNT, "Color must be 0-3");
        assert!(
            (MIN_NUMBER..=MAX_NUMBER).contains(&number),
            "Number must be 1-13"
        );
        Tile((number << Self::NUMBER_SHIFT) | color)
    }

    /// Create a joker tile
    pub const fn joker() -> Self {
        Tile(Self::JOKER)
    }

    /// Get the color (0-3), or None for a joker
    pub fn color(&self) -> Option<u8> {
        if self.is_joker() {
            None
        } else {
            Some(self.0 & Self::COLOR_MASK)
        }
    }

    /// Get the number (1-13), or None for a joker
    pub fn number(&self) -> Option<u8> {
        if self.is_joker() {
            None
        } else {
            Some((self.0 & Self::NUMBER_MASK) >> Self::NUMBER_SHIFT)
        }
    }

    /// Check if this is a joker
    pub fn is_joker(&self) -> bool {
        self.0 == Self::JOKER
    }

    /// Dense index in `0..TILE_KINDS`; the joker takes the last slot.
    pub fn kind_index(&self) -> usize {
        match (self.color(), self.number()) {
            (Some(color), Some(number)) => {
                (number as usize - 1) * COLOR_COUNT as usize + color as usize
            }
            _ => TILE_KINDS - 1,
        }
    }

    /// Inverse of [`Tile::kind_index`].
    pub fn from_kind_index(index: usize) -> Self {
        if index >= TILE_KINDS - 1 {
            return Tile::joker();
        }
        let color = (index % COLOR_COUNT as usize) as u8;
        let number = (index / COLOR_COUNT as usize) as u8 + 1;
        Tile::new(color, number)
    }
}

/// Error returned when a tile or set string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseTileError {
    #[error("empty input")]
    Empty,
    #[error("invalid color: {0}")]
    Color(String),
    #[error("invalid number: {0}")]
    Number(String),
    #[error("number must be 1-13, got {0}")]
    OutOfRange(u8),
}

pub(crate) fn parse_color(s: &str) -> Result<u8, ParseTileError> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => COLOR_LETTERS
            .iter()
            .position(|&l| l == c)
            .map(|p| p as u8)
            .ok_or_else(|| ParseTileError::Color(s.to_string())),
        _ => Err(ParseTileError::Color(s.to_string())),
    }
}

pub(crate) fn parse_number(s: &str) -> Result<u8, ParseTileError> {
    let number: u8 = s
        .parse()
        .map_err(|_| ParseTileError::Number(s.to_string()))?;
    if !(MIN_NUMBER..=MAX_NUMBER).contains(&number) {
        return Err(ParseTileError::OutOfRange(number));
    }
    Ok(number)
}

pub(crate) fn is_joker_token(s: &str) -> bool {
    matches!(s, "j" | "w")
}

/// Format: "r13" (red 13), "b1" (blue 1), "y7" (yellow 7), "k9" (black 9), "j" (joker).
/// "w" is accepted as an alias for the joker.
impl FromStr for Tile {
    type Err = ParseTileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseTileError::Empty);
        }
        if is_joker_token(s) {
            return Ok(Tile::joker());
        }
        let split = s.chars().next().map_or(1, char::len_utf8);
        if s.len() <= split {
            return Err(ParseTileError::Number(s.to_string()));
        }
        let color = parse_color(&s[..split])?;
        let number = parse_number(&s[split..])?;
        Ok(Tile::new(color, number))
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.color(), self.number()) {
            (Some(color), Some(number)) => {
                write!(f, "{}{}", COLOR_LETTERS[color as usize], number)
            }
            _ => f.write_str("j"),
        }
    }
}

/// A multiset of tiles (a rack, the board's contents, a draw pile...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TileCounts(BTreeMap<Tile, u8>);

impl TileCounts {
    /// Create a new empty multiset
    pub fn new() -> Self {
        TileCounts(BTreeMap::new())
    }

    /// Every tile of a standard game: two of each colored tile plus two jokers.
    pub fn full_set() -> Self {
        let mut counts = TileCounts::new();
        for number in MIN_NUMBER..=MAX_NUMBER {
            for color in 0..COLOR_COUNT {
                counts.add_n(Tile::new(color, number), COPIES_PER_TILE);
            }
        }
        counts.add_n(Tile::joker(), JOKER_COUNT);
        counts
    }

    /// Add a tile
    pub fn add(&mut self, tile: Tile) {
        self.add_n(tile, 1);
    }

    /// Add `n` copies of a tile; a count stops at `u8::MAX`
    pub fn add_n(&mut self, tile: Tile, n: u8) {
        if n > 0 {
            let count = self.0.entry(tile).or_insert(0);
            *count = count.saturating_add(n);
        }
    }

    /// Remove a tile, returning false if it was not present
    pub fn remove(&mut self, tile: &Tile) -> bool {
        if let Some(count) = self.0.get_mut(tile) {
            *count -= 1;
            if *count == 0 {
                self.0.remove(tile);
            }
            return true;
        }
        false
    }

    /// Get the count of a specific tile
    pub fn count(&self, tile: &Tile) -> u8 {
        self.0.get(tile).copied().unwrap_or(0)
    }

    /// Total number of tiles
    pub fn len(&self) -> usize {
        self.0.values().map(|&c| c as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over distinct tiles and their counts
    pub fn iter(&self) -> impl Iterator<Item = (&Tile, &u8)> {
        self.0.iter()
    }

    /// All tiles, one entry per copy, in tile order
    pub fn to_vec(&self) -> Vec<Tile> {
        self.0
            .iter()
            .flat_map(|(&tile, &count)| std::iter::repeat_n(tile, count as usize))
            .collect()
    }

    /// Face value of the tiles; jokers count as zero here because their
    /// value only exists inside a set.
    pub fn face_points(&self) -> u32 {
        self.0
            .iter()
            .map(|(tile, &count)| u32::from(tile.number().unwrap_or(0)) * u32::from(count))
            .sum()
    }

    /// True if every tile of `other` is present here at least as often.
    pub fn contains_all(&self, other: &TileCounts) -> bool {
        other.iter().all(|(tile, &count)| self.count(tile) >= count)
    }

    /// `self - other`, or None if `other` is not contained in `self`.
    pub fn checked_sub(&self, other: &TileCounts) -> Option<TileCounts> {
        if !self.contains_all(other) {
            return None;
        }
        let mut result = self.clone();
        for (tile, &count) in other.iter() {
            for _ in 0..count {
                result.remove(tile);
            }
        }
        Some(result)
    }

    /// `self - other`, dropping tiles of `other` that are not present here.
    pub fn saturating_sub(&self, other: &TileCounts) -> TileCounts {
        let mut result = self.clone();
        for (tile, &count) in other.iter() {
            for _ in 0..count {
                result.remove(tile);
            }
        }
        result
    }

    /// Multiset sum
    pub fn union(&self, other: &TileCounts) -> TileCounts {
        let mut result = self.clone();
        for (&tile, &count) in other.iter() {
            result.add_n(tile, count);
        }
        result
    }

    /// Per-kind counts indexed by [`Tile::kind_index`].
    pub fn to_kind_counts(&self) -> [u8; TILE_KINDS] {
        let mut counts = [0u8; TILE_KINDS];
        for (tile, &count) in self.iter() {
            counts[tile.kind_index()] = count;
        }
        counts
    }
}

impl FromIterator<Tile> for TileCounts {
    fn from_iter<I: IntoIterator<Item = Tile>>(iter: I) -> Self {
        let mut counts = TileCounts::new();
        counts.extend(iter);
        counts
    }
}

impl Extend<Tile> for TileCounts {
    fn extend<I: IntoIterator<Item = Tile>>(&mut self, iter: I) {
        for tile in iter {
            self.add(tile);
        }
    }
}

impl fmt::Display for TileCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, tile) in self.to_vec().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{tile}")?;
        }
        f.write_str("]")
    }
}

/// Parse a whitespace separated list of tiles, e.g. `"r1 r2 j k13"`.
pub fn parse_tiles(input: &str) -> Result<TileCounts, ParseTileError> {
    input.split_whitespace().map(str::parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_from_str() {
        assert_eq!("r13".parse::<Tile>().unwrap(), Tile::new(0, 13));
        assert_eq!("b1".parse::<Tile>().unwrap(), Tile::new(1, 1));
        assert_eq!("y7".parse::<Tile>().unwrap(), Tile::new(2, 7));
        assert_eq!("k9".parse::<Tile>().unwrap(), Tile::new(3, 9));
        assert_eq!("j".parse::<Tile>().unwrap(), Tile::joker());
        assert_eq!("w".parse::<Tile>().unwrap(), Tile::joker());

        assert!("x5".parse::<Tile>().is_err());
        assert_eq!("r14".parse::<Tile>(), Err(ParseTileError::OutOfRange(14)));
        assert!("r0".parse::<Tile>().is_err());
        assert_eq!("".parse::<Tile>(), Err(ParseTileError::Empty));
        assert!("r".parse::<Tile>().is_err());
    }

    #[test]
    fn test_tile_display() {
        assert_eq!(Tile::new(0, 13).to_string(), "r13");
        assert_eq!(Tile::new(1, 1).to_string(), "b1");
        assert_eq!(Tile::new(3, 9).to_string(), "k9");
        assert_eq!(Tile::joker().to_string(), "j");
    }

    #[test]
    fn test_tile_ordering_puts_joker_last() {
        let mut tiles = vec![Tile::joker(), Tile::new(3, 2), Tile::new(0, 2), Tile::new(2, 1)];
        tiles.sort();
        assert_eq!(
            tiles,
            vec![Tile::new(2, 1), Tile::new(0, 2), Tile::new(3, 2), Tile::joker()]
        );
    }

    #[test]
    fn test_kind_index_covers_all_tiles() {
        for index in 0..TILE_KINDS {
            assert_eq!(Tile::from_kind_index(index).kind_index(), index);
        }
        assert_eq!(Tile::joker().kind_index(), TILE_KINDS - 1);
    }

    #[test]
    fn test_full_set() {
        let full = TileCounts::full_set();
        assert_eq!(full.len(), 106);
        assert_eq!(full.count(&Tile::joker()), 2);
        assert_eq!(full.count(&Tile::new(2, 7)), 2);
    }

    #[test]
    fn test_multiset_arithmetic() {
        let a = parse_tiles("r1 r1 r2 j").unwrap();
        let b = parse_tiles("r1 j").unwrap();
        assert!(a.contains_all(&b));
        assert!(!b.contains_all(&a));

        let diff = a.checked_sub(&b).unwrap();
        assert_eq!(diff, parse_tiles("r1 r2").unwrap());
        assert!(b.checked_sub(&a).is_none());
        assert_eq!(diff.union(&b), a);
        assert_eq!(a.len(), 4);
        assert_eq!(a.face_points(), 4);
    }

    #[test]
    fn test_counts_saturate() {
        let r1: Tile = "r1".parse().unwrap();
        let mut counts: TileCounts = std::iter::repeat_n(r1, 300).collect();
        assert_eq!(counts.count(&r1), u8::MAX);
        counts.add_n(r1, 10);
        assert_eq!(counts.count(&r1), u8::MAX);
        assert_eq!(counts.union(&counts.clone()).count(&r1), u8::MAX);
    }

    #[test]
    fn test_remove_missing_tile() {
        let mut counts = parse_tiles("b5").unwrap();
        assert!(counts.remove(&Tile::new(1, 5)));
        assert!(!counts.remove(&Tile::new(1, 5)));
        assert!(counts.is_empty());
    }
}
