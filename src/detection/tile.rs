/// Tile taxonomy
///
/// The closed set of categories a maze cell can be classified into.
/// `TileKind` is everything the classifier can answer; `BoardCell` adds the
/// `Ignore` marker that only the board assembler is allowed to place.
use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter, FromRepr, IntoStaticStr};

/// Classifier output: one of twelve concrete tiles or `Unknown`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    FromRepr,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TileKind {
    /// Nothing in the model is close enough
    #[strum(serialize = "Unknown")]
    Unknown = 0,
    /// Contains the majority of Pac-Man
    #[strum(serialize = "Pac-Man")]
    #[serde(rename = "pacman")]
    PacMan = 1,
    #[strum(serialize = "Wall")]
    Wall = 2,
    /// Empty corridor
    #[strum(serialize = "Blank")]
    Blank = 3,
    /// Cherry, strawberry, apple, ...
    #[strum(serialize = "Fruit")]
    Fruit = 4,
    #[strum(serialize = "Blinky")]
    Blinky = 5,
    #[strum(serialize = "Inky")]
    Inky = 6,
    #[strum(serialize = "Pinky")]
    Pinky = 7,
    #[strum(serialize = "Clyde")]
    Clyde = 8,
    /// Any ghost after a power pellet was eaten
    #[strum(serialize = "Frightened Ghost")]
    FrightenedGhost = 9,
    #[strum(serialize = "Pellet")]
    Pellet = 10,
    #[strum(serialize = "Power Pellet")]
    PowerPellet = 11,
    /// Text of any kind ("READY!", score digits)
    #[strum(serialize = "Text")]
    Text = 12,
}

/// Every classifiable kind in code order.
pub const ALL_TILE_KINDS: [TileKind; TileKind::COUNT] = [
    TileKind::Unknown,
    TileKind::PacMan,
    TileKind::Wall,
    TileKind::Blank,
    TileKind::Fruit,
    TileKind::Blinky,
    TileKind::Inky,
    TileKind::Pinky,
    TileKind::Clyde,
    TileKind::FrightenedGhost,
    TileKind::Pellet,
    TileKind::PowerPellet,
    TileKind::Text,
];

impl TileKind {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::from_repr(code)
    }

    /// Human-readable label, stable across releases
    pub fn label(self) -> &'static str {
        self.into()
    }

    /// Single character used when rendering boards as text
    pub fn glyph(self) -> char {
        match self {
            Self::Unknown => '?',
            Self::PacMan => 'C',
            Self::Wall => '#',
            Self::Blank => ' ',
            Self::Fruit => '%',
            Self::Blinky => 'B',
            Self::Inky => 'I',
            Self::Pinky => 'P',
            Self::Clyde => 'K',
            Self::FrightenedGhost => 'F',
            Self::Pellet => '.',
            Self::PowerPellet => 'o',
            Self::Text => 'T',
        }
    }

    pub fn is_ghost(self) -> bool {
        matches!(
            self,
            Self::Blinky | Self::Inky | Self::Pinky | Self::Clyde | Self::FrightenedGhost
        )
    }
}

/// The canonical ordered list of classifiable kinds (excludes `Ignore`).
pub fn all_types() -> &'static [TileKind] {
    &ALL_TILE_KINDS
}

/// State of one board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoardCell {
    Tile(TileKind),
    /// Deliberately excluded from classification (HUD, borders)
    Ignore,
}

impl BoardCell {
    pub const IGNORE_CODE: u8 = 13;

    pub fn code(self) -> u8 {
        match self {
            Self::Tile(kind) => kind.code(),
            Self::Ignore => Self::IGNORE_CODE,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        if code == Self::IGNORE_CODE {
            return Some(Self::Ignore);
        }
        TileKind::from_code(code).map(Self::Tile)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Tile(kind) => kind.label(),
            Self::Ignore => "Ignore",
        }
    }

    pub fn glyph(self) -> char {
        match self {
            Self::Tile(kind) => kind.glyph(),
            Self::Ignore => '~',
        }
    }

    pub fn kind(self) -> Option<TileKind> {
        match self {
            Self::Tile(kind) => Some(kind),
            Self::Ignore => None,
        }
    }

    pub fn is_ignored(self) -> bool {
        matches!(self, Self::Ignore)
    }
}

impl From<TileKind> for BoardCell {
    fn from(kind: TileKind) -> Self {
        Self::Tile(kind)
    }
}

/// Label for a raw tile code, for diagnostics.
///
/// Defined for every code 0-13 (including `Ignore`); any other code yields an
/// empty string.
pub fn describe(code: i64) -> &'static str {
    u8::try_from(code)
        .ok()
        .and_then(BoardCell::from_code)
        .map(BoardCell::label)
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    #[test]
    fn test_all_types_has_thirteen_distinct_values() {
        let types = all_types();
        assert_eq!(types.len(), 13);

        let distinct: HashSet<_> = types.iter().copied().collect();
        assert_eq!(distinct.len(), 13);
    }

    #[test]
    fn test_all_types_is_in_code_order() {
        let iterated: Vec<TileKind> = TileKind::iter().collect();
        assert_eq!(all_types(), iterated.as_slice());
        for (index, kind) in all_types().iter().enumerate() {
            assert_eq!(kind.code() as usize, index);
        }
    }

    #[test]
    fn test_all_types_excludes_ignore() {
        assert!(all_types()
            .iter()
            .all(|kind| BoardCell::from(*kind) != BoardCell::Ignore));
    }

    #[test]
    fn test_describe_valid_codes() {
        for code in 0..=13 {
            assert!(!describe(code).is_empty(), "code {} has no label", code);
        }
        assert_eq!(describe(0), "Unknown");
        assert_eq!(describe(1), "Pac-Man");
        assert_eq!(describe(9), "Frightened Ghost");
        assert_eq!(describe(11), "Power Pellet");
        assert_eq!(describe(13), "Ignore");
    }

    #[test]
    fn test_describe_out_of_range() {
        assert_eq!(describe(-1), "");
        assert_eq!(describe(14), "");
        assert_eq!(describe(255), "");
        assert_eq!(describe(i64::MAX), "");
    }

    #[test]
    fn test_board_cell_codes_round_trip() {
        for code in 0..=13u8 {
            let cell = BoardCell::from_code(code).unwrap();
            assert_eq!(cell.code(), code);
        }
        assert!(BoardCell::from_code(14).is_none());
    }

    #[test]
    fn test_glyphs_are_unique() {
        let mut glyphs: HashSet<char> = all_types().iter().map(|k| k.glyph()).collect();
        glyphs.insert(BoardCell::Ignore.glyph());
        assert_eq!(glyphs.len(), 14);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&TileKind::PacMan).unwrap(), "\"pacman\"");
        assert_eq!(
            serde_json::from_str::<TileKind>("\"frightened_ghost\"").unwrap(),
            TileKind::FrightenedGhost
        );
        assert_eq!(
            serde_json::from_str::<TileKind>("\"power_pellet\"").unwrap(),
            TileKind::PowerPellet
        );
        assert!(serde_json::from_str::<TileKind>("\"ignore\"").is_err());
    }
}
