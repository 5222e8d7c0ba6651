/// Board assembly
///
/// Splits a canonical frame into maze cells and classifies each one.
use std::fmt;
use std::time::Instant;

use image::imageops;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::classifier::PatchClassifier;
use super::tile::{BoardCell, TileKind};
use crate::preprocessing::{CanonicalFrame, GameGeometry};

/// Rectangle of cells, end-exclusive on both axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRegion {
    pub row_start: u32,
    pub row_end: u32,
    pub col_start: u32,
    pub col_end: u32,
}

impl CellRegion {
    pub fn rows(row_start: u32, row_end: u32, cols: u32) -> Self {
        Self {
            row_start,
            row_end,
            col_start: 0,
            col_end: cols,
        }
    }

    pub fn contains(&self, row: u32, col: u32) -> bool {
        (self.row_start..self.row_end).contains(&row) && (self.col_start..self.col_end).contains(&col)
    }

    pub fn fits(&self, rows: u32, cols: u32) -> bool {
        self.row_start < self.row_end
            && self.col_start < self.col_end
            && self.row_end <= rows
            && self.col_end <= cols
    }
}

/// Grid dimensions plus the cells that are never classified
#[derive(Debug, Clone, PartialEq)]
pub struct BoardLayout {
    rows: u32,
    cols: u32,
    ignored: Vec<CellRegion>,
}

impl BoardLayout {
    pub fn new(geometry: GameGeometry, ignored: Vec<CellRegion>) -> Self {
        Self {
            rows: geometry.rows(),
            cols: geometry.cols(),
            ignored,
        }
    }

    /// Score header (top three rows) and lives/fruit tray (bottom two rows)
    pub fn default_ignored(geometry: GameGeometry) -> Vec<CellRegion> {
        let rows = geometry.rows();
        let cols = geometry.cols();
        vec![
            CellRegion::rows(0, 3, cols),
            CellRegion::rows(rows.saturating_sub(2), rows, cols),
        ]
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn ignored_regions(&self) -> &[CellRegion] {
        &self.ignored
    }

    pub fn is_ignored(&self, row: u32, col: u32) -> bool {
        self.ignored.iter().any(|region| region.contains(row, col))
    }
}

impl Default for BoardLayout {
    fn default() -> Self {
        let geometry = GameGeometry::ARCADE;
        Self::new(geometry, Self::default_ignored(geometry))
    }
}

/// Immutable snapshot of one classified frame
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    rows: u32,
    cols: u32,
    cells: Vec<BoardCell>,
    captured_at: Instant,
}

impl Board {
    /// Build a board from row-major cells. Returns `None` when the cell count
    /// does not match the dimensions.
    pub fn from_cells(rows: u32, cols: u32, cells: Vec<BoardCell>, captured_at: Instant) -> Option<Self> {
        if cells.len() != (rows * cols) as usize {
            return None;
        }
        Some(Self {
            rows,
            cols,
            cells,
            captured_at,
        })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    /// Timestamp of the frame this board was built from
    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn get(&self, row: u32, col: u32) -> Option<BoardCell> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.get((row * self.cols + col) as usize).copied()
    }

    pub fn row(&self, row: u32) -> Option<&[BoardCell]> {
        if row >= self.rows {
            return None;
        }
        let start = (row * self.cols) as usize;
        Some(&self.cells[start..start + self.cols as usize])
    }

    pub fn cells(&self) -> &[BoardCell] {
        &self.cells
    }

    pub fn count(&self, kind: TileKind) -> usize {
        self.cells.iter().filter(|cell| cell.kind() == Some(kind)).count()
    }

    /// (row, col) of every cell holding `kind`, row-major
    pub fn positions_of(&self, kind: TileKind) -> Vec<(u32, u32)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.kind() == Some(kind))
            .map(|(index, _)| (index as u32 / self.cols, index as u32 % self.cols))
            .collect()
    }

    pub fn player_position(&self) -> Option<(u32, u32)> {
        self.positions_of(TileKind::PacMan).into_iter().next()
    }

    /// Short summary for logs
    pub fn summary(&self) -> String {
        let ghosts = self
            .cells
            .iter()
            .filter(|cell| cell.kind().is_some_and(TileKind::is_ghost))
            .count();
        format!(
            "{}x{} board: pacman={:?} ghosts={} pellets={} power={} unknown={}",
            self.rows,
            self.cols,
            self.player_position(),
            ghosts,
            self.count(TileKind::Pellet),
            self.count(TileKind::PowerPellet),
            self.count(TileKind::Unknown)
        )
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.cols as usize) {
            let line: String = row.iter().map(|cell| cell.glyph()).collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Classifies every playable cell of a canonical frame
pub struct BoardAssembler<K> {
    classifier: K,
    layout: BoardLayout,
}

impl<K: PatchClassifier> BoardAssembler<K> {
    pub fn new(classifier: K, layout: BoardLayout) -> Self {
        Self { classifier, layout }
    }

    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    pub fn classifier(&self) -> &K {
        &self.classifier
    }

    /// Build the board for one frame.
    ///
    /// Cell size follows from the frame and the layout, so the board always
    /// has `layout.rows() x layout.cols()` cells. Ignored cells never reach
    /// the classifier.
    pub fn assemble(&self, frame: &CanonicalFrame) -> Board {
        let image = frame.image();
        let rows = self.layout.rows;
        let cols = self.layout.cols;
        let cell_width = (image.width() / cols.max(1)).max(1);
        let cell_height = (image.height() / rows.max(1)).max(1);

        let cells: Vec<BoardCell> = (0..rows * cols)
            .into_par_iter()
            .map(|index| {
                let row = index / cols;
                let col = index % cols;
                if self.layout.is_ignored(row, col) {
                    return BoardCell::Ignore;
                }
                let patch =
                    imageops::crop_imm(image, col * cell_width, row * cell_height, cell_width, cell_height)
                        .to_image();
                BoardCell::Tile(self.classifier.classify(&patch))
            })
            .collect();

        Board {
            rows,
            cols,
            cells,
            captured_at: frame.captured_at(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Labels by the red channel of the patch's first pixel and counts calls
    struct CountingClassifier {
        calls: AtomicUsize,
    }

    impl PatchClassifier for CountingClassifier {
        fn classify(&self, patch: &RgbaImage) -> TileKind {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match patch.get_pixel(0, 0)[0] {
                255 => TileKind::PacMan,
                33 => TileKind::Wall,
                _ => TileKind::Blank,
            }
        }
    }

    fn counting() -> CountingClassifier {
        CountingClassifier {
            calls: AtomicUsize::new(0),
        }
    }

    fn canonical(image: RgbaImage) -> CanonicalFrame {
        CanonicalFrame::new(image, Instant::now())
    }

    #[test]
    fn test_default_layout() {
        let layout = BoardLayout::default();
        assert_eq!(layout.rows(), 36);
        assert_eq!(layout.cols(), 27);
        assert!(layout.is_ignored(0, 0));
        assert!(layout.is_ignored(2, 26));
        assert!(!layout.is_ignored(3, 0));
        assert!(!layout.is_ignored(33, 13));
        assert!(layout.is_ignored(34, 13));
        assert!(layout.is_ignored(35, 26));
    }

    #[test]
    fn test_ignored_cells_skip_classifier() {
        let assembler = BoardAssembler::new(counting(), BoardLayout::default());
        let board = assembler.assemble(&canonical(RgbaImage::new(216, 288)));

        let ignored = board.cells().iter().filter(|c| c.is_ignored()).count();
        assert_eq!(ignored, 5 * 27);
        assert_eq!(
            assembler.classifier().calls.load(Ordering::SeqCst),
            (36 - 5) * 27
        );
        for col in 0..27 {
            assert_eq!(board.get(0, col), Some(BoardCell::Ignore));
            assert_eq!(board.get(35, col), Some(BoardCell::Ignore));
        }
    }

    #[test]
    fn test_cells_map_to_frame_positions() {
        let mut image = RgbaImage::new(216, 288);
        // Pac-Man at row 20, col 13; wall at row 5, col 0
        for y in 160..168 {
            for x in 104..112 {
                image.put_pixel(x, y, Rgba([255, 255, 0, 255]));
            }
        }
        for y in 40..48 {
            for x in 0..8 {
                image.put_pixel(x, y, Rgba([33, 33, 255, 255]));
            }
        }
        let assembler = BoardAssembler::new(counting(), BoardLayout::default());
        let board = assembler.assemble(&canonical(image));

        assert_eq!(board.player_position(), Some((20, 13)));
        assert_eq!(board.get(5, 0), Some(BoardCell::Tile(TileKind::Wall)));
        assert_eq!(board.count(TileKind::PacMan), 1);
        assert_eq!(board.count(TileKind::Wall), 1);
    }

    #[test]
    fn test_dimensions_constant_across_frames() {
        let assembler = BoardAssembler::new(counting(), BoardLayout::default());
        let first = assembler.assemble(&canonical(RgbaImage::new(216, 288)));
        let second = assembler.assemble(&canonical(RgbaImage::from_pixel(216, 288, Rgba([33, 33, 255, 255]))));
        assert_eq!((first.rows(), first.cols()), (second.rows(), second.cols()));
        assert_eq!(first.cells().len(), 36 * 27);
    }

    #[test]
    fn test_board_keeps_frame_timestamp() {
        let at = Instant::now();
        let assembler = BoardAssembler::new(counting(), BoardLayout::default());
        let board = assembler.assemble(&CanonicalFrame::new(RgbaImage::new(216, 288), at));
        assert_eq!(board.captured_at(), at);
    }

    #[test]
    fn test_board_display_renders_rows() {
        let cells = vec![
            BoardCell::Ignore,
            BoardCell::Tile(TileKind::Wall),
            BoardCell::Tile(TileKind::Pellet),
            BoardCell::Tile(TileKind::PacMan),
        ];
        let board = Board::from_cells(2, 2, cells, Instant::now()).unwrap();
        assert_eq!(board.to_string(), "~#\n.C\n");
        assert_eq!(board.row(1), Some(&[BoardCell::Tile(TileKind::Pellet), BoardCell::Tile(TileKind::PacMan)][..]));
        assert_eq!(board.get(2, 0), None);
    }

    #[test]
    fn test_from_cells_rejects_wrong_length() {
        assert!(Board::from_cells(2, 2, vec![BoardCell::Ignore; 3], Instant::now()).is_none());
    }

    #[test]
    fn test_cell_region_fits() {
        assert!(CellRegion::rows(0, 3, 27).fits(36, 27));
        assert!(!CellRegion::rows(0, 37, 27).fits(36, 27));
        assert!(!CellRegion::rows(3, 3, 27).fits(36, 27));
    }
}
