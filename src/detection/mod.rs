/// Detection module
///
/// Turns captured frames into boards of classified tiles.
///
/// ## Architecture
///
/// ```text
/// CaptureScheduler (one tick every 90 ms)
///   ├── WindowCapturer (raw window bitmap)
///   ├── FramePreprocessor (crop + resize to 216x288)
///   └── BoardAssembler (36 x 27 cells)
///       └── TileClassifier (one TileKind per cell)
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// use detection::{BoardAssembler, BoardLayout, TileClassifier};
///
/// let classifier = TileClassifier::bundled()?;
/// let assembler = BoardAssembler::new(classifier, BoardLayout::default());
///
/// let board = assembler.assemble(&canonical_frame);
/// println!("{}", board);
/// ```

pub mod board;
pub mod classifier;
pub mod pipeline;
pub mod tile;

// Re-export commonly used types
pub use board::{Board, BoardAssembler, BoardLayout, CellRegion};
pub use classifier::{PatchClassifier, TileClassifier, MODEL_VERSION};
pub use pipeline::{CaptureScheduler, TickOutcome, DEFAULT_CAPTURE_INTERVAL};
pub use tile::{all_types, describe, BoardCell, TileKind, ALL_TILE_KINDS};
