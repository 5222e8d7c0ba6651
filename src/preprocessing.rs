/// Frame preprocessing
///
/// Turns a raw window capture into the canonical playfield image the board
/// assembler expects: the window chrome is cropped away, the playfield is
/// centered horizontally using the game's known aspect ratio, and the result
/// is resized to the game's native resolution.
use std::time::Instant;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::capture::CapturedFrame;
use crate::error::CaptureError;

/// Native arcade width in pixels
pub const GAME_WIDTH: u32 = 224;
/// Native arcade height in pixels
pub const GAME_HEIGHT: u32 = 288;
/// Width and height of one maze tile in native pixels
pub const TILE_SIZE: u32 = 8;

/// Known dimensions of the game being watched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameGeometry {
    pub width: u32,
    pub height: u32,
    pub tile: u32,
}

impl GameGeometry {
    pub const ARCADE: Self = Self {
        width: GAME_WIDTH,
        height: GAME_HEIGHT,
        tile: TILE_SIZE,
    };

    /// Width / height of the visible playfield (one tile narrower than the game)
    pub fn playfield_aspect(&self) -> f64 {
        (self.width - self.tile) as f64 / self.height as f64
    }

    /// Canonical resolution every frame is normalized to
    pub fn canonical_size(&self) -> (u32, u32) {
        (self.width - self.tile, self.height)
    }

    pub fn rows(&self) -> u32 {
        self.height / self.tile
    }

    pub fn cols(&self) -> u32 {
        (self.width - self.tile) / self.tile
    }
}

impl Default for GameGeometry {
    fn default() -> Self {
        Self::ARCADE
    }
}

/// Window chrome above and below the playfield, in logical points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowBorders {
    pub top_points: f64,
    pub bottom_points: f64,
}

impl Default for WindowBorders {
    fn default() -> Self {
        Self {
            top_points: 22.0,
            bottom_points: 0.0,
        }
    }
}

/// Playfield rectangle in frame pixels, before rounding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayfieldRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PlayfieldRect {
    pub fn aspect(&self) -> f64 {
        self.width / self.height
    }

    /// Whole-pixel rectangle clamped to the frame, or `None` if nothing is left
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x = (self.x.max(0.0).floor() as u32).min(frame_width);
        let y = (self.y.max(0.0).floor() as u32).min(frame_height);
        let width = (self.width.max(0.0).round() as u32).min(frame_width - x);
        let height = (self.height.max(0.0).round() as u32).min(frame_height - y);

        if width == 0 || height == 0 {
            None
        } else {
            Some((x, y, width, height))
        }
    }
}

/// Preprocessed frame at exactly the canonical resolution
#[derive(Debug, Clone)]
pub struct CanonicalFrame {
    image: RgbaImage,
    captured_at: Instant,
}

impl CanonicalFrame {
    pub fn new(image: RgbaImage, captured_at: Instant) -> Self {
        Self { image, captured_at }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn byte_len(&self) -> usize {
        self.image.as_raw().len()
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Crops and resizes captured frames. Stateless apart from its settings.
#[derive(Debug, Clone)]
pub struct FramePreprocessor {
    geometry: GameGeometry,
    borders: WindowBorders,
    filter: FilterType,
}

impl FramePreprocessor {
    pub fn new(geometry: GameGeometry, borders: WindowBorders) -> Self {
        Self {
            geometry,
            borders,
            filter: FilterType::Triangle,
        }
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    pub fn geometry(&self) -> GameGeometry {
        self.geometry
    }

    /// Compute the playfield rectangle for a frame of the given size.
    ///
    /// The borders are converted from points to pixels with `scale`, the
    /// remaining height is used as-is and the width follows from the game's
    /// aspect ratio. Frames too narrow for that width are fitted by width
    /// instead, so the aspect ratio always holds.
    pub fn crop_rect(&self, frame_width: u32, frame_height: u32, scale: f64) -> PlayfieldRect {
        let scale = sanitize_scale(scale);
        let frame_width = frame_width as f64;
        let top = self.borders.top_points * scale;
        let bottom = self.borders.bottom_points * scale;
        let aspect = self.geometry.playfield_aspect();

        let mut height = (frame_height as f64 - top - bottom).max(0.0);
        let mut width = height * aspect;
        if width > frame_width {
            width = frame_width;
            height = width / aspect;
        }

        PlayfieldRect {
            x: (frame_width - width) / 2.0,
            y: top,
            width,
            height,
        }
    }

    /// Cut the playfield out of a raw window image
    pub fn crop(&self, image: &RgbaImage, scale: f64) -> Result<RgbaImage, CaptureError> {
        let (width, height) = image.dimensions();
        let (x, y, crop_width, crop_height) = self
            .crop_rect(width, height, scale)
            .to_pixels(width, height)
            .ok_or(CaptureError::FrameTooSmall { width, height })?;

        Ok(imageops::crop_imm(image, x, y, crop_width, crop_height).to_image())
    }

    /// Resize a cropped playfield to the canonical resolution.
    ///
    /// The output is always the canonical size in pixels, whatever the input
    /// dimensions. `scale` is informational only: it is reported as the
    /// logical size in points (canonical / scale) in the trace log and does
    /// not change the result.
    pub fn resize(&self, image: &RgbaImage, scale: f64) -> RgbaImage {
        let (target_width, target_height) = self.geometry.canonical_size();
        if image.dimensions() == (target_width, target_height) {
            return image.clone();
        }

        let scale = sanitize_scale(scale);
        tracing::trace!(
            from_width = image.width(),
            from_height = image.height(),
            logical_width = target_width as f64 / scale,
            logical_height = target_height as f64 / scale,
            "resizing playfield"
        );
        imageops::resize(image, target_width, target_height, self.filter)
    }

    /// Crop then resize one captured frame
    pub fn process(&self, frame: &CapturedFrame) -> Result<CanonicalFrame, CaptureError> {
        let cropped = self.crop(frame.image(), frame.scale_factor())?;
        let resized = self.resize(&cropped, frame.scale_factor());
        Ok(CanonicalFrame::new(resized, frame.captured_at()))
    }
}

impl Default for FramePreprocessor {
    fn default() -> Self {
        Self::new(GameGeometry::ARCADE, WindowBorders::default())
    }
}

fn sanitize_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}
