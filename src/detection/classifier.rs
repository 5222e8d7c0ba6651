/// Tile classifier
///
/// Maps a fixed-size image patch to one `TileKind` using a nearest-sample
/// colour model. A patch is reduced to an N x N grid of mean colours and
/// compared against every sample in the model; the closest sample wins as
/// long as it lies within the model's `max_distance`.
use std::fs;
use std::path::Path;

use image::RgbaImage;
use serde::Deserialize;

use super::tile::TileKind;
use crate::error::ModelError;

/// Model format version understood by this build
pub const MODEL_VERSION: u32 = 1;

/// Largest signature grid a model may ask for
pub const MAX_GRID: u32 = 64;

const BUNDLED_MODEL: &str = include_str!("../../assets/tile_model.json");

/// Anything that can label a single cell patch.
///
/// Implementations must be total: content they cannot place maps to
/// `TileKind::Unknown`.
pub trait PatchClassifier: Send + Sync {
    fn classify(&self, patch: &RgbaImage) -> TileKind;
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    version: u32,
    grid: u32,
    max_distance: f32,
    classes: Vec<ClassEntry>,
}

#[derive(Debug, Deserialize)]
struct ClassEntry {
    tile: TileKind,
    samples: Vec<Vec<String>>,
}

#[derive(Debug, Clone)]
struct Sample {
    kind: TileKind,
    colors: Vec<[f32; 3]>,
}

/// Nearest-sample classifier loaded from a JSON model.
///
/// Only constructible through a successful load, so a classifier that
/// exists is always ready to classify.
#[derive(Debug, Clone)]
pub struct TileClassifier {
    grid: u32,
    max_distance: f32,
    samples: Vec<Sample>,
}

impl TileClassifier {
    /// Load the model compiled into the binary
    pub fn bundled() -> Result<Self, ModelError> {
        Self::from_json_str(BUNDLED_MODEL)
    }

    /// Load a model file from disk
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = fs::read_to_string(path).map_err(|source| ModelError::LoadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Load the configured model, falling back to the bundled one when no
    /// path is given.
    pub fn load_model(path: Option<&Path>) -> Result<Self, ModelError> {
        let classifier = match path {
            Some(path) => Self::load(path)?,
            None => Self::bundled()?,
        };
        tracing::info!(
            "✓ Tile model loaded ({} samples, {}x{} grid, source: {})",
            classifier.samples.len(),
            classifier.grid,
            classifier.grid,
            path.map(|p| p.display().to_string())
                .unwrap_or_else(|| "bundled".to_string())
        );
        Ok(classifier)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let model: ModelFile = serde_json::from_str(json).map_err(ModelError::ParseFailed)?;

        if model.version != MODEL_VERSION {
            return Err(ModelError::UnsupportedVersion(model.version));
        }
        if model.grid == 0 || model.grid > MAX_GRID {
            return Err(ModelError::Malformed(format!(
                "grid must be between 1 and {}, got {}",
                MAX_GRID, model.grid
            )));
        }
        if !model.max_distance.is_finite() || model.max_distance < 0.0 {
            return Err(ModelError::Malformed(format!(
                "max_distance must be a non-negative number, got {}",
                model.max_distance
            )));
        }
        if model.classes.is_empty() {
            return Err(ModelError::Malformed("model has no classes".to_string()));
        }

        let cells = (model.grid * model.grid) as usize;
        let mut samples = Vec::new();
        for class in &model.classes {
            if class.samples.is_empty() {
                return Err(ModelError::Malformed(format!(
                    "class {} has no samples",
                    class.tile.label()
                )));
            }
            for raw in &class.samples {
                if raw.len() != cells {
                    return Err(ModelError::Malformed(format!(
                        "sample for {} has {} colours, expected {}",
                        class.tile.label(),
                        raw.len(),
                        cells
                    )));
                }
                let colors = raw
                    .iter()
                    .map(|value| {
                        parse_hex_color(value).ok_or_else(|| ModelError::InvalidColor {
                            tile: class.tile.label().to_string(),
                            value: value.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                samples.push(Sample {
                    kind: class.tile,
                    colors,
                });
            }
        }

        Ok(Self {
            grid: model.grid,
            max_distance: model.max_distance,
            samples,
        })
    }

    pub fn grid(&self) -> u32 {
        self.grid
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Mean colour of each grid region, row-major.
    ///
    /// Regions always cover at least one pixel, so patches smaller than the
    /// grid still produce a full signature.
    fn signature(&self, patch: &RgbaImage) -> Vec<[f32; 3]> {
        let (width, height) = patch.dimensions();
        let grid = self.grid;
        let mut signature = Vec::with_capacity((grid * grid) as usize);

        for gy in 0..grid {
            let (y0, y1) = region_bounds(gy, grid, height);
            for gx in 0..grid {
                let (x0, x1) = region_bounds(gx, grid, width);
                let mut sum = [0u64; 3];
                for y in y0..y1 {
                    for x in x0..x1 {
                        let pixel = patch.get_pixel(x, y);
                        sum[0] += pixel[0] as u64;
                        sum[1] += pixel[1] as u64;
                        sum[2] += pixel[2] as u64;
                    }
                }
                let count = ((x1 - x0) * (y1 - y0)).max(1) as f32;
                signature.push([
                    sum[0] as f32 / count,
                    sum[1] as f32 / count,
                    sum[2] as f32 / count,
                ]);
            }
        }

        signature
    }
}

impl PatchClassifier for TileClassifier {
    fn classify(&self, patch: &RgbaImage) -> TileKind {
        if patch.width() == 0 || patch.height() == 0 {
            return TileKind::Unknown;
        }

        let signature = self.signature(patch);
        let mut best: Option<(TileKind, f32)> = None;
        for sample in &self.samples {
            let distance = rms_distance(&signature, &sample.colors);
            // Strict comparison keeps the earliest sample on ties
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((sample.kind, distance));
            }
        }

        match best {
            Some((kind, distance)) if distance <= self.max_distance => kind,
            _ => TileKind::Unknown,
        }
    }
}

fn region_bounds(index: u32, grid: u32, extent: u32) -> (u32, u32) {
    let start = (index * extent / grid).min(extent.saturating_sub(1));
    let end = ((index + 1) * extent / grid).max(start + 1).min(extent);
    (start, end)
}

fn rms_distance(a: &[[f32; 3]], b: &[[f32; 3]]) -> f32 {
    let sum: f32 = a
        .iter()
        .zip(b)
        .map(|(p, q)| {
            let dr = p[0] - q[0];
            let dg = p[1] - q[1];
            let db = p[2] - q[2];
            dr * dr + dg * dg + db * db
        })
        .sum();
    (sum / a.len().max(1) as f32).sqrt()
}

fn parse_hex_color(value: &str) -> Option<[f32; 3]> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some([
        channel(0..2)? as f32,
        channel(2..4)? as f32,
        channel(4..6)? as f32,
    ])
}
