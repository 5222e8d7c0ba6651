use std::fmt;
use std::time::Instant;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use xcap::Window;

use crate::error::CaptureError;

/// Opaque identifier of an on-screen window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Screen bounds of a window in logical points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Describes one candidate on-screen window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowMetadata {
    pub app_name: String,
    pub title: String,
    pub id: WindowId,
    pub bounds: WindowBounds,
}

/// The (application name, window title) pair acquisition looks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowTarget {
    pub app_name: String,
    pub title: String,
}

impl WindowTarget {
    pub fn new(app_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            title: title.into(),
        }
    }

    /// Exact, case-sensitive match on both fields
    pub fn matches(&self, window: &WindowMetadata) -> bool {
        window.app_name == self.app_name && window.title == self.title
    }
}

/// Pixels returned by a window capture backend
#[derive(Debug)]
pub struct RawCapture {
    pub image: RgbaImage,
    /// Backing scale factor (pixels per logical point)
    pub scale_factor: f64,
}

/// A raw bitmap stamped with its capture time. Lives for one capture tick.
#[derive(Debug)]
pub struct CapturedFrame {
    image: RgbaImage,
    scale_factor: f64,
    captured_at: Instant,
}

impl CapturedFrame {
    pub fn new(image: RgbaImage, scale_factor: f64, captured_at: Instant) -> Self {
        Self {
            image,
            scale_factor,
            captured_at,
        }
    }

    pub fn from_raw(raw: RawCapture, captured_at: Instant) -> Self {
        Self::new(raw.image, raw.scale_factor, captured_at)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn byte_len(&self) -> usize {
        self.image.as_raw().len()
    }
}

/// Source of on-screen window metadata
pub trait WindowEnumerator {
    fn on_screen_windows(&mut self) -> Result<Vec<WindowMetadata>, CaptureError>;
}

/// Captures the current contents of a window
pub trait WindowCapturer {
    fn capture(&mut self, window: WindowId) -> Result<RawCapture, CaptureError>;
}

/// Window enumeration and capture backed by `xcap`
///
/// # Platform Notes
/// - macOS: requires Screen Recording permission; window sizes are reported
///   in points while captures are in pixels, which yields the backing scale
/// - Windows / Linux (X11): sizes and captures are both in pixels, so the
///   scale factor is 1.0
///
/// The last captured window handle is reused between ticks and only looked
/// up again after a failure.
#[derive(Default)]
pub struct XcapWindows {
    cached: Option<(WindowId, Window)>,
}

impl XcapWindows {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_window(window: WindowId) -> Result<Window, CaptureError> {
        let windows = Window::all().map_err(|err| CaptureError::EnumerationFailed(err.to_string().into()))?;
        windows
            .into_iter()
            .find(|candidate| candidate.id().ok() == Some(window.0))
            .ok_or(CaptureError::WindowNotFound(window.0))
    }

    fn capture_cached(&mut self, window: WindowId) -> Result<RawCapture, CaptureError> {
        let handle = match self.cached.take() {
            Some((id, handle)) if id == window => handle,
            _ => Self::find_window(window)?,
        };

        if handle.is_minimized().unwrap_or(false) {
            return Err(CaptureError::CaptureFailed("window is minimized".into()));
        }

        let logical_width = handle.width().unwrap_or(0);
        let image = handle
            .capture_image()
            .map_err(|err| CaptureError::CaptureFailed(err.to_string().into()))?;
        let scale_factor = if logical_width > 0 {
            image.width() as f64 / logical_width as f64
        } else {
            1.0
        };

        self.cached = Some((window, handle));
        Ok(RawCapture {
            image,
            scale_factor,
        })
    }
}

fn metadata_for(window: &Window) -> Option<WindowMetadata> {
    Some(WindowMetadata {
        app_name: window.app_name().ok()?,
        title: window.title().ok()?,
        id: WindowId(window.id().ok()?),
        bounds: WindowBounds {
            x: window.x().ok()?,
            y: window.y().ok()?,
            width: window.width().ok()?,
            height: window.height().ok()?,
        },
    })
}

impl WindowEnumerator for XcapWindows {
    fn on_screen_windows(&mut self) -> Result<Vec<WindowMetadata>, CaptureError> {
        let windows = Window::all().map_err(|err| CaptureError::EnumerationFailed(err.to_string().into()))?;
        Ok(windows
            .iter()
            .filter(|window| !window.is_minimized().unwrap_or(false))
            .filter_map(metadata_for)
            .collect())
    }
}

impl WindowCapturer for XcapWindows {
    fn capture(&mut self, window: WindowId) -> Result<RawCapture, CaptureError> {
        // A failed capture drops the cached handle so the next tick looks it up again
        self.capture_cached(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(app: &str, title: &str) -> WindowMetadata {
        WindowMetadata {
            app_name: app.to_string(),
            title: title.to_string(),
            id: WindowId(42),
            bounds: WindowBounds {
                x: 0,
                y: 0,
                width: 600,
                height: 500,
            },
        }
    }

    #[test]
    fn test_target_matches_exactly() {
        let target = WindowTarget::new("Pac-Man", "Pac-Man");
        assert!(target.matches(&metadata("Pac-Man", "Pac-Man")));
        assert!(!target.matches(&metadata("Pac-Man", "Pac-Man - Paused")));
        assert!(!target.matches(&metadata("pac-man", "Pac-Man")));
        assert!(!target.matches(&metadata("Safari", "Pac-Man")));
    }

    #[test]
    fn test_captured_frame_accessors() {
        let now = Instant::now();
        let frame = CapturedFrame::from_raw(
            RawCapture {
                image: RgbaImage::new(10, 20),
                scale_factor: 2.0,
            },
            now,
        );
        assert_eq!(frame.image().dimensions(), (10, 20));
        assert_eq!(frame.scale_factor(), 2.0);
        assert_eq!(frame.captured_at(), now);
        assert_eq!(frame.byte_len(), 10 * 20 * 4);
    }

    #[test]
    fn test_window_id_display() {
        assert_eq!(WindowId(1234).to_string(), "1234");
    }
}
