//! Perception core for a Pac-Man playing agent.
//!
//! Finds the game window, captures it on a fixed cadence and turns every
//! frame into a board of classified tiles.

pub mod capture;
pub mod config;
pub mod detection;
pub mod error;
pub mod messaging;
pub mod preprocessing;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod utils;

pub use capture::{WindowCapturer, WindowEnumerator, WindowMetadata, WindowTarget, XcapWindows};
pub use config::Config;
pub use detection::{Board, BoardAssembler, BoardCell, CaptureScheduler, TileClassifier, TileKind};
pub use error::{AppResult, CaptureError, ConfigError, ModelError};
pub use messaging::{EventSink, PerceptionEvent};
pub use preprocessing::FramePreprocessor;
pub use scheduler::{Clock, ShutdownSignal, SimulatedClock, SystemClock};
pub use session::{PerceptionSession, SessionExit};
pub use state::{AcquisitionState, AcquisitionStateMachine};
