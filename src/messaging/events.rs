/// Event types for the perception core
///
/// Events represent things that have happened (past tense). They are the
/// only output of the core and go to a single consumer.
use std::time::Duration;

use crate::capture::WindowMetadata;
use crate::detection::Board;

#[derive(Debug, Clone)]
pub enum PerceptionEvent {
    /// The target window was found
    WindowAcquired(WindowMetadata),

    /// No matching window appeared before the acquisition timeout
    AcquisitionFailed { timeout: Duration },

    /// One capture tick produced a board
    BoardProduced(Board),
}

impl PerceptionEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            PerceptionEvent::WindowAcquired(window) => {
                format!(
                    "Window acquired: {} - {} (id {})",
                    window.app_name, window.title, window.id
                )
            }
            PerceptionEvent::AcquisitionFailed { timeout } => {
                format!("Window acquisition timed out after {:?}", timeout)
            }
            PerceptionEvent::BoardProduced(board) => board.summary(),
        }
    }

    pub fn is_terminal_acquisition(&self) -> bool {
        matches!(
            self,
            PerceptionEvent::WindowAcquired(_) | PerceptionEvent::AcquisitionFailed { .. }
        )
    }
}
