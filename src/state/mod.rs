/// State management module
///
/// Window acquisition lifecycle with explicit, idempotent transitions.

pub mod acquisition;

// Re-export commonly used types
pub use acquisition::{
    AcquisitionOutcome, AcquisitionState, AcquisitionStateMachine, DEFAULT_ACQUISITION_TIMEOUT,
    DEFAULT_POLL_INTERVAL,
};
