/// Messaging module
///
/// The perception core reports through a single-consumer channel:
///
/// ```text
/// ┌─────────────┐   WindowAcquired     ┌───────────┐
/// │ Acquisition │ ───────────────────> │           │
/// └─────────────┘   AcquisitionFailed  │ EventSink │ ───> consumer (decision engine)
/// ┌─────────────┐   BoardProduced      │           │
/// │   Capture   │ ───────────────────> │           │
/// └─────────────┘                      └───────────┘
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let (sink, rx) = EventSink::channel();
/// // hand `sink` to the session, drain `rx` elsewhere
/// while let Ok(event) = rx.recv() {
///     match event {
///         PerceptionEvent::BoardProduced(board) => { /* plan */ }
///         _ => {}
///     }
/// }
/// ```

pub mod events;
pub mod sink;

pub use events::PerceptionEvent;
pub use sink::EventSink;
