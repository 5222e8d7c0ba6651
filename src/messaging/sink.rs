/// Outbound event channel
///
/// The core never assumes its consumer is alive. Once the receiving side is
/// dropped, events are discarded and the core keeps running.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::events::PerceptionEvent;

/// Sending half of the single-consumer event channel
#[derive(Clone)]
pub struct EventSink {
    sender: Option<Sender<PerceptionEvent>>,
    detached: Arc<AtomicBool>,
}

impl EventSink {
    /// Create a sink and the receiver the consumer drains
    pub fn channel() -> (Self, Receiver<PerceptionEvent>) {
        let (tx, rx) = unbounded();
        (
            Self {
                sender: Some(tx),
                detached: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    /// A sink with no consumer; every event is dropped
    pub fn detached() -> Self {
        Self {
            sender: None,
            detached: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Deliver an event (non-blocking). Returns `false` if nobody received it.
    pub fn send(&self, event: PerceptionEvent) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };

        // Unbounded, so sending only fails once the receiver is gone
        if sender.send(event).is_ok() {
            return true;
        }

        // Log only the first drop after the consumer went away
        if !self.detached.swap(true, Ordering::SeqCst) {
            tracing::debug!("Event consumer detached, dropping further events");
        }
        false
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::detached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn failed() -> PerceptionEvent {
        PerceptionEvent::AcquisitionFailed {
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_sink_delivers_in_order() {
        let (sink, rx) = EventSink::channel();
        assert!(sink.send(failed()));
        assert!(sink.send(PerceptionEvent::AcquisitionFailed {
            timeout: Duration::from_secs(1),
        }));

        match rx.try_recv().unwrap() {
            PerceptionEvent::AcquisitionFailed { timeout } => assert_eq!(timeout, Duration::from_secs(10)),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sink_tolerates_dropped_receiver() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        assert!(!sink.send(failed()));
        assert!(!sink.send(failed()));
        assert!(sink.is_detached());
    }

    #[test]
    fn test_undrained_consumer_stays_attached() {
        let (sink, rx) = EventSink::channel();
        for _ in 0..10_000 {
            assert!(sink.send(failed()));
        }
        assert!(!sink.is_detached());
        assert_eq!(rx.len(), 10_000);
    }

    #[test]
    fn test_detached_sink_drops_events() {
        let sink = EventSink::detached();
        assert!(!sink.send(failed()));
        assert!(sink.is_detached());
    }

    #[test]
    fn test_clones_share_channel() {
        let (sink, rx) = EventSink::channel();
        let clone = sink.clone();
        clone.send(failed());
        sink.send(failed());
        assert_eq!(rx.len(), 2);
    }
}
