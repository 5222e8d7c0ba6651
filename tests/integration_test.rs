// Integration tests for the perception pipeline
// These tests drive the public API end to end with scripted windows

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};

use pacman_perception::capture::{
    CapturedFrame, RawCapture, WindowBounds, WindowCapturer, WindowEnumerator, WindowId,
    WindowMetadata, WindowTarget,
};
use pacman_perception::detection::{
    all_types, describe, Board, BoardAssembler, BoardCell, BoardLayout, CaptureScheduler,
    PatchClassifier, TileClassifier, TileKind,
};
use pacman_perception::error::CaptureError;
use pacman_perception::messaging::{EventSink, PerceptionEvent};
use pacman_perception::preprocessing::FramePreprocessor;
use pacman_perception::scheduler::{Clock, ShutdownSignal, SimulatedClock};
use pacman_perception::session::PerceptionSession;
use pacman_perception::state::{AcquisitionState, AcquisitionStateMachine};

// Mean colours of wall and Pac-Man cells as the bundled model sees them
const WALL_BLUE: Rgba<u8> = Rgba([16, 16, 128, 255]);
const PACMAN_YELLOW: Rgba<u8> = Rgba([179, 179, 0, 255]);

fn game_window(id: u32) -> WindowMetadata {
    WindowMetadata {
        app_name: "Pac-Man".to_string(),
        title: "Pac-Man".to_string(),
        id: WindowId(id),
        bounds: WindowBounds {
            x: 100,
            y: 80,
            width: 600,
            height: 500,
        },
    }
}

/// Shows the game window from poll `appears_at` onwards
struct Desktop {
    polls: u64,
    appears_at: u64,
}

impl WindowEnumerator for Desktop {
    fn on_screen_windows(&mut self) -> Result<Vec<WindowMetadata>, CaptureError> {
        self.polls += 1;
        let mut windows = vec![WindowMetadata {
            app_name: "Terminal".to_string(),
            title: "Pac-Man".to_string(),
            id: WindowId(1),
            bounds: WindowBounds {
                x: 0,
                y: 0,
                width: 800,
                height: 600,
            },
        }];
        if self.polls >= self.appears_at {
            windows.push(game_window(42));
        }
        Ok(windows)
    }
}

/// Retina-sized captures of a solid frame, with scripted failures
struct Camera {
    failures: VecDeque<bool>,
}

impl WindowCapturer for Camera {
    fn capture(&mut self, window: WindowId) -> Result<RawCapture, CaptureError> {
        assert_eq!(window, WindowId(42));
        if self.failures.pop_front().unwrap_or(false) {
            return Err(CaptureError::CaptureFailed("occluded".into()));
        }
        Ok(RawCapture {
            image: RgbaImage::from_pixel(1200, 1000, WALL_BLUE),
            scale_factor: 2.0,
        })
    }
}

/// Paint the playfield cell (row, col) of a 1200x1000 @2x frame
fn paint_cell(frame: &mut RgbaImage, row: u32, col: u32, color: Rgba<u8>) {
    // Playfield is 717x956 starting at (241, 44); cells are ~26.6 px square
    let cell = 956.0 / 36.0;
    let x0 = 241.0 + col as f64 * cell;
    let y0 = 44.0 + row as f64 * cell;
    for y in (y0.ceil() as u32)..((y0 + cell).floor() as u32) {
        for x in (x0.ceil() as u32)..((x0 + cell).floor() as u32) {
            frame.put_pixel(x, y, color);
        }
    }
}

#[test]
fn test_retina_frame_end_to_end() {
    let preprocessor = FramePreprocessor::default();
    let rect = preprocessor.crop_rect(1200, 1000, 2.0);
    assert_eq!(rect.y, 44.0);
    assert_eq!(rect.to_pixels(1200, 1000), Some((241, 44, 717, 956)));

    let frame = CapturedFrame::new(RgbaImage::from_pixel(1200, 1000, WALL_BLUE), 2.0, Instant::now());
    let canonical = preprocessor.process(&frame).unwrap();
    assert_eq!(canonical.image().dimensions(), (216, 288));
    assert_eq!(canonical.captured_at(), frame.captured_at());
}

#[test]
fn test_bundled_model_classifies_painted_frame() {
    let mut image = RgbaImage::from_pixel(1200, 1000, Rgba([0, 0, 0, 255]));
    paint_cell(&mut image, 20, 13, PACMAN_YELLOW);
    paint_cell(&mut image, 10, 4, WALL_BLUE);

    let preprocessor = FramePreprocessor::default();
    let canonical = preprocessor
        .process(&CapturedFrame::new(image, 2.0, Instant::now()))
        .unwrap();

    let classifier = TileClassifier::bundled().unwrap();
    let board = BoardAssembler::new(classifier, BoardLayout::default()).assemble(&canonical);

    assert_eq!((board.rows(), board.cols()), (36, 27));
    assert_eq!(board.player_position(), Some((20, 13)));
    assert_eq!(board.get(10, 4), Some(BoardCell::Tile(TileKind::Wall)));
    assert_eq!(board.get(15, 20), Some(BoardCell::Tile(TileKind::Blank)));
    assert_eq!(board.get(1, 13), Some(BoardCell::Ignore));
}

#[test]
fn test_classifier_never_returns_ignore() {
    let classifier = TileClassifier::bundled().unwrap();
    for value in [0u8, 40, 90, 128, 200, 255] {
        let patch = RgbaImage::from_pixel(8, 8, Rgba([value, 255 - value, value / 2, 255]));
        let kind = classifier.classify(&patch);
        assert!(all_types().contains(&kind));
    }
}

#[test]
fn test_taxonomy_codes_and_labels() {
    assert_eq!(all_types().len(), 13);
    for (code, kind) in all_types().iter().enumerate() {
        assert_eq!(kind.code() as usize, code);
        assert_eq!(describe(code as i64), kind.label());
    }
    assert_eq!(describe(13), BoardCell::Ignore.label());
    assert_eq!(describe(14), "");
    assert_eq!(describe(-1), "");
}

#[test]
fn test_session_acquires_and_streams_boards() {
    let clock = SimulatedClock::new();
    let (sink, events) = EventSink::channel();

    let acquisition = AcquisitionStateMachine::new(
        Desktop {
            polls: 0,
            appears_at: 4,
        },
        WindowTarget::new("Pac-Man", "Pac-Man"),
        sink.clone(),
    );
    let capture = CaptureScheduler::new(
        Camera {
            failures: VecDeque::from(vec![false, true, false, false]),
        },
        FramePreprocessor::default(),
        BoardAssembler::new(TileClassifier::bundled().unwrap(), BoardLayout::default()),
        sink,
    );
    let mut session = PerceptionSession::new(acquisition, capture, clock.clone());
    let shutdown = ShutdownSignal::new();
    session.start();

    // Drive the loop by hand until four capture ticks have run
    while session.capture().delivered() + session.capture().missed() < 4 {
        let deadline = session.next_deadline().unwrap();
        assert!(!clock.sleep_until(deadline, &shutdown));
        session.step();
    }
    session.stop();

    assert_eq!(session.state(), &AcquisitionState::Idle);
    assert_eq!(session.capture().delivered(), 3);
    assert_eq!(session.capture().missed(), 1);

    let received: Vec<PerceptionEvent> = events.try_iter().collect();
    assert_eq!(received.len(), 4);
    match &received[0] {
        PerceptionEvent::WindowAcquired(window) => assert_eq!(window, &game_window(42)),
        other => panic!("expected WindowAcquired, got {:?}", other),
    }

    let boards: Vec<&Board> = received[1..]
        .iter()
        .map(|event| match event {
            PerceptionEvent::BoardProduced(board) => board,
            other => panic!("expected BoardProduced, got {:?}", other),
        })
        .collect();
    assert!(boards.windows(2).all(|pair| pair[0].captured_at() < pair[1].captured_at()));
    for board in boards {
        assert_eq!((board.rows(), board.cols()), (36, 27));
        assert_eq!(board.get(10, 10), Some(BoardCell::Tile(TileKind::Wall)));
    }
}

#[test]
fn test_session_reports_timeout_once() {
    let clock = SimulatedClock::new();
    let start = clock.now();
    let (sink, events) = EventSink::channel();

    let acquisition = AcquisitionStateMachine::new(
        Desktop {
            polls: 0,
            appears_at: u64::MAX,
        },
        WindowTarget::new("Pac-Man", "Pac-Man"),
        sink.clone(),
    );
    let capture = CaptureScheduler::new(
        Camera {
            failures: VecDeque::new(),
        },
        FramePreprocessor::default(),
        BoardAssembler::new(TileClassifier::bundled().unwrap(), BoardLayout::default()),
        sink,
    );
    let mut session = PerceptionSession::new(acquisition, capture, clock.clone());
    session.start();
    session.run(&ShutdownSignal::new());

    let elapsed = clock.now() - start;
    assert!(elapsed > Duration::from_secs(10));
    assert!(elapsed <= Duration::from_millis(10_250));
    assert!(!session.capture().is_capturing());

    let received: Vec<_> = events.try_iter().collect();
    assert_eq!(received.len(), 1);
    assert!(matches!(
        received[0],
        PerceptionEvent::AcquisitionFailed { timeout } if timeout == Duration::from_secs(10)
    ));
}
