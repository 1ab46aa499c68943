use std::path::{Path, PathBuf};

use framecast_common::clock::ManualClock;
use framecast_export::{
    progress_channel, validate_range, CancelFlag, ExportError, ExportLoop, ExportObserver,
    ExportOutcome, FrameBuffer, FrameProgress, FrameSource, ProgressEvent, RawFileSink, Sink,
    SinkError, SinkErrorKind, TestPatternSource, ThrottlePolicy, FINALIZING_LABEL,
};
use framecast_model::ExportRange;
use proptest::prelude::*;

/// Source that records cache bracketing and rendered frames.
#[derive(Default)]
struct RecordingSource {
    acquired: Vec<usize>,
    released: usize,
    rendered: Vec<u64>,
}

impl FrameSource for RecordingSource {
    fn render(&mut self, frame_number: u64) -> FrameBuffer {
        self.rendered.push(frame_number);
        FrameBuffer::blank(frame_number, 2, 2)
    }

    fn acquire_cache(&mut self, max_frames: usize) {
        self.acquired.push(max_frames);
    }

    fn release_cache(&mut self) {
        self.released += 1;
    }
}

/// Sink with scripted failures that advances a shared clock on each write.
struct ScriptedSink {
    path: PathBuf,
    clock: ManualClock,
    secs_per_write: f64,
    fail_open: Option<SinkError>,
    fail_at: Option<(u64, SinkError)>,
    fail_close: Option<SinkError>,
    cancel_after: Option<(u64, CancelFlag)>,
    opened: usize,
    closed: usize,
    written: Vec<u64>,
}

impl ScriptedSink {
    fn new(clock: &ManualClock) -> Self {
        Self {
            path: PathBuf::from("/tmp/framecast-test/output.mp4"),
            clock: clock.clone(),
            secs_per_write: 0.01,
            fail_open: None,
            fail_at: None,
            fail_close: None,
            cancel_after: None,
            opened: 0,
            closed: 0,
            written: Vec::new(),
        }
    }
}

impl Sink for ScriptedSink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn open(&mut self) -> Result<(), SinkError> {
        self.opened += 1;
        match self.fail_open.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn write(&mut self, frame: &FrameBuffer) -> Result<(), SinkError> {
        self.clock.advance_secs(self.secs_per_write);
        if let Some((at, err)) = &self.fail_at {
            if *at == frame.number {
                return Err(err.clone());
            }
        }
        self.written.push(frame.number);
        if let Some((after, flag)) = &self.cancel_after {
            if self.written.len() as u64 == *after {
                flag.cancel();
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed += 1;
        match self.fail_close.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn frame_events(events: &[ProgressEvent]) -> Vec<&FrameProgress> {
    events
        .iter()
        .filter_map(|event| match event {
            ProgressEvent::Frame(progress) => Some(progress),
            _ => None,
        })
        .collect()
}

fn run(
    range: ExportRange,
    clock: &ManualClock,
    source: &mut RecordingSource,
    sink: &mut ScriptedSink,
    cancel: &CancelFlag,
) -> (ExportOutcome, Vec<ProgressEvent>) {
    let mut events = Vec::new();
    let outcome = ExportLoop::new(clock.clone()).run(range, source, sink, &mut events, cancel);
    (outcome, events)
}

#[test]
fn test_thousand_frames_write_in_order_and_finish() {
    let clock = ManualClock::new();
    let mut source = RecordingSource::default();
    let mut sink = ScriptedSink::new(&clock);
    let range = ExportRange::new(1, 1000).unwrap();

    let (outcome, events) = run(range, &clock, &mut source, &mut sink, &CancelFlag::new());

    assert!(outcome.is_completed());
    assert_eq!(outcome.frames_written(), Some(1000));
    assert_eq!(sink.written, (1..=1000).collect::<Vec<_>>());
    assert_eq!(source.rendered, sink.written);
    assert_eq!((sink.opened, sink.closed), (1, 1));

    assert!(matches!(events.first(), Some(ProgressEvent::Started { start_frame: 1, end_frame: 1000, .. })));
    assert!(matches!(events.last(), Some(ProgressEvent::Ended { .. })));

    let frames = frame_events(&events);
    // Step is 1 for this span, so every frame is shown, plus the final report.
    assert_eq!(frames.len(), 1001);
    let ticks: Vec<u64> = frames.iter().filter(|p| !p.is_final).map(|p| p.frame).collect();
    assert!(ticks.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(frames[999].frame, 1000);
    assert_eq!(frames[999].label, FINALIZING_LABEL);

    let last = frames[1000];
    assert!(last.is_final);
    assert_eq!(last.frame, 1000);
    assert!(last.label.ends_with("FPS)"));
    assert!(last.label.contains("Elapsed"));
}

#[test]
fn test_equal_bounds_are_rejected_before_anything_runs() {
    assert_eq!(
        validate_range(100, 100).unwrap_err(),
        ExportError::InvalidRange {
            start: 100,
            end: 100
        }
    );
}

#[test]
fn test_channel_mismatch_stops_stream_and_closes_once() {
    let clock = ManualClock::new();
    let mut source = RecordingSource::default();
    let mut sink = ScriptedSink::new(&clock);
    sink.fail_at = Some((
        5,
        SinkError::from_message("InvalidChannels: layout mono does not match 2"),
    ));
    let range = ExportRange::new(1, 100).unwrap();

    let (outcome, events) = run(range, &clock, &mut source, &mut sink, &CancelFlag::new());

    match &outcome {
        ExportOutcome::Failed { kind, .. } => assert_eq!(*kind, SinkErrorKind::ChannelMismatch),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(matches!(
        outcome.error(),
        Some(ExportError::SinkChannelMismatch(_))
    ));
    assert_eq!(sink.written, vec![1, 2, 3, 4]);
    assert_eq!(sink.closed, 1);
    assert_eq!((source.acquired.len(), source.released), (1, 1));
    assert!(frame_events(&events).iter().all(|p| !p.is_final));
    assert!(matches!(events.last(), Some(ProgressEvent::Ended { .. })));
}

#[test]
fn test_close_error_does_not_mask_write_error() {
    let clock = ManualClock::new();
    let mut source = RecordingSource::default();
    let mut sink = ScriptedSink::new(&clock);
    sink.fail_at = Some((3, SinkError::new(SinkErrorKind::EncodeFailure, "pipe closed")));
    sink.fail_close = Some(SinkError::new(SinkErrorKind::FormatUnsupported, "trailer"));

    let (outcome, _) = run(
        ExportRange::new(1, 10).unwrap(),
        &clock,
        &mut source,
        &mut sink,
        &CancelFlag::new(),
    );

    assert_eq!(
        outcome,
        ExportOutcome::Failed {
            kind: SinkErrorKind::EncodeFailure,
            detail: "pipe closed".to_string()
        }
    );
    assert_eq!(sink.closed, 1);
}

#[test]
fn test_close_error_alone_fails_the_export() {
    let clock = ManualClock::new();
    let mut source = RecordingSource::default();
    let mut sink = ScriptedSink::new(&clock);
    sink.fail_close = Some(SinkError::from_message("InvalidFormat: trailer"));

    let (outcome, events) = run(
        ExportRange::new(1, 10).unwrap(),
        &clock,
        &mut source,
        &mut sink,
        &CancelFlag::new(),
    );

    assert!(matches!(
        outcome,
        ExportOutcome::Failed {
            kind: SinkErrorKind::FormatUnsupported,
            ..
        }
    ));
    assert_eq!(sink.written.len(), 10);
    assert!(frame_events(&events).iter().all(|p| !p.is_final));
}

#[test]
fn test_open_failure_skips_close_but_reports_end() {
    let clock = ManualClock::new();
    let mut source = RecordingSource::default();
    let mut sink = ScriptedSink::new(&clock);
    sink.fail_open = Some(SinkError::from_message("InvalidCodec: libnothing"));

    let (outcome, events) = run(
        ExportRange::new(1, 10).unwrap(),
        &clock,
        &mut source,
        &mut sink,
        &CancelFlag::new(),
    );

    assert!(matches!(
        outcome.error(),
        Some(ExportError::SinkCodecUnsupported(_))
    ));
    assert_eq!(sink.closed, 0);
    assert!(sink.written.is_empty());
    assert_eq!(source.released, 1);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ProgressEvent::Ended { .. }));
}

#[test]
fn test_cancel_during_write_stops_after_that_frame() {
    let clock = ManualClock::new();
    let cancel = CancelFlag::new();
    let mut source = RecordingSource::default();
    let mut sink = ScriptedSink::new(&clock);
    sink.cancel_after = Some((51, cancel.clone()));

    let (outcome, events) = run(
        ExportRange::new(1, 200).unwrap(),
        &clock,
        &mut source,
        &mut sink,
        &cancel,
    );

    assert_eq!(outcome, ExportOutcome::Cancelled { frames_written: 51 });
    assert_eq!(sink.written.last(), Some(&51));
    assert_eq!(sink.closed, 1);

    let frames = frame_events(&events);
    let last = frames.last().unwrap();
    assert!(last.is_final);
    assert_eq!(last.frame, 51);
    assert!(matches!(events.last(), Some(ProgressEvent::Ended { .. })));
}

#[test]
fn test_cancel_before_start_still_writes_first_frame() {
    let clock = ManualClock::new();
    let cancel = CancelFlag::new();
    cancel.cancel();
    let mut source = RecordingSource::default();
    let mut sink = ScriptedSink::new(&clock);

    let (outcome, _) = run(
        ExportRange::new(1, 50).unwrap(),
        &clock,
        &mut source,
        &mut sink,
        &cancel,
    );

    assert_eq!(outcome, ExportOutcome::Cancelled { frames_written: 1 });
}

#[test]
fn test_slow_frames_trigger_liveness_ticks() {
    let clock = ManualClock::new();
    let cancel = CancelFlag::new();
    let mut source = RecordingSource::default();
    let mut sink = ScriptedSink::new(&clock);
    sink.secs_per_write = 0.6;
    sink.cancel_after = Some((9, cancel.clone()));

    // Span 10000 gives a count step of 10, so frames 1..=9 only show on time.
    let (_, events) = run(
        ExportRange::new(1, 10_001).unwrap(),
        &clock,
        &mut source,
        &mut sink,
        &cancel,
    );

    let ticks: Vec<u64> = frame_events(&events)
        .iter()
        .filter(|p| !p.is_final)
        .map(|p| p.frame)
        .collect();
    assert_eq!(ticks, vec![3, 5, 7, 9]);
}

#[test]
fn test_frozen_clock_shows_only_count_ticks() {
    let clock = ManualClock::new();
    let mut source = RecordingSource::default();
    let mut sink = ScriptedSink::new(&clock);
    sink.secs_per_write = 0.0;

    let (_, events) = run(
        ExportRange::new(1, 10_000).unwrap(),
        &clock,
        &mut source,
        &mut sink,
        &CancelFlag::new(),
    );

    let ticks = frame_events(&events)
        .into_iter()
        .filter(|p| !p.is_final)
        .collect::<Vec<_>>();
    assert_eq!(ticks.len(), 1000);
    assert!(ticks.iter().all(|p| p.frame % 10 == 0));
    // No time has passed, so no estimate and the label stays empty.
    assert!(ticks[..999].iter().all(|p| p.label.is_empty()));
    assert_eq!(ticks[999].label, FINALIZING_LABEL);
}

#[test]
fn test_custom_policy_and_cache_size() {
    let clock = ManualClock::new();
    let mut source = RecordingSource::default();
    let mut sink = ScriptedSink::new(&clock);
    sink.secs_per_write = 0.0;
    let mut events = Vec::new();

    let outcome = ExportLoop::new(clock.clone())
        .with_policy(ThrottlePolicy {
            target_events: 10,
            liveness_secs: 1.0,
        })
        .with_cache_frames(32)
        .run(
            ExportRange::new(1, 101).unwrap(),
            &mut source,
            &mut sink,
            &mut events,
            &CancelFlag::new(),
        );

    assert!(outcome.is_completed());
    assert_eq!(source.acquired, vec![32]);
    let ticks = frame_events(&events).iter().filter(|p| !p.is_final).count();
    assert_eq!(ticks, 10);
}

/// Records events and counts cooperative yields between them.
#[derive(Default)]
struct YieldCounter {
    events: Vec<ProgressEvent>,
    yields: usize,
    yields_without_tick: usize,
    tick_pending: bool,
}

impl ExportObserver for YieldCounter {
    fn started(&mut self, path: &Path, start_frame: u64, end_frame: u64) {
        self.events.started(path, start_frame, end_frame);
    }

    fn frame(&mut self, progress: &FrameProgress) {
        self.tick_pending = !progress.is_final;
        self.events.frame(progress);
    }

    fn ended(&mut self, path: &Path) {
        self.events.ended(path);
    }

    fn yield_now(&mut self) {
        if !self.tick_pending {
            self.yields_without_tick += 1;
        }
        self.tick_pending = false;
        self.yields += 1;
    }
}

#[test]
fn test_observer_yields_once_per_display_tick() {
    let clock = ManualClock::new();
    let cancel = CancelFlag::new();
    let mut source = RecordingSource::default();
    let mut sink = ScriptedSink::new(&clock);
    sink.secs_per_write = 0.6;
    sink.cancel_after = Some((40, cancel.clone()));
    let mut observer = YieldCounter::default();

    // Count ticks every 10 frames plus time-based ticks from the slow clock.
    ExportLoop::new(clock.clone()).run(
        ExportRange::new(1, 10_001).unwrap(),
        &mut source,
        &mut sink,
        &mut observer,
        &cancel,
    );

    let ticks = frame_events(&observer.events)
        .iter()
        .filter(|p| !p.is_final)
        .count();
    assert!(ticks > 4);
    assert_eq!(observer.yields, ticks);
    assert_eq!(observer.yields_without_tick, 0);
}

#[test]
fn test_raw_file_export_end_to_end() {
    let dir = std::env::temp_dir().join(format!("framecast-e2e-{}", std::process::id()));
    let path = dir.join("out.rgba");
    let mut source = TestPatternSource::new(4, 2);
    let mut sink = RawFileSink::new(&path);
    let mut events = Vec::new();

    let outcome = ExportLoop::new(ManualClock::new()).run(
        ExportRange::new(1, 24).unwrap(),
        &mut source,
        &mut sink,
        &mut events,
        &CancelFlag::new(),
    );

    assert!(outcome.is_completed());
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 24 * 4 * 2 * 4);
    assert_eq!(source.cache_limit(), None);
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_channel_observer_delivers_bracketing_events() {
    let (mut observer, mut rx) = progress_channel(4);
    let handle = tokio::task::spawn_blocking(move || {
        let clock = ManualClock::new();
        let mut source = RecordingSource::default();
        let mut sink = ScriptedSink::new(&clock);
        let outcome = ExportLoop::new(clock.clone()).run(
            ExportRange::new(1, 2000).unwrap(),
            &mut source,
            &mut sink,
            &mut observer,
            &CancelFlag::new(),
        );
        (outcome, observer.dropped())
    });

    let mut received = Vec::new();
    while let Some(event) = rx.recv().await {
        received.push(event);
    }
    let (outcome, dropped) = handle.await.unwrap();

    assert!(outcome.is_completed());
    assert!(matches!(received.first(), Some(ProgressEvent::Started { .. })));
    assert!(matches!(received.last(), Some(ProgressEvent::Ended { .. })));
    match &received[received.len() - 2] {
        ProgressEvent::Frame(progress) => {
            assert!(progress.is_final);
            assert_eq!(progress.frame, 2000);
        }
        other => panic!("expected final frame event, got {other:?}"),
    }
    let ticks = frame_events(&received).iter().filter(|p| !p.is_final).count() as u64;
    assert_eq!(ticks + dropped, 1000);
}

proptest! {
    #[test]
    fn prop_writes_match_range_or_cancel_point(
        start in 1u64..50,
        len in 1u64..300,
        cancel_after in proptest::option::of(1u64..400),
    ) {
        let clock = ManualClock::new();
        let cancel = CancelFlag::new();
        let mut source = RecordingSource::default();
        let mut sink = ScriptedSink::new(&clock);
        if let Some(after) = cancel_after {
            sink.cancel_after = Some((after, cancel.clone()));
        }
        let range = ExportRange::new(start, start + len).unwrap();
        let count = range.frame_count();

        let (outcome, events) = run(range, &clock, &mut source, &mut sink, &cancel);

        let expected = cancel_after.map_or(count, |after| after.min(count));
        prop_assert_eq!(outcome.frames_written(), Some(expected));
        prop_assert_eq!(sink.written.len() as u64, expected);
        prop_assert!(sink.written.windows(2).all(|w| w[1] == w[0] + 1));
        prop_assert_eq!(sink.closed, 1);
        prop_assert_eq!(source.released, 1);

        let frames = frame_events(&events);
        let ticks: Vec<u64> = frames.iter().filter(|p| !p.is_final).map(|p| p.frame).collect();
        prop_assert!(ticks.windows(2).all(|w| w[0] < w[1]));
        let last = frames.last().unwrap();
        prop_assert!(last.is_final);
        prop_assert_eq!(Some(&last.frame), sink.written.last());
    }
}
