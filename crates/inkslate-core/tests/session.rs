//! End-to-end tests through the session and its worker threads.

use inkslate_core::storage::BoxFuture;
use inkslate_core::{
    ChatMessage, CompletionService, EditorConfig, EditorError, EditorResult, Eraser, Gesture, MemoryPersistence, Mode,
    PenStyle, PenType, RawSample, RecognitionOutcome, Recognizer, RefreshMode, RepaintRequest, RepaintSink,
    SerializableColor, Session, Stroke, StrokePersistence, StrokePoint,
};
use kurbo::Vec2;
use std::sync::{Arc, Mutex};
use std::thread::sleep;
use std::time::Duration;

#[derive(Default)]
struct RecordingSink {
    requests: Mutex<Vec<RepaintRequest>>,
}

impl RecordingSink {
    fn take(&self) -> Vec<RepaintRequest> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

impl RepaintSink for RecordingSink {
    fn request_repaint(&self, request: RepaintRequest) {
        self.requests.lock().unwrap().push(request);
    }
}

fn line(x: f64) -> Vec<RawSample> {
    vec![
        RawSample::new(x, 10.0, 2000.0, 0),
        RawSample::new(x, 50.0, 2100.0, 8),
        RawSample::new(x, 90.0, 2200.0, 16),
    ]
}

fn config(debounce_ms: u64) -> EditorConfig {
    EditorConfig {
        debounce_ms,
        ..Default::default()
    }
}

fn session_with(debounce_ms: u64) -> (Session, Arc<RecordingSink>, Arc<MemoryPersistence>) {
    let sink = Arc::new(RecordingSink::default());
    let storage = Arc::new(MemoryPersistence::new());
    let session = Session::builder()
        .config(config(debounce_ms))
        .repaint_sink(sink.clone())
        .persistence(storage.clone())
        .build()
        .unwrap();
    (session, sink, storage)
}

fn stroke_count(session: &Session) -> usize {
    session.page().read().unwrap().strokes.len()
}

#[test]
fn test_draw_erase_undo_through_session() {
    let (session, _sink, storage) = session_with(10_000);
    session.set_pen(PenStyle {
        pen: PenType::Ballpen,
        width: 2.0,
        color: SerializableColor::black(),
    });

    session.submit(line(10.0)).unwrap();
    session.sync().unwrap();
    assert_eq!(stroke_count(&session), 1);

    session.set_mode(Mode::Erase).unwrap();
    session.set_eraser(Eraser::Stroke { radius: 5.0 });
    session
        .submit(vec![RawSample::new(0.0, 50.0, 1.0, 0), RawSample::new(20.0, 50.0, 1.0, 8)])
        .unwrap();
    session.commit().unwrap();
    session.sync().unwrap();
    assert_eq!(stroke_count(&session), 0);
    assert_eq!(session.undo_depth(), 2);
    assert!(pollster::block_on(storage.load_strokes("default")).unwrap().is_empty());

    session.undo().unwrap();
    session.sync().unwrap();
    assert_eq!(stroke_count(&session), 1);
    assert_eq!(pollster::block_on(storage.load_strokes("default")).unwrap().len(), 1);

    session.redo().unwrap();
    session.sync().unwrap();
    assert_eq!(stroke_count(&session), 0);
}

#[test]
fn test_debounce_groups_burst_into_one_undo_step() {
    let (session, _sink, storage) = session_with(80);
    for x in [10.0, 30.0, 50.0] {
        session.submit(line(x)).unwrap();
    }
    session.sync().unwrap();
    assert_eq!(session.undo_depth(), 0);
    assert!(session.has_pending());

    sleep(Duration::from_millis(400));
    session.sync().unwrap();
    assert_eq!(session.undo_depth(), 1);
    assert_eq!(pollster::block_on(storage.load_strokes("default")).unwrap().len(), 3);

    // A quiet window with nothing pending records nothing
    sleep(Duration::from_millis(200));
    assert_eq!(session.undo_depth(), 1);

    session.undo().unwrap();
    session.sync().unwrap();
    assert_eq!(stroke_count(&session), 0);
}

#[test]
fn test_debounced_commit_and_undo_persist_in_order() {
    // The quiet window expires around the undo, so both land in storage close together
    for pause in [0, 1, 2, 3, 5] {
        let (session, _sink, storage) = session_with(2);
        session.submit(line(10.0)).unwrap();
        sleep(Duration::from_millis(pause));
        session.undo().unwrap();
        session.sync().unwrap();
        sleep(Duration::from_millis(20));
        session.sync().unwrap();

        assert_eq!(stroke_count(&session), 0, "pause {pause}ms");
        let stored = pollster::block_on(storage.load_strokes("default")).unwrap_or_default();
        assert!(stored.is_empty(), "pause {pause}ms left {} strokes stored", stored.len());
    }
}

#[test]
fn test_mode_change_flushes_pending() {
    let (session, _sink, _storage) = session_with(10_000);
    session.submit(line(10.0)).unwrap();
    session.set_mode(Mode::Select).unwrap();
    session.sync().unwrap();
    assert_eq!(session.undo_depth(), 1);
    assert!(!session.has_pending());
}

#[test]
fn test_malformed_gesture_is_dropped() {
    let (session, sink, _storage) = session_with(10_000);
    session.submit(vec![RawSample::new(1.0, 1.0, 1.0, 0)]).unwrap();
    session.sync().unwrap();
    assert_eq!(stroke_count(&session), 0);
    assert!(sink.take().is_empty());
}

#[test]
fn test_refresh_modes_per_action() {
    let (session, sink, _storage) = session_with(10_000);

    session.submit(line(10.0)).unwrap();
    session.sync().unwrap();
    let requests = sink.take();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].refresh, RefreshMode::Partial);
    assert!(requests[0].dirty.is_some());

    session.set_mode(Mode::Erase).unwrap();
    session.sync().unwrap();
    assert_eq!(sink.take().last().unwrap().refresh, RefreshMode::Full);

    session.undo().unwrap();
    session.sync().unwrap();
    assert_eq!(sink.take(), vec![RepaintRequest::full()]);

    session.set_scroll(100).unwrap();
    session.sync().unwrap();
    assert_eq!(sink.take(), vec![RepaintRequest::full()]);
    assert_eq!(session.page().read().unwrap().scroll_offset(), 100);
}

#[test]
fn test_select_move_and_cut() {
    let (session, _sink, _storage) = session_with(10_000);
    session.submit(line(10.0)).unwrap();
    session.submit(line(300.0)).unwrap();

    session.set_mode(Mode::Select).unwrap();
    let lasso = vec![
        RawSample::new(0.0, 0.0, 1.0, 0),
        RawSample::new(100.0, 0.0, 1.0, 1),
        RawSample::new(100.0, 100.0, 1.0, 2),
        RawSample::new(0.0, 100.0, 1.0, 3),
    ];
    session.submit(lasso).unwrap();
    session.sync().unwrap();
    assert_eq!(session.page().read().unwrap().selection.as_ref().unwrap().selected.len(), 1);

    session.move_selection(Vec2::new(0.0, 500.0)).unwrap();
    session.sync().unwrap();
    {
        let page = session.page();
        let page = page.read().unwrap();
        let moved = page.strokes.ordered().next().unwrap();
        assert_eq!(moved.points[0].y, 510.0);
    }
    assert_eq!(session.undo_depth(), 2);

    session.cut_selection().unwrap();
    session.sync().unwrap();
    assert_eq!(stroke_count(&session), 1);
    assert!(session.page().read().unwrap().selection.is_none());

    session.undo().unwrap();
    session.sync().unwrap();
    assert_eq!(stroke_count(&session), 2);
}

#[test]
fn test_leaving_select_mode_clears_selection() {
    let (session, _sink, _storage) = session_with(10_000);
    session.submit(line(10.0)).unwrap();
    session.set_mode(Mode::Select).unwrap();
    session
        .submit(vec![
            RawSample::new(0.0, 0.0, 1.0, 0),
            RawSample::new(50.0, 0.0, 1.0, 1),
            RawSample::new(50.0, 100.0, 1.0, 2),
        ])
        .unwrap();
    session.set_mode(Mode::Draw).unwrap();
    session.sync().unwrap();
    assert!(session.page().read().unwrap().selection.is_none());
}

fn square_lasso() -> Vec<RawSample> {
    vec![
        RawSample::new(0.0, 0.0, 1.0, 0),
        RawSample::new(100.0, 0.0, 1.0, 1),
        RawSample::new(100.0, 100.0, 1.0, 2),
        RawSample::new(0.0, 100.0, 1.0, 3),
    ]
}

#[test]
fn test_lasso_outside_select_mode_is_ignored() {
    let (session, sink, _storage) = session_with(10_000);
    session.submit(line(10.0)).unwrap();
    session.sync().unwrap();
    sink.take();

    let mut tool = session.tool();
    tool.mode = Mode::Select;
    session
        .submit_gesture(Gesture {
            samples: square_lasso(),
            tool,
        })
        .unwrap();
    session.sync().unwrap();

    assert!(session.page().read().unwrap().selection.is_none());
    assert!(sink.take().is_empty());
}

#[test]
fn test_undo_and_redo_move_the_lasso_with_its_strokes() {
    let (session, _sink, _storage) = session_with(10_000);
    session.submit(line(10.0)).unwrap();
    session.set_mode(Mode::Select).unwrap();
    session.submit(square_lasso()).unwrap();
    session.sync().unwrap();

    let boundary = || session.page().read().unwrap().selection.as_ref().unwrap().boundary.clone();
    let original = boundary();
    let shifted: Vec<_> = original.iter().map(|p| *p + Vec2::new(0.0, 500.0)).collect();

    session.move_selection(Vec2::new(0.0, 500.0)).unwrap();
    session.sync().unwrap();
    assert_eq!(boundary(), shifted);

    session.undo().unwrap();
    session.sync().unwrap();
    assert_eq!(boundary(), original);

    session.redo().unwrap();
    session.sync().unwrap();
    assert_eq!(boundary(), shifted);
}

#[test]
fn test_signals_follow_mode_changes() {
    let (session, _sink, _storage) = session_with(10_000);
    let modes = session.subscribe_mode();
    let styles = session.subscribe_inking_style();

    session.set_mode(Mode::Erase).unwrap();
    assert_eq!(modes.try_recv().unwrap(), Mode::Erase);
    let style = styles.try_recv().unwrap();
    assert_eq!(style.pen, PenType::Marker);
    assert_eq!(style, session.inking_style());
}

#[test]
fn test_load_page_replaces_content() {
    let sink = Arc::new(RecordingSink::default());
    let stored = Stroke::new(
        PenType::Pencil,
        SerializableColor::black(),
        3.0,
        vec![StrokePoint::new(0.0, 0.0, 100.0, 0), StrokePoint::new(10.0, 10.0, 200.0, 1)],
    );
    let storage = Arc::new(MemoryPersistence::new().with_page("notes", vec![stored.clone()]));
    let session = Session::builder()
        .repaint_sink(sink.clone())
        .persistence(storage)
        .build()
        .unwrap();

    let loaded = session.load_page("notes").unwrap().join().unwrap().unwrap();
    assert_eq!(loaded, 1);
    session.sync().unwrap();

    let page = session.page();
    let page = page.read().unwrap();
    assert_eq!(page.id, "notes");
    assert_eq!(page.strokes.get(stored.id()), Some(&stored));
    assert_eq!(sink.take().last(), Some(&RepaintRequest::full()));
}

struct FixedRecognizer(&'static str);

impl Recognizer for FixedRecognizer {
    fn recognize(&self, strokes: Vec<Stroke>) -> BoxFuture<'_, EditorResult<String>> {
        let text = self.0.to_string();
        Box::pin(async move {
            if strokes.is_empty() {
                Err(EditorError::Recognition("empty".into()))
            } else {
                Ok(text)
            }
        })
    }
}

struct EchoCompletion {
    fail: bool,
}

impl CompletionService for EchoCompletion {
    fn complete(&self, page_id: &str, prompt: &str) -> BoxFuture<'_, EditorResult<String>> {
        let reply = format!("{page_id}: {prompt}!");
        let fail = self.fail;
        Box::pin(async move {
            if fail {
                Err(EditorError::Completion("offline".into()))
            } else {
                Ok(reply)
            }
        })
    }
}

fn recognizing_session(fail: bool) -> Session {
    Session::builder()
        .config(config(10_000))
        .recognizer(Arc::new(FixedRecognizer("hello")))
        .completion(Arc::new(EchoCompletion { fail }))
        .build()
        .unwrap()
}

#[test]
fn test_recognition_answer_clears_page() {
    let session = recognizing_session(false);
    let loading = session.subscribe_loading();
    session.submit(line(10.0)).unwrap();
    session.sync().unwrap();

    let outcome = session.recognize().unwrap().join().unwrap();
    session.sync().unwrap();

    assert_eq!(
        outcome,
        RecognitionOutcome::Answered {
            prompt: "hello".into(),
            response: "default: hello!".into(),
        }
    );
    assert_eq!(stroke_count(&session), 0);
    let overlay = session.overlay();
    let overlay = overlay.read().unwrap();
    assert_eq!(
        overlay.display_lines(),
        vec!["You: hello".to_string(), "Assistant: default: hello!".to_string()]
    );
    assert!(!overlay.is_loading());
    assert_eq!(loading.try_recv().unwrap(), true);
    assert_eq!(loading.try_recv().unwrap(), false);

    // Clearing the page is undoable
    drop(overlay);
    session.undo().unwrap();
    session.sync().unwrap();
    assert_eq!(stroke_count(&session), 1);
}

#[test]
fn test_completion_failure_keeps_handwriting() {
    let session = recognizing_session(true);
    session.submit(line(10.0)).unwrap();
    session.sync().unwrap();

    let outcome = session.recognize().unwrap().join().unwrap();
    session.sync().unwrap();

    assert_eq!(outcome, RecognitionOutcome::RecognizedOnly { text: "hello".into() });
    assert_eq!(stroke_count(&session), 1);
    assert_eq!(session.overlay().read().unwrap().display_lines(), vec!["You: hello".to_string()]);
}

#[test]
fn test_recognition_on_empty_page_fails_quietly() {
    let session = recognizing_session(false);
    let outcome = session.recognize().unwrap().join().unwrap();
    assert!(matches!(outcome, RecognitionOutcome::Failed(_)));
    assert!(session.overlay().read().unwrap().display_lines().is_empty());
}

#[test]
fn test_recognize_without_recognizer_is_config_error() {
    let session = Session::builder().build().unwrap();
    assert!(matches!(session.recognize(), Err(EditorError::Config(_))));
}

#[test]
fn test_load_page_restores_its_messages() {
    let storage = Arc::new(
        MemoryPersistence::new()
            .with_page("notes", Vec::new())
            .with_messages("notes", vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")]),
    );
    let session = Session::builder().persistence(storage).build().unwrap();
    session
        .overlay()
        .write()
        .unwrap()
        .push(ChatMessage::user("from another page"));

    session.load_page("notes").unwrap().join().unwrap().unwrap();
    session.sync().unwrap();
    assert_eq!(
        session.overlay().read().unwrap().display_lines(),
        vec!["You: hi".to_string(), "Assistant: hello".to_string()]
    );

    session.load_page("empty").unwrap().join().unwrap().unwrap();
    session.sync().unwrap();
    assert!(session.overlay().read().unwrap().display_lines().is_empty());
}

#[test]
fn test_load_page_drops_strokes_with_invalid_coordinates() {
    let good = Stroke::new(
        PenType::Ballpen,
        SerializableColor::black(),
        2.0,
        vec![StrokePoint::new(0.0, 0.0, 1.0, 0), StrokePoint::new(10.0, 10.0, 1.0, 1)],
    );
    let bad = Stroke::new(
        PenType::Ballpen,
        SerializableColor::black(),
        2.0,
        vec![StrokePoint::new(0.0, f64::INFINITY, 1.0, 0), StrokePoint::new(10.0, 10.0, 1.0, 1)],
    );
    let storage = Arc::new(MemoryPersistence::new().with_page("notes", vec![good.clone(), bad]));
    let session = Session::builder().persistence(storage).build().unwrap();

    assert_eq!(session.load_page("notes").unwrap().join().unwrap().unwrap(), 1);
    session.sync().unwrap();
    assert_eq!(session.page().read().unwrap().strokes.get(good.id()), Some(&good));
    assert_eq!(stroke_count(&session), 1);
}

#[test]
fn test_recognized_exchange_is_stored_with_the_page() {
    let storage = Arc::new(MemoryPersistence::new());
    let session = Session::builder()
        .config(config(10_000))
        .persistence(storage.clone())
        .recognizer(Arc::new(FixedRecognizer("hello")))
        .completion(Arc::new(EchoCompletion { fail: false }))
        .build()
        .unwrap();
    session.submit(line(10.0)).unwrap();
    session.sync().unwrap();

    session.recognize().unwrap().join().unwrap();
    session.sync().unwrap();

    assert_eq!(
        pollster::block_on(storage.load_messages("default")).unwrap(),
        vec![ChatMessage::user("hello"), ChatMessage::assistant("default: hello!")]
    );
}

#[test]
fn test_delete_open_page_empties_it() {
    let (session, sink, storage) = session_with(10_000);
    session.submit(line(10.0)).unwrap();
    session.commit().unwrap();
    session.sync().unwrap();
    assert_eq!(pollster::block_on(storage.list_pages()).unwrap(), vec!["default".to_string()]);
    sink.take();

    session.delete_page("default").unwrap();
    session.sync().unwrap();

    assert_eq!(stroke_count(&session), 0);
    assert_eq!(session.undo_depth(), 0);
    assert_eq!(session.page().read().unwrap().id, "default");
    assert!(pollster::block_on(storage.list_pages()).unwrap().is_empty());
    assert_eq!(sink.take(), vec![RepaintRequest::full()]);
}

#[test]
fn test_delete_other_page_leaves_open_page_alone() {
    let storage = Arc::new(MemoryPersistence::new().with_page("old", Vec::new()));
    let session = Session::builder().persistence(storage.clone()).build().unwrap();
    session.submit(line(10.0)).unwrap();

    session.delete_page("old").unwrap();
    session.sync().unwrap();

    assert_eq!(stroke_count(&session), 1);
    assert!(pollster::block_on(storage.load_strokes("old")).is_err());
}
