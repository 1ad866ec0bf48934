use furniture_xr::assembly::{CatalogId, Transition};
use furniture_xr::assets::{DeferredAssetLoader, LoadError, ModelStyle};
use furniture_xr::engine::schedule::Stage;
use furniture_xr::ui::{Control, EXIT_LABEL, RecordingUi, START_FAILED_MESSAGE, UNSUPPORTED_LABEL};
use furniture_xr::vr::{ArError, SimulatedArProvider, XrFrame};
use furniture_xr::{ArRuntime, RuntimeConfig, SessionEvent, SessionToggle};
use std::time::Duration;

fn runtime(provider: SimulatedArProvider) -> (ArRuntime, RecordingUi) {
    let ui = RecordingUi::new();
    let runtime = ArRuntime::new(
        RuntimeConfig::default(),
        Box::new(provider),
        Box::new(ui.clone()),
    )
    .expect("default config is valid");
    (runtime, ui)
}

fn frame(index: u64) -> XrFrame {
    XrFrame::new(index, Duration::from_millis(index * 16))
}

#[test]
fn unsupported_platform_disables_the_session_control() {
    let (mut runtime, ui) = runtime(SimulatedArProvider::unsupported());
    assert!(!runtime.check_supported());
    assert_eq!(runtime.is_supported(), Some(false));
    assert_eq!(ui.label(&Control::Session).as_deref(), Some(UNSUPPORTED_LABEL));
    assert!(!ui.is_enabled(&Control::Session));

    assert!(runtime.click(&Control::Session).is_none());
    assert!(!runtime.is_active());
}

#[test]
fn session_start_failure_is_reported_and_never_started() {
    let (mut runtime, ui) = runtime(SimulatedArProvider::failing_start());
    runtime.check_supported();

    let err = runtime.toggle_session().unwrap_err();
    assert!(matches!(err, ArError::SessionStart(_)));
    assert_eq!(ui.info(), START_FAILED_MESSAGE);
    assert!(!runtime.is_active());
    assert_eq!(runtime.sessions_started(), 0);
    assert!(!runtime.frame(&frame(1)));
}

#[test]
fn session_start_reports_overlay_type() {
    let (mut runtime, ui) = runtime(SimulatedArProvider::default());
    assert_eq!(runtime.toggle_session(), Ok(SessionToggle::Started));
    assert_eq!(ui.label(&Control::Session).as_deref(), Some(EXIT_LABEL));
    assert_eq!(ui.info(), "DOM Overlay type: screen");
    assert!(ui.overlay_visible());
}

#[test]
fn end_event_drops_all_session_state() {
    let (mut runtime, ui) = runtime(SimulatedArProvider::default());
    runtime.toggle_session().expect("start");
    runtime.frame(&frame(1));
    runtime.handle_event(SessionEvent::Select);
    runtime.click(&Control::Next);
    assert_eq!(runtime.controller().map(|c| c.stage_index()), Some(2));

    runtime.handle_event(SessionEvent::End);
    assert!(!runtime.is_active());
    assert!(runtime.session_world().is_none());
    assert_eq!(ui.info(), "");
    assert!(!ui.overlay_visible());

    // actions and frames after teardown are dropped
    assert!(runtime.click(&Control::Next).is_none());
    assert!(!runtime.frame(&frame(2)));
    runtime.handle_event(SessionEvent::End);
}

#[test]
fn teardown_cancels_the_hit_test_source() {
    let provider = SimulatedArProvider::default();
    let tally = provider.hit_test_tally();
    let (mut runtime, _ui) = runtime(provider);

    runtime.toggle_session().expect("start");
    runtime.frame(&frame(1));
    assert_eq!(tally.live(), 1);
    runtime.handle_event(SessionEvent::End);
    assert_eq!(tally.cancelled(), 1);
    assert_eq!(tally.live(), 0);

    runtime.toggle_session().expect("restart");
    runtime.frame(&frame(1));
    assert_eq!(tally.live(), 1);
    runtime.shutdown();
    assert_eq!(tally.issued(), 2);
    assert_eq!(tally.cancelled(), 2);
}

#[test]
fn loads_settling_after_teardown_do_not_reach_the_next_session() {
    let deferred = DeferredAssetLoader::new(ModelStyle::default());
    let (runtime, _ui) = runtime(SimulatedArProvider::default());
    let mut runtime = runtime.with_loader(Box::new(deferred.clone()));

    runtime.toggle_session().expect("start");
    runtime.frame(&frame(1));
    runtime.shutdown();

    runtime.toggle_session().expect("restart");
    // the first outstanding step-1 request belongs to the ended session
    assert!(deferred.fail(
        "./model/step-1.glb",
        LoadError::NotFound("./model/step-1.glb".to_string())
    ));
    deferred.resolve_all();
    runtime.frame(&frame(1));

    let summary = runtime
        .controller()
        .expect("controller")
        .readiness_summary();
    assert_eq!(summary.ready, 7);
    assert_eq!(summary.failed, 0);

    let outcome = runtime.handle_event(SessionEvent::Select).expect("outcome");
    assert_eq!(outcome.transition, Transition::Place);
}

#[test]
fn host_initiated_end_is_handled_without_toggle() {
    let (mut runtime, _ui) = runtime(SimulatedArProvider::default());
    runtime.toggle_session().expect("start");
    runtime.frame(&frame(1));
    runtime.handle_event(SessionEvent::End);
    assert!(!runtime.is_active());

    assert_eq!(runtime.toggle_session(), Ok(SessionToggle::Started));
    assert_eq!(runtime.sessions_started(), 2);
}

#[test]
fn restarted_session_frames_render_from_one_again() {
    let (mut runtime, _ui) = runtime(SimulatedArProvider::default());
    runtime.toggle_session().expect("start");
    for index in 1..=5 {
        runtime.frame(&frame(index));
    }
    runtime.shutdown();

    runtime.toggle_session().expect("restart");
    assert!(runtime.frame(&frame(1)));
    let world = runtime.session_world().expect("session");
    assert_eq!(world.stats.render_errors, 0);
    assert_eq!(world.stats.frames, 1);
    assert_eq!(runtime.frames_rendered(), 6);
}

#[test]
fn frame_profile_covers_every_stage() {
    let (mut runtime, _ui) = runtime(SimulatedArProvider::default());
    runtime.toggle_session().expect("start");
    runtime.frame(&frame(3));

    let profile = runtime.last_profile();
    assert_eq!(profile.frame_index(), 3);
    assert_eq!(profile.stages().len(), Stage::count());
    let present = profile.stage(Stage::Present).expect("present stage");
    let names: Vec<_> = present.systems.iter().map(|system| system.name).collect();
    assert_eq!(names, vec!["present_ui", "render", "frame_stats"]);
}

#[test]
fn initial_catalog_comes_from_config() {
    let ui = RecordingUi::new();
    let config = RuntimeConfig::from_json(r#"{ "initial_catalog": "table" }"#).expect("config");
    let mut runtime = ArRuntime::new(
        config,
        Box::new(SimulatedArProvider::default()),
        Box::new(ui.clone()),
    )
    .expect("runtime");
    runtime.toggle_session().expect("start");

    let controller = runtime.controller().expect("controller");
    assert_eq!(controller.catalog().id(), &CatalogId::new("table"));
    assert!(ui.is_enabled(&Control::SwitchTo(CatalogId::new("shelf"))));
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let config = RuntimeConfig::from_json(r#"{ "initial_catalog": "wardrobe" }"#).expect("parse");
    let result = ArRuntime::new(
        config,
        Box::new(SimulatedArProvider::default()),
        Box::new(RecordingUi::new()),
    );
    assert!(result.is_err());
}
