#![cfg(feature = "async-assets")]

use furniture_xr::assembly::Transition;
use furniture_xr::assets::tokio_loader::FetchFn;
use furniture_xr::assets::{AssetRequest, LoadError, ModelStyle, TokioAssetLoader};
use furniture_xr::scene::SceneObject;
use furniture_xr::ui::RecordingUi;
use furniture_xr::vr::{SimulatedArProvider, XrFrame};
use furniture_xr::{ArRuntime, RuntimeConfig, SessionEvent};
use futures_util::FutureExt;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn runtime_places_models_fetched_on_tokio() {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("tokio runtime");

    let fetch: FetchFn = Arc::new(|request: AssetRequest| {
        async move {
            if request.path.ends_with("step-4.glb") {
                return Err(LoadError::Decode {
                    path: request.path,
                    reason: "truncated buffer".to_string(),
                });
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
            Ok(SceneObject::new(request.model, request.path))
        }
        .boxed()
    });
    let loader = TokioAssetLoader::new(
        rt.handle().clone(),
        fetch,
        ModelStyle::default(),
        Duration::from_secs(5),
    );

    let mut runtime = ArRuntime::new(
        RuntimeConfig::default(),
        Box::new(SimulatedArProvider::default()),
        Box::new(RecordingUi::new()),
    )
    .expect("runtime")
    .with_loader(Box::new(loader));
    runtime.toggle_session().expect("start");

    let mut index = 0;
    let mut settled = false;
    while index < 400 && !settled {
        index += 1;
        runtime.frame(&XrFrame::new(index, Duration::from_millis(index * 16)));
        let summary = runtime
            .controller()
            .expect("controller")
            .readiness_summary();
        settled = summary.pending == 0;
        if !settled {
            rt.block_on(async { tokio::time::sleep(Duration::from_millis(5)).await });
        }
    }
    assert!(settled, "loads should settle");

    let summary = runtime.controller().expect("controller").readiness_summary();
    assert_eq!(summary.ready, 6);
    assert_eq!(summary.failed, 1);

    let outcome = runtime.handle_event(SessionEvent::Select).expect("outcome");
    assert_eq!(outcome.transition, Transition::Place);
    let placed = runtime
        .scene()
        .and_then(|scene| scene.models().first().map(|(_, node)| node.object.clone()))
        .flatten()
        .expect("placed object");
    assert_eq!(placed.scale, [0.5, 0.5, 0.5]);
}
