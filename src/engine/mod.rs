pub mod config;
pub mod schedule;

pub use config::{ConfigError, RuntimeConfig};

use crate::assembly::{
    ActionOutcome, AssemblyController, CatalogSet, StepState, Transition, UserAction,
};
use crate::assets::{AssetLoader, ImmediateAssetLoader};
use crate::render::{DrawStats, Renderer, SceneRenderer};
use crate::scene::SceneGraph;
use crate::ui::{Control, UiPresenter, UiSurface};
#[cfg(feature = "vr-openxr")]
use crate::vr::openxr::OpenXrSessionProvider;
use crate::vr::{
    ArError, ArResult, ArSession, ArSessionProvider, SimulatedArProvider, SurfaceTracker, XrFrame,
};
use schedule::{FrameProfile, Scheduler, Stage};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Events the host session raises outside the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Primary screen-tap or controller select.
    Select,
    /// The host has ended the session, either on request or on its own.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionToggle {
    Started,
    /// End was requested; teardown happens on [`SessionEvent::End`].
    Ending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: u64,
    pub surface_frames: u64,
    pub completions: u64,
    pub expired: u64,
    pub render_errors: u64,
    pub last_draw: Option<DrawStats>,
}

/// Everything one AR session owns. Dropped wholesale when the session ends.
pub struct SessionWorld {
    pub tracker: SurfaceTracker,
    pub controller: AssemblyController,
    pub scene: SceneGraph,
    pub stats: FrameStats,
    epoch: Option<Duration>,
}

impl SessionWorld {
    fn new(tracker: SurfaceTracker, controller: AssemblyController) -> Self {
        Self {
            tracker,
            controller,
            scene: SceneGraph::new(),
            stats: FrameStats::default(),
            epoch: None,
        }
    }

    /// Frame time relative to the first frame of this session.
    fn session_time(&mut self, frame: &XrFrame) -> Duration {
        let epoch = *self.epoch.get_or_insert(frame.time);
        frame.time.saturating_sub(epoch)
    }
}

struct LiveSession {
    handle: Box<dyn ArSession>,
    world: SessionWorld,
    end_requested: bool,
}

type SharedLoader = Rc<RefCell<Box<dyn AssetLoader>>>;

/// Drives one AR walkthrough: session lifecycle, per-frame tracking, asset
/// loading, overlay controls and rendering. Single-threaded; the host calls
/// into it from its frame and event callbacks.
pub struct ArRuntime {
    config: RuntimeConfig,
    catalogs: CatalogSet,
    provider: Box<dyn ArSessionProvider>,
    loader: SharedLoader,
    ui: Rc<RefCell<UiPresenter>>,
    renderer: Rc<RefCell<Renderer>>,
    scheduler: Scheduler<SessionWorld>,
    session: Option<LiveSession>,
    supported: Option<bool>,
    sessions_started: u32,
}

impl ArRuntime {
    pub fn new(
        config: RuntimeConfig,
        provider: Box<dyn ArSessionProvider>,
        surface: Box<dyn UiSurface>,
    ) -> Result<Self, ConfigError> {
        let catalogs = config.catalog_set()?;
        let loader: SharedLoader = Rc::new(RefCell::new(Box::new(ImmediateAssetLoader::new(
            config.model_style,
        ))));

        let mut runtime = Self {
            config,
            catalogs,
            provider,
            loader,
            ui: Rc::new(RefCell::new(UiPresenter::new(surface))),
            renderer: Rc::new(RefCell::new(Renderer::default())),
            scheduler: Scheduler::new(),
            session: None,
            supported: None,
            sessions_started: 0,
        };
        runtime.register_frame_systems();
        Ok(runtime)
    }

    pub fn with_loader(self, loader: Box<dyn AssetLoader>) -> Self {
        log::debug!("[runtime] asset loader: {}", loader.label());
        *self.loader.borrow_mut() = loader;
        self
    }

    pub fn with_renderer(self, backend: Box<dyn SceneRenderer>) -> Self {
        *self.renderer.borrow_mut() = Renderer::new(backend);
        self
    }

    /// Queries the provider and updates the session control to match.
    pub fn check_supported(&mut self) -> bool {
        let supported = self.provider.is_supported();
        if self.supported != Some(supported) {
            log::info!(
                "[runtime] {} immersive AR support: {supported}",
                self.provider.label()
            );
        }
        self.supported = Some(supported);
        self.ui.borrow_mut().session_available(supported);
        supported
    }

    pub fn toggle_session(&mut self) -> ArResult<SessionToggle> {
        if let Some(session) = self.session.as_mut() {
            if !session.end_requested {
                log::info!("[runtime] ending {}", session.handle.label());
                session.end_requested = true;
                session.handle.end();
            }
            return Ok(SessionToggle::Ending);
        }
        self.start_session()?;
        Ok(SessionToggle::Started)
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> Option<ActionOutcome> {
        match event {
            SessionEvent::Select => self.dispatch(UserAction::Confirm),
            SessionEvent::End => {
                self.teardown();
                None
            }
        }
    }

    /// Routes an overlay control activation.
    pub fn click(&mut self, control: &Control) -> Option<ActionOutcome> {
        let action = match control {
            Control::Session => {
                if let Err(err) = self.toggle_session() {
                    log::warn!("[runtime] session toggle failed: {err}");
                }
                return None;
            }
            Control::Previous => UserAction::Previous,
            Control::Next => UserAction::Next,
            Control::Confirm => UserAction::Confirm,
            Control::SwitchTo(id) => UserAction::SwitchAssembly(id.clone()),
        };
        self.dispatch(action)
    }

    /// Applies a user action to the live session. Returns `None` when no
    /// session is active.
    pub fn dispatch(&mut self, action: UserAction) -> Option<ActionOutcome> {
        let Some(session) = self.session.as_mut() else {
            log::debug!("[runtime] {action} ignored without an active session");
            return None;
        };
        let world = &mut session.world;

        let outcome = world.controller.handle(&action, world.tracker.latest());
        for command in &outcome.commands {
            if let Err(err) = world.scene.apply(command.clone()) {
                log::warn!("[runtime] scene rejected {command:?}: {err}");
            }
        }

        if matches!(outcome.transition, Transition::Switch { .. }) {
            world.tracker.reset();
            let requests = world.controller.request_assets();
            let mut loader = self.loader.borrow_mut();
            for request in requests {
                loader.request(request);
            }
        }

        self.ui
            .borrow_mut()
            .present(&world.controller.affordances());
        Some(outcome)
    }

    /// Runs one host frame. Frames delivered without a session are dropped.
    pub fn frame(&mut self, frame: &XrFrame) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        self.scheduler.tick(&mut session.world, frame);
        true
    }

    /// Ends any live session immediately, without waiting for the host.
    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.handle.end();
        }
        self.teardown();
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_supported(&self) -> Option<bool> {
        self.supported
    }

    pub fn sessions_started(&self) -> u32 {
        self.sessions_started
    }

    pub fn session_world(&self) -> Option<&SessionWorld> {
        self.session.as_ref().map(|session| &session.world)
    }

    pub fn controller(&self) -> Option<&AssemblyController> {
        self.session_world().map(|world| &world.controller)
    }

    pub fn scene(&self) -> Option<&SceneGraph> {
        self.session_world().map(|world| &world.scene)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn catalogs(&self) -> &CatalogSet {
        &self.catalogs
    }

    pub fn last_profile(&self) -> FrameProfile {
        self.scheduler.last_profile().clone()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.renderer.borrow().frames_drawn()
    }

    fn start_session(&mut self) -> ArResult<()> {
        let supported = match self.supported {
            Some(supported) => supported,
            None => self.check_supported(),
        };
        if !supported {
            return Err(ArError::Unsupported);
        }

        let mut handle = match self.provider.start(&self.config.session) {
            Ok(handle) => handle,
            Err(err) => {
                log::warn!("[runtime] {err}");
                self.ui.borrow_mut().session_failed();
                return Err(err);
            }
        };

        let tracker = match handle.request_hit_test_source() {
            Ok(source) => SurfaceTracker::new(Some(source)),
            Err(err) => {
                log::warn!("[runtime] {err}; surfaces will not be detected this session");
                SurfaceTracker::detached()
            }
        };

        let mut controller =
            AssemblyController::new(self.catalogs.clone(), self.config.initial_catalog.as_ref())
                .with_session(self.sessions_started + 1)
                .with_gate(self.config.readiness_gate)
                .with_asset_timeout(self.config.asset_timeout());
        let requests = controller.request_assets();
        {
            let mut loader = self.loader.borrow_mut();
            let stale = loader.drain_completions();
            if !stale.is_empty() {
                log::debug!(
                    "[runtime] discarded {} completions from a previous session",
                    stale.len()
                );
            }
            for request in requests {
                loader.request(request);
            }
        }

        let world = SessionWorld::new(tracker, controller);
        {
            let mut ui = self.ui.borrow_mut();
            ui.session_started(handle.dom_overlay_type().as_deref());
            ui.present(&world.controller.affordances());
        }
        self.renderer.borrow_mut().reset();

        self.sessions_started += 1;
        log::info!(
            "[runtime] started {} with catalog {}",
            handle.label(),
            world.controller.catalog().id()
        );
        self.session = Some(LiveSession {
            handle,
            world,
            end_requested: false,
        });
        Ok(())
    }

    fn teardown(&mut self) {
        let Some(mut session) = self.session.take() else {
            log::debug!("[runtime] end event without an active session");
            return;
        };

        session.world.tracker.cancel();
        let stale = self.loader.borrow_mut().drain_completions();
        self.renderer.borrow_mut().reset();
        self.ui.borrow_mut().session_ended();
        log::info!(
            "[runtime] {} ended at stage {} after {} frames ({} late completions dropped)",
            session.handle.label(),
            session.world.controller.stage_index(),
            session.world.stats.frames,
            stale.len()
        );
    }

    fn register_frame_systems(&mut self) {
        self.scheduler
            .add_system_fn(Stage::Tracking, "poll_surface", |world, frame| {
                let hit = world.tracker.poll(frame);
                if hit.is_some() {
                    world.stats.surface_frames += 1;
                }
                let reticle = match world.controller.state() {
                    StepState::Searching => hit,
                    _ => None,
                };
                world.scene.set_reticle(reticle);
            });

        let loader = Rc::clone(&self.loader);
        self.scheduler
            .add_system_fn(Stage::Assets, "load_assets", move |world, frame| {
                let now = world.session_time(frame);
                let expired = world.controller.advance_clock(now);
                if !expired.is_empty() {
                    world.stats.expired += expired.len() as u64;
                }

                let requests = world.controller.request_assets();
                let completions = {
                    let mut loader = loader.borrow_mut();
                    for request in requests {
                        loader.request(request);
                    }
                    loader.drain_completions()
                };
                for completion in completions {
                    if world.controller.record_completion(completion) {
                        world.stats.completions += 1;
                    }
                }
            });

        let ui = Rc::clone(&self.ui);
        self.scheduler
            .add_system_fn(Stage::Present, "present_ui", move |world, _frame| {
                ui.borrow_mut().present(&world.controller.affordances());
            });

        let renderer = Rc::clone(&self.renderer);
        self.scheduler
            .add_system_fn(Stage::Present, "render", move |world, frame| {
                match renderer.borrow_mut().render(&world.scene, frame) {
                    Ok(stats) => world.stats.last_draw = Some(stats),
                    Err(err) => {
                        world.stats.render_errors += 1;
                        log::warn!("[runtime] render error: {err}");
                    }
                }
            });

        self.scheduler
            .add_system_fn(Stage::Present, "frame_stats", |world, frame| {
                world.stats.frames += 1;
                let summary = world.controller.readiness_summary();
                log::trace!(
                    "[runtime] frame {} stage {} surface {} assets {}/{} ready ({} failed)",
                    frame.index,
                    world.controller.stage_index(),
                    world.tracker.latest().is_some(),
                    summary.ready,
                    summary.ready + summary.pending + summary.failed,
                    summary.failed
                );
            });
    }
}

/// Session provider for the current build: OpenXR when compiled in and
/// available, otherwise the in-process simulation.
pub fn platform_provider() -> Box<dyn ArSessionProvider> {
    #[cfg(feature = "vr-openxr")]
    {
        let provider = OpenXrSessionProvider::initialize();
        if provider.is_supported() {
            log::info!("[runtime] OpenXR session provider initialized");
            return Box::new(provider);
        }
        log::warn!("[runtime] OpenXR unavailable; falling back to simulation");
    }

    Box::new(SimulatedArProvider::default())
}
